// Adapters layer: concrete implementations of the domain ports (counter stores, notifiers).

pub mod memory;
pub mod telegram;
pub mod upstash;

pub use memory::InMemoryCounterStore;
pub use telegram::TelegramNotifier;
pub use upstash::UpstashCounterStore;
