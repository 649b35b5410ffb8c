pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command};

pub use adapters::{InMemoryCounterStore, TelegramNotifier, UpstashCounterStore};
pub use config::{AppConfig, LambdaConfig};
pub use crate::core::{
    catalog::Catalog,
    checkout::{ApiResponse, CheckoutService},
    dispatch::{OrderConfirmation, OrderDispatcher},
    reservation::ReservationEngine,
};
pub use utils::error::{CheckoutError, Result};
