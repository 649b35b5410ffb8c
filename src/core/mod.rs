pub mod catalog;
pub mod checkout;
pub mod dispatch;
pub mod reservation;
pub mod seed;

pub use crate::domain::model::{PromoDefinition, PromoKind, Reservation};
pub use crate::domain::ports::{ConfigProvider, CounterStore, Notifier};
pub use crate::utils::error::Result;
