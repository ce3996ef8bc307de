//! HTTP collaborators of the liquidator.
//!
//! This crate provides clients for:
//! - The published program interface descriptor (program address discovery)
//! - Healthcheck pings
//! - Operator notifications (log + throttled Telegram, leading and trailing)

mod healthcheck;
mod idl;
mod notifier;

pub use healthcheck::HealthcheckClient;
pub use idl::{IdlClient, IdlDescriptor, IdlMetadata};
pub use notifier::{
    Admission, NotificationSink, Notifier, TelegramConfig, TelegramSink, Throttle,
};
