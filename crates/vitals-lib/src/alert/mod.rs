//! Alert debouncing and delivery

mod gate;
mod notifier;

pub use gate::{AlertGate, DEFAULT_COOLDOWN};
pub use notifier::{
    AlertSeverity, AlertmanagerAlert, AlertmanagerPayload, LogNotifier, Notifier,
    WebhookNotifier,
};
