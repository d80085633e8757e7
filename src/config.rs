//! Configuration surface for breakers, backoff and the response cache.

#[path = "config/settings.rs"]
mod settings;

#[path = "config/load.rs"]
mod load;

pub use settings::{BackendSettings, BackoffOverrides, BreakerOverrides, ResilienceSettings};
