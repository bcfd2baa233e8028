//! services/chat_widget/src/lib.rs
//!
//! The embeddable engine behind the support chat widget. There is no CLI or
//! server surface here: the host application constructs a
//! [`engine::ChatEngine`] and drives it from its UI.

pub mod adapters;
pub mod config;
pub mod engine;
pub mod error;

pub use config::Config;
pub use engine::{ChatEngine, EngineEvent};
pub use error::WidgetError;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global tracing subscriber. The host calls this once at
/// startup; library code only ever emits through the `tracing` macros.
pub fn init_tracing(config: &Config) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            config.log_level.to_string(),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
