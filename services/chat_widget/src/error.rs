//! services/chat_widget/src/error.rs
//!
//! Defines the primary error type for the widget engine crate.

use crate::config::ConfigError;
use support_chat_core::ports::PortError;

/// The primary error type for the `chat_widget` crate.
#[derive(Debug, thiserror::Error)]
pub enum WidgetError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service
    /// ports. Adapter failures (HTTP, file IO) arrive through here, already
    /// mapped to a `PortError` class at the adapter boundary.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_errors_convert_and_keep_their_message() {
        let err: WidgetError = PortError::NotFound("ESC-1".to_string()).into();
        assert!(err.to_string().contains("ESC-1"));
    }
}
