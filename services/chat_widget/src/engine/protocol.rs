//! services/chat_widget/src/engine/protocol.rs
//!
//! Defines the notification protocol between the engine and the widget UI
//! that embeds it. Events are advisory: the UI can always rebuild its view
//! from [`crate::engine::ChatEngine::timeline`] instead.

use support_chat_core::domain::{EscalationStatus, Message};

/// Notifications the engine pushes to the embedding UI.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A new entry was appended to the timeline (any origin).
    MessageAppended(Message),

    /// A tracked escalation changed lifecycle state.
    EscalationStatusChanged {
        escalation_id: String,
        status: EscalationStatus,
    },

    /// An escalation resolved and has not been rated or dismissed yet.
    /// The UI should show the satisfaction prompt exactly once.
    SurveyRequested { escalation_id: String },

    /// The session was wiped and replaced. All previously rendered state is
    /// stale.
    SessionReset { session_id: String },
}
