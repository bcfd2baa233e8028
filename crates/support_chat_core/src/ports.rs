//! crates/support_chat_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the engine's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of the concrete HTTP backend and of whatever
//! durable storage the embedding application provides.

use crate::domain::{
    AssistantReply, CsatRating, EscalationSnapshot, HistoryEntry, Language,
};
use async_trait::async_trait;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (network,
/// storage) so the engine can apply one recovery policy per failure class.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The backing service exists but cannot be used right now. Storage
    /// adapters report this so the session store can degrade to in-memory
    /// state instead of failing the mutation.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The help-desk backend, consumed as opaque remote calls.
#[async_trait]
pub trait SupportBackend: Send + Sync {
    /// Sends a visitor message to the AI assistant endpoint, together with
    /// the conversation so far. The reply may carry a tool-call outcome that
    /// starts a new escalation or ticket.
    async fn send_assistant_message(
        &self,
        text: &str,
        history: &[HistoryEntry],
        language: Language,
        active_escalation_id: Option<&str>,
    ) -> PortResult<AssistantReply>;

    /// Forwards a visitor message into an existing escalation so the
    /// assigned operator sees it.
    async fn send_escalation_message(&self, escalation_id: &str, text: &str) -> PortResult<()>;

    /// Fetches the backend's current view of one escalation: status plus the
    /// full operator/client message lists.
    async fn fetch_escalation(&self, escalation_id: &str) -> PortResult<EscalationSnapshot>;

    /// Submits a satisfaction rating for a resolved escalation.
    async fn submit_csat(
        &self,
        escalation_id: &str,
        rating: CsatRating,
        feedback: Option<&str>,
    ) -> PortResult<()>;
}

/// The keys the engine persists between page loads. Namespaced so the host
/// application's own storage cannot collide with ours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    SessionId,
    Timeline,
    TrackedEscalations,
    CsatSubmitted,
    Language,
}

impl StorageKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::SessionId => "support_chat.session_id",
            StorageKey::Timeline => "support_chat.timeline",
            StorageKey::TrackedEscalations => "support_chat.tracked_escalations",
            StorageKey::CsatSubmitted => "support_chat.csat_submitted",
            StorageKey::Language => "support_chat.language",
        }
    }

    /// Every persisted key.
    pub const ALL: [StorageKey; 5] = [
        StorageKey::SessionId,
        StorageKey::Timeline,
        StorageKey::TrackedEscalations,
        StorageKey::CsatSubmitted,
        StorageKey::Language,
    ];
}

/// Durable client-local key/value storage. Last writer wins per key; the
/// engine is the only writer, so no further locking discipline is required.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn load(&self, key: StorageKey) -> PortResult<Option<String>>;

    async fn store(&self, key: StorageKey, value: &str) -> PortResult<()>;

    async fn remove(&self, key: StorageKey) -> PortResult<()>;
}
