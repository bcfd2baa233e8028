//! crates/support_chat_core/src/domain.rs
//!
//! Defines the pure, core data structures for the escalation session engine.
//! These structs are independent of any storage format or HTTP transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// The visitor's interface language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ru,
    Kz,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Ru => "ru",
            Language::Kz => "kz",
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ru" => Ok(Language::Ru),
            "kz" => Ok(Language::Kz),
            other => Err(format!("'{}' is not a supported language", other)),
        }
    }
}

/// The source of a chat message. Each origin renders and routes differently,
/// so this is a tagged enum rather than a flag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageOrigin {
    Visitor,
    Assistant,
    Operator,
}

/// A knowledge-base citation attached to an assistant reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KbSource {
    pub category: String,
    pub subcategory: String,
    pub question: String,
}

/// The structured outcome of an automated assistant action (tool call).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolOutcome {
    /// The assistant handed the conversation off to a human operator.
    Escalate {
        escalation_id: String,
        department_name: String,
        priority: String,
    },
    /// The assistant filed a ticket on the visitor's behalf.
    CreateTicket {
        ticket_number: String,
        department_name: String,
        priority: String,
    },
    /// The assistant looked up the status of an existing request.
    CheckStatus {
        escalation_id: String,
        status: Option<String>,
    },
}

impl ToolOutcome {
    /// The identifier to start tracking, if this outcome created a
    /// human-handoff unit.
    pub fn tracking_id(&self) -> Option<&str> {
        match self {
            ToolOutcome::Escalate { escalation_id, .. } => Some(escalation_id),
            ToolOutcome::CreateTicket { ticket_number, .. } => Some(ticket_number),
            ToolOutcome::CheckStatus { .. } => None,
        }
    }
}

/// One entry in the visitor-facing timeline. Messages are never mutated after
/// creation and never deleted except by a full session reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique within the session. Operator-sourced messages use the
    /// deterministic form produced by [`crate::timeline::operator_message_id`]
    /// so repeated poll cycles cannot append them twice.
    pub id: String,
    pub content: String,
    pub origin: MessageOrigin,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<KbSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_resolved: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolOutcome>,
}

impl Message {
    /// Creates a plain message with a fresh random id.
    pub fn new(
        content: impl Into<String>,
        origin: MessageOrigin,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            origin,
            created_at,
            sources: Vec::new(),
            auto_resolved: None,
            tool_result: None,
        }
    }
}

/// The lifecycle state of an escalation, driven exclusively by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationStatus {
    /// Awaiting an operator to accept the handoff.
    Pending,
    /// An operator is actively engaged.
    InProgress,
    /// Terminal. The client never enters this state without backend
    /// confirmation.
    Resolved,
}

impl EscalationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EscalationStatus::Resolved)
    }
}

/// One operator or client message inside an escalation, as reported by the
/// backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedMessage {
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// One line of the backend's conversation-history transcript format. Entries
/// captured before the escalation existed carry no timestamp of their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub content: String,
    pub is_user: bool,
    #[serde(default)]
    pub is_operator: bool,
}

/// The backend's current view of one escalation, fetched by the poller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationSnapshot {
    pub escalation_id: String,
    pub status: EscalationStatus,
    pub department_name: String,
    pub priority: String,
    pub created_at: DateTime<Utc>,
    pub operator_messages: Vec<TimedMessage>,
    pub client_messages: Vec<TimedMessage>,
    pub conversation_history: Vec<HistoryEntry>,
}

/// The client-resident record for one escalation under active tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedEscalation {
    pub escalation_id: String,
    pub status: EscalationStatus,
    pub department_name: String,
    pub priority: String,
    pub created_at: DateTime<Utc>,
    /// High-water mark into the backend's operator-message list. Only
    /// messages beyond this index are appended on a poll cycle.
    pub seen_operator_messages: usize,
}

impl TrackedEscalation {
    pub fn new(
        escalation_id: impl Into<String>,
        department_name: impl Into<String>,
        priority: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            escalation_id: escalation_id.into(),
            status: EscalationStatus::Pending,
            department_name: department_name.into(),
            priority: priority.into(),
            created_at,
            seen_operator_messages: 0,
        }
    }
}

/// The assistant endpoint's reply to one visitor message.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub text: String,
    pub sources: Vec<KbSource>,
    pub can_auto_resolve: bool,
    pub suggested_priority: Option<String>,
    pub tool_call: Option<ToolOutcome>,
}

/// A validated 1-5 satisfaction rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CsatRating(u8);

impl CsatRating {
    /// Returns `None` when `value` is outside 1..=5.
    pub fn new(value: u8) -> Option<Self> {
        (1..=5).contains(&value).then_some(Self(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}
