//! crates/support_chat_core/src/timeline.rs
//!
//! The ordered, append-only message log and the single merge function that
//! reconciles the three message sources (local exchange, pre-escalation
//! snapshot, polled operator messages) into one transcript.

use crate::domain::{EscalationSnapshot, Message, MessageOrigin};
use chrono::Duration;
use std::collections::HashSet;

/// The stable identity of an operator message: its index within the backend's
/// per-escalation operator-message list. Appending under this id is what
/// makes polling idempotent.
pub fn operator_message_id(escalation_id: &str, index: usize) -> String {
    format!("op:{}:{}", escalation_id, index)
}

/// The identity of one pre-escalation snapshot entry inside a merged
/// transcript.
fn history_entry_id(escalation_id: &str, index: usize) -> String {
    format!("hist:{}:{}", escalation_id, index)
}

//=========================================================================================
// Timeline
//=========================================================================================

/// An append-only log of chat messages.
///
/// Appends preserve arrival order; the rendered view is reconciled by
/// timestamp at read time, so the timeline can be recomputed at any moment
/// purely from persisted state.
#[derive(Debug, Default, Clone)]
pub struct Timeline {
    messages: Vec<Message>,
    seen_ids: HashSet<String>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a timeline from persisted messages, preserving their order.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        let mut timeline = Self::new();
        for message in messages {
            timeline.append(message);
        }
        timeline
    }

    /// Appends a message. Idempotent per logical message: a second append
    /// under an already-present id is a no-op and returns `false`.
    pub fn append(&mut self, message: Message) -> bool {
        if !self.seen_ids.insert(message.id.clone()) {
            return false;
        }
        self.messages.push(message);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen_ids.contains(id)
    }

    /// The messages in arrival order. This is what gets persisted.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The render view: entries sorted by `created_at`, ties broken by
    /// arrival order (stable sort).
    pub fn ordered(&self) -> Vec<Message> {
        let mut view = self.messages.clone();
        view.sort_by_key(|m| m.created_at);
        view
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

//=========================================================================================
// Transcript merge
//=========================================================================================

/// Builds the unified transcript for one escalation, for display in an
/// operator-facing panel.
///
/// The pre-escalation snapshot entries carry no timestamps of their own, so
/// each is assigned a synthetic timestamp anchored at the escalation's
/// creation time: entry `i` of `n` gets `created_at - (n - i)` milliseconds.
/// The synthetic stamps increase with the original entry order and all fall
/// before `created_at`, so snapshot entries sort ahead of every
/// real-timestamped message from the escalation.
pub fn merge_transcript(snapshot: &EscalationSnapshot) -> Vec<Message> {
    let mut transcript = Vec::new();

    let n = snapshot.conversation_history.len() as i64;
    for (i, entry) in snapshot.conversation_history.iter().enumerate() {
        let origin = if entry.is_operator {
            MessageOrigin::Operator
        } else if entry.is_user {
            MessageOrigin::Visitor
        } else {
            MessageOrigin::Assistant
        };
        let synthetic = snapshot.created_at - Duration::milliseconds(n - i as i64);
        transcript.push(Message {
            id: history_entry_id(&snapshot.escalation_id, i),
            content: entry.content.clone(),
            origin,
            created_at: synthetic,
            sources: Vec::new(),
            auto_resolved: None,
            tool_result: None,
        });
    }

    for (i, client) in snapshot.client_messages.iter().enumerate() {
        transcript.push(Message {
            id: format!("client:{}:{}", snapshot.escalation_id, i),
            content: client.content.clone(),
            origin: MessageOrigin::Visitor,
            created_at: client.timestamp,
            sources: Vec::new(),
            auto_resolved: None,
            tool_result: None,
        });
    }

    for (i, operator) in snapshot.operator_messages.iter().enumerate() {
        transcript.push(Message {
            id: operator_message_id(&snapshot.escalation_id, i),
            content: operator.content.clone(),
            origin: MessageOrigin::Operator,
            created_at: operator.timestamp,
            sources: Vec::new(),
            auto_resolved: None,
            tool_result: None,
        });
    }

    transcript.sort_by_key(|m| m.created_at);
    transcript
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EscalationStatus, HistoryEntry, TimedMessage};
    use chrono::{TimeZone, Utc};

    fn message_at(content: &str, origin: MessageOrigin, secs: i64) -> Message {
        Message::new(content, origin, Utc.timestamp_opt(secs, 0).unwrap())
    }

    #[test]
    fn append_is_idempotent_per_id() {
        let mut timeline = Timeline::new();
        let mut message = message_at("hello", MessageOrigin::Operator, 100);
        message.id = operator_message_id("ESC-1", 0);

        assert!(timeline.append(message.clone()));
        assert!(!timeline.append(message));
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn ordered_view_sorts_by_timestamp_with_stable_ties() {
        let mut timeline = Timeline::new();
        timeline.append(message_at("second", MessageOrigin::Assistant, 200));
        timeline.append(message_at("first", MessageOrigin::Visitor, 100));
        // Same timestamp as "second": arrival order must be preserved.
        timeline.append(message_at("third", MessageOrigin::Operator, 200));

        let view = timeline.ordered();
        let contents: Vec<_> = view.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[test]
    fn rebuild_from_messages_round_trips() {
        let mut timeline = Timeline::new();
        timeline.append(message_at("a", MessageOrigin::Visitor, 1));
        timeline.append(message_at("b", MessageOrigin::Assistant, 2));

        let rebuilt = Timeline::from_messages(timeline.messages().to_vec());
        assert_eq!(rebuilt.messages(), timeline.messages());
    }

    #[test]
    fn merge_places_snapshot_before_live_messages() {
        let created_at = Utc.timestamp_opt(1_000, 0).unwrap();
        let snapshot = EscalationSnapshot {
            escalation_id: "ESC-1".into(),
            status: EscalationStatus::InProgress,
            department_name: "IT".into(),
            priority: "medium".into(),
            created_at,
            operator_messages: vec![TimedMessage {
                content: "operator here".into(),
                timestamp: created_at + Duration::seconds(5),
            }],
            client_messages: vec![TimedMessage {
                content: "still broken".into(),
                timestamp: created_at + Duration::seconds(3),
            }],
            conversation_history: vec![
                HistoryEntry {
                    content: "my password does not work".into(),
                    is_user: true,
                    is_operator: false,
                },
                HistoryEntry {
                    content: "let me escalate that".into(),
                    is_user: false,
                    is_operator: false,
                },
            ],
        };

        let transcript = merge_transcript(&snapshot);
        let contents: Vec<_> = transcript.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "my password does not work",
                "let me escalate that",
                "still broken",
                "operator here",
            ]
        );

        // Synthetic stamps increase and stay strictly before the creation time.
        assert!(transcript[0].created_at < transcript[1].created_at);
        assert!(transcript[1].created_at < created_at);
        assert_eq!(transcript[0].origin, MessageOrigin::Visitor);
        assert_eq!(transcript[1].origin, MessageOrigin::Assistant);
        assert_eq!(transcript[3].origin, MessageOrigin::Operator);
    }

    #[test]
    fn merge_is_deterministic_across_repeated_calls() {
        let created_at = Utc.timestamp_opt(2_000, 0).unwrap();
        let snapshot = EscalationSnapshot {
            escalation_id: "ESC-2".into(),
            status: EscalationStatus::Pending,
            department_name: "HR".into(),
            priority: "low".into(),
            created_at,
            operator_messages: vec![],
            client_messages: vec![],
            conversation_history: vec![HistoryEntry {
                content: "hello".into(),
                is_user: true,
                is_operator: false,
            }],
        };

        assert_eq!(merge_transcript(&snapshot), merge_transcript(&snapshot));
    }
}
