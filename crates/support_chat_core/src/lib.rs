pub mod domain;
pub mod ports;
pub mod timeline;

pub use domain::{
    AssistantReply, CsatRating, EscalationSnapshot, EscalationStatus, HistoryEntry, KbSource,
    Language, Message, MessageOrigin, TimedMessage, ToolOutcome, TrackedEscalation,
};
pub use ports::{PortError, PortResult, SessionStorage, StorageKey, SupportBackend};
pub use timeline::{merge_transcript, operator_message_id, Timeline};
