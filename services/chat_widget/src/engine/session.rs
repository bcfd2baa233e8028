//! services/chat_widget/src/engine/session.rs
//!
//! The session store: typed load/save operations over the raw durable
//! key/value port, plus the degradation rule for unavailable storage.
//!
//! Storage failure is never fatal here. A failed save is logged and
//! swallowed (the in-memory state stays authoritative for the page
//! lifetime); a failed load falls back to the type's default. This is what
//! turns "storage unavailable" into an ephemeral, assistant-only session
//! instead of an error.

use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use support_chat_core::domain::{Language, Message, TrackedEscalation};
use support_chat_core::ports::{SessionStorage, StorageKey};
use tracing::warn;
use uuid::Uuid;

pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self { storage }
    }

    /// Time-based prefix plus a random suffix, unique with overwhelmingly
    /// high probability.
    fn generate_session_id() -> String {
        format!(
            "sess-{}-{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple()
        )
    }

    /// Returns the persisted session identifier, creating and persisting one
    /// on first use. If storage is unavailable the identifier is ephemeral
    /// for the lifetime of the page.
    pub async fn get_or_create_session_id(&self) -> String {
        match self.storage.load(StorageKey::SessionId).await {
            Ok(Some(id)) => return id,
            Ok(None) => {}
            Err(e) => warn!("Session id load failed, using ephemeral id: {}", e),
        }

        let id = Self::generate_session_id();
        if let Err(e) = self.storage.store(StorageKey::SessionId, &id).await {
            warn!("Session id persist failed, id stays ephemeral: {}", e);
        }
        id
    }

    async fn load_json<T: serde::de::DeserializeOwned + Default>(&self, key: StorageKey) -> T {
        match self.storage.load(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(e) => {
                    warn!("Discarding undecodable value for {}: {}", key.as_str(), e);
                    T::default()
                }
            },
            Ok(None) => T::default(),
            Err(e) => {
                warn!("Load failed for {}, using default: {}", key.as_str(), e);
                T::default()
            }
        }
    }

    async fn save_json<T: serde::Serialize>(&self, key: StorageKey, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Serialization failed for {}: {}", key.as_str(), e);
                return;
            }
        };
        if let Err(e) = self.storage.store(key, &raw).await {
            warn!("Persist failed for {}, state stays in memory: {}", key.as_str(), e);
        }
    }

    /// Timestamps round-trip through RFC 3339 with fractional seconds, so
    /// millisecond ordering survives a reload.
    pub async fn load_timeline(&self) -> Vec<Message> {
        self.load_json(StorageKey::Timeline).await
    }

    pub async fn save_timeline(&self, messages: &[Message]) {
        self.save_json(StorageKey::Timeline, &messages).await;
    }

    pub async fn load_tracked(&self) -> Vec<TrackedEscalation> {
        self.load_json(StorageKey::TrackedEscalations).await
    }

    pub async fn save_tracked(&self, tracked: &[TrackedEscalation]) {
        self.save_json(StorageKey::TrackedEscalations, &tracked).await;
    }

    pub async fn load_csat_submitted(&self) -> HashSet<String> {
        self.load_json(StorageKey::CsatSubmitted).await
    }

    pub async fn save_csat_submitted(&self, submitted: &HashSet<String>) {
        // Persist in sorted order so the stored value is deterministic.
        let mut ids: Vec<&String> = submitted.iter().collect();
        ids.sort();
        self.save_json(StorageKey::CsatSubmitted, &ids).await;
    }

    pub async fn load_language(&self, default: Language) -> Language {
        match self.storage.load(StorageKey::Language).await {
            Ok(Some(raw)) => raw.parse().unwrap_or(default),
            Ok(None) => default,
            Err(e) => {
                warn!("Language load failed, using default: {}", e);
                default
            }
        }
    }

    pub async fn save_language(&self, language: Language) {
        if let Err(e) = self
            .storage
            .store(StorageKey::Language, language.as_str())
            .await
        {
            warn!("Language persist failed: {}", e);
        }
    }

    /// The keys a full session reset wipes. The language preference
    /// survives a reset.
    const RESET_KEYS: [StorageKey; 4] = [
        StorageKey::SessionId,
        StorageKey::Timeline,
        StorageKey::TrackedEscalations,
        StorageKey::CsatSubmitted,
    ];

    /// Wipes the session's persisted state and issues a fresh session
    /// identifier. Destructive and irreversible; the confirmation gate lives
    /// at the UI boundary, not here.
    pub async fn reset(&self) -> String {
        for key in Self::RESET_KEYS {
            if let Err(e) = self.storage.remove(key).await {
                warn!("Reset could not clear {}: {}", key.as_str(), e);
            }
        }

        let id = Self::generate_session_id();
        if let Err(e) = self.storage.store(StorageKey::SessionId, &id).await {
            warn!("Fresh session id persist failed: {}", e);
        }
        id
    }
}
