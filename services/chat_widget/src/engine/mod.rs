//! services/chat_widget/src/engine/mod.rs
//!
//! The conversational escalation session engine: one durable, resumable
//! conversation that multiplexes the assistant, human operators and the
//! visitor into a single ordered timeline, tracks escalations through their
//! lifecycle, polls for operator activity and gates the satisfaction survey.

pub mod poll_task;
pub mod protocol;
pub mod send_task;
pub mod session;
pub mod survey;

pub use protocol::EngineEvent;
pub use session::SessionStore;

use crate::adapters::{FileStorageAdapter, HttpBackendAdapter};
use crate::config::Config;
use crate::error::WidgetError;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use support_chat_core::domain::{
    HistoryEntry, Language, Message, MessageOrigin, TrackedEscalation,
};
use support_chat_core::ports::{PortResult, SessionStorage, SupportBackend};
use support_chat_core::timeline::{merge_transcript, Timeline};
use tokio::sync::{mpsc, Mutex};
use tracing::info;

//=========================================================================================
// EngineState (everything behind the single-writer lock)
//=========================================================================================

/// The engine's mutable state. One `Mutex` guards all of it, which is the
/// single-writer discipline the timeline requires: poller appends and send
/// appends can never interleave partially.
pub(crate) struct EngineState {
    pub timeline: Timeline,
    /// Insertion order == escalation creation order. The first unresolved
    /// entry is the active escalation for routing.
    pub tracked: Vec<TrackedEscalation>,
    pub csat_submitted: HashSet<String>,
    /// Survey prompts dismissed without a rating. Page-lifetime only, never
    /// persisted; a full reset wipes it with everything else.
    pub csat_dismissed: HashSet<String>,
    pub language: Language,
}

impl EngineState {
    /// First-escalated-first-served: the earliest-created escalation that is
    /// not yet resolved receives outgoing visitor messages.
    pub fn active_escalation(&self) -> Option<&TrackedEscalation> {
        self.tracked.iter().find(|t| !t.status.is_terminal())
    }

    /// The conversation so far, in the backend's transcript format.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.timeline
            .ordered()
            .into_iter()
            .map(|m| HistoryEntry {
                content: m.content,
                is_user: m.origin == MessageOrigin::Visitor,
                is_operator: m.origin == MessageOrigin::Operator,
            })
            .collect()
    }
}

//=========================================================================================
// ChatEngine
//=========================================================================================

/// The widget-resident engine. Create one per browsing context with
/// [`ChatEngine::start`] and keep it behind an `Arc`.
pub struct ChatEngine {
    pub(crate) state: Mutex<EngineState>,
    pub(crate) backend: Arc<dyn SupportBackend>,
    pub(crate) store: SessionStore,
    session_id: StdMutex<String>,
    pub(crate) events: mpsc::UnboundedSender<EngineEvent>,
    poller: StdMutex<Option<poll_task::PollerHandle>>,
    poller_generation: AtomicU64,
    pub(crate) poll_interval: Duration,
}

impl ChatEngine {
    /// Restores persisted state and builds the engine. If the restored
    /// tracked set still has unresolved escalations, polling resumes
    /// immediately (with one immediate check).
    pub async fn start(
        config: &Config,
        backend: Arc<dyn SupportBackend>,
        storage: Arc<dyn SessionStorage>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<EngineEvent>) {
        let store = SessionStore::new(storage);
        let session_id = store.get_or_create_session_id().await;
        let timeline = Timeline::from_messages(store.load_timeline().await);
        let tracked = store.load_tracked().await;
        let csat_submitted = store.load_csat_submitted().await;
        let language = store.load_language(config.default_language).await;

        info!(
            "Session {} restored: {} messages, {} tracked escalations.",
            session_id,
            timeline.len(),
            tracked.len()
        );

        let (events, receiver) = mpsc::unbounded_channel();
        let engine = Arc::new(Self {
            state: Mutex::new(EngineState {
                timeline,
                tracked,
                csat_submitted,
                csat_dismissed: HashSet::new(),
                language,
            }),
            backend,
            store,
            session_id: StdMutex::new(session_id),
            events,
            poller: StdMutex::new(None),
            poller_generation: AtomicU64::new(0),
            poll_interval: config.poll_interval,
        });

        if engine.state.lock().await.active_escalation().is_some() {
            engine.ensure_poller();
        }

        (engine, receiver)
    }

    /// Convenience constructor wiring the default adapters (JSON/HTTP
    /// backend, file-backed storage) from configuration.
    pub async fn from_config(
        config: &Config,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<EngineEvent>), WidgetError> {
        let backend = Arc::new(HttpBackendAdapter::new(
            reqwest::Client::new(),
            config.backend_url.clone(),
        ));
        let storage = Arc::new(FileStorageAdapter::new(&config.storage_dir));
        Ok(Self::start(config, backend, storage).await)
    }

    pub fn session_id(&self) -> String {
        self.session_id.lock().unwrap().clone()
    }

    pub async fn language(&self) -> Language {
        self.state.lock().await.language
    }

    pub async fn set_language(&self, language: Language) {
        {
            let mut state = self.state.lock().await;
            state.language = language;
        }
        self.store.save_language(language).await;
    }

    /// The render view: all messages ordered by `created_at`, ties in
    /// arrival order. Recomputable at any time purely from engine state.
    pub async fn timeline(&self) -> Vec<Message> {
        self.state.lock().await.timeline.ordered()
    }

    /// The escalations currently under active tracking, in creation order.
    pub async fn tracked_escalations(&self) -> Vec<TrackedEscalation> {
        self.state.lock().await.tracked.clone()
    }

    /// Routes one outgoing visitor message to the assistant or to the active
    /// escalation. All outcomes (including failures) surface as timeline
    /// entries, never as errors.
    pub async fn send_visitor_message(self: &Arc<Self>, text: &str) {
        send_task::send_visitor_message(self, text).await;
    }

    /// Starts tracking a human-handoff unit. This is the entry point for
    /// the ticket-form path; the assistant tool-call path goes through
    /// `send_visitor_message`.
    pub async fn begin_tracking(self: &Arc<Self>, escalation: TrackedEscalation) {
        {
            let mut state = self.state.lock().await;
            if state
                .tracked
                .iter()
                .any(|t| t.escalation_id == escalation.escalation_id)
            {
                return;
            }
            info!("Tracking escalation {}.", escalation.escalation_id);
            state.tracked.push(escalation);
            self.store.save_tracked(&state.tracked).await;
        }
        self.ensure_poller();
    }

    /// Runs one full poll cycle for every tracked escalation. The timer
    /// drives this; it is public so hosts and tests can force a check.
    pub async fn poll_once(&self) {
        poll_task::poll_once(self).await;
    }

    /// The unified operator-facing transcript for one escalation:
    /// pre-escalation snapshot entries merged with live messages.
    pub async fn escalation_transcript(&self, escalation_id: &str) -> PortResult<Vec<Message>> {
        let snapshot = self.backend.fetch_escalation(escalation_id).await?;
        Ok(merge_transcript(&snapshot))
    }

    /// Submits a satisfaction rating for a resolved escalation. At most one
    /// submission per escalation per session lifetime.
    pub async fn submit_csat(
        &self,
        escalation_id: &str,
        rating: u8,
        feedback: Option<String>,
    ) -> Result<(), WidgetError> {
        survey::submit_csat(self, escalation_id, rating, feedback).await
    }

    /// Records that the visitor closed the survey prompt without rating.
    /// The same escalation will not re-prompt within this page lifetime.
    pub async fn dismiss_survey(&self, escalation_id: &str) {
        survey::dismiss_survey(self, escalation_id).await;
    }

    /// Destroys the session wholesale: cancels polling, wipes the timeline,
    /// tracked set and CSAT state, and issues a fresh session identifier.
    pub async fn reset_session(&self) -> String {
        if let Some(handle) = self.poller.lock().unwrap().take() {
            handle.cancel();
        }

        let new_id = {
            let mut state = self.state.lock().await;
            state.timeline = Timeline::new();
            state.tracked.clear();
            state.csat_submitted.clear();
            state.csat_dismissed.clear();

            let new_id = self.store.reset().await;
            *self.session_id.lock().unwrap() = new_id.clone();
            new_id
        };

        info!("Session reset, new id {}.", new_id);
        self.emit(EngineEvent::SessionReset {
            session_id: new_id.clone(),
        });
        new_id
    }

    /// Spawns the poller when it is not already running. Poller lifecycle is
    /// a pure function of the tracked set: `begin_tracking` calls this, and
    /// the loop exits on its own once the set drains.
    pub(crate) fn ensure_poller(self: &Arc<Self>) {
        let mut slot = self.poller.lock().unwrap();
        let running = slot.as_ref().is_some_and(|h| !h.is_finished());
        if !running {
            let generation = self.poller_generation.fetch_add(1, Ordering::Relaxed) + 1;
            *slot = Some(poll_task::spawn(
                self.clone(),
                self.poll_interval,
                generation,
            ));
        }
    }

    /// Clears the slot only when it still holds the exiting task's own
    /// handle. After a reset took the old handle out and a new poller was
    /// spawned, the old task's late exit must not touch the new handle.
    pub(crate) fn clear_poller_slot(&self, generation: u64) {
        if let Ok(mut slot) = self.poller.lock() {
            if slot.as_ref().is_some_and(|h| h.generation() == generation) {
                *slot = None;
            }
        }
    }

    /// Events are advisory; a dropped receiver is not an error.
    pub(crate) fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }
}
