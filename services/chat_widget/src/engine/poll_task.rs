//! services/chat_widget/src/engine/poll_task.rs
//!
//! This module contains the response poller: a cancellable recurring task
//! that bridges the gap between visitor-side state and backend-side operator
//! activity without a persistent connection.

use crate::engine::{ChatEngine, EngineEvent};
use std::sync::Arc;
use std::time::Duration;
use support_chat_core::domain::{EscalationSnapshot, Message, MessageOrigin};
use support_chat_core::ports::PortError;
use support_chat_core::timeline::operator_message_id;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Handle to the running poller task. The generation ties the handle to the
/// task that owns it, so an old task exiting late cannot clear a newer
/// task's slot.
pub(crate) struct PollerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    generation: u64,
}

impl PollerHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Spawns the polling loop.
///
/// The first tick fires immediately (the immediate check when tracking
/// starts). Each cycle runs inline in the loop; if a cycle is still
/// outstanding when the next tick is due, that tick is skipped
/// (`MissedTickBehavior::Skip`), so concurrent cycles are bounded at one.
/// The loop exits on cancellation or once the tracked set drains.
pub(crate) fn spawn(engine: Arc<ChatEngine>, interval: Duration, generation: u64) -> PollerHandle {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        info!("Response poller started.");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let cancelled = loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("Response poller cancelled.");
                    break true;
                }
                _ = ticker.tick() => {
                    poll_once(&engine).await;
                    if engine.state.lock().await.active_escalation().is_none() {
                        info!("No tracked escalations left, poller stopping.");
                        break false;
                    }
                }
            }
        };

        engine.clear_poller_slot(generation);
        // An escalation tracked between the empty-set check above and the
        // slot clear would otherwise go unpolled: its `ensure_poller` call
        // saw this task still running and spawned nothing.
        if !cancelled && engine.state.lock().await.active_escalation().is_some() {
            engine.ensure_poller();
        }
    });

    PollerHandle {
        cancel,
        task,
        generation,
    }
}

/// One full poll cycle.
///
/// Fetches every tracked escalation concurrently, then applies all deltas
/// under the single state lock: operator messages beyond the last-seen index
/// are appended (stamped with the backend timestamp), status changes are
/// recorded, and resolved escalations leave the tracked set and hand off to
/// the survey gate. A failed fetch for one escalation is logged and skipped;
/// it changes no local state.
pub(crate) async fn poll_once(engine: &ChatEngine) {
    let tracked_ids: Vec<String> = {
        let state = engine.state.lock().await;
        state
            .tracked
            .iter()
            .map(|t| t.escalation_id.clone())
            .collect()
    };
    if tracked_ids.is_empty() {
        return;
    }

    let fetches = tracked_ids
        .iter()
        .map(|id| engine.backend.fetch_escalation(id));
    let results: Vec<Result<EscalationSnapshot, PortError>> =
        futures::future::join_all(fetches).await;

    let mut events: Vec<EngineEvent> = Vec::new();
    {
        let mut state = engine.state.lock().await;
        let mut timeline_dirty = false;
        let mut tracked_dirty = false;

        for (escalation_id, result) in tracked_ids.iter().zip(results) {
            let snapshot = match result {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    // Fail-safe: assume no change occurred, retry next tick.
                    warn!("Poll cycle failed for escalation {}: {}", escalation_id, e);
                    continue;
                }
            };

            // Split borrow: the timeline and the tracked list are mutated
            // together under the one lock.
            let crate::engine::EngineState {
                timeline,
                tracked,
                csat_submitted,
                csat_dismissed,
                ..
            } = &mut *state;
            let Some(entry) = tracked
                .iter_mut()
                .find(|t| &t.escalation_id == escalation_id)
            else {
                continue;
            };

            // Append only the delta beyond the last-seen index. The
            // deterministic message id makes this idempotent even if the
            // high-water mark was lost.
            for (index, operator_message) in snapshot
                .operator_messages
                .iter()
                .enumerate()
                .skip(entry.seen_operator_messages)
            {
                let mut message = Message::new(
                    operator_message.content.clone(),
                    MessageOrigin::Operator,
                    operator_message.timestamp,
                );
                message.id = operator_message_id(escalation_id, index);
                if timeline.append(message.clone()) {
                    events.push(EngineEvent::MessageAppended(message));
                    timeline_dirty = true;
                }
            }
            if snapshot.operator_messages.len() > entry.seen_operator_messages {
                entry.seen_operator_messages = snapshot.operator_messages.len();
                tracked_dirty = true;
            }

            if snapshot.status != entry.status {
                info!(
                    "Escalation {} moved to {:?}.",
                    escalation_id, snapshot.status
                );
                entry.status = snapshot.status;
                tracked_dirty = true;
                events.push(EngineEvent::EscalationStatusChanged {
                    escalation_id: escalation_id.clone(),
                    status: snapshot.status,
                });
            }

            if entry.status.is_terminal() {
                let rated = csat_submitted.contains(escalation_id);
                let dismissed = csat_dismissed.contains(escalation_id);
                if !rated && !dismissed {
                    events.push(EngineEvent::SurveyRequested {
                        escalation_id: escalation_id.clone(),
                    });
                }
            }
        }

        // Resolution is terminal: resolved escalations leave the polled set.
        let before = state.tracked.len();
        state.tracked.retain(|t| !t.status.is_terminal());
        if state.tracked.len() != before {
            tracked_dirty = true;
        }

        if timeline_dirty {
            engine.store.save_timeline(state.timeline.messages()).await;
        }
        if tracked_dirty {
            engine.store.save_tracked(&state.tracked).await;
        }
    }

    for event in events {
        engine.emit(event);
    }
}
