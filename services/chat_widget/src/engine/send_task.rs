//! services/chat_widget/src/engine/send_task.rs
//!
//! This module contains the dispatch router: the asynchronous worker logic
//! for one outgoing visitor message, deciding whether it is
//! assistant-directed or operator-directed.

use crate::engine::{ChatEngine, EngineEvent};
use chrono::Utc;
use std::sync::Arc;
use support_chat_core::domain::{
    HistoryEntry, Language, Message, MessageOrigin, ToolOutcome, TrackedEscalation,
};
use tracing::{info, warn};

//=========================================================================================
// Localized synthetic messages (ru/kz, matching the backend's bilingual surface)
//=========================================================================================

/// Appended after a successful operator-directed send instead of waiting for
/// a real assistant reply.
pub(crate) fn operator_ack(language: Language) -> &'static str {
    match language {
        Language::Ru => "Ваше сообщение передано оператору. Ожидайте ответа.",
        Language::Kz => "Сіздің хабарламаңыз операторға жіберілді. Жауапты күтіңіз.",
    }
}

/// Appended when a send fails; the visitor's own message stays in the
/// timeline regardless.
pub(crate) fn send_failure(language: Language) -> &'static str {
    match language {
        Language::Ru => {
            "Извините, произошла ошибка при отправке сообщения. Попробуйте ещё раз позже."
        }
        Language::Kz => {
            "Кешіріңіз, хабарламаны жіберу кезінде қате пайда болды. Кейінірек қайталап көріңіз."
        }
    }
}

/// Appended after the backend acknowledges a CSAT submission.
pub(crate) fn csat_thanks(language: Language) -> &'static str {
    match language {
        Language::Ru => "Спасибо за вашу оценку! Обращение закрыто.",
        Language::Kz => "Бағалағаныңызға рахмет! Өтініш жабылды.",
    }
}

//=========================================================================================
// The dispatch router
//=========================================================================================

/// Handles one outgoing visitor message end to end.
///
/// Policy: if any tracked escalation is not yet resolved, the message is
/// human-directed and goes to the earliest-created one; otherwise it goes to
/// the assistant. Every outcome is appended to the timeline; nothing is
/// rolled back on failure.
pub(crate) async fn send_visitor_message(engine: &Arc<ChatEngine>, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }

    // Append the visitor message and capture the routing decision in one
    // lock scope. The history snapshot excludes the new message: the backend
    // receives it separately as the current message.
    let (language, active_escalation, history) = {
        let mut state = engine.state.lock().await;
        let history = state.history();
        let active_escalation = state
            .active_escalation()
            .map(|t| t.escalation_id.clone());

        let message = Message::new(text, MessageOrigin::Visitor, Utc::now());
        state.timeline.append(message.clone());
        engine.store.save_timeline(state.timeline.messages()).await;
        engine.emit(EngineEvent::MessageAppended(message));

        (state.language, active_escalation, history)
    };

    match active_escalation {
        Some(escalation_id) => {
            send_to_operator(engine, &escalation_id, text, language).await;
        }
        None => {
            send_to_assistant(engine, text, history, language).await;
        }
    }
}

async fn send_to_operator(
    engine: &Arc<ChatEngine>,
    escalation_id: &str,
    text: &str,
    language: Language,
) {
    info!("Routing visitor message to escalation {}.", escalation_id);

    let reply = match engine
        .backend
        .send_escalation_message(escalation_id, text)
        .await
    {
        Ok(()) => operator_ack(language),
        Err(e) => {
            warn!("Operator-directed send failed for {}: {}", escalation_id, e);
            send_failure(language)
        }
    };

    let mut state = engine.state.lock().await;
    let message = Message::new(reply, MessageOrigin::Assistant, Utc::now());
    state.timeline.append(message.clone());
    engine.store.save_timeline(state.timeline.messages()).await;
    engine.emit(EngineEvent::MessageAppended(message));
}

async fn send_to_assistant(
    engine: &Arc<ChatEngine>,
    text: &str,
    history: Vec<HistoryEntry>,
    language: Language,
) {
    let reply = match engine
        .backend
        .send_assistant_message(text, &history, language, None)
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            warn!("Assistant-directed send failed: {}", e);
            let mut state = engine.state.lock().await;
            let message = Message::new(send_failure(language), MessageOrigin::Assistant, Utc::now());
            state.timeline.append(message.clone());
            engine.store.save_timeline(state.timeline.messages()).await;
            engine.emit(EngineEvent::MessageAppended(message));
            return;
        }
    };

    // Appending the reply and starting to track a tool-created escalation
    // must happen atomically, in one lock scope.
    let started_tracking = {
        let mut state = engine.state.lock().await;

        let mut message = Message::new(reply.text.clone(), MessageOrigin::Assistant, Utc::now());
        message.sources = reply.sources.clone();
        message.auto_resolved = reply.can_auto_resolve.then_some(true);
        message.tool_result = reply.tool_call.clone();
        state.timeline.append(message.clone());
        engine.store.save_timeline(state.timeline.messages()).await;
        engine.emit(EngineEvent::MessageAppended(message));

        let handoff = match &reply.tool_call {
            Some(ToolOutcome::Escalate {
                escalation_id,
                department_name,
                priority,
            }) => Some((escalation_id, department_name, priority)),
            Some(ToolOutcome::CreateTicket {
                ticket_number,
                department_name,
                priority,
            }) => Some((ticket_number, department_name, priority)),
            _ => None,
        };

        let mut started = false;
        if let Some((tracking_id, department_name, priority)) = handoff {
            let already = state.tracked.iter().any(|t| t.escalation_id == *tracking_id);
            if !already {
                info!("Assistant tool call created escalation {}.", tracking_id);
                state.tracked.push(TrackedEscalation::new(
                    tracking_id.clone(),
                    department_name.clone(),
                    priority.clone(),
                    Utc::now(),
                ));
                engine.store.save_tracked(&state.tracked).await;
                started = true;
            }
        }
        started
    };

    if started_tracking {
        engine.ensure_poller();
    }
}
