//! services/chat_widget/src/engine/survey.rs
//!
//! The survey gate: collects a 1-5 satisfaction rating at most once per
//! resolved escalation.

use crate::engine::send_task::csat_thanks;
use crate::engine::{ChatEngine, EngineEvent};
use crate::error::WidgetError;
use chrono::Utc;
use support_chat_core::domain::{CsatRating, Message, MessageOrigin};
use tracing::info;

/// Submits the rating to the backend.
///
/// The escalation id enters the submitted set only after backend
/// acknowledgment; a repeated submission for an already-rated escalation is
/// a silent no-op, which is what prevents concurrent duplicates.
pub(crate) async fn submit_csat(
    engine: &ChatEngine,
    escalation_id: &str,
    rating: u8,
    feedback: Option<String>,
) -> Result<(), WidgetError> {
    let rating = CsatRating::new(rating)
        .ok_or_else(|| WidgetError::Internal(format!("rating {} is outside 1-5", rating)))?;

    {
        let state = engine.state.lock().await;
        if state.csat_submitted.contains(escalation_id) {
            return Ok(());
        }
    }

    engine
        .backend
        .submit_csat(escalation_id, rating, feedback.as_deref())
        .await?;

    let thanks = {
        let mut state = engine.state.lock().await;
        state.csat_submitted.insert(escalation_id.to_string());
        engine.store.save_csat_submitted(&state.csat_submitted).await;

        let message = Message::new(csat_thanks(state.language), MessageOrigin::Assistant, Utc::now());
        state.timeline.append(message.clone());
        engine.store.save_timeline(state.timeline.messages()).await;
        message
    };

    info!("CSAT {} recorded for escalation {}.", rating.value(), escalation_id);
    engine.emit(EngineEvent::MessageAppended(thanks));
    Ok(())
}

/// Marks the prompt dismissed for this page lifetime. The id is not added to
/// the submitted set, so a later browsing session may prompt again.
pub(crate) async fn dismiss_survey(engine: &ChatEngine, escalation_id: &str) {
    let mut state = engine.state.lock().await;
    state.csat_dismissed.insert(escalation_id.to_string());
}
