//! services/chat_widget/src/adapters/http_backend.rs
//!
//! This module contains the adapter for the help-desk backend's JSON/HTTP
//! API. It implements the `SupportBackend` port from the `core` crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use support_chat_core::domain::{
    AssistantReply, CsatRating, EscalationSnapshot, EscalationStatus, HistoryEntry, KbSource,
    Language, TimedMessage, ToolOutcome,
};
use support_chat_core::ports::{PortError, PortResult, SupportBackend};
use tracing::warn;

//=========================================================================================
// Wire DTOs (field names follow the backend's snake_case JSON)
//=========================================================================================

#[derive(Serialize)]
struct ChatRequestDto<'a> {
    message: &'a str,
    conversation_history: &'a [HistoryEntry],
    language: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    active_escalation_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct ChatResponseDto {
    response: String,
    #[serde(default)]
    sources: Vec<KbSource>,
    #[serde(default)]
    can_auto_resolve: bool,
    #[serde(default)]
    suggested_priority: Option<String>,
    #[serde(default)]
    tool_call: Option<ToolCallDto>,
}

#[derive(Deserialize)]
struct ToolCallDto {
    name: String,
    result: serde_json::Value,
}

#[derive(Serialize)]
struct EscalationMessageDto<'a> {
    message: &'a str,
}

#[derive(Deserialize)]
struct AckDto {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct EscalationDto {
    escalation_id: String,
    status: EscalationStatus,
    #[serde(default)]
    department_name: String,
    #[serde(default = "default_priority")]
    priority: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    operator_messages: Vec<TimedMessage>,
    #[serde(default)]
    client_messages: Vec<TimedMessage>,
    #[serde(default)]
    conversation_history: Vec<HistoryEntry>,
}

fn default_priority() -> String {
    "medium".to_string()
}

#[derive(Serialize)]
struct CsatRequestDto<'a> {
    rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    feedback: Option<&'a str>,
}

impl ToolCallDto {
    /// Maps the backend's loosely-typed tool-call payload onto the core enum.
    /// Unknown tool names are dropped with a warning rather than failing the
    /// whole reply: the assistant text is still useful without them.
    fn into_outcome(self) -> Option<ToolOutcome> {
        let result = self.result;
        let text = |key: &str| -> Option<String> {
            result.get(key).and_then(|v| v.as_str()).map(str::to_string)
        };
        match self.name.as_str() {
            "escalate_to_operator" => Some(ToolOutcome::Escalate {
                escalation_id: text("escalation_id")?,
                department_name: text("department_name").unwrap_or_default(),
                priority: text("priority").unwrap_or_else(default_priority),
            }),
            "create_ticket" => Some(ToolOutcome::CreateTicket {
                ticket_number: text("ticket_number")?,
                department_name: text("department_name").unwrap_or_default(),
                priority: text("priority").unwrap_or_else(default_priority),
            }),
            "check_status" => Some(ToolOutcome::CheckStatus {
                escalation_id: text("escalation_id")?,
                status: text("status"),
            }),
            other => {
                warn!("Ignoring unknown tool call '{}' in assistant reply.", other);
                None
            }
        }
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `SupportBackend` over the help-desk backend's
/// JSON/HTTP API.
#[derive(Clone)]
pub struct HttpBackendAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackendAdapter {
    /// Creates a new `HttpBackendAdapter`. `base_url` must not end with a
    /// trailing slash.
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Treats any non-2xx status or undecodable body as a transport failure, so
/// the caller retries on the next cycle instead of surfacing a partial state.
async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> PortResult<T> {
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(PortError::NotFound("backend returned 404".to_string()));
    }
    if !status.is_success() {
        return Err(PortError::Unexpected(format!(
            "backend returned status {}",
            status
        )));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| PortError::Unexpected(format!("malformed backend payload: {}", e)))
}

//=========================================================================================
// `SupportBackend` Trait Implementation
//=========================================================================================

#[async_trait]
impl SupportBackend for HttpBackendAdapter {
    async fn send_assistant_message(
        &self,
        text: &str,
        history: &[HistoryEntry],
        language: Language,
        active_escalation_id: Option<&str>,
    ) -> PortResult<AssistantReply> {
        let request = ChatRequestDto {
            message: text,
            conversation_history: history,
            language: language.as_str(),
            active_escalation_id,
        };

        let response = self
            .client
            .post(self.url("/chat"))
            .json(&request)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let dto: ChatResponseDto = decode(response).await?;
        Ok(AssistantReply {
            text: dto.response,
            sources: dto.sources,
            can_auto_resolve: dto.can_auto_resolve,
            suggested_priority: dto.suggested_priority,
            tool_call: dto.tool_call.and_then(ToolCallDto::into_outcome),
        })
    }

    async fn send_escalation_message(&self, escalation_id: &str, text: &str) -> PortResult<()> {
        let response = self
            .client
            .post(self.url(&format!("/chat/escalations/{}/messages", escalation_id)))
            .json(&EscalationMessageDto { message: text })
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let ack: AckDto = decode(response).await?;
        if !ack.success {
            return Err(PortError::Unexpected(
                ack.error
                    .unwrap_or_else(|| "backend rejected escalation message".to_string()),
            ));
        }
        Ok(())
    }

    async fn fetch_escalation(&self, escalation_id: &str) -> PortResult<EscalationSnapshot> {
        let response = self
            .client
            .get(self.url(&format!("/chat/escalations/{}", escalation_id)))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let dto: EscalationDto = decode(response).await?;
        Ok(EscalationSnapshot {
            escalation_id: dto.escalation_id,
            status: dto.status,
            department_name: dto.department_name,
            priority: dto.priority,
            created_at: dto.created_at,
            operator_messages: dto.operator_messages,
            client_messages: dto.client_messages,
            conversation_history: dto.conversation_history,
        })
    }

    async fn submit_csat(
        &self,
        escalation_id: &str,
        rating: CsatRating,
        feedback: Option<&str>,
    ) -> PortResult<()> {
        let response = self
            .client
            .post(self.url(&format!("/chat/escalations/{}/csat", escalation_id)))
            .json(&CsatRequestDto {
                rating: rating.value(),
                feedback,
            })
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let ack: AckDto = decode(response).await?;
        if !ack.success {
            return Err(PortError::Unexpected(
                ack.error
                    .unwrap_or_else(|| "backend rejected CSAT submission".to_string()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_call_maps_escalate() {
        let dto = ToolCallDto {
            name: "escalate_to_operator".into(),
            result: json!({
                "escalation_id": "ESC-1",
                "department_name": "IT Поддержка",
                "priority": "high",
            }),
        };
        assert_eq!(
            dto.into_outcome(),
            Some(ToolOutcome::Escalate {
                escalation_id: "ESC-1".into(),
                department_name: "IT Поддержка".into(),
                priority: "high".into(),
            })
        );
    }

    #[test]
    fn tool_call_maps_create_ticket_with_defaults() {
        let dto = ToolCallDto {
            name: "create_ticket".into(),
            result: json!({ "ticket_number": "TK-42" }),
        };
        assert_eq!(
            dto.into_outcome(),
            Some(ToolOutcome::CreateTicket {
                ticket_number: "TK-42".into(),
                department_name: String::new(),
                priority: "medium".into(),
            })
        );
    }

    #[test]
    fn unknown_tool_call_is_dropped() {
        let dto = ToolCallDto {
            name: "summon_manager".into(),
            result: json!({}),
        };
        assert_eq!(dto.into_outcome(), None);
    }

    #[test]
    fn escalate_without_id_is_dropped() {
        let dto = ToolCallDto {
            name: "escalate_to_operator".into(),
            result: json!({ "priority": "low" }),
        };
        assert_eq!(dto.into_outcome(), None);
    }
}
