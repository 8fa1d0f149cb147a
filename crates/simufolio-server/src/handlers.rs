//! HTTP Handlers
//!
//! Decodes Telegram webhook updates into typed chat events, runs the
//! engine, and exposes the bearer-authorized sweep trigger.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use simufolio_core::transport::Reply;
use simufolio_core::{CallbackAction, ChatEvent, ChatTransport, OwnerId};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Telegram update payload (only the fields we consume)
#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
    #[serde(default)]
    pub callback_query: Option<TelegramCallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub from: Option<TelegramUser>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramCallbackQuery {
    pub id: String,
    pub from: TelegramUser,
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct SweepResponse {
    pub status: &'static str,
    pub processed: usize,
    pub sent: usize,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Telegram webhook endpoint.
///
/// Always answers 200: Telegram retries non-2xx responses, and a reply
/// that failed to send is already logged; replaying the update would
/// not improve on that.
pub async fn telegram_webhook(
    State(state): State<AppState>,
    Json(update): Json<TelegramUpdate>,
) -> StatusCode {
    // Ack button presses first so the client spinner stops even when
    // the payload turns out to be unknown.
    if let Some(callback) = &update.callback_query {
        state.transport.answer_callback_query(&callback.id, None).await;
    }

    let Some((owner_id, event)) = decode_update(&update) else {
        return StatusCode::OK;
    };

    let reply = match state.engine.advance(&owner_id, event).await {
        Ok(reply) => reply,
        Err(err) => {
            error!(owner = %owner_id, error = %err, "engine error");
            Reply::text(err.user_message())
        }
    };

    if let Err(err) = state.transport.send(&owner_id, &reply).await {
        error!(owner = %owner_id, error = %err, "reply delivery failed");
    }

    StatusCode::OK
}

/// Notification sweep trigger, invoked by the periodic cron runner
pub async fn run_sweep(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SweepResponse>, (StatusCode, Json<ErrorResponse>)> {
    let expected = format!("Bearer {}", state.config.cron_secret);
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);

    if !authorized {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Invalid cron secret".into(),
                code: "UNAUTHORIZED".into(),
            }),
        ));
    }

    match state.scheduler.run_sweep(Utc::now()).await {
        Ok(report) => Ok(Json(SweepResponse {
            status: "success",
            processed: report.processed,
            sent: report.sent,
        })),
        Err(err) => {
            error!(error = %err, "sweep failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: err.to_string(),
                    code: "SWEEP_ERROR".into(),
                }),
            ))
        }
    }
}

/// Decode an update into an (owner, event) pair; `None` for update kinds
/// we do not handle
fn decode_update(update: &TelegramUpdate) -> Option<(OwnerId, ChatEvent)> {
    if let Some(message) = &update.message {
        let from = message.from.as_ref()?;
        let text = message.text.as_deref()?.trim();
        if text.is_empty() {
            return None;
        }

        let owner_id = OwnerId::new(from.id.to_string());
        let event = if text.starts_with("/start") {
            ChatEvent::Start
        } else {
            ChatEvent::FreeText(text.to_string())
        };
        return Some((owner_id, event));
    }

    if let Some(callback) = &update.callback_query {
        let payload = callback.data.as_deref()?;
        let action = match CallbackAction::parse(payload) {
            Ok(action) => action,
            Err(err) => {
                warn!(update = update.update_id, error = %err, "ignoring callback");
                return None;
            }
        };
        let owner_id = OwnerId::new(callback.from.id.to_string());
        return Some((owner_id, ChatEvent::Callback(action)));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(json: &str) -> Option<(OwnerId, ChatEvent)> {
        let update: TelegramUpdate = serde_json::from_str(json).unwrap();
        decode_update(&update)
    }

    #[test]
    fn test_start_command_decodes() {
        let (owner_id, event) = decode(
            r#"{"update_id": 1, "message": {"from": {"id": 42}, "text": "/start"}}"#,
        )
        .unwrap();

        assert_eq!(owner_id, OwnerId::new("42"));
        assert_eq!(event, ChatEvent::Start);
    }

    #[test]
    fn test_plain_text_decodes_as_free_text() {
        let (_, event) = decode(
            r#"{"update_id": 1, "message": {"from": {"id": 42}, "text": " 100.50 "}}"#,
        )
        .unwrap();

        assert_eq!(event, ChatEvent::FreeText("100.50".into()));
    }

    #[test]
    fn test_callback_decodes_as_typed_action() {
        let (owner_id, event) = decode(
            r#"{"update_id": 1, "callback_query": {"id": "cb1", "from": {"id": 7}, "data": "sim_coin:bitcoin"}}"#,
        )
        .unwrap();

        assert_eq!(owner_id, OwnerId::new("7"));
        assert_eq!(
            event,
            ChatEvent::Callback(CallbackAction::SelectAsset("bitcoin".into()))
        );
    }

    #[test]
    fn test_unknown_callback_is_ignored() {
        assert!(decode(
            r#"{"update_id": 1, "callback_query": {"id": "cb1", "from": {"id": 7}, "data": "bogus"}}"#,
        )
        .is_none());
    }

    #[test]
    fn test_non_text_updates_are_ignored() {
        assert!(decode(r#"{"update_id": 1}"#).is_none());
        assert!(decode(r#"{"update_id": 1, "message": {"from": {"id": 42}}}"#).is_none());
        assert!(decode(r#"{"update_id": 1, "message": {"text": "hi"}}"#).is_none());
        assert!(
            decode(r#"{"update_id": 1, "message": {"from": {"id": 42}, "text": "   "}}"#)
                .is_none()
        );
    }
}
