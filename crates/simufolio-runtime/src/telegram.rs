//! Telegram Chat Transport
//!
//! Delivers replies straight through the Bot API with plain HTTP calls;
//! the same path serves wizard replies and sweep notifications.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::warn;

use simufolio_core::error::{Result, SimError};
use simufolio_core::model::OwnerId;
use simufolio_core::transport::{ChatTransport, InlineKeyboard, Reply};

const TG_API_BASE: &str = "https://api.telegram.org";

/// Telegram client configuration
#[derive(Clone, Debug)]
pub struct TelegramConfig {
    /// Bot API token
    pub bot_token: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            timeout_secs: 10,
        }
    }

    pub fn from_env() -> Result<Self> {
        let bot_token = std::env::var("TG_BOT_API_KEY")
            .map_err(|_| SimError::Transport("TG_BOT_API_KEY is unset".into()))?;
        Ok(Self::new(bot_token))
    }
}

/// Telegram Bot API transport
pub struct TelegramTransport {
    client: Client,
    config: TelegramConfig,
}

impl TelegramTransport {
    /// Create from configuration
    pub fn from_config(config: TelegramConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SimError::Transport(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(TelegramConfig::from_env()?)
    }

    fn method_url(&self, method: &str) -> String {
        format!("{TG_API_BASE}/bot{}/{method}", self.config.bot_token)
    }

    /// Acknowledge a button press so the client stops its spinner.
    /// Failures are logged, not propagated: a missed ack only leaves the
    /// spinner running a little longer.
    pub async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) {
        let mut payload = json!({ "callback_query_id": callback_id });
        if let Some(text) = text {
            payload["text"] = json!(text);
        }

        let result = self
            .client
            .post(self.method_url("answerCallbackQuery"))
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(response) if !response.status().is_success() => {
                warn!(status = %response.status(), "callback ack rejected");
            }
            Err(err) => warn!(error = %err, "callback ack failed"),
            _ => {}
        }
    }
}

/// Inline keyboard in Bot API JSON shape, skipping empty rows
fn render_keyboard(keyboard: &InlineKeyboard) -> Value {
    let rows: Vec<Value> = keyboard
        .rows
        .iter()
        .filter(|row| !row.is_empty())
        .map(|row| {
            row.iter()
                .map(|button| {
                    json!({
                        "text": button.label,
                        "callback_data": button.action.to_payload(),
                    })
                })
                .collect()
        })
        .collect();

    json!({ "inline_keyboard": rows })
}

fn reply_markup(reply: &Reply) -> Option<Value> {
    if let Some(keyboard) = &reply.keyboard {
        Some(render_keyboard(keyboard))
    } else if reply.force_reply {
        Some(json!({ "force_reply": true, "selective": true }))
    } else {
        None
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send(&self, owner_id: &OwnerId, reply: &Reply) -> Result<()> {
        let mut payload = json!({
            "chat_id": owner_id.as_str(),
            "text": reply.text,
            "parse_mode": "HTML",
        });
        if let Some(markup) = reply_markup(reply) {
            payload["reply_markup"] = markup;
        }

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| SimError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SimError::Transport(format!(
                "sendMessage failed with {status}: {body}"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simufolio_core::event::CallbackAction;

    #[test]
    fn test_render_keyboard_skips_empty_rows() {
        let keyboard = InlineKeyboard::new()
            .button("🚀 Start", CallbackAction::StartSimulation)
            .row()
            .button("📊 View", CallbackAction::ViewSubscriptions)
            .row();

        let rendered = render_keyboard(&keyboard);
        let rows = rendered["inline_keyboard"].as_array().unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0]["text"], "🚀 Start");
        assert_eq!(rows[0][0]["callback_data"], "start_sim");
        assert_eq!(rows[1][0]["callback_data"], "view_subs");
    }

    #[test]
    fn test_force_reply_markup() {
        let markup = reply_markup(&Reply::text("amount?").with_force_reply()).unwrap();
        assert_eq!(markup["force_reply"], true);
        assert_eq!(markup["selective"], true);
    }

    #[test]
    fn test_plain_reply_has_no_markup() {
        assert!(reply_markup(&Reply::text("hi")).is_none());
    }

    #[test]
    fn test_keyboard_takes_precedence_over_force_reply() {
        let reply = Reply::text("pick")
            .with_keyboard(InlineKeyboard::new().button("Back", CallbackAction::BackToMain))
            .with_force_reply();
        let markup = reply_markup(&reply).unwrap();
        assert!(markup.get("inline_keyboard").is_some());
    }
}
