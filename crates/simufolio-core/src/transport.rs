//! Chat Transport
//!
//! Outgoing reply types and the delivery trait. The engine and scheduler
//! only build `Reply` values; rendering them onto a concrete chat API is
//! the transport implementation's concern.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use crate::error::{Result, SimError};
use crate::event::CallbackAction;
use crate::model::OwnerId;

/// One inline-keyboard button
#[derive(Clone, Debug, PartialEq)]
pub struct KeyboardButton {
    pub label: String,
    pub action: CallbackAction,
}

/// Button grid attached to a reply
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<KeyboardButton>>,
}

impl InlineKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a button to the current row
    pub fn button(mut self, label: impl Into<String>, action: CallbackAction) -> Self {
        let button = KeyboardButton {
            label: label.into(),
            action,
        };
        if let Some(row) = self.rows.last_mut() {
            row.push(button);
        } else {
            self.rows.push(vec![button]);
        }
        self
    }

    /// Start a new row
    pub fn row(mut self) -> Self {
        self.rows.push(Vec::new());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(Vec::is_empty)
    }

    /// All buttons in reading order
    pub fn buttons(&self) -> impl Iterator<Item = &KeyboardButton> {
        self.rows.iter().flatten()
    }
}

/// An outgoing chat message (HTML text plus affordances)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<InlineKeyboard>,

    /// Ask the client to reply directly to this message
    pub force_reply: bool,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_keyboard(mut self, keyboard: InlineKeyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    pub fn with_force_reply(mut self) -> Self {
        self.force_reply = true;
        self
    }
}

/// Escape user-controlled text for HTML message bodies
pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Message delivery trait
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, owner_id: &OwnerId, reply: &Reply) -> Result<()>;
}

/// Captures outgoing messages instead of delivering them (for
/// development/testing); can be switched into a failing mode
pub struct RecordingTransport {
    sent: Mutex<Vec<(OwnerId, Reply)>>,
    failing: AtomicBool,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every subsequent send fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<(OwnerId, Reply)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send(&self, owner_id: &OwnerId, reply: &Reply) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SimError::Transport("recording transport set to fail".into()));
        }
        self.sent.lock().await.push((owner_id.clone(), reply.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyboard_rows() {
        let keyboard = InlineKeyboard::new()
            .button("Hourly", CallbackAction::StartSimulation)
            .button("Daily", CallbackAction::ViewSubscriptions)
            .row()
            .button("Monthly", CallbackAction::BackToMain);

        assert_eq!(keyboard.rows.len(), 2);
        assert_eq!(keyboard.rows[0].len(), 2);
        assert_eq!(keyboard.rows[1].len(), 1);
        assert_eq!(keyboard.buttons().count(), 3);
        assert!(!keyboard.is_empty());
    }

    #[test]
    fn test_trailing_row_is_empty_keyboard_safe() {
        let keyboard = InlineKeyboard::new()
            .button("Back", CallbackAction::BackToMain)
            .row();

        assert_eq!(keyboard.buttons().count(), 1);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a < b & c > d"), "a &lt; b &amp; c &gt; d");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[tokio::test]
    async fn test_recording_transport_failure_mode() {
        let transport = RecordingTransport::new();
        let owner = OwnerId::new("42");

        transport.send(&owner, &Reply::text("hi")).await.unwrap();

        transport.set_failing(true);
        assert!(transport.send(&owner, &Reply::text("lost")).await.is_err());

        let sent = transport.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.text, "hi");
    }
}
