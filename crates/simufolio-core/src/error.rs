//! Error Types

use thiserror::Error;

/// Result type alias for simulation operations
pub type Result<T> = std::result::Result<T, SimError>;

/// Error taxonomy for the simulation core
#[derive(Error, Debug)]
pub enum SimError {
    /// Asset unknown to the market data provider
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// Subscription absent from the store
    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),

    /// Malformed user input (amount, interval, callback payload)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Market data provider failed or timed out
    #[error("Market data unavailable: {0}")]
    Upstream(String),

    /// Store read/write failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Event arrived with no matching conversation state
    #[error("No active session for this step")]
    StaleSession,

    /// Chat delivery failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl SimError {
    /// Check if the failure is expected to clear up on its own
    pub fn is_retryable(&self) -> bool {
        matches!(self, SimError::Upstream(_) | SimError::Transport(_))
    }

    /// Convert to a user-facing chat message
    pub fn user_message(&self) -> String {
        match self {
            SimError::AssetNotFound(_) => {
                "❌ Error fetching coin details. Please pick another coin.".into()
            }
            SimError::SubscriptionNotFound(_) => {
                "❌ Simulation details not found. It may have been deleted.".into()
            }
            SimError::Validation(msg) => format!("❌ {msg}"),
            SimError::Upstream(_) => {
                "⚠️ Market data is unavailable right now. Please try again later.".into()
            }
            SimError::Persistence(_) => {
                "A database error occurred. Your request could not be saved.".into()
            }
            SimError::StaleSession => {
                "❌ Session expired or incomplete. Please start a new simulation with /start."
                    .into()
            }
            SimError::Transport(_) => {
                "Message delivery failed. Please try again in a moment.".into()
            }
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for SimError {
    fn from(err: anyhow::Error) -> Self {
        SimError::Other(err.to_string())
    }
}
