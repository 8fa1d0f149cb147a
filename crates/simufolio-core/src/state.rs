//! Conversation State
//!
//! One record per user, persisted across stateless chat requests so the
//! wizard can be re-entered on every message.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::model::OwnerId;

/// Where the wizard currently stands for a user.
///
/// Absent state is equivalent to `Idle`. The interval-choice step is
/// deliberately not represented: the pending `(asset, amount)` pair
/// rides in the interval menu's own callback payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    #[default]
    Idle,

    /// The next text message is a search query
    Searching,

    /// The next text message is the USD amount for this asset
    AwaitingAmount { asset_id: String },
}

/// Persisted wizard position
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub owner_id: OwnerId,
    pub step: Step,
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    pub fn new(owner_id: OwnerId, step: Step) -> Self {
        Self {
            owner_id,
            step,
            updated_at: Utc::now(),
        }
    }
}

/// State store trait: at most one state per owner, upsert-on-write
#[async_trait]
pub trait ConversationStateStore: Send + Sync {
    /// Create or overwrite the owner's state
    async fn upsert(&self, state: ConversationState) -> Result<()>;

    /// Read the owner's state, if any
    async fn get(&self, owner_id: &OwnerId) -> Result<Option<ConversationState>>;

    /// Remove the owner's state
    async fn clear(&self, owner_id: &OwnerId) -> Result<()>;
}

/// In-memory state store (for development/testing)
pub struct MemoryStateStore {
    states: RwLock<HashMap<OwnerId, ConversationState>>,
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ConversationStateStore for MemoryStateStore {
    async fn upsert(&self, state: ConversationState) -> Result<()> {
        let mut states = self.states.write().await;
        states.insert(state.owner_id.clone(), state);
        Ok(())
    }

    async fn get(&self, owner_id: &OwnerId) -> Result<Option<ConversationState>> {
        let states = self.states.read().await;
        Ok(states.get(owner_id).cloned())
    }

    async fn clear(&self, owner_id: &OwnerId) -> Result<()> {
        let mut states = self.states.write().await;
        states.remove(owner_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_absent_state_reads_as_none() {
        let store = MemoryStateStore::new();
        let owner = OwnerId::new("42");

        assert!(store.get(&owner).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let store = MemoryStateStore::new();
        let owner = OwnerId::new("42");

        store
            .upsert(ConversationState::new(owner.clone(), Step::Searching))
            .await
            .unwrap();
        store
            .upsert(ConversationState::new(
                owner.clone(),
                Step::AwaitingAmount {
                    asset_id: "bitcoin".into(),
                },
            ))
            .await
            .unwrap();

        let state = store.get(&owner).await.unwrap().unwrap();
        assert_eq!(
            state.step,
            Step::AwaitingAmount {
                asset_id: "bitcoin".into()
            }
        );
    }

    #[tokio::test]
    async fn test_clear_removes_state() {
        let store = MemoryStateStore::new();
        let owner = OwnerId::new("42");

        store
            .upsert(ConversationState::new(owner.clone(), Step::Searching))
            .await
            .unwrap();
        store.clear(&owner).await.unwrap();

        assert!(store.get(&owner).await.unwrap().is_none());
    }
}
