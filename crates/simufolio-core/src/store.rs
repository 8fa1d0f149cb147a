//! Subscription Store
//!
//! CRUD over simulation records, keyed by owner and by id.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::{Result, SimError};
use crate::model::{NewSubscription, OwnerId, Subscription, SubscriptionId};

/// Subscription store trait
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Persist a new record; all-or-nothing, the store assigns the id
    async fn create(&self, new_sub: NewSubscription) -> Result<Subscription>;

    /// All records belonging to one owner, oldest first
    async fn list_by_owner(&self, owner_id: &OwnerId) -> Result<Vec<Subscription>>;

    async fn get_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>>;

    /// Advance the last-notified timestamp. Monotonic: a timestamp at or
    /// before the stored one is ignored, so a late writer can never move
    /// the record backwards.
    async fn update_last_notified(
        &self,
        id: &SubscriptionId,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Returns whether a record was deleted
    async fn delete(&self, id: &SubscriptionId) -> Result<bool>;

    /// The full set, read once per notification sweep
    async fn list_all(&self) -> Result<Vec<Subscription>>;
}

/// In-memory subscription store (for development/testing)
pub struct MemorySubscriptionStore {
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
}

impl Default for MemorySubscriptionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn create(&self, new_sub: NewSubscription) -> Result<Subscription> {
        let subscription = Subscription {
            id: SubscriptionId::generate(),
            owner_id: new_sub.owner_id,
            asset_id: new_sub.asset_id,
            invested_amount: new_sub.invested_amount,
            start_date: new_sub.start_date,
            update_interval: new_sub.update_interval,
            initial_price: new_sub.initial_price,
            last_notified_at: new_sub.start_date,
        };

        let mut subscriptions = self.subscriptions.write().await;
        subscriptions.insert(subscription.id.clone(), subscription.clone());
        Ok(subscription)
    }

    async fn list_by_owner(&self, owner_id: &OwnerId) -> Result<Vec<Subscription>> {
        let subscriptions = self.subscriptions.read().await;
        let mut result: Vec<_> = subscriptions
            .values()
            .filter(|s| &s.owner_id == owner_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.start_date.cmp(&b.start_date));
        Ok(result)
    }

    async fn get_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>> {
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions.get(id).cloned())
    }

    async fn update_last_notified(
        &self,
        id: &SubscriptionId,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut subscriptions = self.subscriptions.write().await;
        let subscription = subscriptions
            .get_mut(id)
            .ok_or_else(|| SimError::SubscriptionNotFound(id.to_string()))?;

        if at > subscription.last_notified_at {
            subscription.last_notified_at = at;
        }
        Ok(())
    }

    async fn delete(&self, id: &SubscriptionId) -> Result<bool> {
        let mut subscriptions = self.subscriptions.write().await;
        Ok(subscriptions.remove(id).is_some())
    }

    async fn list_all(&self) -> Result<Vec<Subscription>> {
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions.values().cloned().collect())
    }
}
