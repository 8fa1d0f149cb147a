//! Domain Models
//!
//! Core data types for the investment simulator.
//! Uses `rust_decimal` for all monetary values - never use f64 for money!

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SimError;

/// Chat-side owner identifier (one per user)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-assigned subscription identifier, immutable after creation
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Notification cadence chosen during the wizard
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateInterval {
    Hourly,
    Daily,
    Monthly,
}

impl UpdateInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateInterval::Hourly => "hourly",
            UpdateInterval::Daily => "daily",
            UpdateInterval::Monthly => "monthly",
        }
    }

    /// Time that must elapse since the last notification before the next
    /// one is due. Monthly is approximated as 30 days; exact calendar
    /// months are not tracked.
    pub fn duration(&self) -> Duration {
        match self {
            UpdateInterval::Hourly => Duration::hours(1),
            UpdateInterval::Daily => Duration::hours(24),
            UpdateInterval::Monthly => Duration::days(30),
        }
    }
}

impl std::fmt::Display for UpdateInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for UpdateInterval {
    type Err = SimError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "hourly" => Ok(UpdateInterval::Hourly),
            "daily" => Ok(UpdateInterval::Daily),
            "monthly" => Ok(UpdateInterval::Monthly),
            other => Err(SimError::Validation(format!("unknown interval: {other}"))),
        }
    }
}

/// A simulated investment with a notification cadence
///
/// `invested_amount` and `initial_price` are immutable after creation;
/// `last_notified_at` only moves forward and only via the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub owner_id: OwnerId,

    /// Provider-specific asset id (e.g. "bitcoin")
    pub asset_id: String,

    /// Notional USD amount, > 0
    pub invested_amount: Decimal,

    pub start_date: DateTime<Utc>,
    pub update_interval: UpdateInterval,

    /// Asset price at `start_date`, > 0
    pub initial_price: Decimal,

    /// Timestamp of the last successful notification, initialized to
    /// `start_date`
    pub last_notified_at: DateTime<Utc>,
}

impl Subscription {
    /// Whether the notification interval has elapsed since the last
    /// successful notification
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now - self.last_notified_at >= self.update_interval.duration()
    }
}

/// Fields the wizard provides; the store assigns the id
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewSubscription {
    pub owner_id: OwnerId,
    pub asset_id: String,
    pub invested_amount: Decimal,
    pub start_date: DateTime<Utc>,
    pub update_interval: UpdateInterval,
    pub initial_price: Decimal,
}

/// Display metadata for a selected asset
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub market_rank: Option<u32>,
    pub current_price: Decimal,
}

/// A search result or top-list entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetListing {
    pub id: String,
    pub symbol: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn subscription(interval: UpdateInterval, last_notified_at: DateTime<Utc>) -> Subscription {
        Subscription {
            id: SubscriptionId::generate(),
            owner_id: OwnerId::new("42"),
            asset_id: "bitcoin".into(),
            invested_amount: dec!(100),
            start_date: last_notified_at,
            update_interval: interval,
            initial_price: dec!(97500),
            last_notified_at,
        }
    }

    #[test]
    fn test_interval_durations() {
        assert_eq!(UpdateInterval::Hourly.duration(), Duration::hours(1));
        assert_eq!(UpdateInterval::Daily.duration(), Duration::hours(24));
        assert_eq!(UpdateInterval::Monthly.duration(), Duration::days(30));
    }

    #[test]
    fn test_interval_round_trip() {
        for interval in [
            UpdateInterval::Hourly,
            UpdateInterval::Daily,
            UpdateInterval::Monthly,
        ] {
            assert_eq!(interval.as_str().parse::<UpdateInterval>().unwrap(), interval);
        }
        assert!("weekly".parse::<UpdateInterval>().is_err());
    }

    #[test]
    fn test_is_due_at_boundary() {
        let start = Utc::now();
        let sub = subscription(UpdateInterval::Hourly, start);

        assert!(!sub.is_due(start));
        assert!(!sub.is_due(start + Duration::minutes(59)));
        assert!(sub.is_due(start + Duration::hours(1)));
    }

    #[test]
    fn test_is_due_is_monotonic() {
        let start = Utc::now();
        let sub = subscription(UpdateInterval::Daily, start);

        // Once due, stays due for every later instant until the
        // timestamp is advanced.
        let first_due = start + Duration::hours(24);
        assert!(sub.is_due(first_due));
        assert!(sub.is_due(first_due + Duration::minutes(1)));
        assert!(sub.is_due(first_due + Duration::days(365)));
    }
}
