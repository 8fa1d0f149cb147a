//! Notification Scheduler
//!
//! The periodic sweep over all subscriptions: decide which are due,
//! price them, deliver the performance update, and record the delivery.
//! The recorded timestamp is the only de-duplication guard, so it is
//! advanced strictly after a successful send.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::market::MarketDataGateway;
use crate::model::Subscription;
use crate::performance::PerformanceReport;
use crate::store::SubscriptionStore;
use crate::transport::{escape_html, ChatTransport, Reply};

/// Outcome of one sweep
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Subscriptions examined
    pub processed: usize,

    /// Notifications delivered and recorded
    pub sent: usize,
}

/// The periodic notification dispatcher
pub struct NotificationScheduler {
    subscriptions: Arc<dyn SubscriptionStore>,
    market: Arc<dyn MarketDataGateway>,
    transport: Arc<dyn ChatTransport>,
}

impl NotificationScheduler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        market: Arc<dyn MarketDataGateway>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            subscriptions,
            market,
            transport,
        }
    }

    /// One pass over all subscriptions at time `now`.
    ///
    /// Sweeps are assumed non-overlapping with themselves. Failures are
    /// isolated per subscription: a skipped record keeps its old
    /// `last_notified_at` and is naturally retried on the next tick.
    pub async fn run_sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let subscriptions = self.subscriptions.list_all().await?;
        let mut report = SweepReport {
            processed: subscriptions.len(),
            sent: 0,
        };

        for subscription in subscriptions {
            if !subscription.is_due(now) {
                continue;
            }

            match self.notify(&subscription, now).await {
                Ok(true) => report.sent += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(
                        id = %subscription.id,
                        error = %err,
                        "notification failed, retrying next sweep",
                    );
                }
            }
        }

        info!(
            processed = report.processed,
            sent = report.sent,
            "notification sweep finished",
        );
        Ok(report)
    }

    /// Returns true when a notification was delivered and recorded
    async fn notify(&self, subscription: &Subscription, now: DateTime<Utc>) -> Result<bool> {
        let Some(current_price) = self.market.current_price(&subscription.asset_id).await?
        else {
            warn!(
                id = %subscription.id,
                asset = %subscription.asset_id,
                "price unavailable, skipping",
            );
            return Ok(false);
        };

        let report = PerformanceReport::compute(
            subscription.invested_amount,
            subscription.initial_price,
            current_price,
        );

        let reply = Reply::text(notification_text(subscription, current_price, &report));
        self.transport.send(&subscription.owner_id, &reply).await?;

        // Recorded only after delivery succeeded: a second sweep inside
        // the same window now sees the subscription as not due.
        self.subscriptions
            .update_last_notified(&subscription.id, now)
            .await?;

        Ok(true)
    }
}

fn notification_text(
    sub: &Subscription,
    current_price: Decimal,
    report: &PerformanceReport,
) -> String {
    let delta_emoji = if report.is_gain() { "🟢" } else { "🔴" };
    let pl_sign = if report.is_gain() { "+" } else { "" };

    format!(
        "{delta_emoji} <b>SimuFolio Update: {}</b>\nSubscription: {}\n\n<b>Initial Investment:</b> ${:.2}\n<b>Current Value:</b> ${:.2}\n<b>Total P&amp;L:</b> {pl_sign}${:.2} ({pl_sign}{:.2}%)\nCurrent Price: ${:.2}\n\nTo see all details, use the /start command.",
        escape_html(&sub.asset_id.to_uppercase()),
        sub.update_interval,
        sub.invested_amount.round_dp(2),
        report.current_value.round_dp(2),
        report.profit_loss.round_dp(2),
        report.percent_change.round_dp(2),
        current_price.round_dp(2),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::MockMarketGateway;
    use crate::model::{NewSubscription, OwnerId, UpdateInterval};
    use crate::store::MemorySubscriptionStore;
    use crate::transport::RecordingTransport;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    struct Fixture {
        scheduler: NotificationScheduler,
        subscriptions: Arc<MemorySubscriptionStore>,
        transport: Arc<RecordingTransport>,
    }

    fn fixture(market: MockMarketGateway) -> Fixture {
        let subscriptions = Arc::new(MemorySubscriptionStore::new());
        let transport = Arc::new(RecordingTransport::new());
        let scheduler = NotificationScheduler::new(
            subscriptions.clone(),
            Arc::new(market),
            transport.clone(),
        );
        Fixture {
            scheduler,
            subscriptions,
            transport,
        }
    }

    async fn seed(
        fix: &Fixture,
        asset_id: &str,
        interval: UpdateInterval,
        start: DateTime<Utc>,
    ) -> crate::model::Subscription {
        fix.subscriptions
            .create(NewSubscription {
                owner_id: OwnerId::new("42"),
                asset_id: asset_id.into(),
                invested_amount: dec!(50),
                start_date: start,
                update_interval: interval,
                initial_price: dec!(9.5),
            })
            .await
            .unwrap()
    }

    fn test_market() -> MockMarketGateway {
        MockMarketGateway::empty().with_coin(
            "testcoin",
            "Coin",
            "X",
            42,
            dec!(10.5),
            Some(dec!(9.5)),
        )
    }

    #[tokio::test]
    async fn test_due_subscription_is_notified_and_recorded() {
        let fix = fixture(test_market());
        let start = Utc::now() - Duration::hours(2);
        let created = seed(&fix, "testcoin", UpdateInterval::Hourly, start).await;

        let now = Utc::now();
        let report = fix.scheduler.run_sweep(now).await.unwrap();
        assert_eq!(report, SweepReport { processed: 1, sent: 1 });

        let sent = fix.transport.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, OwnerId::new("42"));
        assert!(sent[0].1.text.contains("TESTCOIN"));
        assert!(sent[0].1.text.contains("$55.26"));
        assert!(sent[0].1.text.contains("+$5.26"));
        assert!(sent[0].1.text.contains("+10.53%"));

        let stored = fix.subscriptions.get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.last_notified_at, now);
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent_within_one_window() {
        let fix = fixture(test_market());
        let start = Utc::now() - Duration::hours(2);
        seed(&fix, "testcoin", UpdateInterval::Hourly, start).await;

        let now = Utc::now();
        fix.scheduler.run_sweep(now).await.unwrap();
        let second = fix.scheduler.run_sweep(now).await.unwrap();

        assert_eq!(second, SweepReport { processed: 1, sent: 0 });
        assert_eq!(fix.transport.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn test_not_yet_due_is_skipped() {
        let fix = fixture(test_market());
        let start = Utc::now() - Duration::minutes(30);
        seed(&fix, "testcoin", UpdateInterval::Hourly, start).await;

        let report = fix.scheduler.run_sweep(Utc::now()).await.unwrap();
        assert_eq!(report, SweepReport { processed: 1, sent: 0 });
        assert!(fix.transport.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_price_defers_to_next_sweep() {
        let fix = fixture(test_market());
        let start = Utc::now() - Duration::days(2);
        let created = seed(&fix, "ghostcoin", UpdateInterval::Daily, start).await;

        let report = fix.scheduler.run_sweep(Utc::now()).await.unwrap();
        assert_eq!(report, SweepReport { processed: 1, sent: 0 });

        // Timestamp untouched, so the next sweep will retry.
        let stored = fix.subscriptions.get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.last_notified_at, start);
    }

    #[tokio::test]
    async fn test_delivery_failure_is_retried_next_sweep() {
        let fix = fixture(test_market());
        let start = Utc::now() - Duration::hours(2);
        let created = seed(&fix, "testcoin", UpdateInterval::Hourly, start).await;

        fix.transport.set_failing(true);
        let report = fix.scheduler.run_sweep(Utc::now()).await.unwrap();
        assert_eq!(report.sent, 0);

        let stored = fix.subscriptions.get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.last_notified_at, start);

        // Transport recovers; the same subscription goes out.
        fix.transport.set_failing(false);
        let now = Utc::now();
        let report = fix.scheduler.run_sweep(now).await.unwrap();
        assert_eq!(report.sent, 1);

        let stored = fix.subscriptions.get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.last_notified_at, now);
    }

    #[tokio::test]
    async fn test_one_bad_record_does_not_block_the_rest() {
        let fix = fixture(test_market());
        let start = Utc::now() - Duration::days(31);
        seed(&fix, "ghostcoin", UpdateInterval::Monthly, start).await;
        seed(&fix, "testcoin", UpdateInterval::Monthly, start).await;

        let report = fix.scheduler.run_sweep(Utc::now()).await.unwrap();
        assert_eq!(report, SweepReport { processed: 2, sent: 1 });
    }
}
