//! Conversation Engine
//!
//! Re-enters the wizard on every stateless chat event: reads the owner's
//! stored step, interprets the event against it, persists the next step,
//! and builds the reply. Events from the same user can arrive out of
//! order (a stale force-reply answered after a restart); the step checks
//! reject those instead of trusting the client.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::error::{Result, SimError};
use crate::event::{CallbackAction, ChatEvent};
use crate::market::MarketDataGateway;
use crate::model::{NewSubscription, OwnerId, Subscription, SubscriptionId, UpdateInterval};
use crate::performance::PerformanceReport;
use crate::state::{ConversationState, ConversationStateStore, Step};
use crate::store::SubscriptionStore;
use crate::transport::{escape_html, InlineKeyboard, Reply};

const TOP_LIST_LIMIT: usize = 10;
const SEARCH_RESULT_LIMIT: usize = 5;

/// The conversation state machine
pub struct ConversationEngine {
    market: Arc<dyn MarketDataGateway>,
    subscriptions: Arc<dyn SubscriptionStore>,
    states: Arc<dyn ConversationStateStore>,
}

impl ConversationEngine {
    pub fn new(
        market: Arc<dyn MarketDataGateway>,
        subscriptions: Arc<dyn SubscriptionStore>,
        states: Arc<dyn ConversationStateStore>,
    ) -> Self {
        Self {
            market,
            subscriptions,
            states,
        }
    }

    /// Interpret one event and produce the reply
    pub async fn advance(&self, owner_id: &OwnerId, event: ChatEvent) -> Result<Reply> {
        match event {
            ChatEvent::Start => Ok(main_menu(
                "Welcome to <b>SimuFolio!</b> 🚀 Ready to track your virtual gains? Choose your action:",
            )),
            ChatEvent::FreeText(text) => self.handle_free_text(owner_id, &text).await,
            ChatEvent::Callback(action) => match action {
                CallbackAction::StartSimulation => self.start_simulation(owner_id).await,
                CallbackAction::ViewTopList => self.view_top_list().await,
                CallbackAction::BeginSearch => self.begin_search(owner_id).await,
                CallbackAction::SelectAsset(asset_id) => {
                    self.select_asset(owner_id, &asset_id).await
                }
                CallbackAction::ChooseInterval {
                    asset_id,
                    amount,
                    interval,
                } => {
                    self.choose_interval(owner_id, asset_id, amount, interval)
                        .await
                }
                CallbackAction::ViewSubscriptions => self.view_subscriptions(owner_id).await,
                CallbackAction::ViewDetails(id) => self.view_details(&id).await,
                CallbackAction::DeleteSubscription(id) => self.delete_subscription(&id).await,
                CallbackAction::BackToMain => Ok(main_menu("Welcome back to the main menu!")),
            },
        }
    }

    /// Free text means different things depending on the stored step
    async fn handle_free_text(&self, owner_id: &OwnerId, text: &str) -> Result<Reply> {
        let step = self
            .states
            .get(owner_id)
            .await?
            .map(|s| s.step)
            .unwrap_or_default();

        match step {
            Step::Searching => self.run_search(owner_id, text.trim()).await,
            Step::AwaitingAmount { asset_id } => self.confirm_amount(&asset_id, text.trim()),
            // An amount reply with no selected asset is a stale
            // force-reply; reject rather than guess.
            Step::Idle => Ok(Reply::text(SimError::StaleSession.user_message())),
        }
    }

    async fn start_simulation(&self, owner_id: &OwnerId) -> Result<Reply> {
        // Drop any stale asset selection before re-entering the wizard.
        self.states
            .upsert(ConversationState::new(owner_id.clone(), Step::Idle))
            .await?;

        let keyboard = InlineKeyboard::new()
            .button("🔍 Search by Name/Symbol", CallbackAction::BeginSearch)
            .row()
            .button("🔽 View Top 10 List", CallbackAction::ViewTopList);

        Ok(
            Reply::text("🔎 How would you like to find your investment token?")
                .with_keyboard(keyboard),
        )
    }

    async fn view_top_list(&self) -> Result<Reply> {
        let coins = self.market.top_assets(TOP_LIST_LIMIT).await?;

        if coins.is_empty() {
            return Ok(Reply::text(
                "Sorry, coin data is unavailable right now. Try searching instead.",
            ));
        }

        let mut keyboard = InlineKeyboard::new();
        for coin in &coins {
            keyboard = keyboard
                .button(
                    format!("{} ({})", coin.symbol.to_uppercase(), coin.name),
                    CallbackAction::SelectAsset(coin.id.clone()),
                )
                .row();
        }
        keyboard = keyboard.button("🔙 Back to Main Menu", CallbackAction::BackToMain);

        Ok(
            Reply::text("🏆 <b>Top 10 by Market Cap</b> 👇 Choose your giant.")
                .with_keyboard(keyboard),
        )
    }

    async fn begin_search(&self, owner_id: &OwnerId) -> Result<Reply> {
        self.states
            .upsert(ConversationState::new(owner_id.clone(), Step::Searching))
            .await?;

        let keyboard = InlineKeyboard::new().button("🔙 Back", CallbackAction::StartSimulation);

        Ok(Reply::text(
            "🔍 <b>Enter the full name or symbol of the coin</b> you want to simulate (e.g., <i>Bitcoin</i> or <b>ETH</b>).",
        )
        .with_keyboard(keyboard))
    }

    async fn run_search(&self, owner_id: &OwnerId, query: &str) -> Result<Reply> {
        if query.is_empty() {
            return Ok(Reply::text(
                "🔍 Please send a coin name or symbol to search for.",
            ));
        }

        let results = self.market.search(query).await?;

        if results.is_empty() {
            self.states
                .upsert(ConversationState::new(owner_id.clone(), Step::Idle))
                .await?;
            return Ok(Reply::text(
                "🥶 <b>Zero matches found.</b> No tokens match that query. Try another search term with a new simulation!",
            ));
        }

        let mut keyboard = InlineKeyboard::new();
        for coin in results.iter().take(SEARCH_RESULT_LIMIT) {
            keyboard = keyboard
                .button(
                    format!("{} ({})", coin.symbol.to_uppercase(), coin.name),
                    CallbackAction::SelectAsset(coin.id.clone()),
                )
                .row();
        }
        keyboard = keyboard.button("🔙 Back to Main Menu", CallbackAction::BackToMain);

        // Selection re-enters through the SelectAsset callback, so the
        // search mode itself is finished.
        self.states
            .upsert(ConversationState::new(owner_id.clone(), Step::Idle))
            .await?;

        Ok(Reply::text(format!(
            "✅ Found {} results. Select the correct coin:",
            results.len()
        ))
        .with_keyboard(keyboard))
    }

    async fn select_asset(&self, owner_id: &OwnerId, asset_id: &str) -> Result<Reply> {
        let Some(metadata) = self.market.metadata(asset_id).await? else {
            return Ok(Reply::text(
                SimError::AssetNotFound(asset_id.to_string()).user_message(),
            ));
        };

        // A second selection while awaiting an amount simply overwrites
        // the pending asset; nothing has been committed yet.
        self.states
            .upsert(ConversationState::new(
                owner_id.clone(),
                Step::AwaitingAmount {
                    asset_id: asset_id.to_string(),
                },
            ))
            .await?;

        let rank = metadata
            .market_rank
            .map_or_else(|| "Unranked".to_string(), |r| format!("#{r}"));

        Ok(Reply::text(format!(
            "You selected <b>{} ({})</b> ({rank}).\n\nCurrent Price: ${:.2}\n\n<b>Ready for the fiat injection?</b> 💵 Reply with the exact US Dollar amount (e.g., <code>500</code> or <code>100.50</code>) you wish to virtually invest.",
            escape_html(&metadata.name),
            escape_html(&metadata.symbol),
            metadata.current_price.round_dp(2),
        ))
        .with_force_reply())
    }

    /// Validate the amount reply and offer the interval menu. The pending
    /// pair travels in the menu's callback payloads; no third step is
    /// persisted.
    fn confirm_amount(&self, asset_id: &str, text: &str) -> Result<Reply> {
        let amount = match text.parse::<Decimal>() {
            Ok(amount) if amount > Decimal::ZERO => amount,
            _ => {
                return Ok(Reply::text(
                    "❌ Invalid amount. Please reply with a positive number (e.g., 100).",
                ));
            }
        };

        let interval_button = |interval: UpdateInterval| CallbackAction::ChooseInterval {
            asset_id: asset_id.to_string(),
            amount,
            interval,
        };

        let keyboard = InlineKeyboard::new()
            .button("Hourly", interval_button(UpdateInterval::Hourly))
            .button("Daily", interval_button(UpdateInterval::Daily))
            .row()
            .button("Monthly", interval_button(UpdateInterval::Monthly));

        Ok(Reply::text(format!(
            "💸 Investment Confirmation: You are minting <b>${:.2}</b> into <b>{}</b>.\n\nHow often should I ping your portfolio?",
            amount.round_dp(2),
            escape_html(&asset_id.to_uppercase()),
        ))
        .with_keyboard(keyboard))
    }

    async fn choose_interval(
        &self,
        owner_id: &OwnerId,
        asset_id: String,
        amount: Decimal,
        interval: UpdateInterval,
    ) -> Result<Reply> {
        if amount <= Decimal::ZERO {
            return Ok(Reply::text(
                SimError::Validation("Amount must be positive.".into()).user_message(),
            ));
        }

        let now = Utc::now();

        // Today's historical price stands in as the start price.
        let start_price = match self.market.historical_price(&asset_id, now.date_naive()).await? {
            Some(price) if price > Decimal::ZERO => price,
            _ => {
                warn!(asset = %asset_id, "start price unavailable, simulation not created");
                return Ok(Reply::text(format!(
                    "❌ Failed to start simulation for {}. Could not fetch historical price data. Please try again later.",
                    escape_html(&asset_id.to_uppercase()),
                )));
            }
        };

        let new_sub = NewSubscription {
            owner_id: owner_id.clone(),
            asset_id,
            invested_amount: amount,
            start_date: now,
            update_interval: interval,
            initial_price: start_price,
        };

        match self.subscriptions.create(new_sub).await {
            Ok(subscription) => {
                // The wizard is complete; a later stray amount reply
                // should hit the stale-session guard, not reuse the
                // previous asset.
                if let Err(err) = self.states.clear(owner_id).await {
                    warn!(owner = %owner_id, error = %err, "state cleanup failed");
                }

                info!(owner = %owner_id, id = %subscription.id, "simulation created");

                Ok(Reply::text(format!(
                    "✅ <b>Simulation Deployed!</b> Your virtual investment is now live! ⛓️\n\n<b>Asset:</b> {}\n<b>Initial Investment:</b> ${:.2}\n<b>Start Price:</b> ${:.2}\n<b>Updates:</b> {}",
                    escape_html(&subscription.asset_id.to_uppercase()),
                    subscription.invested_amount.round_dp(2),
                    subscription.initial_price.round_dp(2),
                    subscription.update_interval,
                )))
            }
            Err(err) => {
                warn!(owner = %owner_id, error = %err, "simulation create failed");
                Ok(Reply::text(
                    SimError::Persistence(err.to_string()).user_message(),
                ))
            }
        }
    }

    async fn view_subscriptions(&self, owner_id: &OwnerId) -> Result<Reply> {
        let subscriptions = self.subscriptions.list_by_owner(owner_id).await?;

        if subscriptions.is_empty() {
            let keyboard = InlineKeyboard::new()
                .button("🚀 Start New Simulation", CallbackAction::StartSimulation);
            return Ok(Reply::text(
                "You currently have no active simulations. Start a new one with the button below!",
            )
            .with_keyboard(keyboard));
        }

        let mut keyboard = InlineKeyboard::new();
        for (index, sub) in subscriptions.iter().enumerate() {
            keyboard = keyboard
                .button(
                    format!(
                        "#{}: {} (${:.0})",
                        index + 1,
                        sub.asset_id.to_uppercase(),
                        sub.invested_amount.round_dp(0),
                    ),
                    CallbackAction::ViewDetails(sub.id.clone()),
                )
                .row();
        }
        keyboard = keyboard.button("🔙 Back to Main Menu", CallbackAction::BackToMain);

        Ok(Reply::text("📊 <b>Your Active Simulations:</b>").with_keyboard(keyboard))
    }

    async fn view_details(&self, id: &SubscriptionId) -> Result<Reply> {
        let Some(subscription) = self.subscriptions.get_by_id(id).await? else {
            return Ok(Reply::text(
                SimError::SubscriptionNotFound(id.to_string()).user_message(),
            ));
        };

        let Some(current_price) = self.market.current_price(&subscription.asset_id).await? else {
            // Degrade to the stored data rather than failing outright.
            return Ok(Reply::text(format!(
                "⚠️ Could not fetch the current price for {}.\n\n<b>Simulation Data:</b>\nInitial Investment: ${:.2}\nStart Price: ${:.2}",
                escape_html(&subscription.asset_id.to_uppercase()),
                subscription.invested_amount.round_dp(2),
                subscription.initial_price.round_dp(2),
            )));
        };

        let report = PerformanceReport::compute(
            subscription.invested_amount,
            subscription.initial_price,
            current_price,
        );

        let keyboard = InlineKeyboard::new()
            .button("🔄 Refresh Data", CallbackAction::ViewDetails(id.clone()))
            .row()
            .button(
                "🗑️ Delete Simulation",
                CallbackAction::DeleteSubscription(id.clone()),
            )
            .row()
            .button("🔙 View All Subscriptions", CallbackAction::ViewSubscriptions);

        Ok(Reply::text(details_text(&subscription, current_price, &report)).with_keyboard(keyboard))
    }

    async fn delete_subscription(&self, id: &SubscriptionId) -> Result<Reply> {
        if self.subscriptions.delete(id).await? {
            info!(id = %id, "simulation deleted");
            let keyboard = InlineKeyboard::new()
                .button("📊 View My Subscriptions", CallbackAction::ViewSubscriptions)
                .row()
                .button("🚀 Start New Simulation", CallbackAction::StartSimulation);
            Ok(Reply::text("🗑️ Simulation deleted. The tracker will no longer ping you about it.")
                .with_keyboard(keyboard))
        } else {
            Ok(Reply::text(
                SimError::SubscriptionNotFound(id.to_string()).user_message(),
            ))
        }
    }
}

fn main_menu(text: &str) -> Reply {
    let keyboard = InlineKeyboard::new()
        .button("🚀 Start New Simulation", CallbackAction::StartSimulation)
        .row()
        .button("📊 View My Subscriptions", CallbackAction::ViewSubscriptions);
    Reply::text(text).with_keyboard(keyboard)
}

fn details_text(sub: &Subscription, current_price: Decimal, report: &PerformanceReport) -> String {
    let delta_emoji = if report.is_gain() { "📈" } else { "📉" };
    let pl_sign = if report.is_gain() { "+" } else { "" };
    let asset = escape_html(&sub.asset_id.to_uppercase());

    format!(
        "{delta_emoji} <b>Live Performance: {asset}</b>\n\n<b>Investment Overview:</b>\nInitial Investment: ${:.2}\nCurrent Value: ${:.2}\nProfit/Loss (P&amp;L): {pl_sign}${:.2}\n% Change: {pl_sign}{:.2}%\n\n<b>Data Points:</b>\nStart Price ({}): ${:.2}\nCurrent Price: ${:.2}\nInitial Quantity: {:.8} {asset}\n\n<b>Updates:</b> {}",
        sub.invested_amount.round_dp(2),
        report.current_value.round_dp(2),
        report.profit_loss.round_dp(2),
        report.percent_change.round_dp(2),
        sub.start_date.format("%Y-%m-%d"),
        sub.initial_price.round_dp(2),
        current_price.round_dp(2),
        report.quantity.round_dp(8),
        sub.update_interval,
    )
}
