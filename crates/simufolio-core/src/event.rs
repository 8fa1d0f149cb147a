//! Chat Events
//!
//! Incoming interactions decoded once at the transport boundary into a
//! closed typed set, then matched exhaustively by the engine. Button
//! payloads have a stable wire encoding so a pressed button from an old
//! message still parses.

use rust_decimal::Decimal;

use crate::error::{Result, SimError};
use crate::model::{SubscriptionId, UpdateInterval};

/// An incoming chat interaction
#[derive(Clone, Debug, PartialEq)]
pub enum ChatEvent {
    /// The /start command
    Start,

    /// A plain text message (search query or amount reply)
    FreeText(String),

    /// An inline-keyboard button press
    Callback(CallbackAction),
}

/// The closed set of button payloads
#[derive(Clone, Debug, PartialEq)]
pub enum CallbackAction {
    /// Restart the wizard
    StartSimulation,

    /// Browse the top assets by market cap
    ViewTopList,

    /// Switch the next text message into a search query
    BeginSearch,

    /// An asset was picked from a menu
    SelectAsset(String),

    /// Final wizard step; the pending pair rides in the payload rather
    /// than in persisted state
    ChooseInterval {
        asset_id: String,
        amount: Decimal,
        interval: UpdateInterval,
    },

    /// List the owner's simulations
    ViewSubscriptions,

    /// Show live performance for one simulation
    ViewDetails(SubscriptionId),

    /// Delete one simulation
    DeleteSubscription(SubscriptionId),

    /// Return to the welcome menu
    BackToMain,
}

impl CallbackAction {
    /// Wire encoding carried in the button payload
    pub fn to_payload(&self) -> String {
        match self {
            CallbackAction::StartSimulation => "start_sim".into(),
            CallbackAction::ViewTopList => "view_top_10".into(),
            CallbackAction::BeginSearch => "start_search".into(),
            CallbackAction::SelectAsset(asset_id) => format!("sim_coin:{asset_id}"),
            CallbackAction::ChooseInterval {
                asset_id,
                amount,
                interval,
            } => format!("confirm_sub:{asset_id}:{amount}:{interval}"),
            CallbackAction::ViewSubscriptions => "view_subs".into(),
            CallbackAction::ViewDetails(id) => format!("view_details:{id}"),
            CallbackAction::DeleteSubscription(id) => format!("delete_sub:{id}"),
            CallbackAction::BackToMain => "back_main".into(),
        }
    }

    /// Parse a raw button payload
    pub fn parse(payload: &str) -> Result<Self> {
        match payload {
            "start_sim" => return Ok(CallbackAction::StartSimulation),
            "view_top_10" => return Ok(CallbackAction::ViewTopList),
            "start_search" => return Ok(CallbackAction::BeginSearch),
            "view_subs" => return Ok(CallbackAction::ViewSubscriptions),
            "back_main" => return Ok(CallbackAction::BackToMain),
            _ => {}
        }

        if let Some(asset_id) = payload.strip_prefix("sim_coin:") {
            if asset_id.is_empty() {
                return Err(SimError::Validation("empty asset id".into()));
            }
            return Ok(CallbackAction::SelectAsset(asset_id.to_string()));
        }

        if let Some(rest) = payload.strip_prefix("confirm_sub:") {
            return Self::parse_confirm(rest);
        }

        if let Some(id) = payload.strip_prefix("view_details:") {
            if id.is_empty() {
                return Err(SimError::Validation("empty subscription id".into()));
            }
            return Ok(CallbackAction::ViewDetails(SubscriptionId::from_string(id)));
        }

        if let Some(id) = payload.strip_prefix("delete_sub:") {
            if id.is_empty() {
                return Err(SimError::Validation("empty subscription id".into()));
            }
            return Ok(CallbackAction::DeleteSubscription(
                SubscriptionId::from_string(id),
            ));
        }

        Err(SimError::Validation(format!(
            "unknown callback payload: {payload}"
        )))
    }

    fn parse_confirm(rest: &str) -> Result<Self> {
        let mut parts = rest.splitn(3, ':');
        let (Some(asset_id), Some(amount), Some(interval)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(SimError::Validation(format!(
                "malformed confirm payload: {rest}"
            )));
        };

        if asset_id.is_empty() {
            return Err(SimError::Validation("empty asset id".into()));
        }

        let amount: Decimal = amount
            .parse()
            .map_err(|_| SimError::Validation(format!("malformed amount: {amount}")))?;

        Ok(CallbackAction::ChooseInterval {
            asset_id: asset_id.to_string(),
            amount,
            interval: interval.parse()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_bare_payloads_round_trip() {
        for action in [
            CallbackAction::StartSimulation,
            CallbackAction::ViewTopList,
            CallbackAction::BeginSearch,
            CallbackAction::ViewSubscriptions,
            CallbackAction::BackToMain,
        ] {
            assert_eq!(CallbackAction::parse(&action.to_payload()).unwrap(), action);
        }
    }

    #[test]
    fn test_select_asset_round_trip() {
        let action = CallbackAction::SelectAsset("avalanche-2".into());
        assert_eq!(action.to_payload(), "sim_coin:avalanche-2");
        assert_eq!(CallbackAction::parse("sim_coin:avalanche-2").unwrap(), action);
    }

    #[test]
    fn test_confirm_round_trip() {
        let action = CallbackAction::ChooseInterval {
            asset_id: "bitcoin".into(),
            amount: dec!(100.50),
            interval: UpdateInterval::Daily,
        };
        let payload = action.to_payload();
        assert_eq!(payload, "confirm_sub:bitcoin:100.50:daily");
        assert_eq!(CallbackAction::parse(&payload).unwrap(), action);
    }

    #[test]
    fn test_subscription_payloads_round_trip() {
        let id = SubscriptionId::from_string("abc-123");
        let view = CallbackAction::ViewDetails(id.clone());
        let delete = CallbackAction::DeleteSubscription(id);

        assert_eq!(CallbackAction::parse(&view.to_payload()).unwrap(), view);
        assert_eq!(CallbackAction::parse(&delete.to_payload()).unwrap(), delete);
    }

    #[test]
    fn test_malformed_payloads_rejected() {
        for payload in [
            "",
            "nonsense",
            "sim_coin:",
            "confirm_sub:bitcoin:100",
            "confirm_sub:bitcoin:abc:daily",
            "confirm_sub:bitcoin:100:weekly",
            "view_details:",
            "delete_sub:",
        ] {
            assert!(
                CallbackAction::parse(payload).is_err(),
                "accepted: {payload}"
            );
        }
    }
}
