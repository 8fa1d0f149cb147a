//! Performance Calculator
//!
//! Pure P&L math for a simulated investment. No side effects; rounding
//! happens only at display time (two decimals for currency and percent,
//! eight for quantity).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Computed performance of one subscription against the current price
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Units bought at the start price
    pub quantity: Decimal,

    /// Present value of those units
    pub current_value: Decimal,

    /// `current_value - invested_amount`
    pub profit_loss: Decimal,

    /// Profit/loss as a percentage of the invested amount
    pub percent_change: Decimal,
}

impl PerformanceReport {
    /// Compute performance from the invariant inputs.
    ///
    /// Callers guarantee `invested_amount > 0` and `initial_price > 0`;
    /// both are validated at subscription creation.
    pub fn compute(
        invested_amount: Decimal,
        initial_price: Decimal,
        current_price: Decimal,
    ) -> Self {
        let quantity = invested_amount / initial_price;
        let current_value = quantity * current_price;
        let profit_loss = current_value - invested_amount;
        let percent_change = profit_loss / invested_amount * Decimal::from(100);

        Self {
            quantity,
            current_value,
            profit_loss,
            percent_change,
        }
    }

    pub fn is_gain(&self) -> bool {
        self.profit_loss >= Decimal::ZERO
    }
}
