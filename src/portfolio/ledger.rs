//! Independent cash pools per asset class.

use rust_decimal::Decimal;

/// Cash balances tracked separately for each side of the portfolio.
///
/// Stock cash never pays for options and vice versa. The reserve pool
/// holds the cash allocation between rebalances.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CapitalLedger {
    pub stocks_cash: Decimal,
    pub options_cash: Decimal,
    pub reserve_cash: Decimal,
}

impl CapitalLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cash across all three pools.
    pub fn total_cash(&self) -> Decimal {
        self.stocks_cash + self.options_cash + self.reserve_cash
    }
}
