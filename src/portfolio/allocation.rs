//! Target allocation across asset classes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{BacktestError, Result};

/// Normalized target weights for stocks, options, and cash.
///
/// Weights are stored already divided by their raw sum, so the three
/// always add up to 1.0. A class left out by the caller is a weight of
/// zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Allocation {
    stocks: Decimal,
    options: Decimal,
    cash: Decimal,
}

impl Allocation {
    /// Normalize raw weights.
    ///
    /// Fails when any weight is negative or when they sum to zero.
    pub fn new(stocks: Decimal, options: Decimal, cash: Decimal) -> Result<Self> {
        for (asset, weight) in [("stocks", stocks), ("options", options), ("cash", cash)] {
            if weight < Decimal::ZERO {
                return Err(BacktestError::NegativeWeight { asset, weight });
            }
        }
        let total = stocks + options + cash;
        if total == Decimal::ZERO {
            return Err(BacktestError::ZeroAllocation);
        }
        Ok(Self {
            stocks: stocks / total,
            options: options / total,
            cash: cash / total,
        })
    }

    pub fn stocks(&self) -> Decimal {
        self.stocks
    }

    pub fn options(&self) -> Decimal {
        self.options
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    /// Split a capital total across the three classes.
    pub fn split(&self, total: Decimal) -> CapitalSplit {
        CapitalSplit {
            stocks: total * self.stocks,
            options: total * self.options,
            cash: total * self.cash,
        }
    }
}

/// Dollar amounts produced by applying an [`Allocation`] to a total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapitalSplit {
    pub stocks: Decimal,
    pub options: Decimal,
    pub cash: Decimal,
}

/// A target equity holding as a share of the stock allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockTarget {
    pub symbol: String,
    pub percentage: Decimal,
}

/// Target percentages must cover the stock allocation exactly.
pub fn validate_stock_targets(targets: &[StockTarget]) -> Result<()> {
    let sum: Decimal = targets.iter().map(|t| t.percentage).sum();
    if sum != Decimal::ONE {
        return Err(BacktestError::StockTargetSum { sum });
    }
    Ok(())
}
