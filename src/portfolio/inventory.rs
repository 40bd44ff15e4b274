//! Position inventories for stocks and multi-leg option combinations.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::data::OptionType;
use crate::strategy::OrderTag;

/// A held equity position.
#[derive(Debug, Clone, PartialEq)]
pub struct StockPosition {
    pub symbol: String,
    /// Fill price at the last rebalance
    pub price: Decimal,
    pub qty: i64,
}

/// One executed leg of an option combination.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionLeg {
    pub contract: String,
    pub underlying: String,
    pub expiration: NaiveDate,
    pub option_type: OptionType,
    pub strike: Decimal,
    /// Signed per-contract cash flow at execution: debits positive,
    /// credits negative
    pub cost: Decimal,
    pub order: OrderTag,
}

/// Cost, quantity, and date shared by all legs of a combination.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionTotals {
    /// Summed per-leg cost for one unit of the combination
    pub cost: Decimal,
    pub qty: i64,
    pub date: NaiveDate,
}

/// A multi-leg option combination held, or logged, as one row.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionPosition {
    pub legs: Vec<OptionLeg>,
    pub totals: PositionTotals,
}

impl OptionPosition {
    /// Total cash flow to open or close the full quantity.
    pub fn total_price(&self) -> Decimal {
        self.totals.cost * Decimal::from(self.totals.qty)
    }
}

/// Everything currently held, split by asset class.
///
/// A reset clears both sides wholesale. Row shapes never change, so
/// consumers can rely on the same structure across rebalance cycles.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub stocks: Vec<StockPosition>,
    pub options: Vec<OptionPosition>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every holding on both sides.
    pub fn reset(&mut self) {
        self.stocks.clear();
        self.options.clear();
    }

    pub fn add_stock(&mut self, symbol: &str, price: Decimal, qty: i64) {
        self.stocks.push(StockPosition {
            symbol: symbol.to_string(),
            price,
            qty,
        });
    }

    /// Remove every stock row for `symbol`.
    pub fn remove_stock(&mut self, symbol: &str) {
        self.stocks.retain(|p| p.symbol != symbol);
    }

    pub fn add_option(&mut self, position: OptionPosition) {
        self.options.push(position);
    }

    /// Remove option rows where the mask is true. Rows past the end of
    /// the mask are kept.
    pub fn remove_options(&mut self, mask: &[bool]) {
        let mut i = 0;
        self.options.retain(|_| {
            let drop = mask.get(i).copied().unwrap_or(false);
            i += 1;
            !drop
        });
    }

    /// Total stock shares held.
    pub fn stock_qty(&self) -> i64 {
        self.stocks.iter().map(|p| p.qty).sum()
    }

    /// Total option combination units held.
    pub fn option_qty(&self) -> i64 {
        self.options.iter().map(|p| p.totals.qty).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.stocks.is_empty() && self.options.is_empty()
    }
}
