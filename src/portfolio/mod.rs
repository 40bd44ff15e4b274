//! Portfolio state shared across the engine.
//!
//! Handles:
//! - Allocation: normalized target weights across asset classes
//! - Inventory: stock and multi-leg option holdings
//! - Ledger: independent cash pools per asset class

mod allocation;
mod inventory;
mod ledger;

pub use allocation::{validate_stock_targets, Allocation, CapitalSplit, StockTarget};
pub use inventory::{Inventory, OptionLeg, OptionPosition, PositionTotals, StockPosition};
pub use ledger::CapitalLedger;

use rust_decimal::Decimal;

/// Mutable state owned by a single simulation run.
#[derive(Debug, Clone)]
pub struct PortfolioState {
    pub inventory: Inventory,
    pub ledger: CapitalLedger,
    /// Entry and exit rows in execution order
    pub trade_log: Vec<OptionPosition>,
    /// Last non-degenerate capital total seen by the rebalancer
    pub total_capital: Decimal,
}

impl PortfolioState {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            inventory: Inventory::new(),
            ledger: CapitalLedger::new(),
            trade_log: Vec::new(),
            total_capital: initial_capital,
        }
    }
}
