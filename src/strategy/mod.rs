//! Strategy signal generation.
//!
//! Handles:
//! - Leg definitions, quote-side pricing, and order tagging
//! - The [`Strategy`] trait the engine drives entries and exits through
//! - A bundled days-to-expiration rolling strategy

mod dte;
mod legs;

pub use dte::{DteConfig, DteLeg, DteStrategy};
pub use legs::{Direction, LegDefinition, OrderTag};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::data::{OptionChain, OptionSchema};
use crate::portfolio::{Inventory, OptionPosition};

/// Exit instruction set produced by a strategy for one date.
#[derive(Debug, Clone, Default)]
pub struct ExitSignals {
    /// Re-priced copies of the closing rows, bound for the trade log
    pub records: Vec<OptionPosition>,
    /// True for each inventory row being closed
    pub mask: Vec<bool>,
    /// Signed cash flow per closing row, already scaled by quantity
    pub costs: Vec<Decimal>,
}

impl ExitSignals {
    /// Signals that close nothing across `open_rows` inventory rows.
    pub fn none(open_rows: usize) -> Self {
        Self {
            records: Vec::new(),
            mask: vec![false; open_rows],
            costs: Vec::new(),
        }
    }

    /// True when no row is being closed.
    pub fn is_empty(&self) -> bool {
        !self.mask.iter().any(|&m| m)
    }
}

/// Decides which option combinations to open and close.
///
/// Implementations never touch the portfolio themselves; they look at
/// the chain and the current inventory and hand instructions back to
/// the engine.
pub trait Strategy {
    /// Column mapping this strategy expects from the option feed.
    fn schema(&self) -> &OptionSchema;

    /// Ordered leg definitions for combinations this strategy opens.
    fn legs(&self) -> &[LegDefinition];

    /// Capital new entries are sized against.
    fn initial_capital(&self) -> Decimal;

    /// Called by the rebalancer after each re-allocation.
    fn set_initial_capital(&mut self, capital: Decimal);

    /// Ranked candidate combinations to open, best first.
    fn filter_entries(
        &self,
        chain: &OptionChain,
        inventory: &Inventory,
        date: NaiveDate,
    ) -> Vec<OptionPosition>;

    /// Rows to close today, with the inventory mask and per-row cash
    /// flows.
    fn filter_exits(
        &self,
        chain: &OptionChain,
        inventory: &Inventory,
        date: NaiveDate,
    ) -> ExitSignals;
}
