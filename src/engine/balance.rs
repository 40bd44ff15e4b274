//! Per-date mark-to-market accounting.
//!
//! After every simulated session the portfolio is valued at that day's
//! quotes and a balance row is appended. Exits run first, so the row
//! reflects what is actually still held.

use std::io::Write;

use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::data::{OptionChain, OptionType, StockSnapshot};
use crate::portfolio::{Inventory, PortfolioState};
use crate::strategy::Strategy;
use crate::utils::decimal::{pct_change, safe_div};

use super::execution::ExecutionEngine;

/// Mark-to-market value of held option legs, split by contract right.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OptionMarks {
    pub calls: Decimal,
    pub puts: Decimal,
}

impl OptionMarks {
    pub fn total(&self) -> Decimal {
        self.calls + self.puts
    }
}

/// Value every held option leg at today's closing side.
///
/// Long legs mark positive, short legs negative. A leg whose contract
/// is missing from the chain marks at zero.
pub fn mark_option_legs(
    inventory: &Inventory,
    chain: &OptionChain,
    shares_per_contract: u32,
) -> OptionMarks {
    let mut marks = OptionMarks::default();
    for position in &inventory.options {
        let qty = Decimal::from(position.totals.qty);
        for leg in &position.legs {
            let cost = chain
                .get(&leg.contract)
                .map(|quote| leg.order.leg_direction().exit_cost(quote, shares_per_contract))
                .unwrap_or(Decimal::ZERO);
            let value = -cost * qty;
            match leg.option_type {
                OptionType::Call => marks.calls += value,
                OptionType::Put => marks.puts += value,
            }
        }
    }
    marks
}

/// Value held stock at today's close. Unquoted symbols mark at zero.
pub fn mark_stocks(inventory: &Inventory, snapshot: &StockSnapshot) -> Decimal {
    inventory
        .stocks
        .iter()
        .map(|position| {
            snapshot.price(&position.symbol).unwrap_or(Decimal::ZERO)
                * Decimal::from(position.qty)
        })
        .sum()
}

/// One accounting row, appended after every simulated date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceRecord {
    pub date: NaiveDate,
    pub total_capital: Decimal,
    pub total_cash: Decimal,
    pub stock_capital: Decimal,
    pub option_capital: Decimal,
    pub call_capital: Decimal,
    pub put_capital: Decimal,
    pub stock_qty: i64,
    pub option_qty: i64,
    /// Fractional change from the previous row, filled in after the run
    pub pct_change: Option<Decimal>,
    /// Compounded growth with a base of 1.0, filled in after the run
    pub accumulated_return: Decimal,
}

/// Capital series produced by a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BalanceSeries {
    records: Vec<BalanceRecord>,
}

impl BalanceSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: BalanceRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[BalanceRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&BalanceRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Fill in per-row change and compounded growth.
    ///
    /// The first row carries no change and a growth of 1.0; every later
    /// row compounds on the one before it. A row following a zero total
    /// also carries no change.
    pub fn finalize(&mut self) {
        let mut previous: Option<Decimal> = None;
        let mut accumulated = Decimal::ONE;
        for record in &mut self.records {
            record.pct_change = previous.and_then(|prev| pct_change(prev, record.total_capital));
            if let Some(change) = record.pct_change {
                accumulated *= Decimal::ONE + change;
            }
            record.accumulated_return = accumulated;
            previous = Some(record.total_capital);
        }
    }

    /// Mean of the defined per-row changes.
    pub fn average_pct_change(&self) -> Decimal {
        let changes: Vec<Decimal> = self.records.iter().filter_map(|r| r.pct_change).collect();
        safe_div(
            changes.iter().copied().sum(),
            Decimal::from(changes.len() as u64),
        )
    }

    /// Write the series as CSV.
    pub fn to_csv(&self, path: &str) -> Result<()> {
        let mut file = std::fs::File::create(path)?;
        writeln!(
            file,
            "date,total_capital,total_cash,stock_capital,option_capital,call_capital,put_capital,stock_qty,option_qty,pct_change,accumulated_return"
        )?;
        for r in &self.records {
            writeln!(
                file,
                "{},{},{},{},{},{},{},{},{},{},{}",
                r.date,
                r.total_capital,
                r.total_cash,
                r.stock_capital,
                r.option_capital,
                r.call_capital,
                r.put_capital,
                r.stock_qty,
                r.option_qty,
                r.pct_change.map(|c| c.to_string()).unwrap_or_default(),
                r.accumulated_return
            )?;
        }
        Ok(())
    }
}

/// Runs the daily accounting pass: strategy exits first, then marks
/// whatever remains.
pub struct BalanceTracker {
    shares_per_contract: u32,
}

impl BalanceTracker {
    pub fn new(shares_per_contract: u32) -> Self {
        Self { shares_per_contract }
    }

    /// Process one date and produce its balance row.
    pub fn update<S: Strategy + ?Sized>(
        &self,
        state: &mut PortfolioState,
        strategy: &S,
        execution: &ExecutionEngine,
        stocks: &StockSnapshot,
        options: &OptionChain,
        date: NaiveDate,
    ) -> BalanceRecord {
        let exits = strategy.filter_exits(options, &state.inventory, date);
        execution.execute_exit(state, exits);

        let marks = mark_option_legs(&state.inventory, options, self.shares_per_contract);
        let option_capital = state.ledger.options_cash + marks.total();
        let stock_capital = state.ledger.stocks_cash + mark_stocks(&state.inventory, stocks);
        let total_capital = stock_capital + option_capital + state.ledger.reserve_cash;

        BalanceRecord {
            date,
            total_capital,
            total_cash: state.ledger.total_cash(),
            stock_capital,
            option_capital,
            call_capital: marks.calls,
            put_capital: marks.puts,
            stock_qty: state.inventory.stock_qty(),
            option_qty: state.inventory.option_qty(),
            pct_change: None,
            accumulated_return: Decimal::ONE,
        }
    }
}
