//! Simulation engine.
//!
//! Handles:
//! - Execution: applying strategy signals to portfolio state
//! - Rebalancing: periodic re-allocation to target weights
//! - Balance tracking: per-date mark-to-market accounting
//! - The driver that walks the combined date stream
//! - Trade statistics over the finished log

mod balance;
mod driver;
mod execution;
mod metrics;
mod rebalance;

pub use balance::{
    mark_option_legs, mark_stocks, BalanceRecord, BalanceSeries, BalanceTracker, OptionMarks,
};
pub use driver::{Backtest, BacktestReport};
pub use execution::{EntryOutcome, ExecutionEngine};
pub use metrics::TradeStats;
pub use rebalance::{RebalanceReport, Rebalancer};

use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Driver settings for one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Capital the portfolio starts with
    #[serde(default = "default_initial_capital")]
    pub initial_capital: Decimal,
    /// Months between scheduled rebalances; zero disables the schedule
    #[serde(default = "default_rebalance_months")]
    pub rebalance_every_months: u32,
    /// Step one calendar month at a time instead of daily
    #[serde(default)]
    pub monthly_steps: bool,
    /// Reject entries the option cash pool cannot cover
    #[serde(default = "default_stop_if_broke")]
    pub stop_if_broke: bool,
    /// Shares represented by one option contract
    #[serde(default = "default_shares_per_contract")]
    pub shares_per_contract: u32,
}

fn default_initial_capital() -> Decimal {
    dec!(1_000_000)
}

fn default_rebalance_months() -> u32 {
    1
}

fn default_stop_if_broke() -> bool {
    true
}

fn default_shares_per_contract() -> u32 {
    100
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_capital: default_initial_capital(),
            rebalance_every_months: default_rebalance_months(),
            monthly_steps: false,
            stop_if_broke: default_stop_if_broke(),
            shares_per_contract: default_shares_per_contract(),
        }
    }
}

/// First weekday (Monday to Friday) of a calendar month.
fn first_business_day(year: i32, month: u32) -> Option<NaiveDate> {
    let mut day = NaiveDate::from_ymd_opt(year, month, 1)?;
    while matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
        day = day.succ_opt()?;
    }
    Some(day)
}

/// Scheduled rebalance dates inside `[start, end]`.
///
/// Rebalances land on the first business day of every
/// `every_months`-th month, anchored at the first such day on or after
/// `start`. Zero months disables the schedule entirely. A scheduled
/// day with no market data is simply never reached by the driver.
pub fn rebalance_schedule(start: NaiveDate, end: NaiveDate, every_months: u32) -> Vec<NaiveDate> {
    if every_months == 0 {
        return Vec::new();
    }

    let mut schedule = Vec::new();
    let (mut year, mut month) = (start.year(), start.month());
    let mut stride = 0u32;
    loop {
        match first_business_day(year, month) {
            Some(day) if day > end => break,
            Some(day) => {
                if day >= start {
                    if stride == 0 {
                        schedule.push(day);
                    }
                    stride = (stride + 1) % every_months;
                }
            }
            None => break,
        }
        month += 1;
        if month > 12 {
            month = 1;
            year += 1;
        }
    }
    schedule
}
