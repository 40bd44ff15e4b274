//! Simulation driver.
//!
//! Walks the combined stock and option date stream, rebalances on
//! schedule boundaries, and books a balance row for every session.

use std::collections::HashSet;
use std::io::Write;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::data::{month_end_dates, OptionData, StockData};
use crate::error::{BacktestError, Result};
use crate::portfolio::{
    validate_stock_targets, Allocation, OptionPosition, PortfolioState, StockTarget,
};
use crate::strategy::Strategy;

use super::balance::{BalanceSeries, BalanceTracker};
use super::execution::ExecutionEngine;
use super::metrics::TradeStats;
use super::rebalance::Rebalancer;
use super::{rebalance_schedule, SimulationConfig};

/// Everything a finished run produced.
#[derive(Debug)]
pub struct BacktestReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub periods: usize,
    pub rebalances: usize,
    pub trade_log: Vec<OptionPosition>,
    pub balance: BalanceSeries,
    pub stats: TradeStats,
}

impl BacktestReport {
    /// Human-readable results block.
    pub fn summary(&self) -> String {
        format!(
            "Period: {} to {} ({} sessions, {} rebalances)\n{}",
            self.start_date,
            self.end_date,
            self.periods,
            self.rebalances,
            self.stats.summary()
        )
    }

    /// Write the trade log as CSV, one line per executed leg.
    pub fn trades_to_csv(&self, path: &str) -> anyhow::Result<()> {
        let mut file = std::fs::File::create(path)?;
        writeln!(
            file,
            "date,order,contract,underlying,expiration,type,strike,leg_cost,total_cost,qty"
        )?;
        for row in &self.trade_log {
            for leg in &row.legs {
                writeln!(
                    file,
                    "{},{},{},{},{},{},{},{},{},{}",
                    row.totals.date,
                    leg.order,
                    leg.contract,
                    leg.underlying,
                    leg.expiration,
                    leg.option_type,
                    leg.strike,
                    leg.cost,
                    row.totals.cost,
                    row.totals.qty
                )?;
            }
        }
        Ok(())
    }
}

/// A configured simulation: market data and a strategy bolted onto the
/// date loop that drives them.
pub struct Backtest {
    config: SimulationConfig,
    allocation: Allocation,
    stock_targets: Vec<StockTarget>,
    stocks: Option<StockData>,
    options: Option<OptionData>,
    strategy: Option<Box<dyn Strategy>>,
    state: PortfolioState,
    balance: BalanceSeries,
}

impl Backtest {
    pub fn new(config: SimulationConfig, allocation: Allocation) -> Self {
        let state = PortfolioState::new(config.initial_capital);
        Self {
            config,
            allocation,
            stock_targets: Vec::new(),
            stocks: None,
            options: None,
            strategy: None,
            state,
            balance: BalanceSeries::new(),
        }
    }

    /// Attach stock quote history.
    pub fn set_stocks(&mut self, data: StockData) {
        self.stocks = Some(data);
    }

    /// Attach option chain history.
    pub fn set_options(&mut self, data: OptionData) {
        self.options = Some(data);
    }

    /// Attach the strategy that drives entries and exits.
    pub fn set_strategy(&mut self, strategy: Box<dyn Strategy>) {
        self.strategy = Some(strategy);
    }

    /// Set the equity targets bought at every rebalance. Percentages
    /// must sum to exactly 1.0.
    pub fn set_stock_targets(&mut self, targets: Vec<StockTarget>) -> Result<()> {
        validate_stock_targets(&targets)?;
        self.stock_targets = targets;
        Ok(())
    }

    /// Portfolio state as of the last processed date.
    pub fn state(&self) -> &PortfolioState {
        &self.state
    }

    /// Balance series from the most recent run.
    pub fn balance(&self) -> &BalanceSeries {
        &self.balance
    }

    /// Run the full simulation.
    ///
    /// Requires stock data, option data, and a strategy whose schema
    /// matches the option data. Both feeds must cover exactly the same
    /// trading dates.
    pub fn run(&mut self) -> Result<BacktestReport> {
        let stocks = self.stocks.as_ref().ok_or(BacktestError::MissingStockData)?;
        let options = self
            .options
            .as_ref()
            .ok_or(BacktestError::MissingOptionData)?;
        let strategy = self
            .strategy
            .as_mut()
            .ok_or(BacktestError::MissingStrategy)?;

        if strategy.schema() != options.schema() {
            return Err(BacktestError::SchemaMismatch);
        }
        let stock_dates = stocks.dates();
        let option_dates = options.dates();
        if stock_dates != option_dates {
            return Err(BacktestError::DateSetMismatch {
                stock_dates: stock_dates.len(),
                option_dates: option_dates.len(),
            });
        }

        let dates = if self.config.monthly_steps {
            month_end_dates(&stock_dates)
        } else {
            stock_dates
        };
        let (first, last) = match (dates.first(), dates.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => return Err(BacktestError::NoTradingDates),
        };

        let schedule: HashSet<NaiveDate> =
            rebalance_schedule(first, last, self.config.rebalance_every_months)
                .into_iter()
                .collect();

        info!(
            "🚀 Starting backtest: {} to {} ({} sessions, initial capital {})",
            first,
            last,
            dates.len(),
            self.config.initial_capital
        );

        self.state = PortfolioState::new(self.config.initial_capital);
        self.balance = BalanceSeries::new();
        let execution = ExecutionEngine::new(self.config.stop_if_broke);
        let rebalancer = Rebalancer::new(
            self.allocation,
            self.stock_targets.clone(),
            self.config.shares_per_contract,
        );
        let tracker = BalanceTracker::new(self.config.shares_per_contract);
        let mut rebalances = 0usize;

        for (i, &date) in dates.iter().enumerate() {
            let (snapshot, chain) = match (stocks.snapshot(date), options.chain(date)) {
                (Some(snapshot), Some(chain)) => (snapshot, chain),
                _ => continue,
            };

            if i % 100 == 0 {
                debug!(
                    "Progress: {}/{} ({:.1}%) on {}",
                    i,
                    dates.len(),
                    i as f64 / dates.len() as f64 * 100.0,
                    date
                );
            }

            if i == 0 || schedule.contains(&date) {
                rebalancer.rebalance(
                    &mut self.state,
                    strategy.as_mut(),
                    &execution,
                    snapshot,
                    chain,
                    date,
                )?;
                rebalances += 1;
            }

            let record = tracker.update(
                &mut self.state,
                strategy.as_ref(),
                &execution,
                snapshot,
                chain,
                date,
            );
            self.balance.push(record);
        }

        self.balance.finalize();
        let stats = TradeStats::calculate(&self.state.trade_log, &self.balance);

        info!(
            "✅ Backtest complete: final capital {}",
            self.balance
                .last()
                .map(|r| r.total_capital)
                .unwrap_or(self.config.initial_capital)
        );

        Ok(BacktestReport {
            start_date: first,
            end_date: last,
            periods: dates.len(),
            rebalances,
            trade_log: self.state.trade_log.clone(),
            balance: self.balance.clone(),
            stats,
        })
    }
}
