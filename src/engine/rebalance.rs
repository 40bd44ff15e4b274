//! Periodic re-allocation to target weights.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::data::{OptionChain, StockSnapshot};
use crate::error::Result;
use crate::portfolio::{Allocation, PortfolioState, StockTarget};
use crate::strategy::Strategy;

use super::balance::{mark_option_legs, mark_stocks};
use super::execution::{EntryOutcome, ExecutionEngine};

/// What one rebalance did.
#[derive(Debug, Clone)]
pub struct RebalanceReport {
    pub date: NaiveDate,
    pub total_capital: Decimal,
    pub stocks_allocation: Decimal,
    pub options_allocation: Decimal,
    pub reserve: Decimal,
    pub stocks_spent: Decimal,
    pub entry: EntryOutcome,
}

/// Re-allocates the whole portfolio to target weights.
///
/// The day's strategy exits run and are logged first. Whatever the
/// strategy left in place is then liquidated wholesale at its marks
/// and both sides are rebuilt from cash, so only strategy-flagged
/// closes produce exit records.
pub struct Rebalancer {
    allocation: Allocation,
    stock_targets: Vec<StockTarget>,
    shares_per_contract: u32,
}

impl Rebalancer {
    pub fn new(
        allocation: Allocation,
        stock_targets: Vec<StockTarget>,
        shares_per_contract: u32,
    ) -> Self {
        Self {
            allocation,
            stock_targets,
            shares_per_contract,
        }
    }

    /// Exit, mark, re-split, and re-enter both sides of the portfolio.
    ///
    /// When nothing marks to a nonzero value the previously tracked
    /// total is reused, which covers the very first session while the
    /// cash pools are still empty.
    pub fn rebalance<S: Strategy + ?Sized>(
        &self,
        state: &mut PortfolioState,
        strategy: &mut S,
        execution: &ExecutionEngine,
        stocks: &StockSnapshot,
        options: &OptionChain,
        date: NaiveDate,
    ) -> Result<RebalanceReport> {
        let exits = strategy.filter_exits(options, &state.inventory, date);
        execution.execute_exit(state, exits);

        let marks = mark_option_legs(&state.inventory, options, self.shares_per_contract);
        let option_capital = state.ledger.options_cash + marks.total();
        let stock_capital = state.ledger.stocks_cash + mark_stocks(&state.inventory, stocks);

        let marked = stock_capital + option_capital;
        if marked != Decimal::ZERO {
            state.total_capital = marked + state.ledger.reserve_cash;
        }
        let total = state.total_capital;

        let split = self.allocation.split(total);
        debug!(
            "Rebalance split on {}: stocks {} / options {} / reserve {}",
            date, split.stocks, split.options, split.cash
        );

        // Wholesale liquidation; both sides are rebuilt from cash.
        state.inventory.reset();
        let spent = execution.resize_stocks(state, &self.stock_targets, stocks, split.stocks)?;
        state.ledger.stocks_cash = split.stocks - spent;
        state.ledger.options_cash = split.options;
        state.ledger.reserve_cash = split.cash;

        strategy.set_initial_capital(split.options);
        let candidates = strategy.filter_entries(options, &state.inventory, date);
        let entry = execution.execute_entry(state, candidates);

        info!(
            "📊 Rebalanced on {}: total {} (stocks {}, options {}, reserve {})",
            date, total, split.stocks, split.options, split.cash
        );

        Ok(RebalanceReport {
            date,
            total_capital: total,
            stocks_allocation: split.stocks,
            options_allocation: split.options,
            reserve: split.cash,
            stocks_spent: spent,
            entry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{OptionQuote, OptionSchema, OptionType, StockQuote};
    use crate::portfolio::{Inventory, OptionLeg, OptionPosition, PositionTotals};
    use crate::strategy::{
        Direction, DteConfig, DteLeg, DteStrategy, ExitSignals, LegDefinition, OrderTag,
    };
    use rust_decimal_macros::dec;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    /// Proposes nothing and remembers the capital it was handed.
    struct IdleStrategy {
        schema: OptionSchema,
        capital: Decimal,
    }

    impl IdleStrategy {
        fn new() -> Self {
            Self {
                schema: OptionSchema::default(),
                capital: Decimal::ZERO,
            }
        }
    }

    impl Strategy for IdleStrategy {
        fn schema(&self) -> &OptionSchema {
            &self.schema
        }

        fn legs(&self) -> &[LegDefinition] {
            &[]
        }

        fn initial_capital(&self) -> Decimal {
            self.capital
        }

        fn set_initial_capital(&mut self, capital: Decimal) {
            self.capital = capital;
        }

        fn filter_entries(
            &self,
            _chain: &OptionChain,
            _inventory: &Inventory,
            _date: NaiveDate,
        ) -> Vec<OptionPosition> {
            Vec::new()
        }

        fn filter_exits(
            &self,
            _chain: &OptionChain,
            inventory: &Inventory,
            _date: NaiveDate,
        ) -> ExitSignals {
            ExitSignals::none(inventory.options.len())
        }
    }

    fn snapshot_with_price(day: &str, price: Decimal) -> StockSnapshot {
        StockSnapshot::new(
            date(day),
            vec![StockQuote {
                symbol: "X".to_string(),
                close: price,
            }],
        )
    }

    fn full_stock_target() -> Vec<StockTarget> {
        vec![StockTarget {
            symbol: "X".to_string(),
            percentage: Decimal::ONE,
        }]
    }

    #[test]
    fn test_first_rebalance_falls_back_to_tracked_total() {
        let allocation = Allocation::new(dec!(0.5), dec!(0.5), Decimal::ZERO).unwrap();
        let rebalancer = Rebalancer::new(allocation, full_stock_target(), 100);
        let execution = ExecutionEngine::new(true);
        let mut state = PortfolioState::new(dec!(100000));
        let mut strategy = IdleStrategy::new();

        let report = rebalancer
            .rebalance(
                &mut state,
                &mut strategy,
                &execution,
                &snapshot_with_price("2020-01-02", dec!(250)),
                &OptionChain::new(date("2020-01-02"), Vec::new()),
                date("2020-01-02"),
            )
            .unwrap();

        // nothing marked, so the initial capital is split
        assert_eq!(report.total_capital, dec!(100000));
        assert_eq!(report.stocks_allocation, dec!(50000));
        assert_eq!(report.options_allocation, dec!(50000));
        // floor(50000/250) = 200 shares, fully spent
        assert_eq!(state.inventory.stocks[0].qty, 200);
        assert_eq!(state.ledger.stocks_cash, Decimal::ZERO);
        assert_eq!(state.ledger.options_cash, dec!(50000));
        assert_eq!(strategy.capital, dec!(50000));
    }

    #[test]
    fn test_rebalance_marks_holdings_before_splitting() {
        let allocation = Allocation::new(dec!(0.5), dec!(0.5), Decimal::ZERO).unwrap();
        let rebalancer = Rebalancer::new(allocation, full_stock_target(), 100);
        let execution = ExecutionEngine::new(true);
        let mut state = PortfolioState::new(dec!(100000));
        let mut strategy = IdleStrategy::new();

        // holdings from an earlier cycle: 200 shares and a long call
        state.inventory.add_stock("X", dec!(250), 200);
        state.inventory.add_option(OptionPosition {
            legs: vec![OptionLeg {
                contract: "C1".to_string(),
                underlying: "X".to_string(),
                expiration: date("2020-03-20"),
                option_type: OptionType::Call,
                strike: dec!(250),
                cost: dec!(500),
                order: OrderTag::Bto,
            }],
            totals: PositionTotals {
                cost: dec!(500),
                qty: 10,
                date: date("2020-01-02"),
            },
        });
        state.ledger.stocks_cash = dec!(1000);
        state.ledger.options_cash = dec!(2000);

        let chain = OptionChain::new(
            date("2020-02-03"),
            vec![OptionQuote {
                contract: "C1".to_string(),
                underlying: "X".to_string(),
                expiration: date("2020-03-20"),
                option_type: OptionType::Call,
                strike: dec!(250),
                bid: dec!(6.00),
                ask: dec!(6.20),
            }],
        );

        let report = rebalancer
            .rebalance(
                &mut state,
                &mut strategy,
                &execution,
                &snapshot_with_price("2020-02-03", dec!(260)),
                &chain,
                date("2020-02-03"),
            )
            .unwrap();

        // stocks: 200 * 260 + 1000 = 53000; options: 600 * 10 + 2000 = 8000
        assert_eq!(report.total_capital, dec!(61000.00));
        assert_eq!(state.total_capital, dec!(61000.00));
        assert_eq!(report.stocks_allocation, dec!(30500.00));
        // the strategy flagged no exit, so the stale position is
        // liquidated without an exit record
        assert_eq!(state.inventory.options.len(), 0);
        assert!(state.trade_log.is_empty());
        assert_eq!(state.ledger.options_cash, dec!(30500.00));
    }

    #[test]
    fn test_strategy_exit_on_a_rebalance_date_is_logged() {
        let allocation = Allocation::new(Decimal::ZERO, Decimal::ONE, Decimal::ZERO).unwrap();
        let rebalancer = Rebalancer::new(allocation, Vec::new(), 100);
        let execution = ExecutionEngine::new(true);
        let mut state = PortfolioState::new(dec!(10000));

        // long call from an earlier cycle, inside the exit threshold on
        // the rebalance date
        state.inventory.add_option(OptionPosition {
            legs: vec![OptionLeg {
                contract: "C1".to_string(),
                underlying: "X".to_string(),
                expiration: date("2020-03-20"),
                option_type: OptionType::Call,
                strike: dec!(250),
                cost: dec!(500),
                order: OrderTag::Bto,
            }],
            totals: PositionTotals {
                cost: dec!(500),
                qty: 10,
                date: date("2020-01-02"),
            },
        });

        // 46 DTE on 2020-02-03: under the exit threshold, outside the
        // entry window, so nothing re-enters
        let config = DteConfig {
            target_dte: 90,
            dte_window: 5,
            exit_dte: 60,
        };
        let legs = vec![DteLeg {
            name: "long_call".to_string(),
            direction: Direction::Buy,
            option_type: OptionType::Call,
        }];
        let mut strategy = DteStrategy::new(legs, config, 100);

        let chain = OptionChain::new(
            date("2020-02-03"),
            vec![OptionQuote {
                contract: "C1".to_string(),
                underlying: "X".to_string(),
                expiration: date("2020-03-20"),
                option_type: OptionType::Call,
                strike: dec!(250),
                bid: dec!(6.00),
                ask: dec!(6.20),
            }],
        );

        let report = rebalancer
            .rebalance(
                &mut state,
                &mut strategy,
                &execution,
                &StockSnapshot::new(date("2020-02-03"), Vec::new()),
                &chain,
                date("2020-02-03"),
            )
            .unwrap();

        // the close is logged at the bid before re-allocation
        assert_eq!(state.trade_log.len(), 1);
        assert_eq!(state.trade_log[0].legs[0].order, OrderTag::Stc);
        assert_eq!(state.trade_log[0].totals.cost, dec!(-600.00));
        assert_eq!(state.trade_log[0].totals.date, date("2020-02-03"));
        // settled cash is the whole portfolio: 600 * 10
        assert_eq!(report.total_capital, dec!(6000.00));
        assert_eq!(state.ledger.options_cash, dec!(6000.00));
        assert!(state.inventory.options.is_empty());
        assert!(matches!(report.entry, EntryOutcome::NoCandidates));
    }

    #[test]
    fn test_cash_weight_lands_in_the_reserve_pool() {
        let allocation = Allocation::new(dec!(0.4), dec!(0.4), dec!(0.2)).unwrap();
        let rebalancer = Rebalancer::new(allocation, full_stock_target(), 100);
        let execution = ExecutionEngine::new(true);
        let mut state = PortfolioState::new(dec!(100000));
        let mut strategy = IdleStrategy::new();

        rebalancer
            .rebalance(
                &mut state,
                &mut strategy,
                &execution,
                &snapshot_with_price("2020-01-02", dec!(400)),
                &OptionChain::new(date("2020-01-02"), Vec::new()),
                date("2020-01-02"),
            )
            .unwrap();

        assert_eq!(state.ledger.reserve_cash, dec!(20000));
        assert_eq!(state.ledger.options_cash, dec!(40000));
        // reserve is carried into the next marked total
        let report = rebalancer
            .rebalance(
                &mut state,
                &mut strategy,
                &execution,
                &snapshot_with_price("2020-02-03", dec!(400)),
                &OptionChain::new(date("2020-02-03"), Vec::new()),
                date("2020-02-03"),
            )
            .unwrap();
        assert_eq!(report.total_capital, dec!(100000));
    }

    #[test]
    fn test_missing_target_quote_fails_the_rebalance() {
        let allocation = Allocation::new(dec!(0.5), dec!(0.5), Decimal::ZERO).unwrap();
        let rebalancer = Rebalancer::new(allocation, full_stock_target(), 100);
        let execution = ExecutionEngine::new(true);
        let mut state = PortfolioState::new(dec!(100000));
        let mut strategy = IdleStrategy::new();

        let result = rebalancer.rebalance(
            &mut state,
            &mut strategy,
            &execution,
            &StockSnapshot::new(date("2020-01-02"), Vec::new()),
            &OptionChain::new(date("2020-01-02"), Vec::new()),
            date("2020-01-02"),
        );

        assert!(result.is_err());
    }
}
