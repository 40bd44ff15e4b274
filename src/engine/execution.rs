//! Order execution against portfolio state.
//!
//! Fills are frictionless: candidates execute at their quoted cost and
//! only the option cash pool gates admission.

use rust_decimal::Decimal;
use tracing::debug;

use crate::data::StockSnapshot;
use crate::error::{BacktestError, Result};
use crate::portfolio::{OptionPosition, PortfolioState, StockTarget};
use crate::strategy::ExitSignals;
use crate::utils::decimal::floor_qty;

/// Outcome of a single entry attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    /// The first candidate was admitted and booked.
    Filled {
        /// Cash debited from the option pool
        cost: Decimal,
    },
    /// The first candidate failed the affordability check.
    Rejected {
        required: Decimal,
        available: Decimal,
    },
    /// The strategy produced no candidates.
    NoCandidates,
}

/// Applies strategy signals to portfolio state.
pub struct ExecutionEngine {
    stop_if_broke: bool,
}

impl ExecutionEngine {
    pub fn new(stop_if_broke: bool) -> Self {
        Self { stop_if_broke }
    }

    /// Admit at most the first ranked candidate.
    ///
    /// Later candidates are dropped without being considered. With the
    /// affordability check on, an unaffordable first candidate is
    /// rejected silently instead of falling through to the next one.
    pub fn execute_entry(
        &self,
        state: &mut PortfolioState,
        candidates: Vec<OptionPosition>,
    ) -> EntryOutcome {
        let Some(candidate) = candidates.into_iter().next() else {
            return EntryOutcome::NoCandidates;
        };

        let total_price = candidate.total_price();
        if self.stop_if_broke && state.ledger.options_cash < total_price {
            debug!(
                "Entry rejected: needs {} but option cash is {}",
                total_price, state.ledger.options_cash
            );
            return EntryOutcome::Rejected {
                required: total_price,
                available: state.ledger.options_cash,
            };
        }

        state.ledger.options_cash -= total_price;
        state.trade_log.push(candidate.clone());
        state.inventory.add_option(candidate);
        EntryOutcome::Filled { cost: total_price }
    }

    /// Close rows unconditionally: log the exit records, drop the
    /// masked inventory rows, and settle the summed cash flow against
    /// the option pool.
    pub fn execute_exit(&self, state: &mut PortfolioState, signals: ExitSignals) {
        if signals.is_empty() {
            return;
        }
        let settled: Decimal = signals.costs.iter().copied().sum();
        state.trade_log.extend(signals.records);
        state.inventory.remove_options(&signals.mask);
        state.ledger.options_cash -= settled;
    }

    /// Rebuild stock holdings to the target split, returning the
    /// dollars spent.
    ///
    /// Every target must be quoted on the snapshot date. Quantities are
    /// floored, so the residual stays in stock cash.
    pub fn resize_stocks(
        &self,
        state: &mut PortfolioState,
        targets: &[StockTarget],
        snapshot: &StockSnapshot,
        stocks_allocation: Decimal,
    ) -> Result<Decimal> {
        let mut spent = Decimal::ZERO;
        for target in targets {
            let price = snapshot.price(&target.symbol).ok_or_else(|| {
                BacktestError::MissingStockQuote {
                    symbol: target.symbol.clone(),
                    date: snapshot.date,
                }
            })?;
            let qty = floor_qty(stocks_allocation * target.percentage, price);
            state.inventory.add_stock(&target.symbol, price, qty);
            spent += price * Decimal::from(qty);
        }
        Ok(spent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{OptionType, StockQuote};
    use crate::portfolio::{OptionLeg, PositionTotals};
    use crate::strategy::OrderTag;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 2).unwrap()
    }

    fn make_position(contract: &str, cost: Decimal, qty: i64) -> OptionPosition {
        OptionPosition {
            legs: vec![OptionLeg {
                contract: contract.to_string(),
                underlying: "SPY".to_string(),
                expiration: NaiveDate::from_ymd_opt(2020, 2, 21).unwrap(),
                option_type: OptionType::Call,
                strike: dec!(320),
                cost,
                order: OrderTag::Bto,
            }],
            totals: PositionTotals {
                cost,
                qty,
                date: date(),
            },
        }
    }

    fn make_exit_signals(cost: Decimal, qty: i64) -> ExitSignals {
        let mut record = make_position("C1", cost, qty);
        record.legs[0].order = OrderTag::Stc;
        ExitSignals {
            costs: vec![record.total_price()],
            records: vec![record],
            mask: vec![true],
        }
    }

    fn state_with_cash(options_cash: Decimal) -> PortfolioState {
        let mut state = PortfolioState::new(dec!(100000));
        state.ledger.options_cash = options_cash;
        state
    }

    // ============================================================
    // Entries
    // ============================================================

    #[test]
    fn test_only_the_first_candidate_is_admitted() {
        let engine = ExecutionEngine::new(true);
        let mut state = state_with_cash(dec!(10000));

        let outcome = engine.execute_entry(
            &mut state,
            vec![
                make_position("C1", dec!(500), 2),
                make_position("C2", dec!(100), 1),
            ],
        );

        assert_eq!(outcome, EntryOutcome::Filled { cost: dec!(1000) });
        assert_eq!(state.inventory.options.len(), 1);
        assert_eq!(state.inventory.options[0].legs[0].contract, "C1");
        assert_eq!(state.trade_log.len(), 1);
        assert_eq!(state.ledger.options_cash, dec!(9000));
    }

    #[test]
    fn test_unaffordable_entry_is_rejected_silently() {
        let engine = ExecutionEngine::new(true);
        let mut state = state_with_cash(dec!(1.50));

        let outcome = engine.execute_entry(&mut state, vec![make_position("C1", dec!(2.00), 1)]);

        assert_eq!(
            outcome,
            EntryOutcome::Rejected {
                required: dec!(2.00),
                available: dec!(1.50),
            }
        );
        assert!(state.inventory.options.is_empty());
        assert!(state.trade_log.is_empty());
        assert_eq!(state.ledger.options_cash, dec!(1.50));
    }

    #[test]
    fn test_disabled_check_lets_cash_go_negative() {
        let engine = ExecutionEngine::new(false);
        let mut state = state_with_cash(dec!(1.50));

        let outcome = engine.execute_entry(&mut state, vec![make_position("C1", dec!(2.00), 1)]);

        assert_eq!(outcome, EntryOutcome::Filled { cost: dec!(2.00) });
        assert_eq!(state.ledger.options_cash, dec!(-0.50));
        assert_eq!(state.inventory.options.len(), 1);
    }

    #[test]
    fn test_credit_entries_always_pass_the_check() {
        let engine = ExecutionEngine::new(true);
        let mut state = state_with_cash(Decimal::ZERO);

        let outcome = engine.execute_entry(&mut state, vec![make_position("C1", dec!(-860), 5)]);

        assert_eq!(outcome, EntryOutcome::Filled { cost: dec!(-4300) });
        assert_eq!(state.ledger.options_cash, dec!(4300));
    }

    #[test]
    fn test_no_candidates() {
        let engine = ExecutionEngine::new(true);
        let mut state = state_with_cash(dec!(10000));

        let outcome = engine.execute_entry(&mut state, Vec::new());

        assert_eq!(outcome, EntryOutcome::NoCandidates);
        assert!(state.trade_log.is_empty());
    }

    // ============================================================
    // Exits
    // ============================================================

    #[test]
    fn test_exit_settles_cash_and_removes_rows() {
        let engine = ExecutionEngine::new(true);
        let mut state = state_with_cash(Decimal::ZERO);
        state.inventory.add_option(make_position("C1", dec!(500), 20));

        // closing a long at the bid: -580 per unit, 20 units
        engine.execute_exit(&mut state, make_exit_signals(dec!(-580), 20));

        assert!(state.inventory.options.is_empty());
        assert_eq!(state.ledger.options_cash, dec!(11600));
        assert_eq!(state.trade_log.len(), 1);
        assert_eq!(state.trade_log[0].legs[0].order, OrderTag::Stc);
    }

    #[test]
    fn test_exit_runs_regardless_of_cash() {
        let engine = ExecutionEngine::new(true);
        let mut state = state_with_cash(dec!(-5000));
        state.inventory.add_option(make_position("C1", dec!(-860), 5));

        // closing a short debits: +900 per unit, 5 units
        engine.execute_exit(&mut state, make_exit_signals(dec!(900), 5));

        assert!(state.inventory.options.is_empty());
        assert_eq!(state.ledger.options_cash, dec!(-9500));
    }

    #[test]
    fn test_empty_signals_change_nothing() {
        let engine = ExecutionEngine::new(true);
        let mut state = state_with_cash(dec!(1000));
        state.inventory.add_option(make_position("C1", dec!(500), 1));

        engine.execute_exit(&mut state, ExitSignals::none(1));

        assert_eq!(state.inventory.options.len(), 1);
        assert_eq!(state.ledger.options_cash, dec!(1000));
        assert!(state.trade_log.is_empty());
    }

    // ============================================================
    // Stock resizing
    // ============================================================

    #[test]
    fn test_resize_floors_quantities() {
        let engine = ExecutionEngine::new(true);
        let mut state = PortfolioState::new(dec!(100000));
        let snapshot = StockSnapshot::new(
            date(),
            vec![StockQuote {
                symbol: "X".to_string(),
                close: dec!(300),
            }],
        );
        let targets = vec![StockTarget {
            symbol: "X".to_string(),
            percentage: Decimal::ONE,
        }];

        let spent = engine
            .resize_stocks(&mut state, &targets, &snapshot, dec!(1000))
            .unwrap();

        assert_eq!(spent, dec!(900));
        assert_eq!(state.inventory.stocks.len(), 1);
        assert_eq!(state.inventory.stocks[0].qty, 3);
    }

    #[test]
    fn test_resize_splits_across_targets() {
        let engine = ExecutionEngine::new(true);
        let mut state = PortfolioState::new(dec!(100000));
        let snapshot = StockSnapshot::new(
            date(),
            vec![
                StockQuote {
                    symbol: "SPY".to_string(),
                    close: dec!(320),
                },
                StockQuote {
                    symbol: "QQQ".to_string(),
                    close: dec!(215),
                },
            ],
        );
        let targets = vec![
            StockTarget {
                symbol: "SPY".to_string(),
                percentage: dec!(0.6),
            },
            StockTarget {
                symbol: "QQQ".to_string(),
                percentage: dec!(0.4),
            },
        ];

        let spent = engine
            .resize_stocks(&mut state, &targets, &snapshot, dec!(50000))
            .unwrap();

        // SPY: floor(30000/320) = 93 for 29760; QQQ: floor(20000/215) = 93 for 19995
        assert_eq!(state.inventory.stocks[0].qty, 93);
        assert_eq!(state.inventory.stocks[1].qty, 93);
        assert_eq!(spent, dec!(49755));
    }

    #[test]
    fn test_resize_requires_quotes_for_every_target() {
        let engine = ExecutionEngine::new(true);
        let mut state = PortfolioState::new(dec!(100000));
        let snapshot = StockSnapshot::new(date(), Vec::new());
        let targets = vec![StockTarget {
            symbol: "SPY".to_string(),
            percentage: Decimal::ONE,
        }];

        let result = engine.resize_stocks(&mut state, &targets, &snapshot, dec!(1000));

        assert!(matches!(
            result,
            Err(BacktestError::MissingStockQuote { ref symbol, .. }) if symbol == "SPY"
        ));
    }
}
