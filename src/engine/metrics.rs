//! Trade statistics over a finished run.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::portfolio::OptionPosition;
use crate::utils::decimal::safe_div;

use super::balance::BalanceSeries;

/// Aggregate results from the trade log and balance series.
///
/// Realized figures are dollar amounts: each entry is paired with the
/// first later exit on the same first-leg contract, and their settled
/// costs (per-unit cost times quantity) are summed. A negative
/// round-trip cost is a win; break-even trips count as losses.
#[derive(Debug, Clone, Serialize)]
pub struct TradeStats {
    /// Matched entry/exit round trips
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_pct: Decimal,
    /// Worst realized dollar loss, floored at zero
    pub largest_loss: Decimal,
    /// Gross profit over gross loss; `None` when nothing was lost
    pub profit_factor: Option<Decimal>,
    /// Mean realized dollar profit
    pub average_profit: Decimal,
    /// Mean per-date capital change, in percent
    pub average_daily_pnl_pct: Decimal,
    /// Compounded capital change over the whole run, in percent
    pub total_pnl_pct: Decimal,
}

impl TradeStats {
    /// Pair entries with exits and aggregate.
    pub fn calculate(trade_log: &[OptionPosition], balance: &BalanceSeries) -> Self {
        let trips = round_trip_costs(trade_log);

        let wins = trips.iter().filter(|&&c| c < Decimal::ZERO).count();
        let losses = trips.iter().filter(|&&c| c >= Decimal::ZERO).count();
        let largest_loss = trips
            .iter()
            .copied()
            .max()
            .filter(|&c| c > Decimal::ZERO)
            .unwrap_or(Decimal::ZERO);
        let gross_profit: Decimal = trips
            .iter()
            .filter(|&&c| c < Decimal::ZERO)
            .map(|&c| -c)
            .sum();
        let gross_loss: Decimal = trips.iter().filter(|&&c| c > Decimal::ZERO).copied().sum();
        let profit_factor = if gross_loss == Decimal::ZERO {
            None
        } else {
            Some(gross_profit / gross_loss)
        };
        let average_profit = safe_div(
            trips.iter().map(|&c| -c).sum(),
            Decimal::from(trips.len() as u64),
        );
        let total_pnl_pct = balance
            .last()
            .map(|record| (record.accumulated_return - Decimal::ONE) * dec!(100))
            .unwrap_or(Decimal::ZERO);

        Self {
            total_trades: trips.len(),
            wins,
            losses,
            win_pct: safe_div(
                Decimal::from(wins as u64),
                Decimal::from(trips.len() as u64),
            ) * dec!(100),
            largest_loss,
            profit_factor,
            average_profit,
            average_daily_pnl_pct: balance.average_pct_change() * dec!(100),
            total_pnl_pct,
        }
    }

    /// Render a results block.
    pub fn summary(&self) -> String {
        let profit_factor = self
            .profit_factor
            .map(|pf| pf.round_dp(2).to_string())
            .unwrap_or_else(|| "inf".to_string());
        format!(
            r#"
═══════════════════════════════════════════
            BACKTEST RESULTS
═══════════════════════════════════════════
  Total trades:      {}
  Wins / losses:     {} / {}
  Win rate:          {}%
  Largest loss:      {}
  Profit factor:     {}
  Average profit:    {}
  Avg daily P&L:     {}%
  Total P&L:         {}%
═══════════════════════════════════════════
"#,
            self.total_trades,
            self.wins,
            self.losses,
            self.win_pct.round_dp(2),
            self.largest_loss.round_dp(2),
            profit_factor,
            self.average_profit.round_dp(2),
            self.average_daily_pnl_pct.round_dp(4),
            self.total_pnl_pct.round_dp(2),
        )
    }
}

/// Settled round-trip cost, in dollars, for each entry matched to a
/// later exit on the same first-leg contract. Entries with no matching
/// exit are skipped.
fn round_trip_costs(trade_log: &[OptionPosition]) -> Vec<Decimal> {
    let mut trips = Vec::new();
    for (i, entry) in trade_log.iter().enumerate() {
        let Some(first) = entry.legs.first() else {
            continue;
        };
        if !first.order.is_entry() {
            continue;
        }
        let exit = trade_log[i + 1..].iter().find(|row| {
            row.legs
                .first()
                .map(|leg| !leg.order.is_entry() && leg.contract == first.contract)
                .unwrap_or(false)
        });
        if let Some(exit) = exit {
            trips.push(entry.total_price() + exit.total_price());
        }
    }
    trips
}
