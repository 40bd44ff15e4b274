//! Error types for the backtesting engine.
//!
//! Setup and precondition failures are surfaced as typed errors so
//! callers can tell a misconfigured portfolio apart from bad data.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// Convenience alias used throughout the engine.
pub type Result<T> = std::result::Result<T, BacktestError>;

/// Errors raised while configuring or running a backtest.
#[derive(Error, Debug)]
pub enum BacktestError {
    /// An allocation weight was negative.
    #[error("allocation weight for {asset} is negative: {weight}")]
    NegativeWeight {
        /// Asset class the weight was given for
        asset: &'static str,
        /// The offending weight
        weight: Decimal,
    },

    /// Allocation weights sum to zero and cannot be normalized.
    #[error("allocation weights sum to zero and cannot be normalized")]
    ZeroAllocation,

    /// Stock target percentages must sum to exactly 1.0.
    #[error("stock target percentages sum to {sum}, expected exactly 1.0")]
    StockTargetSum {
        /// Actual sum of the configured percentages
        sum: Decimal,
    },

    /// A run was started without stock data attached.
    #[error("no stock data attached to the backtest")]
    MissingStockData,

    /// A run was started without option data attached.
    #[error("no option data attached to the backtest")]
    MissingOptionData,

    /// A run was started without a strategy attached.
    #[error("no strategy attached to the backtest")]
    MissingStrategy,

    /// The strategy expects a different option schema than the data provides.
    #[error("strategy schema does not match the option data schema")]
    SchemaMismatch,

    /// Stock and option data must cover exactly the same trading dates.
    #[error("stock data covers {stock_dates} dates but option data covers {option_dates}")]
    DateSetMismatch {
        /// Number of distinct dates in the stock data
        stock_dates: usize,
        /// Number of distinct dates in the option data
        option_dates: usize,
    },

    /// A stock targeted by the allocation has no quote on a rebalance date.
    #[error("no quote for stock {symbol} on {date}")]
    MissingStockQuote {
        /// Symbol that could not be priced
        symbol: String,
        /// Date the quote was needed
        date: NaiveDate,
    },

    /// The combined data stream produced no trading dates.
    #[error("no trading dates in the combined data stream")]
    NoTradingDates,
}
