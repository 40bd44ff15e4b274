//! Market data loading and calendar utilities.
//!
//! Handles CSV parsing of stock quotes and option chains, builds
//! per-date snapshots with typed key indexes, and derives the trading
//! calendars the simulation steps through.

mod options;
mod stocks;

pub use options::{OptionChain, OptionData, OptionQuote, OptionSchema, OptionType};
pub use stocks::{StockData, StockQuote, StockSchema, StockSnapshot};

use chrono::{Datelike, NaiveDate};

/// Last trading date of each calendar month in an ascending date list.
///
/// Used for monthly stepping, where only the final session of a month
/// is simulated.
pub fn month_end_dates(dates: &[NaiveDate]) -> Vec<NaiveDate> {
    let mut ends: Vec<NaiveDate> = Vec::new();
    for &date in dates {
        match ends.last_mut() {
            Some(last) if (last.year(), last.month()) == (date.year(), date.month()) => {
                *last = date;
            }
            _ => ends.push(date),
        }
    }
    ends
}
