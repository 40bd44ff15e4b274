//! Historical stock quote loading.
//!
//! Quotes arrive as CSV with one row per symbol per trading date. Column
//! names are resolved through an explicit schema so feeds from different
//! vendors can be mapped without rewriting the file.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Column names expected in a stock quote file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSchema {
    pub date: String,
    pub symbol: String,
    pub adj_close: String,
}

impl Default for StockSchema {
    fn default() -> Self {
        Self {
            date: "date".to_string(),
            symbol: "symbol".to_string(),
            adj_close: "adj_close".to_string(),
        }
    }
}

/// Column positions resolved against one file's header.
struct StockColumns {
    date: usize,
    symbol: usize,
    adj_close: usize,
}

impl StockColumns {
    fn resolve(header: &str, schema: &StockSchema) -> Result<Self> {
        let names: Vec<&str> = header.split(',').map(str::trim).collect();
        let position = |column: &str| {
            names
                .iter()
                .position(|name| *name == column)
                .with_context(|| format!("Missing column '{}' in header: {}", column, header))
        };
        Ok(Self {
            date: position(&schema.date)?,
            symbol: position(&schema.symbol)?,
            adj_close: position(&schema.adj_close)?,
        })
    }

    fn width(&self) -> usize {
        self.date.max(self.symbol).max(self.adj_close) + 1
    }
}

/// A single quote for one symbol on one date.
#[derive(Debug, Clone)]
pub struct StockQuote {
    pub symbol: String,
    pub close: Decimal,
}

impl StockQuote {
    fn parse(line: &str, columns: &StockColumns) -> Result<(NaiveDate, Self)> {
        let parts: Vec<&str> = line.split(',').collect();
        if parts.len() < columns.width() {
            anyhow::bail!(
                "Invalid CSV row: expected at least {} fields, got {}",
                columns.width(),
                parts.len()
            );
        }

        let date = NaiveDate::parse_from_str(parts[columns.date].trim(), "%Y-%m-%d")
            .with_context(|| format!("Invalid date: {}", parts[columns.date]))?;
        let symbol = parts[columns.symbol].trim().to_string();
        let close = parts[columns.adj_close]
            .trim()
            .parse()
            .with_context(|| format!("Invalid close price: {}", parts[columns.adj_close]))?;

        Ok((date, Self { symbol, close }))
    }
}

/// All stock quotes for a single trading date, indexed by symbol.
#[derive(Debug, Clone)]
pub struct StockSnapshot {
    pub date: NaiveDate,
    pub quotes: Vec<StockQuote>,
    index: HashMap<String, usize>,
}

impl StockSnapshot {
    pub fn new(date: NaiveDate, quotes: Vec<StockQuote>) -> Self {
        let index = quotes
            .iter()
            .enumerate()
            .map(|(i, quote)| (quote.symbol.clone(), i))
            .collect();
        Self {
            date,
            quotes,
            index,
        }
    }

    /// Adjusted close for `symbol`, if quoted on this date.
    pub fn price(&self, symbol: &str) -> Option<Decimal> {
        self.index.get(symbol).map(|&i| self.quotes[i].close)
    }

    pub fn get(&self, symbol: &str) -> Option<&StockQuote> {
        self.index.get(symbol).map(|&i| &self.quotes[i])
    }
}

/// Full stock quote history, one snapshot per trading date.
#[derive(Debug, Clone)]
pub struct StockData {
    snapshots: Vec<StockSnapshot>,
}

impl StockData {
    /// Load quotes from a CSV file using the default schema.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_schema(path, StockSchema::default())
    }

    /// Load quotes from a CSV file with explicit column names.
    pub fn load_with_schema<P: AsRef<Path>>(path: P, schema: StockSchema) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read stock data file: {}", path.as_ref().display())
        })?;
        Self::from_csv_content(&content, &schema)
    }

    /// Parse quotes from CSV content. The first non-empty line is the header.
    pub fn from_csv_content(content: &str, schema: &StockSchema) -> Result<Self> {
        let mut lines = content.lines().filter(|line| !line.trim().is_empty());
        let header = lines.next().context("Stock data is empty")?;
        let columns = StockColumns::resolve(header, schema)?;

        let mut by_date: BTreeMap<NaiveDate, Vec<StockQuote>> = BTreeMap::new();
        for line in lines {
            let (date, quote) = StockQuote::parse(line, &columns)?;
            by_date.entry(date).or_default().push(quote);
        }
        if by_date.is_empty() {
            anyhow::bail!("No quote rows found in stock data");
        }

        let snapshots = by_date
            .into_iter()
            .map(|(date, quotes)| StockSnapshot::new(date, quotes))
            .collect();
        Ok(Self { snapshots })
    }

    /// Build directly from snapshots, mainly for tests.
    pub fn from_snapshots(mut snapshots: Vec<StockSnapshot>) -> Self {
        snapshots.sort_by_key(|s| s.date);
        Self { snapshots }
    }

    /// Distinct trading dates in ascending order.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.snapshots.iter().map(|s| s.date).collect()
    }

    /// Snapshot for one date, if present.
    pub fn snapshot(&self, date: NaiveDate) -> Option<&StockSnapshot> {
        self.snapshots
            .binary_search_by_key(&date, |s| s.date)
            .ok()
            .map(|i| &self.snapshots[i])
    }

    /// First and last trading date covered.
    pub fn available_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.snapshots.first(), self.snapshots.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date)),
            _ => None,
        }
    }

    /// Distinct symbols across all dates, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: BTreeSet<&str> = BTreeSet::new();
        for snapshot in &self.snapshots {
            for quote in &snapshot.quotes {
                symbols.insert(&quote.symbol);
            }
        }
        symbols.into_iter().map(str::to_string).collect()
    }

    /// Restrict to dates within `[start, end]` inclusive.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> Self {
        let snapshots = self
            .snapshots
            .iter()
            .filter(|s| s.date >= start && s.date <= end)
            .cloned()
            .collect();
        Self { snapshots }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
