//! Option chain loading.
//!
//! A chain file carries one row per contract per quote date. Strategies
//! declare the schema they expect, and the engine refuses to run when the
//! loaded data was mapped through a different one.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Contract right: call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn as_str(self) -> &'static str {
        match self {
            OptionType::Call => "call",
            OptionType::Put => "put",
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" | "c" => Ok(OptionType::Call),
            "put" | "p" => Ok(OptionType::Put),
            other => anyhow::bail!("Unknown option type: {}", other),
        }
    }
}

/// Column names expected in an option chain file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSchema {
    pub date: String,
    pub contract: String,
    pub underlying: String,
    pub expiration: String,
    pub option_type: String,
    pub strike: String,
    pub bid: String,
    pub ask: String,
}

impl Default for OptionSchema {
    fn default() -> Self {
        Self {
            date: "quote_date".to_string(),
            contract: "contract".to_string(),
            underlying: "underlying".to_string(),
            expiration: "expiration".to_string(),
            option_type: "type".to_string(),
            strike: "strike".to_string(),
            bid: "bid".to_string(),
            ask: "ask".to_string(),
        }
    }
}

/// Column positions resolved against one file's header.
struct OptionColumns {
    date: usize,
    contract: usize,
    underlying: usize,
    expiration: usize,
    option_type: usize,
    strike: usize,
    bid: usize,
    ask: usize,
}

impl OptionColumns {
    fn resolve(header: &str, schema: &OptionSchema) -> Result<Self> {
        let names: Vec<&str> = header.split(',').map(str::trim).collect();
        let position = |column: &str| {
            names
                .iter()
                .position(|name| *name == column)
                .with_context(|| format!("Missing column '{}' in header: {}", column, header))
        };
        Ok(Self {
            date: position(&schema.date)?,
            contract: position(&schema.contract)?,
            underlying: position(&schema.underlying)?,
            expiration: position(&schema.expiration)?,
            option_type: position(&schema.option_type)?,
            strike: position(&schema.strike)?,
            bid: position(&schema.bid)?,
            ask: position(&schema.ask)?,
        })
    }

    fn width(&self) -> usize {
        let fields = [
            self.date,
            self.contract,
            self.underlying,
            self.expiration,
            self.option_type,
            self.strike,
            self.bid,
            self.ask,
        ];
        fields.iter().copied().max().unwrap_or(0) + 1
    }
}

/// One contract's quote on one date.
#[derive(Debug, Clone)]
pub struct OptionQuote {
    pub contract: String,
    pub underlying: String,
    pub expiration: NaiveDate,
    pub option_type: OptionType,
    pub strike: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
}

impl OptionQuote {
    /// Calendar days from `date` until this contract expires.
    pub fn days_to_expiration(&self, date: NaiveDate) -> i64 {
        (self.expiration - date).num_days()
    }

    fn parse(line: &str, columns: &OptionColumns) -> Result<(NaiveDate, Self)> {
        let parts: Vec<&str> = line.split(',').collect();
        if parts.len() < columns.width() {
            anyhow::bail!(
                "Invalid CSV row: expected at least {} fields, got {}",
                columns.width(),
                parts.len()
            );
        }

        let date = NaiveDate::parse_from_str(parts[columns.date].trim(), "%Y-%m-%d")
            .with_context(|| format!("Invalid quote date: {}", parts[columns.date]))?;
        let expiration = NaiveDate::parse_from_str(parts[columns.expiration].trim(), "%Y-%m-%d")
            .with_context(|| format!("Invalid expiration: {}", parts[columns.expiration]))?;
        let option_type = parts[columns.option_type]
            .parse()
            .with_context(|| format!("Invalid option type: {}", parts[columns.option_type]))?;
        let strike = parts[columns.strike]
            .trim()
            .parse()
            .with_context(|| format!("Invalid strike: {}", parts[columns.strike]))?;
        let bid = parts[columns.bid]
            .trim()
            .parse()
            .with_context(|| format!("Invalid bid: {}", parts[columns.bid]))?;
        let ask = parts[columns.ask]
            .trim()
            .parse()
            .with_context(|| format!("Invalid ask: {}", parts[columns.ask]))?;

        Ok((
            date,
            Self {
                contract: parts[columns.contract].trim().to_string(),
                underlying: parts[columns.underlying].trim().to_string(),
                expiration,
                option_type,
                strike,
                bid,
                ask,
            },
        ))
    }
}

/// All option quotes for a single trading date, indexed by contract.
#[derive(Debug, Clone)]
pub struct OptionChain {
    pub date: NaiveDate,
    pub quotes: Vec<OptionQuote>,
    index: HashMap<String, usize>,
}

impl OptionChain {
    pub fn new(date: NaiveDate, quotes: Vec<OptionQuote>) -> Self {
        let index = quotes
            .iter()
            .enumerate()
            .map(|(i, quote)| (quote.contract.clone(), i))
            .collect();
        Self {
            date,
            quotes,
            index,
        }
    }

    /// Quote for `contract`, if present in this chain.
    pub fn get(&self, contract: &str) -> Option<&OptionQuote> {
        self.index.get(contract).map(|&i| &self.quotes[i])
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

/// Full option chain history, one chain per trading date.
#[derive(Debug, Clone)]
pub struct OptionData {
    schema: OptionSchema,
    chains: Vec<OptionChain>,
}

impl OptionData {
    /// Load chains from a CSV file using the default schema.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_schema(path, OptionSchema::default())
    }

    /// Load chains from a CSV file with explicit column names.
    pub fn load_with_schema<P: AsRef<Path>>(path: P, schema: OptionSchema) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read option data file: {}", path.as_ref().display())
        })?;
        Self::from_csv_content(&content, schema)
    }

    /// Parse chains from CSV content. The first non-empty line is the header.
    pub fn from_csv_content(content: &str, schema: OptionSchema) -> Result<Self> {
        let mut lines = content.lines().filter(|line| !line.trim().is_empty());
        let header = lines.next().context("Option data is empty")?;
        let columns = OptionColumns::resolve(header, &schema)?;

        let mut by_date: BTreeMap<NaiveDate, Vec<OptionQuote>> = BTreeMap::new();
        for line in lines {
            let (date, quote) = OptionQuote::parse(line, &columns)?;
            by_date.entry(date).or_default().push(quote);
        }
        if by_date.is_empty() {
            anyhow::bail!("No quote rows found in option data");
        }

        let chains = by_date
            .into_iter()
            .map(|(date, quotes)| OptionChain::new(date, quotes))
            .collect();
        Ok(Self { schema, chains })
    }

    /// Build directly from chains, mainly for tests.
    pub fn from_chains(mut chains: Vec<OptionChain>) -> Self {
        chains.sort_by_key(|c| c.date);
        Self {
            schema: OptionSchema::default(),
            chains,
        }
    }

    /// The schema this data was mapped through.
    pub fn schema(&self) -> &OptionSchema {
        &self.schema
    }

    /// Distinct trading dates in ascending order.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.chains.iter().map(|c| c.date).collect()
    }

    /// Chain for one date, if present.
    pub fn chain(&self, date: NaiveDate) -> Option<&OptionChain> {
        self.chains
            .binary_search_by_key(&date, |c| c.date)
            .ok()
            .map(|i| &self.chains[i])
    }

    /// First and last trading date covered.
    pub fn available_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.chains.first(), self.chains.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date)),
            _ => None,
        }
    }

    /// Restrict to dates within `[start, end]` inclusive.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> Self {
        let chains = self
            .chains
            .iter()
            .filter(|c| c.date >= start && c.date <= end)
            .cloned()
            .collect();
        Self {
            schema: self.schema.clone(),
            chains,
        }
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE_CSV: &str = "\
quote_date,contract,underlying,expiration,type,strike,bid,ask
2020-01-02,SPY200221C00320000,SPY,2020-02-21,call,320.0,5.10,5.30
2020-01-02,SPY200221P00310000,SPY,2020-02-21,put,310.0,4.80,5.00
2020-01-03,SPY200221C00320000,SPY,2020-02-21,call,320.0,4.20,4.40
";

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_parse_groups_by_date() {
        let data = OptionData::from_csv_content(SAMPLE_CSV, OptionSchema::default()).unwrap();

        assert_eq!(data.len(), 2);
        assert_eq!(data.dates(), vec![date("2020-01-02"), date("2020-01-03")]);
        assert_eq!(data.chain(date("2020-01-02")).unwrap().len(), 2);
        assert_eq!(data.chain(date("2020-01-03")).unwrap().len(), 1);
    }

    #[test]
    fn test_contract_lookup() {
        let data = OptionData::from_csv_content(SAMPLE_CSV, OptionSchema::default()).unwrap();
        let chain = data.chain(date("2020-01-02")).unwrap();

        let call = chain.get("SPY200221C00320000").unwrap();
        assert_eq!(call.option_type, OptionType::Call);
        assert_eq!(call.strike, dec!(320.0));
        assert_eq!(call.bid, dec!(5.10));
        assert_eq!(call.ask, dec!(5.30));
        assert!(chain.get("SPY200221C00999000").is_none());
    }

    #[test]
    fn test_days_to_expiration() {
        let data = OptionData::from_csv_content(SAMPLE_CSV, OptionSchema::default()).unwrap();
        let chain = data.chain(date("2020-01-02")).unwrap();
        let call = chain.get("SPY200221C00320000").unwrap();

        assert_eq!(call.days_to_expiration(date("2020-01-02")), 50);
        assert_eq!(call.days_to_expiration(date("2020-02-21")), 0);
    }

    #[test]
    fn test_option_type_parsing() {
        assert_eq!("call".parse::<OptionType>().unwrap(), OptionType::Call);
        assert_eq!("PUT".parse::<OptionType>().unwrap(), OptionType::Put);
        assert_eq!("C".parse::<OptionType>().unwrap(), OptionType::Call);
        assert!("straddle".parse::<OptionType>().is_err());
    }

    #[test]
    fn test_missing_column_is_rejected() {
        let csv = "quote_date,contract,underlying\n2020-01-02,X,SPY\n";
        let result = OptionData::from_csv_content(csv, OptionSchema::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_expiration_is_rejected() {
        let csv = "\
quote_date,contract,underlying,expiration,type,strike,bid,ask
2020-01-02,X,SPY,not-a-date,call,320.0,5.10,5.30
";
        let result = OptionData::from_csv_content(csv, OptionSchema::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_between_filters_inclusive() {
        let data = OptionData::from_csv_content(SAMPLE_CSV, OptionSchema::default()).unwrap();
        let clipped = data.between(date("2020-01-03"), date("2020-01-03"));

        assert_eq!(clipped.dates(), vec![date("2020-01-03")]);
    }
}
