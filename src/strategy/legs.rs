//! Leg directions, quote-side pricing, and order tagging.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::OptionQuote;

/// Side an option leg is traded on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// The opposite side, taken when a leg is closed.
    pub fn invert(self) -> Self {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }

    /// Quoted price to open: buys lift the ask, sells hit the bid.
    pub fn entry_price(self, quote: &OptionQuote) -> Decimal {
        match self {
            Direction::Buy => quote.ask,
            Direction::Sell => quote.bid,
        }
    }

    /// Quoted price to close, on the opposite side of the book.
    pub fn exit_price(self, quote: &OptionQuote) -> Decimal {
        self.invert().entry_price(quote)
    }

    /// Signed per-contract cash flow to open one leg: debits positive,
    /// credits negative, scaled by the contract multiplier.
    pub fn entry_cost(self, quote: &OptionQuote, shares_per_contract: u32) -> Decimal {
        let sign = match self {
            Direction::Buy => Decimal::ONE,
            Direction::Sell => -Decimal::ONE,
        };
        sign * self.entry_price(quote) * Decimal::from(shares_per_contract)
    }

    /// Signed per-contract cash flow to close one leg.
    pub fn exit_cost(self, quote: &OptionQuote, shares_per_contract: u32) -> Decimal {
        let sign = match self {
            Direction::Buy => -Decimal::ONE,
            Direction::Sell => Decimal::ONE,
        };
        sign * self.exit_price(quote) * Decimal::from(shares_per_contract)
    }

    /// Broker tag written when this leg is opened.
    pub fn entry_tag(self) -> OrderTag {
        match self {
            Direction::Buy => OrderTag::Bto,
            Direction::Sell => OrderTag::Sto,
        }
    }

    /// Broker tag written when this leg is closed.
    pub fn exit_tag(self) -> OrderTag {
        match self {
            Direction::Buy => OrderTag::Stc,
            Direction::Sell => OrderTag::Btc,
        }
    }
}

/// Broker-style tag recorded with each executed leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderTag {
    /// Buy to open
    Bto,
    /// Sell to open
    Sto,
    /// Sell to close
    Stc,
    /// Buy to close
    Btc,
}

impl OrderTag {
    pub fn is_entry(self) -> bool {
        matches!(self, OrderTag::Bto | OrderTag::Sto)
    }

    /// Direction of the leg this tag was written against.
    pub fn leg_direction(self) -> Direction {
        match self {
            OrderTag::Bto | OrderTag::Stc => Direction::Buy,
            OrderTag::Sto | OrderTag::Btc => Direction::Sell,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderTag::Bto => "BTO",
            OrderTag::Sto => "STO",
            OrderTag::Stc => "STC",
            OrderTag::Btc => "BTC",
        }
    }
}

impl fmt::Display for OrderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One leg of a strategy definition: a name and the side it trades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegDefinition {
    pub name: String,
    pub direction: Direction,
}
