//! Days-to-expiration rolling strategy.
//!
//! Opens one combination near a target expiry and rolls it off as
//! expiration approaches, the mechanical treatment popular with
//! premium sellers.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{OptionChain, OptionQuote, OptionSchema, OptionType};
use crate::portfolio::{Inventory, OptionLeg, OptionPosition, PositionTotals};
use crate::strategy::{Direction, ExitSignals, LegDefinition, Strategy};
use crate::utils::decimal::floor_qty;

/// One leg the strategy trades, with the contract right to select.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DteLeg {
    pub name: String,
    pub direction: Direction,
    pub option_type: OptionType,
}

/// Expiry thresholds steering entries and exits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DteConfig {
    /// Days to expiration to open at
    #[serde(default = "default_target_dte")]
    pub target_dte: i64,
    /// Accepted distance from the target
    #[serde(default = "default_dte_window")]
    pub dte_window: i64,
    /// Close once any leg has this many days left or fewer
    #[serde(default = "default_exit_dte")]
    pub exit_dte: i64,
}

fn default_target_dte() -> i64 {
    45
}

fn default_dte_window() -> i64 {
    15
}

fn default_exit_dte() -> i64 {
    21
}

impl Default for DteConfig {
    fn default() -> Self {
        Self {
            target_dte: default_target_dte(),
            dte_window: default_dte_window(),
            exit_dte: default_exit_dte(),
        }
    }
}

/// Rolls a fixed set of legs on days-to-expiration.
///
/// Enters only when flat, sizing the combination by flooring the
/// allocated capital over its absolute cost.
pub struct DteStrategy {
    config: DteConfig,
    schema: OptionSchema,
    shares_per_contract: u32,
    legs: Vec<DteLeg>,
    definitions: Vec<LegDefinition>,
    initial_capital: Decimal,
}

impl DteStrategy {
    pub fn new(legs: Vec<DteLeg>, config: DteConfig, shares_per_contract: u32) -> Self {
        let definitions = legs
            .iter()
            .map(|leg| LegDefinition {
                name: leg.name.clone(),
                direction: leg.direction,
            })
            .collect();
        Self {
            config,
            schema: OptionSchema::default(),
            shares_per_contract,
            legs,
            definitions,
            initial_capital: Decimal::ZERO,
        }
    }

    /// Expect a non-default column mapping from the option feed.
    pub fn with_schema(mut self, schema: OptionSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Best quote for one leg: nearest the target expiry, then lowest
    /// strike, then contract id, so selection is deterministic.
    fn select_leg<'a>(
        &self,
        leg: &DteLeg,
        chain: &'a OptionChain,
        date: NaiveDate,
    ) -> Option<&'a OptionQuote> {
        let distance =
            |quote: &OptionQuote| (quote.days_to_expiration(date) - self.config.target_dte).abs();
        chain
            .quotes
            .iter()
            .filter(|quote| quote.option_type == leg.option_type)
            .filter(|quote| distance(quote) <= self.config.dte_window)
            .min_by(|a, b| {
                (distance(a), a.strike)
                    .cmp(&(distance(b), b.strike))
                    .then_with(|| a.contract.cmp(&b.contract))
            })
    }

    /// Assemble one candidate combination, or nothing when a leg cannot
    /// be selected or the capital affords no whole unit.
    fn build_candidate(&self, chain: &OptionChain, date: NaiveDate) -> Option<OptionPosition> {
        let mut legs = Vec::with_capacity(self.legs.len());
        let mut total_cost = Decimal::ZERO;
        for leg in &self.legs {
            let quote = self.select_leg(leg, chain, date)?;
            let cost = leg.direction.entry_cost(quote, self.shares_per_contract);
            total_cost += cost;
            legs.push(OptionLeg {
                contract: quote.contract.clone(),
                underlying: quote.underlying.clone(),
                expiration: quote.expiration,
                option_type: quote.option_type,
                strike: quote.strike,
                cost,
                order: leg.direction.entry_tag(),
            });
        }

        if total_cost == Decimal::ZERO {
            return None;
        }
        let qty = floor_qty(self.initial_capital, total_cost.abs());
        if qty <= 0 {
            debug!("No affordable quantity for candidate on {}", date);
            return None;
        }

        Some(OptionPosition {
            legs,
            totals: PositionTotals {
                cost: total_cost,
                qty,
                date,
            },
        })
    }

    /// A position comes off when any leg is at or under the exit
    /// threshold, or has vanished from the chain.
    fn should_exit(&self, position: &OptionPosition, chain: &OptionChain, date: NaiveDate) -> bool {
        position.legs.iter().any(|leg| match chain.get(&leg.contract) {
            Some(quote) => quote.days_to_expiration(date) <= self.config.exit_dte,
            None => true,
        })
    }

    /// Exit record with every leg re-priced at today's closing side.
    /// Legs missing from the chain close at zero.
    fn exit_record(
        &self,
        position: &OptionPosition,
        chain: &OptionChain,
        date: NaiveDate,
    ) -> OptionPosition {
        let legs: Vec<OptionLeg> = position
            .legs
            .iter()
            .map(|leg| {
                let direction = leg.order.leg_direction();
                let cost = chain
                    .get(&leg.contract)
                    .map(|quote| direction.exit_cost(quote, self.shares_per_contract))
                    .unwrap_or(Decimal::ZERO);
                OptionLeg {
                    cost,
                    order: direction.exit_tag(),
                    ..leg.clone()
                }
            })
            .collect();
        let cost = legs.iter().map(|leg| leg.cost).sum();
        OptionPosition {
            legs,
            totals: PositionTotals {
                cost,
                qty: position.totals.qty,
                date,
            },
        }
    }
}

impl Strategy for DteStrategy {
    fn schema(&self) -> &OptionSchema {
        &self.schema
    }

    fn legs(&self) -> &[LegDefinition] {
        &self.definitions
    }

    fn initial_capital(&self) -> Decimal {
        self.initial_capital
    }

    fn set_initial_capital(&mut self, capital: Decimal) {
        self.initial_capital = capital;
    }

    fn filter_entries(
        &self,
        chain: &OptionChain,
        inventory: &Inventory,
        date: NaiveDate,
    ) -> Vec<OptionPosition> {
        if !inventory.options.is_empty() {
            return Vec::new();
        }
        self.build_candidate(chain, date).into_iter().collect()
    }

    fn filter_exits(
        &self,
        chain: &OptionChain,
        inventory: &Inventory,
        date: NaiveDate,
    ) -> ExitSignals {
        let mut signals = ExitSignals::none(inventory.options.len());
        for (i, position) in inventory.options.iter().enumerate() {
            if self.should_exit(position, chain, date) {
                let record = self.exit_record(position, chain, date);
                signals.costs.push(record.total_price());
                signals.records.push(record);
                signals.mask[i] = true;
            }
        }
        signals
    }
}
