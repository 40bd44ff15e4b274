//! Configuration management for the options backtester.
//!
//! Loads settings from environment variables and config files.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data::{OptionSchema, OptionType, StockSchema};
use crate::engine::SimulationConfig;
use crate::error;
use crate::portfolio::{validate_stock_targets, Allocation, StockTarget};
use crate::strategy::{Direction, DteConfig, DteLeg, DteStrategy};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Capital split between stocks, options, and cash
    #[serde(default)]
    pub portfolio: PortfolioConfig,
    /// Strategy legs and expiry thresholds
    #[serde(default)]
    pub strategy: StrategyConfig,
    /// Simulation loop parameters
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// CSV column names for both data feeds
    #[serde(default)]
    pub data: DataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioConfig {
    /// Relative weight of the equity sleeve
    #[serde(default = "default_stock_weight")]
    pub stock_weight: Decimal,
    /// Relative weight of the options sleeve
    #[serde(default = "default_option_weight")]
    pub option_weight: Decimal,
    /// Relative weight held back as cash
    #[serde(default)]
    pub cash_weight: Decimal,
    /// Equities bought at every rebalance; percentages must sum to 1.0
    #[serde(default = "default_stock_targets")]
    pub stock_targets: Vec<StockTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Days-to-expiration thresholds
    #[serde(default)]
    pub dte: DteConfig,
    /// Legs opened together at each entry
    #[serde(default = "default_legs")]
    pub legs: Vec<DteLeg>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataConfig {
    /// Column names in the stock quote CSV
    #[serde(default)]
    pub stock_schema: StockSchema,
    /// Column names in the option chain CSV
    #[serde(default)]
    pub option_schema: OptionSchema,
}

// Default value functions
fn default_stock_weight() -> Decimal {
    Decimal::new(50, 2) // 0.50
}

fn default_option_weight() -> Decimal {
    Decimal::new(50, 2) // 0.50
}

fn default_stock_targets() -> Vec<StockTarget> {
    vec![StockTarget {
        symbol: "SPY".to_string(),
        percentage: Decimal::ONE,
    }]
}

fn default_legs() -> Vec<DteLeg> {
    // Short strangle
    vec![
        DteLeg {
            name: "short_call".to_string(),
            direction: Direction::Sell,
            option_type: OptionType::Call,
        },
        DteLeg {
            name: "short_put".to_string(),
            direction: Direction::Sell,
            option_type: OptionType::Put,
        },
    ]
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("OBT"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.simulation.initial_capital > Decimal::ZERO,
            "initial_capital must be positive"
        );

        anyhow::ensure!(
            self.simulation.shares_per_contract > 0,
            "shares_per_contract must be positive"
        );

        anyhow::ensure!(
            self.strategy.dte.exit_dte < self.strategy.dte.target_dte,
            "exit_dte must be below target_dte"
        );

        anyhow::ensure!(
            !self.strategy.legs.is_empty(),
            "strategy needs at least one leg"
        );

        self.allocation().context("Invalid allocation weights")?;
        validate_stock_targets(&self.portfolio.stock_targets)
            .context("Invalid stock targets")?;

        Ok(())
    }

    /// Normalized capital allocation from the configured weights.
    pub fn allocation(&self) -> error::Result<Allocation> {
        Allocation::new(
            self.portfolio.stock_weight,
            self.portfolio.option_weight,
            self.portfolio.cash_weight,
        )
    }

    /// Build the strategy the configuration describes.
    pub fn build_strategy(&self) -> DteStrategy {
        DteStrategy::new(
            self.strategy.legs.clone(),
            self.strategy.dte.clone(),
            self.simulation.shares_per_contract,
        )
        .with_schema(self.data.option_schema.clone())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            portfolio: PortfolioConfig::default(),
            strategy: StrategyConfig::default(),
            simulation: SimulationConfig::default(),
            data: DataConfig::default(),
        }
    }
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            stock_weight: default_stock_weight(),
            option_weight: default_option_weight(),
            cash_weight: Decimal::ZERO,
            stock_targets: default_stock_targets(),
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            dte: DteConfig::default(),
            legs: default_legs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();

        assert_eq!(config.portfolio.stock_weight, dec!(0.50));
        assert_eq!(config.portfolio.stock_targets.len(), 1);
        assert_eq!(config.strategy.legs.len(), 2);
        assert_eq!(config.strategy.dte.target_dte, 45);
        assert_eq!(config.simulation.initial_capital, dec!(1_000_000));
        assert_eq!(config.simulation.shares_per_contract, 100);
        assert!(config.simulation.stop_if_broke);
    }

    #[test]
    fn test_partial_json_overrides_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"simulation": {"initial_capital": "50000", "monthly_steps": true}}"#,
        )
        .unwrap();

        assert_eq!(config.simulation.initial_capital, dec!(50000));
        assert!(config.simulation.monthly_steps);
        assert_eq!(config.simulation.rebalance_every_months, 1);
    }

    #[test]
    fn test_validate_rejects_zero_capital() {
        let mut config = Config::default();
        config.simulation.initial_capital = Decimal::ZERO;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_exit_past_target() {
        let mut config = Config::default();
        config.strategy.dte.exit_dte = 60;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_legs() {
        let mut config = Config::default();
        config.strategy.legs.clear();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unbalanced_targets() {
        let mut config = Config::default();
        config.portfolio.stock_targets[0].percentage = dec!(0.7);

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_allocation_normalizes_weights() {
        let mut config = Config::default();
        config.portfolio.stock_weight = dec!(30);
        config.portfolio.option_weight = dec!(60);
        config.portfolio.cash_weight = dec!(10);

        let allocation = config.allocation().unwrap();
        assert_eq!(allocation.stocks(), dec!(0.3));
        assert_eq!(allocation.options(), dec!(0.6));
        assert_eq!(allocation.cash(), dec!(0.1));
    }
}
