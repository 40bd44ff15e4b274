//! # Options Backtester
//!
//! A backtesting engine for portfolios that mix equity holdings with
//! multi-leg option strategies, driven by daily CSV market data.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `data`: CSV loading for stock quotes and option chains
//! - `portfolio`: Capital allocation, inventory, and cash ledger
//! - `strategy`: Leg directions, order tags, and the DTE strategy
//! - `engine`: Rebalancing, execution, balance tracking, and the driver
//! - `utils`: Shared utilities and decimal arithmetic

pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod portfolio;
pub mod strategy;
pub mod utils;

pub use config::Config;
pub use error::{BacktestError, Result};
