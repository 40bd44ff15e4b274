//! Options Backtester - Main Entry Point
//!
//! Runs portfolio backtests that pair equity holdings with multi-leg
//! option strategies over daily CSV market data.

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use options_backtester::config::Config;
use options_backtester::data::{OptionData, StockData};
use options_backtester::engine::Backtest;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Options Backtester CLI
#[derive(Parser)]
#[command(name = "options-backtester")]
#[command(version, about = "Backtests stock and option portfolios on daily CSV data")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest simulation on historical data
    Backtest {
        /// Path to the stock quotes CSV
        #[arg(long)]
        stocks: String,

        /// Path to the option chains CSV
        #[arg(long)]
        options: String,

        /// Start date (YYYY-MM-DD); defaults to the data start
        #[arg(short, long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD); defaults to the data end
        #[arg(short, long)]
        end: Option<String>,

        /// Initial capital for simulation
        #[arg(short = 'c', long)]
        capital: Option<f64>,

        /// Months between rebalances (0 disables the schedule)
        #[arg(short, long)]
        rebalance_months: Option<u32>,

        /// Step one calendar month at a time instead of daily
        #[arg(long)]
        monthly: bool,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: String,
    },

    /// Show coverage of the data files without running anything
    Inspect {
        /// Path to the stock quotes CSV
        #[arg(long)]
        stocks: Option<String>,

        /// Path to the option chains CSV
        #[arg(long)]
        options: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    match cli.command {
        Commands::Backtest {
            stocks,
            options,
            start,
            end,
            capital,
            rebalance_months,
            monthly,
            output,
        } => run_backtest(
            &stocks,
            &options,
            start.as_deref(),
            end.as_deref(),
            capital,
            rebalance_months,
            monthly,
            &output,
        ),
        Commands::Inspect { stocks, options } => {
            run_inspect(stocks.as_deref(), options.as_deref())
        }
    }
}

/// Initialize comprehensive logging with file output.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    // Create logs directory
    std::fs::create_dir_all("logs")?;

    // File appender for detailed logs
    let file_appender = tracing_appender::rolling::hourly("logs", "options-backtester.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(_guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("options_backtester=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

fn parse_date(label: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| anyhow::anyhow!("Invalid {} date '{}': {}", label, value, e))
}

fn parse_capital(value: f64) -> Result<Decimal> {
    Decimal::from_f64_retain(value)
        .ok_or_else(|| anyhow::anyhow!("Invalid capital override: {}", value))
}

/// Run a single backtest with the given parameters.
#[allow(clippy::too_many_arguments)]
fn run_backtest(
    stocks_path: &str,
    options_path: &str,
    start: Option<&str>,
    end: Option<&str>,
    capital: Option<f64>,
    rebalance_months: Option<u32>,
    monthly: bool,
    output_dir: &str,
) -> Result<()> {
    info!("╔════════════════════════════════════════════════════════════╗");
    info!("║              BACKTEST MODE                                 ║");
    info!("╚════════════════════════════════════════════════════════════╝");

    let mut config = Config::load()?;
    if let Some(capital) = capital {
        config.simulation.initial_capital = parse_capital(capital)?;
    }
    if let Some(months) = rebalance_months {
        config.simulation.rebalance_every_months = months;
    }
    if monthly {
        config.simulation.monthly_steps = true;
    }
    config.validate()?;

    info!("📁 Loading stock quotes from: {}", stocks_path);
    let mut stock_data = StockData::load_with_schema(stocks_path, config.data.stock_schema.clone())?;
    info!("📁 Loading option chains from: {}", options_path);
    let mut option_data =
        OptionData::load_with_schema(options_path, config.data.option_schema.clone())?;

    if let Some((data_start, data_end)) = stock_data.available_range() {
        let lo = match start {
            Some(value) => parse_date("start", value)?,
            None => data_start,
        };
        let hi = match end {
            Some(value) => parse_date("end", value)?,
            None => data_end,
        };
        if (lo, hi) != (data_start, data_end) {
            stock_data = stock_data.between(lo, hi);
            option_data = option_data.between(lo, hi);
        }
        info!("📅 Period: {} to {}", lo, hi);
    }

    info!("💰 Initial capital: {}", config.simulation.initial_capital);
    info!(
        "📊 Sessions: {} stock / {} option",
        stock_data.len(),
        option_data.len()
    );

    let allocation = config.allocation()?;
    let mut backtest = Backtest::new(config.simulation.clone(), allocation);
    backtest.set_stock_targets(config.portfolio.stock_targets.clone())?;
    backtest.set_stocks(stock_data);
    backtest.set_options(option_data);
    backtest.set_strategy(Box::new(config.build_strategy()));

    let report = backtest.run()?;

    println!("\n{}", report.summary());

    std::fs::create_dir_all(output_dir)?;

    let balance_path = format!("{}/balance.csv", output_dir);
    report.balance.to_csv(&balance_path)?;
    let trades_path = format!("{}/trades.csv", output_dir);
    report.trades_to_csv(&trades_path)?;
    let stats_path = format!("{}/stats.json", output_dir);
    std::fs::write(&stats_path, serde_json::to_string_pretty(&report.stats)?)?;
    info!("💾 Results saved to: {}", output_dir);

    Ok(())
}

/// Show what the data files cover without running a backtest.
fn run_inspect(stocks_path: Option<&str>, options_path: Option<&str>) -> Result<()> {
    anyhow::ensure!(
        stocks_path.is_some() || options_path.is_some(),
        "Provide --stocks and/or --options to inspect"
    );

    let config = Config::load()?;

    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║              DATA INSPECTION                               ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    if let Some(path) = stocks_path {
        let data = StockData::load_with_schema(path, config.data.stock_schema.clone())?;
        println!("\n📄 Stock quotes: {}", path);
        match data.available_range() {
            Some((start, end)) => {
                println!("   ├─ Range:    {} to {}", start, end);
                println!("   ├─ Sessions: {}", data.len());
                println!("   └─ Symbols:  {}", data.symbols().join(", "));
            }
            None => println!("   └─ No rows"),
        }
    }

    if let Some(path) = options_path {
        let data = OptionData::load_with_schema(path, config.data.option_schema.clone())?;
        println!("\n📄 Option chains: {}", path);
        match data.available_range() {
            Some((start, end)) => {
                let dates = data.dates();
                let quote_rows: usize = dates
                    .iter()
                    .filter_map(|&date| data.chain(date))
                    .map(|chain| chain.len())
                    .sum();
                let underlyings: BTreeSet<&str> = dates
                    .iter()
                    .filter_map(|&date| data.chain(date))
                    .flat_map(|chain| chain.quotes.iter())
                    .map(|quote| quote.underlying.as_str())
                    .collect();
                println!("   ├─ Range:       {} to {}", start, end);
                println!("   ├─ Sessions:    {}", data.len());
                println!("   ├─ Quote rows:  {}", quote_rows);
                println!(
                    "   └─ Underlyings: {}",
                    underlyings.into_iter().collect::<Vec<_>>().join(", ")
                );
            }
            None => println!("   └─ No rows"),
        }
    }

    println!();
    Ok(())
}
