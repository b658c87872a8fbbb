use ag_portfolio::{
    AnalyticsConfig, AnalyticsOrchestrator, InMemoryProvider, PortfolioSpec, RetryingProvider,
};
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::info;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Value since the as-of date
    Live,
    /// Trailing risk metrics and Monte Carlo forecast
    Backtest,
}

#[derive(Parser, Debug)]
#[clap(name = "portfolio-report", about = "Portfolio performance and risk report")]
struct Args {
    /// YAML or JSON analytics configuration; defaults are used when omitted
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// JSON price table: {"SYMBOL": [["YYYY-MM-DD", price], ...]}
    #[clap(short, long)]
    prices: PathBuf,

    /// Comma-separated tickers
    #[clap(short, long, value_delimiter = ',', required = true)]
    tickers: Vec<String>,

    /// Comma-separated weights, one per ticker
    #[clap(short, long, value_delimiter = ',', required = true)]
    weights: Vec<f64>,

    /// Recommendation date (defaults to today)
    #[clap(long)]
    as_of: Option<NaiveDate>,

    /// Evaluation date (defaults to the current UTC date)
    #[clap(long)]
    today: Option<NaiveDate>,

    /// Monte Carlo seed, overrides the configured one
    #[clap(long)]
    seed: Option<u64>,

    #[clap(short, long, value_enum, default_value = "live")]
    mode: Mode,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            AnalyticsConfig::load(path)
                .with_context(|| format!("Failed to load configuration from {:?}", path))?
        }
        None => AnalyticsConfig::default(),
    };

    info!("Loading prices from {:?}", args.prices);
    let prices_json = std::fs::read_to_string(&args.prices)
        .with_context(|| format!("Failed to read {:?}", args.prices))?;
    let provider = InMemoryProvider::from_json(&prices_json).context("Invalid price table")?;
    let provider = RetryingProvider::new(provider, config.retry.clone());

    let today = args.today.unwrap_or_else(|| Utc::now().date_naive());
    let as_of = args.as_of.unwrap_or(today);
    let spec =
        PortfolioSpec::with_tolerance(args.tickers, args.weights, as_of, config.weight_tolerance)?;

    if args.seed.is_some() {
        config.monte_carlo.random_seed = args.seed;
    }
    let orchestrator = AnalyticsOrchestrator::new(provider, config);

    let output = match args.mode {
        Mode::Live => {
            let report = orchestrator.live_tracking(&spec, today).await?;
            serde_json::to_string_pretty(&report)?
        }
        Mode::Backtest => {
            let report = orchestrator.backtest_with_config_seed(&spec, today).await?;
            serde_json::to_string_pretty(&report)?
        }
    };

    println!("{}", output);
    Ok(())
}
