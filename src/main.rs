mod config;
mod engine;
mod error;
mod ml;
mod provider;
mod trend;
mod types;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use config::BotConfig;
use engine::{BatchOrchestrator, TrendReport};
use provider::YahooProvider;
use types::{PredictionResult, TickerOutcome};

#[derive(Parser)]
#[command(name = "trendbot")]
#[command(version = "0.1.0")]
#[command(about = "Reports sharp equity moves and predicts next-session direction", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "trendbot.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank tickers by percentage move over the recent window
    Trending {
        /// Tickers to scan (defaults to the configured universe)
        #[arg(short, long, num_args = 1..)]
        tickers: Option<Vec<String>>,

        /// Window length in days
        #[arg(short, long)]
        days: Option<i64>,

        /// Upward classification threshold in percent
        #[arg(long)]
        threshold_up: Option<f64>,

        /// Downward classification threshold in percent
        #[arg(long)]
        threshold_down: Option<f64>,
    },
    /// Predict next-session direction per ticker
    Predict {
        /// Tickers to predict (defaults to the configured universe)
        #[arg(short, long, num_args = 1..)]
        tickers: Option<Vec<String>>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = BotConfig::load(&cli.config)?;

    match cli.command {
        Commands::Trending {
            tickers,
            days,
            threshold_up,
            threshold_down,
        } => {
            if let Some(days) = days {
                config.trend.window_days = days;
            }
            if let Some(threshold) = threshold_up {
                config.trend.threshold_up_pct = threshold;
            }
            if let Some(threshold) = threshold_down {
                config.trend.threshold_down_pct = threshold;
            }
            let tickers = tickers.unwrap_or_else(|| config.tickers.clone());
            ensure_valid(&config)?;

            let orchestrator = BatchOrchestrator::new(Arc::new(YahooProvider::new()), config);
            let report = orchestrator.classify_batch(&tickers).await;
            print_trend_report(&report);
        }
        Commands::Predict { tickers } => {
            let tickers = tickers.unwrap_or_else(|| config.tickers.clone());
            ensure_valid(&config)?;

            let orchestrator = BatchOrchestrator::new(Arc::new(YahooProvider::new()), config);
            let outcomes = orchestrator.predict_batch(&tickers).await;
            print_predictions(&outcomes);
        }
    }

    Ok(())
}

fn ensure_valid(config: &BotConfig) -> Result<()> {
    if let Err(errors) = config.validate() {
        anyhow::bail!("invalid configuration: {}", errors.join(", "));
    }
    Ok(())
}

fn print_trend_report(report: &TrendReport) {
    if report.up.is_empty() && report.down.is_empty() {
        println!("No stocks moved beyond the configured thresholds.");
    }
    if !report.up.is_empty() {
        println!("Trending up:");
        for result in &report.up {
            println!("  {}: +{:.2}%", result.ticker, result.percent_change);
        }
    }
    if !report.down.is_empty() {
        println!("Trending down:");
        for result in &report.down {
            println!("  {}: {:.2}%", result.ticker, result.percent_change);
        }
    }
    if !report.skipped.is_empty() {
        println!("No data: {}", report.skipped.join(", "));
    }
}

fn print_predictions(outcomes: &[(String, TickerOutcome<PredictionResult>)]) {
    println!("Next-session direction:");
    for (ticker, outcome) in outcomes {
        match outcome {
            TickerOutcome::Ready(prediction) => {
                let direction = if prediction.predicted_up { "up" } else { "down" };
                println!("  {}: {}", ticker, direction);
            }
            TickerOutcome::NoSignal => println!("  {}: no signal", ticker),
            TickerOutcome::Abstained(err) => println!("  {}: abstained ({})", ticker, err),
            TickerOutcome::Skipped => println!("  {}: skipped (deadline elapsed)", ticker),
        }
    }
}
