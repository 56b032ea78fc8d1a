//! b3 - command line client for the B3 analytics API.
//!
//! Every command prints a JSON envelope (`{ok, data?, error?}`) on stdout.
//! Logs go to stderr and are filtered with `RUST_LOG`.

mod output;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use b3_core::{
    ApiClient, AppState, ResourceKind, Settings, Store, DEFAULT_INITIAL_INVESTMENT, DEFAULT_PERIOD,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use output::ApiResponse;

#[derive(Parser)]
#[command(name = "b3")]
#[command(about = "B3 analytics CLI - stock data, analysis and portfolios")]
#[command(version)]
struct Cli {
    /// API base URL, overriding config file and environment
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Daily price series with indicators
    Stock {
        /// Stock symbol (e.g. PETR4)
        symbol: String,
        /// Series period
        #[arg(short, long, default_value = DEFAULT_PERIOD)]
        period: String,
    },
    /// Latest quote for a stock
    Info {
        /// Stock symbol
        symbol: String,
    },
    /// Full analysis, optionally bounded by dates
    Analyze {
        /// Stock symbol
        symbol: String,
        /// First day to include (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last day to include (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Quick analysis
    Quick {
        /// Stock symbol
        symbol: String,
    },
    /// Analyze a portfolio
    Portfolio {
        /// Symbols (comma-separated)
        #[arg(value_delimiter = ',', required = true)]
        symbols: Vec<String>,
        /// Weights, one per symbol (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        weights: Option<Vec<f64>>,
        /// Initial investment (defaults to 10000)
        #[arg(short, long)]
        investment: Option<f64>,
    },
    /// Market overview
    Market {
        /// Print only this section of the overview (e.g. ibovespa)
        #[arg(short, long)]
        section: Option<String>,
    },
    /// Stocks the server can serve
    Stocks,
    /// Detailed server health
    Health,
    /// Drop the server's response cache
    ClearCache,
    /// Fetch series, analysis and market overview at once and print every
    /// state change
    Watch {
        /// Stock symbol
        symbol: String,
        /// Series period
        #[arg(short, long, default_value = DEFAULT_PERIOD)]
        period: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::load()?;
    if let Some(url) = cli.api_url {
        settings.client.base_url = url;
    }
    info!("Using API at {}", settings.client.base_url);

    let client = ApiClient::new(settings.client.clone())?;
    let store = Store::new(Arc::new(client.clone()), settings.store.clone());

    let ok = match cli.command {
        Commands::Stock { symbol, period } => {
            store.fetch_stock_data(&symbol, &period).await;
            let state = store.snapshot();
            emit(&ApiResponse::from_state(&state, state.stock_data.as_ref()))?
        }
        Commands::Info { symbol } => {
            store.fetch_stock_info(&symbol).await;
            let state = store.snapshot();
            emit(&ApiResponse::from_state(&state, state.stock_info.as_ref()))?
        }
        Commands::Analyze { symbol, start, end } => {
            store.fetch_full_analysis(&symbol, start, end).await;
            let state = store.snapshot();
            emit(&ApiResponse::from_state(&state, state.analysis.as_ref()))?
        }
        Commands::Quick { symbol } => {
            store.fetch_analysis(&symbol).await;
            let state = store.snapshot();
            emit(&ApiResponse::from_state(&state, state.analysis.as_ref()))?
        }
        Commands::Portfolio {
            symbols,
            weights,
            investment,
        } => handle_portfolio(&client, &store, &symbols, weights.as_deref(), investment).await?,
        Commands::Market { section } => {
            store.fetch_market_overview().await;
            let state = store.snapshot();
            match section {
                Some(name) => emit(&market_section(&state, &name))?,
                None => emit(&ApiResponse::from_state(&state, state.market_overview.as_ref()))?,
            }
        }
        Commands::Stocks => emit(&ApiResponse::from_result(client.get_available_stocks().await))?,
        Commands::Health => emit(&ApiResponse::from_result(client.get_health().await))?,
        Commands::ClearCache => emit(&ApiResponse::from_result(client.clear_cache().await))?,
        Commands::Watch { symbol, period } => handle_watch(store, &symbol, &period).await?,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Print a response and report whether it was successful.
fn emit<T: Serialize>(response: &ApiResponse<T>) -> Result<bool> {
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(response.ok)
}

fn market_section<'a>(state: &'a AppState, name: &str) -> ApiResponse<&'a serde_json::Value> {
    match &state.market_overview {
        Some(overview) if state.error.is_none() => match overview.section(name) {
            Some(section) => ApiResponse::ok(section),
            None => ApiResponse::err(format!("No market section named {}", name)),
        },
        _ => ApiResponse::from_state(state, None),
    }
}

/// The store action always sends the default investment, so a custom amount
/// goes straight to the client.
async fn handle_portfolio(
    client: &ApiClient,
    store: &Store,
    symbols: &[String],
    weights: Option<&[f64]>,
    investment: Option<f64>,
) -> Result<bool> {
    match investment {
        Some(amount) if amount != DEFAULT_INITIAL_INVESTMENT => {
            let result = client.analyze_portfolio(symbols, weights, amount).await;
            emit(&ApiResponse::from_result(result))
        }
        _ => {
            store.fetch_portfolio_analysis(symbols, weights).await;
            let state = store.snapshot();
            emit(&ApiResponse::from_state(&state, state.portfolio_analysis.as_ref()))
        }
    }
}

async fn handle_watch(store: Store, symbol: &str, period: &str) -> Result<bool> {
    let mut changes = store.changes();

    let printer = tokio::spawn(async move {
        let mut transitions = 0usize;
        loop {
            match changes.recv().await {
                Ok(state) => {
                    transitions += 1;
                    println!("{}", serde_json::to_string(&transition(&state))?);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Skipped {} state changes", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        Ok::<_, serde_json::Error>(transitions)
    });

    futures::join!(
        store.fetch_stock_data(symbol, period),
        store.fetch_analysis(symbol),
        store.fetch_market_overview(),
    );

    let state = store.snapshot();
    // Closes the change stream so the printer finishes.
    drop(store);

    let transitions = printer.await??;
    info!("Observed {} state changes", transitions);

    let failures: Vec<_> = ResourceKind::ALL
        .iter()
        .filter_map(|kind| state.resource(*kind))
        .filter_map(|status| status.error.clone())
        .collect();

    if failures.is_empty() {
        emit(&ApiResponse::ok(summary(&state)))
    } else {
        emit(&ApiResponse::<()>::err(failures.join("; ")))
    }
}

/// One line per state change: the flat flags plus each resource's phase.
fn transition(state: &AppState) -> serde_json::Value {
    let phases: serde_json::Map<_, _> = state
        .status
        .iter()
        .map(|(kind, status)| (kind.name().to_string(), json!(status.phase)))
        .collect();

    json!({
        "loading": state.loading,
        "error": state.error,
        "resources": phases,
    })
}

fn summary(state: &AppState) -> serde_json::Value {
    json!({
        "current_stock": state.current_stock,
        "bars": state.stock_data.as_ref().map(|bars| bars.len()),
        "latest_close": state.stock_data.as_ref().and_then(|bars| bars.last()).map(|bar| bar.close),
        "analysis": state.analysis,
        "market_overview": state.market_overview,
    })
}
