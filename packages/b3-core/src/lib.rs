//! B3 Core - data-access layer for the B3 analytics API.
//!
//! This crate provides the two layers a frontend needs to talk to the
//! analytics backend:
//!
//! - **Transport**: [`ApiClient`], a thin HTTP client with a fixed timeout and
//!   a single interception point for failures
//! - **State**: [`Store`], which owns an [`AppState`] snapshot, runs fetch
//!   actions against a [`MarketApi`] and notifies subscribers on every change
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use b3_core::{ApiClient, ClientConfig, Store, StoreOptions};
//!
//! # async fn run() -> b3_core::Result<()> {
//! let client = ApiClient::new(ClientConfig::from_env())?;
//! let store = Store::new(Arc::new(client), StoreOptions::default());
//!
//! let _subscription = store.subscribe(|state| {
//!     println!("loading={} error={:?}", state.loading, state.error);
//! });
//!
//! store.fetch_stock_data("PETR4", "6mo").await;
//! println!("current stock: {:?}", store.snapshot().current_stock);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod state;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use api::{ApiClient, MarketApi, DEFAULT_INITIAL_INVESTMENT, DEFAULT_PERIOD};
pub use config::{ClientConfig, Settings, StalePolicy, StoreOptions};
pub use state::{AppState, ResourceKind, ResourcePhase, ResourceStatus};
pub use store::{Store, Subscription};
pub use types::{
    AnalysisRequest, AnalysisResult, AnalysisStatistics, MarketOverview, PortfolioAnalysis,
    PortfolioStatistics, StockBar, StockInfo, StockSeries,
};

/// Error types for b3-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Any failed round trip: network error, timeout, non-2xx status or an
    /// undecodable body all land here.
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for b3-core operations.
pub type Result<T> = std::result::Result<T, Error>;
