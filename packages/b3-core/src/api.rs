//! HTTP client for the B3 analytics API
//!
//! [`MarketApi`] is the seam between the store and the network: the store
//! only ever talks to a `dyn MarketApi`, and [`ApiClient`] is the production
//! implementation.

pub mod client;

pub use client::*;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::types::{AnalysisResult, MarketOverview, PortfolioAnalysis, StockInfo, StockSeries};
use crate::Result;

/// Remote capabilities the store depends on.
///
/// Every call is exactly one round trip. Implementations must not retry,
/// cache or deduplicate.
#[async_trait]
pub trait MarketApi: Send + Sync {
    async fn get_stock_data(&self, symbol: &str, period: &str) -> Result<StockSeries>;

    async fn get_stock_info(&self, symbol: &str) -> Result<StockInfo>;

    async fn analyze_stock(
        &self,
        symbol: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<AnalysisResult>;

    async fn quick_analyze(&self, symbol: &str) -> Result<AnalysisResult>;

    async fn analyze_portfolio(
        &self,
        symbols: &[String],
        weights: Option<&[f64]>,
        initial_investment: f64,
    ) -> Result<PortfolioAnalysis>;

    async fn get_market_overview(&self) -> Result<MarketOverview>;
}
