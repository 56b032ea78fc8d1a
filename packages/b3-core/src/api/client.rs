//! B3 analytics HTTP client implementation

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Request, RequestBuilder, Url};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::MarketApi;
use crate::config::{ClientConfig, MIN_TIMEOUT_MS};
use crate::types::*;
use crate::{Error, Result};

/// Series period used when the caller does not pick one
pub const DEFAULT_PERIOD: &str = "6mo";

/// Amount sent as `initial_investment` when the caller does not pick one
pub const DEFAULT_INITIAL_INVESTMENT: f64 = 10_000.0;

/// HTTP client for the B3 analytics API
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: Client,
}

impl ApiClient {
    /// Create a client for the configured base URL and timeout.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|e| Error::Config(format!("invalid base URL {}: {}", base_url, e)))?;

        if config.timeout_ms < MIN_TIMEOUT_MS {
            return Err(Error::Config(format!(
                "timeout of {} ms is below the {} ms minimum",
                config.timeout_ms, MIN_TIMEOUT_MS
            )));
        }

        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self { base_url, client })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ========================================================================
    // Internal HTTP Methods
    // ========================================================================

    /// Make a GET request
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.dispatch(self.client.get(self.url(path))).await
    }

    /// Make a GET request with query parameters
    async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.dispatch(self.client.get(self.url(path)).query(query)).await
    }

    /// Make a POST request
    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        self.dispatch(self.client.post(self.url(path)).json(body)).await
    }

    /// Every request goes through here. Successful bodies pass through
    /// untouched; failures are logged and handed back unchanged.
    async fn dispatch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        match self.execute(request).await {
            Ok(body) => Ok(body),
            Err(err) => {
                tracing::error!("API error: {}", err);
                Err(err)
            }
        }
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let request = request.build()?;
        tracing::debug!("{} {}", request.method(), request.url());

        let response = self.client.execute(request).await?.error_for_status()?;
        Ok(response.json().await?)
    }

    // ========================================================================
    // Stock API
    // ========================================================================

    /// Get the daily series for a stock, with indicators
    pub async fn get_stock_data(&self, symbol: &str, period: &str) -> Result<StockSeries> {
        self.get_with_query(
            &format!("/stock/{}", symbol),
            &[("period", period), ("include_indicators", "true")],
        )
        .await
    }

    /// Get the latest quote for a stock
    pub async fn get_stock_info(&self, symbol: &str) -> Result<StockInfo> {
        self.get(&format!("/stock/{}/info", symbol)).await
    }

    /// List the stocks the server can serve
    pub async fn get_available_stocks(&self) -> Result<Value> {
        self.get("/stocks/list").await
    }

    // ========================================================================
    // Analysis API
    // ========================================================================

    /// Run a full analysis, optionally bounded by dates
    pub async fn analyze_stock(
        &self,
        symbol: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<AnalysisResult> {
        let body = AnalysisRequest {
            symbol: symbol.to_string(),
            start_date,
            end_date,
        };
        self.post("/analyze", &body).await
    }

    /// Run the quick analysis for a stock
    pub async fn quick_analyze(&self, symbol: &str) -> Result<AnalysisResult> {
        self.get(&format!("/analyze/quick/{}", symbol)).await
    }

    // ========================================================================
    // Portfolio API
    // ========================================================================

    /// Analyze a portfolio of stocks
    pub async fn analyze_portfolio(
        &self,
        symbols: &[String],
        weights: Option<&[f64]>,
        initial_investment: f64,
    ) -> Result<PortfolioAnalysis> {
        self.get_with_query(
            "/portfolio/analyze",
            &portfolio_query(symbols, weights, initial_investment),
        )
        .await
    }

    /// Build, without sending, the request `analyze_portfolio` would issue.
    pub fn portfolio_request(
        &self,
        symbols: &[String],
        weights: Option<&[f64]>,
        initial_investment: f64,
    ) -> Result<Request> {
        Ok(self
            .client
            .get(self.url("/portfolio/analyze"))
            .query(&portfolio_query(symbols, weights, initial_investment))
            .build()?)
    }

    // ========================================================================
    // Market API
    // ========================================================================

    /// Get the market overview
    pub async fn get_market_overview(&self) -> Result<MarketOverview> {
        self.get("/market/overview").await
    }

    // ========================================================================
    // System API
    // ========================================================================

    /// Get the detailed health report
    pub async fn get_health(&self) -> Result<Value> {
        self.get("/health/detailed").await
    }

    /// Ask the server to drop its response cache
    pub async fn clear_cache(&self) -> Result<Value> {
        self.get("/cache/clear").await
    }
}

#[async_trait]
impl MarketApi for ApiClient {
    async fn get_stock_data(&self, symbol: &str, period: &str) -> Result<StockSeries> {
        ApiClient::get_stock_data(self, symbol, period).await
    }

    async fn get_stock_info(&self, symbol: &str) -> Result<StockInfo> {
        ApiClient::get_stock_info(self, symbol).await
    }

    async fn analyze_stock(
        &self,
        symbol: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<AnalysisResult> {
        ApiClient::analyze_stock(self, symbol, start_date, end_date).await
    }

    async fn quick_analyze(&self, symbol: &str) -> Result<AnalysisResult> {
        ApiClient::quick_analyze(self, symbol).await
    }

    async fn analyze_portfolio(
        &self,
        symbols: &[String],
        weights: Option<&[f64]>,
        initial_investment: f64,
    ) -> Result<PortfolioAnalysis> {
        ApiClient::analyze_portfolio(self, symbols, weights, initial_investment).await
    }

    async fn get_market_overview(&self) -> Result<MarketOverview> {
        ApiClient::get_market_overview(self).await
    }
}

// ============================================================================
// Query Building
// ============================================================================

/// Query pairs for `/portfolio/analyze`; `weights` is left out entirely when
/// the caller gave none.
fn portfolio_query(
    symbols: &[String],
    weights: Option<&[f64]>,
    initial_investment: f64,
) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("stocks", symbols.join(",")),
        ("initial_investment", format_number(initial_investment)),
    ];

    if let Some(weights) = weights {
        let joined = weights
            .iter()
            .map(|w| format_number(*w))
            .collect::<Vec<_>>()
            .join(",");
        query.push(("weights", joined));
    }

    query
}

/// Shortest decimal form: `1.0` becomes `1`, `0.25` stays `0.25`.
fn format_number(value: f64) -> String {
    value.to_string()
}
