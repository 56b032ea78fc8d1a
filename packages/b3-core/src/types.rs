//! Payload types exchanged with the B3 analytics API.
//!
//! Everything the store keeps has an explicit schema here, so a malformed
//! body is rejected when it is decoded instead of leaking into state.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Stock Types
// ============================================================================

/// One OHLCV bar of a daily series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockBar {
    #[serde(default)]
    pub symbol: String,
    /// Trading day as sent by the server (`YYYY-MM-DD` or an ISO timestamp)
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Envelope returned by `GET /stock/{symbol}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockSeries {
    pub symbol: String,
    /// Bars in the order the server returned them (chronological)
    pub data: Vec<StockBar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    /// Indicator payload; computed server-side and not interpreted here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicators: Option<Value>,
}

/// Latest quote snapshot for a single stock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockInfo {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    pub current_price: f64,
    pub open_price: f64,
    pub day_high: f64,
    pub day_low: f64,
    pub volume: f64,
    /// Which upstream feed produced the quote
    pub data_source: String,
}

// ============================================================================
// Analysis Types
// ============================================================================

/// Body of `POST /analyze`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisRequest {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

/// Summary statistics attached to an analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisStatistics {
    pub current_price: f64,
    pub annual_return: f64,
    pub annual_volatility: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
}

/// Server-computed analysis of a single stock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub symbol: String,
    pub score: f64,
    /// Trend label, e.g. "alta" or "baixa"
    pub trend: String,
    pub statistics: AnalysisStatistics,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

// ============================================================================
// Portfolio Types
// ============================================================================

/// Portfolio-level statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioStatistics {
    pub expected_annual_return: f64,
    pub annual_volatility: f64,
    pub sharpe_ratio: f64,
}

/// Result of `GET /portfolio/analyze`.
///
/// `individual_analyses` and `weights` are keyed by the symbols exactly as the
/// request sent them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioAnalysis {
    pub portfolio_statistics: PortfolioStatistics,
    #[serde(default)]
    pub individual_analyses: HashMap<String, AnalysisResult>,
    #[serde(default)]
    pub weights: HashMap<String, f64>,
    pub diversification_score: f64,
}

// ============================================================================
// Market Types
// ============================================================================

/// Market overview payload.
///
/// The server does not publish a fixed shape for this endpoint, so only the
/// outer structure is enforced: the body must be a JSON object. The optional
/// timestamp is lifted out and every other key is kept as a named section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MarketOverview {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub sections: Map<String, Value>,
}

impl MarketOverview {
    /// Get a named section of the overview.
    pub fn section(&self, name: &str) -> Option<&Value> {
        self.sections.get(name)
    }
}
