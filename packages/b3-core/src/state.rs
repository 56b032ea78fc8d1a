//! Application state shared with the UI layer
//!
//! [`AppState`] is the snapshot subscribers see. It holds one slice per
//! resource kind plus two global flags, `loading` and `error`, that every
//! action writes. Because the flags are shared, two actions in flight at the
//! same time overwrite each other's flags and whichever resolves last wins.
//! The per-resource [`ResourceStatus`] records are scoped to one kind each and
//! do not have that problem.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{AnalysisResult, MarketOverview, PortfolioAnalysis, StockBar, StockInfo};

// ============================================================================
// Application State
// ============================================================================

/// Latest snapshot of everything fetched from the API
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppState {
    // Global request flags
    pub loading: bool,
    pub error: Option<String>,

    // Symbol of the last successful stock series fetch
    pub current_stock: Option<String>,

    // Resource slices
    pub stock_data: Option<Vec<StockBar>>,
    pub stock_info: Option<StockInfo>,
    pub analysis: Option<AnalysisResult>,
    pub portfolio_analysis: Option<PortfolioAnalysis>,
    pub market_overview: Option<MarketOverview>,

    // Per-resource request tracking
    pub status: BTreeMap<ResourceKind, ResourceStatus>,
}

// ============================================================================
// Supporting Types
// ============================================================================

/// The independently tracked resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    StockData,
    StockInfo,
    Analysis,
    PortfolioAnalysis,
    MarketOverview,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::StockData,
        ResourceKind::StockInfo,
        ResourceKind::Analysis,
        ResourceKind::PortfolioAnalysis,
        ResourceKind::MarketOverview,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ResourceKind::StockData => "stock_data",
            ResourceKind::StockInfo => "stock_info",
            ResourceKind::Analysis => "analysis",
            ResourceKind::PortfolioAnalysis => "portfolio_analysis",
            ResourceKind::MarketOverview => "market_overview",
        }
    }

    /// Message shown to the user when a fetch of this kind fails
    pub fn failure_message(&self) -> &'static str {
        match self {
            ResourceKind::StockData => "Failed to fetch stock data",
            ResourceKind::StockInfo => "Failed to fetch stock info",
            ResourceKind::Analysis => "Failed to run analysis",
            ResourceKind::PortfolioAnalysis => "Failed to analyze portfolio",
            ResourceKind::MarketOverview => "Failed to fetch market data",
        }
    }
}

/// Where the latest request for a resource stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourcePhase {
    #[default]
    Idle,
    Loading,
    Success,
    Failure,
}

/// Request bookkeeping for one resource kind
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceStatus {
    pub phase: ResourcePhase,
    pub error: Option<String>,
    /// When a response for this resource last committed successfully
    pub last_updated: Option<DateTime<Utc>>,
    /// Id of the most recently issued request for this resource
    pub request_id: u64,
}

// ============================================================================
// State Actions
// ============================================================================

impl AppState {
    /// Set the global loading flag
    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    /// Set or clear the global error message
    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    /// Mark a request as started: raise `loading`, clear `error`, and make
    /// `request_id` the latest request for `kind`.
    pub fn begin_request(&mut self, kind: ResourceKind, request_id: u64) {
        self.loading = true;
        self.error = None;

        let status = self.status.entry(kind).or_default();
        status.phase = ResourcePhase::Loading;
        status.error = None;
        status.request_id = request_id;
    }

    /// Whether `request_id` is still the newest request issued for `kind`
    pub fn is_latest(&self, kind: ResourceKind, request_id: u64) -> bool {
        self.status
            .get(&kind)
            .map(|s| s.request_id == request_id)
            .unwrap_or(false)
    }

    /// Record a successful response. The slice itself is written by the
    /// caller; this only settles the flags.
    pub fn complete_request(&mut self, kind: ResourceKind, request_id: u64, at: DateTime<Utc>) {
        self.loading = false;

        if let Some(status) = self.status.get_mut(&kind) {
            if status.request_id == request_id {
                status.phase = ResourcePhase::Success;
                status.error = None;
                status.last_updated = Some(at);
            }
        }
    }

    /// Record a failed response. The slice for `kind` is left untouched.
    pub fn fail_request(&mut self, kind: ResourceKind, request_id: u64) {
        let message = kind.failure_message().to_string();
        self.loading = false;
        self.error = Some(message.clone());

        if let Some(status) = self.status.get_mut(&kind) {
            if status.request_id == request_id {
                status.phase = ResourcePhase::Failure;
                status.error = Some(message);
            }
        }
    }

    /// Get the status record for a resource
    pub fn resource(&self, kind: ResourceKind) -> Option<&ResourceStatus> {
        self.status.get(&kind)
    }

    /// Check if the latest request for a resource is still in flight
    pub fn is_resource_loading(&self, kind: ResourceKind) -> bool {
        self.status
            .get(&kind)
            .map(|s| s.phase == ResourcePhase::Loading)
            .unwrap_or(false)
    }
}
