//! Reactive store around [`AppState`]
//!
//! A [`Store`] is the only way to change state. Every fetch action runs the
//! same three phases:
//!
//! 1. raise `loading`, clear `error`, notify
//! 2. await the [`MarketApi`] call
//! 3. commit the snapshot (or the failure message), drop `loading`, notify
//!
//! Failures never escape an action; they only show up in `state.error`.
//!
//! Subscribers get every post-mutation state, in mutation order. Synchronous
//! listeners registered with [`Store::subscribe`] run right after the
//! mutation that produced the state; async consumers can read the same
//! sequence from [`Store::changes`]. A listener that panics is logged and
//! skipped; the others still see the state.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::{NaiveDate, Utc};
use tokio::sync::broadcast;

use crate::api::{MarketApi, DEFAULT_INITIAL_INVESTMENT};
use crate::config::{StalePolicy, StoreOptions};
use crate::state::{AppState, ResourceKind};
use crate::Result;

type Listener = Arc<dyn Fn(&AppState) + Send + Sync>;

/// Handle to a shared application state.
///
/// Cloning is cheap and every clone drives the same state.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

struct Inner {
    api: Arc<dyn MarketApi>,
    options: StoreOptions,
    shared: Mutex<Shared>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
    next_request_id: AtomicU64,
    changes: broadcast::Sender<Arc<AppState>>,
}

/// State plus the queue of snapshots still waiting to be delivered.
struct Shared {
    state: AppState,
    pending: VecDeque<Arc<AppState>>,
    draining: bool,
}

impl Store {
    /// Create a store with an empty state.
    pub fn new(api: Arc<dyn MarketApi>, options: StoreOptions) -> Self {
        let (changes, _) = broadcast::channel(options.broadcast_capacity.max(1));

        tracing::debug!("Store created with {:?} stale policy", options.stale_policy);

        Self {
            inner: Arc::new(Inner {
                api,
                options,
                shared: Mutex::new(Shared {
                    state: AppState::default(),
                    pending: VecDeque::new(),
                    draining: false,
                }),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(1),
                next_request_id: AtomicU64::new(1),
                changes,
            }),
        }
    }

    /// Clone of the current state.
    pub fn snapshot(&self) -> AppState {
        lock(&self.inner.shared).state.clone()
    }

    /// Register a listener that is called with the full state after every
    /// mutation. Dropping the returned [`Subscription`] unregisters it.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&AppState) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.listeners).push((id, Arc::new(listener)));

        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Receive every post-mutation state asynchronously.
    pub fn changes(&self) -> broadcast::Receiver<Arc<AppState>> {
        self.inner.changes.subscribe()
    }

    // ========================================================================
    // Setters
    // ========================================================================

    pub fn set_loading(&self, loading: bool) {
        self.update(|state| state.set_loading(loading));
    }

    pub fn set_error(&self, error: Option<String>) {
        self.update(|state| state.set_error(error));
    }

    // ========================================================================
    // Fetch Actions
    // ========================================================================

    /// Fetch the daily series for `symbol` and make it the current stock.
    pub async fn fetch_stock_data(&self, symbol: &str, period: &str) {
        let kind = ResourceKind::StockData;
        let request_id = self.begin(kind);
        let result = self.inner.api.get_stock_data(symbol, period).await;
        self.finish(kind, request_id, result, |state, series| {
            state.stock_data = Some(series.data);
            state.current_stock = Some(symbol.to_string());
        });
    }

    /// Fetch the latest quote for `symbol`.
    pub async fn fetch_stock_info(&self, symbol: &str) {
        let kind = ResourceKind::StockInfo;
        let request_id = self.begin(kind);
        let result = self.inner.api.get_stock_info(symbol).await;
        self.finish(kind, request_id, result, |state, info| {
            state.stock_info = Some(info);
        });
    }

    /// Run the quick analysis for `symbol`.
    pub async fn fetch_analysis(&self, symbol: &str) {
        let kind = ResourceKind::Analysis;
        let request_id = self.begin(kind);
        let result = self.inner.api.quick_analyze(symbol).await;
        self.finish(kind, request_id, result, |state, analysis| {
            state.analysis = Some(analysis);
        });
    }

    /// Run the full analysis for `symbol`, optionally bounded by dates.
    /// Shares the `analysis` slice with [`Store::fetch_analysis`].
    pub async fn fetch_full_analysis(
        &self,
        symbol: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) {
        let kind = ResourceKind::Analysis;
        let request_id = self.begin(kind);
        let result = self
            .inner
            .api
            .analyze_stock(symbol, start_date, end_date)
            .await;
        self.finish(kind, request_id, result, |state, analysis| {
            state.analysis = Some(analysis);
        });
    }

    /// Analyze a portfolio with the default initial investment.
    pub async fn fetch_portfolio_analysis(&self, symbols: &[String], weights: Option<&[f64]>) {
        let kind = ResourceKind::PortfolioAnalysis;
        let request_id = self.begin(kind);
        let result = self
            .inner
            .api
            .analyze_portfolio(symbols, weights, DEFAULT_INITIAL_INVESTMENT)
            .await;
        self.finish(kind, request_id, result, |state, analysis| {
            state.portfolio_analysis = Some(analysis);
        });
    }

    /// Fetch the market overview.
    pub async fn fetch_market_overview(&self) {
        let kind = ResourceKind::MarketOverview;
        let request_id = self.begin(kind);
        let result = self.inner.api.get_market_overview().await;
        self.finish(kind, request_id, result, |state, overview| {
            state.market_overview = Some(overview);
        });
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn begin(&self, kind: ResourceKind) -> u64 {
        let request_id = self.inner.next_request_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("{} request {} started", kind.name(), request_id);
        self.update(|state| state.begin_request(kind, request_id));
        request_id
    }

    fn finish<T>(
        &self,
        kind: ResourceKind,
        request_id: u64,
        result: Result<T>,
        commit: impl FnOnce(&mut AppState, T),
    ) {
        let policy = self.inner.options.stale_policy;

        self.mutate(|state| {
            if policy == StalePolicy::Discard && !state.is_latest(kind, request_id) {
                tracing::debug!("{} request {} superseded, discarding", kind.name(), request_id);
                return false;
            }

            match result {
                Ok(value) => {
                    commit(state, value);
                    state.complete_request(kind, request_id, Utc::now());
                    tracing::debug!("{} request {} committed", kind.name(), request_id);
                }
                Err(err) => {
                    state.fail_request(kind, request_id);
                    tracing::debug!("{} request {} failed: {}", kind.name(), request_id, err);
                }
            }
            true
        });
    }

    fn update(&self, f: impl FnOnce(&mut AppState)) {
        self.mutate(|state| {
            f(state);
            true
        });
    }

    /// Apply `f` under the state lock. When it returns `true` the new state is
    /// queued for delivery; whichever caller finds the queue idle delivers
    /// everything queued, in order, outside the lock.
    fn mutate(&self, f: impl FnOnce(&mut AppState) -> bool) {
        let should_drain = {
            let mut shared = lock(&self.inner.shared);
            if !f(&mut shared.state) {
                return;
            }
            let snapshot = Arc::new(shared.state.clone());
            shared.pending.push_back(snapshot);

            let idle = !shared.draining;
            shared.draining = true;
            idle
        };

        if should_drain {
            self.drain();
        }
    }

    fn drain(&self) {
        loop {
            let next = {
                let mut shared = lock(&self.inner.shared);
                match shared.pending.pop_front() {
                    Some(snapshot) => snapshot,
                    None => {
                        shared.draining = false;
                        return;
                    }
                }
            };
            self.deliver(next);
        }
    }

    fn deliver(&self, snapshot: Arc<AppState>) {
        let listeners: Vec<Listener> = lock(&self.inner.listeners)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        tracing::trace!(
            "Notifying {} listeners (loading={}, error={:?})",
            listeners.len(),
            snapshot.loading,
            snapshot.error
        );

        // A panicking listener must not leave the queue marked as draining
        for listener in &listeners {
            if panic::catch_unwind(AssertUnwindSafe(|| listener(&snapshot))).is_err() {
                tracing::error!("State listener panicked; continuing with the rest");
            }
        }

        // No receivers is fine
        let _ = self.inner.changes.send(snapshot);
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("options", &self.inner.options)
            .field("state", &self.snapshot())
            .finish()
    }
}

/// Keeps a listener registered until dropped.
#[must_use = "dropping a Subscription unregisters the listener"]
pub struct Subscription {
    id: u64,
    inner: Weak<Inner>,
}

impl Subscription {
    /// Unregister the listener now.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            lock(&inner.listeners).retain(|(id, _)| *id != self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Recover the guard from a poisoned lock.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
