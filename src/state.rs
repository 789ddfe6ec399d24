//! # Application State
//!
//! Process-wide counters shared by every request handler and every relay.
//!
//! ## Sharing pattern:
//! `AppState` is cheap to clone: the mutable parts live behind
//! `Arc<RwLock<T>>`, so every actix worker and every relay task sees the same
//! counters. The domain collaborators (store, cache, pipeline, LLM) are *not*
//! kept here; they are handed to each service directly at startup.
//!
//! ## Lock poisoning:
//! A panic while holding the metrics lock must not take the whole server down
//! with it, so poisoned locks are recovered with `PoisonError::into_inner`.
//! Counters are plain integers and stay consistent either way.

use crate::config::AppConfig;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct AppState {
    /// Loaded once at startup; never changes afterwards
    pub config: Arc<AppConfig>,
    pub metrics: Arc<RwLock<AppMetrics>>,
    pub start_time: Instant,
}

#[derive(Debug, Default)]
pub struct AppMetrics {
    pub request_count: u64,
    pub error_count: u64,
    /// Client connections currently bridged to the pipeline
    pub active_relays: usize,
    /// Keyed by `"<METHOD> <route pattern>"`, e.g. `"GET /api/v1/sessions/{id}"`
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count == 0 {
            0.0
        } else {
            self.total_duration_ms as f64 / self.request_count as f64
        }
    }

    /// Errors as a percentage of requests.
    pub fn error_rate(&self) -> f64 {
        if self.request_count == 0 {
            0.0
        } else {
            (self.error_count as f64 / self.request_count as f64) * 100.0
        }
    }
}

/// Point-in-time copy of [`AppMetrics`], safe to serialize without holding the lock.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub request_count: u64,
    pub error_count: u64,
    pub active_relays: usize,
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn read_metrics(&self) -> RwLockReadGuard<'_, AppMetrics> {
        self.metrics.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_metrics(&self) -> RwLockWriteGuard<'_, AppMetrics> {
        self.metrics.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn increment_request_count(&self) {
        self.write_metrics().request_count += 1;
    }

    pub fn increment_error_count(&self) {
        self.write_metrics().error_count += 1;
    }

    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.write_metrics();
        let entry = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();
        entry.request_count += 1;
        entry.total_duration_ms += duration_ms;
        if is_error {
            entry.error_count += 1;
        }
    }

    /// Claim a relay slot unless `limit` relays are already running.
    ///
    /// The check and the increment happen under one lock, so concurrent
    /// upgrades can never overshoot the limit.
    pub fn try_acquire_relay(&self, limit: usize) -> bool {
        let mut metrics = self.write_metrics();
        if metrics.active_relays >= limit {
            return false;
        }
        metrics.active_relays += 1;
        true
    }

    pub fn release_relay(&self) {
        let mut metrics = self.write_metrics();
        metrics.active_relays = metrics.active_relays.saturating_sub(1);
    }

    pub fn active_relays(&self) -> usize {
        self.read_metrics().active_relays
    }

    pub fn get_metrics_snapshot(&self) -> MetricsSnapshot {
        let metrics = self.read_metrics();
        MetricsSnapshot {
            request_count: metrics.request_count,
            error_count: metrics.error_count,
            active_relays: metrics.active_relays,
            endpoint_metrics: metrics.endpoint_metrics.clone(),
        }
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Holds one relay slot and gives it back when dropped.
///
/// Dropping covers every exit path: the relay finishing, the client
/// disconnecting, or the upgrade failing before the relay ever starts.
#[derive(Debug)]
pub struct RelaySlot {
    state: AppState,
}

impl RelaySlot {
    pub fn acquire(state: &AppState, limit: usize) -> Option<Self> {
        state.try_acquire_relay(limit).then(|| Self { state: state.clone() })
    }
}

impl Drop for RelaySlot {
    fn drop(&mut self) {
        self.state.release_relay();
    }
}
