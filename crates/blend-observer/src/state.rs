//! Shared application state for the HTTP API.
//!
//! [`AppState`] holds the base configuration every request starts from and
//! a few request counters for the status page.

use std::sync::atomic::{AtomicU64, Ordering};

use blend_core::BlendConfig;

/// State shared by all handlers.
#[derive(Debug, Default)]
pub struct AppState {
    /// Base configuration; request overrides are layered on top.
    pub config: BlendConfig,
    runs: AtomicU64,
    optimizations: AtomicU64,
}

impl AppState {
    /// Create state around a base configuration.
    pub const fn new(config: BlendConfig) -> Self {
        Self {
            config,
            runs: AtomicU64::new(0),
            optimizations: AtomicU64::new(0),
        }
    }

    /// Count one completed run.
    pub fn record_run(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one completed optimization.
    pub fn record_optimization(&self) {
        self.optimizations.fetch_add(1, Ordering::Relaxed);
    }

    /// Completed runs since start.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    /// Completed optimizations since start.
    pub fn optimizations(&self) -> u64 {
        self.optimizations.load(Ordering::Relaxed)
    }
}
