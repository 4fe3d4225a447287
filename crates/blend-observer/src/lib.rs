//! HTTP API for silo blend runs.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **REST endpoints** to fetch the demonstration dataset, validate input
//!   tables, run a blend and search discharge fractions
//! - **Minimal HTML status page** (`GET /`) with request counters and
//!   links to the API
//!
//! # Architecture
//!
//! Handlers hold no plant state between requests. Each request carries its
//! own tables and parameter overrides, which are layered over the base
//! configuration in [`AppState`]. Simulation and search are CPU-bound, so
//! they run on the blocking pool and never stall the async runtime.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
