//! Plant-level blend runs and discharge optimization.
//!
//! `blend-core` validates the input tables into a [`Plant`], runs every
//! silo through the discharge physics, aggregates the outlet streams into
//! one blend with mass-balance ledgers, and searches discharge fractions
//! that bring the blend closest to a target quality profile.
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration with environment overrides.
//! - [`dataset`] -- Table validation and the immutable [`Plant`].
//! - [`orchestrator`] -- Parallel multi-silo runs.
//! - [`blend`] -- Aggregation of silo outcomes into a [`RunResult`].
//! - [`optimizer`] -- Latin hypercube plus local refinement search.
//! - [`sample`] -- Built-in demonstration dataset.
//! - [`error`] -- The [`BlendError`] taxonomy.
//!
//! [`RunResult`]: blend_types::RunResult

pub mod blend;
pub mod config;
pub mod dataset;
pub mod error;
pub mod optimizer;
pub mod orchestrator;
pub mod sample;

pub use blend::{aggregate, defined_blend};
pub use config::{
    BlendConfig, ConfigError, HttpConfig, LoggingConfig, OptimizerConfig, RunOverrides,
    SimulationConfig,
};
pub use dataset::{Plant, validate_tables, validation_report};
pub use error::BlendError;
pub use optimizer::{OBJECTIVE_METHOD, OptimizeRequest, optimize};
pub use orchestrator::{run, run_tables};
pub use sample::sample_tables;
