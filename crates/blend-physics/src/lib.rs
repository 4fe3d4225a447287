//! Discharge physics for a single silo.
//!
//! This crate turns one loaded silo into per-segment discharged masses:
//! the Beverloo outlet flow fixes the discharge time, the layer geometry
//! places every segment on the discharge axis, and a Gaussian window around
//! the moving front decides which segments feed the outlet at each step.
//!
//! # Modules
//!
//! - [`flow`] -- Beverloo mass-flow rate and discharge times.
//! - [`geometry`] -- Segment masses to stacked height intervals.
//! - [`mixing`] -- Error-function approximation and the front-position
//!   [`MixingSampler`].
//! - [`simulator`] -- The [`SiloSimulator`] step loop, cap-and-redistribute
//!   draws and sigma auto-adjustment.
//! - [`blend`] -- Mass-weighted quality accumulation.
//! - [`error`] -- Error types for modelling and simulation.
//!
//! [`MixingSampler`]: mixing::MixingSampler
//! [`SiloSimulator`]: simulator::SiloSimulator

pub mod blend;
pub mod error;
pub mod flow;
pub mod geometry;
pub mod mixing;
pub mod simulator;

// Re-export primary types at crate root.
pub use blend::BlendAccumulator;
pub use error::PhysicsError;
pub use flow::{BeverlooParams, FlowEstimate, Material, mass_flow_rate_kg_s};
pub use geometry::{ColumnProfile, LayerInterval, cross_section_area_m2};
pub use mixing::{MixingSampler, erf, normal_cdf};
pub use simulator::{
    MixingParams, SiloOutcome, SiloSimulator, SimulatorSettings, resolve_target_mass,
};
