//! Shared type definitions for the silo-blend simulator.
//!
//! This crate is the single source of truth for the entities every other
//! crate exchanges: identifiers, quality attributes, the input tables, the
//! validated plant model, and the run/optimization result shapes. Result
//! types flow to `TypeScript` via `ts-rs` for UI consumers.
//!
//! # Modules
//!
//! - [`ids`] -- String-backed identifier newtypes
//! - [`enums`] -- Quality attributes and silo lifecycle enums
//! - [`structs`] -- Input tables, plant model, ledger rows, results

pub mod enums;
pub mod ids;
pub mod structs;

pub use enums::{Completion, QualityParam, SiloPhase};
pub use ids::{LotId, SiloId, SupplierId};
pub use structs::{
    BlendedParams, CandidateSummary, Coa, DischargeRecord, DischargeTarget, InputTables, Layer,
    LayerRecord, LotLedgerRow, MassBalance, OptimizationResult, RunResult, SegmentLedgerRow, Silo,
    SiloLedgerRow, SiloRecord, SiloRunSummary, SupplierRecord, TrajectoryPoint, ValidationReport,
};
