//! Segment mass ledger for silo discharge runs.
//!
//! Every kilogram that leaves a silo is booked against the segment it came
//! from. Mass is never created: a segment opens with its loaded mass and
//! can only be drawn down. The state ledgers reported after a run are
//! derived from these bookings, and the conservation law is checked before
//! any result is returned.
//!
//! # Architecture
//!
//! - [`ledger`] -- The [`MassLedger`] struct: per-silo segment accounts and
//!   an append-only log of discharge bookings.
//! - [`rollup`] -- Lot state ledger aggregated from segment rows.
//! - [`conservation`] -- Conservation law verification and anomaly detection.
//!
//! # Conservation Law
//!
//! For every segment, and therefore for every lot and silo:
//!
//! ```text
//! initial_mass == discharged_mass + remaining_mass
//! ```
//!
//! within a small tolerance relative to the loaded mass. A violation produces a
//! [`LedgerAnomaly`]. The ledger never panics; it returns errors.
//!
//! # Usage
//!
//! ```
//! use blend_ledger::{ConservationResult, MassLedger};
//! use blend_types::{LotId, SiloId, SupplierId};
//!
//! let mut ledger = MassLedger::new(SiloId::from("S1"));
//! ledger
//!     .open_segment(0, LotId::from("L1"), SupplierId::from("BBM"), 100.0)
//!     .ok();
//! ledger.record_discharge(0, 0, 40.0).ok();
//!
//! assert_eq!(ledger.verify_conservation(), ConservationResult::Balanced);
//! ```

pub mod conservation;
pub mod ledger;
pub mod rollup;

pub use conservation::ConservationResult;
pub use ledger::{DischargeEntry, MassLedger, SegmentAccount};
pub use rollup::lot_rows;

use std::collections::BTreeMap;

use blend_types::SiloId;

/// Relative tolerance for mass balance comparisons.
pub const MASS_TOLERANCE: f64 = 1e-6;

/// Tolerance in kg for balances over `scale_kg` of loaded mass.
///
/// Scales below 1 kg use the 1 kg floor so empty segments still compare
/// against `1e-6` kg.
pub fn mass_tolerance_kg(scale_kg: f64) -> f64 {
    MASS_TOLERANCE * scale_kg.abs().max(1.0)
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when recording ledger entries.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Quantity must not be negative.
    #[error("ledger quantity must be non-negative, got {quantity}")]
    NegativeQuantity {
        /// The invalid quantity.
        quantity: f64,
    },

    /// Quantity must be a finite number.
    #[error("ledger quantity must be finite, got {quantity}")]
    NonFiniteQuantity {
        /// The invalid quantity.
        quantity: f64,
    },

    /// A booking would draw more than the segment still holds.
    #[error(
        "silo {silo_id} layer {layer_index}: cannot discharge {requested} kg, only {available} kg remain"
    )]
    Overdraw {
        /// Silo of the segment.
        silo_id: SiloId,
        /// Layer index of the segment.
        layer_index: u32,
        /// Mass the booking asked for.
        requested: f64,
        /// Mass still in the segment.
        available: f64,
    },

    /// No segment is open at this layer index.
    #[error("silo {silo_id} has no segment at layer {layer_index}")]
    UnknownSegment {
        /// Silo the booking was made against.
        silo_id: SiloId,
        /// The missing layer index.
        layer_index: u32,
    },

    /// Segments must be opened contiguously from layer 0.
    #[error("silo {silo_id}: expected layer {expected}, got layer {actual}")]
    OutOfOrderSegment {
        /// Silo being loaded.
        silo_id: SiloId,
        /// The next index the ledger accepts.
        expected: u32,
        /// The index that was offered.
        actual: u32,
    },
}

// ---------------------------------------------------------------------------
// Anomaly type
// ---------------------------------------------------------------------------

/// A conservation law violation detected after a run.
///
/// Each imbalance is keyed by the entry it concerns (for example
/// `"S1/layer 2"` or `"lot L1003"`) and records `(expected, actual)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerAnomaly {
    /// Silo the anomaly was found in, `None` for plant-wide roll-ups.
    pub silo_id: Option<SiloId>,
    /// Per-entry imbalance: (`expected`, `actual`).
    pub imbalances: BTreeMap<String, (f64, f64)>,
    /// Human-readable description of the anomaly.
    pub message: String,
}

impl core::fmt::Display for LedgerAnomaly {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Reject negative or non-finite quantities.
pub(crate) fn check_quantity(quantity: f64) -> Result<(), LedgerError> {
    if !quantity.is_finite() {
        return Err(LedgerError::NonFiniteQuantity { quantity });
    }
    if quantity < 0.0 {
        return Err(LedgerError::NegativeQuantity { quantity });
    }
    Ok(())
}
