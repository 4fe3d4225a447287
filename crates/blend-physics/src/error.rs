//! Error types for the `blend-physics` crate.
//!
//! Variants split into two families: bad inputs that the caller must fix
//! ([`PhysicsError::is_configuration`]) and numerical failures detected
//! while stepping a silo.

use blend_ledger::LedgerError;
use blend_types::SiloId;

/// Errors that can occur while modelling or simulating a silo.
#[derive(Debug, thiserror::Error)]
pub enum PhysicsError {
    /// A material or model parameter is out of its valid range.
    #[error("{name} must be {requirement}, got {value}")]
    InvalidParameter {
        /// Parameter name as it appears in configuration.
        name: &'static str,
        /// Human-readable constraint, e.g. "> 0".
        requirement: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// A silo dimension is non-positive or non-finite.
    #[error("silo {silo_id}: {name} must be > 0, got {value}")]
    InvalidGeometry {
        /// Silo with the bad dimension.
        silo_id: SiloId,
        /// Field name.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// The effective outlet `D - k*d` is not positive.
    #[error(
        "silo {silo_id}: invalid Beverloo term D-k*d <= 0 ({outlet_diameter_m} - {k}*{grain_diameter_m})"
    )]
    OutletTooNarrow {
        /// Silo with the narrow outlet.
        silo_id: SiloId,
        /// Outlet diameter `D`.
        outlet_diameter_m: f64,
        /// Beverloo shape coefficient `k`.
        k: f64,
        /// Grain diameter `d`.
        grain_diameter_m: f64,
    },

    /// A segment carries negative or non-finite mass.
    #[error("silo {silo_id}: segment at layer {layer_index} has invalid mass {mass_kg}")]
    InvalidSegmentMass {
        /// Silo holding the segment.
        silo_id: SiloId,
        /// Layer index of the segment.
        layer_index: u32,
        /// The rejected mass.
        mass_kg: f64,
    },

    /// The discharge rule cannot be satisfied.
    #[error("silo {silo_id}: {reason}")]
    InvalidDischarge {
        /// Silo with the bad rule.
        silo_id: SiloId,
        /// What is wrong with it.
        reason: String,
    },

    /// A NaN or infinity appeared during stepping.
    #[error("silo {silo_id}: non-finite {quantity} at step {step}")]
    NonFinite {
        /// Silo being simulated.
        silo_id: SiloId,
        /// Step where the value appeared.
        step: u32,
        /// Which quantity went bad.
        quantity: &'static str,
    },

    /// The mass ledger rejected a booking.
    #[error("ledger error: {source}")]
    Ledger {
        /// The underlying ledger error.
        #[from]
        source: LedgerError,
    },
}

impl PhysicsError {
    /// Whether the error stems from invalid input rather than a numerical
    /// failure during the run.
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidParameter { .. }
                | Self::InvalidGeometry { .. }
                | Self::OutletTooNarrow { .. }
                | Self::InvalidSegmentMass { .. }
                | Self::InvalidDischarge { .. }
        )
    }
}

/// Reject a parameter that is not finite and strictly positive.
pub(crate) fn require_positive(name: &'static str, value: f64) -> Result<(), PhysicsError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PhysicsError::InvalidParameter {
            name,
            requirement: "finite and > 0",
            value,
        })
    }
}
