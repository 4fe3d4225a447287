//! Error taxonomy for blend runs and searches.
//!
//! Every failure a caller can see is one of four kinds. None of them is
//! retried: identical inputs reproduce identical failures.

use blend_ledger::{LedgerAnomaly, LedgerError};
use blend_physics::PhysicsError;

/// Errors returned by [`run`](crate::orchestrator::run) and
/// [`optimize`](crate::optimizer::optimize).
#[derive(Debug, thiserror::Error)]
pub enum BlendError {
    /// Input tables or parameters are invalid; the caller must fix them.
    #[error("configuration error: {message}")]
    Configuration {
        /// What is wrong.
        message: String,
    },

    /// The model produced NaN/infinity or broke mass conservation.
    #[error("computation error: {message}")]
    Computation {
        /// What went wrong.
        message: String,
    },

    /// A blend was requested but no mass was discharged.
    #[error("blend undefined: no mass was discharged")]
    UndefinedBlend,

    /// Every optimizer candidate failed.
    #[error("search exhausted: none of {evaluations} candidates could be scored")]
    SearchExhausted {
        /// Candidates attempted.
        evaluations: u32,
    },
}

impl BlendError {
    /// Shorthand for a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Shorthand for a computation error.
    pub fn computation(message: impl Into<String>) -> Self {
        Self::Computation {
            message: message.into(),
        }
    }
}

impl From<PhysicsError> for BlendError {
    fn from(err: PhysicsError) -> Self {
        if err.is_configuration() {
            Self::configuration(err.to_string())
        } else {
            Self::computation(err.to_string())
        }
    }
}

impl From<LedgerError> for BlendError {
    fn from(err: LedgerError) -> Self {
        Self::computation(err.to_string())
    }
}

impl From<LedgerAnomaly> for BlendError {
    fn from(anomaly: LedgerAnomaly) -> Self {
        Self::computation(anomaly.message)
    }
}
