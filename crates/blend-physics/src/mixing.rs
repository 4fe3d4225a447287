//! Front-position mixing sampler.
//!
//! Material leaving the outlet at a given moment is drawn from a Gaussian
//! window of width `sigma` centred on the discharge front. Each segment's
//! share is the kernel mass over its height interval, normalized by the
//! kernel mass over the whole column and then renormalized over the
//! segments that still hold material.

use crate::error::{PhysicsError, require_positive};
use crate::geometry::ColumnProfile;

/// Column kernel mass at or below which a step draws nothing.
pub const MIN_COLUMN_MASS: f64 = 1e-15;

/// Error function, Abramowitz and Stegun formula 7.1.26.
///
/// Absolute error stays below 1.5e-7 over the real line.
pub fn erf(x: f64) -> f64 {
    const P: f64 = 0.327_591_1;
    const A1: f64 = 0.254_829_592;
    const A2: f64 = -0.284_496_736;
    const A3: f64 = 1.421_413_741;
    const A4: f64 = -1.453_152_027;
    const A5: f64 = 1.061_405_429;

    let a = x.abs();
    let t = 1.0 / P.mul_add(a, 1.0);
    let poly = A5.mul_add(t, A4).mul_add(t, A3).mul_add(t, A2).mul_add(t, A1) * t;
    let magnitude = 1.0 - poly * (-(a * a)).exp();
    if x < 0.0 { -magnitude } else { magnitude }
}

/// Standard normal cumulative distribution function.
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

/// Gaussian mixing window over a column profile.
#[derive(Debug, Clone, Copy)]
pub struct MixingSampler<'a> {
    profile: &'a ColumnProfile,
    sigma_m: f64,
}

impl<'a> MixingSampler<'a> {
    /// Create a sampler with window width `sigma_m`.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::InvalidParameter`] if `sigma_m` is not
    /// finite and positive.
    pub fn new(profile: &'a ColumnProfile, sigma_m: f64) -> Result<Self, PhysicsError> {
        require_positive("sigma_m", sigma_m)?;
        Ok(Self { profile, sigma_m })
    }

    /// Window width in metres.
    pub const fn sigma_m(&self) -> f64 {
        self.sigma_m
    }

    /// Kernel mass of the whole column at front height `z_front_m`.
    pub fn column_mass(&self, z_front_m: f64) -> f64 {
        let s = self.sigma_m;
        normal_cdf((self.profile.total_height_m() - z_front_m) / s) - normal_cdf(-z_front_m / s)
    }

    /// Per-segment weights at `z_front_m`.
    ///
    /// Segments with `active[i] == false` get weight 0 and are left out of
    /// the normalization. The result sums to 1 when any active segment
    /// has positive kernel mass, and is all zeros otherwise.
    pub fn weights(&self, z_front_m: f64, active: &[bool]) -> Vec<f64> {
        let intervals = self.profile.intervals();
        let mut weights = vec![0.0; intervals.len()];

        let denom = self.column_mass(z_front_m);
        if denom.is_nan() || denom <= MIN_COLUMN_MASS {
            return weights;
        }

        let s = self.sigma_m;
        for ((w, interval), is_active) in weights.iter_mut().zip(intervals).zip(active) {
            if *is_active {
                let raw = normal_cdf((interval.z1_m - z_front_m) / s)
                    - normal_cdf((interval.z0_m - z_front_m) / s);
                *w = (raw / denom).max(0.0);
            }
        }

        let total: f64 = weights.iter().sum();
        if total > 0.0 {
            for w in &mut weights {
                *w /= total;
            }
        } else {
            weights.iter_mut().for_each(|w| *w = 0.0);
        }
        weights
    }
}
