//! Outlet mass-flow model (Beverloo equation).
//!
//! ```text
//! m_dot = C * rho * sqrt(g) * (D - k * d)^2.5
//! ```
//!
//! where `D` is the outlet diameter, `d` the grain diameter, `rho` the bulk
//! density and `C`, `k`, `g` the Beverloo constants. The rate is constant
//! over a discharge, so discharge times follow directly from mass.

use serde::Deserialize;

use blend_types::SiloId;

use crate::error::{PhysicsError, require_positive};

/// Bulk material properties.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Material {
    /// Bulk density in kg/m³.
    #[serde(default = "default_rho_bulk_kg_m3")]
    pub rho_bulk_kg_m3: f64,

    /// Characteristic grain diameter in metres.
    #[serde(default = "default_grain_diameter_m")]
    pub grain_diameter_m: f64,
}

impl Material {
    /// Check both properties are finite and positive.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::InvalidParameter`] naming the bad property.
    pub fn validate(&self) -> Result<(), PhysicsError> {
        require_positive("rho_bulk_kg_m3", self.rho_bulk_kg_m3)?;
        require_positive("grain_diameter_m", self.grain_diameter_m)
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            rho_bulk_kg_m3: default_rho_bulk_kg_m3(),
            grain_diameter_m: default_grain_diameter_m(),
        }
    }
}

/// Beverloo equation constants.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BeverlooParams {
    /// Discharge coefficient `C`.
    #[serde(default = "default_c")]
    pub c: f64,

    /// Empty-annulus shape coefficient `k`.
    #[serde(default = "default_k")]
    pub k: f64,

    /// Gravitational acceleration in m/s².
    #[serde(default = "default_gravity_m_s2")]
    pub gravity_m_s2: f64,
}

impl BeverlooParams {
    /// Check `C > 0`, `g > 0` and `k >= 0`.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::InvalidParameter`] naming the bad constant.
    pub fn validate(&self) -> Result<(), PhysicsError> {
        require_positive("beverloo_c", self.c)?;
        require_positive("gravity_m_s2", self.gravity_m_s2)?;
        if !self.k.is_finite() || self.k < 0.0 {
            return Err(PhysicsError::InvalidParameter {
                name: "beverloo_k",
                requirement: "finite and >= 0",
                value: self.k,
            });
        }
        Ok(())
    }
}

impl Default for BeverlooParams {
    fn default() -> Self {
        Self {
            c: default_c(),
            k: default_k(),
            gravity_m_s2: default_gravity_m_s2(),
        }
    }
}

/// Steady outlet mass-flow rate in kg/s.
///
/// # Errors
///
/// Returns a configuration error for non-positive inputs or when the
/// effective outlet `D - k*d` is not positive.
pub fn mass_flow_rate_kg_s(
    silo_id: &SiloId,
    outlet_diameter_m: f64,
    rho_bulk_kg_m3: f64,
    grain_diameter_m: f64,
    bev: &BeverlooParams,
) -> Result<f64, PhysicsError> {
    bev.validate()?;
    require_positive("rho_bulk_kg_m3", rho_bulk_kg_m3)?;
    require_positive("grain_diameter_m", grain_diameter_m)?;
    if !outlet_diameter_m.is_finite() || outlet_diameter_m <= 0.0 {
        return Err(PhysicsError::InvalidGeometry {
            silo_id: silo_id.clone(),
            name: "outlet_diameter_m",
            value: outlet_diameter_m,
        });
    }

    let d_eff = bev.k.mul_add(-grain_diameter_m, outlet_diameter_m);
    if d_eff <= 0.0 {
        return Err(PhysicsError::OutletTooNarrow {
            silo_id: silo_id.clone(),
            outlet_diameter_m,
            k: bev.k,
            grain_diameter_m,
        });
    }

    Ok(bev.c * rho_bulk_kg_m3 * bev.gravity_m_s2.sqrt() * d_eff.powf(2.5))
}

/// Flow rate and derived discharge times for one silo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowEstimate {
    /// Outlet mass-flow rate, kg/s.
    pub mass_flow_rate_kg_s: f64,
    /// Time to discharge the target mass, seconds.
    pub discharge_time_s: f64,
    /// Time to empty the loaded mass, seconds.
    pub full_discharge_time_s: f64,
}

impl FlowEstimate {
    /// Derive discharge times from a positive flow rate.
    pub fn new(mass_flow_rate_kg_s: f64, target_mass_kg: f64, loaded_mass_kg: f64) -> Self {
        Self {
            mass_flow_rate_kg_s,
            discharge_time_s: target_mass_kg / mass_flow_rate_kg_s,
            full_discharge_time_s: loaded_mass_kg / mass_flow_rate_kg_s,
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_rho_bulk_kg_m3() -> f64 {
    610.0
}

const fn default_grain_diameter_m() -> f64 {
    0.004
}

const fn default_c() -> f64 {
    0.58
}

const fn default_k() -> f64 {
    1.4
}

const fn default_gravity_m_s2() -> f64 {
    9.81
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn silo() -> SiloId {
        SiloId::from("S1")
    }

    #[test]
    fn rate_matches_closed_form() {
        let bev = BeverlooParams::default();
        let rate = mass_flow_rate_kg_s(&silo(), 0.2, 610.0, 0.004, &bev).unwrap();
        let expected = 0.58 * 610.0 * 9.81_f64.sqrt() * (0.2_f64 - 1.4 * 0.004).powf(2.5);
        assert!((rate - expected).abs() < 1e-9);
        assert!(rate > 0.0);
    }

    #[test]
    fn wider_outlet_flows_faster() {
        let bev = BeverlooParams::default();
        let narrow = mass_flow_rate_kg_s(&silo(), 0.2, 610.0, 0.004, &bev).unwrap();
        let wide = mass_flow_rate_kg_s(&silo(), 0.21, 610.0, 0.004, &bev).unwrap();
        assert!(wide > narrow);
    }

    #[test]
    fn outlet_narrower_than_grains_rejected() {
        let bev = BeverlooParams::default();
        let result = mass_flow_rate_kg_s(&silo(), 0.005, 610.0, 0.004, &bev);
        assert!(matches!(result, Err(PhysicsError::OutletTooNarrow { .. })));
        assert!(result.is_err_and(|e| e.is_configuration()));
    }

    #[test]
    fn non_positive_density_rejected() {
        let bev = BeverlooParams::default();
        let result = mass_flow_rate_kg_s(&silo(), 0.2, 0.0, 0.004, &bev);
        assert!(matches!(
            result,
            Err(PhysicsError::InvalidParameter {
                name: "rho_bulk_kg_m3",
                ..
            })
        ));
    }

    #[test]
    fn negative_k_rejected() {
        let bev = BeverlooParams {
            k: -0.1,
            ..BeverlooParams::default()
        };
        assert!(bev.validate().is_err());
    }

    #[test]
    fn zero_outlet_rejected() {
        let bev = BeverlooParams::default();
        let result = mass_flow_rate_kg_s(&silo(), 0.0, 610.0, 0.004, &bev);
        assert!(matches!(result, Err(PhysicsError::InvalidGeometry { .. })));
    }

    #[test]
    fn estimate_derives_times() {
        let estimate = FlowEstimate::new(20.0, 1000.0, 4000.0);
        assert!((estimate.discharge_time_s - 50.0).abs() < 1e-12);
        assert!((estimate.full_discharge_time_s - 200.0).abs() < 1e-12);
    }

    #[test]
    fn material_defaults_from_empty_json() {
        let material: Material = serde_json::from_str("{}").unwrap();
        assert!((material.rho_bulk_kg_m3 - 610.0).abs() < 1e-12);
        assert!(material.validate().is_ok());
    }
}
