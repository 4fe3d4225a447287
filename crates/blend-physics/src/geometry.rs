//! Layer geometry: segment masses to heights along the discharge axis.
//!
//! Heights are measured from the outlet. Segment `i` occupies
//! `[z0_i, z1_i)` with `z1_i - z0_i = m_i / (rho * A)` and the intervals
//! stacked contiguously in layer order. Zero-mass segments keep a
//! zero-width interval so indices line up with the silo's layers.

use std::f64::consts::PI;

use blend_types::Silo;

use crate::error::{PhysicsError, require_positive};

/// Cross-section area of a cylindrical body.
pub fn cross_section_area_m2(body_diameter_m: f64) -> f64 {
    let radius = body_diameter_m / 2.0;
    PI * radius * radius
}

/// Height interval of one segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerInterval {
    /// Lower bound, metres above the outlet.
    pub z0_m: f64,
    /// Upper bound, metres above the outlet.
    pub z1_m: f64,
}

impl LayerInterval {
    /// Interval height in metres.
    pub fn height_m(&self) -> f64 {
        self.z1_m - self.z0_m
    }
}

/// The stacked height profile of a loaded silo.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnProfile {
    intervals: Vec<LayerInterval>,
    total_height_m: f64,
    area_m2: f64,
    rho_bulk_kg_m3: f64,
}

impl ColumnProfile {
    /// Build the profile for `silo` at bulk density `rho_bulk_kg_m3`.
    ///
    /// Loading above capacity is logged, not rejected.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a non-positive body diameter or
    /// density, or a negative segment mass.
    pub fn build(silo: &Silo, rho_bulk_kg_m3: f64) -> Result<Self, PhysicsError> {
        require_positive("rho_bulk_kg_m3", rho_bulk_kg_m3)?;
        if !silo.body_diameter_m.is_finite() || silo.body_diameter_m <= 0.0 {
            return Err(PhysicsError::InvalidGeometry {
                silo_id: silo.id.clone(),
                name: "body_diameter_m",
                value: silo.body_diameter_m,
            });
        }

        let area_m2 = cross_section_area_m2(silo.body_diameter_m);
        let mut cursor = 0.0_f64;
        let mut intervals = Vec::with_capacity(silo.layers.len());
        for layer in &silo.layers {
            if !layer.segment_mass_kg.is_finite() || layer.segment_mass_kg < 0.0 {
                return Err(PhysicsError::InvalidSegmentMass {
                    silo_id: silo.id.clone(),
                    layer_index: layer.layer_index,
                    mass_kg: layer.segment_mass_kg,
                });
            }
            let z0_m = cursor;
            cursor += layer.segment_mass_kg / (rho_bulk_kg_m3 * area_m2);
            intervals.push(LayerInterval { z0_m, z1_m: cursor });
        }

        let loaded = silo.loaded_mass_kg();
        if loaded > silo.capacity_kg + 1e-9 {
            tracing::warn!(
                silo = %silo.id,
                loaded_kg = loaded,
                capacity_kg = silo.capacity_kg,
                "segment mass exceeds silo capacity"
            );
        }

        Ok(Self {
            intervals,
            total_height_m: cursor,
            area_m2,
            rho_bulk_kg_m3,
        })
    }

    /// Segment intervals in layer order.
    pub fn intervals(&self) -> &[LayerInterval] {
        &self.intervals
    }

    /// Height of the full column.
    pub const fn total_height_m(&self) -> f64 {
        self.total_height_m
    }

    /// Body cross-section area.
    pub const fn area_m2(&self) -> f64 {
        self.area_m2
    }

    /// Height of a slab holding `mass_kg`.
    pub fn height_for_mass(&self, mass_kg: f64) -> f64 {
        mass_kg / (self.rho_bulk_kg_m3 * self.area_m2)
    }

    /// Stack raw masses without validation.
    #[cfg(test)]
#[allow(clippy::unwrap_used)]
    pub(crate) fn from_masses(masses: &[f64], area_m2: f64, rho_bulk_kg_m3: f64) -> Self {
        let mut cursor = 0.0_f64;
        let intervals = masses
            .iter()
            .map(|m| {
                let z0_m = cursor;
                cursor += m / (rho_bulk_kg_m3 * area_m2);
                LayerInterval { z0_m, z1_m: cursor }
            })
            .collect();
        Self {
            intervals,
            total_height_m: cursor,
            area_m2,
            rho_bulk_kg_m3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blend_types::{Coa, DischargeTarget, Layer, LotId, SiloId, SupplierId};

    fn coa() -> Coa {
        Coa {
            moisture_pct: 4.0,
            fine_extract_db_pct: 80.0,
            wort_ph: 6.0,
            diastatic_power_wk: 300.0,
            total_protein_pct: 10.0,
            wort_colour_ebc: 4.0,
        }
    }

    fn silo(masses: &[f64]) -> Silo {
        let layers = masses
            .iter()
            .zip(0_u32..)
            .map(|(m, i)| Layer {
                layer_index: i,
                lot_id: LotId::new(format!("L{i}")),
                supplier: SupplierId::from("A"),
                segment_mass_kg: *m,
                quality: coa(),
            })
            .collect();
        Silo {
            id: SiloId::from("S1"),
            capacity_kg: 4000.0,
            body_diameter_m: 2.0,
            outlet_diameter_m: 0.2,
            bulk_density_kg_m3: None,
            layers,
            discharge: DischargeTarget::Fraction(1.0),
        }
    }

    #[test]
    fn area_of_unit_radius_is_pi() {
        assert!((cross_section_area_m2(2.0) - PI).abs() < 1e-12);
    }

    #[test]
    fn intervals_are_contiguous_in_order() {
        let profile = ColumnProfile::build(&silo(&[100.0, 0.0, 50.0]), 500.0).unwrap();
        let iv = profile.intervals();
        assert_eq!(iv.len(), 3);
        let mut previous_top = 0.0;
        for interval in iv {
            assert!((interval.z0_m - previous_top).abs() < 1e-15);
            assert!(interval.height_m() >= 0.0);
            previous_top = interval.z1_m;
        }
        assert!(iv.get(1).is_some_and(|i| i.height_m().abs() < 1e-15));
        let expected_height = 150.0 / (500.0 * PI);
        assert!((profile.total_height_m() - expected_height).abs() < 1e-12);
    }

    #[test]
    fn negative_segment_rejected() {
        let result = ColumnProfile::build(&silo(&[10.0, -1.0]), 500.0);
        assert!(matches!(
            result,
            Err(PhysicsError::InvalidSegmentMass { layer_index: 1, .. })
        ));
    }

    #[test]
    fn zero_body_diameter_rejected() {
        let mut s = silo(&[10.0]);
        s.body_diameter_m = 0.0;
        assert!(matches!(
            ColumnProfile::build(&s, 500.0),
            Err(PhysicsError::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn over_capacity_is_allowed() {
        let mut s = silo(&[5000.0]);
        s.capacity_kg = 1000.0;
        assert!(ColumnProfile::build(&s, 610.0).is_ok());
    }
}
