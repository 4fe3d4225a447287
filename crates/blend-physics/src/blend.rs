//! Mass-weighted quality accumulation.

use blend_types::{BlendedParams, Coa, QualityParam};

/// Running mass-weighted sum of quality attributes.
///
/// Feed it `(mass, quality)` pairs in a fixed order and merge partial
/// accumulators in a fixed order; the result is then reproducible bit for
/// bit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BlendAccumulator {
    mass_kg: f64,
    weighted: [f64; 6],
}

impl BlendAccumulator {
    /// An empty accumulator.
    pub const fn new() -> Self {
        Self {
            mass_kg: 0.0,
            weighted: [0.0; 6],
        }
    }

    /// Add `mass_kg` of material with `quality`.
    pub fn add(&mut self, mass_kg: f64, quality: &Coa) {
        if mass_kg <= 0.0 {
            return;
        }
        self.mass_kg += mass_kg;
        for (sum, (_, value)) in self.weighted.iter_mut().zip(quality.iter()) {
            *sum += mass_kg * value;
        }
    }

    /// Fold another accumulator into this one.
    pub fn merge(&mut self, other: &Self) {
        self.mass_kg += other.mass_kg;
        for (sum, part) in self.weighted.iter_mut().zip(other.weighted) {
            *sum += part;
        }
    }

    /// Total mass accumulated.
    pub const fn mass_kg(&self) -> f64 {
        self.mass_kg
    }

    /// The blend, with every attribute `None` when no mass was added.
    pub fn finish(&self) -> BlendedParams {
        QualityParam::ALL
            .into_iter()
            .zip(self.weighted)
            .map(|(param, sum)| {
                let value = (self.mass_kg > 0.0).then(|| sum / self.mass_kg);
                (param, value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coa(moisture: f64) -> Coa {
        Coa {
            moisture_pct: moisture,
            fine_extract_db_pct: 80.0,
            wort_ph: 6.0,
            diastatic_power_wk: 300.0,
            total_protein_pct: 10.0,
            wort_colour_ebc: 4.0,
        }
    }

    #[test]
    fn empty_blend_is_undefined() {
        let blend = BlendAccumulator::new().finish();
        assert_eq!(blend.len(), 6);
        assert!(blend.values().all(Option::is_none));
    }

    #[test]
    fn blend_is_mass_weighted() {
        let mut acc = BlendAccumulator::new();
        acc.add(300.0, &coa(10.0));
        acc.add(100.0, &coa(14.0));
        let blend = acc.finish();
        let moisture = blend.get(&QualityParam::MoisturePct).copied().flatten();
        assert!(moisture.is_some_and(|m| (m - 11.0).abs() < 1e-12));
        let ph = blend.get(&QualityParam::WortPh).copied().flatten();
        assert!(ph.is_some_and(|v| (v - 6.0).abs() < 1e-12));
    }

    #[test]
    fn zero_mass_is_ignored() {
        let mut acc = BlendAccumulator::new();
        acc.add(0.0, &coa(99.0));
        assert!(acc.mass_kg().abs() < f64::EPSILON);
    }

    #[test]
    fn merge_matches_single_accumulator() {
        let mut a = BlendAccumulator::new();
        a.add(200.0, &coa(10.0));
        let mut b = BlendAccumulator::new();
        b.add(200.0, &coa(14.0));
        a.merge(&b);
        let moisture = a.finish().get(&QualityParam::MoisturePct).copied().flatten();
        assert!(moisture.is_some_and(|m| (m - 12.0).abs() < 1e-12));
    }
}
