//! Input table validation and the immutable plant model.
//!
//! [`validate_tables`] collects every issue it can find so a user can fix a
//! dataset in one pass. [`Plant::from_tables`] builds the model used by the
//! simulator and stops at the first issue.

use std::collections::{BTreeMap, BTreeSet};

use blend_types::{
    Coa, DischargeRecord, DischargeTarget, InputTables, Layer, LayerRecord, LotId, QualityParam,
    Silo, SiloId, SupplierId, ValidationReport,
};

use crate::error::BlendError;

/// Slack allowed when a discharge mass exceeds the loaded mass.
const DISCHARGE_SLACK_KG: f64 = 1e-9;

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

/// Check the four tables and return every issue found, in table order.
pub fn validate_tables(tables: &InputTables) -> Vec<String> {
    let mut errors = Vec::new();

    for (name, empty) in [
        ("silos", tables.silos.is_empty()),
        ("layers", tables.layers.is_empty()),
        ("suppliers", tables.suppliers.is_empty()),
        ("discharge", tables.discharge.is_empty()),
    ] {
        if empty {
            errors.push(format!("{name} table is empty"));
        }
    }

    // Silos.
    let mut silo_ids: BTreeSet<&SiloId> = BTreeSet::new();
    for silo in &tables.silos {
        let id = &silo.silo_id;
        if !silo_ids.insert(id) {
            errors.push(format!("duplicate silo_id {id}"));
        }
        for (field, value) in [
            ("capacity_kg", silo.capacity_kg),
            ("body_diameter_m", silo.body_diameter_m),
            ("outlet_diameter_m", silo.outlet_diameter_m),
        ] {
            if !positive(value) {
                errors.push(format!("silo {id}: {field} must be > 0, got {value}"));
            }
        }
        if let Some(m) = silo.initial_mass_kg.filter(|m| !non_negative(*m)) {
            errors.push(format!("silo {id}: initial_mass_kg must be >= 0, got {m}"));
        }
        if let Some(rho) = silo.bulk_density_kg_m3.filter(|r| !positive(*r)) {
            errors.push(format!("silo {id}: bulk_density_kg_m3 must be > 0, got {rho}"));
        }
    }

    // Suppliers.
    let mut supplier_ids: BTreeSet<&SupplierId> = BTreeSet::new();
    for supplier in &tables.suppliers {
        if !supplier_ids.insert(&supplier.supplier) {
            errors.push(format!("duplicate supplier {}", supplier.supplier));
        }
        if !supplier.coa.is_finite() {
            errors.push(format!("supplier {}: COA values must be finite", supplier.supplier));
        }
    }

    // Layers.
    let mut indexes: BTreeMap<&SiloId, Vec<u32>> = BTreeMap::new();
    let mut lot_suppliers: BTreeMap<&LotId, &SupplierId> = BTreeMap::new();
    let mut unknown_suppliers: BTreeSet<&SupplierId> = BTreeSet::new();
    for layer in &tables.layers {
        let id = &layer.silo_id;
        if !silo_ids.contains(id) {
            errors.push(format!("layer {} references unknown silo {id}", layer.layer_index));
        }
        indexes.entry(id).or_default().push(layer.layer_index);
        if !non_negative(layer.segment_mass_kg) {
            errors.push(format!(
                "silo {id} layer {}: segment_mass_kg must be >= 0, got {}",
                layer.layer_index, layer.segment_mass_kg
            ));
        }
        match &layer.quality {
            Some(coa) if !coa.is_finite() => errors.push(format!(
                "silo {id} layer {}: quality values must be finite",
                layer.layer_index
            )),
            Some(_) => {}
            None => {
                if !supplier_ids.contains(&layer.supplier) {
                    unknown_suppliers.insert(&layer.supplier);
                }
            }
        }
        match lot_suppliers.get(&layer.lot_id) {
            Some(existing) if *existing != &layer.supplier => errors.push(format!(
                "lot {} appears with suppliers {existing} and {}",
                layer.lot_id, layer.supplier
            )),
            Some(_) => {}
            None => {
                lot_suppliers.insert(&layer.lot_id, &layer.supplier);
            }
        }
    }
    if !unknown_suppliers.is_empty() {
        let names: Vec<&str> = unknown_suppliers.iter().map(|s| s.as_str()).collect();
        errors.push(format!(
            "layers reference unknown suppliers without own quality: {}",
            names.join(", ")
        ));
    }
    for (id, mut idx) in indexes {
        idx.sort_unstable();
        let before = idx.len();
        idx.dedup();
        if idx.len() != before {
            errors.push(format!("silo {id}: duplicate (silo_id, layer_index) values"));
        }
        let contiguous = idx.iter().copied().eq(0..u32::try_from(idx.len()).unwrap_or(u32::MAX));
        if !contiguous {
            errors.push(format!(
                "silo {id}: layer_index must be contiguous from 0 at the outlet, got {idx:?}"
            ));
        }
    }
    for silo in &tables.silos {
        if !tables.layers.iter().any(|l| l.silo_id == silo.silo_id) {
            errors.push(format!("silo {}: no layers loaded", silo.silo_id));
        }
    }

    // Discharge rules.
    let mut ruled: BTreeSet<&SiloId> = BTreeSet::new();
    for rule in &tables.discharge {
        let id = &rule.silo_id;
        if !silo_ids.contains(id) {
            errors.push(format!("discharge rule references unknown silo {id}"));
        }
        if !ruled.insert(id) {
            errors.push(format!("silo {id}: more than one discharge rule"));
        }
        let loaded = loaded_mass(&tables.layers, id);
        if let Err(issue) = discharge_target(rule, loaded) {
            errors.push(issue);
        }
    }
    for silo in &tables.silos {
        if !ruled.contains(&silo.silo_id) {
            errors.push(format!("silo {}: no discharge rule", silo.silo_id));
        }
    }

    errors
}

/// Validate and wrap the result in the transport shape.
pub fn validation_report(tables: &InputTables) -> ValidationReport {
    let errors = validate_tables(tables);
    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}

fn loaded_mass(layers: &[LayerRecord], silo_id: &SiloId) -> f64 {
    layers
        .iter()
        .filter(|l| &l.silo_id == silo_id)
        .map(|l| l.segment_mass_kg)
        .sum()
}

/// Resolve one discharge record; mass takes precedence over fraction.
fn discharge_target(rule: &DischargeRecord, loaded_kg: f64) -> Result<DischargeTarget, String> {
    let id = &rule.silo_id;
    if let Some(mass) = rule.discharge_mass_kg {
        if !non_negative(mass) {
            return Err(format!("silo {id}: discharge_mass_kg must be >= 0, got {mass}"));
        }
        if mass > loaded_kg + DISCHARGE_SLACK_KG {
            return Err(format!(
                "silo {id}: discharge_mass_kg ({mass:.2}) exceeds total mass in silo ({loaded_kg:.2})"
            ));
        }
        return Ok(DischargeTarget::Mass(mass));
    }
    if let Some(fraction) = rule.discharge_fraction {
        if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
            return Err(format!(
                "silo {id}: discharge_fraction must be between 0 and 1, got {fraction}"
            ));
        }
        return Ok(DischargeTarget::Fraction(fraction));
    }
    Err(format!("silo {id}: provide discharge_mass_kg or discharge_fraction"))
}

// ---------------------------------------------------------------------------
// Plant
// ---------------------------------------------------------------------------

/// The validated, immutable plant: every silo with its segments and rule,
/// ordered by silo id.
#[derive(Debug, Clone, PartialEq)]
pub struct Plant {
    silos: Vec<Silo>,
}

impl Plant {
    /// Build the plant from input tables.
    ///
    /// # Errors
    ///
    /// Returns [`BlendError::Configuration`] carrying the first issue
    /// [`validate_tables`] reports.
    pub fn from_tables(tables: &InputTables) -> Result<Self, BlendError> {
        if let Some(first) = validate_tables(tables).into_iter().next() {
            return Err(BlendError::configuration(first));
        }

        let coas: BTreeMap<&SupplierId, Coa> = tables
            .suppliers
            .iter()
            .map(|s| (&s.supplier, s.coa))
            .collect();

        let mut silos = Vec::with_capacity(tables.silos.len());
        for record in &tables.silos {
            let mut records: Vec<&LayerRecord> = tables
                .layers
                .iter()
                .filter(|l| l.silo_id == record.silo_id)
                .collect();
            records.sort_by_key(|l| l.layer_index);

            let mut layers = Vec::with_capacity(records.len());
            for l in records {
                let quality = l
                    .quality
                    .or_else(|| coas.get(&l.supplier).copied())
                    .ok_or_else(|| {
                        BlendError::configuration(format!(
                            "silo {} layer {}: no quality for supplier {}",
                            l.silo_id, l.layer_index, l.supplier
                        ))
                    })?;
                layers.push(Layer {
                    layer_index: l.layer_index,
                    lot_id: l.lot_id.clone(),
                    supplier: l.supplier.clone(),
                    segment_mass_kg: l.segment_mass_kg,
                    quality,
                });
            }

            let loaded: f64 = layers.iter().map(|l| l.segment_mass_kg).sum();
            let rule = tables
                .discharge
                .iter()
                .find(|d| d.silo_id == record.silo_id)
                .ok_or_else(|| {
                    BlendError::configuration(format!("silo {}: no discharge rule", record.silo_id))
                })?;
            let discharge = discharge_target(rule, loaded).map_err(BlendError::configuration)?;

            silos.push(Silo {
                id: record.silo_id.clone(),
                capacity_kg: record.capacity_kg,
                body_diameter_m: record.body_diameter_m,
                outlet_diameter_m: record.outlet_diameter_m,
                bulk_density_kg_m3: record.bulk_density_kg_m3,
                layers,
                discharge,
            });
        }
        silos.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(Self { silos })
    }

    /// Silos in canonical id order.
    pub fn silos(&self) -> &[Silo] {
        &self.silos
    }

    /// Silo ids in canonical order.
    pub fn silo_ids(&self) -> Vec<SiloId> {
        self.silos.iter().map(|s| s.id.clone()).collect()
    }

    /// Number of silos.
    pub const fn len(&self) -> usize {
        self.silos.len()
    }

    /// Whether the plant has no silos.
    pub const fn is_empty(&self) -> bool {
        self.silos.is_empty()
    }

    /// A copy discharging `fractions[i]` of silo `i` (canonical order).
    /// Silos beyond the end of `fractions` keep their rule.
    pub fn with_fractions(&self, fractions: &[f64]) -> Self {
        let silos = self
            .silos
            .iter()
            .enumerate()
            .map(|(i, silo)| {
                let mut silo = silo.clone();
                if let Some(f) = fractions.get(i) {
                    silo.discharge = DischargeTarget::Fraction(*f);
                }
                silo
            })
            .collect();
        Self { silos }
    }

    /// `max - min` of each attribute across every layer's quality.
    pub fn quality_spans(&self) -> BTreeMap<QualityParam, f64> {
        QualityParam::ALL
            .into_iter()
            .filter_map(|param| {
                let values = self
                    .silos
                    .iter()
                    .flat_map(|s| &s.layers)
                    .map(|l| l.quality.get(param));
                let (lo, hi) = values.fold(None, |acc: Option<(f64, f64)>, v| {
                    Some(acc.map_or((v, v), |(lo, hi)| (lo.min(v), hi.max(v))))
                })?;
                Some((param, hi - lo))
            })
            .collect()
    }
}
