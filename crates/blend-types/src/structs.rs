//! Core entity structs: input tables, the validated plant model, and the
//! result shapes that reporting and transport layers consume verbatim.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Completion, QualityParam};
use crate::ids::{LotId, SiloId, SupplierId};

// ---------------------------------------------------------------------------
// Quality attributes
// ---------------------------------------------------------------------------

/// Certificate-of-analysis values for one supplier or segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Coa {
    /// Moisture content, percent.
    pub moisture_pct: f64,
    /// Fine-grind extract on a dry basis, percent.
    pub fine_extract_db_pct: f64,
    /// Wort pH.
    #[serde(rename = "wort_pH")]
    pub wort_ph: f64,
    /// Diastatic power, Windisch-Kolbach units.
    #[serde(rename = "diastatic_power_WK")]
    pub diastatic_power_wk: f64,
    /// Total protein, percent.
    pub total_protein_pct: f64,
    /// Wort colour, EBC units.
    #[serde(rename = "wort_colour_EBC")]
    pub wort_colour_ebc: f64,
}

impl Coa {
    /// Read one attribute.
    pub const fn get(&self, param: QualityParam) -> f64 {
        match param {
            QualityParam::MoisturePct => self.moisture_pct,
            QualityParam::FineExtractDbPct => self.fine_extract_db_pct,
            QualityParam::WortPh => self.wort_ph,
            QualityParam::DiastaticPowerWk => self.diastatic_power_wk,
            QualityParam::TotalProteinPct => self.total_protein_pct,
            QualityParam::WortColourEbc => self.wort_colour_ebc,
        }
    }

    /// Iterate `(attribute, value)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (QualityParam, f64)> + '_ {
        QualityParam::ALL.into_iter().map(|p| (p, self.get(p)))
    }

    /// Whether every attribute is a finite number.
    pub fn is_finite(&self) -> bool {
        self.iter().all(|(_, v)| v.is_finite())
    }
}

/// Mass-weighted blend per attribute. `None` means undefined: no mass was
/// discharged, so there is nothing to average.
pub type BlendedParams = BTreeMap<QualityParam, Option<f64>>;

// ---------------------------------------------------------------------------
// Input tables
// ---------------------------------------------------------------------------

/// One row of the silos table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiloRecord {
    /// Silo identifier.
    pub silo_id: SiloId,
    /// Nominal capacity in kg.
    pub capacity_kg: f64,
    /// Inner diameter of the cylindrical body in metres.
    pub body_diameter_m: f64,
    /// Outlet diameter in metres.
    pub outlet_diameter_m: f64,
    /// Declared initial mass in kg (informational).
    #[serde(default)]
    pub initial_mass_kg: Option<f64>,
    /// Bulk density override for this silo in kg/m³.
    #[serde(default)]
    pub bulk_density_kg_m3: Option<f64>,
}

/// One row of the layers table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRecord {
    /// Silo the segment is loaded in.
    pub silo_id: SiloId,
    /// Stacking position, 0 at the outlet.
    pub layer_index: u32,
    /// Lot the segment belongs to.
    pub lot_id: LotId,
    /// Supplier of the lot.
    pub supplier: SupplierId,
    /// Segment mass in kg.
    pub segment_mass_kg: f64,
    /// Segment-specific quality; the supplier COA is used when absent.
    #[serde(default)]
    pub quality: Option<Coa>,
}

/// One row of the suppliers table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierRecord {
    /// Supplier identifier.
    pub supplier: SupplierId,
    /// The supplier's certificate of analysis.
    #[serde(flatten)]
    pub coa: Coa,
}

/// One row of the discharge table.
///
/// `discharge_mass_kg` takes precedence over `discharge_fraction` when
/// both are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DischargeRecord {
    /// Silo the rule applies to.
    pub silo_id: SiloId,
    /// Absolute mass to discharge in kg.
    #[serde(default)]
    pub discharge_mass_kg: Option<f64>,
    /// Fraction of the loaded mass to discharge, in `[0, 1]`.
    #[serde(default)]
    pub discharge_fraction: Option<f64>,
}

/// The four normalized input tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputTables {
    /// Silo geometry.
    #[serde(default)]
    pub silos: Vec<SiloRecord>,
    /// Loaded segments.
    #[serde(default)]
    pub layers: Vec<LayerRecord>,
    /// Supplier COAs.
    #[serde(default)]
    pub suppliers: Vec<SupplierRecord>,
    /// Discharge rules.
    #[serde(default)]
    pub discharge: Vec<DischargeRecord>,
}

/// Outcome of checking input tables before a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ValidationReport {
    /// Whether no issues were found.
    pub valid: bool,
    /// Human-readable issues, empty when valid.
    pub errors: Vec<String>,
}

// ---------------------------------------------------------------------------
// Validated plant model
// ---------------------------------------------------------------------------

/// A loaded segment inside a silo.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// Stacking position, 0 at the outlet.
    pub layer_index: u32,
    /// Lot the segment belongs to.
    pub lot_id: LotId,
    /// Supplier of the lot.
    pub supplier: SupplierId,
    /// Segment mass in kg.
    pub segment_mass_kg: f64,
    /// Resolved quality of the segment.
    pub quality: Coa,
}

/// How much a silo should discharge during a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DischargeTarget {
    /// Fraction of the loaded mass, in `[0, 1]`.
    Fraction(f64),
    /// Absolute mass in kg.
    Mass(f64),
}

/// A silo with its segments, ordered by layer index.
#[derive(Debug, Clone, PartialEq)]
pub struct Silo {
    /// Silo identifier.
    pub id: SiloId,
    /// Nominal capacity in kg.
    pub capacity_kg: f64,
    /// Inner body diameter in metres.
    pub body_diameter_m: f64,
    /// Outlet diameter in metres.
    pub outlet_diameter_m: f64,
    /// Bulk density override in kg/m³.
    pub bulk_density_kg_m3: Option<f64>,
    /// Segments, `layers[i].layer_index == i`.
    pub layers: Vec<Layer>,
    /// Discharge rule for this run.
    pub discharge: DischargeTarget,
}

impl Silo {
    /// Total mass currently loaded, summed in layer order.
    pub fn loaded_mass_kg(&self) -> f64 {
        self.layers.iter().map(|l| l.segment_mass_kg).sum()
    }
}

// ---------------------------------------------------------------------------
// Ledger rows
// ---------------------------------------------------------------------------

/// Initial/discharged/remaining mass of one ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MassBalance {
    /// Mass present before the run.
    pub initial_mass_kg: f64,
    /// Mass that left through the outlet.
    pub discharged_mass_kg: f64,
    /// Mass still in the silo.
    pub remaining_mass_kg: f64,
    /// `100 * remaining / initial`, 0 when nothing was loaded.
    pub remaining_pct: f64,
}

impl MassBalance {
    /// Build a balance from initial and discharged mass.
    pub fn new(initial_mass_kg: f64, discharged_mass_kg: f64) -> Self {
        let remaining_mass_kg = (initial_mass_kg - discharged_mass_kg).max(0.0);
        let remaining_pct = if initial_mass_kg > 0.0 {
            100.0 * remaining_mass_kg / initial_mass_kg
        } else {
            0.0
        };
        Self {
            initial_mass_kg,
            discharged_mass_kg,
            remaining_mass_kg,
            remaining_pct,
        }
    }
}

/// Ledger row for one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SegmentLedgerRow {
    /// Silo holding the segment.
    pub silo_id: SiloId,
    /// Stacking position.
    pub layer_index: u32,
    /// Lot of the segment.
    pub lot_id: LotId,
    /// Supplier of the lot.
    pub supplier: SupplierId,
    /// Mass balance.
    #[serde(flatten)]
    pub balance: MassBalance,
}

/// Ledger row for one lot, aggregated over every silo it was loaded in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LotLedgerRow {
    /// Lot identifier.
    pub lot_id: LotId,
    /// Supplier of the lot.
    pub supplier: SupplierId,
    /// Silos holding segments of this lot, sorted.
    pub silo_ids: Vec<SiloId>,
    /// Mass balance.
    #[serde(flatten)]
    pub balance: MassBalance,
}

/// Ledger row for one silo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SiloLedgerRow {
    /// Silo identifier.
    pub silo_id: SiloId,
    /// Mass balance.
    #[serde(flatten)]
    pub balance: MassBalance,
}

// ---------------------------------------------------------------------------
// Run result
// ---------------------------------------------------------------------------

/// One sampled point of a silo's discharge trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TrajectoryPoint {
    /// Step index.
    pub step: u32,
    /// Simulated time at the end of the step, seconds.
    pub time_s: f64,
    /// Discharge-front height above the outlet, metres.
    pub front_height_m: f64,
    /// Cumulative discharged mass, kg.
    pub discharged_mass_kg: f64,
    /// Mass still in the silo, kg.
    pub remaining_mass_kg: f64,
    /// Quality of the material leaving during this step.
    pub outlet_params: BlendedParams,
}

/// Per-silo part of a run result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SiloRunSummary {
    /// Mass actually discharged, kg.
    pub discharged_mass_kg: f64,
    /// Mass the discharge rule asked for, kg.
    pub target_mass_kg: f64,
    /// Mass loaded before the run, kg.
    pub loaded_mass_kg: f64,
    /// Beverloo outlet mass-flow rate, kg/s.
    pub mass_flow_rate_kg_s: f64,
    /// Time to discharge the target mass, seconds.
    pub discharge_time_s: f64,
    /// Time to empty the whole silo, seconds.
    pub full_discharge_time_s: f64,
    /// Mixing width actually used, metres.
    pub sigma_m: f64,
    /// Number of steps that ran.
    pub steps_executed: u32,
    /// Why the silo stopped.
    pub completion: Completion,
    /// Blend of this silo's discharge alone.
    pub blended_params: BlendedParams,
    /// Sampled trajectory, empty when sampling is disabled.
    pub trajectory: Vec<TrajectoryPoint>,
}

/// Result of one multi-silo run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RunResult {
    /// Mass discharged across all silos, kg.
    pub total_discharged_mass_kg: f64,
    /// Mass remaining across all silos, kg.
    pub total_remaining_mass_kg: f64,
    /// Mass-weighted blend of everything discharged.
    pub total_blended_params: BlendedParams,
    /// Per-silo summaries keyed by silo id.
    pub per_silo: BTreeMap<SiloId, SiloRunSummary>,
    /// One row per segment, silo then layer order.
    pub segment_state_ledger: Vec<SegmentLedgerRow>,
    /// One row per lot, lot id order.
    pub lot_state_ledger: Vec<LotLedgerRow>,
    /// One row per silo, silo id order.
    pub silo_state_ledger: Vec<SiloLedgerRow>,
}

impl RunResult {
    /// The blend as plain numbers, or `None` when any attribute is
    /// undefined.
    pub fn defined_blend(&self) -> Option<BTreeMap<QualityParam, f64>> {
        self.total_blended_params
            .iter()
            .map(|(p, v)| v.map(|v| (*p, v)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Optimization
// ---------------------------------------------------------------------------

/// A scored candidate discharge plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CandidateSummary {
    /// Submission index; ties in score are broken by this.
    pub index: u32,
    /// Discharge fraction per silo.
    pub fractions: BTreeMap<SiloId, f64>,
    /// Objective score, lower is better.
    pub objective_score: f64,
    /// Total discharged mass of the candidate run, kg.
    pub total_discharged_mass_kg: f64,
    /// Blend produced by the candidate.
    pub blended_params: BlendedParams,
}

/// Result of a discharge-fraction search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct OptimizationResult {
    /// Best discharge fraction per silo.
    pub recommended_discharge: BTreeMap<SiloId, f64>,
    /// Full run result of the best plan.
    pub best_run: RunResult,
    /// Score of the best plan.
    pub objective_score: f64,
    /// Name of the objective and search strategy.
    pub objective_method: String,
    /// Target values the score was measured against.
    pub target_params: BTreeMap<QualityParam, f64>,
    /// Normalization range per targeted attribute.
    pub parameter_ranges: BTreeMap<QualityParam, f64>,
    /// Weight per targeted attribute.
    pub weights: BTreeMap<QualityParam, f64>,
    /// Seed the search was derived from.
    pub seed: u64,
    /// Candidates submitted.
    pub evaluations: u32,
    /// Candidates skipped because they failed or blended nothing.
    pub failed_evaluations: u32,
    /// Incumbent score after each scored candidate, in submission order.
    pub score_history: Vec<f64>,
    /// Best distinct candidates by ascending score.
    pub top_candidates: Vec<CandidateSummary>,
}
