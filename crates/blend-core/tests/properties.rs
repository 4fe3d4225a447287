//! End-to-end properties of blend runs and the discharge optimizer.
//!
//! Each test builds a plant from input tables and checks a property that
//! must hold for the whole pipeline rather than for one module.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;

use blend_core::{
    BlendConfig, BlendError, OptimizeRequest, Plant, defined_blend, optimize, run, run_tables,
    sample_tables,
};
use blend_types::{
    Coa, DischargeRecord, InputTables, LayerRecord, LotId, QualityParam, SiloId, SiloRecord,
    SupplierId, SupplierRecord,
};

fn quick_config() -> BlendConfig {
    let mut config = BlendConfig::default();
    config.simulation.steps = 300;
    config
}

fn coa(moisture_pct: f64) -> Coa {
    Coa {
        moisture_pct,
        fine_extract_db_pct: 81.0,
        wort_ph: 5.9,
        diastatic_power_wk: 320.0,
        total_protein_pct: 10.5,
        wort_colour_ebc: 3.9,
    }
}

/// One silo with two 500 kg segments at 10 % and 14 % moisture.
fn two_segment_tables(fraction: f64) -> InputTables {
    let layer = |index: u32, lot: &str, supplier: &str| LayerRecord {
        silo_id: SiloId::from("S1"),
        layer_index: index,
        lot_id: LotId::from(lot),
        supplier: SupplierId::from(supplier),
        segment_mass_kg: 500.0,
        quality: None,
    };
    InputTables {
        silos: vec![SiloRecord {
            silo_id: SiloId::from("S1"),
            capacity_kg: 2000.0,
            body_diameter_m: 1.0,
            outlet_diameter_m: 0.2,
            initial_mass_kg: None,
            bulk_density_kg_m3: None,
        }],
        layers: vec![layer(0, "LA", "Dry"), layer(1, "LB", "Wet")],
        suppliers: vec![
            SupplierRecord {
                supplier: SupplierId::from("Dry"),
                coa: coa(10.0),
            },
            SupplierRecord {
                supplier: SupplierId::from("Wet"),
                coa: coa(14.0),
            },
        ],
        discharge: vec![DischargeRecord {
            silo_id: SiloId::from("S1"),
            discharge_mass_kg: None,
            discharge_fraction: Some(fraction),
        }],
    }
}

fn moisture_target(value: f64, iterations: u32, seed: u64) -> OptimizeRequest {
    let mut target = BTreeMap::new();
    target.insert(QualityParam::MoisturePct, value);
    OptimizeRequest {
        target,
        iterations: Some(iterations),
        seed: Some(seed),
        ..OptimizeRequest::default()
    }
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

#[test]
fn full_discharge_of_two_segments_blends_to_midpoint() {
    let mut config = BlendConfig::default();
    config.simulation.steps = 1000;
    let result = run_tables(&two_segment_tables(1.0), &config).unwrap();

    assert!((result.total_discharged_mass_kg - 1000.0).abs() < 1.0);
    let blend = defined_blend(&result).unwrap();
    let moisture = blend.get(&QualityParam::MoisturePct).copied().unwrap();
    assert!((moisture - 12.0).abs() <= 0.5, "moisture {moisture}");
}

#[test]
fn zero_fraction_discharges_nothing() {
    let result = run_tables(&two_segment_tables(0.0), &quick_config()).unwrap();

    assert!(result.total_discharged_mass_kg.abs() < f64::EPSILON);
    assert!((result.total_remaining_mass_kg - 1000.0).abs() < 1e-9);
    assert!(result.total_blended_params.values().all(Option::is_none));
    assert!(matches!(defined_blend(&result), Err(BlendError::UndefinedBlend)));
}

#[test]
fn mass_is_conserved_across_every_ledger() {
    let result = run_tables(&sample_tables(), &quick_config()).unwrap();

    let segment_initial: f64 = result
        .segment_state_ledger
        .iter()
        .map(|r| r.balance.initial_mass_kg)
        .sum();
    let segment_out: f64 = result
        .segment_state_ledger
        .iter()
        .map(|r| r.balance.discharged_mass_kg)
        .sum();
    let lot_out: f64 = result
        .lot_state_ledger
        .iter()
        .map(|r| r.balance.discharged_mass_kg)
        .sum();
    let silo_out: f64 = result
        .silo_state_ledger
        .iter()
        .map(|r| r.balance.discharged_mass_kg)
        .sum();

    assert!((segment_initial - 8400.0).abs() < 1e-6);
    assert!((segment_out - result.total_discharged_mass_kg).abs() < 1e-6);
    assert!((lot_out - segment_out).abs() < 1e-6);
    assert!((silo_out - segment_out).abs() < 1e-6);
    for row in &result.segment_state_ledger {
        let b = &row.balance;
        assert!(b.discharged_mass_kg >= 0.0);
        assert!(b.discharged_mass_kg <= b.initial_mass_kg + 1e-6);
        assert!((b.initial_mass_kg - b.discharged_mass_kg - b.remaining_mass_kg).abs() < 1e-6);
    }
}

#[test]
fn input_order_does_not_change_the_result() {
    let config = quick_config();
    let forward = run_tables(&sample_tables(), &config).unwrap();

    let mut shuffled = sample_tables();
    shuffled.silos.reverse();
    shuffled.layers.reverse();
    shuffled.suppliers.reverse();
    shuffled.discharge.rotate_left(1);
    let reversed = run_tables(&shuffled, &config).unwrap();

    assert_eq!(forward, reversed);
}

#[test]
fn repeated_runs_are_identical() {
    let plant = Plant::from_tables(&sample_tables()).unwrap();
    let config = quick_config();
    let first = serde_json::to_string(&run(&plant, &config).unwrap()).unwrap();
    let second = serde_json::to_string(&run(&plant, &config).unwrap()).unwrap();
    assert_eq!(first, second);
}

// ---------------------------------------------------------------------------
// Optimizer
// ---------------------------------------------------------------------------

#[test]
fn optimizer_is_deterministic_for_a_seed() {
    let plant = Plant::from_tables(&sample_tables()).unwrap();
    let config = quick_config();
    let request = moisture_target(4.3, 16, 11);

    let first = optimize(&plant, &config, &request).unwrap();
    let second = optimize(&plant, &config, &request).unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn score_history_never_increases() {
    let plant = Plant::from_tables(&sample_tables()).unwrap();
    let result = optimize(&plant, &quick_config(), &moisture_target(4.3, 16, 3)).unwrap();

    assert!(!result.score_history.is_empty());
    assert!(result.score_history.windows(2).all(|w| match w {
        [a, b] => b <= a,
        _ => true,
    }));
    let last = result.score_history.last().copied().unwrap();
    assert!((last - result.objective_score).abs() < f64::EPSILON);
}

#[test]
fn unreachable_target_still_returns_best_effort() {
    let plant = Plant::from_tables(&sample_tables()).unwrap();
    let result = optimize(&plant, &quick_config(), &moisture_target(20.0, 12, 5)).unwrap();

    assert!(result.objective_score > 0.0);
    for candidate in &result.top_candidates {
        assert!(candidate.objective_score >= result.objective_score);
    }
    let scores: Vec<f64> = result.top_candidates.iter().map(|c| c.objective_score).collect();
    assert!(scores.windows(2).all(|w| match w {
        [a, b] => a <= b,
        _ => true,
    }));
}

#[test]
fn optimizer_rejects_zero_iterations() {
    let plant = Plant::from_tables(&sample_tables()).unwrap();
    let result = optimize(&plant, &quick_config(), &moisture_target(4.3, 0, 1));
    assert!(matches!(result, Err(BlendError::Configuration { .. })));
}

#[test]
fn optimizer_rejects_non_finite_target() {
    let plant = Plant::from_tables(&sample_tables()).unwrap();
    let result = optimize(&plant, &quick_config(), &moisture_target(f64::NAN, 4, 1));
    assert!(matches!(result, Err(BlendError::Configuration { .. })));
}
