//! Multi-silo orchestration.
//!
//! Silos share nothing while they run, so each is simulated on its own
//! rayon task. Results are collected in the plant's canonical order before
//! aggregation, which makes parallel and sequential runs identical.

use rayon::prelude::*;

use blend_physics::{SiloOutcome, SiloSimulator, SimulatorSettings};
use blend_types::{InputTables, RunResult, Silo};

use crate::blend::aggregate;
use crate::config::BlendConfig;
use crate::dataset::Plant;
use crate::error::BlendError;

fn simulate_silo(silo: &Silo, settings: &SimulatorSettings) -> Result<SiloOutcome, BlendError> {
    let mut simulator = SiloSimulator::new(silo, settings)?;
    Ok(simulator.run()?)
}

/// Simulate every silo, returning outcomes in canonical order.
///
/// When several silos fail, the error of the first in canonical order is
/// returned.
pub(crate) fn simulate_all(
    plant: &Plant,
    settings: &SimulatorSettings,
    parallel: bool,
) -> Result<Vec<SiloOutcome>, BlendError> {
    let results: Vec<Result<SiloOutcome, BlendError>> = if parallel {
        plant
            .silos()
            .par_iter()
            .map(|silo| simulate_silo(silo, settings))
            .collect()
    } else {
        plant
            .silos()
            .iter()
            .map(|silo| simulate_silo(silo, settings))
            .collect()
    };
    results.into_iter().collect()
}

/// Run every silo of `plant` under `config` and aggregate the result.
///
/// # Errors
///
/// Returns [`BlendError::Configuration`] for invalid parameters or silos,
/// and [`BlendError::Computation`] for numerical or conservation failures.
pub fn run(plant: &Plant, config: &BlendConfig) -> Result<RunResult, BlendError> {
    let settings = config.simulator_settings();
    settings.validate()?;

    tracing::info!(
        silos = plant.len(),
        steps = settings.steps,
        sigma_m = settings.mixing.sigma_m,
        parallel = config.simulation.parallel,
        "starting blend run"
    );
    let outcomes = simulate_all(plant, &settings, config.simulation.parallel)?;
    let result = aggregate(outcomes)?;
    tracing::info!(
        discharged_kg = result.total_discharged_mass_kg,
        remaining_kg = result.total_remaining_mass_kg,
        "blend run complete"
    );
    Ok(result)
}

/// Validate `tables`, build the plant and run it.
///
/// # Errors
///
/// As [`run`], plus [`BlendError::Configuration`] for invalid tables.
pub fn run_tables(tables: &InputTables, config: &BlendConfig) -> Result<RunResult, BlendError> {
    let plant = Plant::from_tables(tables)?;
    run(&plant, config)
}
