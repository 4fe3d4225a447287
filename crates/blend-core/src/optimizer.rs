//! Discharge-fraction optimizer.
//!
//! Searches per-silo discharge fractions in `[0, 1]^n` for the plan whose
//! blend is closest to a target profile:
//!
//! ```text
//! score = sum_p w_p * ((blend_p - target_p) / range_p)^2
//! ```
//!
//! The search runs in two phases from one seed. A Latin hypercube spreads
//! `iterations - iterations / 2` candidates over the whole space, then the
//! remaining `iterations / 2` candidates perturb the incumbent with a
//! radius shrinking linearly from `initial_radius` to `final_radius`.
//! Candidate vectors are always drawn before a batch is evaluated, and the
//! incumbent only moves on a strictly lower score scanned in submission
//! order, so the outcome never depends on thread scheduling.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use blend_physics::{SiloSimulator, SimulatorSettings};
use blend_types::{
    BlendedParams, CandidateSummary, OptimizationResult, QualityParam, RunResult, SiloId,
};

use crate::blend::aggregate;
use crate::config::{BlendConfig, OptimizerConfig};
use crate::dataset::Plant;
use crate::error::BlendError;
use crate::orchestrator::simulate_all;

/// Name reported for the objective and search strategy.
pub const OBJECTIVE_METHOD: &str = "normalized_weighted_l2_hybrid_search";

/// Ranges narrower than this fall back to 1.
const MIN_RANGE: f64 = 1e-9;

/// What to optimize for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizeRequest {
    /// Target value per attribute; only these attributes are scored.
    pub target: BTreeMap<QualityParam, f64>,

    /// Candidates to evaluate; falls back to `optimizer.iterations`.
    #[serde(default)]
    pub iterations: Option<u32>,

    /// Search seed; falls back to `optimizer.seed`.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Weight per attribute, default 1.
    #[serde(default)]
    pub weights: BTreeMap<QualityParam, f64>,

    /// Normalization range per attribute, default the spread across layers.
    #[serde(default)]
    pub ranges: BTreeMap<QualityParam, f64>,
}

/// Resolved scoring inputs.
#[derive(Debug, Clone, PartialEq)]
struct Objective {
    target: BTreeMap<QualityParam, f64>,
    weights: BTreeMap<QualityParam, f64>,
    ranges: BTreeMap<QualityParam, f64>,
}

impl Objective {
    fn resolve(plant: &Plant, request: &OptimizeRequest) -> Result<Self, BlendError> {
        if request.target.is_empty() {
            return Err(BlendError::configuration("target must name at least one parameter"));
        }
        if let Some((p, v)) = request.target.iter().find(|(_, v)| !v.is_finite()) {
            return Err(BlendError::configuration(format!(
                "target {p} must be finite, got {v}"
            )));
        }
        if let Some((p, v)) = request
            .weights
            .iter()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(BlendError::configuration(format!(
                "weight {p} must be finite and >= 0, got {v}"
            )));
        }
        if let Some((p, v)) = request
            .ranges
            .iter()
            .find(|(_, v)| !v.is_finite() || **v <= 0.0)
        {
            return Err(BlendError::configuration(format!(
                "range {p} must be finite and > 0, got {v}"
            )));
        }

        let spans = plant.quality_spans();
        let mut weights = BTreeMap::new();
        let mut ranges = BTreeMap::new();
        for param in request.target.keys() {
            weights.insert(*param, request.weights.get(param).copied().unwrap_or(1.0));
            let range = request.ranges.get(param).copied().unwrap_or_else(|| {
                spans
                    .get(param)
                    .copied()
                    .filter(|r| *r >= MIN_RANGE)
                    .unwrap_or(1.0)
            });
            ranges.insert(*param, range);
        }

        Ok(Self {
            target: request.target.clone(),
            weights,
            ranges,
        })
    }

    /// Score a blend, `None` when any targeted attribute is undefined.
    fn score(&self, blend: &BlendedParams) -> Option<f64> {
        let mut total = 0.0;
        for (param, target) in &self.target {
            let value = blend.get(param).copied().flatten()?;
            let weight = self.weights.get(param).copied().unwrap_or(1.0);
            let range = self.ranges.get(param).copied().unwrap_or(1.0);
            let z = (value - target) / range;
            total = (weight * z).mul_add(z, total);
        }
        Some(total)
    }
}

/// Outcome of evaluating one candidate.
enum Evaluation {
    Scored { score: f64, run: Box<RunResult> },
    Undefined,
    Failed,
}

/// Scores one fraction vector. Configuration errors abort the search;
/// anything else a candidate runs into is reported as
/// [`Evaluation::Failed`].
type Evaluator<'a> = dyn Fn(&[f64]) -> Result<Evaluation, BlendError> + Sync + 'a;

struct Candidate {
    index: u32,
    fractions: Vec<f64>,
    evaluation: Result<Evaluation, BlendError>,
}

fn evaluate(
    plant: &Plant,
    settings: &SimulatorSettings,
    objective: &Objective,
    fractions: &[f64],
) -> Result<Evaluation, BlendError> {
    let trial = plant.with_fractions(fractions);
    let run = match simulate_all(&trial, settings, false).and_then(aggregate) {
        Ok(run) => run,
        Err(err @ BlendError::Configuration { .. }) => return Err(err),
        Err(err) => {
            tracing::debug!(error = %err, "candidate failed");
            return Ok(Evaluation::Failed);
        }
    };
    Ok(match objective.score(&run.total_blended_params) {
        None => Evaluation::Undefined,
        Some(score) if score.is_finite() => Evaluation::Scored {
            score,
            run: Box::new(run),
        },
        Some(_) => Evaluation::Failed,
    })
}

/// Search schedule shared by both phases.
struct Schedule<'a> {
    cfg: &'a OptimizerConfig,
    iterations: u32,
    seed: u64,
    parallel: bool,
}

/// What a finished search hands back to [`optimize`].
struct SearchOutcome {
    score: f64,
    fractions: Vec<f64>,
    run: Box<RunResult>,
    history: Vec<f64>,
    top_candidates: Vec<CandidateSummary>,
    unscored: u32,
}

/// Running state of the search.
struct Search<'a> {
    evaluator: &'a Evaluator<'a>,
    silo_ids: &'a [SiloId],
    parallel: bool,
    next_index: u32,
    incumbent: Option<(f64, Vec<f64>, Box<RunResult>)>,
    history: Vec<f64>,
    summaries: Vec<CandidateSummary>,
    undefined: u32,
    failed: u32,
}

impl Search<'_> {
    /// Evaluate a batch and fold it into the incumbent in index order.
    ///
    /// The first configuration error in index order ends the search.
    fn submit(&mut self, batch: Vec<Vec<f64>>) -> Result<(), BlendError> {
        let start = self.next_index;
        let count = u32::try_from(batch.len()).unwrap_or(u32::MAX);
        self.next_index = self.next_index.saturating_add(count);

        let evaluator = self.evaluator;
        let evaluate_one = |(offset, fractions): (u32, Vec<f64>)| {
            let evaluation = evaluator(&fractions);
            Candidate {
                index: start.saturating_add(offset),
                fractions,
                evaluation,
            }
        };
        let indexed: Vec<(u32, Vec<f64>)> = (0_u32..).zip(batch).collect();
        let candidates: Vec<Candidate> = if self.parallel {
            indexed.into_par_iter().map(evaluate_one).collect()
        } else {
            indexed.into_iter().map(evaluate_one).collect()
        };

        for candidate in candidates {
            match candidate.evaluation? {
                Evaluation::Scored { score, run } => {
                    let summary = CandidateSummary {
                        index: candidate.index,
                        fractions: self.fraction_map(&candidate.fractions),
                        objective_score: score,
                        total_discharged_mass_kg: run.total_discharged_mass_kg,
                        blended_params: run.total_blended_params.clone(),
                    };
                    self.summaries.push(summary);
                    let improves = self
                        .incumbent
                        .as_ref()
                        .is_none_or(|(best, _, _)| score < *best);
                    if improves {
                        self.incumbent = Some((score, candidate.fractions, run));
                    }
                    if let Some((best, _, _)) = &self.incumbent {
                        self.history.push(*best);
                    }
                }
                Evaluation::Undefined => {
                    self.undefined = self.undefined.saturating_add(1);
                }
                Evaluation::Failed => {
                    self.failed = self.failed.saturating_add(1);
                }
            }
        }
        Ok(())
    }

    fn fraction_map(&self, fractions: &[f64]) -> BTreeMap<SiloId, f64> {
        self.silo_ids
            .iter()
            .cloned()
            .zip(fractions.iter().copied())
            .collect()
    }

    /// Fractions of the incumbent, or the centre of the space.
    fn centre(&self) -> Vec<f64> {
        self.incumbent
            .as_ref()
            .map_or_else(|| vec![0.5; self.silo_ids.len()], |(_, x, _)| x.clone())
    }

    /// Best plan, history and the top `top_k` distinct candidates.
    fn finish(self, iterations: u32, top_k: u32) -> Result<SearchOutcome, BlendError> {
        let Self {
            incumbent,
            history,
            mut summaries,
            undefined,
            failed,
            ..
        } = self;
        let Some((score, fractions, run)) = incumbent else {
            if undefined == iterations {
                return Err(BlendError::UndefinedBlend);
            }
            return Err(BlendError::SearchExhausted {
                evaluations: iterations,
            });
        };

        summaries.sort_by(|a, b| {
            a.objective_score
                .total_cmp(&b.objective_score)
                .then(a.index.cmp(&b.index))
        });
        let top_k = usize::try_from(top_k).unwrap_or(usize::MAX);
        let mut top_candidates: Vec<CandidateSummary> = Vec::new();
        for summary in summaries {
            if top_candidates.len() >= top_k {
                break;
            }
            if !top_candidates.iter().any(|c| c.fractions == summary.fractions) {
                top_candidates.push(summary);
            }
        }

        Ok(SearchOutcome {
            score,
            fractions,
            run,
            history,
            top_candidates,
            unscored: failed.saturating_add(undefined),
        })
    }
}

/// Latin hypercube sample of `count` points in `[0, 1]^dims`.
fn latin_hypercube(rng: &mut StdRng, count: u32, dims: usize) -> Vec<Vec<f64>> {
    let n = f64::from(count);
    let mut points = vec![Vec::with_capacity(dims); usize::try_from(count).unwrap_or(0)];
    for _ in 0..dims {
        let mut strata: Vec<u32> = (0..count).collect();
        strata.shuffle(rng);
        for (point, stratum) in points.iter_mut().zip(strata) {
            let u: f64 = rng.random();
            point.push((f64::from(stratum) + u) / n);
        }
    }
    points
}

/// Radius for refinement candidate `r` of `total`.
fn refine_radius(cfg: &OptimizerConfig, r: u32, total: u32) -> f64 {
    if total <= 1 {
        return cfg.initial_radius;
    }
    let t = f64::from(r) / f64::from(total.saturating_sub(1));
    (cfg.final_radius - cfg.initial_radius).mul_add(t, cfg.initial_radius)
}

/// Run both phases over `silo_ids.len()` dimensions with `evaluator`.
fn search(
    schedule: &Schedule<'_>,
    silo_ids: &[SiloId],
    evaluator: &Evaluator<'_>,
) -> Result<SearchOutcome, BlendError> {
    let cfg = schedule.cfg;
    let dims = silo_ids.len();
    let refine = schedule.iterations / 2;
    let explore = schedule.iterations.saturating_sub(refine);
    let batch_size = cfg.refine_batch.max(1);

    let mut rng = StdRng::seed_from_u64(schedule.seed);
    let mut search = Search {
        evaluator,
        silo_ids,
        parallel: schedule.parallel,
        next_index: 0,
        incumbent: None,
        history: Vec::new(),
        summaries: Vec::new(),
        undefined: 0,
        failed: 0,
    };

    let exploration = latin_hypercube(&mut rng, explore, dims);
    search.submit(exploration)?;

    let mut drawn = 0_u32;
    while drawn < refine {
        let size = batch_size.min(refine.saturating_sub(drawn));
        let centre = search.centre();
        let mut batch = Vec::new();
        for r in drawn..drawn.saturating_add(size) {
            let radius = refine_radius(cfg, r, refine);
            let point: Vec<f64> = centre
                .iter()
                .map(|x| (x + rng.random_range(-radius..=radius)).clamp(0.0, 1.0))
                .collect();
            batch.push(point);
        }
        search.submit(batch)?;
        drawn = drawn.saturating_add(size);
    }

    search.finish(schedule.iterations, cfg.top_k)
}

/// Search discharge fractions that bring the blend closest to the target.
///
/// # Errors
///
/// - [`BlendError::Configuration`] for an empty or non-finite target,
///   invalid weights, ranges or settings, zero iterations, an empty
///   plant, or a silo the physics rejects (for example an outlet too
///   narrow for the grain). These end the search instead of being
///   skipped per candidate.
/// - [`BlendError::UndefinedBlend`] when every candidate discharged nothing.
/// - [`BlendError::SearchExhausted`] when no candidate could be scored.
pub fn optimize(
    plant: &Plant,
    config: &BlendConfig,
    request: &OptimizeRequest,
) -> Result<OptimizationResult, BlendError> {
    let cfg = &config.optimizer;
    let iterations = request.iterations.unwrap_or(cfg.iterations);
    let seed = request.seed.unwrap_or(cfg.seed);
    if iterations == 0 {
        return Err(BlendError::configuration("iterations must be > 0"));
    }
    if plant.is_empty() {
        return Err(BlendError::configuration("plant has no silos"));
    }
    for (name, r) in [
        ("initial_radius", cfg.initial_radius),
        ("final_radius", cfg.final_radius),
    ] {
        if !r.is_finite() || r < 0.0 {
            return Err(BlendError::configuration(format!(
                "{name} must be finite and >= 0, got {r}"
            )));
        }
    }
    let settings = config.simulator_settings();
    settings.validate()?;
    for silo in plant.silos() {
        SiloSimulator::new(silo, &settings)?;
    }
    let objective = Objective::resolve(plant, request)?;

    let silo_ids = plant.silo_ids();
    tracing::info!(
        silos = silo_ids.len(),
        iterations,
        seed,
        targets = objective.target.len(),
        "starting discharge optimization"
    );

    let schedule = Schedule {
        cfg,
        iterations,
        seed,
        parallel: config.simulation.parallel,
    };
    let evaluator = |fractions: &[f64]| evaluate(plant, &settings, &objective, fractions);
    let outcome = search(&schedule, &silo_ids, &evaluator)?;

    tracing::info!(
        objective_score = outcome.score,
        failed = outcome.unscored,
        "discharge optimization complete"
    );

    Ok(OptimizationResult {
        recommended_discharge: silo_ids.into_iter().zip(outcome.fractions).collect(),
        best_run: *outcome.run,
        objective_score: outcome.score,
        objective_method: OBJECTIVE_METHOD.to_owned(),
        target_params: objective.target,
        parameter_ranges: objective.ranges,
        weights: objective.weights,
        seed,
        evaluations: iterations,
        failed_evaluations: outcome.unscored,
        score_history: outcome.history,
        top_candidates: outcome.top_candidates,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::orchestrator::run;
    use crate::sample::sample_tables;

    fn plant() -> Plant {
        Plant::from_tables(&sample_tables()).unwrap()
    }

    fn config() -> BlendConfig {
        let mut config = BlendConfig::default();
        config.simulation.steps = 200;
        config
    }

    fn request(iterations: u32) -> OptimizeRequest {
        let mut target = BTreeMap::new();
        target.insert(QualityParam::MoisturePct, 4.3);
        target.insert(QualityParam::TotalProteinPct, 10.6);
        OptimizeRequest {
            target,
            iterations: Some(iterations),
            seed: Some(7),
            ..OptimizeRequest::default()
        }
    }

    fn sequential(cfg: &OptimizerConfig, iterations: u32) -> Schedule<'_> {
        Schedule {
            cfg,
            iterations,
            seed: 3,
            parallel: false,
        }
    }

    #[test]
    fn latin_hypercube_fills_every_stratum() {
        let mut rng = StdRng::seed_from_u64(1);
        let points = latin_hypercube(&mut rng, 10, 3);
        assert_eq!(points.len(), 10);
        for dim in 0..3 {
            for stratum in 0..10_u32 {
                let lo = f64::from(stratum) / 10.0;
                let hi = lo + 0.1;
                let hits = points
                    .iter()
                    .filter_map(|p| p.get(dim))
                    .filter(|v| (lo..hi).contains(*v))
                    .count();
                assert_eq!(hits, 1, "dim {dim} stratum {stratum}");
            }
        }
    }

    #[test]
    fn radius_shrinks_linearly() {
        let cfg = OptimizerConfig::default();
        assert!((refine_radius(&cfg, 0, 5) - 0.25).abs() < 1e-12);
        assert!((refine_radius(&cfg, 4, 5) - 0.02).abs() < 1e-12);
        assert!(refine_radius(&cfg, 2, 5) < refine_radius(&cfg, 1, 5));
        assert!((refine_radius(&cfg, 0, 1) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn score_is_weighted_normalized_l2() {
        let mut target = BTreeMap::new();
        target.insert(QualityParam::MoisturePct, 4.0);
        let objective = Objective {
            target,
            weights: [(QualityParam::MoisturePct, 2.0)].into_iter().collect(),
            ranges: [(QualityParam::MoisturePct, 0.5)].into_iter().collect(),
        };
        let blend: BlendedParams = [(QualityParam::MoisturePct, Some(4.25))].into_iter().collect();
        let score = objective.score(&blend).unwrap();
        assert!((score - 0.5).abs() < 1e-12);
        let undefined: BlendedParams = [(QualityParam::MoisturePct, None)].into_iter().collect();
        assert!(objective.score(&undefined).is_none());
    }

    #[test]
    fn zero_iterations_rejected() {
        let result = optimize(&plant(), &config(), &request(0));
        assert!(matches!(result, Err(BlendError::Configuration { .. })));
    }

    #[test]
    fn empty_target_rejected() {
        let req = OptimizeRequest {
            iterations: Some(4),
            ..OptimizeRequest::default()
        };
        assert!(matches!(
            optimize(&plant(), &config(), &req),
            Err(BlendError::Configuration { .. })
        ));
    }

    #[test]
    fn narrow_outlet_is_configuration_error_not_exhaustion() {
        let mut tables = sample_tables();
        tables.silos.first_mut().unwrap().outlet_diameter_m = 0.005;
        let plant = Plant::from_tables(&tables).unwrap();

        let ran = run(&plant, &config());
        assert!(matches!(ran, Err(BlendError::Configuration { .. })));

        let result = optimize(&plant, &config(), &request(6));
        assert!(
            matches!(result, Err(BlendError::Configuration { ref message }) if message.contains("D-k*d")),
            "{result:?}"
        );
    }

    #[test]
    fn configuration_error_mid_search_ends_the_search() {
        let cfg = OptimizerConfig::default();
        let calls = AtomicU32::new(0);
        let evaluator = |_: &[f64]| -> Result<Evaluation, BlendError> {
            calls.fetch_add(1, Ordering::Relaxed);
            Err(BlendError::configuration("bad silo"))
        };
        let ids = plant().silo_ids();
        let result = search(&sequential(&cfg, 6), &ids, &evaluator);

        assert!(matches!(result, Err(BlendError::Configuration { .. })));
        // Exploration batch only; refinement never starts.
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn single_failed_candidate_is_skipped() {
        let base = run(&plant(), &config()).unwrap();
        let cfg = OptimizerConfig::default();
        let calls = AtomicU32::new(0);
        let evaluator = |fractions: &[f64]| -> Result<Evaluation, BlendError> {
            let call = calls.fetch_add(1, Ordering::Relaxed);
            if call == 1 {
                return Ok(Evaluation::Failed);
            }
            Ok(Evaluation::Scored {
                score: fractions.iter().sum(),
                run: Box::new(base.clone()),
            })
        };
        let ids = plant().silo_ids();
        let outcome = search(&sequential(&cfg, 8), &ids, &evaluator).unwrap();

        assert_eq!(outcome.unscored, 1);
        assert_eq!(outcome.history.len(), 7);
        assert_eq!(outcome.top_candidates.len(), 5);
        assert!(outcome.top_candidates.iter().all(|c| c.index != 1));
        assert!(outcome.history.windows(2).all(|w| match w {
            [a, b] => b <= a,
            _ => true,
        }));
        let first = outcome.top_candidates.first().unwrap();
        assert!((first.objective_score - outcome.score).abs() < f64::EPSILON);
    }

    #[test]
    fn all_failed_candidates_exhaust_the_search() {
        let cfg = OptimizerConfig::default();
        let evaluator = |_: &[f64]| -> Result<Evaluation, BlendError> { Ok(Evaluation::Failed) };
        let ids = plant().silo_ids();
        let result = search(&sequential(&cfg, 4), &ids, &evaluator);
        assert!(matches!(
            result,
            Err(BlendError::SearchExhausted { evaluations: 4 })
        ));
    }

    #[test]
    fn result_reports_search_metadata() {
        let result = optimize(&plant(), &config(), &request(12)).unwrap();
        assert_eq!(result.objective_method, OBJECTIVE_METHOD);
        assert_eq!(result.evaluations, 12);
        assert_eq!(result.recommended_discharge.len(), 3);
        assert!(result.recommended_discharge.values().all(|f| (0.0..=1.0).contains(f)));
        assert!(result.top_candidates.len() <= 5);
        let first = result.top_candidates.first().unwrap();
        assert!((first.objective_score - result.objective_score).abs() < 1e-15);
        assert_eq!(result.parameter_ranges.len(), 2);
        let moisture_range = result
            .parameter_ranges
            .get(&QualityParam::MoisturePct)
            .copied()
            .unwrap();
        assert!((moisture_range - 0.2).abs() < 1e-9);
    }

    #[test]
    fn all_zero_candidates_are_undefined() {
        let mut tables = sample_tables();
        for layer in &mut tables.layers {
            layer.segment_mass_kg = 0.0;
        }
        for rule in &mut tables.discharge {
            rule.discharge_mass_kg = None;
            rule.discharge_fraction = Some(0.0);
        }
        let plant = Plant::from_tables(&tables).unwrap();
        let result = optimize(&plant, &config(), &request(4));
        assert!(matches!(result, Err(BlendError::UndefinedBlend)));
    }
}
