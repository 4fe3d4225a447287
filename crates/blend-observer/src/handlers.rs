//! REST API endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/health` | Liveness probe |
//! | `GET` | `/api/sample` | Demonstration dataset with default parameters |
//! | `POST` | `/api/validate` | Check input tables |
//! | `POST` | `/api/run` | Simulate a discharge plan |
//! | `POST` | `/api/optimize` | Search discharge fractions for a target |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::{Html, IntoResponse};
use blend_core::{
    BlendConfig, OptimizeRequest, Plant, RunOverrides, optimize, run, sample_tables,
    validate_tables,
};
use blend_types::{InputTables, OptimizationResult, RunResult, ValidationReport};
use serde::{Deserialize, Serialize};

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Body of `POST /api/run`: the tables plus optional parameter overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunRequest {
    /// Input tables.
    #[serde(flatten)]
    pub tables: InputTables,
    /// Parameter overrides on top of the server configuration.
    #[serde(default)]
    pub config: RunOverrides,
}

/// Body of `POST /api/optimize`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimizeBody {
    /// Input tables.
    #[serde(flatten)]
    pub tables: InputTables,
    /// Parameter overrides on top of the server configuration.
    #[serde(default)]
    pub config: RunOverrides,
    /// Target, budget and objective options.
    #[serde(flatten)]
    pub request: OptimizeRequest,
}

/// Validate tables and build the plant, or fail with every issue found.
fn checked_plant(tables: &InputTables) -> Result<Plant, ObserverError> {
    let issues = validate_tables(tables);
    if !issues.is_empty() {
        return Err(ObserverError::InvalidDataset(issues));
    }
    Ok(Plant::from_tables(tables)?)
}

/// Run `f` on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, ObserverError>
where
    F: FnOnce() -> Result<T, blend_core::BlendError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ObserverError::Internal(format!("worker failed: {e}")))?
        .map_err(ObserverError::from)
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing server status and API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let runs = state.runs();
    let optimizations = state.optimizations();
    let steps = state.config.simulation.steps;
    let sigma = state.config.mixing.sigma_m;

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Silo Blend</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        .status {{ color: #3fb950; font-weight: bold; }}
    </style>
</head>
<body>
    <h1>Silo Blend</h1>
    <p class="subtitle">Silo discharge and blend simulator</p>

    <p>Status: <span class="status">READY</span></p>

    <div>
        <div class="metric">
            <div class="label">Runs</div>
            <div class="value">{runs}</div>
        </div>
        <div class="metric">
            <div class="label">Optimizations</div>
            <div class="value">{optimizations}</div>
        </div>
        <div class="metric">
            <div class="label">Steps</div>
            <div class="value">{steps}</div>
        </div>
        <div class="metric">
            <div class="label">Sigma (m)</div>
            <div class="value">{sigma}</div>
        </div>
    </div>

    <h2>API</h2>
    <ul>
        <li>GET <a href="/health">/health</a></li>
        <li>GET <a href="/api/sample">/api/sample</a></li>
        <li>POST /api/validate</li>
        <li>POST /api/run</li>
        <li>POST /api/optimize</li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

/// Liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ---------------------------------------------------------------------------
// GET /api/sample
// ---------------------------------------------------------------------------

/// The demonstration dataset with the server's default parameters, ready to
/// post back to `/api/run`.
pub async fn sample(State(state): State<Arc<AppState>>) -> Json<RunRequest> {
    Json(RunRequest {
        tables: sample_tables(),
        config: RunOverrides::from_config(&state.config),
    })
}

// ---------------------------------------------------------------------------
// POST /api/validate
// ---------------------------------------------------------------------------

/// Check input tables without running them.
pub async fn validate(Json(tables): Json<InputTables>) -> Json<ValidationReport> {
    Json(blend_core::validation_report(&tables))
}

// ---------------------------------------------------------------------------
// POST /api/run
// ---------------------------------------------------------------------------

/// Simulate the submitted discharge plan.
///
/// # Errors
///
/// 422 with every issue when the tables are invalid, otherwise the status
/// of the [`BlendError`](blend_core::BlendError) kind.
pub async fn run_blend(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RunRequest>,
) -> Result<Json<RunResult>, ObserverError> {
    let plant = checked_plant(&body.tables)?;
    let config: BlendConfig = state.config.with_overrides(&body.config);
    tracing::debug!(silos = plant.len(), "run requested");

    let result = blocking(move || run(&plant, &config)).await?;
    state.record_run();
    Ok(Json(result))
}

// ---------------------------------------------------------------------------
// POST /api/optimize
// ---------------------------------------------------------------------------

/// Search discharge fractions for the submitted target.
///
/// # Errors
///
/// As [`run_blend`].
pub async fn optimize_blend(
    State(state): State<Arc<AppState>>,
    Json(body): Json<OptimizeBody>,
) -> Result<Json<OptimizationResult>, ObserverError> {
    let plant = checked_plant(&body.tables)?;
    let config = state.config.with_overrides(&body.config);
    let request = body.request;
    tracing::debug!(
        silos = plant.len(),
        targets = request.target.len(),
        "optimization requested"
    );

    let result = blocking(move || optimize(&plant, &config, &request)).await?;
    state.record_optimization();
    Ok(Json(result))
}
