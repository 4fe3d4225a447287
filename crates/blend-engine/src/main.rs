//! Silo blend engine binary.
//!
//! Loads configuration, initializes logging, and then either runs one
//! dataset or serves the HTTP API.
//!
//! # Usage
//!
//! ```text
//! blend-engine                 # serve the HTTP API
//! blend-engine dataset.json    # run the tables in dataset.json once
//! ```
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `silo-blend.yaml` (or `$BLEND_CONFIG`)
//! 2. Apply environment overrides
//! 3. Initialize structured logging (tracing)
//! 4. Run the dataset and print the result JSON, or start the server

mod error;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use blend_core::{BlendConfig, LoggingConfig, run_tables};
use blend_observer::{AppState, ServerConfig};
use blend_types::InputTables;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "silo-blend.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, the dataset run, or the server fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1-2. Load configuration.
    let config = load_config()?;

    // 3. Initialize structured logging.
    init_logging(&config.logging);
    info!("blend-engine starting");
    info!(
        steps = config.simulation.steps,
        sigma_m = config.mixing.sigma_m,
        parallel = config.simulation.parallel,
        "Configuration loaded"
    );

    // 4. One-shot run or serve.
    if let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) {
        run_dataset(&path, config).await?;
        return Ok(());
    }

    let server_config = ServerConfig::from(&config.server);
    let state = Arc::new(AppState::new(config));
    blend_observer::start_server(&server_config, state)
        .await
        .map_err(EngineError::from)?;

    info!("blend-engine stopped");
    Ok(())
}

/// Load `$BLEND_CONFIG` or `silo-blend.yaml`, falling back to defaults.
fn load_config() -> Result<BlendConfig, EngineError> {
    let path = std::env::var_os("BLEND_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if path.exists() {
        return Ok(BlendConfig::from_file(&path)?);
    }
    let mut config = BlendConfig::default();
    config.apply_env_overrides();
    Ok(config)
}

fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Run the tables in `path` once and print the result to stdout.
async fn run_dataset(path: &Path, config: BlendConfig) -> Result<(), EngineError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| EngineError::Dataset {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
    let tables: InputTables = serde_json::from_str(&raw).map_err(|e| EngineError::Dataset {
        message: format!("failed to parse {}: {e}", path.display()),
    })?;
    info!(
        path = %path.display(),
        silos = tables.silos.len(),
        layers = tables.layers.len(),
        "Dataset loaded"
    );

    let result = tokio::task::spawn_blocking(move || run_tables(&tables, &config))
        .await
        .map_err(|e| EngineError::Dataset {
            message: format!("run task failed: {e}"),
        })??;

    let json = serde_json::to_string_pretty(&result).map_err(|e| EngineError::Dataset {
        message: format!("failed to encode result: {e}"),
    })?;
    println!("{json}");
    Ok(())
}
