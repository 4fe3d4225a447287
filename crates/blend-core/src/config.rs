//! Configuration loading and typed config structures for silo-blend.
//!
//! The canonical configuration lives in `silo-blend.yaml` at the project
//! root. Every section and field is optional; missing values fall back to
//! the defaults documented on each field.

use std::path::Path;

use serde::{Deserialize, Serialize};

use blend_physics::{BeverlooParams, Material, MixingParams, SimulatorSettings};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BlendConfig {
    /// Bulk material properties.
    #[serde(default)]
    pub material: Material,

    /// Beverloo flow constants.
    #[serde(default)]
    pub beverloo: BeverlooParams,

    /// Mixing window.
    #[serde(default)]
    pub mixing: MixingParams,

    /// Step schedule and execution.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Discharge-fraction search.
    #[serde(default)]
    pub optimizer: OptimizerConfig,

    /// HTTP server.
    #[serde(default)]
    pub server: HttpConfig,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BlendConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `BLEND_HOST` overrides `server.host`
    /// - `BLEND_PORT` overrides `server.port`
    /// - `BLEND_LOG` overrides `logging.level`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Override server and logging settings from the environment.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("BLEND_HOST") {
            self.server.host = val;
        }
        if let Some(port) = std::env::var("BLEND_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
        {
            self.server.port = port;
        }
        if let Ok(val) = std::env::var("BLEND_LOG") {
            self.logging.level = val;
        }
    }

    /// Settings handed to each silo simulator.
    pub const fn simulator_settings(&self) -> SimulatorSettings {
        SimulatorSettings {
            material: self.material,
            beverloo: self.beverloo,
            mixing: self.mixing,
            steps: self.simulation.steps,
            trajectory_stride: self.simulation.trajectory_stride,
        }
    }

    /// A copy with request-level overrides applied.
    pub fn with_overrides(&self, overrides: &RunOverrides) -> Self {
        let mut config = self.clone();
        overrides.apply_to(&mut config);
        config
    }
}

/// Step schedule and execution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// Discrete steps per silo discharge.
    #[serde(default = "default_steps")]
    pub steps: u32,

    /// Trajectory sampling stride in steps, 0 to disable.
    #[serde(default)]
    pub trajectory_stride: u32,

    /// Run silos (and optimizer candidates) on the rayon pool.
    #[serde(default = "default_true")]
    pub parallel: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            steps: default_steps(),
            trajectory_stride: 0,
            parallel: true,
        }
    }
}

/// Discharge-fraction search settings.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct OptimizerConfig {
    /// Candidates per search when the request does not say.
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Seed when the request does not say.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Refinement radius for the first refinement batch.
    #[serde(default = "default_initial_radius")]
    pub initial_radius: f64,

    /// Refinement radius for the last refinement batch.
    #[serde(default = "default_final_radius")]
    pub final_radius: f64,

    /// Candidates perturbed around the same incumbent.
    #[serde(default = "default_refine_batch")]
    pub refine_batch: u32,

    /// Distinct candidates reported.
    #[serde(default = "default_top_k")]
    pub top_k: u32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            seed: default_seed(),
            initial_radius: default_initial_radius(),
            final_radius: default_final_radius(),
            refine_batch: default_refine_batch(),
            top_k: default_top_k(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HttpConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or an `EnvFilter`
    /// directive string.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Per-request run parameter overrides, keyed the way the plant's web
/// form sends them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunOverrides {
    /// Bulk density, kg/m³.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rho_bulk_kg_m3: Option<f64>,
    /// Grain diameter, m.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grain_diameter_m: Option<f64>,
    /// Beverloo `C`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beverloo_c: Option<f64>,
    /// Beverloo `k`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beverloo_k: Option<f64>,
    /// Gravity, m/s².
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gravity_m_s2: Option<f64>,
    /// Mixing window width, m.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sigma_m: Option<f64>,
    /// Steps per silo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
    /// Mixing auto-adjust toggle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_adjust: Option<bool>,
    /// Trajectory sampling stride.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trajectory_stride: Option<u32>,
}

impl RunOverrides {
    /// The full parameter set of `config`, as overrides.
    pub const fn from_config(config: &BlendConfig) -> Self {
        Self {
            rho_bulk_kg_m3: Some(config.material.rho_bulk_kg_m3),
            grain_diameter_m: Some(config.material.grain_diameter_m),
            beverloo_c: Some(config.beverloo.c),
            beverloo_k: Some(config.beverloo.k),
            gravity_m_s2: Some(config.beverloo.gravity_m_s2),
            sigma_m: Some(config.mixing.sigma_m),
            steps: Some(config.simulation.steps),
            auto_adjust: Some(config.mixing.auto_adjust),
            trajectory_stride: None,
        }
    }

    /// Write every set field into `config`.
    pub fn apply_to(&self, config: &mut BlendConfig) {
        if let Some(v) = self.rho_bulk_kg_m3 {
            config.material.rho_bulk_kg_m3 = v;
        }
        if let Some(v) = self.grain_diameter_m {
            config.material.grain_diameter_m = v;
        }
        if let Some(v) = self.beverloo_c {
            config.beverloo.c = v;
        }
        if let Some(v) = self.beverloo_k {
            config.beverloo.k = v;
        }
        if let Some(v) = self.gravity_m_s2 {
            config.beverloo.gravity_m_s2 = v;
        }
        if let Some(v) = self.sigma_m {
            config.mixing.sigma_m = v;
        }
        if let Some(v) = self.steps {
            config.simulation.steps = v;
        }
        if let Some(v) = self.auto_adjust {
            config.mixing.auto_adjust = v;
        }
        if let Some(v) = self.trajectory_stride {
            config.simulation.trajectory_stride = v;
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_true() -> bool {
    true
}

const fn default_steps() -> u32 {
    2000
}

const fn default_iterations() -> u32 {
    200
}

const fn default_seed() -> u64 {
    42
}

const fn default_initial_radius() -> f64 {
    0.25
}

const fn default_final_radius() -> f64 {
    0.02
}

const fn default_refine_batch() -> u32 {
    8
}

const fn default_top_k() -> u32 {
    5
}

fn default_host() -> String {
    "127.0.0.1".to_owned()
}

const fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_plant_defaults() {
        let config = BlendConfig::default();
        assert!((config.material.rho_bulk_kg_m3 - 610.0).abs() < 1e-12);
        assert!((config.material.grain_diameter_m - 0.004).abs() < 1e-12);
        assert!((config.beverloo.c - 0.58).abs() < 1e-12);
        assert!((config.beverloo.k - 1.4).abs() < 1e-12);
        assert!((config.mixing.sigma_m - 0.12).abs() < 1e-12);
        assert!(config.mixing.auto_adjust);
        assert_eq!(config.simulation.steps, 2000);
        assert_eq!(config.optimizer.refine_batch, 8);
        assert_eq!(config.optimizer.top_k, 5);
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r"
material:
  rho_bulk_kg_m3: 650.0
  grain_diameter_m: 0.005

beverloo:
  c: 0.6
  k: 1.5
  gravity_m_s2: 9.8

mixing:
  sigma_m: 0.2
  auto_adjust: false
  growth: 1.5
  max_rounds: 4
  min_lots: 3
  min_nonzero_mass_kg: 0.01

simulation:
  steps: 500
  trajectory_stride: 25
  parallel: false

optimizer:
  iterations: 64
  seed: 7
  initial_radius: 0.3
  final_radius: 0.05
  refine_batch: 4
  top_k: 3

server:
  host: 0.0.0.0
  port: 9000

logging:
  level: debug
  json: true
";
        let config = serde_yml::from_str::<BlendConfig>(yaml).unwrap();
        assert!((config.material.rho_bulk_kg_m3 - 650.0).abs() < 1e-12);
        assert!((config.beverloo.gravity_m_s2 - 9.8).abs() < 1e-12);
        assert_eq!(config.mixing.max_rounds, 4);
        assert!(!config.simulation.parallel);
        assert_eq!(config.simulation.trajectory_stride, 25);
        assert_eq!(config.optimizer.seed, 7);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(config.logging.json);
    }

    #[test]
    fn partial_yaml_uses_defaults() {
        let config = serde_yml::from_str::<BlendConfig>("simulation:\n  steps: 100\n").unwrap();
        assert_eq!(config.simulation.steps, 100);
        assert!(config.simulation.parallel);
        assert!((config.mixing.growth - 1.35).abs() < 1e-12);
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let overrides = RunOverrides {
            sigma_m: Some(0.3),
            steps: Some(50),
            ..RunOverrides::default()
        };
        let config = BlendConfig::default().with_overrides(&overrides);
        assert!((config.mixing.sigma_m - 0.3).abs() < 1e-12);
        assert_eq!(config.simulation.steps, 50);
        assert!((config.material.rho_bulk_kg_m3 - 610.0).abs() < 1e-12);
    }

    #[test]
    fn overrides_read_flat_keys() {
        let json = r#"{"rho_bulk_kg_m3": 600.0, "auto_adjust": false}"#;
        let overrides: RunOverrides = serde_json::from_str(json).unwrap();
        assert_eq!(overrides.rho_bulk_kg_m3, Some(600.0));
        assert_eq!(overrides.auto_adjust, Some(false));
        assert!(overrides.steps.is_none());
    }

    #[test]
    fn simulator_settings_follow_config() {
        let mut config = BlendConfig::default();
        config.simulation.steps = 123;
        let settings = config.simulator_settings();
        assert_eq!(settings.steps, 123);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn shipped_yaml_matches_defaults() {
        let parsed = serde_yml::from_str::<BlendConfig>(include_str!("../../../silo-blend.yaml"));
        assert_eq!(parsed.unwrap(), BlendConfig::default());
    }
}
