//! Configuration module for monitor and host settings.
//!
//! This module handles loading, saving, and validating configuration.

use crate::aggregate::{DEFAULT_ITERATIONS, MAX_ITERATIONS};
use crate::classify::{Bounds, DEFAULT_THRESHOLD};
use crate::control::{DEFAULT_FACTOR, DEFAULT_STEP};
use crate::error::ConfigError;
use crate::sampling::DEFAULT_WINDOW_MS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Monitor tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Sample windows collected per classification
    #[serde(default = "default_iterations")]
    pub iterations: usize,

    /// Time budget of one sample window in milliseconds
    #[serde(default = "default_ms")]
    pub ms: f64,

    /// Fraction of iterations that must sit outside a bound
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Refresh rate to `(lower, upper)` fps mapping
    #[serde(default)]
    pub bounds: Bounds,

    /// Flips tolerated before fallback; `None` never falls back
    #[serde(default)]
    pub flipflops: Option<u32>,

    /// Initial performance factor
    #[serde(default = "default_factor")]
    pub factor: f64,

    /// Factor increment per incline or decline
    #[serde(default = "default_step")]
    pub step: f64,
}

fn default_iterations() -> usize {
    DEFAULT_ITERATIONS
}
fn default_ms() -> f64 {
    DEFAULT_WINDOW_MS
}
fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}
fn default_factor() -> f64 {
    DEFAULT_FACTOR
}
fn default_step() -> f64 {
    DEFAULT_STEP
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            ms: default_ms(),
            threshold: default_threshold(),
            bounds: Bounds::default(),
            flipflops: None,
            factor: default_factor(),
            step: default_step(),
        }
    }
}

impl MonitorConfig {
    /// Validate configuration values.
    /// Returns Ok(()) if valid, Err with descriptive message if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iterations == 0 || self.iterations > MAX_ITERATIONS {
            return Err(ConfigError::ValidationError(format!(
                "iterations ({}) must be between 1 and {}",
                self.iterations, MAX_ITERATIONS
            )));
        }

        if !self.ms.is_finite() || self.ms <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "ms ({}) must be a positive number of milliseconds",
                self.ms
            )));
        }

        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::ValidationError(format!(
                "threshold ({}) must be within [0, 1]",
                self.threshold
            )));
        }

        if !(0.0..=1.0).contains(&self.factor) {
            return Err(ConfigError::ValidationError(format!(
                "factor ({}) must be within [0, 1]",
                self.factor
            )));
        }

        if !self.step.is_finite() || self.step < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "step ({}) must be a non-negative number",
                self.step
            )));
        }

        if let Bounds::Fixed { lower, upper } = self.bounds {
            if !lower.is_finite() || !upper.is_finite() || lower > upper {
                return Err(ConfigError::ValidationError(format!(
                    "fixed bounds [{}, {}] must be finite with lower <= upper",
                    lower, upper
                )));
            }
        }

        Ok(())
    }
}

/// Simulated render loop driven by the host binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Frame time at factor 0, in milliseconds
    #[serde(default = "default_base_frame_ms")]
    pub base_frame_ms: f64,

    /// Extra frame time at factor 1, in milliseconds
    #[serde(default = "default_quality_cost_ms")]
    pub quality_cost_ms: f64,

    /// Interval between metrics summaries
    #[serde(default = "default_summary_interval_secs")]
    pub summary_interval_secs: u64,
}

fn default_base_frame_ms() -> f64 {
    6.0
}
fn default_quality_cost_ms() -> f64 {
    14.0
}
fn default_summary_interval_secs() -> u64 {
    5
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            base_frame_ms: default_base_frame_ms(),
            quality_cost_ms: default_quality_cost_ms(),
            summary_interval_secs: default_summary_interval_secs(),
        }
    }
}

impl HostConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_frame_ms.is_finite() || self.base_frame_ms <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "base_frame_ms ({}) must be a positive number",
                self.base_frame_ms
            )));
        }

        if !self.quality_cost_ms.is_finite() || self.quality_cost_ms < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "quality_cost_ms ({}) must be a non-negative number",
                self.quality_cost_ms
            )));
        }

        if self.summary_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "summary_interval_secs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Simulated frame time for a performance factor.
    pub fn frame_ms(&self, factor: f64) -> f64 {
        self.base_frame_ms + factor.clamp(0.0, 1.0) * self.quality_cost_ms
    }
}

/// Logging output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write a rotating JSON log file
    #[serde(default)]
    pub file: bool,

    /// Log directory; the platform data directory when unset
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: false,
            directory: None,
        }
    }
}

/// On-disk configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.monitor.validate()?;
        self.host.validate()
    }
}

/// Configuration manager with file I/O.
pub struct ConfigManager {
    config: RwLock<Config>,
    path: PathBuf,
}

impl ConfigManager {
    /// Load configuration from file or use defaults.
    /// If the file doesn't exist, returns a manager with default config.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let contents = fs::read_to_string(path).map_err(|e| {
                ConfigError::ParseError(format!("Failed to read config file: {}", e))
            })?;

            let config: Config = serde_json::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(format!("Invalid JSON: {}", e)))?;

            config.validate()?;
            config
        } else {
            Config::default()
        };

        Ok(Self {
            config: RwLock::new(config),
            path: path.to_path_buf(),
        })
    }

    /// Save configuration to file using atomic write.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config = self.config.read().map_err(|_| {
            ConfigError::ValidationError("Failed to acquire read lock".to_string())
        })?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write to a temp file, then rename over the target
        let temp_path = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&*config)
            .map_err(|e| ConfigError::ParseError(format!("Failed to serialize config: {}", e)))?;

        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &self.path)?;

        Ok(())
    }

    /// Get current configuration.
    pub fn get(&self) -> Config {
        self.config
            .read()
            .map(|c| c.clone())
            .unwrap_or_else(|_| Config::default())
    }

    /// Update configuration with validation.
    pub fn update(&self, config: Config) -> Result<(), ConfigError> {
        config.validate()?;

        let mut current = self.config.write().map_err(|_| {
            ConfigError::ValidationError("Failed to acquire write lock".to_string())
        })?;

        *current = config;

        // Release lock before saving
        drop(current);

        self.save()
    }

    /// Get the config file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the default config path (`<config dir>/adaptive-perf/config.json`).
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("adaptive-perf")
            .join("config.json")
    }
}
