//! Run Configuration
//!
//! YAML-serializable configuration for an optimization run: batch size,
//! the opaque structural parameter handed to the basis generator, the
//! error model, gradient-descent tuning, and the diagnostics switches.
//! Every invalid-configuration condition fails fast here, before any
//! iteration runs.
//!
//! ## Example Configuration
//!
//! ```yaml
//! batch_size: 4
//! structural: 3
//! error_model:
//!   kind: log
//!   base: 10.0
//! step_size: 0.5
//! momentum: 0.9
//! tolerance: 1.0e-5
//! max_iterations: 1000
//! diagnostics:
//!   enabled: true
//!   export_path: "frames/run.yaml"
//! ```
//!
//! ## Example
//!
//! ```rust
//! use pcfm_core::config::RunConfig;
//!
//! let config = RunConfig::default();
//! assert_eq!(config.max_iterations, 1000);
//! assert!(config.validate().is_ok());
//!
//! let yaml = config.to_yaml().unwrap();
//! let parsed = RunConfig::from_yaml(&yaml).unwrap();
//! assert_eq!(parsed.batch_size, config.batch_size);
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::objective::ErrorModel;
use crate::types::{DesignError, DesignResult};

/// Error type for configuration file operations.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Failed to read the configuration file
    ReadError(String),
    /// Failed to parse the configuration
    ParseError(String),
    /// Configuration parsed but failed validation
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(msg) => write!(f, "failed to read config: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "failed to parse config: {}", msg),
            ConfigError::ValidationError(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Diagnostics side-channel switches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Emit per-iteration snapshots to the attached sink.
    pub enabled: bool,
    /// Destination a sink may export frames to. Purely advisory; the
    /// optimizer never writes it.
    pub export_path: Option<PathBuf>,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            export_path: None,
        }
    }
}

/// Configuration for one optimization run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    /// Number of waveforms optimized in parallel columns.
    pub batch_size: usize,
    /// Opaque structural parameter forwarded to the basis generator.
    pub structural: usize,
    /// Spectral mismatch model.
    pub error_model: ErrorModel,
    /// Gradient step size μ.
    pub step_size: f64,
    /// Heavy-ball momentum factor β.
    pub momentum: f64,
    /// Convergence tolerance on the step difference.
    pub tolerance: f64,
    /// Iteration budget.
    pub max_iterations: usize,
    /// Diagnostics side channel.
    pub diagnostics: DiagnosticsConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            structural: 1,
            error_model: ErrorModel::default(),
            step_size: 0.5,
            momentum: 0.9,
            tolerance: 1e-5,
            max_iterations: 1000,
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

impl RunConfig {
    /// Fail-fast validation of every tunable.
    pub fn validate(&self) -> DesignResult<()> {
        if self.batch_size == 0 {
            return Err(DesignError::ShapeMismatch {
                context: "batch size",
                expected: 1,
                actual: 0,
            });
        }
        self.error_model.validate()?;
        if !self.step_size.is_finite() || self.step_size <= 0.0 {
            return Err(DesignError::InvalidStepSize(self.step_size));
        }
        if !self.momentum.is_finite() || self.momentum < 0.0 {
            return Err(DesignError::InvalidMomentum(self.momentum));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(DesignError::InvalidTolerance(self.tolerance));
        }
        if self.max_iterations == 0 {
            return Err(DesignError::InvalidIterationBudget(self.max_iterations));
        }
        Ok(())
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: RunConfig =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        Ok(config)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load and validate a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    /// Write the configuration to a YAML file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_yaml()?;
        std::fs::write(path, content)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(RunConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_tolerance() {
        let config = RunConfig {
            tolerance: 0.0,
            ..RunConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DesignError::InvalidTolerance(_))
        ));
    }

    #[test]
    fn test_rejects_zero_iterations() {
        let config = RunConfig {
            max_iterations: 0,
            ..RunConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DesignError::InvalidIterationBudget(0))
        ));
    }

    #[test]
    fn test_rejects_zero_batch() {
        let config = RunConfig {
            batch_size: 0,
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_log_base() {
        let config = RunConfig {
            error_model: ErrorModel::Log { base: 1.0 },
            ..RunConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DesignError::InvalidLogBase(_))
        ));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = RunConfig {
            batch_size: 4,
            error_model: ErrorModel::Log { base: 10.0 },
            diagnostics: DiagnosticsConfig {
                enabled: true,
                export_path: Some(PathBuf::from("frames/run.yaml")),
            },
            ..RunConfig::default()
        };
        let yaml = config.to_yaml().unwrap();
        let parsed = RunConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let parsed = RunConfig::from_yaml("max_iterations: 50\n").unwrap();
        assert_eq!(parsed.max_iterations, 50);
        assert_eq!(parsed.batch_size, 1);
        assert!((parsed.step_size - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_yaml_rejected() {
        let result = RunConfig::from_yaml("max_iterations: 0\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
