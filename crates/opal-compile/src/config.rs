//! Compiler configuration.
//!
//! Supports loading configuration from:
//! 1. Configuration files (YAML)
//! 2. Environment variables (with OPAL_ prefix)
//!
//! Configuration precedence (highest to lowest):
//! 1. Environment variables
//! 2. Configuration file
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Bounds and switches for a canonicalization run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Iteration bound of every fixed-point combinator.
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,

    /// Step bound of every flow graph execution.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Check Hilbert-space consistency before rewriting.
    #[serde(default = "default_true")]
    pub verify_input: bool,
}

fn default_max_iter() -> usize {
    1000
}

fn default_max_steps() -> usize {
    10_000
}

fn default_true() -> bool {
    true
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_iter: default_max_iter(),
            max_steps: default_max_steps(),
            verify_input: default_true(),
        }
    }
}

impl CompilerConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML document.
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: CompilerConfig = serde_yaml_ng::from_str(contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env()
    }

    /// Override fields with environment variables that are set.
    ///
    /// Variables that are absent leave the corresponding fields unchanged; a
    /// variable that is set but unparsable is an error.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(v) = lookup("OPAL_MAX_ITER") {
            self.max_iter = parse_var("OPAL_MAX_ITER", &v)?;
        }
        if let Some(v) = lookup("OPAL_MAX_STEPS") {
            self.max_steps = parse_var("OPAL_MAX_STEPS", &v)?;
        }
        if let Some(v) = lookup("OPAL_VERIFY_INPUT") {
            self.verify_input = parse_var("OPAL_VERIFY_INPUT", &v)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Load with file (if any) then environment overrides.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iter == 0 {
            return Err(ConfigError::ValidationError(
                "max_iter must be at least 1".to_string(),
            ));
        }
        if self.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "max_steps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<V: std::str::FromStr>(key: &str, value: &str) -> Result<V, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::ParseError(format!("{key}={value}")))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert_eq!(config.max_iter, 1000);
        assert_eq!(config.max_steps, 10_000);
        assert!(config.verify_input);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_partial() {
        let config = CompilerConfig::from_yaml("max_iter: 50\n").unwrap();
        assert_eq!(config.max_iter, 50);
        assert_eq!(config.max_steps, 10_000);
    }

    #[test]
    fn test_yaml_zero_rejected() {
        assert!(matches!(
            CompilerConfig::from_yaml("max_steps: 0\n"),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let config = CompilerConfig::default()
            .apply_vars(|key| match key {
                "OPAL_MAX_ITER" => Some("7".into()),
                "OPAL_VERIFY_INPUT" => Some("false".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.max_iter, 7);
        assert!(!config.verify_input);
        assert_eq!(config.max_steps, 10_000);
    }

    #[test]
    fn test_env_unparsable() {
        let result = CompilerConfig::default().apply_vars(|key| {
            (key == "OPAL_MAX_STEPS").then(|| "many".to_string())
        });
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
