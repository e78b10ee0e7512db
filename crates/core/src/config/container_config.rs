//! Container configuration
//!
//! Tunables for the host container and the lazy-proxy engine. Values come
//! from defaults, environment variables or a YAML/JSON document.

use std::collections::HashMap;
use std::env;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Environment variable overriding [`ContainerConfig::max_resolution_depth`]
pub const MAX_RESOLUTION_DEPTH_ENV: &str = "LAZYPROXY_MAX_RESOLUTION_DEPTH";

/// Environment variable overriding [`ContainerConfig::trace_realization`]
pub const TRACE_REALIZATION_ENV: &str = "LAZYPROXY_TRACE_REALIZATION";

const DEFAULT_MAX_RESOLUTION_DEPTH: usize = 64;

/// Where a configuration value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Value loaded from environment variable
    EnvVar(String),
    /// Default value used
    Default,
    /// Value parsed from a YAML or JSON document
    Document,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::EnvVar(var) => write!(f, "Environment variable: {}", var),
            ConfigSource::Default => write!(f, "Default value"),
            ConfigSource::Document => write!(f, "Configuration document"),
        }
    }
}

/// Host container configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Deepest eager construction chain allowed before resolution is aborted
    pub max_resolution_depth: usize,
    /// Emit `debug` events when a proxy realizes its target
    pub trace_realization: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            max_resolution_depth: DEFAULT_MAX_RESOLUTION_DEPTH,
            trace_realization: false,
        }
    }
}

impl ContainerConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(depth) = env::var(MAX_RESOLUTION_DEPTH_ENV) {
            config.max_resolution_depth = depth.parse().map_err(|_| {
                ConfigError::invalid_value(
                    "max_resolution_depth",
                    depth.clone(),
                    "positive integer",
                )
            })?;
        }

        if let Ok(trace) = env::var(TRACE_REALIZATION_ENV) {
            config.trace_realization = parse_flag(&trace).ok_or_else(|| {
                ConfigError::invalid_value("trace_realization", trace.clone(), "true or false")
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML document
    pub fn from_yaml_str(document: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON document
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_resolution_depth == 0 {
            return Err(ConfigError::validation_failed(
                "max_resolution_depth must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Report where each value would be taken from in [`ContainerConfig::from_env`]
    pub fn config_sources() -> HashMap<String, ConfigSource> {
        let mut sources = HashMap::new();
        for (field, var) in [
            ("max_resolution_depth", MAX_RESOLUTION_DEPTH_ENV),
            ("trace_realization", TRACE_REALIZATION_ENV),
        ] {
            let source = if env::var(var).is_ok() {
                ConfigSource::EnvVar(var.to_string())
            } else {
                ConfigSource::Default
            };
            sources.insert(field.to_string(), source);
        }
        sources
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
