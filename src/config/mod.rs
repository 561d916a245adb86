//! Binary configuration

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::cli::CliOptions;

const DEFAULT_LOG_FILTER: &str = "modelql=info";

/// Configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Model file to compile (JSON array or id-to-model map)
    pub models_path: Option<PathBuf>,

    /// Where to write the SDL; stdout when unset
    pub output_path: Option<PathBuf>,

    /// Echoed by the `modelsVersionId` root field
    pub models_version_id: Option<String>,

    /// `tracing_subscriber::EnvFilter` directive
    pub log_filter: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let log_filter = non_empty("MODELQL_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        tracing_subscriber::EnvFilter::try_new(&log_filter)
            .with_context(|| format!("MODELQL_LOG is not a valid filter: {log_filter}"))?;

        Ok(Self {
            models_path: non_empty("MODELQL_MODELS").map(PathBuf::from),
            output_path: non_empty("MODELQL_OUTPUT").map(PathBuf::from),
            models_version_id: non_empty("MODELQL_MODELS_VERSION_ID"),
            log_filter,
        })
    }

    /// Command-line options take precedence over the environment
    pub fn with_cli(mut self, options: CliOptions) -> Self {
        if let Some(path) = options.models_path {
            self.models_path = Some(path);
        }
        if let Some(path) = options.output_path {
            self.output_path = Some(path);
        }
        if let Some(id) = options.models_version_id {
            self.models_version_id = Some(id);
        }
        self
    }

    pub fn require_models_path(&self) -> Result<&PathBuf> {
        self.models_path
            .as_ref()
            .context("No model file given: pass --models or set MODELQL_MODELS")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.models_path, None);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert!(config.require_models_path().is_err());
    }

    #[test]
    fn test_reads_variables() {
        let config = Config::from_lookup(lookup(&[
            ("MODELQL_MODELS", "models.json"),
            ("MODELQL_OUTPUT", ""),
            ("MODELQL_MODELS_VERSION_ID", "v7"),
            ("MODELQL_LOG", "modelql=debug"),
        ]))
        .unwrap();
        assert_eq!(config.models_path, Some(PathBuf::from("models.json")));
        assert_eq!(config.output_path, None);
        assert_eq!(config.models_version_id.as_deref(), Some("v7"));
        assert_eq!(config.log_filter, "modelql=debug");
    }

    #[test]
    fn test_rejects_bad_log_filter() {
        assert!(Config::from_lookup(lookup(&[("MODELQL_LOG", "modelql=loud")])).is_err());
    }

    #[test]
    fn test_cli_overrides_env() {
        let config = Config::from_lookup(lookup(&[("MODELQL_MODELS", "env.json")]))
            .unwrap()
            .with_cli(CliOptions::parse(["--models", "cli.json", "--version-id=v2"].map(String::from)));
        assert_eq!(config.models_path, Some(PathBuf::from("cli.json")));
        assert_eq!(config.models_version_id.as_deref(), Some("v2"));
    }
}
