//! Define conversion configuration
//! Provide mechanism to load it from Toml-file, with environment overrides

use std::path::Path;

use crate::error::{ConversionError, Result};

/// Environment variable overriding [`ConversionConfig::workers`]
pub const WORKERS_ENV: &str = "ZK_CONVERT_WORKERS";
/// Environment variable overriding [`ConversionConfig::amortize_inversions`]
pub const AMORTIZE_INVERSIONS_ENV: &str = "ZK_CONVERT_AMORTIZE_INVERSIONS";

fn default_workers() -> usize {
    rayon::current_num_threads()
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Number of workers a batch is split over. `0` and `1` both mean sequential
    pub workers: usize,

    /// Normalize device points with one inversion per worker chunk instead of one per point
    pub amortize_inversions: bool,

    /// Memory available to the simulated accelerator, in bytes. `None` means unbounded
    pub device_memory_limit: Option<usize>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            amortize_inversions: false,
            device_memory_limit: None,
        }
    }
}

impl ConversionConfig {
    pub fn sequential() -> Self {
        Self {
            workers: 1,
            ..Self::default()
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_amortized_inversions(mut self, amortize: bool) -> Self {
        self.amortize_inversions = amortize;
        self
    }

    pub fn with_device_memory_limit(mut self, limit: Option<usize>) -> Self {
        self.device_memory_limit = limit;
        self
    }

    /// Provide Serde mechanisms from TOML string
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|err| ConversionError::Config(format!("Toml error: {err}")))
    }

    /// Provide Serde mechanisms from TOML file
    pub fn from_toml(file: impl AsRef<Path>) -> Result<Self> {
        let file = file.as_ref();
        let file_str = std::fs::read_to_string(file)
            .map_err(|err| ConversionError::Config(format!("`{}`: {err}", file.display())))?;

        Self::from_toml_str(&file_str).map_err(|err| match err {
            ConversionError::Config(msg) => {
                ConversionError::Config(format!("{msg} in `{}`", file.display()))
            }
            other => other,
        })
    }

    /// Applies the `ZK_CONVERT_*` environment variables on top of `self`
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = lookup(WORKERS_ENV) {
            self.workers = value.trim().parse().map_err(|err| {
                ConversionError::Config(format!("{WORKERS_ENV}=`{value}`: {err}"))
            })?;
            tracing::debug!(workers = self.workers, "workers overridden from environment");
        }

        if let Some(value) = lookup(AMORTIZE_INVERSIONS_ENV) {
            self.amortize_inversions = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConversionError::Config(format!(
                        "{AMORTIZE_INVERSIONS_ENV}=`{value}`: expected a boolean"
                    )))
                }
            };
            tracing::debug!(
                amortize_inversions = self.amortize_inversions,
                "inversion amortization overridden from environment"
            );
        }

        Ok(self)
    }
}
