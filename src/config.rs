//! Fuzzer configuration (ambient stack, modeled on the teacher's
//! `NeurlangConfig`): a TOML-backed struct carrying every tunable named
//! in spec §4.5/§4.7/§4.6/§4.9 so none of it lives in process-wide
//! mutable state (spec §9, "Global tunables").

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config file not found: {0}")]
    NotFound(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzerConfig {
    pub mutation: MutationConfig,
    pub bandit: BanditConfig,
    pub runtime_assisted: RuntimeAssistedConfig,
}

impl FuzzerConfig {
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: FuzzerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn load_from_cwd() -> ConfigResult<Self> {
        let cwd = std::env::current_dir().map_err(ConfigError::Io)?;
        Self::find_and_load(&cwd)
    }

    pub fn find_and_load(start_dir: &Path) -> ConfigResult<Self> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let config_path = dir.join("fuzzilli.toml");
            if config_path.exists() {
                return Self::load(&config_path);
            }
            if !dir.pop() {
                return Ok(FuzzerConfig::default());
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    pub default_max_simultaneous_mutations: usize,
    pub default_code_generation_amount: usize,
    pub min_budget_for_recursive_code_generation: usize,
    /// Bounded number of splice-candidate attempts before giving up
    /// (spec §4.5 splicing algorithm step 1).
    pub max_splice_attempts: usize,
}

impl Default for MutationConfig {
    fn default() -> Self {
        MutationConfig {
            default_max_simultaneous_mutations: 1,
            default_code_generation_amount: 5,
            min_budget_for_recursive_code_generation: 5,
            max_splice_attempts: 16,
        }
    }
}

/// Exp3.1 bandit tunables (spec §4.6). Numeric values are the Open
/// Question's resolution, recorded in DESIGN.md: the spec fixes the
/// functional form but leaves tuning to implementers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BanditConfig {
    pub gamma: f64,
    pub restart_after_iterations: u64,
}

impl Default for BanditConfig {
    fn default() -> Self {
        BanditConfig { gamma: 0.1, restart_after_iterations: 10_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeAssistedConfig {
    pub timeout_multiplier: u32,
    pub max_instrumentation_points: usize,
}

impl Default for RuntimeAssistedConfig {
    fn default() -> Self {
        RuntimeAssistedConfig { timeout_multiplier: 2, max_instrumentation_points: 8 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_tunables() {
        let c = FuzzerConfig::default();
        assert_eq!(c.mutation.default_max_simultaneous_mutations, 1);
        assert_eq!(c.runtime_assisted.timeout_multiplier, 2);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = FuzzerConfig::load(Path::new("/nonexistent/fuzzilli.toml"));
        assert!(matches!(err, Err(ConfigError::NotFound(_))));
    }
}
