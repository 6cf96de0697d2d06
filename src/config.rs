use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{CodeContextError, Result};

pub const CONFIG_FILE: &str = "config.toml";
pub const OUTPUT_DIR: &str = ".codecontext";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub cache: CacheConfig,
    pub mining: MiningConfig,
    pub neighborhood: NeighborhoodConfig,
    pub weights: ScoringWeights,
    pub include_tests: bool,
    pub include_docs: bool,
    pub include_configs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub directory: PathBuf,
    pub max_size: usize,
    pub ttl_secs: u64,
    pub enable_lru: bool,
    pub enable_metrics: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MiningConfig {
    pub min_support: f64,
    pub min_confidence: f64,
    pub period_days: u32,
    /// Cap on unique file pairs before the miner subsamples commits.
    pub max_pairs: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NeighborhoodConfig {
    pub min_combined_score: f64,
    pub max_neighborhood_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringWeights {
    pub git: f64,
    pub dependencies: f64,
    pub structural: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            mining: MiningConfig::default(),
            neighborhood: NeighborhoodConfig::default(),
            weights: ScoringWeights::default(),
            include_tests: true,
            include_docs: false,
            include_configs: true,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(OUTPUT_DIR).join("cache"),
            max_size: 1000,
            ttl_secs: 24 * 60 * 60,
            enable_lru: true,
            enable_metrics: true,
        }
    }
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            min_support: 0.05,
            min_confidence: 0.30,
            period_days: 30,
            max_pairs: 100_000,
        }
    }
}

impl Default for NeighborhoodConfig {
    fn default() -> Self {
        Self {
            min_combined_score: 0.4,
            max_neighborhood_size: 15,
        }
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            git: 0.6,
            dependencies: 0.3,
            structural: 0.1,
        }
    }
}

impl Config {
    /// Loads `.codecontext/config.toml` under `root`, falling back to
    /// defaults when absent. Validation runs before any analysis starts.
    pub async fn load(root: &Path) -> Result<Self> {
        let path = root.join(OUTPUT_DIR).join(CONFIG_FILE);

        let config = match tokio::fs::read_to_string(&path).await {
            Ok(content) => toml::from_str::<Config>(&content)
                .map_err(|e| CodeContextError::Config(format!("{}: {}", path.display(), e)))?,
            Err(_) => Config::default(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.mining.min_support) {
            return Err(CodeContextError::Config(format!(
                "mining.min_support must be in [0, 1], got {}",
                self.mining.min_support
            )));
        }
        if !(0.0..=1.0).contains(&self.mining.min_confidence) {
            return Err(CodeContextError::Config(format!(
                "mining.min_confidence must be in [0, 1], got {}",
                self.mining.min_confidence
            )));
        }
        if self.mining.period_days == 0 {
            return Err(CodeContextError::Config(
                "mining.period_days must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.neighborhood.min_combined_score) {
            return Err(CodeContextError::Config(format!(
                "neighborhood.min_combined_score must be in [0, 1], got {}",
                self.neighborhood.min_combined_score
            )));
        }
        if self.neighborhood.max_neighborhood_size == 0 {
            return Err(CodeContextError::Config(
                "neighborhood.max_neighborhood_size must be at least 1".into(),
            ));
        }
        if self.cache.max_size == 0 {
            return Err(CodeContextError::Config(
                "cache.max_size must be at least 1".into(),
            ));
        }
        for (name, value) in [
            ("weights.git", self.weights.git),
            ("weights.dependencies", self.weights.dependencies),
            ("weights.structural", self.weights.structural),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(CodeContextError::Config(format!(
                    "{} must be in [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.weights.git + self.weights.dependencies + self.weights.structural <= 0.0 {
            return Err(CodeContextError::Config(
                "at least one scoring weight must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn cache_directory(&self, root: &Path) -> PathBuf {
        if self.cache.directory.is_absolute() {
            self.cache.directory.clone()
        } else {
            root.join(&self.cache.directory)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.cache.max_size, 1000);
        assert_eq!(config.cache.ttl_secs, 24 * 60 * 60);
        assert!(config.cache.enable_lru);
        assert!((config.mining.min_support - 0.05).abs() < f64::EPSILON);
        assert!((config.mining.min_confidence - 0.30).abs() < f64::EPSILON);
        assert_eq!(config.mining.period_days, 30);
        assert!((config.neighborhood.min_combined_score - 0.4).abs() < f64::EPSILON);
        assert_eq!(config.neighborhood.max_neighborhood_size, 15);
        assert!((config.weights.git - 0.6).abs() < f64::EPSILON);
        assert!((config.weights.dependencies - 0.3).abs() < f64::EPSILON);
        assert!((config.weights.structural - 0.1).abs() < f64::EPSILON);
        config.validate().expect("defaults must validate");
    }

    #[test]
    fn rejects_out_of_range_support() {
        let mut config = Config::default();
        config.mining.min_support = 1.5;
        assert!(matches!(
            config.validate(),
            Err(CodeContextError::Config(_))
        ));
    }

    #[test]
    fn rejects_zero_weights() {
        let mut config = Config::default();
        config.weights = ScoringWeights {
            git: 0.0,
            dependencies: 0.0,
            structural: 0.0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [mining]
            min_support = 0.1

            [weights]
            git = 0.5
            "#,
        )
        .expect("partial config parses");
        assert!((parsed.mining.min_support - 0.1).abs() < f64::EPSILON);
        assert_eq!(parsed.mining.period_days, 30);
        assert!((parsed.weights.git - 0.5).abs() < f64::EPSILON);
    }
}
