use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{NewsrecError, Result};


pub const ENV_PREFIX: &str = "NEWSREC";


/// Blend parameters for `recommend_for_user`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendConfig {
    pub alpha: f64,
    pub beta: f64,
    pub recent_days: u32,
    pub candidate_limit: usize,
    pub history_limit: usize,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            beta: 0.05,
            recent_days: 14,
            candidate_limit: 1000,
            history_limit: 20,
        }
    }
}

impl RecommendConfig {
    pub fn tau_hours(&self) -> f64 {
        (f64::from(self.recent_days) * 24.0).max(1.0)
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub max_articles: usize,
    pub batch_size: usize,
    pub default_top_k: usize,
    pub max_top_k: usize,
    pub default_neighbor_k: usize,
    pub max_neighbor_k: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_articles: 1000,
            batch_size: 200,
            default_top_k: 3,
            max_top_k: 10,
            default_neighbor_k: 5,
            max_neighbor_k: 20,
        }
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterestConfig {
    /// Saturation cap for a single user-tag weight.
    pub max_weight: f64,
    /// Weight given to tags the user picks explicitly.
    pub initial_weight: f64,
    /// Increment per VIEW/CLICK, scaled by the article's annotation weight.
    pub event_increment: f64,
}

impl Default for InterestConfig {
    fn default() -> Self {
        Self {
            max_weight: 2.0,
            initial_weight: 0.5,
            event_increment: 0.1,
        }
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggingConfig {
    pub rules_path: Option<PathBuf>,
    pub auto_tag_top_k: usize,
    pub min_auto_weight: f64,
}

impl Default for TaggingConfig {
    fn default() -> Self {
        Self {
            rules_path: None,
            auto_tag_top_k: 3,
            min_auto_weight: 0.1,
        }
    }
}


#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub reco: RecommendConfig,
    pub classifier: ClassifierConfig,
    pub interest: InterestConfig,
    pub tagging: TaggingConfig,
}

impl EngineConfig {
    /// Layers defaults, an optional config file and `NEWSREC__*` env vars.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let loaded: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        loaded.validate()?;
        Ok(loaded)
    }

    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.reco.alpha) {
            return Err(NewsrecError::Config(format!(
                "reco.alpha must be within [0, 1], got {}",
                self.reco.alpha
            )));
        }
        if self.reco.beta < 0.0 {
            return Err(NewsrecError::Config(format!(
                "reco.beta must be non-negative, got {}",
                self.reco.beta
            )));
        }
        if self.reco.candidate_limit == 0 || self.reco.history_limit == 0 {
            return Err(NewsrecError::Config(
                "reco.candidate_limit and reco.history_limit must be positive".to_string(),
            ));
        }
        if self.classifier.max_articles == 0 || self.classifier.batch_size == 0 {
            return Err(NewsrecError::Config(
                "classifier.max_articles and classifier.batch_size must be positive".to_string(),
            ));
        }
        if self.classifier.max_top_k == 0 || self.classifier.max_neighbor_k == 0 {
            return Err(NewsrecError::Config(
                "classifier caps must be positive".to_string(),
            ));
        }
        if self.interest.max_weight <= 0.0 {
            return Err(NewsrecError::Config(format!(
                "interest.max_weight must be positive, got {}",
                self.interest.max_weight
            )));
        }
        if !(0.0..=self.interest.max_weight).contains(&self.interest.initial_weight) {
            return Err(NewsrecError::Config(format!(
                "interest.initial_weight must be within [0, {}], got {}",
                self.interest.max_weight, self.interest.initial_weight
            )));
        }
        if self.interest.event_increment < 0.0 {
            return Err(NewsrecError::Config(format!(
                "interest.event_increment must be non-negative, got {}",
                self.interest.event_increment
            )));
        }
        if !(0.0..=1.0).contains(&self.tagging.min_auto_weight) {
            return Err(NewsrecError::Config(format!(
                "tagging.min_auto_weight must be within [0, 1], got {}",
                self.tagging.min_auto_weight
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.reco.alpha, 0.5);
        assert_eq!(config.reco.beta, 0.05);
        assert_eq!(config.reco.recent_days, 14);
        assert_eq!(config.reco.candidate_limit, 1000);
        assert_eq!(config.classifier.default_neighbor_k, 5);
        assert_eq!(config.classifier.max_neighbor_k, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tau_hours_floor() {
        let mut reco = RecommendConfig::default();
        assert_eq!(reco.tau_hours(), 14.0 * 24.0);
        reco.recent_days = 0;
        assert_eq!(reco.tau_hours(), 1.0);
    }

    #[test]
    fn test_validate_rejects_alpha_out_of_range() {
        let mut config = EngineConfig::default();
        config.reco.alpha = 1.5;
        assert!(matches!(config.validate(), Err(NewsrecError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_interest_weights_outside_cap() {
        let mut config = EngineConfig::default();
        config.interest.initial_weight = 5.0;
        assert!(matches!(config.validate(), Err(NewsrecError::Config(_))));

        config.interest.initial_weight = -0.1;
        assert!(matches!(config.validate(), Err(NewsrecError::Config(_))));

        let mut config = EngineConfig::default();
        config.interest.event_increment = -0.1;
        assert!(matches!(config.validate(), Err(NewsrecError::Config(_))));
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = EngineConfig::load(None).unwrap();
        assert_eq!(config.classifier.batch_size, 200);
        assert_eq!(config.interest.max_weight, 2.0);
    }
}
