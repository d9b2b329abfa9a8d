
pub mod config;
pub mod error;

pub use config::{
    ClassifierConfig, EngineConfig, InterestConfig, RecommendConfig, TaggingConfig,
};
pub use error::{NewsrecError, Result};
