//! Configuration
//!
//! A single [`AnalysisConfig`] drives every analysis of a run. Defaults
//! match the bounds the analysis was tuned with; YAML files (`version: 1`)
//! override any subset of fields.

pub mod analysis_config;
pub mod error;

pub use analysis_config::{AnalysisConfig, CONFIG_VERSION};
pub use error::{ConfigError, ConfigResult};
