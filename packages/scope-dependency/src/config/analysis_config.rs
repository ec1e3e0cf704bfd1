//! Analysis configuration
//!
//! Bounds and switches of the dependency analysis, loadable from a
//! versioned YAML file:
//!
//! ```yaml
//! version: 1
//! interprocedural: true
//! max_stack_depth: 100
//! max_block_retries: 5
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{ConfigError, ConfigResult};

pub const CONFIG_VERSION: u64 = 1;

const DEFAULT_MAX_STACK_DEPTH: usize = 100;
const DEFAULT_MAX_BLOCK_RETRIES: usize = 5;
const DEFAULT_MAX_FIXPOINT_ITERATIONS: usize = 10_000;
const DEFAULT_CFG_CACHE_CAPACITY: usize = 1024;
const DEFAULT_SCOPE_NAMESPACE: &str = "ScopeRuntime";

const FIELDS: &[&str] = &[
    "version",
    "interprocedural",
    "max_stack_depth",
    "max_block_retries",
    "max_fixpoint_iterations",
    "cfg_cache_capacity",
    "scope_namespace",
    "pure_type_whitelist",
];

fn default_true() -> bool {
    true
}
fn default_max_stack_depth() -> usize {
    DEFAULT_MAX_STACK_DEPTH
}
fn default_max_block_retries() -> usize {
    DEFAULT_MAX_BLOCK_RETRIES
}
fn default_max_fixpoint_iterations() -> usize {
    DEFAULT_MAX_FIXPOINT_ITERATIONS
}
fn default_cfg_cache_capacity() -> usize {
    DEFAULT_CFG_CACHE_CAPACITY
}
fn default_scope_namespace() -> String {
    DEFAULT_SCOPE_NAMESPACE.to_string()
}
fn default_pure_type_whitelist() -> Vec<String> {
    vec![
        "System.Convert".to_string(),
        "System.String".to_string(),
        "System.Text.Encoding".to_string(),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Analyze resolved callees instead of treating every escalated call
    /// as not analyzable
    #[serde(default = "default_true")]
    pub interprocedural: bool,

    /// Maximum interprocedural call depth (1..=10000)
    #[serde(default = "default_max_stack_depth")]
    pub max_stack_depth: usize,

    /// Visits of a block that may be skipped while schema or table
    /// information is missing (1..=100)
    #[serde(default = "default_max_block_retries")]
    pub max_block_retries: usize,

    /// Worklist bound of every fixed point (100..=10000000)
    #[serde(default = "default_max_fixpoint_iterations")]
    pub max_fixpoint_iterations: usize,

    /// Callee CFGs kept by the interprocedural manager (1..=1000000)
    #[serde(default = "default_cfg_cache_capacity")]
    pub cfg_cache_capacity: usize,

    /// Namespace of the row runtime types (`Row`, `RowSet`, ...)
    #[serde(default = "default_scope_namespace")]
    pub scope_namespace: String,

    /// Types whose methods are all pure
    #[serde(default = "default_pure_type_whitelist")]
    pub pure_type_whitelist: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            interprocedural: true,
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
            max_block_retries: DEFAULT_MAX_BLOCK_RETRIES,
            max_fixpoint_iterations: DEFAULT_MAX_FIXPOINT_ITERATIONS,
            cfg_cache_capacity: DEFAULT_CFG_CACHE_CAPACITY,
            scope_namespace: default_scope_namespace(),
            pure_type_whitelist: default_pure_type_whitelist(),
        }
    }
}

/// On-disk form: the config plus its schema version
#[derive(Serialize)]
struct VersionedConfig<'a> {
    version: u64,
    #[serde(flatten)]
    config: &'a AnalysisConfig,
}

impl AnalysisConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interprocedural(mut self, enabled: bool) -> Self {
        self.interprocedural = enabled;
        self
    }

    pub fn max_stack_depth(mut self, depth: usize) -> Self {
        self.max_stack_depth = depth;
        self
    }

    pub fn max_block_retries(mut self, retries: usize) -> Self {
        self.max_block_retries = retries;
        self
    }

    pub fn max_fixpoint_iterations(mut self, iterations: usize) -> Self {
        self.max_fixpoint_iterations = iterations;
        self
    }

    pub fn cfg_cache_capacity(mut self, capacity: usize) -> Self {
        self.cfg_cache_capacity = capacity;
        self
    }

    pub fn scope_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.scope_namespace = namespace.into();
        self
    }

    pub fn pure_type(mut self, full_name: impl Into<String>) -> Self {
        self.pure_type_whitelist.push(full_name.into());
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_stack_depth == 0 || self.max_stack_depth > 10_000 {
            return Err(ConfigError::range_with_hint(
                "max_stack_depth",
                self.max_stack_depth,
                1,
                10_000,
                "Call depth must allow at least the analyzed method",
            ));
        }

        if self.max_block_retries == 0 || self.max_block_retries > 100 {
            return Err(ConfigError::range_with_hint(
                "max_block_retries",
                self.max_block_retries,
                1,
                100,
                "Blocks waiting for schema information need at least one retry",
            ));
        }

        if self.max_fixpoint_iterations < 100 || self.max_fixpoint_iterations > 10_000_000 {
            return Err(ConfigError::range_with_hint(
                "max_fixpoint_iterations",
                self.max_fixpoint_iterations,
                100,
                10_000_000,
                "Fixed points must be bounded but loops need room to converge",
            ));
        }

        if self.cfg_cache_capacity == 0 || self.cfg_cache_capacity > 1_000_000 {
            return Err(ConfigError::range_with_hint(
                "cfg_cache_capacity",
                self.cfg_cache_capacity,
                1,
                1_000_000,
                "The CFG cache needs room for at least one callee",
            ));
        }

        if self.scope_namespace.trim().is_empty() {
            return Err(ConfigError::Validation(
                "scope_namespace must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate a versioned YAML document
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let mut document: serde_yaml::Mapping = serde_yaml::from_str(content)?;

        let version = document
            .remove("version")
            .ok_or(ConfigError::MissingVersion)?
            .as_u64()
            .ok_or_else(|| ConfigError::Validation("'version' must be a positive integer".to_string()))?;
        if version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: version,
                supported: vec![CONFIG_VERSION],
            });
        }

        for key in document.keys() {
            let name = key.as_str().unwrap_or_default();
            if !FIELDS.contains(&name) {
                return Err(ConfigError::unknown_field(name, FIELDS));
            }
        }

        let config: AnalysisConfig = serde_yaml::from_value(serde_yaml::Value::Mapping(document))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        let versioned = VersionedConfig {
            version: CONFIG_VERSION,
            config: self,
        };
        Ok(serde_yaml::to_string(&versioned)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_block_retries, 5);
        assert_eq!(config.max_stack_depth, 100);
        assert!(config.interprocedural);
    }

    #[test]
    fn test_builder() {
        let config = AnalysisConfig::new()
            .interprocedural(false)
            .max_stack_depth(8)
            .pure_type("Demo.Math");
        assert!(!config.interprocedural);
        assert_eq!(config.max_stack_depth, 8);
        assert!(config.pure_type_whitelist.iter().any(|t| t == "Demo.Math"));
    }

    #[test]
    fn test_validate_rejects_zero_retries() {
        let err = AnalysisConfig::new().max_block_retries(0).validate().unwrap_err();
        assert!(matches!(err, ConfigError::Range { ref field, .. } if field == "max_block_retries"));
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = AnalysisConfig::new().max_stack_depth(12);
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("version: 1"));
        assert!(yaml.contains("max_stack_depth: 12"));
        assert_eq!(AnalysisConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn test_yaml_partial_uses_defaults() {
        let config = AnalysisConfig::from_yaml_str("version: 1\ninterprocedural: false\n").unwrap();
        assert!(!config.interprocedural);
        assert_eq!(config.max_block_retries, 5);
        assert_eq!(config.scope_namespace, "ScopeRuntime");
    }

    #[test]
    fn test_yaml_missing_version() {
        let err = AnalysisConfig::from_yaml_str("interprocedural: true\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingVersion));
    }

    #[test]
    fn test_yaml_unsupported_version() {
        let err = AnalysisConfig::from_yaml_str("version: 2\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedVersion { found: 2, .. }));
    }

    #[test]
    fn test_yaml_unknown_field_suggestion() {
        let err = AnalysisConfig::from_yaml_str("version: 1\nmax_stak_depth: 3\n").unwrap_err();
        assert!(err.to_string().contains("max_stack_depth"));
    }

    #[test]
    fn test_yaml_out_of_range() {
        let err = AnalysisConfig::from_yaml_str("version: 1\nmax_stack_depth: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Range { .. }));
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "version: 1\nmax_block_retries: 3\nscope_namespace: Custom.Runtime").unwrap();
        let config = AnalysisConfig::from_yaml(file.path()).unwrap();
        assert_eq!(config.max_block_retries, 3);
        assert_eq!(config.scope_namespace, "Custom.Runtime");
    }
}
