//! Configuration types for FilterEngine

use crate::error::{Result, SdkError};
use efilter_core::{FilterType, HandlerKind, OperandCatalog};
use efilter_runtime::{FilterTypeRegistry, DEFAULT_MAX_DEPTH};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main engine configuration
///
/// ```yaml
/// max_depth: 16
/// filter_id_prefix: userfilter
/// system_filter_files:
///   - filters/contacts.yaml
/// filter_types:
///   - id: reporting
///     handlers: [5, 6, 20, 21]
///     operands: [__currentuser__]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bound on sub-filter nesting for graph traversals and evaluation
    pub max_depth: usize,

    /// Prefix of generated filter ids
    pub filter_id_prefix: String,

    /// Installed filters loaded when the engine is built
    pub system_filter_files: Vec<PathBuf>,

    /// Extra filter types on top of regular and credentials
    pub filter_types: Vec<FilterTypeConfig>,
}

impl EngineConfig {
    /// Create a new engine configuration
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            filter_id_prefix: "userfilter".to_string(),
            system_filter_files: Vec::new(),
            filter_types: Vec::new(),
        }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = serde_yaml::from_str(content)
            .map_err(|e| SdkError::ConfigError(format!("invalid engine config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file; relative filter file paths are resolved
    /// against the config file's directory
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str(&content)?;
        if let Some(base) = path.parent() {
            for file in &mut config.system_filter_files {
                if file.is_relative() {
                    *file = base.join(&*file);
                }
            }
        }
        Ok(config)
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_filter_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.filter_id_prefix = prefix.into();
        self
    }

    /// Add a system filter file
    pub fn with_system_filter_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.system_filter_files.push(path.into());
        self
    }

    pub fn with_filter_type(mut self, filter_type: FilterTypeConfig) -> Self {
        self.filter_types.push(filter_type);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(SdkError::ConfigError(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if self.filter_id_prefix.trim().is_empty() {
            return Err(SdkError::ConfigError(
                "filter_id_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Filter type declared by configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterTypeConfig {
    pub id: String,

    /// Allowed condition kinds, by persisted kind id
    #[serde(default)]
    pub handlers: Vec<u16>,

    /// Allowed operands, by type id
    #[serde(default)]
    pub operands: Vec<String>,
}

impl FilterTypeConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            handlers: Vec::new(),
            operands: Vec::new(),
        }
    }

    pub fn with_handler(mut self, kind: HandlerKind) -> Self {
        self.handlers.push(kind.id());
        self
    }

    pub fn with_operand(mut self, type_id: impl Into<String>) -> Self {
        self.operands.push(type_id.into());
        self
    }

    /// Registry for this filter type, drawing operands from `known`
    pub fn to_registry(&self, known: &OperandCatalog) -> Result<FilterTypeRegistry> {
        let filter_type = FilterType::from(self.id.clone());
        if !matches!(filter_type, FilterType::Custom(_)) {
            return Err(SdkError::ConfigError(format!(
                "filter type '{}' is built in and cannot be redeclared",
                self.id
            )));
        }
        let mut operands = OperandCatalog::default();
        for type_id in &self.operands {
            let operand = known.get(type_id).ok_or_else(|| {
                SdkError::ConfigError(format!(
                    "filter type '{}' uses unknown operand '{}'",
                    self.id, type_id
                ))
            })?;
            operands = operands.with_operand(operand.clone());
        }
        Ok(FilterTypeRegistry::new(filter_type)
            .with_handlers(self.handlers.iter().copied().map(HandlerKind::from))
            .with_operands(operands))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_depth, 32);
        assert_eq!(config.filter_id_prefix, "userfilter");
        assert!(config.system_filter_files.is_empty());
    }

    #[test]
    fn test_from_yaml_str() {
        let config = EngineConfig::from_yaml_str(
            r#"
max_depth: 8
filter_types:
  - id: reporting
    handlers: [5, 15]
    operands: [__currentuser__]
"#,
        )
        .unwrap();

        assert_eq!(config.max_depth, 8);
        assert_eq!(config.filter_id_prefix, "userfilter");
        let registry = config.filter_types[0]
            .to_registry(&OperandCatalog::standard())
            .unwrap();
        assert!(registry.allows(HandlerKind::RegularField));
        assert!(!registry.allows(HandlerKind::SubFilter));
        assert!(registry.operands().contains("__currentuser__"));
    }

    #[test]
    fn test_rejects_bad_config() {
        assert!(EngineConfig::from_yaml_str("max_depth: 0").is_err());
        assert!(EngineConfig::from_yaml_str("filter_id_prefix: ''").is_err());
        assert!(EngineConfig::from_yaml_str("max_depth: [").is_err());

        let unknown_operand = FilterTypeConfig::new("reporting").with_operand("__nobody__");
        assert!(unknown_operand
            .to_registry(&OperandCatalog::standard())
            .is_err());

        let builtin = FilterTypeConfig::new("regular");
        assert!(builtin.to_registry(&OperandCatalog::standard()).is_err());
    }
}
