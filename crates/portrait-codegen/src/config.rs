//! Generator configuration (`portrait.toml`)
//!
//! ```toml
//! strict_bindings = true
//! require_package = true
//! module_name = "portrait_generated"
//! output_dir = "target/portrait"
//!
//! [annotations]
//! reflective = "tech.kaffa.portrait.Reflective"
//! proxy_target = "tech.kaffa.portrait.ProxyTarget"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Annotation type names recognised by the seed scanner
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AnnotationNames {
    /// Marks a type as introspectable
    pub reflective: String,

    /// Marks an interface as a proxy target
    pub proxy_target: String,

    /// Repeatable holder annotation listing extra reflective classes
    pub reflective_include: String,

    /// Repeatable holder annotation listing extra proxy targets
    pub proxy_target_include: String,
}

impl Default for AnnotationNames {
    fn default() -> Self {
        Self {
            reflective: "tech.kaffa.portrait.Reflective".to_string(),
            proxy_target: "tech.kaffa.portrait.ProxyTarget".to_string(),
            reflective_include: "tech.kaffa.portrait.Reflective$Include".to_string(),
            proxy_target_include: "tech.kaffa.portrait.ProxyTarget$Include".to_string(),
        }
    }
}

/// Generator settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Annotation names for seed discovery
    pub annotations: AnnotationNames,

    /// Fail when a concrete member has no host body
    pub strict_bindings: bool,

    /// Skip names without a package qualifier
    pub require_package: bool,

    /// Name of the emitted module
    pub module_name: String,

    /// Directory the emitted module is written to
    pub output_dir: PathBuf,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            annotations: AnnotationNames::default(),
            strict_bindings: false,
            require_package: true,
            module_name: "portrait_generated".to_string(),
            output_dir: PathBuf::from("target/portrait"),
        }
    }
}

impl GeneratorConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = GeneratorConfig::from_toml_str("").unwrap();
        assert_eq!(config, GeneratorConfig::default());
        assert!(config.require_package);
        assert!(!config.strict_bindings);
    }

    #[test]
    fn test_partial_override() {
        let config = GeneratorConfig::from_toml_str(
            r#"
            strict_bindings = true
            module_name = "reflect_tables"

            [annotations]
            reflective = "app.Introspect"
            "#,
        )
        .unwrap();
        assert!(config.strict_bindings);
        assert_eq!(config.module_name, "reflect_tables");
        assert_eq!(config.annotations.reflective, "app.Introspect");
        assert_eq!(
            config.annotations.proxy_target,
            AnnotationNames::default().proxy_target
        );
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            GeneratorConfig::from_toml_str("strict_bindings = \"yes\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            GeneratorConfig::load(Path::new("/nonexistent/portrait.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
