//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{CollectorError, Result};
use regex::Regex;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Host name reported in exported documents.
    pub fn reported_host(&self) -> &str {
        self.export.host.as_deref().unwrap_or(&self.source.host)
    }
}

/// Compiled schema inclusion policy.
#[derive(Debug, Clone, Default)]
pub struct SchemaFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl SchemaFilter {
    /// Compile the include/exclude patterns of a collection config.
    pub fn from_config(config: &CollectionConfig) -> Result<Self> {
        Ok(Self {
            include: compile_patterns("collection.include_schemas", &config.include_schemas)?,
            exclude: compile_patterns("collection.exclude_schemas", &config.exclude_schemas)?,
        })
    }

    /// Check whether a schema should be collected.
    pub fn matches(&self, schema: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|re| re.is_match(schema));
        included && !self.exclude.iter().any(|re| re.is_match(schema))
    }
}

pub(crate) fn compile_patterns(field: &str, patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| {
                CollectorError::Config(format!("{} has an invalid pattern '{}': {}", field, p, e))
            })
        })
        .collect()
}
