//! Configuration validation.

use super::{compile_patterns, Config};
use crate::error::{CollectorError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.host.is_empty() {
        return Err(CollectorError::Config("source.host is required".into()));
    }
    if config.source.user.is_empty() {
        return Err(CollectorError::Config("source.user is required".into()));
    }
    if config.source.database.is_empty() {
        return Err(CollectorError::Config("source.database must not be empty".into()));
    }
    if config.source.max_connections == 0 {
        return Err(CollectorError::Config(
            "source.max_connections must be at least 1".into(),
        ));
    }
    if config.source.databases.iter().any(|d| d.trim().is_empty()) {
        return Err(CollectorError::Config(
            "source.databases must not contain empty names".into(),
        ));
    }

    // Collection limits - only check if explicitly set
    let collection = &config.collection;
    if let Some(0) = collection.table_chunk_size {
        return Err(CollectorError::Config(
            "collection.table_chunk_size must be at least 1".into(),
        ));
    }
    if let Some(0) = collection.max_columns_per_batch {
        return Err(CollectorError::Config(
            "collection.max_columns_per_batch must be at least 1".into(),
        ));
    }
    if let Some(0) = collection.max_total_columns {
        return Err(CollectorError::Config(
            "collection.max_total_columns must be at least 1".into(),
        ));
    }
    if collection.get_max_columns_per_batch() > collection.get_max_total_columns() {
        return Err(CollectorError::Config(format!(
            "collection.max_columns_per_batch ({}) cannot exceed collection.max_total_columns ({})",
            collection.get_max_columns_per_batch(),
            collection.get_max_total_columns()
        )));
    }
    let interval = collection.collection_interval;
    if !interval.is_finite() || interval <= 0.0 {
        return Err(CollectorError::Config(
            "collection.collection_interval must be a positive finite number".into(),
        ));
    }

    compile_patterns("collection.include_schemas", &collection.include_schemas)?;
    compile_patterns("collection.exclude_schemas", &collection.exclude_schemas)?;

    if config.export.dbms.is_empty() {
        return Err(CollectorError::Config("export.dbms must not be empty".into()));
    }

    Ok(())
}
