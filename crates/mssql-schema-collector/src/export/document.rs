//! Export document sent to the ingestion sink.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{FieldMap, Schema};
use crate::config::Config;

/// Fields shared by every document of a collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEnvelope {
    pub host: String,
    pub agent_version: String,
    pub tags: Vec<String>,
    pub cloud_metadata: Value,
    pub dbms: String,
    pub dbms_version: Option<String>,
    pub kind: String,
    pub collection_interval: f64,
}

impl ExportEnvelope {
    /// Build the envelope from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            host: config.reported_host().to_string(),
            agent_version: env!("CARGO_PKG_VERSION").to_string(),
            tags: config.export.tags.clone(),
            cloud_metadata: config.export.cloud_metadata.clone(),
            dbms: config.export.dbms.clone(),
            dbms_version: config.export.dbms_version.clone(),
            kind: config.export.kind.clone(),
            collection_interval: config.collection.collection_interval,
        }
    }
}

/// One flushed batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    #[serde(flatten)]
    pub envelope: ExportEnvelope,

    /// Milliseconds since the Unix epoch at flush time.
    pub timestamp: i64,

    pub metadata: Vec<DatabaseMetadata>,
}

/// Database info merged with the schemas buffered for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    #[serde(flatten)]
    pub info: FieldMap,

    pub schemas: Vec<Schema>,
}

impl ExportDocument {
    /// Serialize to the wire form handed to the submitter.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Number of tables across all databases and schemas.
    pub fn table_count(&self) -> usize {
        self.metadata
            .iter()
            .flat_map(|db| db.schemas.iter())
            .map(|schema| schema.tables.len())
            .sum()
    }
}
