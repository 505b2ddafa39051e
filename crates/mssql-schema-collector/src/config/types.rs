//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source server configuration (MSSQL).
    pub source: SourceConfig,

    /// Collection limits and filters.
    #[serde(default)]
    pub collection: CollectionConfig,

    /// Export envelope and destination.
    #[serde(default)]
    pub export: ExportConfig,
}

/// Source server (MSSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Server host.
    pub host: String,

    /// Server port (default: 1433).
    #[serde(default = "default_mssql_port")]
    pub port: u16,

    /// Database used for the initial login and database listing (default: "master").
    #[serde(default = "default_master")]
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Encrypt connection (default: true).
    #[serde(default = "default_true")]
    pub encrypt: bool,

    /// Trust server certificate (default: false).
    #[serde(default)]
    pub trust_server_cert: bool,

    /// Databases to collect. Empty means every online user database.
    #[serde(default)]
    pub databases: Vec<String>,

    /// Maximum pooled connections (default: 4).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .field("databases", &self.databases)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Collection behavior configuration.
/// Limits use Option<T> to distinguish "not set" from "explicitly set";
/// the accessor methods supply the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Columns buffered before a batch is flushed early (default: 100,000).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_columns_per_batch: Option<usize>,

    /// Columns collected per cycle before collection is truncated (default: 250,000).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_total_columns: Option<usize>,

    /// Tables enriched per round trip (default: 50).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_chunk_size: Option<usize>,

    /// Schemas to include (regex patterns). Empty includes every schema.
    #[serde(default)]
    pub include_schemas: Vec<String>,

    /// Schemas to exclude (regex patterns). Applied after includes.
    #[serde(default)]
    pub exclude_schemas: Vec<String>,

    /// Seconds between collection cycles (default: 600).
    #[serde(default = "default_collection_interval")]
    pub collection_interval: f64,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            max_columns_per_batch: None,
            max_total_columns: None,
            table_chunk_size: None,
            include_schemas: Vec::new(),
            exclude_schemas: Vec::new(),
            collection_interval: default_collection_interval(),
        }
    }
}

impl CollectionConfig {
    pub fn get_max_columns_per_batch(&self) -> usize {
        self.max_columns_per_batch.unwrap_or(100_000)
    }

    pub fn get_max_total_columns(&self) -> usize {
        self.max_total_columns.unwrap_or(250_000)
    }

    pub fn get_table_chunk_size(&self) -> usize {
        self.table_chunk_size.unwrap_or(50)
    }
}

/// Export envelope and destination configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Reported host name. Defaults to the source host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Tags attached to every document.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Free-form cloud metadata attached to every document.
    #[serde(default)]
    pub cloud_metadata: serde_json::Value,

    /// DBMS marker (default: "sqlserver").
    #[serde(default = "default_dbms")]
    pub dbms: String,

    /// DBMS version marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dbms_version: Option<String>,

    /// Document kind (default: "sqlserver_databases").
    #[serde(default = "default_kind")]
    pub kind: String,

    /// NDJSON output file. Absent means stdout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            host: None,
            tags: Vec::new(),
            cloud_metadata: serde_json::Value::Null,
            dbms: default_dbms(),
            dbms_version: None,
            kind: default_kind(),
            output: None,
        }
    }
}

// Default value functions for serde
fn default_mssql_port() -> u16 {
    1433
}

fn default_master() -> String {
    "master".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_connections() -> u32 {
    4
}

fn default_collection_interval() -> f64 {
    600.0
}

fn default_dbms() -> String {
    "sqlserver".to_string()
}

fn default_kind() -> String {
    "sqlserver_databases".to_string()
}
