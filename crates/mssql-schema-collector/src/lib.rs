//! # mssql-schema-collector
//!
//! Incremental SQL Server catalog harvester.
//!
//! Walks every database of a SQL Server instance, collects schemas, tables,
//! columns, indexes, partitions and foreign keys, and emits the result as a
//! series of bounded JSON export documents:
//!
//! - **Chunked enrichment** of tables, one catalog round-trip per detail kind
//! - **Per-batch column ceiling** forcing incremental submission
//! - **Cycle column ceiling** truncating collection with a logged warning
//! - **Drift detection** between discovery and collection cycles
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mssql_schema_collector::{Config, MssqlSource, NdjsonSubmitter, SchemaCollector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("collector.yaml")?;
//!     let source = MssqlSource::new(config.source.clone()).await?;
//!     let submitter = NdjsonSubmitter::stdout();
//!     let mut collector = SchemaCollector::new(&config, Arc::new(source), Arc::new(submitter))?;
//!
//!     collector.collect_cycle().await?; // discovers databases
//!     let report = collector.collect_cycle().await?;
//!     println!("Collected {} tables", report.tables);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod collector;
pub mod config;
pub mod error;
pub mod export;
pub mod source;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenient access
pub use catalog::{CatalogQuery, CatalogValue, FieldMap, Schema, Table};
pub use collector::{CollectionProgress, CycleOutcome, CycleReport, SchemaCollector};
pub use config::{CollectionConfig, Config, ExportConfig, SourceConfig};
pub use error::{CollectorError, Result};
pub use export::{BatchAccumulator, ChannelSubmitter, ExportDocument, NdjsonSubmitter, Submitter};
pub use source::{CatalogCursor, CatalogSource, MssqlSource};
