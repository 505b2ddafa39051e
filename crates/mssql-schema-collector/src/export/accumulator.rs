//! Batch accumulator.
//!
//! Buffers collected schemas per database, counts the columns they carry and
//! turns the buffer into an [`ExportDocument`] on flush. Two ceilings apply:
//! the per-batch ceiling forces a flush from inside [`BatchAccumulator::store`],
//! the cycle ceiling is only reported and enforced by the collector.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::document::{DatabaseMetadata, ExportDocument, ExportEnvelope};
use super::transport::Submitter;
use crate::catalog::{FieldMap, Schema, Table};
use crate::config::CollectionConfig;
use crate::error::Result;

/// Column ceilings for one accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLimits {
    /// Flush once a batch holds more than this many columns.
    pub per_batch: usize,

    /// The cycle is over budget once it has stored more than this many.
    pub per_cycle: usize,
}

impl ColumnLimits {
    pub fn from_config(config: &CollectionConfig) -> Self {
        Self {
            per_batch: config.get_max_columns_per_batch(),
            per_cycle: config.get_max_total_columns(),
        }
    }
}

/// Schemas buffered for one database, in first-seen order.
#[derive(Debug)]
struct PendingDatabase {
    name: String,
    schemas: Vec<Schema>,
    by_id: HashMap<String, usize>,
}

impl PendingDatabase {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            schemas: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    fn merge(&mut self, schema: &Schema, tables: Vec<Table>) {
        let slot = match self.by_id.get(&schema.id) {
            Some(&slot) => slot,
            None => {
                self.schemas.push(schema.without_tables());
                self.by_id.insert(schema.id.clone(), self.schemas.len() - 1);
                self.schemas.len() - 1
            }
        };
        self.schemas[slot].tables.extend(tables);
    }
}

/// Accumulates collected schemas and submits them in bounded batches.
pub struct BatchAccumulator {
    envelope: ExportEnvelope,
    submitter: Arc<dyn Submitter>,
    limits: ColumnLimits,
    pending: Vec<PendingDatabase>,
    database_info: HashMap<String, FieldMap>,
    batch_columns: usize,
    cycle_columns: usize,
    submissions: usize,
}

impl BatchAccumulator {
    pub fn new(envelope: ExportEnvelope, limits: ColumnLimits, submitter: Arc<dyn Submitter>) -> Self {
        Self {
            envelope,
            submitter,
            limits,
            pending: Vec::new(),
            database_info: HashMap::new(),
            batch_columns: 0,
            cycle_columns: 0,
            submissions: 0,
        }
    }

    /// Refresh host, tags and cloud metadata ahead of a cycle.
    pub fn set_envelope_identity(&mut self, host: &str, tags: &[String], cloud_metadata: &Value) {
        self.envelope.host = host.to_string();
        self.envelope.tags = tags.to_vec();
        self.envelope.cloud_metadata = cloud_metadata.clone();
    }

    /// Remember the info row of a database for every document that carries it.
    pub fn store_database_info(&mut self, database: &str, info: FieldMap) {
        self.database_info.insert(database.to_string(), info);
    }

    /// Add enriched tables of one schema and count their columns.
    ///
    /// Tables of a schema already buffered for the same database are appended
    /// to it. When the batch counter passes the per-batch ceiling the buffer is
    /// flushed before returning.
    pub async fn store(
        &mut self,
        database: &str,
        schema: &Schema,
        tables: Vec<Table>,
        columns_count: usize,
    ) -> Result<()> {
        self.batch_columns += columns_count;
        self.cycle_columns += columns_count;

        let slot = match self.pending.iter().position(|db| db.name == database) {
            Some(slot) => slot,
            None => {
                self.pending.push(PendingDatabase::new(database));
                self.pending.len() - 1
            }
        };
        self.pending[slot].merge(schema, tables);

        if self.batch_columns > self.limits.per_batch {
            debug!(
                "Batch holds {} columns (ceiling {}), flushing",
                self.batch_columns, self.limits.per_batch
            );
            self.flush().await?;
        }
        Ok(())
    }

    /// Submit everything buffered as one document and clear the batch.
    ///
    /// Does nothing when no schemas are buffered.
    pub async fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let metadata = std::mem::take(&mut self.pending)
            .into_iter()
            .map(|db| DatabaseMetadata {
                info: self.info_for(&db.name),
                schemas: db.schemas,
            })
            .collect();

        let document = ExportDocument {
            envelope: self.envelope.clone(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            metadata,
        };
        let payload = document.to_bytes()?;

        debug!(
            "Submitting document: {} databases, {} tables, {} columns, {} bytes",
            document.metadata.len(),
            document.table_count(),
            self.batch_columns,
            payload.len()
        );

        self.batch_columns = 0;
        self.submissions += 1;
        self.submitter.submit(payload).await;
        Ok(())
    }

    fn info_for(&self, database: &str) -> FieldMap {
        match self.database_info.get(database) {
            Some(info) => info.clone(),
            None => {
                warn!("No database info stored for {}, exporting name only", database);
                let mut info = FieldMap::new();
                info.insert("name".to_string(), Value::String(database.to_string()));
                info
            }
        }
    }

    /// True once the cycle has stored more columns than its ceiling allows.
    pub fn exceeded_cycle_ceiling(&self) -> bool {
        self.cycle_columns > self.limits.per_cycle
    }

    /// Start a new cycle: drop buffered data, database info and counters.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.database_info.clear();
        self.batch_columns = 0;
        self.cycle_columns = 0;
        self.submissions = 0;
    }

    pub fn batch_columns(&self) -> usize {
        self.batch_columns
    }

    pub fn cycle_columns(&self) -> usize {
        self.cycle_columns
    }

    /// Documents submitted since the last reset.
    pub fn submissions(&self) -> usize {
        self.submissions
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn limits(&self) -> ColumnLimits {
        self.limits
    }
}
