//! Collection cycle driver.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::enricher::enrich_tables;
use super::report::{CycleOutcome, CycleReport, DatabaseFailure, TruncationPoint};
use crate::catalog::{CatalogQuery, RowMode, Schema, Table};
use crate::config::{Config, SchemaFilter};
use crate::error::Result;
use crate::export::{BatchAccumulator, ColumnLimits, ExportEnvelope, Submitter};
use crate::source::{CatalogCursor, CatalogSource};

/// Progress markers kept between cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionProgress {
    /// Database list remembered from the last discovery.
    pub known_databases: Vec<String>,

    /// Database being walked, or where the last cycle stopped.
    pub current_database: Option<String>,

    /// Schema being walked, or where the last cycle stopped.
    pub current_schema: Option<String>,

    /// Tables stored since the markers were last cleared.
    pub tables_collected: usize,
}

impl CollectionProgress {
    fn clear_markers(&mut self) {
        self.current_database = None;
        self.current_schema = None;
        self.tables_collected = 0;
    }
}

/// How one database walk ended.
enum DatabaseWalk {
    Finished,
    Truncated,
}

/// Walks every database's catalog and feeds the batch accumulator.
pub struct SchemaCollector {
    source: Arc<dyn CatalogSource>,
    accumulator: BatchAccumulator,
    filter: SchemaFilter,
    chunk_size: usize,
    host: String,
    tags: Vec<String>,
    cloud_metadata: serde_json::Value,
    progress: CollectionProgress,
}

impl SchemaCollector {
    /// Create a collector. Fails on invalid schema filter patterns.
    pub fn new(
        config: &Config,
        source: Arc<dyn CatalogSource>,
        submitter: Arc<dyn Submitter>,
    ) -> Result<Self> {
        let accumulator = BatchAccumulator::new(
            ExportEnvelope::from_config(config),
            ColumnLimits::from_config(&config.collection),
            submitter,
        );

        Ok(Self {
            source,
            accumulator,
            filter: SchemaFilter::from_config(&config.collection)?,
            chunk_size: config.collection.get_table_chunk_size().max(1),
            host: config.reported_host().to_string(),
            tags: config.export.tags.clone(),
            cloud_metadata: config.export.cloud_metadata.clone(),
            progress: CollectionProgress::default(),
        })
    }

    pub fn progress(&self) -> &CollectionProgress {
        &self.progress
    }

    pub fn accumulator(&self) -> &BatchAccumulator {
        &self.accumulator
    }

    /// Run one collection cycle.
    ///
    /// The first cycle only discovers databases. Later cycles walk every live
    /// database; a failure in one database is logged and recorded, and the
    /// walk continues with the next.
    pub async fn collect_cycle(&mut self) -> Result<CycleReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let timer = Instant::now();
        let mut report = CycleReport::new(run_id.clone(), Utc::now());

        self.accumulator.reset();
        self.accumulator
            .set_envelope_identity(&self.host, &self.tags, &self.cloud_metadata);

        info!("Starting collection cycle {} ({})", run_id, self.source.source_type());
        let databases = self.source.list_databases().await?;
        report.databases_total = databases.len();

        if self.progress.known_databases.is_empty() {
            info!(
                "Discovered {} databases, collection starts next cycle",
                databases.len()
            );
            self.progress.known_databases = databases;
            return Ok(report.finish(CycleOutcome::Discovered));
        }

        if let Some(first) = self.progress.known_databases.first() {
            if !databases.contains(first) {
                warn!(
                    "Database list drifted ({} no longer present), discarding collection progress",
                    first
                );
                self.progress.clear_markers();
                self.progress.known_databases = databases.clone();
                report.drift_detected = true;
            }
        }

        for database in &databases {
            let db_timer = Instant::now();
            match self.collect_database(database, &mut report).await {
                Ok(walk) => {
                    report.databases_collected += 1;
                    if let DatabaseWalk::Finished = walk {
                        self.progress.current_database = None;
                        self.progress.current_schema = None;
                    }
                    info!(
                        "Collected database {} in {:.2}s",
                        database,
                        db_timer.elapsed().as_secs_f64()
                    );
                }
                Err(e) => {
                    error!("Failed to collect database {}: {}", database, e);
                    report.databases_failed.push(DatabaseFailure {
                        database: database.clone(),
                        error: e.to_string(),
                    });
                }
            }
            // Per-chunk flushes normally leave nothing behind
            self.accumulator.flush().await?;
        }

        self.accumulator.flush().await?;

        report.columns = self.accumulator.cycle_columns();
        report.submissions = self.accumulator.submissions();
        info!(
            "Finished collecting schemas for {} databases in {:.2}s ({} tables, {} columns, {} documents)",
            report.databases_collected,
            timer.elapsed().as_secs_f64(),
            report.tables,
            report.columns,
            report.submissions
        );
        Ok(report.finish(CycleOutcome::Completed))
    }

    async fn collect_database(
        &mut self,
        database: &str,
        report: &mut CycleReport,
    ) -> Result<DatabaseWalk> {
        self.progress.current_database = Some(database.to_string());
        let mut cursor = self.source.open_cursor(database).await?;

        let info = cursor
            .query_fields(
                &CatalogQuery::DatabaseInfo {
                    database: database.to_string(),
                },
                RowMode::Stringified,
            )
            .await?;
        match info.into_iter().next() {
            Some(info) => self.accumulator.store_database_info(database, info),
            None => debug!("No database info returned for {}", database),
        }

        let schemas = cursor
            .query_fields(&CatalogQuery::Schemas, RowMode::Stringified)
            .await?
            .iter()
            .map(Schema::from_fields)
            .collect::<Result<Vec<_>>>()?;
        let schemas: Vec<Schema> = schemas
            .into_iter()
            .filter(|s| self.filter.matches(&s.name))
            .collect();

        for schema in &schemas {
            self.progress.current_schema = Some(schema.name.clone());
            if let DatabaseWalk::Truncated =
                self.collect_schema(cursor.as_mut(), database, schema, report).await?
            {
                return Ok(DatabaseWalk::Truncated);
            }
            report.schemas += 1;
        }
        Ok(DatabaseWalk::Finished)
    }

    async fn collect_schema(
        &mut self,
        cursor: &mut dyn CatalogCursor,
        database: &str,
        schema: &Schema,
        report: &mut CycleReport,
    ) -> Result<DatabaseWalk> {
        let mut tables = cursor
            .query_fields(
                &CatalogQuery::Tables {
                    schema_id: schema.id.clone(),
                },
                RowMode::Raw,
            )
            .await?
            .iter()
            .map(Table::from_fields)
            .collect::<Result<Vec<_>>>()?;
        tables.sort_by(|a, b| a.name.cmp(&b.name));

        if tables.is_empty() {
            self.accumulator.store(database, schema, Vec::new(), 0).await?;
            return Ok(DatabaseWalk::Finished);
        }

        for chunk in tables.chunks(self.chunk_size) {
            if self.accumulator.exceeded_cycle_ceiling() {
                warn!(
                    "Truncated schema collection: column limit of {} reached in database {}, schema {}",
                    self.accumulator.limits().per_cycle,
                    database,
                    schema.name
                );
                report.truncations.push(TruncationPoint {
                    database: database.to_string(),
                    schema: schema.name.clone(),
                });
                return Ok(DatabaseWalk::Truncated);
            }

            let enrichment = enrich_tables(cursor, chunk.to_vec(), schema).await?;
            let stored = enrichment.tables.len();
            self.accumulator
                .store(database, schema, enrichment.tables, enrichment.columns_count)
                .await?;
            self.accumulator.flush().await?;

            report.tables += stored;
            self.progress.tables_collected += stored;
        }
        Ok(DatabaseWalk::Finished)
    }
}
