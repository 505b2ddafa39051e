//! Collection cycle: orchestration, table enrichment and reporting.

mod enricher;
mod orchestrator;
mod report;

pub use enricher::{enrich_tables, Enrichment};
pub use orchestrator::{CollectionProgress, SchemaCollector};
pub use report::{CycleOutcome, CycleReport, DatabaseFailure, TruncationPoint};
