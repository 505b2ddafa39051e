//! Per-cycle outcome report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What a cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// First cycle: the database list was remembered, nothing collected.
    Discovered,
    /// Every live database was visited.
    Completed,
}

/// Where the cycle ceiling stopped collection of a database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruncationPoint {
    pub database: String,
    pub schema: String,
}

/// A database whose collection failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseFailure {
    pub database: String,
    pub error: String,
}

/// Result of one collection cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    /// Unique cycle identifier.
    pub run_id: String,

    pub outcome: CycleOutcome,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,

    /// Databases reported live by the source.
    pub databases_total: usize,

    /// Databases visited without error.
    pub databases_collected: usize,

    pub databases_failed: Vec<DatabaseFailure>,

    /// Schemas fully collected.
    pub schemas: usize,

    /// Tables enriched and stored.
    pub tables: usize,

    /// Columns counted toward the cycle ceiling.
    pub columns: usize,

    /// Documents handed to the submitter.
    pub submissions: usize,

    /// Every point where the cycle ceiling cut collection short.
    pub truncations: Vec<TruncationPoint>,

    /// The remembered database list no longer matched the live one.
    pub drift_detected: bool,
}

impl CycleReport {
    pub(crate) fn new(run_id: String, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            outcome: CycleOutcome::Completed,
            duration_seconds: 0.0,
            started_at,
            completed_at: started_at,
            databases_total: 0,
            databases_collected: 0,
            databases_failed: Vec::new(),
            schemas: 0,
            tables: 0,
            columns: 0,
            submissions: 0,
            truncations: Vec::new(),
            drift_detected: false,
        }
    }

    pub(crate) fn finish(mut self, outcome: CycleOutcome) -> Self {
        self.outcome = outcome;
        self.completed_at = Utc::now();
        self.duration_seconds =
            (self.completed_at - self.started_at).num_milliseconds() as f64 / 1000.0;
        self
    }

    /// True when the ceiling cut any database short.
    pub fn truncated(&self) -> bool {
        !self.truncations.is_empty()
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
