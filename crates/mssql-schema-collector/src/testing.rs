//! In-memory catalog, recording submitter and log capture for unit tests.

use std::collections::HashSet;
use std::fmt::Write as FmtWrite;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use crate::catalog::{CatalogQuery, CatalogValue};
use crate::error::{CollectorError, Result};
use crate::export::Submitter;
use crate::source::{CatalogCursor, CatalogSource};

#[derive(Debug, Clone)]
pub struct FakeColumn {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

#[derive(Debug, Clone)]
pub struct FakeTable {
    pub id: i64,
    pub name: String,
    pub columns: Vec<FakeColumn>,
    pub indexes: Vec<String>,
    pub foreign_keys: Vec<String>,
    pub row_count: i64,
}

impl FakeTable {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            row_count: 0,
        }
    }

    /// Add `count` int columns named `c1..cN`; odd ones are nullable.
    pub fn with_columns(mut self, count: usize) -> Self {
        for i in 1..=count {
            self.columns.push(FakeColumn {
                name: format!("c{}", i),
                data_type: "int".to_string(),
                nullable: i % 2 == 1,
            });
        }
        self
    }

    pub fn with_index(mut self, name: &str) -> Self {
        self.indexes.push(name.to_string());
        self
    }

    pub fn with_foreign_key(mut self, name: &str) -> Self {
        self.foreign_keys.push(name.to_string());
        self
    }

    pub fn with_rows(mut self, rows: i64) -> Self {
        self.row_count = rows;
        self
    }
}

#[derive(Debug, Clone)]
pub struct FakeSchema {
    pub id: i64,
    pub name: String,
    pub tables: Vec<FakeTable>,
}

impl FakeSchema {
    pub fn new(id: i64, name: &str, tables: Vec<FakeTable>) -> Self {
        Self {
            id,
            name: name.to_string(),
            tables,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FakeDatabase {
    pub name: String,
    pub has_info: bool,
    pub schemas: Vec<FakeSchema>,
}

impl FakeDatabase {
    pub fn new(name: &str, schemas: Vec<FakeSchema>) -> Self {
        Self {
            name: name.to_string(),
            has_info: true,
            schemas,
        }
    }

    pub fn without_info(mut self) -> Self {
        self.has_info = false;
        self
    }

    fn table(&self, id: &str) -> Option<&FakeTable> {
        self.schemas
            .iter()
            .flat_map(|s| s.tables.iter())
            .find(|t| t.id.to_string() == id)
    }
}

#[derive(Default)]
struct CatalogState {
    databases: Vec<FakeDatabase>,
    unreachable: HashSet<String>,
    failing_query: Option<(String, &'static str)>,
    stray_rows: bool,
}

/// In-memory catalog answering every [`CatalogQuery`].
#[derive(Clone, Default)]
pub struct FakeCatalog {
    state: Arc<Mutex<CatalogState>>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl FakeCatalog {
    pub fn new(databases: Vec<FakeDatabase>) -> Self {
        let catalog = Self::default();
        catalog.set_databases(databases);
        catalog
    }

    /// Replace the live database list.
    pub fn set_databases(&self, databases: Vec<FakeDatabase>) {
        self.state.lock().unwrap().databases = databases;
    }

    /// Make `open_cursor` fail for one database.
    pub fn make_unreachable(&self, database: &str) {
        self.state.lock().unwrap().unreachable.insert(database.to_string());
    }

    /// Make one named query fail inside one database.
    pub fn fail_query(&self, database: &str, query: &'static str) {
        self.state.lock().unwrap().failing_query = Some((database.to_string(), query));
    }

    /// Emit column and foreign key rows that reference no requested table.
    pub fn with_stray_rows(self) -> Self {
        self.state.lock().unwrap().stray_rows = true;
        self
    }

    /// Executed queries as `database:query_name`.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn cursor(&self, database: &str) -> FakeCursor {
        let state = self.state.lock().unwrap();
        let db = state
            .databases
            .iter()
            .find(|d| d.name == database)
            .cloned()
            .unwrap_or_else(|| FakeDatabase::new(database, Vec::new()));
        let failing_query = state
            .failing_query
            .as_ref()
            .filter(|(name, _)| name == database)
            .map(|(_, query)| *query);
        FakeCursor {
            database: db,
            failing_query,
            stray_rows: state.stray_rows,
            queries: self.queries.clone(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn list_databases(&self) -> Result<Vec<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .databases
            .iter()
            .map(|d| d.name.clone())
            .collect())
    }

    async fn open_cursor(&self, database: &str) -> Result<Box<dyn CatalogCursor>> {
        if self.state.lock().unwrap().unreachable.contains(database) {
            return Err(CollectorError::pool(
                format!("database '{}' is not accessible", database),
                "opening cursor",
            ));
        }
        Ok(Box::new(self.cursor(database)))
    }

    fn source_type(&self) -> &str {
        "fake"
    }
}

pub struct FakeCursor {
    database: FakeDatabase,
    failing_query: Option<&'static str>,
    stray_rows: bool,
    queries: Arc<Mutex<Vec<String>>>,
    columns: Vec<String>,
    rows: Vec<Vec<CatalogValue>>,
}

impl FakeCursor {
    fn set_result(&mut self, columns: &[&str], rows: Vec<Vec<CatalogValue>>) {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self.rows = rows;
    }

    fn tables<'a>(&'a self, ids: &'a [String]) -> impl Iterator<Item = &'a FakeTable> + 'a {
        ids.iter().filter_map(move |id| self.database.table(id))
    }
}

#[async_trait]
impl CatalogCursor for FakeCursor {
    async fn execute(&mut self, query: &CatalogQuery) -> Result<()> {
        self.queries
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.database.name, query.name()));
        if self.failing_query == Some(query.name()) {
            return Err(CollectorError::query(query.name(), "injected failure"));
        }
        // Templates must render for every query the collector issues
        query.render()?;

        match query {
            CatalogQuery::Databases => self.set_result(&["name"], Vec::new()),
            CatalogQuery::DatabaseInfo { database } => {
                let rows = if self.database.has_info {
                    vec![vec![
                        database.as_str().into(),
                        CatalogValue::Int(5),
                        "SQL_Latin1_General_CP1_CI_AS".into(),
                    ]]
                } else {
                    Vec::new()
                };
                self.set_result(&["name", "id", "collation"], rows);
            }
            CatalogQuery::Schemas => {
                let rows = self
                    .database
                    .schemas
                    .iter()
                    .map(|s| vec![s.name.as_str().into(), CatalogValue::Int(s.id), CatalogValue::Int(1)])
                    .collect();
                self.set_result(&["name", "id", "principal_id"], rows);
            }
            CatalogQuery::Tables { schema_id } => {
                let rows = self
                    .database
                    .schemas
                    .iter()
                    .filter(|s| s.id.to_string() == *schema_id)
                    .flat_map(|s| s.tables.iter())
                    .map(|t| vec![CatalogValue::Int(t.id), t.name.as_str().into()])
                    .collect();
                self.set_result(&["object_id", "name"], rows);
            }
            CatalogQuery::Columns { table_ids, .. } => {
                let mut rows: Vec<Vec<CatalogValue>> = self
                    .tables(table_ids)
                    .flat_map(|t| {
                        t.columns.iter().map(move |c| {
                            vec![
                                c.name.as_str().into(),
                                c.data_type.as_str().into(),
                                CatalogValue::Null,
                                CatalogValue::from(if c.nullable { "YES" } else { "NO" }),
                                t.name.as_str().into(),
                            ]
                        })
                    })
                    .collect();
                if self.stray_rows {
                    rows.push(vec![
                        "ghost_col".into(),
                        "int".into(),
                        CatalogValue::Null,
                        "YES".into(),
                        "ghost_table".into(),
                    ]);
                }
                self.set_result(
                    &["name", "data_type", "column_default", "nullable", "table_name"],
                    rows,
                );
            }
            CatalogQuery::Partitions { table_ids } => {
                let rows = self
                    .tables(table_ids)
                    .map(|t| vec![CatalogValue::Int(t.id), CatalogValue::Int(1), CatalogValue::Int(t.row_count)])
                    .collect();
                self.set_result(&["id", "partition_count", "row_count"], rows);
            }
            CatalogQuery::Indexes { table_ids } => {
                let rows = self
                    .tables(table_ids)
                    .flat_map(|t| {
                        t.indexes.iter().map(move |name| {
                            vec![
                                CatalogValue::Int(t.id),
                                name.as_str().into(),
                                "CLUSTERED".into(),
                                CatalogValue::Bool(true),
                            ]
                        })
                    })
                    .collect();
                self.set_result(&["id", "name", "type", "is_unique"], rows);
            }
            CatalogQuery::ForeignKeys { table_ids } => {
                let mut rows: Vec<Vec<CatalogValue>> = self
                    .tables(table_ids)
                    .flat_map(|t| {
                        t.foreign_keys.iter().map(move |name| {
                            vec![CatalogValue::Int(t.id), name.as_str().into(), "customers".into()]
                        })
                    })
                    .collect();
                if self.stray_rows {
                    rows.push(vec![CatalogValue::Int(999_999), "fk_ghost".into(), "nowhere".into()]);
                }
                self.set_result(&["id", "foreign_key_name", "referenced_table"], rows);
            }
        }
        Ok(())
    }

    async fn fetch_all(&mut self) -> Result<Vec<Vec<CatalogValue>>> {
        Ok(std::mem::take(&mut self.rows))
    }

    fn column_names(&self) -> Vec<String> {
        self.columns.clone()
    }
}

/// Keeps every submitted payload.
#[derive(Default)]
pub struct RecordingSubmitter {
    payloads: Mutex<Vec<Vec<u8>>>,
}

impl RecordingSubmitter {
    pub fn documents(&self) -> Vec<Value> {
        self.payloads
            .lock()
            .unwrap()
            .iter()
            .map(|p| serde_json::from_slice(p).unwrap())
            .collect()
    }
}

#[async_trait]
impl Submitter for RecordingSubmitter {
    async fn submit(&self, payload: Vec<u8>) {
        self.payloads.lock().unwrap().push(payload);
    }
}

/// Tracing layer recording `(level, message)` for assertions.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    events: Arc<Mutex<Vec<(Level, String)>>>,
}

impl CapturedLogs {
    /// Capture events on the current thread until the guard drops.
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let logs = Self::default();
        let subscriber = tracing_subscriber::registry().with(logs.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (logs, guard)
    }

    pub fn messages(&self, level: Level) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl<S> Layer<S> for CapturedLogs
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.events
            .lock()
            .unwrap()
            .push((*event.metadata().level(), visitor.message));
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.message, " {}={:?}", field.name(), value);
        }
    }
}
