//! Catalog sources: database listing and per-database cursors.
//!
//! The collector only talks to [`CatalogSource`] and [`CatalogCursor`], so
//! the SQL Server implementation in [`mssql`] can be swapped for an
//! in-memory catalog in tests.

pub mod mssql;

pub use mssql::MssqlSource;

use async_trait::async_trait;
use tracing::debug;

use crate::catalog::{map_rows, CatalogQuery, CatalogValue, FieldMap, RowMode};
use crate::error::Result;

/// Lists databases and opens cursors scoped to one of them.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Databases to collect, in collection order.
    async fn list_databases(&self) -> Result<Vec<String>>;

    /// Open a cursor whose queries run against `database`.
    ///
    /// Fails when the database is gone or inaccessible; the collector treats
    /// that as a failure of this database only.
    async fn open_cursor(&self, database: &str) -> Result<Box<dyn CatalogCursor>>;

    /// Source type identifier for logging.
    fn source_type(&self) -> &str;
}

/// A cursor over one database's catalog.
///
/// Mirrors a DB-API cursor: `execute` runs a query, `fetch_all` drains its
/// rows and `column_names` describes the last result set.
#[async_trait]
pub trait CatalogCursor: Send {
    /// Run a catalog query, replacing any previous result set.
    async fn execute(&mut self, query: &CatalogQuery) -> Result<()>;

    /// Take every row of the current result set.
    async fn fetch_all(&mut self) -> Result<Vec<Vec<CatalogValue>>>;

    /// Column names of the current result set.
    fn column_names(&self) -> Vec<String>;

    /// Execute, fetch and map a query in one step.
    async fn query_fields(&mut self, query: &CatalogQuery, mode: RowMode) -> Result<Vec<FieldMap>> {
        debug!("Running catalog query [{}]", query.name());
        self.execute(query).await?;
        let rows = self.fetch_all().await?;
        let columns = self.column_names();
        let fields = map_rows(&columns, rows, mode)?;
        debug!("Fetched {} rows for [{}]", fields.len(), query.name());
        Ok(fields)
    }
}
