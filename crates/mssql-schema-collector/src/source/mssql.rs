//! SQL Server catalog source.
//!
//! Uses Tiberius with a bb8 connection pool. Each cursor checks out one
//! pooled connection and switches it to the target database with `USE`.

use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel, Query};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use super::{CatalogCursor, CatalogSource};
use crate::catalog::{CatalogQuery, CatalogValue, RowMode};
use crate::config::SourceConfig;
use crate::error::{CollectorError, Result};

/// Connection acquisition timeout from pool (30 seconds).
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Idle connection timeout (5 minutes).
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Maximum connection lifetime (30 minutes).
const POOL_MAX_LIFETIME: Duration = Duration::from_secs(1800);

type TiberiusClient = Client<Compat<TcpStream>>;

/// Connection manager for bb8 pool with Tiberius.
#[derive(Clone)]
pub struct TiberiusConnectionManager {
    config: SourceConfig,
}

impl TiberiusConnectionManager {
    fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    fn build_config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.config.host);
        config.port(self.config.port);
        config.database(&self.config.database);
        config.application_name("mssql-schema-collector");
        config.authentication(AuthMethod::sql_server(
            &self.config.user,
            &self.config.password,
        ));

        // Encryption settings
        if self.config.encrypt {
            if self.config.trust_server_cert {
                config.trust_cert();
            }
            config.encryption(EncryptionLevel::Required);
        } else {
            config.encryption(EncryptionLevel::NotSupported);
        }

        config
    }
}

#[async_trait]
impl bb8::ManageConnection for TiberiusConnectionManager {
    type Connection = TiberiusClient;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let config = self.build_config();
        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            })?;

        tcp.set_nodelay(true).ok();

        Client::connect(config, tcp.compat_write()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// SQL Server catalog source with connection pooling.
pub struct MssqlSource {
    pool: Pool<TiberiusConnectionManager>,
    config: SourceConfig,
}

impl MssqlSource {
    /// Create a pooled source and verify connectivity.
    pub async fn new(config: SourceConfig) -> Result<Self> {
        let manager = TiberiusConnectionManager::new(config.clone());
        let pool = Pool::builder()
            .max_size(config.max_connections)
            .min_idle(Some(1))
            .connection_timeout(POOL_CONNECTION_TIMEOUT)
            .idle_timeout(Some(POOL_IDLE_TIMEOUT))
            .max_lifetime(Some(POOL_MAX_LIFETIME))
            .build(manager)
            .await
            .map_err(|e| CollectorError::pool(e.to_string(), "creating MSSQL pool"))?;

        let source = Self { pool, config };
        source.server_version().await?;

        info!(
            "Connected to MSSQL: {}:{}/{} (pool_size={})",
            source.config.host,
            source.config.port,
            source.config.database,
            source.config.max_connections
        );

        Ok(source)
    }

    async fn get_client(&self) -> Result<PooledConnection<'static, TiberiusConnectionManager>> {
        self.pool
            .get_owned()
            .await
            .map_err(|e| CollectorError::pool(e.to_string(), "checking out a connection"))
    }

    /// `@@VERSION` of the connected server.
    pub async fn server_version(&self) -> Result<String> {
        let mut client = self.get_client().await?;
        let row = client
            .simple_query("SELECT CAST(@@VERSION AS NVARCHAR(4000))")
            .await?
            .into_row()
            .await?;

        Ok(row
            .and_then(|r| r.get::<&str, _>(0).map(str::to_string))
            .unwrap_or_default())
    }
}

#[async_trait]
impl CatalogSource for MssqlSource {
    async fn list_databases(&self) -> Result<Vec<String>> {
        if !self.config.databases.is_empty() {
            return Ok(self.config.databases.clone());
        }

        let mut cursor = MssqlCursor::new(self.get_client().await?, "master");
        let rows = cursor
            .query_fields(&CatalogQuery::Databases, RowMode::Stringified)
            .await?;

        let databases: Vec<String> = rows
            .iter()
            .filter_map(|row| crate::catalog::field_text(row, "name"))
            .collect();
        debug!("Discovered {} databases", databases.len());
        Ok(databases)
    }

    async fn open_cursor(&self, database: &str) -> Result<Box<dyn CatalogCursor>> {
        let mut client = self.get_client().await?;
        client
            .simple_query(format!("USE {}", quote_identifier(database)))
            .await?
            .into_results()
            .await?;
        Ok(Box::new(MssqlCursor::new(client, database)))
    }

    fn source_type(&self) -> &str {
        "mssql"
    }
}

/// Cursor over one pooled connection.
pub struct MssqlCursor {
    client: PooledConnection<'static, TiberiusConnectionManager>,
    database: String,
    columns: Vec<String>,
    rows: Vec<Vec<CatalogValue>>,
}

impl MssqlCursor {
    fn new(client: PooledConnection<'static, TiberiusConnectionManager>, database: &str) -> Self {
        Self {
            client,
            database: database.to_string(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }
}

#[async_trait]
impl CatalogCursor for MssqlCursor {
    async fn execute(&mut self, query: &CatalogQuery) -> Result<()> {
        let rendered = query.render()?;
        let mut q = Query::new(rendered.sql);
        for param in rendered.params {
            q.bind(param);
        }

        let mut stream = q.query(&mut *self.client).await.map_err(|e| {
            CollectorError::query(query.name(), format!("{} (database {})", e, self.database))
        })?;

        self.columns = stream
            .columns()
            .await?
            .map(|cols| cols.iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let rows = stream.into_first_result().await?;
        self.rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(convert_column).collect())
            .collect();
        Ok(())
    }

    async fn fetch_all(&mut self) -> Result<Vec<Vec<CatalogValue>>> {
        Ok(std::mem::take(&mut self.rows))
    }

    fn column_names(&self) -> Vec<String> {
        self.columns.clone()
    }
}

/// Narrow a driver value to the catalog scalar set.
fn convert_column(data: ColumnData<'static>) -> CatalogValue {
    match data {
        ColumnData::U8(v) => v.map(i64::from).into(),
        ColumnData::I16(v) => v.map(i64::from).into(),
        ColumnData::I32(v) => v.map(i64::from).into(),
        ColumnData::I64(v) => v.into(),
        ColumnData::F32(v) => v.map(f64::from).into(),
        ColumnData::F64(v) => v.into(),
        ColumnData::Bit(v) => v.into(),
        ColumnData::String(v) => v.map(|s| s.into_owned()).into(),
        ColumnData::Guid(v) => v.map(|g| g.to_string()).into(),
        ColumnData::Numeric(v) => v.map(|n| n.to_string()).into(),
        // Catalog queries never select binary or temporal columns
        _ => CatalogValue::Null,
    }
}

/// Bracket-quote an identifier for `USE`.
fn quote_identifier(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}
