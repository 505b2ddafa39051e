//! Catalog query templates.
//!
//! Scalar parameters are bound as `@P1`; object id lists are spliced into
//! the text after every id has been checked to be an integer.

use crate::error::{CollectorError, Result};

/// Online user databases the login can access.
const DATABASES_QUERY: &str = r#"
    SELECT name
    FROM sys.databases
    WHERE state = 0
      AND database_id > 4
      AND HAS_DBACCESS(name) = 1
    ORDER BY name
"#;

const DATABASE_INFO_QUERY: &str = r#"
    SELECT
        db.name AS name,
        db.database_id AS id,
        db.collation_name AS collation,
        SUSER_SNAME(db.owner_sid) AS owner,
        db.compatibility_level AS compatibility_level
    FROM sys.databases db
    WHERE db.name = @P1
"#;

const SCHEMAS_QUERY: &str = r#"
    SELECT
        s.name AS name,
        s.schema_id AS id,
        s.principal_id AS principal_id
    FROM sys.schemas s
    WHERE s.name NOT IN ('sys', 'INFORMATION_SCHEMA', 'guest')
      AND s.schema_id < 16384
    ORDER BY s.name
"#;

const TABLES_QUERY: &str = r#"
    SELECT
        t.object_id AS object_id,
        t.name AS name
    FROM sys.tables t
    WHERE t.schema_id = @P1
      AND t.is_ms_shipped = 0
"#;

// OBJECT_NAME resolves ids to names server-side so names with quotes or
// brackets never appear in the query text.
const COLUMNS_QUERY: &str = r#"
    SELECT
        c.COLUMN_NAME AS name,
        c.DATA_TYPE AS data_type,
        c.COLUMN_DEFAULT AS column_default,
        c.IS_NULLABLE AS nullable,
        c.TABLE_NAME AS table_name
    FROM INFORMATION_SCHEMA.COLUMNS c
    WHERE c.TABLE_NAME IN ({table_names})
      AND c.TABLE_SCHEMA = @P1
    ORDER BY c.TABLE_NAME, c.ORDINAL_POSITION
"#;

const PARTITIONS_QUERY: &str = r#"
    SELECT
        p.object_id AS id,
        COUNT(DISTINCT p.partition_number) AS partition_count,
        SUM(CASE WHEN p.index_id IN (0, 1) THEN p.rows ELSE 0 END) AS row_count
    FROM sys.partitions p
    WHERE p.object_id IN ({table_ids})
    GROUP BY p.object_id
"#;

const INDEXES_QUERY: &str = r#"
    SELECT
        i.object_id AS id,
        i.name AS name,
        i.type_desc AS type,
        i.is_unique,
        i.is_primary_key,
        i.is_unique_constraint,
        i.is_disabled,
        STUFF((
            SELECT ',' + c.name
            FROM sys.index_columns ic
            JOIN sys.columns c ON ic.object_id = c.object_id AND ic.column_id = c.column_id
            WHERE ic.object_id = i.object_id AND ic.index_id = i.index_id AND ic.is_included_column = 0
            ORDER BY ic.key_ordinal
            FOR XML PATH('')
        ), 1, 1, '') AS column_names
    FROM sys.indexes i
    WHERE i.object_id IN ({table_ids})
      AND i.type > 0
    ORDER BY i.object_id, i.name
"#;

const FOREIGN_KEYS_QUERY: &str = r#"
    SELECT
        fk.parent_object_id AS id,
        fk.name AS foreign_key_name,
        STUFF((
            SELECT ',' + pc.name
            FROM sys.foreign_key_columns fkc
            JOIN sys.columns pc ON fkc.parent_object_id = pc.object_id AND fkc.parent_column_id = pc.column_id
            WHERE fkc.constraint_object_id = fk.object_id
            ORDER BY fkc.constraint_column_id
            FOR XML PATH('')
        ), 1, 1, '') AS column_names,
        OBJECT_SCHEMA_NAME(fk.referenced_object_id) AS referenced_schema,
        OBJECT_NAME(fk.referenced_object_id) AS referenced_table,
        STUFF((
            SELECT ',' + rc.name
            FROM sys.foreign_key_columns fkc
            JOIN sys.columns rc ON fkc.referenced_object_id = rc.object_id AND fkc.referenced_column_id = rc.column_id
            WHERE fkc.constraint_object_id = fk.object_id
            ORDER BY fkc.constraint_column_id
            FOR XML PATH('')
        ), 1, 1, '') AS referenced_column_names,
        fk.delete_referential_action_desc AS delete_action,
        fk.update_referential_action_desc AS update_action
    FROM sys.foreign_keys fk
    WHERE fk.parent_object_id IN ({table_ids})
    ORDER BY fk.parent_object_id, fk.name
"#;

/// A catalog query together with its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogQuery {
    /// Database listing for autodiscovery.
    Databases,
    /// Descriptive info for one database.
    DatabaseInfo { database: String },
    /// Schemas of the current database.
    Schemas,
    /// Tables of one schema.
    Tables { schema_id: String },
    /// Columns of a table chunk within a schema.
    Columns { table_ids: Vec<String>, schema: String },
    /// Partition summary of a table chunk.
    Partitions { table_ids: Vec<String> },
    /// Indexes of a table chunk.
    Indexes { table_ids: Vec<String> },
    /// Foreign keys of a table chunk.
    ForeignKeys { table_ids: Vec<String> },
}

/// Query text ready for the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedQuery {
    pub sql: String,
    pub params: Vec<String>,
}

impl CatalogQuery {
    /// Short name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            CatalogQuery::Databases => "databases",
            CatalogQuery::DatabaseInfo { .. } => "database_info",
            CatalogQuery::Schemas => "schemas",
            CatalogQuery::Tables { .. } => "tables",
            CatalogQuery::Columns { .. } => "columns",
            CatalogQuery::Partitions { .. } => "partitions",
            CatalogQuery::Indexes { .. } => "indexes",
            CatalogQuery::ForeignKeys { .. } => "foreign_keys",
        }
    }

    /// Render the template and collect its bound parameters.
    pub fn render(&self) -> Result<RenderedQuery> {
        let (sql, params) = match self {
            CatalogQuery::Databases => (DATABASES_QUERY.to_string(), Vec::new()),
            CatalogQuery::DatabaseInfo { database } => {
                (DATABASE_INFO_QUERY.to_string(), vec![database.clone()])
            }
            CatalogQuery::Schemas => (SCHEMAS_QUERY.to_string(), Vec::new()),
            CatalogQuery::Tables { schema_id } => {
                (TABLES_QUERY.to_string(), vec![schema_id.clone()])
            }
            CatalogQuery::Columns { table_ids, schema } => {
                let names = object_ids(self.name(), table_ids)?
                    .iter()
                    .map(|id| format!("OBJECT_NAME({})", id))
                    .collect::<Vec<_>>()
                    .join(",");
                (
                    COLUMNS_QUERY.replace("{table_names}", &names),
                    vec![schema.clone()],
                )
            }
            CatalogQuery::Partitions { table_ids } => {
                (id_list_query(PARTITIONS_QUERY, self.name(), table_ids)?, Vec::new())
            }
            CatalogQuery::Indexes { table_ids } => {
                (id_list_query(INDEXES_QUERY, self.name(), table_ids)?, Vec::new())
            }
            CatalogQuery::ForeignKeys { table_ids } => {
                (id_list_query(FOREIGN_KEYS_QUERY, self.name(), table_ids)?, Vec::new())
            }
        };
        Ok(RenderedQuery { sql, params })
    }
}

fn id_list_query(template: &str, query: &str, table_ids: &[String]) -> Result<String> {
    let ids = object_ids(query, table_ids)?
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(",");
    Ok(template.replace("{table_ids}", &ids))
}

fn object_ids(query: &str, table_ids: &[String]) -> Result<Vec<i64>> {
    if table_ids.is_empty() {
        return Err(CollectorError::query(query, "empty object id list"));
    }
    table_ids
        .iter()
        .map(|id| {
            id.trim().parse::<i64>().map_err(|_| {
                CollectorError::query(query, format!("'{}' is not a valid object id", id))
            })
        })
        .collect()
}
