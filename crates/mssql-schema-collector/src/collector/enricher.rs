//! Table enrichment.
//!
//! Runs the column, index, partition and foreign key queries for one chunk of
//! tables and attaches each result row to the table it belongs to.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::catalog::{value_text, CatalogQuery, FieldMap, RowMode, Schema, Table};
use crate::error::Result;
use crate::source::CatalogCursor;

/// Tables of one chunk with their detail collections filled.
#[derive(Debug, Clone)]
pub struct Enrichment {
    /// Column rows attached to a table of the chunk.
    pub columns_count: usize,

    /// The chunk in its input order.
    pub tables: Vec<Table>,
}

/// Chunk tables addressable by object id and, for column rows, by name.
struct ChunkIndex {
    tables: Vec<Table>,
    by_id: HashMap<String, usize>,
    id_by_name: HashMap<String, String>,
}

impl ChunkIndex {
    fn new(tables: Vec<Table>) -> Self {
        let mut by_id = HashMap::with_capacity(tables.len());
        let mut id_by_name = HashMap::with_capacity(tables.len());
        for (slot, table) in tables.iter().enumerate() {
            by_id.insert(table.id.clone(), slot);
            id_by_name.insert(table.name.clone(), table.id.clone());
        }
        Self {
            tables,
            by_id,
            id_by_name,
        }
    }

    fn ids(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.id.clone()).collect()
    }

    fn by_name(&mut self, name: &str) -> Option<&mut Table> {
        let id = self.id_by_name.get(name)?;
        let slot = *self.by_id.get(id)?;
        self.tables.get_mut(slot)
    }

    fn by_id(&mut self, id: &str) -> Option<&mut Table> {
        let slot = *self.by_id.get(id)?;
        self.tables.get_mut(slot)
    }
}

#[derive(Clone, Copy)]
enum Detail {
    Indexes,
    Partitions,
    ForeignKeys,
}

impl Detail {
    fn query(self, table_ids: Vec<String>) -> CatalogQuery {
        match self {
            Detail::Indexes => CatalogQuery::Indexes { table_ids },
            Detail::Partitions => CatalogQuery::Partitions { table_ids },
            Detail::ForeignKeys => CatalogQuery::ForeignKeys { table_ids },
        }
    }

    fn collection(self, table: &mut Table) -> &mut Vec<FieldMap> {
        match self {
            Detail::Indexes => &mut table.indexes,
            Detail::Partitions => &mut table.partitions,
            Detail::ForeignKeys => &mut table.foreign_keys,
        }
    }
}

/// Enrich one chunk of tables belonging to `schema`.
///
/// An empty chunk issues no queries.
pub async fn enrich_tables(
    cursor: &mut dyn CatalogCursor,
    chunk: Vec<Table>,
    schema: &Schema,
) -> Result<Enrichment> {
    if chunk.is_empty() {
        return Ok(Enrichment {
            columns_count: 0,
            tables: chunk,
        });
    }

    let mut index = ChunkIndex::new(chunk);
    let columns_count = attach_columns(cursor, &mut index, schema).await?;
    for detail in [Detail::Indexes, Detail::Partitions, Detail::ForeignKeys] {
        attach_details(cursor, &mut index, detail).await?;
    }

    Ok(Enrichment {
        columns_count,
        tables: index.tables,
    })
}

async fn attach_columns(
    cursor: &mut dyn CatalogCursor,
    index: &mut ChunkIndex,
    schema: &Schema,
) -> Result<usize> {
    let query = CatalogQuery::Columns {
        table_ids: index.ids(),
        schema: schema.name.clone(),
    };
    let rows = cursor.query_fields(&query, RowMode::Stringified).await?;
    let mut attached = 0;

    for mut row in rows {
        normalize_nullable(&mut row);
        let table_name = row.shift_remove("table_name").as_ref().and_then(value_text);
        match table_name.as_deref().and_then(|name| index.by_name(name)) {
            Some(table) => {
                table.columns.push(row);
                attached += 1;
            }
            None => debug!(
                "Dropping column row for table {:?} not in chunk ({}.{})",
                table_name,
                schema.name,
                row.get("name").and_then(value_text).unwrap_or_default()
            ),
        }
    }
    Ok(attached)
}

async fn attach_details(
    cursor: &mut dyn CatalogCursor,
    index: &mut ChunkIndex,
    detail: Detail,
) -> Result<()> {
    let query = detail.query(index.ids());
    let rows = cursor.query_fields(&query, RowMode::Raw).await?;

    for mut row in rows {
        let Some(id) = row.shift_remove("id").as_ref().and_then(value_text) else {
            warn!("{} row without a table id, skipping", query.name());
            continue;
        };
        match index.by_id(&id) {
            Some(table) => detail.collection(table).push(row),
            None => warn!("{} row references unknown table id {}", query.name(), id),
        }
    }
    Ok(())
}

/// `IS_NULLABLE` arrives as "YES"/"NO"; export it as a boolean. Only "no" and
/// "false" mean not nullable.
fn normalize_nullable(row: &mut FieldMap) {
    if let Some(value) = row.get_mut("nullable") {
        let nullable = match &*value {
            Value::String(s) => !s.eq_ignore_ascii_case("no") && !s.eq_ignore_ascii_case("false"),
            Value::Bool(b) => *b,
            _ => true,
        };
        *value = Value::Bool(nullable);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{BatchAccumulator, ColumnLimits, ExportEnvelope};
    use crate::testing::{
        CapturedLogs, FakeCatalog, FakeDatabase, FakeSchema, FakeTable, RecordingSubmitter,
    };
    use serde_json::json;
    use std::sync::Arc;
    use tracing::Level;

    fn dbo() -> Schema {
        Schema {
            id: "1".into(),
            name: "dbo".into(),
            principal_id: None,
            tables: Vec::new(),
        }
    }

    fn catalog() -> FakeCatalog {
        FakeCatalog::new(vec![FakeDatabase::new(
            "sales",
            vec![FakeSchema::new(
                1,
                "dbo",
                vec![
                    FakeTable::new(10, "orders")
                        .with_columns(3)
                        .with_index("pk_orders")
                        .with_foreign_key("fk_orders_customers")
                        .with_rows(42),
                    FakeTable::new(11, "customers").with_columns(2).with_index("pk_customers"),
                ],
            )],
        )])
    }

    #[tokio::test]
    async fn test_enrich_attaches_every_collection() {
        let catalog = catalog();
        let mut cursor = catalog.cursor("sales");
        let chunk = vec![Table::new("11", "customers"), Table::new("10", "orders")];

        let enrichment = enrich_tables(&mut cursor, chunk, &dbo()).await.unwrap();

        assert_eq!(enrichment.columns_count, 5);
        let names: Vec<&str> = enrichment.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["customers", "orders"]);

        let orders = &enrichment.tables[1];
        assert_eq!(orders.columns.len(), 3);
        assert_eq!(
            serde_json::Value::Object(orders.columns[0].clone()),
            json!({"name": "c1", "data_type": "int", "default": null, "nullable": true})
        );
        assert_eq!(orders.columns[1]["nullable"], json!(false));
        assert_eq!(orders.indexes.len(), 1);
        assert_eq!(orders.indexes[0]["name"], "pk_orders");
        assert!(orders.indexes[0].get("id").is_none());
        assert_eq!(orders.partitions[0]["row_count"], json!(42));
        assert_eq!(orders.foreign_keys[0]["foreign_key_name"], "fk_orders_customers");

        let customers = &enrichment.tables[0];
        assert_eq!(customers.columns.len(), 2);
        assert!(customers.foreign_keys.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_rows_dropped_and_not_counted() {
        let catalog = catalog().with_stray_rows();
        let (logs, _guard) = CapturedLogs::install();
        let mut cursor = catalog.cursor("sales");

        let enrichment = enrich_tables(&mut cursor, vec![Table::new("10", "orders")], &dbo())
            .await
            .unwrap();

        assert_eq!(enrichment.columns_count, 3);
        let attached: usize = enrichment.tables.iter().map(|t| t.columns.len()).sum();
        assert_eq!(attached, 3);
        assert_eq!(enrichment.tables[0].foreign_keys.len(), 1);
        assert!(logs
            .messages(Level::WARN)
            .iter()
            .any(|m| m.contains("unknown table id 999999")));
    }

    #[tokio::test]
    async fn test_empty_chunk_runs_no_queries() {
        let catalog = catalog();
        let mut cursor = catalog.cursor("sales");
        let enrichment = enrich_tables(&mut cursor, Vec::new(), &dbo()).await.unwrap();
        assert_eq!(enrichment.columns_count, 0);
        assert!(enrichment.tables.is_empty());
        assert!(catalog.queries().is_empty());
    }

    #[tokio::test]
    async fn test_query_order_and_failure() {
        let catalog = catalog();
        catalog.fail_query("sales", "partitions");
        let mut cursor = catalog.cursor("sales");

        let err = enrich_tables(&mut cursor, vec![Table::new("10", "orders")], &dbo())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("partitions"));
        assert_eq!(
            catalog.queries(),
            vec!["sales:columns", "sales:indexes", "sales:partitions"]
        );
    }

    #[test]
    fn test_normalize_nullable() {
        let mut row = FieldMap::new();
        row.insert("nullable".into(), json!("NO"));
        normalize_nullable(&mut row);
        assert_eq!(row["nullable"], json!(false));

        row.insert("nullable".into(), json!("YES"));
        normalize_nullable(&mut row);
        assert_eq!(row["nullable"], json!(true));

        row.insert("nullable".into(), json!("False"));
        normalize_nullable(&mut row);
        assert_eq!(row["nullable"], json!(false));

        row.insert("nullable".into(), Value::Null);
        normalize_nullable(&mut row);
        assert_eq!(row["nullable"], json!(true));

        row.insert("nullable".into(), json!(0));
        normalize_nullable(&mut row);
        assert_eq!(row["nullable"], json!(true));
    }

    #[tokio::test]
    async fn test_stored_count_matches_buffered_columns() {
        let catalog = catalog().with_stray_rows();
        let mut cursor = catalog.cursor("sales");
        let schema = dbo();
        let chunk = vec![Table::new("10", "orders"), Table::new("11", "customers")];
        let enrichment = enrich_tables(&mut cursor, chunk, &schema).await.unwrap();

        let envelope = ExportEnvelope {
            host: "sql01".into(),
            agent_version: "0.1.0".into(),
            tags: Vec::new(),
            cloud_metadata: json!({}),
            dbms: "sqlserver".into(),
            dbms_version: None,
            kind: "sqlserver_databases".into(),
            collection_interval: 600.0,
        };
        let mut acc = BatchAccumulator::new(
            envelope,
            ColumnLimits {
                per_batch: 100,
                per_cycle: 1000,
            },
            Arc::new(RecordingSubmitter::default()),
        );
        let buffered: usize = enrichment.tables.iter().map(|t| t.columns.len()).sum();
        acc.store("sales", &schema, enrichment.tables, enrichment.columns_count)
            .await
            .unwrap();

        assert_eq!(buffered, 5);
        assert_eq!(acc.batch_columns(), buffered);
        assert_eq!(acc.cycle_columns(), buffered);
    }
}
