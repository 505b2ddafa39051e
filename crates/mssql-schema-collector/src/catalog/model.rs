//! Catalog entities as they appear in the export document.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::FieldMap;
use crate::error::{CollectorError, Result};

/// A schema and the tables collected for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// schema_id, as text.
    pub id: String,

    /// Schema name.
    pub name: String,

    /// Owning principal, as text.
    pub principal_id: Option<String>,

    /// Tables collected so far.
    #[serde(default)]
    pub tables: Vec<Table>,
}

impl Schema {
    /// Build a schema from a stringified schema-listing row.
    pub fn from_fields(fields: &FieldMap) -> Result<Self> {
        Ok(Self {
            id: required_text(fields, "id", "schemas")?,
            name: required_text(fields, "name", "schemas")?,
            principal_id: field_text(fields, "principal_id"),
            tables: Vec::new(),
        })
    }

    /// Copy of the schema's own metadata without its tables.
    pub fn without_tables(&self) -> Self {
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            principal_id: self.principal_id.clone(),
            tables: Vec::new(),
        }
    }
}

/// A table and its four independently populated detail collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// object_id, as text. Stable for the duration of a cycle.
    pub id: String,

    /// Table name.
    pub name: String,

    /// Column rows in ordinal order.
    #[serde(default)]
    pub columns: Vec<FieldMap>,

    /// Index rows.
    #[serde(default)]
    pub indexes: Vec<FieldMap>,

    /// Partition rows.
    #[serde(default)]
    pub partitions: Vec<FieldMap>,

    /// Foreign key rows.
    #[serde(default)]
    pub foreign_keys: Vec<FieldMap>,
}

impl Table {
    /// Create a bare table descriptor.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
            partitions: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Build a bare table from a table-listing row (`object_id`, `name`).
    pub fn from_fields(fields: &FieldMap) -> Result<Self> {
        Ok(Self::new(
            required_text(fields, "object_id", "tables")?,
            required_text(fields, "name", "tables")?,
        ))
    }
}

/// Text form of a field, or `None` when absent or NULL.
pub fn field_text(fields: &FieldMap, key: &str) -> Option<String> {
    value_text(fields.get(key)?)
}

/// Text form of a JSON scalar, or `None` for NULL and containers.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn required_text(fields: &FieldMap, key: &str, query: &str) -> Result<String> {
    field_text(fields, key).ok_or_else(|| {
        CollectorError::query(query, format!("row is missing required field '{}'", key))
    })
}
