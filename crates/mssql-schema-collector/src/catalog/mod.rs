//! Catalog entities, query templates and result-row mapping.

mod model;
mod queries;
mod row;
mod value;

pub use model::{field_text, value_text, Schema, Table};
pub use queries::{CatalogQuery, RenderedQuery};
pub use row::{map_row, map_rows, normalize_field_name, RowMode};
pub use value::CatalogValue;

/// A mapped result row: normalized field name to value, in column order.
pub type FieldMap = serde_json::Map<String, serde_json::Value>;
