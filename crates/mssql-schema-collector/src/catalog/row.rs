//! Maps positional result rows onto named field maps.

use serde_json::Value;

use super::value::CatalogValue;
use super::FieldMap;
use crate::error::{CollectorError, Result};

/// Result-set alias for the column default. `default` is a reserved word in
/// T-SQL, so queries select `column_default` and the mapper renames it.
const COLUMN_DEFAULT_ALIAS: &str = "column_default";

/// Field name the export document uses for a column default.
const DEFAULT_FIELD: &str = "default";

/// How values are carried into the field map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowMode {
    /// Keep the catalog type (ids, flags and counts stay numeric).
    Raw,
    /// Coerce every non-null value to text.
    Stringified,
}

/// Normalize a result-set column name to its export field name.
pub fn normalize_field_name(column: &str) -> String {
    let lowered = column.to_lowercase();
    if lowered == COLUMN_DEFAULT_ALIAS {
        DEFAULT_FIELD.to_string()
    } else {
        lowered
    }
}

/// Map a single row.
pub fn map_row(fields: &[String], row: Vec<CatalogValue>, mode: RowMode) -> Result<FieldMap> {
    if fields.len() != row.len() {
        return Err(CollectorError::RowShape {
            expected: fields.len(),
            actual: row.len(),
        });
    }

    Ok(fields
        .iter()
        .cloned()
        .zip(row)
        .map(|(name, value)| {
            let value: Value = match mode {
                RowMode::Raw => value.into_json(),
                RowMode::Stringified => value.into_json_text(),
            };
            (name, value)
        })
        .collect())
}

/// Map a whole result set. Column names are normalized once.
pub fn map_rows(
    columns: &[String],
    rows: Vec<Vec<CatalogValue>>,
    mode: RowMode,
) -> Result<Vec<FieldMap>> {
    let fields: Vec<String> = columns.iter().map(|c| normalize_field_name(c)).collect();
    rows.into_iter()
        .map(|row| map_row(&fields, row, mode))
        .collect()
}
