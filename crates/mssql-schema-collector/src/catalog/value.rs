//! Values returned by catalog queries.
//!
//! Catalog views only ever hand back a small set of scalar types (ids,
//! flags, counts, names), so the cursor contract narrows every driver value
//! to [`CatalogValue`] before the row mapper sees it.

use serde_json::{Number, Value};

/// A single scalar read from a catalog query.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogValue {
    /// SQL NULL.
    Null,

    /// bit.
    Bool(bool),

    /// Any integer type (tinyint through bigint).
    Int(i64),

    /// real / float / decimal read as a double.
    Float(f64),

    /// Character data, GUIDs and dates rendered by the driver.
    Text(String),
}

impl CatalogValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, CatalogValue::Null)
    }

    /// Text form of the value, or `None` for NULL.
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        match self {
            CatalogValue::Null => None,
            CatalogValue::Bool(v) => Some(v.to_string()),
            CatalogValue::Int(v) => Some(v.to_string()),
            CatalogValue::Float(v) => Some(v.to_string()),
            CatalogValue::Text(v) => Some(v.clone()),
        }
    }

    /// Convert to JSON keeping the catalog type.
    #[must_use]
    pub fn into_json(self) -> Value {
        match self {
            CatalogValue::Null => Value::Null,
            CatalogValue::Bool(v) => Value::Bool(v),
            CatalogValue::Int(v) => Value::Number(v.into()),
            // NaN and infinities have no JSON form
            CatalogValue::Float(v) => Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null),
            CatalogValue::Text(v) => Value::String(v),
        }
    }

    /// Convert to JSON as text; NULL stays `null`.
    #[must_use]
    pub fn into_json_text(self) -> Value {
        match self {
            CatalogValue::Text(v) => Value::String(v),
            other => other.to_text().map(Value::String).unwrap_or(Value::Null),
        }
    }
}

impl From<bool> for CatalogValue {
    fn from(v: bool) -> Self {
        CatalogValue::Bool(v)
    }
}

impl From<i32> for CatalogValue {
    fn from(v: i32) -> Self {
        CatalogValue::Int(v as i64)
    }
}

impl From<i64> for CatalogValue {
    fn from(v: i64) -> Self {
        CatalogValue::Int(v)
    }
}

impl From<f64> for CatalogValue {
    fn from(v: f64) -> Self {
        CatalogValue::Float(v)
    }
}

impl From<&str> for CatalogValue {
    fn from(v: &str) -> Self {
        CatalogValue::Text(v.to_string())
    }
}

impl From<String> for CatalogValue {
    fn from(v: String) -> Self {
        CatalogValue::Text(v)
    }
}

impl<T: Into<CatalogValue>> From<Option<T>> for CatalogValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(CatalogValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_forms() {
        assert_eq!(CatalogValue::Int(42).to_text().as_deref(), Some("42"));
        assert_eq!(CatalogValue::Bool(false).to_text().as_deref(), Some("false"));
        assert_eq!(CatalogValue::Null.to_text(), None);
    }

    #[test]
    fn test_json_keeps_types() {
        assert_eq!(CatalogValue::Int(7).into_json(), json!(7));
        assert_eq!(CatalogValue::Bool(true).into_json(), json!(true));
        assert_eq!(CatalogValue::Float(f64::NAN).into_json(), Value::Null);
        assert_eq!(CatalogValue::Int(7).into_json_text(), json!("7"));
        assert_eq!(CatalogValue::Null.into_json_text(), Value::Null);
    }

    #[test]
    fn test_from_option() {
        let v: CatalogValue = Option::<i64>::None.into();
        assert!(v.is_null());
        let v: CatalogValue = Some("dbo").into();
        assert_eq!(v, CatalogValue::Text("dbo".into()));
    }
}
