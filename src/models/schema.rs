//! OVSDB schema description
//!
//! The schema is discovered from the server at connection time
//! (`get_schema`), never compiled in. Column types are classified into a
//! [`ValueKind`] so the rest of the crate can reason about values without
//! looking at the raw JSON notation again.

use crate::error::MonitorError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// A complete database schema
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSchema {
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub tables: BTreeMap<String, TableSchema>,
}

impl DatabaseSchema {
    /// Parse a schema from the JSON returned by `get_schema`
    pub fn from_json(value: serde_json::Value) -> Result<Self, MonitorError> {
        let schema: DatabaseSchema = serde_json::from_value(value)?;
        if schema.tables.is_empty() {
            return Err(MonitorError::Schema(format!(
                "database {} declares no tables",
                schema.name
            )));
        }
        Ok(schema)
    }
}

/// Table representation
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub columns: BTreeMap<String, ColumnSchema>,
    /// Each entry is a group of column names forming one index
    #[serde(default)]
    pub indexes: Vec<Vec<String>>,
}

/// Column representation
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnSchema {
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

/// Atomic OVSDB types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomicType {
    String,
    Integer,
    Real,
    Boolean,
    Uuid,
}

impl AtomicType {
    fn parse(name: &str) -> Result<Self, MonitorError> {
        match name {
            "string" => Ok(AtomicType::String),
            "integer" => Ok(AtomicType::Integer),
            "real" => Ok(AtomicType::Real),
            "boolean" => Ok(AtomicType::Boolean),
            "uuid" => Ok(AtomicType::Uuid),
            other => Err(MonitorError::Schema(format!("unknown atomic type: {}", other))),
        }
    }
}

impl fmt::Display for AtomicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AtomicType::String => "string",
            AtomicType::Integer => "integer",
            AtomicType::Real => "real",
            AtomicType::Boolean => "boolean",
            AtomicType::Uuid => "uuid",
        };
        f.write_str(name)
    }
}

/// Key or value type of a column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseType {
    pub atomic: AtomicType,
    pub ref_table: Option<String>,
}

impl BaseType {
    fn from_json(value: &serde_json::Value) -> Result<Self, MonitorError> {
        match value {
            serde_json::Value::String(name) => Ok(Self {
                atomic: AtomicType::parse(name)?,
                ref_table: None,
            }),
            serde_json::Value::Object(obj) => {
                let name = obj
                    .get("type")
                    .and_then(|t| t.as_str())
                    .ok_or_else(|| MonitorError::Schema(format!("base type without 'type': {}", value)))?;
                Ok(Self {
                    atomic: AtomicType::parse(name)?,
                    ref_table: obj.get("refTable").and_then(|t| t.as_str()).map(str::to_string),
                })
            }
            other => Err(MonitorError::Schema(format!("invalid base type: {}", other))),
        }
    }
}

/// Column type: a key, an optional value (maps) and cardinality bounds
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "serde_json::Value")]
pub struct ColumnType {
    pub key: BaseType,
    pub value: Option<BaseType>,
    pub min: u64,
    /// `None` means "unlimited"
    pub max: Option<u64>,
}

impl TryFrom<serde_json::Value> for ColumnType {
    type Error = MonitorError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        if value.is_string() {
            return Ok(Self {
                key: BaseType::from_json(&value)?,
                value: None,
                min: 1,
                max: Some(1),
            });
        }

        let obj = value
            .as_object()
            .ok_or_else(|| MonitorError::Schema(format!("invalid column type: {}", value)))?;
        let key = obj
            .get("key")
            .ok_or_else(|| MonitorError::Schema(format!("column type without key: {}", value)))?;

        let max = match obj.get("max") {
            None => Some(1),
            Some(serde_json::Value::String(s)) if s == "unlimited" => None,
            Some(m) => Some(
                m.as_u64()
                    .ok_or_else(|| MonitorError::Schema(format!("invalid max: {}", m)))?,
            ),
        };

        Ok(Self {
            key: BaseType::from_json(key)?,
            value: obj.get("value").map(BaseType::from_json).transpose()?,
            min: obj.get("min").and_then(|m| m.as_u64()).unwrap_or(1),
            max,
        })
    }
}

/// Shape of a column's values as seen by row consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Exactly one atom
    Scalar(AtomicType),
    /// Zero or one atom
    Optional(AtomicType),
    /// Any number of atoms
    Set(AtomicType),
    /// Key/value pairs
    Map(AtomicType, AtomicType),
}

impl ValueKind {
    /// Filters can only be applied to plain string values (uuids included)
    pub fn is_string(&self) -> bool {
        matches!(
            self,
            ValueKind::Scalar(AtomicType::String) | ValueKind::Scalar(AtomicType::Uuid)
        )
    }
}

impl ColumnType {
    pub fn kind(&self) -> ValueKind {
        if let Some(value) = &self.value {
            return ValueKind::Map(self.key.atomic, value.atomic);
        }
        match (self.min, self.max) {
            (1, Some(1)) => ValueKind::Scalar(self.key.atomic),
            (0, Some(1)) => ValueKind::Optional(self.key.atomic),
            _ => ValueKind::Set(self.key.atomic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use serde_json::json;

    #[test]
    fn test_parse_fixture_schema() {
        let schema = fixtures::schema();
        assert_eq!(schema.name, "Test_DB");
        assert_eq!(schema.tables.len(), 2);

        let foo = &schema.tables["Foo"];
        assert_eq!(foo.indexes.len(), 3);
        assert_eq!(schema.tables["Bridge"].indexes, vec![vec!["name".to_string()]]);
    }

    #[test]
    fn test_column_kinds() {
        let foo = &fixtures::schema().tables["Foo"];
        let kind = |col: &str| foo.columns[col].column_type.kind();

        assert_eq!(kind("bar"), ValueKind::Scalar(AtomicType::String));
        assert_eq!(kind("idnum"), ValueKind::Scalar(AtomicType::Integer));
        assert_eq!(kind("tags"), ValueKind::Set(AtomicType::String));
        assert_eq!(
            kind("external_ids"),
            ValueKind::Map(AtomicType::String, AtomicType::String)
        );
        assert_eq!(kind("parent"), ValueKind::Optional(AtomicType::Uuid));
    }

    #[test]
    fn test_ref_table_is_kept() {
        let foo = &fixtures::schema().tables["Foo"];
        assert_eq!(
            foo.columns["parent"].column_type.key.ref_table.as_deref(),
            Some("Bridge")
        );
    }

    #[test]
    fn test_only_scalar_strings_are_filterable() {
        assert!(ValueKind::Scalar(AtomicType::String).is_string());
        assert!(ValueKind::Scalar(AtomicType::Uuid).is_string());
        assert!(!ValueKind::Optional(AtomicType::String).is_string());
        assert!(!ValueKind::Scalar(AtomicType::Integer).is_string());
    }

    #[test]
    fn test_schema_without_tables_is_rejected() {
        let result = DatabaseSchema::from_json(json!({"name": "Empty", "tables": {}}));
        assert!(matches!(result, Err(MonitorError::Schema(_))));
    }

    #[test]
    fn test_unknown_atomic_type_is_rejected() {
        let result = ColumnType::try_from(json!({"key": "float"}));
        assert!(result.is_err());
    }
}
