//! Data models
//!
//! Schema description, runtime row types and the per-database registry.

pub mod database;
pub mod row;
pub mod schema;

pub use database::DatabaseModel;
pub use row::{Row, RowType, Value, UUID_FIELD};
pub use schema::{DatabaseSchema, ValueKind};

/// Shared test schema: `Foo` (string, numeric and collection columns,
/// single and multi-column indexes) and `Bridge` (one string index).
#[cfg(test)]
pub mod fixtures {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    pub fn schema_json() -> serde_json::Value {
        json!({
            "name": "Test_DB",
            "version": "1.0.0",
            "tables": {
                "Foo": {
                    "columns": {
                        "bar": {"type": "string"},
                        "idnum": {"type": "integer"},
                        "enabled": {"type": "boolean"},
                        "tags": {"type": {"key": "string", "min": 0, "max": "unlimited"}},
                        "external_ids": {"type": {"key": "string", "value": "string", "min": 0, "max": "unlimited"}},
                        "parent": {"type": {"key": {"type": "uuid", "refTable": "Bridge"}, "min": 0, "max": 1}}
                    },
                    "indexes": [["bar"], ["idnum"], ["bar", "idnum"]]
                },
                "Bridge": {
                    "columns": {
                        "name": {"type": "string"},
                        "ports": {"type": {"key": "string", "min": 0, "max": "unlimited"}}
                    },
                    "indexes": [["name"]],
                    "isRoot": true
                }
            }
        })
    }

    pub fn schema() -> DatabaseSchema {
        DatabaseSchema::from_json(schema_json()).unwrap()
    }

    pub fn model() -> Arc<DatabaseModel> {
        Arc::new(DatabaseModel::new(schema()))
    }

    pub fn foo_row(model: &DatabaseModel, uuid: &str, bar: &str, idnum: i64) -> Row {
        let columns = json!({"bar": bar, "idnum": idnum});
        model.types()["Foo"]
            .row_from_wire(uuid, columns.as_object().unwrap(), None)
            .unwrap()
    }

    pub fn bridge_row(model: &DatabaseModel, uuid: &str, name: &str) -> Row {
        let columns = json!({"name": name});
        model.types()["Bridge"]
            .row_from_wire(uuid, columns.as_object().unwrap(), None)
            .unwrap()
    }
}
