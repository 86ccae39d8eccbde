//! Schema Introspection Module
//!
//! Turns the runtime row-type registry into per-table descriptors: the
//! ordered field list, which fields are index fields, and what kind of
//! value each one holds. Computed once per connection; every user-facing
//! path that accepts a field name resolves it through here.

use crate::error::{MonitorError, MonitorResult};
use crate::models::{DatabaseModel, RowType, ValueKind, UUID_FIELD};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Field metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Canonical name
    pub name: String,
    /// Column name on the wire
    pub column: String,
    pub is_index_field: bool,
    pub value_kind: ValueKind,
}

/// Table metadata
#[derive(Debug, Clone)]
pub struct TableDescriptor {
    pub name: String,
    /// Fields in declared order, `UUID` first
    pub fields: Vec<FieldDescriptor>,
    /// Single-column index fields, `UUID` first
    pub index_fields: Vec<String>,
    pub row_type: Arc<RowType>,
}

impl TableDescriptor {
    fn build(name: &str, row_type: &Arc<RowType>, indexes: &[Vec<String>]) -> Self {
        let mut descriptor = Self {
            name: name.to_string(),
            fields: row_type
                .fields()
                .iter()
                .map(|f| FieldDescriptor {
                    name: f.name.clone(),
                    column: f.column.clone(),
                    is_index_field: false,
                    value_kind: f.kind,
                })
                .collect(),
            index_fields: vec![UUID_FIELD.to_string()],
            row_type: Arc::clone(row_type),
        };

        for index in indexes {
            // Multi-column indexes cannot be expressed as a single filter
            let [column] = index.as_slice() else {
                debug!("Skipping multi-column index {:?} of table {}", index, name);
                continue;
            };
            if let Some(field) = descriptor.exact_field_name(column).map(str::to_string) {
                if !descriptor.index_fields.contains(&field) {
                    descriptor.index_fields.push(field);
                }
            }
        }

        for field in descriptor.fields.iter_mut() {
            field.is_index_field = descriptor.index_fields.contains(&field.name);
        }

        descriptor
    }

    /// Resolve user input to the canonical field name. Matches either the
    /// field name or the column name, ignoring case.
    pub fn exact_field_name(&self, input: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(input) || f.column.eq_ignore_ascii_case(input))
            .map(|f| f.name.as_str())
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}

/// Per-table introspection data for a whole database
#[derive(Debug)]
pub struct Introspector {
    tables: BTreeMap<String, TableDescriptor>,
}

impl Introspector {
    pub fn new(model: &DatabaseModel) -> Self {
        let tables = model
            .types()
            .iter()
            .map(|(name, row_type)| {
                let indexes = model
                    .schema()
                    .tables
                    .get(name)
                    .map(|t| t.indexes.as_slice())
                    .unwrap_or_default();
                (name.clone(), TableDescriptor::build(name, row_type, indexes))
            })
            .collect();

        Self { tables }
    }

    pub fn table(&self, name: &str) -> MonitorResult<&TableDescriptor> {
        self.tables.get(name).ok_or_else(|| MonitorError::UnknownTable {
            table: name.to_string(),
            available: self.table_names().join(", "),
        })
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    /// Canonical field name of `input` in `table`, if the field exists
    pub fn exact_field_name(&self, table: &str, input: &str) -> Option<&str> {
        self.tables.get(table)?.exact_field_name(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use crate::models::schema::AtomicType;
    use pretty_assertions::assert_eq;

    fn introspector() -> Introspector {
        Introspector::new(&fixtures::model())
    }

    #[test]
    fn test_uuid_is_first_index_field() {
        let intro = introspector();
        for name in intro.table_names() {
            let table = intro.table(name).unwrap();
            assert_eq!(table.index_fields[0], "UUID");
            assert_eq!(table.fields[0].name, "UUID");
        }
    }

    #[test]
    fn test_multi_column_indexes_are_dropped() {
        let intro = introspector();
        let foo = intro.table("Foo").unwrap();
        assert_eq!(foo.index_fields, vec!["UUID", "Bar", "Idnum"]);

        let bridge = intro.table("Bridge").unwrap();
        assert_eq!(bridge.index_fields, vec!["UUID", "Name"]);
    }

    #[test]
    fn test_index_flags_follow_index_list() {
        let intro = introspector();
        let foo = intro.table("Foo").unwrap();
        let indexed: Vec<&str> = foo
            .fields
            .iter()
            .filter(|f| f.is_index_field)
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(indexed, vec!["UUID", "Bar", "Idnum"]);
        assert_eq!(
            foo.field("Idnum").unwrap().value_kind,
            ValueKind::Scalar(AtomicType::Integer)
        );
    }

    #[test]
    fn test_exact_field_name_is_case_insensitive() {
        let intro = introspector();
        assert_eq!(intro.exact_field_name("Foo", "bar"), Some("Bar"));
        assert_eq!(intro.exact_field_name("Foo", "BAR"), Some("Bar"));
        assert_eq!(intro.exact_field_name("Foo", "uuid"), Some("UUID"));
        assert_eq!(intro.exact_field_name("Foo", "baz"), None);
        assert_eq!(intro.exact_field_name("Nope", "bar"), None);
    }

    #[test]
    fn test_exact_field_name_accepts_column_names() {
        let intro = introspector();
        assert_eq!(intro.exact_field_name("Foo", "external_ids"), Some("ExternalIDs"));
        assert_eq!(intro.exact_field_name("Foo", "externalids"), Some("ExternalIDs"));
        assert_eq!(intro.exact_field_name("Foo", "_uuid"), Some("UUID"));
    }

    #[test]
    fn test_unknown_table() {
        let intro = introspector();
        assert!(matches!(
            intro.table("Nope"),
            Err(MonitorError::UnknownTable { .. })
        ));
    }
}
