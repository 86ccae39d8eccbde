//! Database model: the runtime registry of row types
//!
//! Built once per connection from the discovered schema. Replaces the
//! code-generated model types of a compiled client: every table maps to
//! an `Arc<RowType>` shared by all rows of that table.

use crate::error::{MonitorError, MonitorResult};
use crate::models::row::RowType;
use crate::models::schema::DatabaseSchema;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Schema plus one row type per table
#[derive(Debug)]
pub struct DatabaseModel {
    schema: DatabaseSchema,
    types: BTreeMap<String, Arc<RowType>>,
}

impl DatabaseModel {
    pub fn new(schema: DatabaseSchema) -> Self {
        let types = schema
            .tables
            .iter()
            .map(|(name, table)| (name.clone(), Arc::new(RowType::from_schema(name, table))))
            .collect();

        Self { schema, types }
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn schema(&self) -> &DatabaseSchema {
        &self.schema
    }

    /// Table name -> row type
    pub fn types(&self) -> &BTreeMap<String, Arc<RowType>> {
        &self.types
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn row_type(&self, table: &str) -> MonitorResult<&Arc<RowType>> {
        self.types.get(table).ok_or_else(|| self.unknown_table(table))
    }

    /// Resolve a table name typed with any capitalization
    pub fn resolve_table(&self, name: &str) -> MonitorResult<&str> {
        self.table_names()
            .find(|t| t.eq_ignore_ascii_case(name))
            .ok_or_else(|| self.unknown_table(name))
    }

    /// Compute the subscription set: every table named in `monitor` (all
    /// tables when empty) minus every table named in `no_monitor`.
    pub fn select_tables(&self, monitor: &[String], no_monitor: &[String]) -> MonitorResult<Vec<String>> {
        let mut wanted: BTreeSet<&str> = BTreeSet::new();

        let monitor: Vec<&String> = monitor.iter().filter(|t| !t.is_empty()).collect();
        if monitor.is_empty() {
            wanted.extend(self.table_names());
        } else {
            for table in monitor {
                wanted.insert(self.resolve_table(table)?);
            }
        }

        for table in no_monitor.iter().filter(|t| !t.is_empty()) {
            let table = self.resolve_table(table)?;
            wanted.remove(table);
        }

        if wanted.is_empty() {
            return Err(MonitorError::Schema("no tables to monitor".to_string()));
        }

        Ok(wanted.into_iter().map(str::to_string).collect())
    }

    fn unknown_table(&self, table: &str) -> MonitorError {
        MonitorError::UnknownTable {
            table: table.to_string(),
            available: self.table_names().collect::<Vec<_>>().join(", "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use pretty_assertions::assert_eq;

    fn names(tables: &[&str]) -> Vec<String> {
        tables.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_select_all_tables_by_default() {
        let model = fixtures::model();
        let tables = model.select_tables(&[], &[]).unwrap();
        assert_eq!(tables, names(&["Bridge", "Foo"]));
    }

    #[test]
    fn test_select_is_case_insensitive() {
        let model = fixtures::model();
        let tables = model.select_tables(&names(&["foo"]), &[]).unwrap();
        assert_eq!(tables, names(&["Foo"]));
    }

    #[test]
    fn test_no_monitor_removes_tables() {
        let model = fixtures::model();
        let tables = model.select_tables(&[], &names(&["BRIDGE"])).unwrap();
        assert_eq!(tables, names(&["Foo"]));
    }

    #[test]
    fn test_unknown_table_lists_available() {
        let model = fixtures::model();
        let err = model.select_tables(&names(&["Nope"]), &[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Table 'Nope' is unknown. Available tables are: Bridge, Foo"
        );
    }

    #[test]
    fn test_empty_selection_is_an_error() {
        let model = fixtures::model();
        let err = model
            .select_tables(&names(&["Foo"]), &names(&["foo"]))
            .unwrap_err();
        assert!(matches!(err, MonitorError::Schema(_)));
    }
}
