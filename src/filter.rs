//! Filter Query Builder
//!
//! Translates `field=value` into a conditional replica query: a zero-valued
//! row of the table's type with only the named field set, handed to the
//! replica's `where_row`.

use crate::error::{invalid_expression, unknown_field, MonitorError, MonitorResult};
use crate::introspection::Introspector;
use crate::replica::{ConditionalQuery, Replica};

/// Split `field=value`. Exactly one `=`, both sides non-empty.
pub fn parse_expression(expression: &str) -> MonitorResult<(&str, &str)> {
    let parts: Vec<&str> = expression.split('=').collect();
    match parts.as_slice() {
        [field, value] if !field.is_empty() && !value.is_empty() => Ok((field, value)),
        _ => Err(invalid_expression(expression)),
    }
}

/// Builds conditional queries against one replica
pub struct FilterBuilder<'a> {
    introspector: &'a Introspector,
    replica: &'a dyn Replica,
}

impl<'a> FilterBuilder<'a> {
    pub fn new(introspector: &'a Introspector, replica: &'a dyn Replica) -> Self {
        Self {
            introspector,
            replica,
        }
    }

    /// Build the query selecting rows of `table` matching `expression`
    pub fn build(&self, table: &str, expression: &str) -> MonitorResult<Box<dyn ConditionalQuery + 'a>> {
        let descriptor = self.introspector.table(table)?;
        let (field, value) = parse_expression(expression)?;

        let field = descriptor
            .exact_field_name(field)
            .and_then(|name| descriptor.field(name))
            .ok_or_else(|| unknown_field(table, field))?;

        if !field.value_kind.is_string() {
            return Err(MonitorError::UnsupportedFilterType {
                table: table.to_string(),
                field: field.name.clone(),
            });
        }

        let mut condition = descriptor.row_type.zero_row();
        descriptor
            .row_type
            .set_field(&mut condition, &field.name, value)?;

        let replica: &'a dyn Replica = self.replica;
        Ok(replica.where_row(condition))
    }
}
