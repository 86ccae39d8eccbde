//! Runtime row types
//!
//! Every table gets a [`RowType`] built from its schema: an ordered list of
//! fields with canonical names (`external_ids` becomes `ExternalIDs`). Rows
//! carry a handle to their type plus one [`Value`] per field, so two rows of
//! the same table always enumerate their fields in the same order.

use crate::error::{unknown_field, MonitorError, MonitorResult};
use crate::models::schema::{AtomicType, TableSchema, ValueKind};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Canonical name of the implicit row identifier field
pub const UUID_FIELD: &str = "UUID";

/// Wire name of the row identifier column
pub const UUID_COLUMN: &str = "_uuid";

/// Name fragments rendered fully upper-cased in field names
const ACRONYMS: &[(&str, &str)] = &[
    ("id", "ID"),
    ("ids", "IDs"),
    ("uuid", "UUID"),
    ("ip", "IP"),
    ("mac", "MAC"),
    ("dns", "DNS"),
    ("acl", "ACL"),
    ("acls", "ACLs"),
    ("nat", "NAT"),
    ("qos", "QoS"),
    ("tcp", "TCP"),
    ("udp", "UDP"),
];

/// Derive the canonical field name of a column
pub fn field_name(column: &str) -> String {
    if column == UUID_COLUMN {
        return UUID_FIELD.to_string();
    }

    let name: String = column
        .split(|c| c == '_' || c == '-' || c == ':')
        .filter(|part| !part.is_empty())
        .map(|part| match ACRONYMS.iter().find(|(lower, _)| *lower == part) {
            Some((_, upper)) => upper.to_string(),
            None => {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        })
        .collect();

    if name.is_empty() {
        column.to_string()
    } else {
        name
    }
}

/// A single typed value of a row field
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Uuid(String),
    Optional(Option<Box<Value>>),
    Set(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// The zero value of a kind, as held by a freshly instantiated row
    pub fn zero(kind: &ValueKind) -> Value {
        match kind {
            ValueKind::Scalar(atomic) => Self::zero_atom(*atomic),
            ValueKind::Optional(_) => Value::Optional(None),
            ValueKind::Set(_) => Value::Set(Vec::new()),
            ValueKind::Map(_, _) => Value::Map(BTreeMap::new()),
        }
    }

    fn zero_atom(atomic: AtomicType) -> Value {
        match atomic {
            AtomicType::String => Value::String(String::new()),
            AtomicType::Integer => Value::Integer(0),
            AtomicType::Real => Value::Real(0.0),
            AtomicType::Boolean => Value::Boolean(false),
            AtomicType::Uuid => Value::Uuid(String::new()),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Value::String(s) | Value::Uuid(s) => s.is_empty(),
            Value::Integer(i) => *i == 0,
            Value::Real(r) => *r == 0.0,
            Value::Boolean(b) => !b,
            Value::Optional(o) => o.is_none(),
            Value::Set(items) => items.is_empty(),
            Value::Map(entries) => entries.is_empty(),
        }
    }

    /// Decode a value from OVSDB wire notation
    pub fn from_wire(json: &serde_json::Value, kind: &ValueKind) -> MonitorResult<Value> {
        match kind {
            ValueKind::Scalar(atomic) => Self::atom_from_wire(json, *atomic),
            ValueKind::Optional(atomic) => match tagged(json, "set") {
                Some(elements) => {
                    let elements = as_array(elements)?;
                    match elements.as_slice() {
                        [] => Ok(Value::Optional(None)),
                        [single] => Ok(Value::Optional(Some(Box::new(Self::atom_from_wire(
                            single, *atomic,
                        )?)))),
                        _ => Err(MonitorError::Protocol(format!(
                            "optional value with {} elements",
                            elements.len()
                        ))),
                    }
                }
                None => Ok(Value::Optional(Some(Box::new(Self::atom_from_wire(
                    json, *atomic,
                )?)))),
            },
            ValueKind::Set(atomic) => {
                let mut items = match tagged(json, "set") {
                    Some(elements) => as_array(elements)?
                        .iter()
                        .map(|e| Self::atom_from_wire(e, *atomic))
                        .collect::<MonitorResult<Vec<_>>>()?,
                    None => vec![Self::atom_from_wire(json, *atomic)?],
                };
                // Sets are unordered on the wire
                items.sort_by_key(|v| v.to_string());
                Ok(Value::Set(items))
            }
            ValueKind::Map(key_type, value_type) => {
                let pairs = tagged(json, "map")
                    .ok_or_else(|| MonitorError::Protocol(format!("expected map, got {}", json)))?;
                let mut entries = BTreeMap::new();
                for pair in as_array(pairs)? {
                    match as_array(pair)?.as_slice() {
                        [k, v] => {
                            let key = Self::atom_from_wire(k, *key_type)?;
                            entries.insert(key.to_string(), Self::atom_from_wire(v, *value_type)?);
                        }
                        _ => {
                            return Err(MonitorError::Protocol(format!(
                                "invalid map entry: {}",
                                pair
                            )))
                        }
                    }
                }
                Ok(Value::Map(entries))
            }
        }
    }

    fn atom_from_wire(json: &serde_json::Value, atomic: AtomicType) -> MonitorResult<Value> {
        let value = match atomic {
            AtomicType::String => json.as_str().map(|s| Value::String(s.to_string())),
            AtomicType::Integer => json.as_i64().map(Value::Integer),
            AtomicType::Real => json.as_f64().map(Value::Real),
            AtomicType::Boolean => json.as_bool().map(Value::Boolean),
            AtomicType::Uuid => tagged(json, "uuid")
                .or_else(|| tagged(json, "named-uuid"))
                .and_then(|u| u.as_str())
                .map(|u| Value::Uuid(u.to_string())),
        };
        value.ok_or_else(|| {
            MonitorError::Protocol(format!("expected {} atom, got {}", atomic, json))
        })
    }
}

/// `["<tag>", payload]` -> payload
fn tagged<'a>(json: &'a serde_json::Value, tag: &str) -> Option<&'a serde_json::Value> {
    match json.as_array().map(Vec::as_slice) {
        Some([serde_json::Value::String(t), payload]) if t == tag => Some(payload),
        _ => None,
    }
}

fn as_array(json: &serde_json::Value) -> MonitorResult<&Vec<serde_json::Value>> {
    json.as_array()
        .ok_or_else(|| MonitorError::Protocol(format!("expected array, got {}", json)))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) | Value::Uuid(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Optional(None) => Ok(()),
            Value::Optional(Some(v)) => write!(f, "{}", v),
            Value::Set(items) => {
                let items: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Value::Map(entries) => {
                let entries: Vec<String> =
                    entries.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                write!(f, "{{{}}}", entries.join(", "))
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::String(s) | Value::Uuid(s) => serializer.serialize_str(s),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Real(r) => serializer.serialize_f64(*r),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Optional(None) => serializer.serialize_none(),
            Value::Optional(Some(v)) => serializer.serialize_some(v.as_ref()),
            Value::Set(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

/// Field definition of a row type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Canonical field name
    pub name: String,
    /// Column name on the wire
    pub column: String,
    pub kind: ValueKind,
}

/// The shape of one table's rows
#[derive(Debug)]
pub struct RowType {
    table: String,
    fields: Vec<FieldDef>,
}

impl RowType {
    /// Build the row type of a table: `UUID` first, then every column
    pub fn from_schema(table: &str, schema: &TableSchema) -> Self {
        let mut fields = vec![FieldDef {
            name: UUID_FIELD.to_string(),
            column: UUID_COLUMN.to_string(),
            kind: ValueKind::Scalar(AtomicType::Uuid),
        }];

        fields.extend(
            schema
                .columns
                .iter()
                .filter(|(column, _)| column.as_str() != UUID_COLUMN)
                .map(|(column, col)| FieldDef {
                    name: field_name(column),
                    column: column.clone(),
                    kind: col.column_type.kind(),
                }),
        );

        Self {
            table: table.to_string(),
            fields,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Position of a field given its canonical name
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Instantiate a row holding the zero value of every field
    pub fn zero_row(self: &Arc<Self>) -> Row {
        Row {
            row_type: Arc::clone(self),
            values: self.fields.iter().map(|f| Value::zero(&f.kind)).collect(),
        }
    }

    /// Set a string field of a row by its canonical name
    pub fn set_field(&self, row: &mut Row, field: &str, value: &str) -> MonitorResult<()> {
        let idx = self
            .field_index(field)
            .ok_or_else(|| unknown_field(&self.table, field))?;

        let def = &self.fields[idx];
        row.values[idx] = match def.kind {
            ValueKind::Scalar(AtomicType::String) => Value::String(value.to_string()),
            ValueKind::Scalar(AtomicType::Uuid) => Value::Uuid(value.to_string()),
            _ => {
                return Err(MonitorError::UnsupportedFilterType {
                    table: self.table.clone(),
                    field: def.name.clone(),
                })
            }
        };
        Ok(())
    }

    /// Build a row from the column object of a monitor update.
    /// Columns missing from the object keep the value they have in `base`
    /// (or the zero value when there is no base).
    pub fn row_from_wire(
        self: &Arc<Self>,
        uuid: &str,
        columns: &serde_json::Map<String, serde_json::Value>,
        base: Option<&Row>,
    ) -> MonitorResult<Row> {
        let mut row = match base {
            Some(base) => base.clone(),
            None => self.zero_row(),
        };
        row.values[0] = Value::Uuid(uuid.to_string());

        for (idx, def) in self.fields.iter().enumerate().skip(1) {
            if let Some(json) = columns.get(&def.column) {
                row.values[idx] = Value::from_wire(json, &def.kind)?;
            }
        }
        Ok(row)
    }
}

/// One record of a table
#[derive(Debug, Clone)]
pub struct Row {
    row_type: Arc<RowType>,
    values: Vec<Value>,
}

impl Row {
    pub fn table(&self) -> &str {
        self.row_type.table()
    }

    pub fn uuid(&self) -> &str {
        match &self.values[0] {
            Value::Uuid(u) => u,
            _ => "",
        }
    }

    /// Value of a field given its canonical name
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.row_type.field_index(field).map(|idx| &self.values[idx])
    }

    /// Fields in declared order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.row_type
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .zip(self.values.iter())
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.table() == other.table() && self.values == other.values
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.fields() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
