//! Change events

use crate::capture::diff::DiffRenderer;
use crate::models::Row;
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use std::fmt;

/// Row lifecycle transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Add,
    Update,
    Delete,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Add => "ADD",
            EventKind::Update => "UPDATE",
            EventKind::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// One captured row change. ADD carries only `new`, DELETE only `old`,
/// UPDATE both; the constructors are the only way to build one.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    timestamp: DateTime<Utc>,
    kind: EventKind,
    table: String,
    old: Option<Row>,
    new: Option<Row>,
}

impl ChangeEvent {
    pub fn added(table: &str, new: Row) -> Self {
        Self::new(EventKind::Add, table, None, Some(new))
    }

    pub fn updated(table: &str, old: Row, new: Row) -> Self {
        Self::new(EventKind::Update, table, Some(old), Some(new))
    }

    pub fn deleted(table: &str, old: Row) -> Self {
        Self::new(EventKind::Delete, table, Some(old), None)
    }

    fn new(kind: EventKind, table: &str, old: Option<Row>, new: Option<Row>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            table: table.to_string(),
            old,
            new,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn old(&self) -> Option<&Row> {
        self.old.as_ref()
    }

    pub fn new_row(&self) -> Option<&Row> {
        self.new.as_ref()
    }

    /// Console presentation: a bold header followed by the structural diff
    pub fn render(&self) -> String {
        format!(
            "New {} event on table: {}\n{}\n",
            self.kind.to_string().bold(),
            self.table.bold(),
            DiffRenderer::render(self.kind, self.old(), self.new_row())
        )
    }
}
