//! Replica cache
//!
//! Holds the rows of every subscribed table, keyed by uuid. Monitor table
//! updates are applied under the cache lock; the resulting notifications
//! are dispatched to the registered handlers after the lock is released,
//! in the order the updates listed them.

use crate::error::{not_found, MonitorError, MonitorResult};
use crate::models::{DatabaseModel, Row, Value};
use crate::replica::{ConditionalQuery, EventHandler, Replica};
use parking_lot::RwLock;
use serde_json::Map;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

type JsonObject = Map<String, serde_json::Value>;

/// One row entry of a `<table-updates>` object
#[derive(Debug, Clone)]
pub struct RowUpdate {
    pub table: String,
    pub uuid: String,
    pub old: Option<JsonObject>,
    pub new: Option<JsonObject>,
}

/// Flatten `{table: {uuid: {"old": {...}, "new": {...}}}}`
pub fn parse_table_updates(json: &serde_json::Value) -> MonitorResult<Vec<RowUpdate>> {
    let tables = json
        .as_object()
        .ok_or_else(|| MonitorError::Protocol(format!("invalid table updates: {}", json)))?;

    let mut updates = Vec::new();
    for (table, rows) in tables {
        let rows = rows
            .as_object()
            .ok_or_else(|| MonitorError::Protocol(format!("invalid updates for table {}", table)))?;
        for (uuid, change) in rows {
            let object = |key: &str| change.get(key).and_then(|v| v.as_object()).cloned();
            updates.push(RowUpdate {
                table: table.clone(),
                uuid: uuid.clone(),
                old: object("old"),
                new: object("new"),
            });
        }
    }
    Ok(updates)
}

enum Notification {
    Add(String, Row),
    Update(String, Row, Row),
    Delete(String, Row),
}

/// In-memory mirror of the subscribed tables
pub struct ReplicaCache {
    model: Arc<DatabaseModel>,
    /// Table -> (uuid -> row)
    rows: RwLock<BTreeMap<String, BTreeMap<String, Row>>>,
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
    /// Cleared once the update feed has ended
    connected: AtomicBool,
}

impl ReplicaCache {
    pub fn new(model: Arc<DatabaseModel>) -> Self {
        Self {
            model,
            rows: RwLock::new(BTreeMap::new()),
            handlers: RwLock::new(Vec::new()),
            connected: AtomicBool::new(true),
        }
    }

    /// The server stopped feeding updates; the rows are stale from now on
    pub fn mark_disconnected(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            info!("Replica of {} disconnected", self.model.name());
        }
    }

    /// Register a receiver for every subsequent change
    pub fn add_event_handler(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().push(handler);
    }

    /// Apply a `<table-updates>` JSON object. Returns the number of
    /// notifications dispatched.
    pub fn apply(&self, table_updates: &serde_json::Value) -> MonitorResult<usize> {
        let updates = parse_table_updates(table_updates)?;
        Ok(self.apply_updates(updates))
    }

    pub fn apply_updates(&self, updates: Vec<RowUpdate>) -> usize {
        let mut notifications = Vec::with_capacity(updates.len());
        {
            let mut rows = self.rows.write();
            for update in updates {
                match self.apply_one(&mut rows, update) {
                    Ok(Some(notification)) => notifications.push(notification),
                    Ok(None) => {}
                    Err(e) => warn!("Dropping malformed row update: {}", e),
                }
            }
        }

        let count = notifications.len();
        let handlers = self.handlers.read().clone();
        for notification in notifications {
            for handler in &handlers {
                match &notification {
                    Notification::Add(table, row) => handler.on_add(table, row),
                    Notification::Update(table, old, new) => handler.on_update(table, old, new),
                    Notification::Delete(table, row) => handler.on_delete(table, row),
                }
            }
        }
        debug!("Applied {} row changes", count);
        count
    }

    fn apply_one(
        &self,
        rows: &mut BTreeMap<String, BTreeMap<String, Row>>,
        update: RowUpdate,
    ) -> MonitorResult<Option<Notification>> {
        let Ok(row_type) = self.model.row_type(&update.table) else {
            debug!("Ignoring update for unknown table {}", update.table);
            return Ok(None);
        };
        let table_rows = rows.entry(update.table.clone()).or_default();
        let cached = table_rows.get(&update.uuid).cloned();
        let RowUpdate { table, uuid, old, new } = update;

        let notification = match (old, new) {
            (None, Some(new)) => {
                let row = row_type.row_from_wire(&uuid, &new, None)?;
                table_rows.insert(uuid, row.clone());
                match cached {
                    Some(previous) => Notification::Update(table, previous, row),
                    None => Notification::Add(table, row),
                }
            }
            (Some(old), Some(new)) => {
                let row = row_type.row_from_wire(&uuid, &new, cached.as_ref())?;
                let previous = match cached {
                    Some(previous) => previous,
                    // "old" only carries the modified columns
                    None => row_type.row_from_wire(&uuid, &old, Some(&row))?,
                };
                table_rows.insert(uuid, row.clone());
                Notification::Update(table, previous, row)
            }
            (Some(old), None) => {
                table_rows.remove(&uuid);
                let previous = match cached {
                    Some(previous) => previous,
                    None => row_type.row_from_wire(&uuid, &old, None)?,
                };
                Notification::Delete(table, previous)
            }
            (None, None) => return Ok(None),
        };

        Ok(Some(notification))
    }

    /// Number of cached rows of a table
    pub fn len(&self, table: &str) -> usize {
        self.rows.read().get(table).map_or(0, BTreeMap::len)
    }
}

impl Replica for ReplicaCache {
    fn model(&self) -> &Arc<DatabaseModel> {
        &self.model
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn list(&self, table: &str) -> MonitorResult<Vec<Row>> {
        self.model.row_type(table)?;
        let rows = self.rows.read();
        Ok(rows
            .get(table)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default())
    }

    fn where_row(&self, row: Row) -> Box<dyn ConditionalQuery + '_> {
        Box::new(CacheQuery {
            cache: self,
            condition: row,
        })
    }
}

struct CacheQuery<'a> {
    cache: &'a ReplicaCache,
    condition: Row,
}

impl ConditionalQuery for CacheQuery<'_> {
    fn list(&self) -> MonitorResult<Vec<Row>> {
        let conditions: Vec<(&str, &Value)> = self
            .condition
            .fields()
            .filter(|(_, value)| !value.is_zero())
            .collect();

        let rows = self.cache.rows.read();
        let matched: Vec<Row> = rows
            .get(self.condition.table())
            .map(|t| {
                t.values()
                    .filter(|row| conditions.iter().all(|(field, value)| row.get(field) == Some(*value)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if matched.is_empty() {
            return Err(not_found(format!(
                "no rows of {} match the condition",
                self.condition.table()
            )));
        }
        Ok(matched)
    }
}
