//! Event Capture Log
//!
//! Records every notified row change while capture is enabled, prints it
//! to the console and exports the history as JSON. All state sits behind
//! one reader-writer lock: notifications hold it exclusively across the
//! enabled check, the console print and the append, so the log order and
//! the printed order are the same.

use crate::capture::event::ChangeEvent;
use crate::error::{MonitorError, MonitorResult};
use crate::models::Row;
use crate::replica::EventHandler;
use parking_lot::{Mutex, RwLock, RwLockUpgradableReadGuard};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info, warn};

struct MonitorState {
    enabled: bool,
    events: Vec<ChangeEvent>,
}

/// Append-only log of captured change events
pub struct EventLog {
    state: RwLock<MonitorState>,
    tables_to_monitor: Vec<String>,
    console: Mutex<Box<dyn Write + Send>>,
}

impl EventLog {
    /// Log printing captured events to stdout
    pub fn new(enabled: bool, tables_to_monitor: Vec<String>) -> Self {
        Self::with_console(enabled, tables_to_monitor, Box::new(io::stdout()))
    }

    pub fn with_console(
        enabled: bool,
        tables_to_monitor: Vec<String>,
        console: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            state: RwLock::new(MonitorState {
                enabled,
                events: Vec::new(),
            }),
            tables_to_monitor,
            console: Mutex::new(console),
        }
    }

    /// Tables whose changes are delivered to this log
    pub fn tables_to_monitor(&self) -> &[String] {
        &self.tables_to_monitor
    }

    pub fn set_monitoring(&self, enabled: bool) {
        self.state.write().enabled = enabled;
        info!("Event capture {}", if enabled { "started" } else { "stopped" });
    }

    #[cfg(test)]
    pub fn is_enabled(&self) -> bool {
        self.state.read().enabled
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.state.read().events.len()
    }

    /// Copy of the captured events in capture order
    #[cfg(test)]
    pub fn events(&self) -> Vec<ChangeEvent> {
        self.state.read().events.clone()
    }

    /// Write every captured event to `path` as a JSON array indented with
    /// four spaces. Returns the number of events written.
    pub fn export(&self, path: &Path) -> MonitorResult<usize> {
        let state = self.state.read();

        let mut writer = BufWriter::new(File::create(path)?);
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
        // Write failures surface through serde_json; keep them as I/O errors
        state.events.serialize(&mut serializer).map_err(|e| {
            if e.is_io() {
                MonitorError::Io(e.into())
            } else {
                MonitorError::Json(e)
            }
        })?;
        writer.flush()?;

        info!("Exported {} events to {}", state.events.len(), path.display());
        Ok(state.events.len())
    }

    fn capture(&self, build: impl FnOnce() -> ChangeEvent) {
        let state = self.state.upgradable_read();
        if !state.enabled {
            return;
        }
        let mut state = RwLockUpgradableReadGuard::upgrade(state);

        let event = build();
        self.print(&event);
        debug!(
            "Captured {} event on {} row {} at {}",
            event.kind(),
            event.table(),
            event.new_row().or(event.old()).map_or("", Row::uuid),
            event.timestamp()
        );
        state.events.push(event);
    }

    fn print(&self, event: &ChangeEvent) {
        let mut console = self.console.lock();
        if let Err(e) = console
            .write_all(event.render().as_bytes())
            .and_then(|_| console.flush())
        {
            warn!("Failed to print event: {}", e);
        }
    }
}

impl EventHandler for EventLog {
    fn on_add(&self, table: &str, row: &Row) {
        self.capture(|| ChangeEvent::added(table, row.clone()));
    }

    fn on_update(&self, table: &str, old: &Row, new: &Row) {
        self.capture(|| ChangeEvent::updated(table, old.clone(), new.clone()));
    }

    fn on_delete(&self, table: &str, row: &Row) {
        self.capture(|| ChangeEvent::deleted(table, row.clone()));
    }
}
