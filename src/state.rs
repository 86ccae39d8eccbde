//! Monitor state management
//!
//! The context handed to every shell command: the row-type registry, the
//! introspection data computed from it, the event log and the live
//! replica handle.

use crate::capture::EventLog;
use crate::config::ShellConfig;
use crate::error::{MonitorError, MonitorResult};
use crate::introspection::Introspector;
use crate::models::DatabaseModel;
use crate::replica::Replica;
use std::sync::Arc;

/// State shared by the command handlers
pub struct MonitorContext {
    pub model: Arc<DatabaseModel>,

    /// Per-table fields and index fields, computed once
    pub introspector: Introspector,

    /// Captured events (also the replica's event handler)
    pub events: Arc<EventLog>,

    /// Replica handle, absent when never connected
    pub replica: Option<Arc<dyn Replica>>,

    pub shell: ShellConfig,
}

impl MonitorContext {
    pub fn new(
        model: Arc<DatabaseModel>,
        events: Arc<EventLog>,
        replica: Option<Arc<dyn Replica>>,
        shell: ShellConfig,
    ) -> Self {
        let introspector = Introspector::new(&model);
        Self {
            model,
            introspector,
            events,
            replica,
            shell,
        }
    }

    /// The live replica, or `NoActiveConnection` when there is none or
    /// its connection has closed
    pub fn replica(&self) -> MonitorResult<&dyn Replica> {
        match self.replica.as_deref() {
            Some(replica) if replica.is_connected() => Ok(replica),
            _ => Err(MonitorError::NoActiveConnection),
        }
    }
}
