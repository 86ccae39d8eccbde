//! Replica Module
//!
//! The local, continuously-updated mirror of the remote database and the
//! read-only surface the monitor consumes from it:
//! - [`EventHandler`]: row lifecycle notifications pushed by the replica
//! - [`Replica`]: plain and conditional listings of the current rows
//! - [`ovsdb`]: the JSON-RPC connection that feeds the cache

pub mod cache;
pub mod ovsdb;

pub use cache::ReplicaCache;
pub use ovsdb::OvsdbClient;

use crate::error::MonitorResult;
use crate::models::{DatabaseModel, Row};
use std::sync::Arc;

/// Receiver of row change notifications.
///
/// Called from the replica's update context for every change of a
/// subscribed table, in delivery order.
pub trait EventHandler: Send + Sync {
    fn on_add(&self, table: &str, row: &Row);
    fn on_update(&self, table: &str, old: &Row, new: &Row);
    fn on_delete(&self, table: &str, row: &Row);
}

/// A query restricted by the non-zero fields of a partial row
pub trait ConditionalQuery {
    /// Matching rows. No match yields [`crate::error::MonitorError::NotFound`].
    fn list(&self) -> MonitorResult<Vec<Row>>;
}

/// Read-only access to the replica content
pub trait Replica: Send + Sync {
    fn model(&self) -> &Arc<DatabaseModel>;

    /// False once the connection feeding the replica is gone
    fn is_connected(&self) -> bool;

    /// Every cached row of a table
    fn list(&self, table: &str) -> MonitorResult<Vec<Row>>;

    /// Condition the next listing on the non-zero fields of `row`
    fn where_row(&self, row: Row) -> Box<dyn ConditionalQuery + '_>;
}
