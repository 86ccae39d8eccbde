//! ovsdb-mon - interactive OVSDB monitoring shell
//!
//! Connects to an OVSDB server, mirrors the selected tables and lets the
//! operator:
//! - watch row changes as they happen, rendered as colored structural diffs
//! - start and stop capturing them, and save the captured log as JSON
//! - list table content, filtered by a field and projected to some columns
//!
//! The schema is fetched at runtime, so any OVSDB database works without
//! generated code.

mod capture;
mod cli;
mod config;
mod error;
mod filter;
mod introspection;
mod models;
mod replica;
mod shell;
mod state;

use crate::capture::EventLog;
use crate::cli::Cli;
use crate::config::Settings;
use crate::models::DatabaseModel;
use crate::replica::{OvsdbClient, Replica, ReplicaCache};
use crate::shell::Shell;
use crate::state::MonitorContext;
use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let settings = Settings::load(&cli)?;
    if settings.shell.no_color {
        colored::control::set_override(false);
    }
    info!("Configuration loaded, endpoint {}", settings.endpoint);

    let mut client = OvsdbClient::connect(&settings.endpoint)
        .await
        .with_context(|| format!("Failed to connect to {}", settings.endpoint))?;

    let database = match &settings.database {
        Some(database) => database.clone(),
        None => client
            .discover_database()
            .await
            .context("Failed to discover the database")?,
    };
    let schema = client
        .get_schema(&database)
        .await
        .with_context(|| format!("Failed to fetch the schema of {}", database))?;

    let model = Arc::new(DatabaseModel::new(schema));
    let tables = model.select_tables(&settings.monitor, &settings.no_monitor)?;

    // Register the log before the initial snapshot so --auto captures it
    let events = Arc::new(EventLog::new(settings.auto_start, tables.clone()));
    info!("Monitoring tables: {}", events.tables_to_monitor().join(", "));
    let cache = Arc::new(ReplicaCache::new(Arc::clone(&model)));
    cache.add_event_handler(events.clone());

    let initial = client
        .monitor(model.schema(), &tables)
        .await
        .context("Failed to subscribe to table updates")?;
    cache.apply(&initial)?;
    let rows: usize = tables.iter().map(|t| cache.len(t)).sum();
    info!("Initial snapshot of {}: {} rows", model.name(), rows);

    // The cache reports itself disconnected once this task ends, which
    // turns replica-backed commands into NoActiveConnection errors
    let update_cache = Arc::clone(&cache);
    let updates = tokio::spawn(async move {
        if let Err(e) = client.run(update_cache).await {
            error!("Database connection closed: {}", e);
        }
    });

    let replica: Arc<dyn Replica> = cache;
    let ctx = Arc::new(MonitorContext::new(
        model,
        events,
        Some(replica),
        settings.shell.clone(),
    ));

    let shell = Shell::new(ctx);
    let command = settings.command;
    let result = tokio::task::spawn_blocking(move || {
        if command.is_empty() {
            shell.run()
        } else {
            shell.run_once(&command)
        }
    })
    .await?;

    updates.abort();
    result
}

/// Logs go to stderr so they never interleave with events and listings
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .compact(),
        )
        .init();
}
