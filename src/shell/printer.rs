//! Table output for listings, and the pager that shows long ones

use crate::config::ShellConfig;
use crate::introspection::TableDescriptor;
use crate::models::Row;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use std::io::{self, IsTerminal, Write};
use std::process::{Command, Stdio};
use tracing::warn;

/// Render rows as a table. `columns` are canonical field names; empty
/// means every field in declared order.
pub fn render_rows(table: &TableDescriptor, rows: &[Row], columns: &[String], no_color: bool) -> String {
    let columns = if columns.is_empty() {
        table.field_names()
    } else {
        columns.to_vec()
    };

    let mut out = Table::new();
    out.load_preset(UTF8_FULL_CONDENSED);
    out.set_content_arrangement(ContentArrangement::Dynamic);

    if no_color {
        out.set_header(&columns);
    } else {
        out.set_header(columns.iter().map(|c| Cell::new(c).fg(Color::Cyan)));
    }

    for row in rows {
        out.add_row(
            columns
                .iter()
                .map(|c| row.get(c).map(ToString::to_string).unwrap_or_default()),
        );
    }

    out.to_string()
}

/// Print `text`, through the pager when stdout is a terminal and the text
/// is longer than the configured page
pub fn show_paged(text: &str, config: &ShellConfig) {
    let stdout = io::stdout();
    if stdout.is_terminal() && text.lines().count() > config.page_lines {
        match run_pager(&config.pager, text) {
            Ok(()) => return,
            Err(e) => warn!("Pager '{}' failed: {}", config.pager, e),
        }
    }

    let mut out = stdout.lock();
    if let Err(e) = writeln!(out, "{}", text) {
        warn!("Failed to write output: {}", e);
    }
}

fn run_pager(pager: &str, text: &str) -> io::Result<()> {
    let mut words = pager.split_whitespace();
    let program = words
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty pager command"))?;

    let mut child = Command::new(program)
        .args(words)
        .stdin(Stdio::piped())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        // The user may quit the pager before reading everything
        match stdin.write_all(text.as_bytes()) {
            Err(e) if e.kind() != io::ErrorKind::BrokenPipe => return Err(e),
            _ => {}
        }
    }
    child.wait()?;
    Ok(())
}
