//! Command Surface Generator
//!
//! Completion candidates for the shell, computed from the introspection
//! data and the arguments typed so far. Candidates are returned unfiltered;
//! the editor keeps the ones matching the word under the cursor.

use crate::introspection::{Introspector, TableDescriptor};
use std::collections::HashSet;

pub const FILTER_FLAG: &str = "--filter";

/// Candidates for the next argument of `list <table>`
pub fn candidates(table: &TableDescriptor, prefix: &str, args: &[&str]) -> Vec<String> {
    let options: Vec<String> = if !args.contains(&FILTER_FLAG) {
        table
            .field_names()
            .into_iter()
            .chain(std::iter::once(FILTER_FLAG.to_string()))
            .collect()
    } else if args.last() == Some(&FILTER_FLAG) {
        table.index_fields.iter().map(|f| format!("{}=", f)).collect()
    } else {
        table.field_names()
    };

    with_lowercase(options, prefix)
}

/// Table names for `list`; lower-cased aliases once the user starts typing
pub fn table_candidates(introspector: &Introspector, prefix: &str) -> Vec<String> {
    let names = introspector
        .table_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    with_lowercase(names, prefix)
}

fn with_lowercase(options: Vec<String>, prefix: &str) -> Vec<String> {
    if prefix.is_empty() {
        return options;
    }

    let mut seen: HashSet<String> = options.iter().cloned().collect();
    let lowered: Vec<String> = options
        .iter()
        .map(|o| o.to_lowercase())
        .filter(|o| seen.insert(o.clone()))
        .collect();

    options.into_iter().chain(lowered).collect()
}
