//! Structural Diff Renderer
//!
//! Rows are rendered to a canonical multi-line text (one field per line,
//! nested collections expanded) and compared line by line, so an UPDATE
//! shows exactly the fields whose values changed.

use crate::capture::event::EventKind;
use crate::models::{Row, Value};
use colored::Colorize;
use std::fmt;

const INDENT: &str = "    ";

/// Classification of a rendered line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffClass {
    Added,
    Removed,
    Unchanged,
}

/// A single line of a structural diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub class: DiffClass,
    pub text: String,
}

/// The renderer that formats change events
pub struct DiffRenderer;

impl DiffRenderer {
    /// Colorized rendering of one change
    pub fn render(kind: EventKind, old: Option<&Row>, new: Option<&Row>) -> String {
        match (kind, old, new) {
            (EventKind::Add, _, Some(new)) => Self::canonical(new).green().to_string(),
            (EventKind::Delete, Some(old), _) => Self::canonical(old).red().to_string(),
            (EventKind::Update, Some(old), Some(new)) => Self::diff_rows(old, new)
                .iter()
                .map(|line| match line.class {
                    DiffClass::Added => format!("+{}", line.text).green().to_string(),
                    DiffClass::Removed => format!("-{}", line.text).red().to_string(),
                    DiffClass::Unchanged => format!(" {}", line.text),
                })
                .collect::<Vec<_>>()
                .join("\n"),
            // Unreachable through ChangeEvent's constructors
            _ => String::new(),
        }
    }

    /// Line-level comparison of the canonical forms of two rows
    pub fn diff_rows(old: &Row, new: &Row) -> Vec<DiffLine> {
        let old_text = Self::canonical(old);
        let new_text = Self::canonical(new);
        let old_lines: Vec<&str> = old_text.lines().collect();
        let new_lines: Vec<&str> = new_text.lines().collect();
        Self::diff_lines(&old_lines, &new_lines)
    }

    /// Longest-common-subsequence line diff. Within a changed region
    /// removals come before additions. The common prefix and suffix are
    /// matched directly, so the table only spans the changed middle.
    pub fn diff_lines(old: &[&str], new: &[&str]) -> Vec<DiffLine> {
        let prefix = old
            .iter()
            .zip(new)
            .take_while(|(a, b)| a == b)
            .count();
        let suffix = old[prefix..]
            .iter()
            .rev()
            .zip(new[prefix..].iter().rev())
            .take_while(|(a, b)| a == b)
            .count();

        let line = |class, text: &str| DiffLine {
            class,
            text: text.to_string(),
        };

        let mut out = Vec::with_capacity(old.len().max(new.len()));
        out.extend(old[..prefix].iter().map(|l| line(DiffClass::Unchanged, l)));
        Self::diff_middle(
            &old[prefix..old.len() - suffix],
            &new[prefix..new.len() - suffix],
            &mut out,
        );
        out.extend(
            old[old.len() - suffix..]
                .iter()
                .map(|l| line(DiffClass::Unchanged, l)),
        );
        out
    }

    fn diff_middle(old: &[&str], new: &[&str], out: &mut Vec<DiffLine>) {
        let (n, m) = (old.len(), new.len());
        let line = |class, text: &str| DiffLine {
            class,
            text: text.to_string(),
        };

        // lcs[i][j] = LCS length of old[i..] and new[j..]
        let mut lcs = vec![vec![0u32; m + 1]; n + 1];
        for i in (0..n).rev() {
            for j in (0..m).rev() {
                lcs[i][j] = if old[i] == new[j] {
                    lcs[i + 1][j + 1] + 1
                } else {
                    lcs[i + 1][j].max(lcs[i][j + 1])
                };
            }
        }

        let (mut i, mut j) = (0, 0);
        while i < n && j < m {
            if old[i] == new[j] {
                out.push(line(DiffClass::Unchanged, old[i]));
                i += 1;
                j += 1;
            } else if lcs[i + 1][j] >= lcs[i][j + 1] {
                out.push(line(DiffClass::Removed, old[i]));
                i += 1;
            } else {
                out.push(line(DiffClass::Added, new[j]));
                j += 1;
            }
        }
        out.extend(old[i..].iter().map(|l| line(DiffClass::Removed, l)));
        out.extend(new[j..].iter().map(|l| line(DiffClass::Added, l)));
    }

    /// Canonical multi-line form of a row, fields in declared order
    pub fn canonical(row: &Row) -> String {
        Canonical(row).to_string()
    }
}

/// Display adapter producing the canonical form of a row
struct Canonical<'a>(&'a Row);

impl fmt::Display for Canonical<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {{", self.0.table())?;
        for (name, value) in self.0.fields() {
            write!(f, "{}{}: ", INDENT, name)?;
            write_value(f, value, 1)?;
            writeln!(f, ",")?;
        }
        write!(f, "}}")
    }
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &Value, depth: usize) -> fmt::Result {
    let pad = INDENT.repeat(depth);
    match value {
        Value::String(s) | Value::Uuid(s) => write!(f, "{:?}", s),
        Value::Integer(i) => write!(f, "{}", i),
        Value::Real(r) => write!(f, "{}", r),
        Value::Boolean(b) => write!(f, "{}", b),
        Value::Optional(None) => f.write_str("null"),
        Value::Optional(Some(inner)) => write_value(f, inner, depth),
        Value::Set(items) if items.is_empty() => f.write_str("[]"),
        Value::Set(items) => {
            writeln!(f, "[")?;
            for item in items {
                write!(f, "{}{}", pad, INDENT)?;
                write_value(f, item, depth + 1)?;
                writeln!(f, ",")?;
            }
            write!(f, "{}]", pad)
        }
        Value::Map(entries) if entries.is_empty() => f.write_str("{}"),
        Value::Map(entries) => {
            writeln!(f, "{{")?;
            for (key, item) in entries {
                write!(f, "{}{}{:?}: ", pad, INDENT, key)?;
                write_value(f, item, depth + 1)?;
                writeln!(f, ",")?;
            }
            write!(f, "{}}}", pad)
        }
    }
}
