//! Shell commands
//!
//! Parsing and execution are separate: `Command::parse` turns the words
//! of a line into a command, `execute` runs it against a
//! [`MonitorContext`] and returns what to print. Neither touches the
//! terminal.

use crate::error::{unknown_field, MonitorError, MonitorResult};
use crate::filter::FilterBuilder;
use crate::shell::completion::FILTER_FLAG;
use crate::shell::printer::render_rows;
use crate::state::MonitorContext;
use std::path::PathBuf;
use tracing::debug;

/// Name and one-line help of every command
pub const COMMANDS: &[(&str, &str)] = &[
    ("start", "Start monitoring activity of the OVSDB DB"),
    ("stop", "Stop monitoring activity of the OVSDB DB"),
    ("save", "Save events"),
    ("show", "Print available tables"),
    ("list", "List the content of a specific table"),
    ("help", "Display help"),
    ("exit", "Exit the program"),
];

/// Result of a command, ready for display
#[derive(Debug, PartialEq, Eq)]
pub enum CommandOutput {
    Line(String),
    /// Potentially long output, shown through the pager
    Paged(String),
    Silent,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListArgs {
    pub table: String,
    pub filter: Option<String>,
    /// As typed; resolved against the table on execution
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help(Option<String>),
    Start,
    Stop,
    Save(PathBuf),
    Show,
    List(ListArgs),
    Exit,
}

impl Command {
    pub fn parse(words: &[&str]) -> MonitorResult<Self> {
        let Some((name, args)) = words.split_first() else {
            return Err(MonitorError::Usage("empty command".to_string()));
        };

        match *name {
            "start" => Ok(Command::Start),
            "stop" => Ok(Command::Stop),
            "show" => Ok(Command::Show),
            "exit" | "quit" => Ok(Command::Exit),
            "help" => match args {
                ["list", table] => Ok(Command::Help(Some(table.to_string()))),
                _ => Ok(Command::Help(None)),
            },
            "save" => match args {
                [path] => Ok(Command::Save(PathBuf::from(path))),
                _ => Err(MonitorError::Usage("Usage: save <path>".to_string())),
            },
            "list" => Self::parse_list(args),
            other => Err(MonitorError::Usage(format!(
                "Unknown command '{}'. Type 'help' for the list of commands",
                other
            ))),
        }
    }

    fn parse_list(args: &[&str]) -> MonitorResult<Self> {
        let Some((table, rest)) = args.split_first() else {
            return Err(MonitorError::Usage(
                "Usage: list <table> [--filter Field=Value] [Field1 Field2 ...]".to_string(),
            ));
        };

        let mut filter = None;
        let mut columns = Vec::new();
        let mut words = rest.iter();
        while let Some(word) = words.next() {
            if *word != FILTER_FLAG {
                columns.push(word.to_string());
                continue;
            }
            if filter.is_some() {
                return Err(MonitorError::Usage(
                    "Only one --filter statement allowed".to_string(),
                ));
            }
            let expression = words
                .next()
                .ok_or_else(|| MonitorError::Usage("--filter needs a Field=Value argument".to_string()))?;
            filter = Some(expression.to_string());
        }

        Ok(Command::List(ListArgs {
            table: table.to_string(),
            filter,
            columns,
        }))
    }
}

/// Run one command
pub fn execute(ctx: &MonitorContext, command: Command) -> MonitorResult<CommandOutput> {
    debug!("Executing {:?}", command);
    match command {
        Command::Start => {
            ctx.replica()?;
            ctx.events.set_monitoring(true);
            Ok(CommandOutput::Silent)
        }
        Command::Stop => {
            ctx.events.set_monitoring(false);
            Ok(CommandOutput::Silent)
        }
        Command::Save(path) => {
            let count = ctx.events.export(&path)?;
            Ok(CommandOutput::Line(format!("File saved ({} events)", count)))
        }
        Command::Show => show(ctx),
        Command::List(args) => list(ctx, &args),
        Command::Help(topic) => help(ctx, topic.as_deref()),
        Command::Exit => Ok(CommandOutput::Exit),
    }
}

fn show(ctx: &MonitorContext) -> MonitorResult<CommandOutput> {
    let replica = ctx.replica()?;
    let mut text = String::from("Available Tables\n----------------");
    for table in replica.model().table_names() {
        text.push('\n');
        text.push_str(table);
    }
    Ok(CommandOutput::Paged(text))
}

fn list(ctx: &MonitorContext, args: &ListArgs) -> MonitorResult<CommandOutput> {
    let replica = ctx.replica()?;
    let table = ctx.model.resolve_table(&args.table)?;
    let descriptor = ctx.introspector.table(table)?;

    let columns = args
        .columns
        .iter()
        .map(|c| {
            ctx.introspector
                .exact_field_name(table, c)
                .map(str::to_string)
                .ok_or_else(|| unknown_field(table, c.as_str()))
        })
        .collect::<MonitorResult<Vec<_>>>()?;

    let rows = match &args.filter {
        Some(expression) => FilterBuilder::new(&ctx.introspector, replica)
            .build(table, expression)?
            .list(),
        None => replica.list(table),
    };
    let rows = match rows {
        Ok(rows) => rows,
        Err(e) if e.is_not_found() => Vec::new(),
        Err(e) => return Err(e),
    };

    debug!("Listing {} rows of {}", rows.len(), table);
    Ok(CommandOutput::Paged(render_rows(
        descriptor,
        &rows,
        &columns,
        ctx.shell.no_color,
    )))
}

fn help(ctx: &MonitorContext, table: Option<&str>) -> MonitorResult<CommandOutput> {
    let Some(table) = table else {
        let mut text = String::from("Commands:");
        for (name, about) in COMMANDS {
            text.push_str(&format!("\n  {:<8}{}", name, about));
        }
        text.push_str("\n\nType 'help list <table>' for the arguments of a listing");
        return Ok(CommandOutput::Line(text));
    };

    let descriptor = ctx.introspector.table(ctx.model.resolve_table(table)?)?;
    let filters: Vec<&str> = descriptor
        .fields
        .iter()
        .filter(|f| f.is_index_field)
        .map(|f| f.name.as_str())
        .collect();
    Ok(CommandOutput::Line(format!(
        "List the content of Table {table}\n\n\
         list {table} [--filter Field=Value] [Field1 Field2 ...]\n\
         \t[--filter Field=Value]: Apply filter on a string field (index fields are suggested)\n\
         \t\tPossible Filter Fields: {filters}\n\
         \t[Field1 Field2 ...]: List of fields to show (default: all fields will be shown)\n\
         \t\tPossible Fields: {fields}",
        table = descriptor.name,
        filters = filters.join(", "),
        fields = descriptor.field_names().join(", "),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::EventLog;
    use crate::config::ShellConfig;
    use crate::models::fixtures;
    use crate::replica::{OvsdbClient, Replica, ReplicaCache};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::io;
    use std::sync::Arc;

    fn cache() -> Arc<ReplicaCache> {
        let cache = ReplicaCache::new(fixtures::model());
        cache
            .apply(&json!({
                "Foo": {
                    "u1": {"new": {"bar": "1", "idnum": 1}},
                    "u2": {"new": {"bar": "2", "idnum": 2}}
                },
                "Bridge": {"b1": {"new": {"name": "br-int"}}}
            }))
            .unwrap();
        Arc::new(cache)
    }

    fn context_with(replica: Option<Arc<dyn Replica>>) -> MonitorContext {
        let events = Arc::new(EventLog::with_console(
            false,
            vec!["Foo".to_string()],
            Box::new(io::sink()),
        ));
        let shell = ShellConfig {
            no_color: true,
            ..ShellConfig::default()
        };
        let model = replica
            .as_ref()
            .map_or_else(fixtures::model, |r| Arc::clone(r.model()));
        MonitorContext::new(model, events, replica, shell)
    }

    fn context(connected: bool) -> MonitorContext {
        context_with(connected.then(|| cache() as Arc<dyn Replica>))
    }

    fn run(ctx: &MonitorContext, line: &str) -> MonitorResult<CommandOutput> {
        let words: Vec<&str> = line.split_whitespace().collect();
        execute(ctx, Command::parse(&words)?)
    }

    fn paged(output: CommandOutput) -> String {
        match output {
            CommandOutput::Paged(text) => text,
            other => panic!("expected paged output, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_list_arguments() {
        let command = Command::parse(&["list", "Foo", "--filter", "Bar=1", "bar", "idnum"]).unwrap();
        assert_eq!(
            command,
            Command::List(ListArgs {
                table: "Foo".to_string(),
                filter: Some("Bar=1".to_string()),
                columns: vec!["bar".to_string(), "idnum".to_string()],
            })
        );
    }

    #[test]
    fn test_parse_rejects_bad_usage() {
        assert!(matches!(
            Command::parse(&["list", "Foo", "--filter", "a=1", "--filter", "b=2"]),
            Err(MonitorError::Usage(_))
        ));
        assert!(matches!(Command::parse(&["list", "Foo", "--filter"]), Err(MonitorError::Usage(_))));
        assert!(matches!(Command::parse(&["save"]), Err(MonitorError::Usage(_))));
        assert!(matches!(Command::parse(&["frobnicate"]), Err(MonitorError::Usage(_))));
    }

    #[test]
    fn test_start_stop_are_idempotent() {
        let ctx = context(true);
        run(&ctx, "start").unwrap();
        run(&ctx, "start").unwrap();
        assert!(ctx.events.is_enabled());
        run(&ctx, "stop").unwrap();
        run(&ctx, "stop").unwrap();
        assert!(!ctx.events.is_enabled());
    }

    #[test]
    fn test_show_lists_tables() {
        let ctx = context(true);
        let text = paged(run(&ctx, "show").unwrap());
        assert_eq!(text, "Available Tables\n----------------\nBridge\nFoo");
    }

    #[test]
    fn test_list_with_filter_and_columns() {
        let ctx = context(true);
        let text = paged(run(&ctx, "list foo --filter bar=2 uuid bar").unwrap());
        assert!(text.contains("u2"));
        assert!(!text.contains("u1"));
        assert!(!text.contains("Idnum"));
    }

    #[test]
    fn test_list_no_match_is_empty_listing() {
        let ctx = context(true);
        let text = paged(run(&ctx, "list Foo --filter Bar=9").unwrap());
        assert!(!text.contains("u1"));
        assert!(text.contains("Bar"));
    }

    #[test]
    fn test_list_errors_are_reported() {
        let ctx = context(true);
        assert!(matches!(
            run(&ctx, "list Foo nosuchfield"),
            Err(MonitorError::UnknownField { .. })
        ));
        assert!(matches!(
            run(&ctx, "list Foo --filter idnum=1"),
            Err(MonitorError::UnsupportedFilterType { .. })
        ));
        assert!(matches!(
            run(&ctx, "list Foo --filter nothing"),
            Err(MonitorError::InvalidExpression(_))
        ));
        assert!(matches!(
            run(&ctx, "list Nope"),
            Err(MonitorError::UnknownTable { .. })
        ));
    }

    #[test]
    fn test_commands_without_connection() {
        let ctx = context(false);
        assert!(matches!(run(&ctx, "show"), Err(MonitorError::NoActiveConnection)));
        assert!(matches!(run(&ctx, "list Foo"), Err(MonitorError::NoActiveConnection)));
        assert!(matches!(run(&ctx, "start"), Err(MonitorError::NoActiveConnection)));
    }

    #[test]
    fn test_save_reports_io_errors() {
        let ctx = context(true);
        let dir = tempfile::tempdir().unwrap();

        let path = dir.path().join("events.json");
        let output = run(&ctx, &format!("save {}", path.display())).unwrap();
        assert_eq!(output, CommandOutput::Line("File saved (0 events)".to_string()));

        let bad = dir.path().join("missing").join("events.json");
        assert!(matches!(
            run(&ctx, &format!("save {}", bad.display())),
            Err(MonitorError::Io(_))
        ));
    }

    #[test]
    fn test_help_for_table() {
        let ctx = context(true);
        match run(&ctx, "help list bridge").unwrap() {
            CommandOutput::Line(text) => {
                assert!(text.contains("Possible Filter Fields: UUID, Name"));
                assert!(text.contains("Possible Fields: UUID, Name, Ports"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(run(&ctx, "help").unwrap(), CommandOutput::Line(_)));
        assert_eq!(run(&ctx, "exit").unwrap(), CommandOutput::Exit);
    }

    #[tokio::test]
    async fn test_closed_connection_has_no_active_replica() {
        let cache = cache();
        let ctx = context_with(Some(cache.clone() as Arc<dyn Replica>));
        assert!(run(&ctx, "list Foo").is_ok());

        let (client_io, server_io) = tokio::io::duplex(1024);
        drop(server_io);
        let client = OvsdbClient::from_transport(Box::new(client_io));
        assert!(client.run(cache).await.is_err());

        assert!(matches!(run(&ctx, "list Foo"), Err(MonitorError::NoActiveConnection)));
        assert!(matches!(run(&ctx, "show"), Err(MonitorError::NoActiveConnection)));
        assert!(matches!(run(&ctx, "start"), Err(MonitorError::NoActiveConnection)));
    }
}
