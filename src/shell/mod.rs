//! Interactive shell
//!
//! Line editing, history and completion are provided by `rustyline`; each
//! line is parsed into a [`commands::Command`] and executed against the
//! shared [`MonitorContext`]. Errors are printed and the prompt comes back.

pub mod commands;
pub mod completion;
pub mod printer;

use crate::shell::commands::{execute, Command, CommandOutput, COMMANDS};
use crate::shell::completion::{candidates, table_candidates};
use crate::state::MonitorContext;
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::{DefaultHistory, History};
use rustyline::validate::Validator;
use rustyline::{CompletionType, Config, Context, EditMode, Editor};
use std::sync::Arc;
use tracing::{debug, warn};

const PROMPT: &str = ">>> ";
const MAX_HISTORY: usize = 1000;

/// Editor helper completing commands, table names and `list` arguments
struct ShellHelper {
    ctx: Arc<MonitorContext>,
}

impl ShellHelper {
    fn options(&self, words: &[&str], prefix: &str) -> Vec<String> {
        match words {
            [] => COMMANDS.iter().map(|(name, _)| name.to_string()).collect(),
            ["help"] => vec!["list".to_string()],
            ["list"] | ["help", "list"] => table_candidates(&self.ctx.introspector, prefix),
            ["list", table, args @ ..] => self
                .ctx
                .model
                .resolve_table(table)
                .and_then(|t| self.ctx.introspector.table(t))
                .map(|descriptor| candidates(descriptor, prefix, args))
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let before = &line[..pos];
        let start = before.rfind(char::is_whitespace).map_or(0, |i| i + 1);
        let prefix = &before[start..];
        let words: Vec<&str> = before[..start].split_whitespace().collect();

        let matches = self
            .options(&words, prefix)
            .into_iter()
            .filter(|option| option.starts_with(prefix))
            .map(|option| Pair {
                display: option.clone(),
                replacement: option,
            })
            .collect();
        Ok((start, matches))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}

impl rustyline::Helper for ShellHelper {}

/// Append a line to the shell history
fn remember(history: &mut impl History, line: &str) {
    if let Err(e) = history.add(line) {
        debug!("Failed to record history entry: {}", e);
    }
}

/// The monitoring shell
pub struct Shell {
    ctx: Arc<MonitorContext>,
}

impl Shell {
    pub fn new(ctx: Arc<MonitorContext>) -> Self {
        Self { ctx }
    }

    /// Run a single command given on the command line
    pub fn run_once(&self, words: &[String]) -> anyhow::Result<()> {
        let words: Vec<&str> = words.iter().map(String::as_str).collect();
        let output = Command::parse(&words).and_then(|command| execute(&self.ctx, command))?;
        self.emit(output);
        Ok(())
    }

    /// Interactive loop until `exit` or end of input
    pub fn run(&self) -> anyhow::Result<()> {
        let config = Config::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .edit_mode(EditMode::Emacs)
            .max_history_size(MAX_HISTORY)?
            .build();

        let mut editor: Editor<ShellHelper, DefaultHistory> = Editor::with_config(config)?;
        editor.set_helper(Some(ShellHelper {
            ctx: Arc::clone(&self.ctx),
        }));

        let history_file = self.ctx.shell.history_file.clone();
        if let Some(path) = &history_file {
            if let Err(e) = editor.load_history(path) {
                debug!("No shell history loaded from {}: {}", path.display(), e);
            }
        }

        println!("{}", "OVSDB Monitoring Shell".bold());
        loop {
            match editor.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    remember(editor.history_mut(), line);
                    if !self.dispatch(line) {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            }
        }

        if let Some(path) = &history_file {
            if let Err(e) = editor.save_history(path) {
                warn!("Failed to save shell history to {}: {}", path.display(), e);
            }
        }
        Ok(())
    }

    /// Execute one line; false once the shell should exit
    fn dispatch(&self, line: &str) -> bool {
        let words: Vec<&str> = line.split_whitespace().collect();
        match Command::parse(&words).and_then(|command| execute(&self.ctx, command)) {
            Ok(CommandOutput::Exit) => false,
            Ok(output) => {
                self.emit(output);
                true
            }
            Err(e) => {
                println!("{} {}", "Error:".red().bold(), e);
                true
            }
        }
    }

    fn emit(&self, output: CommandOutput) {
        match output {
            CommandOutput::Line(text) => println!("{}", text),
            CommandOutput::Paged(text) => printer::show_paged(&text, &self.ctx.shell),
            CommandOutput::Silent | CommandOutput::Exit => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::EventLog;
    use crate::config::ShellConfig;
    use crate::models::fixtures;
    use pretty_assertions::assert_eq;
    use std::io;

    fn helper() -> ShellHelper {
        let events = Arc::new(EventLog::with_console(false, Vec::new(), Box::new(io::sink())));
        let ctx = MonitorContext::new(fixtures::model(), events, None, ShellConfig::default());
        ShellHelper { ctx: Arc::new(ctx) }
    }

    #[test]
    fn test_completes_commands_and_tables() {
        let helper = helper();
        assert!(helper.options(&[], "").contains(&"list".to_string()));
        assert_eq!(helper.options(&["list"], ""), vec!["Bridge", "Foo"]);
        assert_eq!(helper.options(&["help", "list"], ""), vec!["Bridge", "Foo"]);
    }

    #[test]
    fn test_completes_list_arguments_case_insensitively() {
        let helper = helper();
        assert_eq!(helper.options(&["list", "bridge", "--filter"], ""), vec!["UUID=", "Name="]);
        assert!(helper.options(&["list", "Nope"], "").is_empty());
    }

    #[test]
    fn test_dispatch_keeps_running_on_errors() {
        let shell = Shell::new(helper().ctx);
        assert!(shell.dispatch("list Foo"));
        assert!(shell.dispatch("bogus"));
        assert!(!shell.dispatch("exit"));
    }

    #[test]
    fn test_lines_are_remembered() {
        let mut history = DefaultHistory::new();
        remember(&mut history, "list Foo");
        remember(&mut history, "show");
        assert_eq!(history.len(), 2);
    }
}
