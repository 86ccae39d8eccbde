//! Command-line flags

use clap::Parser;

/// Interactive OVSDB monitoring shell.
///
/// If COMMAND is provided it is run and the program exits; otherwise the
/// interactive shell starts. Use the `help` command for the full list.
#[derive(Parser, Debug, Default)]
#[command(name = "ovsdb-mon", version, about)]
pub struct Cli {
    /// Database connection (unix:<path> or tcp:<host>:<port>).
    /// Default: unix:${OVS_RUNDIR}/ovnnb_db.sock
    #[arg(long)]
    pub db: Option<String>,

    /// Database name. Default: the first database served by the endpoint
    #[arg(long)]
    pub database: Option<String>,

    /// Start monitoring from the beginning
    #[arg(long)]
    pub auto: bool,

    /// Only monitor these comma-separated tables
    #[arg(long, value_delimiter = ',')]
    pub monitor: Vec<String>,

    /// Do not monitor these comma-separated tables
    #[arg(long = "no-monitor", value_delimiter = ',')]
    pub no_monitor: Vec<String>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Command to run non-interactively
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}
