//! Application configuration module
//!
//! Settings come from (lowest to highest precedence) built-in defaults,
//! the environment (a `.env` file is loaded first when present) and the
//! command-line flags.

use crate::cli::Cli;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_RUNDIR: &str = "/var/run/openvswitch";
const DEFAULT_SOCKET: &str = "ovnnb_db.sock";
const DEFAULT_PAGER: &str = "less -R";
const DEFAULT_PAGE_LINES: usize = 40;

static ENDPOINT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(unix|tcp):(.+)$").expect("valid endpoint regex"));

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid database endpoint '{0}' (expected unix:<path> or tcp:<host>:<port>)")]
    InvalidEndpoint(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Where the database server listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp { host: String, port: u16 },
}

impl Endpoint {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let caps = ENDPOINT_RE
            .captures(s.trim())
            .ok_or_else(|| ConfigError::InvalidEndpoint(s.to_string()))?;

        match (&caps[1], &caps[2]) {
            ("unix", path) => Ok(Endpoint::Unix(PathBuf::from(path))),
            (_, address) => {
                let (host, port) = address
                    .rsplit_once(':')
                    .ok_or_else(|| ConfigError::InvalidEndpoint(s.to_string()))?;
                let port = port
                    .parse()
                    .map_err(|_| ConfigError::InvalidEndpoint(s.to_string()))?;
                let host = host.trim_start_matches('[').trim_end_matches(']');
                if host.is_empty() {
                    return Err(ConfigError::InvalidEndpoint(s.to_string()));
                }
                Ok(Endpoint::Tcp {
                    host: host.to_string(),
                    port,
                })
            }
        }
    }

    /// Northbound socket under `$OVS_RUNDIR`
    fn default_for(rundir: Option<String>) -> Self {
        let rundir = rundir
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| DEFAULT_RUNDIR.to_string());
        Endpoint::Unix(PathBuf::from(rundir).join(DEFAULT_SOCKET))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
            Endpoint::Tcp { host, port } => write!(f, "tcp:{}:{}", host, port),
        }
    }
}

/// Shell presentation configuration
#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub history_file: Option<PathBuf>,
    /// Pager command line, e.g. `less -R`
    pub pager: String,
    /// Listings longer than this go through the pager
    pub page_lines: usize,
    pub no_color: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            history_file: None,
            pager: DEFAULT_PAGER.to_string(),
            page_lines: DEFAULT_PAGE_LINES,
            no_color: false,
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub endpoint: Endpoint,
    pub database: Option<String>,
    pub auto_start: bool,
    pub monitor: Vec<String>,
    pub no_monitor: Vec<String>,
    pub shell: ShellConfig,
    /// Command to run once instead of the interactive shell
    pub command: Vec<String>,
}

impl Settings {
    /// Load settings from the environment, overridden by `cli`
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();
        Self::from_sources(cli, |key| std::env::var(key).ok())
    }

    fn from_sources(cli: &Cli, env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let endpoint = match cli.db.clone().or_else(|| env("OVSDB_MON_DB")) {
            Some(db) => Endpoint::parse(&db)?,
            None => Endpoint::default_for(env("OVS_RUNDIR")),
        };

        let auto_start = cli.auto
            || env("OVSDB_MON_AUTO")
                .map(|v| parse_bool("OVSDB_MON_AUTO", &v))
                .transpose()?
                .unwrap_or(false);

        let list = |flag: &[String], key: &str| -> Vec<String> {
            if !flag.is_empty() {
                return flag.to_vec();
            }
            env(key)
                .map(|s| s.split(',').map(|t| t.trim().to_string()).collect())
                .unwrap_or_default()
        };

        let page_lines = match env("OVSDB_MON_PAGE_LINES") {
            Some(v) => v.parse().map_err(|_| {
                ConfigError::InvalidValue(format!("OVSDB_MON_PAGE_LINES={}", v))
            })?,
            None => DEFAULT_PAGE_LINES,
        };

        let shell = ShellConfig {
            history_file: env("OVSDB_MON_HISTORY").map(PathBuf::from),
            pager: env("PAGER")
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PAGER.to_string()),
            page_lines,
            no_color: cli.no_color || env("NO_COLOR").is_some_and(|v| !v.is_empty()),
        };

        Ok(Self {
            endpoint,
            database: cli.database.clone().or_else(|| env("OVSDB_MON_DATABASE")),
            auto_start,
            monitor: list(&cli.monitor, "OVSDB_MON_MONITOR"),
            no_monitor: list(&cli.no_monitor, "OVSDB_MON_NO_MONITOR"),
            shell,
            command: cli.command.clone(),
        })
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue(format!("{}={}", key, value))),
    }
}
