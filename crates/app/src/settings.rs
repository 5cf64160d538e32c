//! Settings for `ledgerd`.
//!
//! Sources, lowest precedence first: the TOML file (`config/ledgerd.toml` or
//! `--config`), `LEDGERD_*` environment variables (`__` separates nested
//! keys, e.g. `LEDGERD_INCURRENCE__TIMEOUT_SECS`), then command-line flags.

use clap::{Parser, Subcommand};
use engine::IncurrenceConfig;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::Result;

const DEFAULT_CONFIG_PATH: &str = "config/ledgerd";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    #[default]
    Memory,
    Sqlite(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub database: Database,
    pub incurrence: IncurrenceConfig,
}

#[derive(Debug, Parser)]
#[command(name = "ledgerd", version)]
pub struct Args {
    /// Optional config file path (TOML).
    #[arg(long)]
    config: Option<String>,
    /// Override the log level (e.g. debug).
    #[arg(long)]
    level: Option<String>,
    /// Override the database with a SQLite file path.
    #[arg(long, env = "LEDGERD_SQLITE")]
    sqlite: Option<String>,
    /// Override the per-call occurrence cap.
    #[arg(long)]
    max_occurrences: Option<usize>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Incur every due recurring transaction (default).
    Run,
    /// Incur a single recurring transaction.
    Incur { id: Uuid },
    /// List recurring transactions with their next due date.
    List,
    /// Create a recurring transaction.
    Add {
        /// Signed amount in minor units; negative for expenses.
        #[arg(long, allow_hyphen_values = true)]
        amount: i64,
        #[arg(long)]
        category: String,
        /// RFC 3339 start date.
        #[arg(long)]
        start: String,
        /// `interval` (milliseconds) or `calendar` (cron expression).
        #[arg(long, default_value = "calendar")]
        kind: String,
        #[arg(long)]
        rule: String,
        #[arg(long)]
        description: Option<String>,
    },
}

pub fn load() -> Result<(Settings, Option<Command>)> {
    let args = Args::parse();

    let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let mut builder = config::Config::builder();
    builder = builder.add_source(config::File::with_name(config_path).required(false));
    builder = builder.add_source(config::Environment::with_prefix("LEDGERD").separator("__"));
    let mut settings: Settings = builder.build()?.try_deserialize()?;

    if let Some(level) = args.level {
        settings.app.level = level;
    }
    if let Some(path) = args.sqlite {
        settings.database = Database::Sqlite(path);
    }
    if let Some(max) = args.max_occurrences {
        settings.incurrence.max_occurrences_per_call = max;
    }

    Ok((settings, args.command))
}

impl Database {
    pub fn url(&self) -> String {
        match self {
            Database::Memory => String::from("sqlite::memory:"),
            Database::Sqlite(path) => format!("sqlite:{path}?mode=rwc"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_urls() {
        assert_eq!(Database::Memory.url(), "sqlite::memory:");
        assert_eq!(
            Database::Sqlite("ledger.db".to_string()).url(),
            "sqlite:ledger.db?mode=rwc"
        );
    }

    #[test]
    fn nested_keys_deserialize() {
        let settings: Settings = config::Config::builder()
            .add_source(config::File::from_str(
                "[app]\nlevel = \"debug\"\n[database]\nsqlite = \"x.db\"\n[incurrence]\ntimeout_secs = 5\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(settings.app.level, "debug");
        assert_eq!(settings.database, Database::Sqlite("x.db".to_string()));
        assert_eq!(settings.incurrence.timeout_secs, 5);
        assert_eq!(settings.incurrence.max_occurrences_per_call, 1000);
    }
}
