use clap::{Parser, Subcommand};
use engine::{Scope, TransactionKind};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{error::Result, local_state};

const DEFAULT_CONFIG_PATH: &str = "config/tally_cli.toml";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub state_path: String,
    pub level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            state_path: local_state::default_state_path().to_string(),
            level: "warn".to_string(),
        }
    }
}

fn parse_kind(value: &str) -> std::result::Result<TransactionKind, String> {
    TransactionKind::try_from(value).map_err(|err| err.to_string())
}

#[derive(Debug, Parser)]
#[command(name = "tally_cli", disable_version_flag = true)]
pub struct Args {
    /// Optional config file path (TOML).
    #[arg(long)]
    pub config: Option<String>,
    /// Override base URL (e.g. http://127.0.0.1:3000).
    #[arg(long)]
    pub base_url: Option<String>,
    /// Override the local state file.
    #[arg(long)]
    pub state: Option<String>,
    #[command(subcommand)]
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Action {
    /// Lists live transactions.
    List {
        /// Only this month (YYYY-MM).
        #[arg(long)]
        month: Option<String>,
    },
    /// Records a transaction. Fixed ones repeat monthly.
    Add {
        date: String,
        #[arg(value_parser = parse_kind)]
        kind: TransactionKind,
        item: String,
        amount: Decimal,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        fixed: bool,
        /// Last month (YYYY-MM) of a fixed series.
        #[arg(long)]
        end_month: Option<String>,
    },
    /// Edits a transaction and, depending on the scope, its series.
    Edit {
        id: String,
        /// this, thisAndFuture or all.
        #[arg(long, default_value_t = Scope::This)]
        scope: Scope,
        #[arg(long)]
        date: Option<String>,
        #[arg(long, value_parser = parse_kind)]
        kind: Option<TransactionKind>,
        #[arg(long)]
        item: Option<String>,
        #[arg(long, conflicts_with = "clear_category")]
        category: Option<String>,
        #[arg(long)]
        clear_category: bool,
        #[arg(long)]
        amount: Option<Decimal>,
        #[arg(long)]
        fixed: Option<bool>,
        /// Moves the end of the series to this month (YYYY-MM).
        #[arg(long)]
        end_month: Option<String>,
    },
    /// Soft-deletes a transaction and, depending on the scope, its series.
    Delete {
        id: String,
        #[arg(long, default_value_t = Scope::This)]
        scope: Scope,
    },
    /// Balance on a date (today by default).
    Balance { date: Option<String> },
    /// Pushes local changes and pulls remote ones.
    Sync,
    /// Shows the initial balance, or sets it when both values are given.
    InitialBalance {
        #[arg(long, requires = "date")]
        amount: Option<Decimal>,
        #[arg(long, requires = "amount")]
        date: Option<String>,
    },
}

/// Parses the command line, then layers file, environment and flags.
pub fn load() -> Result<(AppConfig, Action)> {
    let args = Args::parse();
    let config = resolve(&args)?;
    Ok((config, args.action))
}

pub fn resolve(args: &Args) -> Result<AppConfig> {
    let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let mut builder = config::Config::builder();
    builder = builder.add_source(config::File::with_name(config_path).required(false));
    builder = builder.add_source(config::Environment::with_prefix("TALLY_CLI"));
    let mut settings: AppConfig = builder.build()?.try_deserialize()?;

    if let Some(base_url) = &args.base_url {
        settings.base_url.clone_from(base_url);
    }
    if let Some(state) = &args.state {
        settings.state_path.clone_from(state);
    }

    Ok(settings)
}
