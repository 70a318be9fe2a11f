// SPDX-License-Identifier: AGPL-3.0-or-later

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Args;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use pset_changelog::{Configuration, StoreEncoding};
use serde::Serialize;

const CONFIG_FILE_NAME: &str = "config.toml";

const ENV_PREFIX: &str = "PSET_CHANGELOG_";

const DEFAULT_LOG_LEVEL: &str = "warn";

/// Default database when nothing else was configured.
const DEFAULT_DATABASE_URL: &str = "sqlite:pset_changelog.sqlite3";

/// Path of the config file which was loaded, if any.
pub type ConfigFilePath = Option<PathBuf>;

/// Configuration derived from command line arguments.
///
/// All arguments are optional and don't get serialized to Figment when they're None. This is to
/// assure that default values do not overwrite all previous settings, especially when they haven't
/// been set.
#[derive(Args, Serialize, Debug, Default)]
pub struct ConfigArgs {
    /// Path to an optional "config.toml" file for further configuration.
    ///
    /// When not set the program will try to find a `config.toml` file in the folder the program
    /// is executed in.
    #[arg(short = 'c', long, value_name = "PATH", global = true)]
    #[serde(skip_serializing)]
    pub config: Option<PathBuf>,

    /// URL / connection string to PostgreSQL or SQLite database. Defaults to
    /// "sqlite:pset_changelog.sqlite3" in the current folder.
    #[arg(short = 'd', long, value_name = "CONNECTION_STRING", global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    /// Physical layout of the revision history, either "normalized" or "ledger". Defaults to
    /// "normalized".
    #[arg(short = 'e', long, value_name = "ENCODING", global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_encoding: Option<StoreEncoding>,

    /// Upper bound in milliseconds for every store call. Defaults to 5000.
    #[arg(short = 't', long, value_name = "MILLISECONDS", global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_timeout_ms: Option<u64>,

    /// How often conflicting edits of the same log record are retried. Defaults to 3.
    #[arg(short = 'r', long, value_name = "NUMBER", global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub append_retries: Option<u32>,

    /// Set log verbosity. Possible log levels are: ERROR, WARN, INFO, DEBUG, TRACE. They are
    /// scoped to "pset_changelog" by default.
    ///
    /// If you want to adjust the scope for deeper inspection use a filter value, for example
    /// "=TRACE" for logging _everything_ or "pset_changelog=DEBUG,sqlx=INFO" etc.
    #[arg(short = 'l', long, value_name = "LEVEL", global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

/// Get configuration from 1. defaults, 2. .toml file, 3. environment variables and 4. command
/// line arguments (in that order, meaning that later configuration sources take precedence over
/// the earlier ones).
///
/// Returns the path of the loaded config file, the configuration and the log level.
pub fn load_config(args: &ConfigArgs) -> Result<(ConfigFilePath, Configuration, String)> {
    // Determine if a config file path was provided or if we should look for it in the current
    // folder
    let config_file_path: ConfigFilePath = match &args.config {
        Some(path) => {
            if !path.exists() {
                bail!("Config file '{}' does not exist", path.display());
            }

            Some(path.clone())
        }
        None => try_determine_config_file_path(),
    };

    let figment = figment(config_file_path.as_deref(), args);
    let config: Configuration = figment.extract()?;
    let log_level: String = figment.extract_inner("log_level")?;

    Ok((config_file_path, config, log_level))
}

fn figment(config_file: Option<&Path>, args: &ConfigArgs) -> Figment {
    let defaults = Configuration {
        database_url: DEFAULT_DATABASE_URL.into(),
        ..Configuration::default()
    };

    let mut figment = Figment::from(Serialized::defaults(defaults))
        .merge(Serialized::default("log_level", DEFAULT_LOG_LEVEL));

    if let Some(path) = config_file {
        figment = figment.merge(Toml::file(path));
    }

    figment
        .merge(Env::prefixed(ENV_PREFIX))
        .merge(Serialized::defaults(args))
}

fn try_determine_config_file_path() -> Option<PathBuf> {
    let path = std::env::current_dir().ok()?.join(CONFIG_FILE_NAME);
    path.exists().then_some(path)
}

/// Returns a logging filter, scoping plain levels to the library and this binary.
pub fn log_filter(log_level: &str) -> String {
    if log_level.contains('=') {
        return log_level.to_owned();
    }

    format!(
        "pset_changelog={level},pset_changelog_cli={level}",
        level = log_level
    )
}
