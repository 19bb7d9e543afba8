use crate::error::AppError;
use clap::{Parser, Subcommand, ValueEnum};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use hexwfc_rules::{DEFAULT_LEVELS, MAX_LEVELS};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration file read from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "hex-forge.toml";

/// Prefix for configuration environment variables, e.g. `HEX_FORGE_SEED`.
pub const ENV_PREFIX: &str = "HEX_FORGE_";

/// Log verbosity for the whole application.
#[derive(ValueEnum, Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::Trace,
            LogLevel::Debug => Self::Debug,
            LogLevel::Info => Self::Info,
            LogLevel::Warn => Self::Warn,
            LogLevel::Error => Self::Error,
        }
    }
}

/// Command line of the `hex-forge` binary.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Where to write the JSON responses. Defaults to stdout.
    #[arg(short, long, value_name = "FILE", global = true)]
    pub output: Option<PathBuf>,

    /// Base seed for the solver contexts.
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Number of isolated solver contexts.
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Configuration file. Defaults to `hex-forge.toml` if present.
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Per-request timeout (e.g. "30s", "500ms").
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration, global = true)]
    pub timeout: Option<Duration>,

    /// RON catalog replacing the built-in tiles.
    #[arg(long, value_name = "FILE", global = true)]
    pub catalog: Option<PathBuf>,

    #[arg(long, value_enum, global = true)]
    pub log_level: Option<LogLevel>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Solve every message in a JSON request file.
    Solve {
        #[arg(short, long, value_name = "FILE")]
        request: PathBuf,
    },
    /// Solve a hexagonal patch around the origin.
    Demo {
        #[arg(long, default_value_t = 3)]
        radius: u32,
        /// Pin a ring of flat grass around the patch.
        #[arg(long, default_value_t = false)]
        ring: bool,
    },
}

/// Effective settings after layering defaults, file, environment and CLI.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub seed: u64,
    pub workers: usize,
    pub max_restarts: u32,
    pub max_backtracks: u32,
    pub levels: u8,
    /// humantime duration string.
    pub solve_timeout: Option<String>,
    pub log_level: LogLevel,
    pub catalog: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seed: 0,
            workers: 1,
            max_restarts: hexwfc_core::solver::DEFAULT_MAX_RESTARTS,
            max_backtracks: hexwfc_core::solver::DEFAULT_MAX_BACKTRACKS,
            levels: DEFAULT_LEVELS,
            solve_timeout: None,
            log_level: LogLevel::default(),
            catalog: None,
        }
    }
}

/// The subset of settings the command line can override.
#[derive(Serialize, Debug, Default)]
struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    workers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    solve_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_level: Option<LogLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    catalog: Option<PathBuf>,
}

impl From<&Cli> for CliOverrides {
    fn from(cli: &Cli) -> Self {
        Self {
            seed: cli.seed,
            workers: cli.workers,
            solve_timeout: cli
                .timeout
                .map(|timeout| humantime::format_duration(timeout).to_string()),
            log_level: cli.log_level,
            catalog: cli.catalog.clone(),
        }
    }
}

impl Settings {
    /// Builds the layered configuration for `cli` and validates it.
    pub fn load(cli: &Cli) -> Result<Self, AppError> {
        let file = match &cli.config {
            Some(path) if !path.is_file() => {
                return Err(AppError::Config(format!(
                    "Configuration file {} does not exist",
                    path.display()
                )));
            }
            Some(path) => path.clone(),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };
        let settings: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX))
            .merge(Serialized::defaults(CliOverrides::from(cli)))
            .extract()
            .map_err(|e| AppError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.workers == 0 {
            return Err(AppError::Config("workers must be at least 1".to_owned()));
        }
        if self.levels == 0 || self.levels > MAX_LEVELS {
            return Err(AppError::Config(format!(
                "levels must be in 1..={MAX_LEVELS}, got {}",
                self.levels
            )));
        }
        self.timeout()?;
        Ok(())
    }

    /// The parsed `solve_timeout`, if any.
    pub fn timeout(&self) -> Result<Option<Duration>, AppError> {
        self.solve_timeout
            .as_deref()
            .map(|raw| {
                humantime::parse_duration(raw).map_err(|e| {
                    AppError::Config(format!("Invalid solve_timeout '{raw}': {e}"))
                })
            })
            .transpose()
    }
}
