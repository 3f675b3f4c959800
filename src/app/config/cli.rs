use super::{ConfigError, DispatcherConfig, LogLevel, TuningConfig};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log level
    #[arg(long, env = "EVENT_COURIER_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: LogLevel,

    /// Emit logs as JSON lines
    #[arg(long, env = "EVENT_COURIER_JSON_LOGS", global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List queued batch files in delivery order and decode their records
    Inspect(InspectArgs),
    /// Deliver queued batch files until the queue is empty or the collector is unreachable
    Drain(DrainArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// Queue directory
    #[arg(long, env = "EVENT_COURIER_WORK_DIR")]
    pub work_dir: PathBuf,

    /// Print one JSON document instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DrainArgs {
    /// Queue directory
    #[arg(long, env = "EVENT_COURIER_WORK_DIR")]
    pub work_dir: PathBuf,

    /// Collector base URL
    #[arg(long, env = "EVENT_COURIER_ENDPOINT")]
    pub endpoint: String,

    /// Application secret sent as K-Token
    #[arg(long, env = "EVENT_COURIER_APP_SECRET", hide_env_values = true)]
    pub app_secret: String,

    /// Install id to report; read from the identity file when omitted
    #[arg(long, env = "EVENT_COURIER_INSTALL_ID")]
    pub install_id: Option<Uuid>,

    /// TOML file with tuning overrides
    #[arg(long, env = "EVENT_COURIER_TUNING_FILE")]
    pub tuning_file: Option<PathBuf>,
}

impl Cli {
    pub fn from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Cli::try_parse_from(args)
    }
}

impl DrainArgs {
    pub fn dispatcher_config(&self) -> Result<DispatcherConfig, ConfigError> {
        let tuning = match &self.tuning_file {
            Some(path) => TuningConfig::from_file(path)?,
            None => TuningConfig::default(),
        };

        let mut config = DispatcherConfig::with_stored_identity(
            self.work_dir.clone(),
            self.endpoint.clone(),
            self.app_secret.clone(),
        )
        .with_tuning(tuning);

        if let Some(install_id) = self.install_id {
            config.install_id = install_id;
        }

        config.validate()?;
        Ok(config)
    }
}
