use super::ConfigError;
use crate::buffer::{BatchConfig, CUTTING_THRESHOLD, MIN_SIGNAL_SIZE};
use crate::domain::CustomEventDef;
use crate::profile::IdentityStore;
use crate::reliability::{DEFAULT_STORAGE_CAP, DROP_THRESHOLD, StorageCap};
use crate::sender::ClientConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

pub const DEFAULT_MAX_FILES_PER_CYCLE: usize = 30;
pub const DEFAULT_IDLE_WAIT: Duration = Duration::from_secs(30);

/// Knobs with production defaults; rarely changed outside tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    pub min_signal_size: usize,
    pub cutting_threshold: usize,
    pub storage_cap_bytes: u64,
    pub drop_threshold: u64,
    pub max_files_per_cycle: usize,
    #[serde(with = "super::serde_helpers", rename = "idle_wait_ms")]
    pub idle_wait: Duration,
    #[serde(with = "super::serde_helpers", rename = "request_timeout_ms")]
    pub request_timeout: Duration,
    #[serde(with = "super::serde_helpers", rename = "connect_timeout_ms")]
    pub connect_timeout: Duration,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            min_signal_size: MIN_SIGNAL_SIZE,
            cutting_threshold: CUTTING_THRESHOLD,
            storage_cap_bytes: DEFAULT_STORAGE_CAP,
            drop_threshold: DROP_THRESHOLD,
            max_files_per_cycle: DEFAULT_MAX_FILES_PER_CYCLE,
            idle_wait: DEFAULT_IDLE_WAIT,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl TuningConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let tuning: TuningConfig = toml::from_str(&content)?;
        tuning.validate()?;
        Ok(tuning)
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            min_signal_size: self.min_signal_size,
            cutting_threshold: self.cutting_threshold,
        }
    }

    pub fn storage_cap(&self) -> StorageCap {
        StorageCap {
            max_bytes: self.storage_cap_bytes,
            drop_threshold: self.drop_threshold,
        }
    }
}

/// Everything needed to start an [`EventDispatcher`](crate::EventDispatcher).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub work_dir: PathBuf,
    pub endpoint: String,
    pub app_secret: String,
    pub install_id: Uuid,
    pub user_id: Uuid,
    pub data_session_id: Uuid,
    pub custom_events: Vec<CustomEventDef>,
    pub tuning: TuningConfig,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("event-courier"),
            endpoint: "http://localhost:8080".to_string(),
            app_secret: String::new(),
            install_id: Uuid::nil(),
            user_id: Uuid::nil(),
            data_session_id: Uuid::new_v4(),
            custom_events: Vec::new(),
            tuning: TuningConfig::default(),
        }
    }
}

impl DispatcherConfig {
    pub fn new(
        work_dir: impl Into<PathBuf>,
        endpoint: impl Into<String>,
        app_secret: impl Into<String>,
        install_id: Uuid,
        user_id: Uuid,
        data_session_id: Uuid,
    ) -> Self {
        Self {
            work_dir: work_dir.into(),
            endpoint: endpoint.into(),
            app_secret: app_secret.into(),
            install_id,
            user_id,
            data_session_id,
            custom_events: Vec::new(),
            tuning: TuningConfig::default(),
        }
    }

    /// Takes the install and user ids from the identity file in `work_dir`,
    /// creating it on first use. Each call opens a new data session.
    pub fn with_stored_identity(
        work_dir: impl Into<PathBuf>,
        endpoint: impl Into<String>,
        app_secret: impl Into<String>,
    ) -> Self {
        let work_dir = work_dir.into();
        if let Err(e) = std::fs::create_dir_all(&work_dir) {
            tracing::warn!(path = %work_dir.display(), error = %e, "Failed to create work directory");
        }
        let identity = IdentityStore::new(&work_dir).load_or_init();
        Self::new(
            work_dir,
            endpoint,
            app_secret,
            identity.install_id,
            identity.user_id,
            Uuid::new_v4(),
        )
    }

    pub fn with_custom_events(mut self, events: Vec<CustomEventDef>) -> Self {
        self.custom_events = events;
        self
    }

    pub fn with_tuning(mut self, tuning: TuningConfig) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: DispatcherConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            endpoint: self.endpoint.clone(),
            app_secret: self.app_secret.clone(),
            timeout: self.tuning.request_timeout,
            connection_timeout: self.tuning.connect_timeout,
            ..ClientConfig::default()
        }
    }
}
