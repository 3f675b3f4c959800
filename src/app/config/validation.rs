use super::{ConfigError, DispatcherConfig, TuningConfig};
use crate::domain::FIRST_CUSTOM_EVENT_ID;
use url::Url;

impl TuningConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cutting_threshold == 0 {
            return Err(ConfigError::InvalidConfig(
                "Cutting threshold must be greater than 0".to_string(),
            ));
        }

        if self.max_files_per_cycle == 0 {
            return Err(ConfigError::InvalidConfig(
                "Max files per cycle must be greater than 0".to_string(),
            ));
        }

        if self.storage_cap_bytes <= self.drop_threshold {
            return Err(ConfigError::InvalidConfig(format!(
                "Storage cap ({}) must exceed the drop threshold ({})",
                self.storage_cap_bytes, self.drop_threshold
            )));
        }

        if self.idle_wait.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "Idle wait must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "HTTP timeouts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.endpoint).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid endpoint URL '{}': {}", self.endpoint, e))
        })?;
        if url.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl(format!(
                "Endpoint URL '{}' cannot carry a path",
                self.endpoint
            )));
        }

        if self.work_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "Work directory must not be empty".to_string(),
            ));
        }

        let max_custom_events = usize::from(u16::MAX - FIRST_CUSTOM_EVENT_ID) + 1;
        if self.custom_events.len() > max_custom_events {
            return Err(ConfigError::InvalidConfig(format!(
                "Too many custom events: {}",
                self.custom_events.len()
            )));
        }

        self.tuning.validate()
    }
}
