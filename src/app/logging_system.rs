use super::config::LogLevel;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {source}")]
    InvalidFilter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("Failed to install global subscriber: {0}")]
    SubscriberInstall(#[from] tracing_subscriber::util::TryInitError),
    #[error("Logging already failed to initialize")]
    AlreadyFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDirective {
    pub target: String,
    pub level: LogLevel,
}

impl LogDirective {
    pub fn new(target: impl Into<String>, level: LogLevel) -> Self {
        Self {
            target: target.into(),
            level,
        }
    }

    pub fn to_filter_string(&self) -> String {
        format!("{}={}", self.target, self.level.as_str())
    }
}

pub struct LoggingSystem {
    directives: Arc<RwLock<Vec<LogDirective>>>,
    json: bool,
}

impl LoggingSystem {
    pub fn new() -> Self {
        Self {
            directives: Arc::new(RwLock::new(Vec::new())),
            json: false,
        }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn add_directive(&self, target: &str, level: LogLevel) {
        self.directives.write().push(LogDirective::new(target, level));
    }

    /// Quiets the HTTP stack, which is chatty at debug.
    pub fn add_default_directives(&self) {
        let mut directives = self.directives.write();
        for target in ["hyper", "hyper_util", "reqwest", "rustls"] {
            directives.push(LogDirective::new(target, LogLevel::Warn));
        }
    }

    pub fn build_filter_string(&self, default_level: LogLevel) -> String {
        let directives = self.directives.read();
        let mut filter_parts = Vec::with_capacity(directives.len() + 1);
        filter_parts.push(default_level.as_str().to_string());
        filter_parts.extend(directives.iter().map(LogDirective::to_filter_string));
        filter_parts.join(",")
    }

    pub fn initialize_tracing(&self, default_level: LogLevel) -> Result<(), LoggingError> {
        let filter = self.build_filter_string(default_level);
        let env_filter = EnvFilter::try_new(&filter).map_err(|source| LoggingError::InvalidFilter {
            filter: filter.clone(),
            source,
        })?;

        let registry = tracing_subscriber::registry().with(env_filter);
        if self.json {
            registry
                .with(fmt::layer().json().with_target(true).with_current_span(false))
                .try_init()?;
        } else {
            registry
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_level(true)
                        .compact(),
                )
                .try_init()?;
        }
        Ok(())
    }

    pub fn directive_count(&self) -> usize {
        self.directives.read().len()
    }
}

impl Default for LoggingSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the global subscriber once per process. Later calls report
/// whether the first attempt succeeded.
pub fn setup_logging_safe(level: LogLevel, json: bool) -> Result<(), LoggingError> {
    static INIT: Once = Once::new();
    static INIT_SUCCESS: AtomicBool = AtomicBool::new(false);

    let mut first_error = None;
    INIT.call_once(|| {
        let logging_system = LoggingSystem::new().with_json(json);
        logging_system.add_default_directives();
        match logging_system.initialize_tracing(level) {
            Ok(()) => INIT_SUCCESS.store(true, Ordering::Release),
            Err(e) => first_error = Some(e),
        }
    });

    if let Some(e) = first_error {
        return Err(e);
    }
    if INIT_SUCCESS.load(Ordering::Acquire) {
        Ok(())
    } else {
        Err(LoggingError::AlreadyFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_starts_with_default_level() {
        let logging_system = LoggingSystem::new();
        assert_eq!(logging_system.build_filter_string(LogLevel::Info), "info");

        logging_system.add_directive("event_courier::pipeline", LogLevel::Trace);
        assert_eq!(
            logging_system.build_filter_string(LogLevel::Warn),
            "warn,event_courier::pipeline=trace"
        );
    }

    #[test]
    fn test_default_directives_quiet_http_stack() {
        let logging_system = LoggingSystem::new();
        logging_system.add_default_directives();
        assert_eq!(logging_system.directive_count(), 4);

        let filter = logging_system.build_filter_string(LogLevel::Debug);
        assert!(filter.contains("reqwest=warn"));
        assert!(filter.contains("hyper=warn"));
        assert!(EnvFilter::try_new(&filter).is_ok());
    }
}
