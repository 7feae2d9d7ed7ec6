use std::path::PathBuf;
use std::time::Duration;

use lineup_queue::{BackendKind, DEFAULT_INITIAL_CAPACITY};

use crate::error::ConfigError;
use crate::logging::LogFormat;
use crate::session::FrameLimits;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9876;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30;

/// Runtime settings for the queue server
///
/// Built from the command line and `LINEUP_*` environment variables by
/// [`crate::cli::Cli::into_config`], or assembled directly in tests.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    /// Port 0 asks the OS for an ephemeral port
    pub port: u16,
    /// `None` disables the idle timeout
    pub idle_timeout: Option<Duration>,
    pub backend: BackendKind,
    pub initial_capacity: usize,
    pub max_jobs: Option<usize>,
    pub max_payload_bytes: usize,
    pub max_line_bytes: usize,
    pub pid_file: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let limits = FrameLimits::default();
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            idle_timeout: Some(Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS)),
            backend: BackendKind::default(),
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_jobs: None,
            max_payload_bytes: limits.max_payload_bytes,
            max_line_bytes: limits.max_line_bytes,
            pid_file: None,
            work_dir: None,
            log_format: LogFormat::default(),
        }
    }
}

impl ServerConfig {
    /// Loopback config on an ephemeral port
    pub fn local() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..Self::default()
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn frame_limits(&self) -> FrameLimits {
        FrameLimits {
            max_line_bytes: self.max_line_bytes,
            max_payload_bytes: self.max_payload_bytes,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "host",
                reason: "must not be empty".to_string(),
            });
        }
        // A PUSH line needs room for the verb and two digit runs
        if self.max_line_bytes < 16 {
            return Err(ConfigError::Invalid {
                key: "max_line_bytes",
                reason: format!("{} is below the minimum of 16", self.max_line_bytes),
            });
        }
        if self.max_jobs == Some(0) {
            return Err(ConfigError::Invalid {
                key: "max_jobs",
                reason: "must be at least 1 when set".to_string(),
            });
        }
        if let Some(max_jobs) = self.max_jobs {
            if self.initial_capacity > max_jobs {
                return Err(ConfigError::Invalid {
                    key: "initial_capacity",
                    reason: format!("{} exceeds max_jobs {}", self.initial_capacity, max_jobs),
                });
            }
        }
        Ok(())
    }
}
