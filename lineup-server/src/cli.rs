use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use lineup_queue::{BackendKind, DEFAULT_INITIAL_CAPACITY};

use crate::config::{ServerConfig, DEFAULT_HOST, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_PORT};
use crate::logging::LogFormat;

/// Priority message queue daemon
#[derive(Debug, Parser)]
#[command(name = "lineupd", version, about)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "LINEUP_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// TCP port to listen on (1-65535)
    #[arg(
        short,
        long,
        env = "LINEUP_PORT",
        default_value_t = DEFAULT_PORT,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub port: u16,

    /// Seconds a connection may stay silent before it is closed; 0 disables
    #[arg(long, env = "LINEUP_IDLE_TIMEOUT", default_value_t = DEFAULT_IDLE_TIMEOUT_SECS)]
    pub idle_timeout: u64,

    /// Queue backend: mutex or actor
    #[arg(long, env = "LINEUP_BACKEND", default_value = "mutex")]
    pub backend: BackendKind,

    /// Slots reserved when the queue is created
    #[arg(long, env = "LINEUP_INITIAL_CAPACITY", default_value_t = DEFAULT_INITIAL_CAPACITY)]
    pub initial_capacity: usize,

    /// Upper bound on queued jobs
    #[arg(long, env = "LINEUP_MAX_JOBS")]
    pub max_jobs: Option<usize>,

    /// Largest PUSH body accepted, in bytes
    #[arg(long, env = "LINEUP_MAX_PAYLOAD_BYTES")]
    pub max_payload_bytes: Option<usize>,

    /// Longest command line accepted, in bytes
    #[arg(long, env = "LINEUP_MAX_LINE_BYTES")]
    pub max_line_bytes: Option<usize>,

    /// Write the process id here while running
    #[arg(long, env = "LINEUP_PIDFILE")]
    pub pidfile: Option<PathBuf>,

    /// Change to this directory before starting
    #[arg(long, env = "LINEUP_WORKDIR")]
    pub workdir: Option<PathBuf>,

    /// Log output format
    #[arg(long, env = "LINEUP_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn into_config(self) -> ServerConfig {
        let defaults = ServerConfig::default();
        ServerConfig {
            host: self.host,
            port: self.port,
            idle_timeout: (self.idle_timeout > 0).then(|| Duration::from_secs(self.idle_timeout)),
            backend: self.backend,
            initial_capacity: self.initial_capacity,
            max_jobs: self.max_jobs,
            max_payload_bytes: self.max_payload_bytes.unwrap_or(defaults.max_payload_bytes),
            max_line_bytes: self.max_line_bytes.unwrap_or(defaults.max_line_bytes),
            pid_file: self.pidfile,
            work_dir: self.workdir,
            log_format: self.log_format,
        }
    }
}
