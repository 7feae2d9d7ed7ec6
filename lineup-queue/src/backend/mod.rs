pub mod actor;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Job, JobSummary, QueueResult};

/// Shared-state seam between sessions and the single queue instance.
///
/// Every implementation must make `push` and `pop` atomic relative to each
/// other across all callers.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Insert a job; returns the sequence number assigned to it
    async fn push(&self, job: Job) -> QueueResult<u64>;

    /// Remove the most urgent job (`Ok(None)` when the queue is empty)
    async fn pop(&self) -> QueueResult<Option<Job>>;

    /// Metadata of the most urgent job without removing it
    async fn peek(&self) -> QueueResult<Option<JobSummary>>;

    /// Number of queued jobs
    async fn len(&self) -> QueueResult<usize>;

    /// Short name used in logs
    fn kind(&self) -> BackendKind;
}

/// Available shared-state strategies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One lock around the heap
    #[default]
    Mutex,
    /// One owner task reached over a channel
    Actor,
}

impl BackendKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Mutex => "mutex",
            Self::Actor => "actor",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mutex" | "memory" => Ok(Self::Mutex),
            "actor" => Ok(Self::Actor),
            _ => Err(format!("Invalid backend: {}", s)),
        }
    }
}
