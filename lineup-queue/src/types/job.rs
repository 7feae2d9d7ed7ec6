use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;

use super::Priority;
use crate::{QueueError, QueueResult};

/// A priority-tagged binary message
///
/// Immutable after creation. The queue assigns `sequence` when the job is
/// pushed; it breaks ties between equal priorities in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    priority: Priority,
    payload: Bytes,
    sequence: u64,
    enqueued_at: DateTime<Utc>,
}

impl Job {
    /// Create a job that owns `payload`
    pub fn new(priority: impl Into<Priority>, payload: impl Into<Bytes>) -> Self {
        Self {
            priority: priority.into(),
            payload: payload.into(),
            sequence: 0,
            enqueued_at: Utc::now(),
        }
    }

    /// Create a job by copying `body` with a fallible allocation
    pub fn try_new(priority: impl Into<Priority>, body: &[u8]) -> QueueResult<Self> {
        let mut owned = Vec::new();
        owned
            .try_reserve_exact(body.len())
            .map_err(|_| QueueError::JobNotCreated { size: body.len() })?;
        owned.extend_from_slice(body);
        Ok(Self::new(priority, owned))
    }

    pub(crate) fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consume the job, keeping only the body
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Byte count of the payload
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Arrival order assigned by the queue
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    /// Heap ordering: priority first, then arrival
    pub(crate) fn heap_cmp(&self, other: &Job) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then(self.sequence.cmp(&other.sequence))
    }

    /// Metadata view without the body
    pub fn summary(&self) -> JobSummary {
        JobSummary {
            priority: self.priority,
            length: self.payload.len(),
            sequence: self.sequence,
            enqueued_at: self.enqueued_at,
        }
    }
}

/// Job metadata returned by `peek`, cheap to hand across tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub priority: Priority,
    pub length: usize,
    pub sequence: u64,
    pub enqueued_at: DateTime<Utc>,
}
