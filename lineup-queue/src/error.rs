use thiserror::Error;

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Resource errors raised by the queue and its backends.
///
/// An empty queue is not an error: `pop` and `peek` report it as `Ok(None)`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The job body could not be allocated
    #[error("Job could not be created: payload of {size} bytes not allocated")]
    JobNotCreated { size: usize },

    /// The heap could not grow to hold another job
    #[error("Queue capacity exhausted at {capacity} jobs")]
    CapacityExhausted { capacity: usize },

    /// The owner task of an actor backend has stopped
    #[error("Queue backend is closed")]
    BackendClosed,
}

impl QueueError {
    /// True when the failure comes from allocation or a configured bound
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, Self::JobNotCreated { .. } | Self::CapacityExhausted { .. })
    }
}
