use async_trait::async_trait;
use parking_lot::Mutex;

use super::heap::{PriorityQueue, DEFAULT_INITIAL_CAPACITY};
use crate::{
    backend::{BackendKind, QueueBackend},
    Job, JobSummary, QueueResult,
};

/// Lock-guarded backend: one `PriorityQueue` behind one mutex
///
/// Each operation is a single short critical section; the lock is never
/// held across an await point.
pub struct MemoryBackend {
    pub(crate) heap: Mutex<PriorityQueue>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::from_queue(PriorityQueue::new())
    }

    /// Preallocate `initial_capacity` slots and optionally bound the queue
    pub fn with_limits(initial_capacity: usize, max_jobs: Option<usize>) -> QueueResult<Self> {
        let queue = PriorityQueue::with_capacity(initial_capacity)?.with_max_jobs(max_jobs);
        Ok(Self::from_queue(queue))
    }

    pub fn from_queue(queue: PriorityQueue) -> Self {
        Self {
            heap: Mutex::new(queue),
        }
    }

    /// Allocated slots of the underlying heap
    pub fn capacity(&self) -> usize {
        self.heap.lock().capacity()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::from_queue(
            PriorityQueue::with_capacity(DEFAULT_INITIAL_CAPACITY).unwrap_or_default(),
        )
    }
}

#[async_trait]
impl QueueBackend for MemoryBackend {
    async fn push(&self, job: Job) -> QueueResult<u64> {
        self.heap.lock().push(job)
    }

    async fn pop(&self) -> QueueResult<Option<Job>> {
        Ok(self.heap.lock().pop())
    }

    async fn peek(&self) -> QueueResult<Option<JobSummary>> {
        Ok(self.heap.lock().peek_summary())
    }

    async fn len(&self) -> QueueResult<usize> {
        Ok(self.heap.lock().len())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Mutex
    }
}
