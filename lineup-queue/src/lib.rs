//! # lineup-queue: in-memory priority job queue
//!
//! A growable binary min-heap of binary jobs plus the shared-state
//! backends the Lineup daemon hands to its connection sessions.
//!
//! - **Lowest value first**: priority `0` is served before priority `5`;
//!   equal priorities are served in arrival order.
//! - **Binary safe**: payloads are opaque `Bytes` with an explicit length.
//! - **Distinct failure signals**: an empty queue is `Ok(None)`, resource
//!   exhaustion is a `QueueError`.
//! - **Two sharing strategies**: [`MemoryBackend`] guards the heap with a
//!   single mutex, [`ActorBackend`] gives it to one owner task.
//!
//! ```rust
//! use lineup_queue::{Job, PriorityQueue};
//!
//! let mut queue = PriorityQueue::new();
//! queue.push(Job::new(5, "later")).unwrap();
//! queue.push(Job::new(1, "sooner")).unwrap();
//!
//! assert_eq!(queue.pop().unwrap().payload().as_ref(), b"sooner");
//! ```

pub mod backend;
pub mod error;
pub mod observability;
pub mod types;

pub use backend::actor::ActorBackend;
pub use backend::memory::{MemoryBackend, PriorityQueue, DEFAULT_INITIAL_CAPACITY};
pub use backend::{BackendKind, QueueBackend};
pub use error::{QueueError, QueueResult};
pub use observability::{LiveMetrics, MetricsSnapshot};
pub use types::{Job, JobSummary, Priority};

/// Common imports for queue users
pub mod prelude {
    pub use crate::{
        ActorBackend, BackendKind, Job, LiveMetrics, MemoryBackend, Priority, PriorityQueue,
        QueueBackend, QueueError, QueueResult,
    };

    pub use async_trait::async_trait;
}
