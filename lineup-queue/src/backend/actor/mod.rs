//! Single-owner backend.
//!
//! One task owns the `PriorityQueue` outright and serves requests from a
//! bounded mailbox in arrival order, so no lock is ever taken. Handles are
//! cheap to clone; the owner task stops once every handle is dropped.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{
    backend::{memory::PriorityQueue, BackendKind, QueueBackend},
    Job, JobSummary, QueueError, QueueResult,
};

/// Default mailbox depth for the owner task
pub const DEFAULT_MAILBOX: usize = 1024;

/// Requests understood by the owner task
#[derive(Debug)]
enum QueueCommand {
    Push {
        job: Job,
        reply: oneshot::Sender<QueueResult<u64>>,
    },
    Pop {
        reply: oneshot::Sender<Option<Job>>,
    },
    Peek {
        reply: oneshot::Sender<Option<JobSummary>>,
    },
    Len {
        reply: oneshot::Sender<usize>,
    },
}

/// Handle to the owner task
#[derive(Clone)]
pub struct ActorBackend {
    mailbox: mpsc::Sender<QueueCommand>,
}

impl ActorBackend {
    /// Spawn the owner task on the current runtime
    pub fn spawn(queue: PriorityQueue) -> (Self, JoinHandle<()>) {
        Self::spawn_with_mailbox(queue, DEFAULT_MAILBOX)
    }

    pub fn spawn_with_mailbox(queue: PriorityQueue, mailbox: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(mailbox.max(1));
        let actor = QueueActor { queue, inbox: rx };
        let join_handle = tokio::spawn(actor.run());
        (Self { mailbox: tx }, join_handle)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> QueueCommand,
    ) -> QueueResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.mailbox
            .send(make(reply_tx))
            .await
            .map_err(|_| QueueError::BackendClosed)?;
        reply_rx.await.map_err(|_| QueueError::BackendClosed)
    }
}

#[async_trait]
impl QueueBackend for ActorBackend {
    async fn push(&self, job: Job) -> QueueResult<u64> {
        self.request(|reply| QueueCommand::Push { job, reply }).await?
    }

    async fn pop(&self) -> QueueResult<Option<Job>> {
        self.request(|reply| QueueCommand::Pop { reply }).await
    }

    async fn peek(&self) -> QueueResult<Option<JobSummary>> {
        self.request(|reply| QueueCommand::Peek { reply }).await
    }

    async fn len(&self) -> QueueResult<usize> {
        self.request(|reply| QueueCommand::Len { reply }).await
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Actor
    }
}

struct QueueActor {
    queue: PriorityQueue,
    inbox: mpsc::Receiver<QueueCommand>,
}

impl QueueActor {
    async fn run(mut self) {
        info!(capacity = self.queue.capacity(), "Queue actor started");

        while let Some(command) = self.inbox.recv().await {
            self.handle(command);
        }

        info!(remaining = self.queue.len(), "Queue actor stopped");
    }

    fn handle(&mut self, command: QueueCommand) {
        // A dropped reply receiver means the caller went away; the
        // mutation still stands.
        match command {
            QueueCommand::Push { job, reply } => {
                let _ = reply.send(self.queue.push(job));
            }
            QueueCommand::Pop { reply } => {
                let job = self.queue.pop();
                // The job is requeued with a fresh sequence number
                if let Err(Some(job)) = reply.send(job) {
                    debug!(sequence = job.sequence(), "Pop caller vanished, requeueing job");
                    let _ = self.queue.push(job);
                }
            }
            QueueCommand::Peek { reply } => {
                let _ = reply.send(self.queue.peek_summary());
            }
            QueueCommand::Len { reply } => {
                let _ = reply.send(self.queue.len());
            }
        }
    }
}
