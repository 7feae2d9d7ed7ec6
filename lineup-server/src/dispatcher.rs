use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use lineup_queue::{
    ActorBackend, BackendKind, LiveMetrics, MemoryBackend, PriorityQueue, QueueBackend,
    QueueResult,
};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::session::{CloseReason, ConnectionSession, FrameLimits};

/// Unique identifier for a connection session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry entry for an open session
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub peer: SocketAddr,
    pub connected_at: DateTime<Utc>,
}

/// Owner of the shared queue and registry of live sessions
///
/// Every accepted connection gets its own [`ConnectionSession`] from
/// [`Dispatcher::open`]; all of them share the one backend held here.
pub struct Dispatcher {
    backend: Arc<dyn QueueBackend>,
    metrics: Arc<LiveMetrics>,
    limits: FrameLimits,
    sessions: DashMap<SessionId, SessionInfo>,
    total_connections: AtomicU64,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn QueueBackend>, limits: FrameLimits) -> Self {
        Self {
            backend,
            metrics: Arc::new(LiveMetrics::new()),
            limits,
            sessions: DashMap::new(),
            total_connections: AtomicU64::new(0),
        }
    }

    /// Build the backend selected by `config`.
    ///
    /// The actor backend is spawned on the current runtime and stops once
    /// the dispatcher and every session have released it.
    pub fn from_config(config: &ServerConfig) -> QueueResult<Self> {
        let queue = PriorityQueue::with_capacity(config.initial_capacity)?
            .with_max_jobs(config.max_jobs);

        let backend: Arc<dyn QueueBackend> = match config.backend {
            BackendKind::Mutex => Arc::new(MemoryBackend::from_queue(queue)),
            BackendKind::Actor => {
                let (backend, _owner) = ActorBackend::spawn(queue);
                Arc::new(backend)
            }
        };

        info!(
            backend = %config.backend,
            initial_capacity = config.initial_capacity,
            max_jobs = ?config.max_jobs,
            "Queue ready"
        );

        Ok(Self::new(backend, config.frame_limits()))
    }

    /// Register a new connection and create its session
    pub fn open(&self, peer: SocketAddr) -> ConnectionSession {
        let id = SessionId::new();
        self.sessions.insert(
            id,
            SessionInfo {
                id,
                peer,
                connected_at: Utc::now(),
            },
        );
        let total = self.total_connections.fetch_add(1, Ordering::Relaxed) + 1;
        self.metrics.increment_connections_opened();

        info!(
            session = %id,
            peer = %peer,
            active = self.sessions.len(),
            total,
            "Connected"
        );

        ConnectionSession::new(
            id,
            peer,
            self.backend.clone(),
            self.metrics.clone(),
            self.limits,
        )
    }

    /// Deregister a finished session
    pub fn close(&self, session: &ConnectionSession, reason: &CloseReason) {
        if self.sessions.remove(&session.id()).is_none() {
            debug!(session = %session.id(), "Session already closed");
            return;
        }
        self.metrics.increment_connections_closed();

        info!(
            session = %session.id(),
            peer = %session.peer(),
            commands = session.commands_handled(),
            reason = %reason,
            active = self.sessions.len(),
            "Disconnected"
        );
    }

    /// Deregister every session still open, e.g. ones whose tasks were
    /// aborted. Returns how many were closed.
    pub fn close_remaining(&self, reason: &CloseReason) -> usize {
        let ids: Vec<SessionId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        let mut closed = 0;
        for id in ids {
            let Some((_, info)) = self.sessions.remove(&id) else {
                continue;
            };
            self.metrics.increment_connections_closed();
            info!(session = %id, peer = %info.peer, reason = %reason, "Disconnected");
            closed += 1;
        }
        closed
    }

    pub fn active_connections(&self) -> usize {
        self.sessions.len()
    }

    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    /// Snapshot of the open sessions
    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.sessions.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn backend(&self) -> &Arc<dyn QueueBackend> {
        &self.backend
    }

    pub fn metrics(&self) -> &Arc<LiveMetrics> {
        &self.metrics
    }
}
