//! TCP listener and per-connection driver.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;
use crate::error::ServerError;
use crate::session::{CloseReason, ConnectionSession, Flow};

const READ_CHUNK: usize = 8 * 1024;
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Listening queue server
pub struct QueueServer {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    config: ServerConfig,
}

impl QueueServer {
    /// Validate `config`, create the queue and bind the listener
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;
        let dispatcher = Dispatcher::from_config(&config)?;
        Self::bind_with(config, Arc::new(dispatcher)).await
    }

    /// Bind the listener around an existing dispatcher
    pub async fn bind_with(
        config: ServerConfig,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<Self, ServerError> {
        let addr = config.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;

        info!(
            address = %listener.local_addr()?,
            backend = %dispatcher.backend().kind(),
            idle_timeout = ?config.idle_timeout,
            "Queue server listening"
        );

        Ok(Self {
            listener,
            dispatcher,
            config,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// Open sessions are then told to stop and get a short grace period
    /// to flush before they are aborted.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let session = self.dispatcher.open(peer);
                        let dispatcher = self.dispatcher.clone();
                        let idle = self.config.idle_timeout;
                        let stop = stop_rx.clone();
                        connections.spawn(async move {
                            let mut session = session;
                            let reason = drive_connection(stream, &mut session, idle, stop).await;
                            dispatcher.close(&session, &reason);
                        });
                    }
                    Err(e) => {
                        // Usually descriptor exhaustion; the listener itself is still fine
                        warn!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Connection task failed");
                    }
                }
            }
        }

        info!(
            active = self.dispatcher.active_connections(),
            "Shutting down queue server"
        );
        let _ = stop_tx.send(true);

        let drain = async { while connections.join_next().await.is_some() {} };
        if timeout(SHUTDOWN_GRACE, drain).await.is_err() {
            warn!(
                remaining = connections.len(),
                "Sessions did not finish in time, aborting"
            );
            connections.abort_all();
            while connections.join_next().await.is_some() {}
        }

        let aborted = self.dispatcher.close_remaining(&CloseReason::Shutdown);
        if aborted > 0 {
            warn!(aborted, "Closed sessions that were aborted");
        }

        let snapshot = self.dispatcher.metrics().snapshot();
        match serde_json::to_string(&snapshot) {
            Ok(json) => info!(
                metrics = %json,
                total_connections = self.dispatcher.total_connections(),
                "Queue server stopped"
            ),
            Err(e) => warn!(error = %e, "Could not encode final metrics"),
        }
        Ok(())
    }
}

async fn drive_connection(
    mut stream: TcpStream,
    session: &mut ConnectionSession,
    idle: Option<Duration>,
    mut stop: watch::Receiver<bool>,
) -> CloseReason {
    if let Err(e) = stream.set_nodelay(true) {
        warn!("Failed to set TCP_NODELAY: {}", e);
    }

    let mut input = BytesMut::with_capacity(READ_CHUNK);
    let mut output = BytesMut::with_capacity(READ_CHUNK);

    let reason = loop {
        input.reserve(READ_CHUNK);
        let read = tokio::select! {
            read = read_chunk(&mut stream, &mut input, idle) => read,
            _ = stop.changed() => break CloseReason::Shutdown,
        };

        match read {
            Ok(Some(0)) => break session.on_eof(&input, &mut output),
            Ok(Some(n)) => debug!(session = %session.id(), bytes = n, "Read"),
            Ok(None) => break session.on_idle_timeout(&input, &mut output),
            Err(e) => break CloseReason::Io(e.to_string()),
        }

        let flow = session.on_readable(&mut input, &mut output).await;
        if let Err(e) = flush(&mut stream, &mut output).await {
            break CloseReason::Io(e.to_string());
        }
        if let Flow::Close(reason) = flow {
            break reason;
        }
    };

    if let Err(e) = flush(&mut stream, &mut output).await {
        debug!(session = %session.id(), error = %e, "Final flush failed");
    }
    let _ = stream.shutdown().await;
    reason
}

/// `Ok(None)` means the idle window elapsed
async fn read_chunk(
    stream: &mut TcpStream,
    input: &mut BytesMut,
    idle: Option<Duration>,
) -> io::Result<Option<usize>> {
    match idle {
        Some(limit) => match timeout(limit, stream.read_buf(input)).await {
            Ok(read) => read.map(Some),
            Err(_) => Ok(None),
        },
        None => stream.read_buf(input).await.map(Some),
    }
}

async fn flush(stream: &mut TcpStream, output: &mut BytesMut) -> io::Result<()> {
    if output.is_empty() {
        return Ok(());
    }
    stream.write_all(output).await?;
    output.clear();
    Ok(())
}
