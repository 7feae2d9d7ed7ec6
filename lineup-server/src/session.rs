//! Per-connection protocol state machine.
//!
//! A session never performs I/O. The connection driver appends whatever
//! bytes arrived to an input buffer and calls [`ConnectionSession::on_readable`];
//! the session consumes every complete frame already buffered, appends the
//! replies to an output buffer, and reports whether the connection stays
//! open. Incomplete frames are left in the buffer until more bytes arrive.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use lineup_queue::{Job, LiveMetrics, QueueBackend, QueueError};
use tracing::{debug, warn};

use crate::dispatcher::SessionId;
use crate::error::ErrorCode;
use crate::protocol::{parse_command, Command, Reply, CRLF};

/// Size limits applied while framing input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    /// Longest command line accepted, CR LF excluded
    pub max_line_bytes: usize,
    /// Largest `PUSH` body accepted
    pub max_payload_bytes: usize,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            max_line_bytes: 1024,
            max_payload_bytes: 16 * 1024 * 1024, // 16MB
        }
    }
}

/// Where the session is in the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for a CR LF terminated command line
    AwaitingCommand,
    /// A `PUSH` line was accepted; waiting for `length` body bytes plus CR LF
    AwaitingBody { priority: i64, length: usize },
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Client sent `EXIT`
    Exit,
    /// Peer closed its side
    PeerClosed,
    /// No bytes arrived within the idle window
    IdleTimeout,
    /// Stream framing could not be trusted any more
    Framing(ErrorCode),
    /// The shared queue is gone
    BackendUnavailable,
    /// Server is shutting down
    Shutdown,
    /// Transport failure
    Io(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exit => write!(f, "exit"),
            Self::PeerClosed => write!(f, "peer closed"),
            Self::IdleTimeout => write!(f, "idle timeout"),
            Self::Framing(code) => write!(f, "framing error {}", code.as_str()),
            Self::BackendUnavailable => write!(f, "queue unavailable"),
            Self::Shutdown => write!(f, "server shutdown"),
            Self::Io(err) => write!(f, "i/o error: {}", err),
        }
    }
}

/// Result of feeding buffered input to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading
    Continue,
    /// Flush the output buffer, then close
    Close(CloseReason),
}

enum Step {
    Progress,
    NeedMore,
    Close(CloseReason),
}

/// Protocol state for one accepted connection
pub struct ConnectionSession {
    id: SessionId,
    peer: SocketAddr,
    state: SessionState,
    backend: Arc<dyn QueueBackend>,
    metrics: Arc<LiveMetrics>,
    limits: FrameLimits,
    commands: u64,
}

impl ConnectionSession {
    pub fn new(
        id: SessionId,
        peer: SocketAddr,
        backend: Arc<dyn QueueBackend>,
        metrics: Arc<LiveMetrics>,
        limits: FrameLimits,
    ) -> Self {
        Self {
            id,
            peer,
            state: SessionState::AwaitingCommand,
            backend,
            metrics,
            limits,
            commands: 0,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Commands fully handled so far
    pub fn commands_handled(&self) -> u64 {
        self.commands
    }

    /// Consume every complete frame in `input`, appending replies to `output`
    pub async fn on_readable(&mut self, input: &mut BytesMut, output: &mut BytesMut) -> Flow {
        loop {
            let step = match self.state {
                SessionState::AwaitingCommand => self.read_command(input, output).await,
                SessionState::AwaitingBody { priority, length } => {
                    self.read_body(priority, length, input, output).await
                }
            };
            match step {
                Step::Progress => continue,
                Step::NeedMore => return Flow::Continue,
                Step::Close(reason) => return Flow::Close(reason),
            }
        }
    }

    /// The peer stopped sending; report a truncated body if one was pending
    pub fn on_eof(&mut self, input: &BytesMut, output: &mut BytesMut) -> CloseReason {
        self.truncated_body(input, output)
            .unwrap_or(CloseReason::PeerClosed)
    }

    /// Nothing arrived within the idle window
    pub fn on_idle_timeout(&mut self, input: &BytesMut, output: &mut BytesMut) -> CloseReason {
        self.truncated_body(input, output)
            .unwrap_or(CloseReason::IdleTimeout)
    }

    async fn read_command(&mut self, input: &mut BytesMut, output: &mut BytesMut) -> Step {
        let Some(end) = find_crlf(&input[..]) else {
            if input.len() > self.limits.max_line_bytes + 1 {
                // A runaway line without CR LF cannot be resynchronised
                self.reject(ErrorCode::UnexpectedInput, output);
                return Step::Close(CloseReason::Framing(ErrorCode::UnexpectedInput));
            }
            return Step::NeedMore;
        };

        let frame = input.split_to(end + CRLF.len());
        let line = &frame[..end];
        if line.len() > self.limits.max_line_bytes {
            self.reject(ErrorCode::UnexpectedInput, output);
            return Step::Close(CloseReason::Framing(ErrorCode::UnexpectedInput));
        }

        let command = match parse_command(line) {
            Ok(command) => command,
            Err(code) => {
                debug!(
                    session = %self.id,
                    line = %String::from_utf8_lossy(line),
                    "Rejected command line"
                );
                self.reject(code, output);
                return if code.is_framing() {
                    Step::Close(CloseReason::Framing(code))
                } else {
                    Step::Progress
                };
            }
        };

        debug!(session = %self.id, command = command.verb(), "Command received");
        match command {
            Command::Exit => {
                self.commands += 1;
                debug!(session = %self.id, peer = %self.peer, "EXIT received");
                Step::Close(CloseReason::Exit)
            }
            Command::Ping => {
                self.commands += 1;
                Reply::Pong.encode(output);
                Step::Progress
            }
            Command::Pop => self.pop(output).await,
            Command::Push { priority, length } => {
                let accepted = usize::try_from(length)
                    .ok()
                    .filter(|len| *len <= self.limits.max_payload_bytes);
                match accepted {
                    Some(length) => {
                        self.state = SessionState::AwaitingBody { priority, length };
                        Step::Progress
                    }
                    None => {
                        warn!(
                            session = %self.id,
                            declared = length,
                            max = self.limits.max_payload_bytes,
                            "PUSH body larger than allowed"
                        );
                        self.reject(ErrorCode::MessageSizeInvalid, output);
                        Step::Close(CloseReason::Framing(ErrorCode::MessageSizeInvalid))
                    }
                }
            }
        }
    }

    async fn read_body(
        &mut self,
        priority: i64,
        length: usize,
        input: &mut BytesMut,
        output: &mut BytesMut,
    ) -> Step {
        if terminator_broken(input, length) {
            self.state = SessionState::AwaitingCommand;
            self.reject(ErrorCode::ExpectedTerminator, output);
            return Step::Close(CloseReason::Framing(ErrorCode::ExpectedTerminator));
        }
        if input.len() < length + CRLF.len() {
            return Step::NeedMore;
        }

        let body = input.split_to(length);
        let terminator = input.split_to(CRLF.len());
        self.state = SessionState::AwaitingCommand;

        if terminator.as_ref() != CRLF {
            self.reject(ErrorCode::ExpectedTerminator, output);
            return Step::Close(CloseReason::Framing(ErrorCode::ExpectedTerminator));
        }

        // Copy so a queued job never pins the connection's read buffer
        let job = match Job::try_new(priority, &body) {
            Ok(job) => job,
            Err(err) => {
                warn!(session = %self.id, error = %err, "Job not created");
                self.reject(ErrorCode::MessageNotCreated, output);
                return Step::Progress;
            }
        };

        self.commands += 1;
        match self.backend.push(job).await {
            Ok(sequence) => {
                self.metrics.increment_jobs_pushed();
                debug!(session = %self.id, priority, length, sequence, "PUSH accepted");
                Reply::Ok.encode(output);
                Step::Progress
            }
            Err(err) => {
                self.metrics.increment_push_failures();
                warn!(session = %self.id, priority, length, error = %err, "PUSH failed");
                self.reject(ErrorCode::MessageNotPushed, output);
                if err == QueueError::BackendClosed {
                    Step::Close(CloseReason::BackendUnavailable)
                } else {
                    Step::Progress
                }
            }
        }
    }

    async fn pop(&mut self, output: &mut BytesMut) -> Step {
        self.commands += 1;
        match self.backend.pop().await {
            Ok(Some(job)) => {
                self.metrics.increment_jobs_popped();
                debug!(
                    session = %self.id,
                    priority = job.priority().value(),
                    length = job.len(),
                    sequence = job.sequence(),
                    "POP delivered"
                );
                Reply::Message(job.into_payload()).encode(output);
                Step::Progress
            }
            Ok(None) => {
                self.metrics.increment_empty_pops();
                Reply::Error(ErrorCode::NoMessages).encode(output);
                Step::Progress
            }
            Err(err) => {
                warn!(session = %self.id, error = %err, "POP failed");
                Step::Close(CloseReason::BackendUnavailable)
            }
        }
    }

    fn truncated_body(&mut self, input: &BytesMut, output: &mut BytesMut) -> Option<CloseReason> {
        let SessionState::AwaitingBody { length, .. } = self.state else {
            return None;
        };
        self.state = SessionState::AwaitingCommand;

        let code = if input.len() < length {
            ErrorCode::MessageSizeInvalid
        } else if terminator_broken(input, length) {
            ErrorCode::ExpectedTerminator
        } else {
            ErrorCode::MessageNotFullyRead
        };
        self.reject(code, output);
        Some(CloseReason::Framing(code))
    }

    fn reject(&self, code: ErrorCode, output: &mut BytesMut) {
        if code != ErrorCode::NoMessages {
            self.metrics.increment_protocol_errors();
            warn!(session = %self.id, peer = %self.peer, code = code.as_str(), "Protocol error");
        }
        Reply::Error(code).encode(output);
    }
}

/// The first byte after the body is already known and is not CR
fn terminator_broken(input: &[u8], length: usize) -> bool {
    input.get(length).is_some_and(|byte| *byte != CRLF[0])
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(CRLF.len()).position(|window| window == CRLF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineup_queue::MemoryBackend;

    fn session_with(backend: Arc<dyn QueueBackend>, limits: FrameLimits) -> ConnectionSession {
        ConnectionSession::new(
            SessionId::new(),
            "127.0.0.1:40000".parse().unwrap(),
            backend,
            Arc::new(LiveMetrics::new()),
            limits,
        )
    }

    fn session() -> (ConnectionSession, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        (session_with(backend.clone(), FrameLimits::default()), backend)
    }

    async fn feed(
        session: &mut ConnectionSession,
        input: &mut BytesMut,
        bytes: &[u8],
    ) -> (Flow, BytesMut) {
        input.extend_from_slice(bytes);
        let mut output = BytesMut::new();
        let flow = session.on_readable(input, &mut output).await;
        (flow, output)
    }

    #[tokio::test]
    async fn test_push_then_pop() {
        let (mut session, _backend) = session();
        let mut input = BytesMut::new();

        let (flow, out) = feed(&mut session, &mut input, b"PUSH 5 3\r\nabc\r\n").await;
        assert_eq!(flow, Flow::Continue);
        assert_eq!(&out[..], b"+OK\r\n");

        let (_, out) = feed(&mut session, &mut input, b"POP\r\n").await;
        assert_eq!(&out[..], b"$3\r\nabc\r\n");
        assert_eq!(session.commands_handled(), 2);
    }

    #[tokio::test]
    async fn test_pop_on_empty_queue() {
        let (mut session, _backend) = session();
        let mut input = BytesMut::new();

        let (flow, out) = feed(&mut session, &mut input, b"POP\r\n").await;
        assert_eq!(flow, Flow::Continue);
        assert_eq!(&out[..], b"-NO_MESSAGES\r\n");
    }

    #[tokio::test]
    async fn test_body_split_across_reads() {
        let (mut session, backend) = session();
        let mut input = BytesMut::new();

        let (_, out) = feed(&mut session, &mut input, b"PUSH 2 6\r\nab").await;
        assert!(out.is_empty());
        assert_eq!(session.state(), SessionState::AwaitingBody { priority: 2, length: 6 });

        let (_, out) = feed(&mut session, &mut input, b"\r\ncd").await;
        assert!(out.is_empty());

        let (_, out) = feed(&mut session, &mut input, b"\r\n").await;
        assert_eq!(&out[..], b"+OK\r\n");
        assert_eq!(session.state(), SessionState::AwaitingCommand);

        let job = backend.pop().await.unwrap().unwrap();
        assert_eq!(job.payload().as_ref(), b"ab\r\ncd");
    }

    #[tokio::test]
    async fn test_pipelined_commands() {
        let (mut session, _backend) = session();
        let mut input = BytesMut::new();

        let (flow, out) = feed(
            &mut session,
            &mut input,
            b"PING\r\nPUSH 9 1\r\nz\r\nPUSH 1 1\r\na\r\nPOP\r\nPOP\r\nPOP\r\n",
        )
        .await;

        assert_eq!(flow, Flow::Continue);
        assert_eq!(
            &out[..],
            b"+PONG\r\n+OK\r\n+OK\r\n$1\r\na\r\n$1\r\nz\r\n-NO_MESSAGES\r\n".as_slice()
        );
        assert!(input.is_empty());
    }

    #[tokio::test]
    async fn test_parse_error_consumes_only_the_line() {
        let (mut session, backend) = session();
        let mut input = BytesMut::new();

        let (flow, out) = feed(&mut session, &mut input, b"PUSH abc 3\r\nPING\r\n").await;

        assert_eq!(flow, Flow::Continue);
        assert_eq!(&out[..], b"-EXPECTED_PRIORITY\r\n+PONG\r\n");
        assert_eq!(backend.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let (mut session, _backend) = session();
        let mut input = BytesMut::new();

        let (flow, out) = feed(&mut session, &mut input, b"TAKE\r\n").await;
        assert_eq!(flow, Flow::Continue);
        assert_eq!(&out[..], b"-INVALID_COMMAND\r\n");
    }

    #[tokio::test]
    async fn test_exit_closes_without_reply() {
        let (mut session, backend) = session();
        backend.push(Job::new(1, "keep")).await.unwrap();
        let mut input = BytesMut::new();

        let (flow, out) = feed(&mut session, &mut input, b"EXIT\r\nPOP\r\n").await;

        assert_eq!(flow, Flow::Close(CloseReason::Exit));
        assert!(out.is_empty());
        assert_eq!(backend.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_bad_terminator_closes() {
        let (mut session, backend) = session();
        let mut input = BytesMut::new();

        let (flow, out) = feed(&mut session, &mut input, b"PUSH 1 2\r\nabXY").await;

        assert_eq!(flow, Flow::Close(CloseReason::Framing(ErrorCode::ExpectedTerminator)));
        assert_eq!(&out[..], b"-EXPECTED_TERMINATOR\r\n");
        assert_eq!(backend.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_truncated_body_at_eof() {
        let (mut session, backend) = session();
        let mut input = BytesMut::new();

        let (flow, out) = feed(&mut session, &mut input, b"PUSH 1 5\r\nab\r\n").await;
        assert_eq!(flow, Flow::Continue);
        assert!(out.is_empty());

        let mut out = BytesMut::new();
        let reason = session.on_eof(&input, &mut out);

        assert_eq!(reason, CloseReason::Framing(ErrorCode::MessageSizeInvalid));
        assert_eq!(&out[..], b"-MESSAGE_SIZE_INVALID\r\n");
        assert_eq!(backend.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_terminator_at_idle_timeout() {
        let (mut session, _backend) = session();
        let mut input = BytesMut::new();

        feed(&mut session, &mut input, b"PUSH 1 3\r\nabc\r").await;

        let mut out = BytesMut::new();
        let reason = session.on_idle_timeout(&input, &mut out);

        assert_eq!(reason, CloseReason::Framing(ErrorCode::MessageNotFullyRead));
        assert_eq!(&out[..], b"-MESSAGE_NOT_FULLY_READ\r\n");
    }

    #[tokio::test]
    async fn test_wrong_terminator_byte_fails_before_full_frame() {
        let (mut session, backend) = session();
        let mut input = BytesMut::new();

        let (flow, out) = feed(&mut session, &mut input, b"PUSH 1 3\r\nabc").await;
        assert_eq!(flow, Flow::Continue);
        assert!(out.is_empty());

        let (flow, out) = feed(&mut session, &mut input, b"X").await;

        assert_eq!(flow, Flow::Close(CloseReason::Framing(ErrorCode::ExpectedTerminator)));
        assert_eq!(&out[..], b"-EXPECTED_TERMINATOR\r\n");
        assert_eq!(backend.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_wrong_terminator_byte_at_eof() {
        let (mut session, _backend) = session();
        session.state = SessionState::AwaitingBody { priority: 1, length: 3 };
        let input = BytesMut::from(&b"abcX"[..]);

        let mut out = BytesMut::new();
        let reason = session.on_eof(&input, &mut out);

        assert_eq!(reason, CloseReason::Framing(ErrorCode::ExpectedTerminator));
        assert_eq!(&out[..], b"-EXPECTED_TERMINATOR\r\n");
        assert_eq!(session.state(), SessionState::AwaitingCommand);
    }

    #[tokio::test]
    async fn test_idle_while_awaiting_command() {
        let (mut session, _backend) = session();
        let mut out = BytesMut::new();

        let reason = session.on_idle_timeout(&BytesMut::new(), &mut out);

        assert_eq!(reason, CloseReason::IdleTimeout);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected_before_reading() {
        let backend = Arc::new(MemoryBackend::new());
        let limits = FrameLimits {
            max_payload_bytes: 4,
            ..FrameLimits::default()
        };
        let mut session = session_with(backend, limits);
        let mut input = BytesMut::new();

        let (flow, out) = feed(&mut session, &mut input, b"PUSH 1 5\r\n").await;

        assert_eq!(flow, Flow::Close(CloseReason::Framing(ErrorCode::MessageSizeInvalid)));
        assert_eq!(&out[..], b"-MESSAGE_SIZE_INVALID\r\n");
    }

    #[tokio::test]
    async fn test_runaway_line_closes() {
        let backend = Arc::new(MemoryBackend::new());
        let limits = FrameLimits {
            max_line_bytes: 8,
            ..FrameLimits::default()
        };
        let mut session = session_with(backend, limits);
        let mut input = BytesMut::new();

        let (flow, _) = feed(&mut session, &mut input, b"PING").await;
        assert_eq!(flow, Flow::Continue);

        let (flow, out) = feed(&mut session, &mut input, b"PINGPINGPING").await;
        assert_eq!(flow, Flow::Close(CloseReason::Framing(ErrorCode::UnexpectedInput)));
        assert_eq!(&out[..], b"-UNEXPECTED_INPUT\r\n");
    }

    #[tokio::test]
    async fn test_push_failure_reports_not_pushed() {
        let backend = Arc::new(MemoryBackend::with_limits(1, Some(1)).unwrap());
        let mut session = session_with(backend, FrameLimits::default());
        let mut input = BytesMut::new();

        let (flow, out) =
            feed(&mut session, &mut input, b"PUSH 1 1\r\na\r\nPUSH 1 1\r\nb\r\n").await;

        assert_eq!(flow, Flow::Continue);
        assert_eq!(&out[..], b"+OK\r\n-MESSAGE_NOT_PUSHED\r\n");
    }

    #[tokio::test]
    async fn test_zero_length_body() {
        let (mut session, _backend) = session();
        let mut input = BytesMut::new();

        let (_, out) = feed(&mut session, &mut input, b"PUSH 3 0\r\n\r\nPOP\r\n").await;
        assert_eq!(&out[..], b"+OK\r\n$0\r\n\r\n");
    }
}
