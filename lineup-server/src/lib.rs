//! # lineup-server: TCP front end for the Lineup priority queue
//!
//! Speaks a small CR LF line protocol over plain TCP. Every connection gets
//! its own [`ConnectionSession`]; all sessions share one queue backend owned
//! by the [`Dispatcher`].
//!
//! ```text
//! PUSH <priority> <length>\r\n<body>\r\n   ->  +OK\r\n
//! POP\r\n                                  ->  $<length>\r\n<body>\r\n | -NO_MESSAGES\r\n
//! PING\r\n                                 ->  +PONG\r\n
//! EXIT\r\n                                 ->  (connection closed)
//! ```
//!
//! Lower priority values are served first.

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod pidfile;
pub mod protocol;
pub mod server;
pub mod session;

pub use cli::Cli;
pub use config::ServerConfig;
pub use dispatcher::{Dispatcher, SessionId, SessionInfo};
pub use error::{ConfigError, ErrorClass, ErrorCode, ServerError};
pub use logging::LogFormat;
pub use pidfile::PidFile;
pub use protocol::{parse_command, Command, Reply};
pub use server::QueueServer;
pub use session::{CloseReason, ConnectionSession, Flow, FrameLimits, SessionState};
