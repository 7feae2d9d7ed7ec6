use std::io;

use lineup_queue::QueueError;
use thiserror::Error;

/// Error codes sent to clients as `-<CODE>\r\n`
///
/// All of them are per-connection; none stops the server.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    #[error("expected a decimal priority after PUSH")]
    ExpectedPriority,

    #[error("expected a decimal message length")]
    ExpectedMessageLength,

    #[error("unexpected input in command line")]
    UnexpectedInput,

    #[error("unknown command")]
    InvalidCommand,

    #[error("message body shorter than declared or declared size not accepted")]
    MessageSizeInvalid,

    #[error("message body read but terminator missing")]
    MessageNotFullyRead,

    #[error("message body not followed by CR LF")]
    ExpectedTerminator,

    #[error("message could not be allocated")]
    MessageNotCreated,

    #[error("message could not be queued")]
    MessageNotPushed,

    #[error("queue is empty")]
    NoMessages,
}

/// How a code is treated by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad command line; only that line is consumed
    Parse,
    /// Stream position is no longer trustworthy; the connection is closed
    Framing,
    /// Allocation or capacity failure
    Resource,
    /// Normal empty-queue signal
    Empty,
}

impl ErrorCode {
    /// Wire spelling of the code
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExpectedPriority => "EXPECTED_PRIORITY",
            Self::ExpectedMessageLength => "EXPECTED_MESSAGE_LENGTH",
            Self::UnexpectedInput => "UNEXPECTED_INPUT",
            Self::InvalidCommand => "INVALID_COMMAND",
            Self::MessageSizeInvalid => "MESSAGE_SIZE_INVALID",
            Self::MessageNotFullyRead => "MESSAGE_NOT_FULLY_READ",
            Self::ExpectedTerminator => "EXPECTED_TERMINATOR",
            Self::MessageNotCreated => "MESSAGE_NOT_CREATED",
            Self::MessageNotPushed => "MESSAGE_NOT_PUSHED",
            Self::NoMessages => "NO_MESSAGES",
        }
    }

    pub fn class(self) -> ErrorClass {
        match self {
            Self::ExpectedPriority
            | Self::ExpectedMessageLength
            | Self::UnexpectedInput
            | Self::InvalidCommand => ErrorClass::Parse,
            Self::MessageSizeInvalid | Self::MessageNotFullyRead | Self::ExpectedTerminator => {
                ErrorClass::Framing
            }
            Self::MessageNotCreated | Self::MessageNotPushed => ErrorClass::Resource,
            Self::NoMessages => ErrorClass::Empty,
        }
    }

    /// Framing errors close the connection after the reply is written
    pub fn is_framing(self) -> bool {
        self.class() == ErrorClass::Framing
    }
}

/// Configuration errors detected before the listener starts
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Startup and listener errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("could not bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("could not allocate the queue: {0}")]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] io::Error),
}
