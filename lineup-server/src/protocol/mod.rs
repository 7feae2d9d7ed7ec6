//! Lineup wire protocol.
//!
//! Commands are CR LF terminated lines; `PUSH` is followed by a binary body
//! of the declared length and a final CR LF. Replies are prefixed `+`
//! (acknowledgement), `-` (error code) or `$` (message with body).

pub mod command;
pub mod reply;

pub use command::{parse_command, Command, MAX_DIGITS};
pub use reply::{Reply, CRLF};
