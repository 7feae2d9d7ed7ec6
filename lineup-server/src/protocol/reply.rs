use bytes::{BufMut, Bytes, BytesMut};

use crate::error::ErrorCode;

/// Line terminator for commands, replies, and bodies
pub const CRLF: &[u8; 2] = b"\r\n";

/// A server reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+OK`
    Ok,
    /// `+PONG`
    Pong,
    /// `$<length>` followed by the body and CR LF
    Message(Bytes),
    /// `-<CODE>`
    Error(ErrorCode),
}

impl Reply {
    /// Append the wire form to `dst`
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Self::Ok => put_line(dst, b'+', b"OK"),
            Self::Pong => put_line(dst, b'+', b"PONG"),
            Self::Error(code) => put_line(dst, b'-', code.as_str().as_bytes()),
            Self::Message(body) => {
                put_line(dst, b'$', body.len().to_string().as_bytes());
                dst.reserve(body.len() + CRLF.len());
                dst.put_slice(body);
                dst.put_slice(CRLF);
            }
        }
    }

    /// Wire form as a standalone buffer
    pub fn to_bytes(&self) -> Bytes {
        let mut dst = BytesMut::new();
        self.encode(&mut dst);
        dst.freeze()
    }
}

impl From<ErrorCode> for Reply {
    fn from(code: ErrorCode) -> Self {
        Self::Error(code)
    }
}

fn put_line(dst: &mut BytesMut, prefix: u8, text: &[u8]) {
    dst.reserve(1 + text.len() + CRLF.len());
    dst.put_u8(prefix);
    dst.put_slice(text);
    dst.put_slice(CRLF);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acknowledgements() {
        assert_eq!(Reply::Ok.to_bytes(), Bytes::from_static(b"+OK\r\n"));
        assert_eq!(Reply::Pong.to_bytes(), Bytes::from_static(b"+PONG\r\n"));
    }

    #[test]
    fn test_error_reply() {
        let reply = Reply::from(ErrorCode::NoMessages);
        assert_eq!(reply.to_bytes(), Bytes::from_static(b"-NO_MESSAGES\r\n"));
    }

    #[test]
    fn test_message_reply_is_binary_safe() {
        let reply = Reply::Message(Bytes::from_static(b"a\r\n\0b"));
        assert_eq!(reply.to_bytes(), Bytes::from_static(b"$5\r\na\r\n\0b\r\n"));
    }

    #[test]
    fn test_empty_message() {
        let reply = Reply::Message(Bytes::new());
        assert_eq!(reply.to_bytes(), Bytes::from_static(b"$0\r\n\r\n"));
    }
}
