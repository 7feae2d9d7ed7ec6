use crate::error::ErrorCode;

/// Longest digit run accepted for a number; 18 digits always fit in `i64`
pub const MAX_DIGITS: usize = 18;

/// A parsed command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `PUSH <priority> <length>`; the body follows on the wire
    Push { priority: i64, length: u64 },
    /// `POP`
    Pop,
    /// `PING`
    Ping,
    /// `EXIT`
    Exit,
}

impl Command {
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Push { .. } => "PUSH",
            Self::Pop => "POP",
            Self::Ping => "PING",
            Self::Exit => "EXIT",
        }
    }
}

/// Parse one command line with its CR LF already stripped.
///
/// Verbs are case-sensitive and matched exactly.
pub fn parse_command(line: &[u8]) -> Result<Command, ErrorCode> {
    match line {
        b"EXIT" => return Ok(Command::Exit),
        b"POP" => return Ok(Command::Pop),
        b"PING" => return Ok(Command::Ping),
        _ => {}
    }

    match line.strip_prefix(b"PUSH") {
        Some(args) if args.is_empty() || args[0] == b' ' => parse_push(Cursor::new(args)),
        _ => Err(ErrorCode::InvalidCommand),
    }
}

fn parse_push(mut cursor: Cursor<'_>) -> Result<Command, ErrorCode> {
    if !cursor.eat(b' ') {
        return Err(ErrorCode::ExpectedPriority);
    }
    let priority = match cursor.digits() {
        Digits::Value(value) => value as i64,
        Digits::None | Digits::TooLong => return Err(ErrorCode::ExpectedPriority),
    };

    if cursor.is_at_end() {
        return Err(ErrorCode::ExpectedMessageLength);
    }
    if cursor.skip_whitespace() == 0 {
        return Err(ErrorCode::UnexpectedInput);
    }

    let length = match cursor.digits() {
        Digits::Value(value) => value,
        Digits::None => return Err(ErrorCode::ExpectedMessageLength),
        // No body that large is ever accepted
        Digits::TooLong => return Err(ErrorCode::MessageSizeInvalid),
    };

    if !cursor.is_at_end() {
        return Err(ErrorCode::UnexpectedInput);
    }
    Ok(Command::Push { priority, length })
}

enum Digits {
    None,
    TooLong,
    Value(u64),
}

/// Bounds-checked reader over a command line
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn eat(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn skip_whitespace(&mut self) -> usize {
        let start = self.pos;
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
        self.pos - start
    }

    fn digits(&mut self) -> Digits {
        let run = self.bytes[self.pos..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if run == 0 {
            return Digits::None;
        }
        let digits = &self.bytes[self.pos..self.pos + run];
        self.pos += run;
        if run > MAX_DIGITS {
            return Digits::TooLong;
        }
        let value = digits
            .iter()
            .fold(0u64, |acc, d| acc * 10 + u64::from(d - b'0'));
        Digits::Value(value)
    }
}
