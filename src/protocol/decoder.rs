//! Resumable Request Decoder
//!
//! This is the heart of the ingestion layer: a state machine that turns the
//! raw bytes accumulating in a connection's [`QueryBuffer`] into complete
//! commands (argument vectors of [`Value`]s).
//!
//! The network can split a command at any byte position, so every entry
//! point is re-entrant: a call that finds insufficient data reports
//! [`Decode::Incomplete`] and leaves the resumable fields untouched, and
//! the next call over the grown buffer produces exactly the same result a
//! single call over the concatenated bytes would have (chunking
//! invariance). The decoder never performs I/O and never blocks; it only
//! inspects and mutates already-buffered bytes.
//!
//! ## Grammars
//!
//! Two request grammars are recognized, selected by the first byte of a
//! fresh request:
//!
//! - **Multibulk** (`*` prefix): `*<count>\r\n` followed by `count`
//!   occurrences of `$<len>\r\n<len bytes>\r\n`. This is what real clients
//!   send.
//! - **Inline**: a single `\n`-terminated line (optional trailing `\r`
//!   stripped) split into tokens with shell-style quoting. Handy for
//!   telnet debugging.
//!
//! ## Hostile input
//!
//! All limits are enforced by the grammar itself, bounding the memory a
//! single peer can force the decoder to hold before erroring out:
//!
//! - multibulk element count ≤ 1,048,576
//! - bulk length ≤ 512 MiB
//! - an unterminated inline or header line errors once more than 64 KiB
//!   is buffered
//!
//! ## Big arguments
//!
//! Arguments of 32 KiB and up get special treatment to avoid quadratic
//! copying while they stream in over many reads: once the `$<len>` header
//! is parsed, everything before the payload is trimmed so the payload
//! starts at offset 0, and capacity for `len + 2` bytes is reserved up
//! front. If the buffer then ends up holding exactly the payload plus its
//! CRLF, the whole buffer is adopted as the value's storage instead of
//! being copied.

use crate::protocol::buffer::QueryBuffer;
use crate::protocol::value::Value;
use thiserror::Error;

/// Maximum number of elements in a multibulk request.
pub const MAX_MULTIBULK_ARGS: usize = 1024 * 1024;

/// Maximum size for a single bulk argument (512 MB).
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum bytes an inline request or an unterminated header line may
/// occupy before the decoder gives up on it (64 KB).
pub const MAX_INLINE_SIZE: usize = 64 * 1024;

/// Bulk lengths at or above this get the streaming pre-reservation and
/// become candidates for the zero-copy adopt (32 KB).
pub const BIG_ARG_THRESHOLD: usize = 32 * 1024;

/// Grammar violations and limit breaches. Any of these aborts the
/// connection; none of them is recoverable by waiting for more bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Multibulk count was not a strict integer or exceeded the cap.
    #[error("invalid multibulk length")]
    InvalidMultibulkLength,

    /// Bulk length was not a strict integer, was negative, or exceeded
    /// the cap.
    #[error("invalid bulk length")]
    InvalidBulkLength,

    /// An argument header did not start with `$`.
    #[error("expected '$', got '{0}'")]
    ExpectedBulkHeader(char),

    /// An inline request exceeded the line-size ceiling without a newline.
    #[error("too big inline request")]
    InlineRequestTooLarge,

    /// A multibulk count header exceeded the line-size ceiling.
    #[error("too big multibulk count string")]
    MultibulkHeaderTooLarge,

    /// A bulk length header exceeded the line-size ceiling.
    #[error("too big bulk count string")]
    BulkHeaderTooLarge,

    /// Inline tokenization hit an unterminated or malformed quote.
    #[error("unbalanced quotes in request")]
    UnbalancedQuotes,
}

/// Outcome of one decode attempt.
#[derive(Debug)]
pub enum Decode {
    /// A complete command: its arguments in arrival order. May be empty
    /// (blank inline line, or a multibulk count ≤ 0); empty commands are
    /// not dispatched.
    Command(Vec<Value>),

    /// Not enough buffered bytes; state is preserved, resume after the
    /// next read appends more.
    Incomplete,
}

/// Which grammar the current request uses. Decided by the first byte and
/// sticky until the session resets for the next command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum RequestType {
    #[default]
    Unset,
    Inline,
    Multibulk,
}

/// The resumable decoder state for one connection.
///
/// All consumed bytes are trimmed from the buffer before every return, so
/// a resumed call always starts reading at offset 0; the fields below are
/// the only state that carries across calls.
#[derive(Debug, Default)]
pub struct RequestDecoder {
    request_type: RequestType,
    /// Multibulk elements still to parse. 0 means the count header itself
    /// has not been parsed yet.
    remaining_args: usize,
    /// Declared length of the argument currently being assembled, once its
    /// `$<len>` header has been seen.
    pending_arg_len: Option<usize>,
    /// Arguments parsed so far for the in-flight command.
    args: Vec<Value>,
}

impl RequestDecoder {
    /// Creates a decoder in the initial state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to decode one command from `buf`, consuming the bytes of
    /// whatever it managed to parse.
    ///
    /// Returns [`Decode::Command`] when a full command is buffered,
    /// [`Decode::Incomplete`] when more bytes are needed, or an error on a
    /// grammar violation. After a `Command` the caller must invoke
    /// [`reset`](Self::reset) before decoding the next request.
    pub fn decode(&mut self, buf: &mut QueryBuffer) -> Result<Decode, ProtocolError> {
        if buf.is_empty() {
            return Ok(Decode::Incomplete);
        }

        if self.request_type == RequestType::Unset {
            self.request_type = if buf.as_slice()[0] == b'*' {
                RequestType::Multibulk
            } else {
                RequestType::Inline
            };
        }

        match self.request_type {
            RequestType::Inline => self.decode_inline(buf),
            RequestType::Multibulk => self.decode_multibulk(buf),
            RequestType::Unset => unreachable!("request type decided above"),
        }
    }

    /// Clears all per-command state: request type, multibulk counters, and
    /// any partially collected arguments.
    ///
    /// Called by the session after each completed command. Skipping this
    /// would leak the previous command's request type and arguments into
    /// the next decode.
    pub fn reset(&mut self) {
        self.request_type = RequestType::Unset;
        self.remaining_args = 0;
        self.pending_arg_len = None;
        self.args = Vec::new();
    }

    /// Decodes a single inline line into whitespace/quote-delimited
    /// arguments.
    fn decode_inline(&mut self, buf: &mut QueryBuffer) -> Result<Decode, ProtocolError> {
        let data = buf.as_slice();

        let newline = match data.iter().position(|&b| b == b'\n') {
            Some(pos) => pos,
            None => {
                if data.len() > MAX_INLINE_SIZE {
                    return Err(ProtocolError::InlineRequestTooLarge);
                }
                return Ok(Decode::Incomplete);
            }
        };

        let mut line_end = newline;
        if line_end > 0 && data[line_end - 1] == b'\r' {
            line_end -= 1;
        }

        let tokens = split_args(&data[..line_end]).ok_or(ProtocolError::UnbalancedQuotes)?;

        // Empty tokens (e.g. "" in the input) are dropped; a blank line is
        // a zero-argument command.
        let args = tokens
            .iter()
            .filter(|t| !t.is_empty())
            .map(|t| Value::copy_from(t))
            .collect();

        buf.trim_prefix(newline + 1);
        Ok(Decode::Command(args))
    }

    /// Decodes as much of a multibulk request as the buffer holds.
    fn decode_multibulk(&mut self, buf: &mut QueryBuffer) -> Result<Decode, ProtocolError> {
        let mut pos = 0usize;

        if self.remaining_args == 0 {
            // Header phase: "*<count>\r\n".
            let data = buf.as_slice();
            let line_end = match find_line_end(data, 0) {
                Some(end) => end,
                None => {
                    if data.len() > MAX_INLINE_SIZE {
                        return Err(ProtocolError::MultibulkHeaderTooLarge);
                    }
                    return Ok(Decode::Incomplete);
                }
            };

            let count = parse_decimal(&data[1..line_end])
                .ok_or(ProtocolError::InvalidMultibulkLength)?;
            if count > MAX_MULTIBULK_ARGS as i64 {
                return Err(ProtocolError::InvalidMultibulkLength);
            }

            pos = line_end + 2;
            if count <= 0 {
                // "*0" and null arrays are zero-argument commands.
                buf.trim_prefix(pos);
                return Ok(Decode::Command(Vec::new()));
            }

            self.remaining_args = count as usize;
            self.args = Vec::with_capacity(self.remaining_args);
        }

        'args: while self.remaining_args > 0 {
            let arg_len = match self.pending_arg_len {
                Some(len) => len,
                None => {
                    // Argument header phase: "$<len>\r\n".
                    let data = buf.as_slice();
                    let line_end = match find_line_end(data, pos) {
                        Some(end) => end,
                        None => {
                            if data.len() > MAX_INLINE_SIZE {
                                return Err(ProtocolError::BulkHeaderTooLarge);
                            }
                            break 'args;
                        }
                    };

                    if data[pos] != b'$' {
                        return Err(ProtocolError::ExpectedBulkHeader(data[pos] as char));
                    }

                    let len = parse_decimal(&data[pos + 1..line_end])
                        .ok_or(ProtocolError::InvalidBulkLength)?;
                    if len < 0 || len > MAX_BULK_SIZE as i64 {
                        return Err(ProtocolError::InvalidBulkLength);
                    }
                    let len = len as usize;

                    pos = line_end + 2;
                    if len >= BIG_ARG_THRESHOLD {
                        // A large argument is about to stream in. Trim so
                        // it will start at offset 0 (enabling the adopt
                        // below) and reserve room for the whole payload
                        // plus CRLF in one go.
                        buf.trim_prefix(pos);
                        pos = 0;
                        if buf.len() < len + 2 {
                            buf.reserve_hint(len + 2 - buf.len());
                        }
                    }

                    self.pending_arg_len = Some(len);
                    len
                }
            };

            // Payload phase: need the declared bytes plus trailing CRLF.
            if buf.len() - pos < arg_len + 2 {
                break 'args;
            }

            if pos == 0 && arg_len >= BIG_ARG_THRESHOLD && buf.len() == arg_len + 2 {
                // The buffer contains exactly this argument: adopt its
                // storage outright instead of copying, and start the next
                // read with a buffer sized for another argument like it.
                let mut payload = buf.adopt_with_hint(arg_len + 2);
                payload.truncate(arg_len);
                self.args.push(Value::adopted(payload.freeze()));
            } else {
                self.args
                    .push(Value::copy_from(&buf.as_slice()[pos..pos + arg_len]));
                pos += arg_len + 2;
            }

            self.pending_arg_len = None;
            self.remaining_args -= 1;
        }

        buf.trim_prefix(pos);

        if self.remaining_args == 0 {
            Ok(Decode::Command(std::mem::take(&mut self.args)))
        } else {
            Ok(Decode::Incomplete)
        }
    }
}

/// Finds the end of a `\r\n`-terminated line starting the search at
/// `start`. Returns the absolute index of the `\r`, but only if a byte for
/// the `\n` is also already buffered.
fn find_line_end(data: &[u8], start: usize) -> Option<usize> {
    let cr = start + data[start..].iter().position(|&b| b == b'\r')?;
    if cr + 1 < data.len() {
        Some(cr)
    } else {
        None
    }
}

/// Strict base-10 integer parsing for protocol headers: no sign other than
/// a single leading `-`, no leading zeros, no surrounding garbage. Headers
/// that fail here are protocol errors, never treated as incomplete.
fn parse_decimal(digits: &[u8]) -> Option<i64> {
    if digits.is_empty() {
        return None;
    }
    if digits == b"0" {
        return Some(0);
    }

    let (negative, digits) = match digits.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, digits),
    };

    match digits.first() {
        Some(b'1'..=b'9') => {}
        _ => return None,
    }

    let mut value: i64 = 0;
    for &d in digits {
        if !d.is_ascii_digit() {
            return None;
        }
        value = value
            .checked_mul(10)?
            .checked_add(i64::from(d - b'0'))?;
    }

    Some(if negative { -value } else { value })
}

/// Splits an inline request line into arguments using shell-style rules:
/// whitespace separates tokens, double quotes allow `\xHH` hex and
/// `\n`/`\r`/`\t`/`\b`/`\a` escapes, single quotes are literal except for
/// `\'`, and a closing quote must be followed by whitespace or the end of
/// the line. Returns `None` on malformed quoting.
fn split_args(line: &[u8]) -> Option<Vec<Vec<u8>>> {
    let mut args = Vec::new();
    let mut i = 0;

    loop {
        while i < line.len() && line[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= line.len() {
            return Some(args);
        }

        let mut current = Vec::new();
        let mut in_quotes = false;
        let mut in_single_quotes = false;

        loop {
            if in_quotes {
                let &c = line.get(i)?; // unterminated quotes
                if c == b'\\'
                    && i + 3 < line.len()
                    && line[i + 1] == b'x'
                    && line[i + 2].is_ascii_hexdigit()
                    && line[i + 3].is_ascii_hexdigit()
                {
                    current.push(hex_pair(line[i + 2], line[i + 3]));
                    i += 4;
                } else if c == b'\\' && i + 1 < line.len() {
                    let escaped = match line[i + 1] {
                        b'n' => b'\n',
                        b'r' => b'\r',
                        b't' => b'\t',
                        b'b' => 0x08,
                        b'a' => 0x07,
                        other => other,
                    };
                    current.push(escaped);
                    i += 2;
                } else if c == b'"' {
                    // Closing quote must be followed by a separator.
                    if let Some(&next) = line.get(i + 1) {
                        if !next.is_ascii_whitespace() {
                            return None;
                        }
                    }
                    i += 1;
                    break;
                } else {
                    current.push(c);
                    i += 1;
                }
            } else if in_single_quotes {
                let &c = line.get(i)?;
                if c == b'\\' && line.get(i + 1) == Some(&b'\'') {
                    current.push(b'\'');
                    i += 2;
                } else if c == b'\'' {
                    if let Some(&next) = line.get(i + 1) {
                        if !next.is_ascii_whitespace() {
                            return None;
                        }
                    }
                    i += 1;
                    break;
                } else {
                    current.push(c);
                    i += 1;
                }
            } else {
                match line.get(i) {
                    None => break,
                    Some(&c) if c.is_ascii_whitespace() => break,
                    Some(&b'"') => {
                        in_quotes = true;
                        i += 1;
                    }
                    Some(&b'\'') => {
                        in_single_quotes = true;
                        i += 1;
                    }
                    Some(&c) => {
                        current.push(c);
                        i += 1;
                    }
                }
            }
        }

        args.push(current);
    }
}

fn hex_pair(hi: u8, lo: u8) -> u8 {
    fn nibble(c: u8) -> u8 {
        match c {
            b'0'..=b'9' => c - b'0',
            b'a'..=b'f' => c - b'a' + 10,
            b'A'..=b'F' => c - b'A' + 10,
            _ => 0,
        }
    }
    nibble(hi) * 16 + nibble(lo)
}
