//! Outbound Reply Encoding
//!
//! The minimal set of reply shapes the dispatch layer needs to answer a
//! client. Each serializes to its RESP wire form with a type prefix byte
//! and CRLF terminators.

use crate::protocol::value::Value;

const CRLF: &[u8] = b"\r\n";

/// A reply ready to be written back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+<string>\r\n` — short status lines like `OK` and `PONG`.
    Simple(String),
    /// `-<message>\r\n` — error indication; the connection stays usable.
    Error(String),
    /// `$<len>\r\n<payload>\r\n` — a binary-safe string value.
    Bulk(Value),
    /// `$-1\r\n` — the null reply for missing keys.
    Nil,
    /// `*<n>\r\n<elements...>`.
    Array(Vec<Reply>),
}

impl Reply {
    pub fn simple(s: impl Into<String>) -> Self {
        Reply::Simple(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        Reply::Error(s.into())
    }

    pub fn ok() -> Self {
        Reply::Simple("OK".to_string())
    }

    pub fn pong() -> Self {
        Reply::Simple("PONG".to_string())
    }

    /// Serializes into `buf`, appending the wire bytes.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            Reply::Simple(s) => {
                buf.push(b'+');
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Reply::Error(s) => {
                buf.push(b'-');
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Reply::Bulk(v) => {
                buf.push(b'$');
                buf.extend_from_slice(v.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                buf.extend_from_slice(v.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Reply::Nil => {
                buf.extend_from_slice(b"$-1");
                buf.extend_from_slice(CRLF);
            }
            Reply::Array(elements) => {
                buf.push(b'*');
                buf.extend_from_slice(elements.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                for element in elements {
                    element.serialize_into(buf);
                }
            }
        }
    }

    /// Serializes to a fresh byte vector.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }
}
