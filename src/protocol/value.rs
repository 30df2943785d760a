//! String Value Model
//!
//! Every command argument becomes a [`Value`]: a reference-counted string
//! that is immutable once constructed. Two physical encodings keep memory
//! usage and allocator pressure down:
//!
//! - **Embedded**: payloads up to 44 bytes live in a single heap block
//!   together with their reference count (`Arc<EmbeddedStr>` — one
//!   allocation holds the count and the fixed-size payload). The block is
//!   sized once at creation and never resized.
//! - **Raw**: larger payloads are an independently owned `Bytes` buffer.
//!   This is also the encoding the zero-copy path produces, where an
//!   already-buffered byte range is adopted directly as the payload
//!   instead of being copied.
//!
//! Cloning a `Value` is the retain operation (a refcount increment, never a
//! payload copy); dropping is release, and the last drop frees the
//! encoding-specific storage. Values built from `'static` data via
//! [`Value::from_static`] reference storage that is never collected, which
//! is how shared protocol constants are modeled.
//!
//! The 44-byte limit matches the largest string that still fits, together
//! with its header, in a single 64-byte allocator arena.

use bytes::Bytes;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Longest payload stored with the embedded encoding.
pub const EMBEDDED_MAX_LEN: usize = 44;

/// Physical encoding of a [`Value`], chosen purely by payload length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Payload co-allocated with the refcount in one block, length ≤ 44.
    Embedded,
    /// Independently owned payload buffer.
    Raw,
}

/// Fixed-size payload block for the embedded encoding.
struct EmbeddedStr {
    len: u8,
    data: [u8; EMBEDDED_MAX_LEN],
}

impl EmbeddedStr {
    fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

#[derive(Clone)]
enum Repr {
    Embedded(Arc<EmbeddedStr>),
    Raw(Bytes),
}

/// A reference-counted, immutable-after-construction string value.
#[derive(Clone)]
pub struct Value {
    repr: Repr,
}

impl Value {
    /// Creates a value by copying `bytes`, selecting the encoding by
    /// length: ≤ 44 embedded, otherwise raw.
    pub fn copy_from(bytes: &[u8]) -> Self {
        if bytes.len() <= EMBEDDED_MAX_LEN {
            let mut data = [0u8; EMBEDDED_MAX_LEN];
            data[..bytes.len()].copy_from_slice(bytes);
            Self {
                repr: Repr::Embedded(Arc::new(EmbeddedStr {
                    len: bytes.len() as u8,
                    data,
                })),
            }
        } else {
            Self {
                repr: Repr::Raw(Bytes::copy_from_slice(bytes)),
            }
        }
    }

    /// Creates a value by adopting an already-owned buffer as the payload,
    /// without copying. Always raw-encoded regardless of length: the point
    /// is to reuse the storage, not to re-pack it.
    pub fn adopted(bytes: Bytes) -> Self {
        Self {
            repr: Repr::Raw(bytes),
        }
    }

    /// Creates a value backed by static storage. Clones and drops never
    /// touch an allocation, so such values are shared and never collected.
    pub fn from_static(bytes: &'static [u8]) -> Self {
        Self {
            repr: Repr::Raw(Bytes::from_static(bytes)),
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Embedded(e) => e.len as usize,
            Repr::Raw(b) => b.len(),
        }
    }

    /// True if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match &self.repr {
            Repr::Embedded(e) => e.as_bytes(),
            Repr::Raw(b) => b,
        }
    }

    /// The payload as UTF-8 text, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(self.as_bytes()).ok()
    }

    /// Which physical encoding backs this value.
    pub fn encoding(&self) -> Encoding {
        match &self.repr {
            Repr::Embedded(_) => Encoding::Embedded,
            Repr::Raw(_) => Encoding::Raw,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl AsRef<[u8]> for Value {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::copy_from(s.as_bytes())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => write!(f, "Value({:?})", s),
            None => write!(f, "Value({} binary bytes)", self.len()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => write!(f, "\"{}\"", s),
            None => write!(f, "(binary data, {} bytes)", self.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_boundary() {
        let at_limit = Value::copy_from(&[b'x'; 44]);
        assert_eq!(at_limit.encoding(), Encoding::Embedded);
        assert_eq!(at_limit.len(), 44);

        let over_limit = Value::copy_from(&[b'x'; 45]);
        assert_eq!(over_limit.encoding(), Encoding::Raw);
        assert_eq!(over_limit.len(), 45);
    }

    #[test]
    fn test_empty_value_is_embedded() {
        let v = Value::copy_from(b"");
        assert_eq!(v.encoding(), Encoding::Embedded);
        assert!(v.is_empty());
        assert_eq!(v.as_bytes(), b"");
    }

    #[test]
    fn test_copy_from_preserves_bytes() {
        let v = Value::copy_from(b"hello");
        assert_eq!(v.as_bytes(), b"hello");
        assert_eq!(v.as_str(), Some("hello"));
    }

    #[test]
    fn test_binary_payload() {
        let v = Value::copy_from(b"hel\x00o");
        assert_eq!(v.as_bytes(), b"hel\x00o");
        assert_eq!(v.as_str(), None);
    }

    #[test]
    fn test_adopted_is_raw_even_when_short() {
        let v = Value::adopted(Bytes::from_static(b"ab"));
        assert_eq!(v.encoding(), Encoding::Raw);
        assert_eq!(v.as_bytes(), b"ab");
    }

    #[test]
    fn test_clone_shares_raw_storage() {
        let v = Value::copy_from(&[b'y'; 100]);
        let clone = v.clone();
        // Raw clones bump a refcount instead of copying the payload.
        assert_eq!(v.as_bytes().as_ptr(), clone.as_bytes().as_ptr());
    }

    #[test]
    fn test_clone_shares_embedded_block() {
        let v = Value::copy_from(b"short");
        let clone = v.clone();
        assert_eq!(v.as_bytes().as_ptr(), clone.as_bytes().as_ptr());
    }

    #[test]
    fn test_from_static_constant() {
        let v = Value::from_static(b"PONG");
        assert_eq!(v.encoding(), Encoding::Raw);
        assert_eq!(v.as_str(), Some("PONG"));
        let _ = v.clone();
    }

    #[test]
    fn test_equality_ignores_encoding() {
        let embedded = Value::copy_from(b"same");
        let raw = Value::adopted(Bytes::from_static(b"same"));
        assert_eq!(embedded, raw);
    }
}
