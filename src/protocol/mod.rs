//! Wire Protocol Implementation
//!
//! Everything between raw socket bytes and dispatched commands lives here.
//!
//! ## Modules
//!
//! - `buffer`: the per-connection growable byte accumulator
//! - `decoder`: the resumable inline/multibulk request decoder
//! - `value`: the dual-encoding, reference-counted argument value
//! - `reply`: minimal outbound reply encoding
//!
//! ## Example
//!
//! ```ignore
//! use emberkv::protocol::{Decode, QueryBuffer, RequestDecoder};
//!
//! let mut buf = QueryBuffer::new();
//! let mut decoder = RequestDecoder::new();
//!
//! buf.append(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n");
//! match decoder.decode(&mut buf)? {
//!     Decode::Command(args) => println!("argc = {}", args.len()),
//!     Decode::Incomplete => println!("waiting for more bytes"),
//! }
//! ```

pub mod buffer;
pub mod decoder;
pub mod reply;
pub mod value;

// Re-export commonly used types for convenience
pub use buffer::QueryBuffer;
pub use decoder::{Decode, ProtocolError, RequestDecoder};
pub use decoder::{BIG_ARG_THRESHOLD, MAX_BULK_SIZE, MAX_INLINE_SIZE, MAX_MULTIBULK_ARGS};
pub use reply::Reply;
pub use value::{Encoding, Value, EMBEDDED_MAX_LEN};
