//! Bencode codec for metainfo files and tracker responses.
//!
//! Decodes the four bencode shapes (integers, byte strings, lists and
//! dictionaries), re-encodes them canonically with dictionary keys in
//! ascending byte order, and locates the raw byte span of a top-level
//! dictionary entry so digests can be taken over the exact source bytes.

mod decode;
mod encode;
mod value;

pub use decode::{decode, dict_entry_bytes};
pub use encode::encode;
pub use value::Value;

/// Maximum container nesting accepted by the decoder.
pub const MAX_DEPTH: usize = 64;

/// Errors produced while decoding bencode data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BencodeError {
    #[error("Unexpected end of input at byte {position}")]
    UnexpectedEof { position: usize },

    #[error("Invalid integer at byte {position}: {reason}")]
    InvalidInteger { position: usize, reason: String },

    #[error("Invalid string length prefix at byte {position}")]
    InvalidLength { position: usize },

    #[error("Unexpected character {found:?} at byte {position}")]
    UnexpectedChar { position: usize, found: char },

    #[error("Dictionary key at byte {position} is not a byte string")]
    NonStringKey { position: usize },

    #[error("Trailing data after value at byte {position}")]
    TrailingData { position: usize },

    #[error("Nesting deeper than {MAX_DEPTH} levels")]
    NestingTooDeep,
}
