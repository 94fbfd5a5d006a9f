//! Metadata codec errors

use crate::encoder::DecodeError;
use thiserror::Error;

/// Errors raised while encoding or decoding type metadata
///
/// Every variant is a hard failure: the codec never attempts a partial decode.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// Low-level read failure (truncated stream, bad UTF-8)
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Stream does not start with the metadata magic
    #[error("Invalid magic number: expected PMAD, got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Stream was produced by an incompatible codec version
    #[error("Metadata version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Version understood by this codec
        expected: u8,
        /// Version found in the stream
        found: u8,
    },

    /// Structurally invalid content
    #[error("Malformed metadata: {0}")]
    Malformed(String),

    /// Recursive structure nested deeper than the decoder allows
    #[error("Metadata nesting exceeds depth {0}")]
    NestingTooDeep(usize),

    /// A string reference points outside the string pool
    #[error("String index {index} out of range (pool size {size})")]
    StringIndexOutOfRange {
        /// Referenced index
        index: u32,
        /// Number of pooled strings
        size: usize,
    },

    /// Descriptor violates a model invariant and cannot be encoded
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// Embedded metadata string is not valid Base64
    #[error("Invalid Base64 metadata: {0}")]
    Base64(#[from] data_encoding::DecodeError),
}

/// Result alias for metadata operations
pub type Result<T> = std::result::Result<T, MetadataError>;
