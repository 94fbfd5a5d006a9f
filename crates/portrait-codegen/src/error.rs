//! Error types for the ahead-of-time compiler

use portrait_meta::MetadataError;
use thiserror::Error;

/// Result type for generator operations
pub type GeneratorResult<T> = Result<T, GeneratorError>;

/// Errors raised while compiling types
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// Descriptor could not be encoded
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// Strict mode found a member without a host body
    #[error("No binding for {member} of {type_name}")]
    MissingBinding {
        /// Type being compiled
        type_name: String,
        /// Member signature
        member: String,
    },

    /// A binding does not fit the member it is registered for
    #[error("Binding {member} of {type_name} does not match: {reason}")]
    BindingMismatch {
        /// Type being compiled
        type_name: String,
        /// Binding signature
        member: String,
        /// What does not match
        reason: String,
    },

    /// Same qualified name registered twice
    #[error("Duplicate type: {0}")]
    DuplicateType(String),

    /// Name neither in the class index nor among external types
    #[error("Unknown type: {0}")]
    UnknownType(String),

    /// Inclusion directive name not recognised
    #[error("Unknown inclusion directive: {0}")]
    UnknownDirective(String),

    /// Writing generated output failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
