//! Error types for descriptor resolution and member invocation

use portrait_meta::MetadataError;
use thiserror::Error;

/// Result type for runtime operations
pub type PortraitResult<T> = Result<T, PortraitError>;

/// Member group addressed by a dispatch index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Constructor table
    Constructor,
    /// Method table
    Method,
    /// Field table
    Field,
    /// Proxy method table
    ProxyMethod,
}

impl std::fmt::Display for MemberKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MemberKind::Constructor => "constructor",
            MemberKind::Method => "method",
            MemberKind::Field => "field",
            MemberKind::ProxyMethod => "proxy method",
        };
        f.write_str(name)
    }
}

/// Errors raised while invoking a compiled member
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InvokeError {
    /// Dispatch index outside the compiled table
    #[error("Invalid {member} index {index} for {type_name}")]
    IndexOutOfBounds {
        /// Table addressed
        member: MemberKind,
        /// Requested index
        index: usize,
        /// Owning type
        type_name: String,
    },

    /// Wrong number of arguments
    #[error("{member} expects {expected} arguments, got {found}")]
    ArityMismatch {
        /// Member signature
        member: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        found: usize,
    },

    /// Instance member invoked without a receiver
    #[error("{0} requires a receiver")]
    MissingReceiver(String),

    /// Receiver is not an instance of the declaring type
    #[error("Receiver of type {found} is not a {expected}")]
    ReceiverMismatch {
        /// Declaring type
        expected: String,
        /// Receiver type
        found: String,
    },

    /// Argument or result of the wrong type
    #[error("Type mismatch: expected {expected}, got {found}")]
    TypeMismatch {
        /// Declared type
        expected: String,
        /// Supplied type
        found: String,
    },

    /// Null supplied for a primitive slot
    #[error("Cannot unbox null into {0}")]
    NullPrimitive(&'static str),

    /// No host body was bound for the member
    #[error("No implementation bound for {0}")]
    Unbound(String),

    /// Operation not supported by this type
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Error raised by a member body
    #[error("{0}")]
    Failed(String),
}

impl From<String> for InvokeError {
    fn from(s: String) -> Self {
        InvokeError::Failed(s)
    }
}

impl From<&str> for InvokeError {
    fn from(s: &str) -> Self {
        InvokeError::Failed(s.to_string())
    }
}

/// Errors raised by descriptor resolution
#[derive(Debug, Error)]
pub enum PortraitError {
    /// No provider knows the requested name
    #[error("Type lookup failed: {0}")]
    LookupFailed(String),

    /// Name requested again while its resolution is still in progress
    #[error("Circular dependency detected while resolving {0}")]
    CycleDetected(String),

    /// Provider chain is empty
    #[error("No descriptor providers configured")]
    NoProviders,

    /// Operation on an unresolved placeholder
    #[error("Type {0} is unresolved")]
    Unresolved(String),

    /// Embedded metadata could not be decoded
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// Member invocation failed
    #[error("Invocation error: {0}")]
    Invoke(#[from] InvokeError),

    /// Provider-specific failure
    #[error("Provider error: {0}")]
    Provider(String),
}
