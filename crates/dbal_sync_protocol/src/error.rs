//! Error types for the sync protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while interpreting names and identifiers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The collection name has no entry in the mapping table.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    /// A composite conflict id without a `collection:entityId` shape.
    #[error("invalid conflict id: {0}")]
    InvalidConflictId(String),

    /// The resolution strategy name is not one of `local`, `remote`, `manual`, `merge`.
    #[error("unknown resolution strategy: {0}")]
    UnknownStrategy(String),
}
