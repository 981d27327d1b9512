//! Error types for the sync engine.

use crate::transport::TransportError;
use dbal_sync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

const OFFLINE_MESSAGE: &str = "service unreachable, working offline";

/// Errors that can occur during sync operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The remote service could not be reached (refused, DNS, timeout).
    #[error("remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// The remote answered with a non-2xx status other than a tolerated 404.
    #[error("remote rejected request ({status}): {message}")]
    RemoteRejected {
        /// HTTP status code.
        status: u16,
        /// Remote-provided message, or the bare status.
        message: String,
    },

    /// The conflict id is stale or was never detected.
    #[error("conflict not found: {0}")]
    ConflictNotFound(String),

    /// Manual resolution was requested without a replacement record.
    #[error("manual resolution of {0} requires a custom version")]
    MissingCustomVersion(String),

    /// The collection has no entry in the mapping table.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    /// A caller-supplied argument is malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The outbound throttle refused the call.
    #[error("request throttled: {0}")]
    Throttled(String),

    /// An admin call was attempted without a configured bearer token.
    #[error("admin token not configured")]
    AdminTokenMissing,

    /// A 2xx response body did not have the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Creates a rejection error.
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::RemoteRejected {
            status,
            message: message.into(),
        }
    }

    /// Returns true if the failure means the remote is offline.
    pub fn is_offline(&self) -> bool {
        matches!(self, SyncError::RemoteUnavailable(_))
    }

    /// Text suitable for showing to an end user.
    ///
    /// Connection failures read as an offline notice; rejections carry the
    /// remote message.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::RemoteUnavailable(_) => OFFLINE_MESSAGE.to_string(),
            SyncError::RemoteRejected { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<TransportError> for SyncError {
    fn from(err: TransportError) -> Self {
        SyncError::RemoteUnavailable(err.to_string())
    }
}

impl From<ProtocolError> for SyncError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::UnknownCollection(name) => SyncError::UnknownCollection(name),
            other => SyncError::InvalidArgument(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Decode(err.to_string())
    }
}
