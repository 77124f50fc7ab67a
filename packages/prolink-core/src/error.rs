//! Centralized error types for the Prolink Watch core library.
//!
//! Each protocol-facing module defines its own error enum; this module
//! provides the application-wide [`FinderError`] that user-driven finder
//! operations surface, with conversions from the per-module types.
//!
//! Background work never propagates these: the status handler logs and
//! continues, and fetch workers log and drop their result.

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::protocol::{ClientError, ProtocolError};
use crate::refs::DeviceId;

/// Application-wide error type for finder operations.
#[derive(Debug, Error)]
pub enum FinderError {
    /// An operation requiring a running finder was called while stopped.
    #[error("the metadata finder is not running")]
    NotRunning,

    /// An archive build was requested while the finder is actively
    /// querying players on its own.
    #[error("archive builds require the finder to be in passive mode")]
    NotPassive,

    /// A caller-supplied argument is invalid.
    #[error("invalid argument: {0}")]
    BadArgument(String),

    /// The device an operation targets is not on the network.
    #[error("{0} is not currently announced on the network")]
    DeviceNotFound(DeviceId),

    /// An archive operation failed.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// A database session operation failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A wire message could not be read or written.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Filesystem access failed.
    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenient Result alias for finder operations.
pub type FinderResult<T> = Result<T, FinderError>;
