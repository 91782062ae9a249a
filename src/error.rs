//! Error types for registry operations.
//!
//! This module defines [`RegistryError`], the error type returned by every
//! registry operation, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Every store or filesystem failure is wrapped into one of the variants
//!   below and returned to the caller; nothing in the library aborts the
//!   process
//! - [`RegistryError::NotFound`] is kept apart from [`RegistryError::Protocol`]
//!   so callers can tell "doesn't exist" from "store broken"
//! - Use `anyhow::Error` (via `RegistryError::Other`) for unexpected errors

use thiserror::Error;

/// Core error type for registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The store could not be reached or the ping failed.
    #[error("Artifact store unavailable at {url}: {message}")]
    StoreUnavailable { url: String, message: String },

    /// Staging the archive on local disk failed.
    #[error("Failed to stage module archive: {message}")]
    Staging { message: String },

    /// Building the artifact manifest failed.
    #[error("Failed to pack manifest: {message}")]
    Pack { message: String },

    /// Copying blobs or the manifest into the remote repository failed.
    #[error("Failed to push to {repository}: {message}")]
    Push { repository: String, message: String },

    /// Reading blobs or the manifest from the remote repository failed.
    #[error("Failed to pull from {repository}: {message}")]
    Pull { repository: String, message: String },

    /// No artifact is tagged with the requested reference.
    #[error("Module not found: {repository}:{reference}")]
    NotFound {
        repository: String,
        reference: String,
    },

    /// The store returned data that does not follow the distribution protocol.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// The operation was canceled or its deadline expired.
    #[error("Operation canceled: {message}")]
    Canceled { message: String },

    /// The module identity cannot be mapped to a repository and tag.
    #[error("Invalid module identity: {message}")]
    InvalidIdentity { message: String },

    /// Unrecoverable configuration error.
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Category of a [`RegistryError`], for matching without destructuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    StoreUnavailable,
    Staging,
    Pack,
    Push,
    Pull,
    NotFound,
    Protocol,
    Canceled,
    InvalidIdentity,
    Config,
    Io,
    Other,
}

impl RegistryError {
    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
            Self::Staging { .. } => ErrorKind::Staging,
            Self::Pack { .. } => ErrorKind::Pack,
            Self::Push { .. } => ErrorKind::Push,
            Self::Pull { .. } => ErrorKind::Pull,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Protocol { .. } => ErrorKind::Protocol,
            Self::Canceled { .. } => ErrorKind::Canceled,
            Self::InvalidIdentity { .. } => ErrorKind::InvalidIdentity,
            Self::Config { .. } => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
            Self::Other(_) => ErrorKind::Other,
        }
    }

    /// Whether this error is a [`RegistryError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub(crate) fn staging(message: impl std::fmt::Display) -> Self {
        Self::Staging {
            message: message.to_string(),
        }
    }

    pub(crate) fn pack(message: impl std::fmt::Display) -> Self {
        Self::Pack {
            message: message.to_string(),
        }
    }

    pub(crate) fn protocol(message: impl std::fmt::Display) -> Self {
        Self::Protocol {
            message: message.to_string(),
        }
    }
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
