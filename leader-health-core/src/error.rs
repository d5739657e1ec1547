//! # Error Types
//!
//! Errors raised while configuring a leadership reporter or serving its
//! health endpoint. Propagating leadership itself never fails.

use thiserror::Error;

/// Error types that can occur while setting up leadership health reporting.
///
/// The reporting loop treats its collaborators as infallible, so these errors
/// only surface from configuration (service names) and from the transport that
/// exposes the health table.
///
/// # Examples
///
/// ```rust
/// use leader_health_core::HealthError;
///
/// let error = HealthError::invalid_service("", "service name must not be empty");
/// assert!(error.is_configuration());
/// ```
#[derive(Error, Debug)]
pub enum HealthError {
    /// A service name was rejected during validation
    #[error("Invalid service name {name:?}: {reason}")]
    InvalidService { name: String, reason: String },

    /// The same service name was configured more than once
    #[error("Duplicate service name {name:?}")]
    DuplicateService { name: String },

    /// The health endpoint transport failed
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// File system or network I/O failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Results returned by leader-health setup code.
pub type Result<T> = std::result::Result<T, HealthError>;

impl HealthError {
    /// Creates a new invalid service error.
    pub fn invalid_service(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidService {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new transport error with the given message.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Returns `true` when the error stems from caller-supplied configuration
    /// rather than from the runtime environment.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidService { .. } | Self::DuplicateService { .. }
        )
    }
}
