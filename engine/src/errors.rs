//! Custom error types for the event engine
//!
//! Provides structured error handling with context for different failure scenarios.
//! Plumbing code uses `anyhow::Result`; these types are used where callers need to
//! branch on the kind of failure (retryable executor errors, invalid payloads, ...).

use std::fmt;

/// Configuration error variants
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to load configuration file
    LoadFailed { path: String, reason: String },

    /// Invalid configuration value
    InvalidValue { field: String, reason: String },

    /// Missing required configuration
    MissingRequired { field: String },

    /// Configuration parsing error
    ParseError { reason: String },
}

/// Event store error variants
#[derive(Debug)]
pub enum StoreError {
    /// Event not found
    EventNotFound { id: String },

    /// Event is already in a terminal state
    AlreadyTerminal { id: String, status: String },

    /// Stored value could not be mapped back to a domain type
    Corrupt { field: String, value: String },
}

/// Training executor error variants
#[derive(Debug)]
pub enum ExecutorError {
    /// Connection to the executor failed
    ConnectionFailed { url: String, reason: String },

    /// Request timeout
    Timeout { url: String },

    /// Executor answered with a server-side error (5xx)
    Unavailable { url: String, status: u16 },

    /// Executor refused the request (4xx)
    Rejected {
        url: String,
        status: u16,
        message: String,
    },

    /// Invalid response body
    InvalidResponse { url: String, reason: String },
}

/// Bulk storage error variants
#[derive(Debug)]
pub enum StorageError {
    /// Storage endpoint unreachable
    Unreachable { location: String, reason: String },

    /// Listing or reading failed for a path
    ReadFailed { path: String, reason: String },

    /// Invalid response from storage
    InvalidResponse { path: String, reason: String },
}

/// Payload error variants
#[derive(Debug)]
pub enum PayloadError {
    /// JSON could not be decoded into the payload of the event type
    Decode { event_type: String, reason: String },

    /// Payload decoded but is semantically invalid
    Invalid { event_type: String, reason: String },
}

impl ExecutorError {
    /// Whether a retry has a chance of succeeding
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExecutorError::ConnectionFailed { .. }
                | ExecutorError::Timeout { .. }
                | ExecutorError::Unavailable { .. }
        )
    }
}

// Implement Display for all error types
impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::LoadFailed { path, reason } => {
                write!(f, "Failed to load config from '{}': {}", path, reason)
            }
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
            ConfigError::MissingRequired { field } => {
                write!(f, "Missing required field: {}", field)
            }
            ConfigError::ParseError { reason } => {
                write!(f, "Failed to parse config: {}", reason)
            }
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::EventNotFound { id } => write!(f, "Scheduled event '{}' not found", id),
            StoreError::AlreadyTerminal { id, status } => {
                write!(f, "Scheduled event '{}' is already {}", id, status)
            }
            StoreError::Corrupt { field, value } => {
                write!(f, "Stored value '{}' for '{}' is not valid", value, field)
            }
        }
    }
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorError::ConnectionFailed { url, reason } => {
                write!(f, "Connection to {} failed: {}", url, reason)
            }
            ExecutorError::Timeout { url } => write!(f, "Timeout while calling {}", url),
            ExecutorError::Unavailable { url, status } => {
                write!(f, "Executor at {} unavailable (status {})", url, status)
            }
            ExecutorError::Rejected {
                url,
                status,
                message,
            } => {
                write!(f, "Executor at {} rejected request ({}): {}", url, status, message)
            }
            ExecutorError::InvalidResponse { url, reason } => {
                write!(f, "Invalid response from {}: {}", url, reason)
            }
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Unreachable { location, reason } => {
                write!(f, "Storage at {} unreachable: {}", location, reason)
            }
            StorageError::ReadFailed { path, reason } => {
                write!(f, "Failed to read '{}': {}", path, reason)
            }
            StorageError::InvalidResponse { path, reason } => {
                write!(f, "Invalid storage response for '{}': {}", path, reason)
            }
        }
    }
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadError::Decode { event_type, reason } => {
                write!(f, "Cannot decode {} payload: {}", event_type, reason)
            }
            PayloadError::Invalid { event_type, reason } => {
                write!(f, "Invalid {} payload: {}", event_type, reason)
            }
        }
    }
}

// Implement std::error::Error
impl std::error::Error for ConfigError {}
impl std::error::Error for StoreError {}
impl std::error::Error for ExecutorError {}
impl std::error::Error for StorageError {}
impl std::error::Error for PayloadError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_executor_errors() {
        let url = "http://trainer:8080/jobs".to_string();
        assert!(ExecutorError::Timeout { url: url.clone() }.is_transient());
        assert!(ExecutorError::Unavailable {
            url: url.clone(),
            status: 503
        }
        .is_transient());
        assert!(!ExecutorError::Rejected {
            url: url.clone(),
            status: 400,
            message: "bad config".to_string()
        }
        .is_transient());
        assert!(!ExecutorError::InvalidResponse {
            url,
            reason: "missing jobId".to_string()
        }
        .is_transient());
    }

    #[test]
    fn store_errors_survive_anyhow() {
        let err = anyhow::anyhow!(StoreError::AlreadyTerminal {
            id: "42".to_string(),
            status: "COMPLETED".to_string(),
        });
        assert_eq!(err.to_string(), "Scheduled event '42' is already COMPLETED");
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::AlreadyTerminal { .. })
        ));
    }
}
