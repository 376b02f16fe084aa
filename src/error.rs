//! Error types and handling for Stromspot
//!
//! This module defines the error taxonomy used throughout the crate. Every
//! failure inside a refresh cycle is one of these variants and is handled at
//! the cycle boundary; only configuration errors escape to the caller at
//! setup time.

use thiserror::Error;

/// Result type alias for Stromspot operations
pub type Result<T> = std::result::Result<T, StromspotError>;

/// Main error type for Stromspot
#[derive(Debug, Clone, Error)]
pub enum StromspotError {
    /// Configuration-related errors (missing credentials, unreadable file)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors for a single configuration field
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Bad credentials or a rejected token refresh
    #[error("Authentication error ({}): {message}", status_label(*.status))]
    Authentication {
        status: Option<u16>,
        message: String,
    },

    /// Connection failures
    #[error("Network error: {message}")]
    Network { message: String },

    /// Request exceeded its time budget
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Malformed or incomplete upstream response
    #[error("Upstream data error: {message}")]
    UpstreamData { message: String },

    /// Provider throttling (HTTP 429)
    #[error("Rate limit error: {message}")]
    RateLimit { message: String },

    /// Any other unsuccessful HTTP status
    #[error("API error ({}): {message}", status_label(*.status))]
    Api {
        status: Option<u16>,
        message: String,
    },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

fn status_label(status: Option<u16>) -> String {
    status.map_or_else(|| "no status".to_string(), |s| format!("status {s}"))
}

impl StromspotError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new authentication error
    pub fn auth<S: Into<String>>(status: Option<u16>, message: S) -> Self {
        Self::Authentication {
            status,
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a new upstream data error
    pub fn upstream_data<S: Into<String>>(message: S) -> Self {
        Self::UpstreamData {
            message: message.into(),
        }
    }

    /// Create a new rate limit error
    pub fn rate_limit<S: Into<String>>(message: S) -> Self {
        Self::RateLimit {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(status: Option<u16>, message: S) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// HTTP status attached to the error, if any
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } | Self::Api { status, .. } => *status,
            Self::RateLimit { .. } => Some(429),
            _ => None,
        }
    }

    /// Whether the upstream rejected the bearer token of a data request
    pub const fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::Authentication {
                status: Some(401),
                ..
            }
        )
    }

    /// Whether the failure is expected to clear up by itself on a later cycle
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. }
            | Self::Timeout { .. }
            | Self::RateLimit { .. }
            | Self::UpstreamData { .. } => true,
            Self::Api { status, .. } => matches!(status, Some(500..=599) | None),
            _ => false,
        }
    }
}

impl From<std::io::Error> for StromspotError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for StromspotError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for StromspotError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for StromspotError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(err.to_string())
        } else if err.is_decode() {
            Self::upstream_data(err.to_string())
        } else if let Some(status) = err.status() {
            Self::api(Some(status.as_u16()), err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}

impl From<chrono::ParseError> for StromspotError {
    fn from(err: chrono::ParseError) -> Self {
        Self::upstream_data(format!("invalid timestamp: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = StromspotError::config("test config error");
        assert!(matches!(err, StromspotError::Config { .. }));

        let err = StromspotError::auth(Some(401), "rejected");
        assert!(matches!(err, StromspotError::Authentication { .. }));
        assert!(err.is_unauthorized());

        let err = StromspotError::validation("field", "test validation error");
        assert!(matches!(err, StromspotError::Validation { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = StromspotError::config("test error");
        assert_eq!(format!("{err}"), "Configuration error: test error");

        let err = StromspotError::validation("test_field", "invalid value");
        assert_eq!(
            format!("{err}"),
            "Validation error: test_field - invalid value"
        );

        let err = StromspotError::auth(Some(401), "Invalid client credentials");
        assert_eq!(
            format!("{err}"),
            "Authentication error (status 401): Invalid client credentials"
        );

        let err = StromspotError::api(None, "boom");
        assert_eq!(format!("{err}"), "API error (no status): boom");
    }

    #[test]
    fn test_transient_classification() {
        assert!(StromspotError::network("reset").is_transient());
        assert!(StromspotError::timeout("30s").is_transient());
        assert!(StromspotError::rate_limit("slow down").is_transient());
        assert!(StromspotError::api(Some(503), "unavailable").is_transient());
        assert!(!StromspotError::api(Some(400), "bad request").is_transient());
        assert!(!StromspotError::auth(Some(401), "nope").is_transient());
        assert!(!StromspotError::config("missing").is_transient());
    }

    #[test]
    fn test_status_accessor() {
        assert_eq!(StromspotError::rate_limit("x").status(), Some(429));
        assert_eq!(StromspotError::api(Some(404), "x").status(), Some(404));
        assert_eq!(StromspotError::network("x").status(), None);
    }
}
