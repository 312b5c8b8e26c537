// src/error.rs
//! Error types for the run tracker

use std::fmt;

pub type Result<T> = std::result::Result<T, TrackerError>;

#[derive(Debug)]
pub enum TrackerError {
    Io(std::io::Error),
    Serial(tokio_serial::Error),
    Json(serde_json::Error),
    Connection(String),
    Parse(String),
    Other(String),
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerError::Io(e) => write!(f, "IO error: {}", e),
            TrackerError::Serial(e) => write!(f, "Serial error: {}", e),
            TrackerError::Json(e) => write!(f, "JSON error: {}", e),
            TrackerError::Connection(msg) => write!(f, "Connection error: {}", msg),
            TrackerError::Parse(msg) => write!(f, "Parse error: {}", msg),
            TrackerError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for TrackerError {}

impl From<std::io::Error> for TrackerError {
    fn from(error: std::io::Error) -> Self {
        TrackerError::Io(error)
    }
}

impl From<tokio_serial::Error> for TrackerError {
    fn from(error: tokio_serial::Error) -> Self {
        TrackerError::Serial(error)
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(error: serde_json::Error) -> Self {
        TrackerError::Json(error)
    }
}

/// Failure modes of a position provider.
///
/// The controller treats both variants the same way (simulation fallback),
/// they are kept apart for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    PermissionDenied,
    Unavailable(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::PermissionDenied => write!(f, "Location permission denied"),
            ProviderError::Unavailable(msg) => write!(f, "Location provider unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<TrackerError> for ProviderError {
    fn from(error: TrackerError) -> Self {
        ProviderError::Unavailable(error.to_string())
    }
}

/// Failure modes of the background task capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundError {
    Unsupported,
    Failed(String),
}

impl fmt::Display for BackgroundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackgroundError::Unsupported => write!(f, "Background tracking is not supported"),
            BackgroundError::Failed(msg) => write!(f, "Background tracking failed: {}", msg),
        }
    }
}

impl std::error::Error for BackgroundError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_error_into_provider_error() {
        let err = TrackerError::Connection("refused".to_string());
        let provider_err: ProviderError = err.into();
        assert_eq!(
            provider_err,
            ProviderError::Unavailable("Connection error: refused".to_string())
        );
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            ProviderError::PermissionDenied.to_string(),
            "Location permission denied"
        );
        assert_eq!(
            BackgroundError::Unsupported.to_string(),
            "Background tracking is not supported"
        );
    }
}
