//! Errors raised by the worker.

use caixa_common::{CaixaError, Subsystem};
use thiserror::Error;

/// Errors that can occur in worker operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SwError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Failed to precache {url}: {reason}")]
    BulkPopulation { url: String, reason: String },

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("State error: {0}")]
    State(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result alias for worker operations.
pub type SwResult<T> = Result<T, SwError>;

impl From<url::ParseError> for SwError {
    fn from(err: url::ParseError) -> Self {
        SwError::Config(format!("invalid url: {err}"))
    }
}

impl From<SwError> for CaixaError {
    fn from(err: SwError) -> Self {
        let subsystem = match &err {
            SwError::Network(_) => Subsystem::Network,
            SwError::Cache(_) | SwError::BulkPopulation { .. } => Subsystem::Cache,
            SwError::Notification(_) => Subsystem::Notification,
            SwError::Client(_) => Subsystem::Client,
            SwError::State(_) => Subsystem::Lifecycle,
            SwError::Config(_) => Subsystem::Config,
            SwError::NotFound(what) => return CaixaError::NotFound(what.clone()),
        };
        CaixaError::worker(subsystem, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_population_maps_to_cache_category() {
        let err = SwError::BulkPopulation {
            url: "https://app.example/harp_music.mp3".into(),
            reason: "status 404".into(),
        };
        let converted: CaixaError = err.into();
        assert_eq!(converted.category(), "cache");
        assert!(converted.to_string().contains("harp_music.mp3"));
    }

    #[test]
    fn test_state_maps_to_lifecycle() {
        let converted: CaixaError = SwError::State("not installed".into()).into();
        assert_eq!(converted.category(), "lifecycle");
    }

    #[test]
    fn test_network_failure_is_transient() {
        let converted: CaixaError = SwError::Network("connection reset".into()).into();
        assert!(converted.is_transient());
    }
}
