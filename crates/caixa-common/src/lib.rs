//! # Caixa Common
//!
//! Error type and logging setup shared by the caixa-promessa crates.
//!
//! Every failure the worker can report belongs to one [`Subsystem`]; the
//! subsystem doubles as the `category` field in structured logs.

use std::fmt;

use thiserror::Error;

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Part of the worker a failure originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    Network,
    Cache,
    Notification,
    Client,
    Lifecycle,
    Config,
}

impl Subsystem {
    pub fn as_str(self) -> &'static str {
        match self {
            Subsystem::Network => "network",
            Subsystem::Cache => "cache",
            Subsystem::Notification => "notification",
            Subsystem::Client => "client",
            Subsystem::Lifecycle => "lifecycle",
            Subsystem::Config => "config",
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error surfaced to hosts embedding the worker.
#[derive(Error, Debug)]
pub enum CaixaError {
    /// A worker subsystem reported a failure.
    #[error("{subsystem} error: {message}")]
    Worker {
        subsystem: Subsystem,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Broken invariant inside the worker; carries where it happened.
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        backtrace: Option<backtrace::Backtrace>,
    },
}

impl CaixaError {
    pub fn worker(subsystem: Subsystem, message: impl Into<String>) -> Self {
        Self::Worker {
            subsystem,
            message: message.into(),
            source: None,
        }
    }

    /// Attach an underlying cause. No-op for variants that already wrap one.
    pub fn caused_by<E>(self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        match self {
            Self::Worker {
                subsystem, message, ..
            } => Self::Worker {
                subsystem,
                message,
                source: Some(Box::new(cause)),
            },
            other => other,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            backtrace: Some(backtrace::Backtrace::new()),
        }
    }

    /// Subsystem that produced the error, if it came from the worker.
    pub fn subsystem(&self) -> Option<Subsystem> {
        match self {
            Self::Worker { subsystem, .. } => Some(*subsystem),
            _ => None,
        }
    }

    /// Short label used as the `category` log field.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Worker { subsystem, .. } => subsystem.as_str(),
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Url(_) => "url",
            Self::NotFound(_) => "not_found",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Internal { .. } => "internal",
        }
    }

    /// A fresh update may succeed where this one failed: the origin was
    /// unreachable, or the disk hiccupped while persisting caches.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Worker {
                subsystem: Subsystem::Network,
                ..
            } | Self::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CaixaError>;
