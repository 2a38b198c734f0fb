//! Error types for Flowdeck.
//!
//! All errors in Flowdeck are represented by the `FlowdeckError` enum,
//! which provides specific variants for different error categories.

use std::{io::ErrorKind, string::FromUtf8Error};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all Flowdeck operations.
///
/// Each variant represents a specific category of error that can occur
/// while converting workflow definitions, editing them, talking to the
/// backend API or following an agent run stream.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum FlowdeckError {
    /// Configuration parsing or validation errors.
    #[error("{0}")]
    Config(String),

    /// Data conversion errors (JSON, TOML, etc.).
    #[error("{0}")]
    Convert(String),

    /// Workflow definition errors.
    #[error("{0}")]
    Workflow(String),

    /// Step tree errors (malformed condition groups, unknown steps).
    #[error("{0}")]
    Step(String),

    /// Rejected editor commands.
    #[error("{0}")]
    Editor(String),

    /// Storage operation errors.
    #[error("{0}")]
    Store(String),

    /// Agent run stream errors.
    #[error("{0}")]
    Stream(String),

    /// Network-level errors (connection refused, broken stream, decode failures).
    #[error("{0}")]
    Transport(String),

    /// Payment required. Surfaced through the billing UI, never as a generic toast.
    #[error("billing error: {message}")]
    Billing {
        message: String,
        detail: Option<serde_json::Value>,
    },

    /// Missing or expired credentials.
    #[error("authentication error: {0}")]
    Auth(String),

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success HTTP status.
    #[error("http {status}: {message}")]
    Http {
        status: u16,
        message: String,
    },

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),

    /// Message queue errors.
    #[error("{0}")]
    Queue(String),
}

impl FlowdeckError {
    /// Whether the error means the resource is gone for good.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FlowdeckError::NotFound(_) | FlowdeckError::Http { status: 404, .. })
    }

    pub fn is_billing(&self) -> bool {
        matches!(self, FlowdeckError::Billing { .. })
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, FlowdeckError::Auth(_))
    }
}

impl From<FlowdeckError> for String {
    fn from(val: FlowdeckError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for FlowdeckError {
    fn from(error: std::io::Error) -> Self {
        FlowdeckError::IoError(error.to_string())
    }
}

impl From<FlowdeckError> for std::io::Error {
    fn from(val: FlowdeckError) -> Self {
        #[allow(clippy::io_other_error)]
        std::io::Error::new(ErrorKind::Other, val.to_string())
    }
}

impl From<FromUtf8Error> for FlowdeckError {
    fn from(_: FromUtf8Error) -> Self {
        FlowdeckError::Convert("Error with utf-8 string convert".to_string())
    }
}

impl From<serde_json::Error> for FlowdeckError {
    fn from(error: serde_json::Error) -> Self {
        FlowdeckError::Convert(error.to_string())
    }
}

impl From<toml::de::Error> for FlowdeckError {
    fn from(error: toml::de::Error) -> Self {
        FlowdeckError::Config(error.to_string())
    }
}

impl From<reqwest::Error> for FlowdeckError {
    fn from(error: reqwest::Error) -> Self {
        FlowdeckError::Transport(error.to_string())
    }
}

impl From<jsonschema::ValidationError<'_>> for FlowdeckError {
    fn from(error: jsonschema::ValidationError<'_>) -> Self {
        FlowdeckError::Workflow(error.to_string())
    }
}
