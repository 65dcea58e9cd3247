//! Error types for the filter engine.

use std::path::PathBuf;

use thiserror::Error;

/// A button batch failed validation. Each variant names what was wrong so the
/// author can fix that entry and resend the whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ButtonParseError {
    #[error("missing '|' between text and url in \"{segment}\"")]
    MissingSeparator { segment: String },

    #[error("more than one '|' in \"{segment}\"")]
    ExtraSeparator { segment: String },

    #[error("button text is empty in \"{segment}\"")]
    EmptyText { segment: String },

    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },
}

/// Filter store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Trigger already taken in this chat.
    #[error("a filter with trigger '{trigger}' already exists")]
    Duplicate { trigger: String },

    #[error("storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize filters: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Chat platform failures (send, download, member lookup).
#[derive(Debug, Error)]
#[error("gateway error: {message}")]
pub struct GatewayError {
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl GatewayError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Returned from `FilterBot::handle` to the frontend's dispatcher.
#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
