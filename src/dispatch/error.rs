//! Error types for the turn dispatcher
//!
//! Cancellation is its own value rather than a flavour of failure, so task
//! scripts can let it propagate while reporting every other error.

use std::io;
use thiserror::Error;

use super::intent::{Intent, ValueCategory};

/// Cooperative abort of a suspended wait.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("user cancelled")]
pub struct Cancellation {
    /// Intent that triggered the cancellation, if any
    pub intent: Option<Intent>,
}

impl Cancellation {
    /// Cancellation triggered by the given intent
    pub fn by(intent: Intent) -> Self {
        Self {
            intent: Some(intent),
        }
    }
}

/// Errors surfaced to consumers and producers of the dispatcher
#[derive(Debug, Clone, Error)]
pub enum DialogError {
    /// The wait was cancelled by a higher-priority event
    #[error(transparent)]
    Cancelled(#[from] Cancellation),

    /// The dispatcher shut down while the wait was pending
    #[error("dispatcher is closed")]
    Closed,

    /// A queued item was dropped without being resolved
    #[error("queued item was abandoned before completion")]
    Abandoned,

    /// An ask helper received an answer it cannot read
    #[error("expected an answer of type {expected}")]
    UnexpectedAnswer {
        /// Category that was asked for
        expected: ValueCategory,
    },

    /// A task script or producer failed while handling an item
    #[error("task failed: {0}")]
    Failed(String),
}

impl DialogError {
    /// Whether this error is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DialogError::Cancelled(_))
    }

    /// Cancellation payload, if this error is one
    pub fn as_cancellation(&self) -> Option<&Cancellation> {
        match self {
            DialogError::Cancelled(cancellation) => Some(cancellation),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for DialogError {
    fn from(err: anyhow::Error) -> Self {
        DialogError::Failed(format!("{err:#}"))
    }
}

/// Convenience result alias for dialog operations
pub type DialogResult<T> = std::result::Result<T, DialogError>;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result alias for configuration loading
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_is_distinguished() {
        let cancelled: DialogError = Cancellation::by(Intent::NeverMind).into();
        assert!(cancelled.is_cancelled());
        assert_eq!(
            cancelled.as_cancellation().and_then(|c| c.intent.clone()),
            Some(Intent::NeverMind)
        );

        let failed = DialogError::Failed("boom".into());
        assert!(!failed.is_cancelled());
        assert!(failed.as_cancellation().is_none());
    }

    #[test]
    fn test_anyhow_conversion_keeps_context() {
        let err = anyhow::anyhow!("disk full").context("saving preferences");
        let dialog: DialogError = err.into();
        assert_eq!(
            dialog.to_string(),
            "task failed: saving preferences: disk full"
        );
    }
}
