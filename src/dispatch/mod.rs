//! Turn-dispatch engine and public API
//!
//! This module provides the [`Dispatcher`] that arbitrates the conversation
//! channel, the configuration it is built from, and the collaborator traits
//! it renders through.

use serde::{Deserialize, Serialize};
use std::path::Path;

// Submodules
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod expectation;
pub mod idle;
pub mod intent;
pub mod queue;
pub mod replies;
pub mod session;

use error::ConfigResult;

/// Configuration for the dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Log every classification verdict at info level
    pub debug: bool,

    /// Icon for replies that name none, when no dispatcher icon is set
    pub default_icon: Option<String>,

    /// Run the welcome script before the idle loop starts consuming
    pub show_welcome: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            debug: false,
            default_icon: None,
            show_welcome: true,
        }
    }
}

impl DispatcherConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }
}

// Re-export commonly used types
pub use dispatcher::{Dispatcher, TurnState};
pub use error::{Cancellation, DialogError, DialogResult};
pub use event::{CompletionHandle, Outcome, QueueItem, Work};
pub use expectation::{Expectation, Reaction, Verdict, classify};
pub use idle::{TaskScripts, run_idle_loop};
pub use intent::{Ast, Intent, MeasureUnit, Value, ValueCategory};
pub use session::{Choice, ConversationSession, SourceText, Translate};
