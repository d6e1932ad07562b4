//! Turnstile – turn-dispatch engine for a conversational agent
//!
//! Arbitrates a single human-facing conversation channel between the user
//! and asynchronous producers:
//! - Exactly one dialog step owns the channel at any instant
//! - Producers enqueue notifications, questions, and requests at any time
//! - User utterances are classified against what the last step asked for
//! - Cancellation, help, and small talk work the same in every dialog
//! - Higher-priority events cooperatively abort in-progress waits

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Dispatch engine modules
pub mod dispatch;

// Re-export key types for convenience
pub use dispatch::{Dispatcher, DispatcherConfig};

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
