//! Event records offered to the conversation channel
//!
//! Every producer-originated event, and every user utterance that arrives
//! while no task script holds the channel, becomes a [`QueueItem`]. Producers
//! get back a [`CompletionHandle`] that settles once a consumer has finished
//! with the record.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use uuid::Uuid;

use super::error::{DialogError, DialogResult};
use super::intent::{Ast, Intent, Value, ValueCategory};

/// One unit of asynchronous work that needs the channel
#[derive(Debug, Clone)]
pub enum QueueItem {
    /// User utterance received while no task script held the channel
    UserInput {
        /// The classified utterance
        intent: Intent,
    },

    /// Output from a background task
    Notification {
        /// Producing app or task
        source_id: Option<String>,
        /// Icon to render next to the output
        icon: Option<String>,
        /// Type name used to format `output_value`
        output_type: Option<String>,
        /// Raw output payload
        output_value: serde_json::Value,
    },

    /// Failure reported by a background task
    Error {
        /// Producing app or task
        source_id: Option<String>,
        /// Icon to render next to the message
        icon: Option<String>,
        /// The failure
        error: Arc<anyhow::Error>,
    },

    /// Follow-up question from a running task
    Question {
        /// Producing app or task
        source_id: Option<String>,
        /// Icon to render next to the question
        icon: Option<String>,
        /// Category of answer the task wants
        answer_type: ValueCategory,
        /// Question text
        prompt: String,
    },

    /// Another party asks to run a program on the user's behalf
    PermissionRequest {
        /// Requesting principal
        principal: String,
        /// Identity the principal presented
        identity: String,
        /// Program to run
        program: Ast,
    },

    /// Interactive device or account configuration
    InteractiveConfigure {
        /// Kind of thing to configure, if known
        kind: Option<String>,
    },

    /// Program execution that needs confirmation in the conversation
    RunProgram {
        /// Program to run
        program: Ast,
        /// Unique id of this run
        run_id: String,
        /// Identity requesting the run
        identity: String,
    },
}

impl QueueItem {
    /// Short tag used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            QueueItem::UserInput { .. } => "user-input",
            QueueItem::Notification { .. } => "notification",
            QueueItem::Error { .. } => "error",
            QueueItem::Question { .. } => "question",
            QueueItem::PermissionRequest { .. } => "permission-request",
            QueueItem::InteractiveConfigure { .. } => "interactive-configure",
            QueueItem::RunProgram { .. } => "run-program",
        }
    }
}

/// Result a consumer reports back to the producer
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The record was processed; nothing to report
    Done,
    /// Answer to a [`QueueItem::Question`]
    Answer(Value),
    /// Decision on a [`QueueItem::PermissionRequest`]: the approved program, or `None` if denied
    Permission(Option<Ast>),
}

/// Consumer-side half of a completion handle.
///
/// Dropping it without settling resolves the handle with [`DialogError::Abandoned`].
#[derive(Debug)]
pub struct Completer {
    tx: oneshot::Sender<DialogResult<Outcome>>,
}

impl Completer {
    /// Settle the handle successfully
    pub fn resolve(self, outcome: Outcome) {
        let _ = self.tx.send(Ok(outcome));
    }

    /// Settle the handle with an error
    pub fn reject(self, err: DialogError) {
        let _ = self.tx.send(Err(err));
    }

    /// Settle the handle from a task result
    pub fn settle(self, result: DialogResult<Outcome>) {
        let _ = self.tx.send(result);
    }
}

/// Producer-side future that resolves once the record has been processed
#[derive(Debug)]
pub struct CompletionHandle {
    rx: oneshot::Receiver<DialogResult<Outcome>>,
}

impl Future for CompletionHandle {
    type Output = DialogResult<Outcome>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(DialogError::Abandoned)))
    }
}

/// Create a linked completer and handle
pub fn completion() -> (Completer, CompletionHandle) {
    let (tx, rx) = oneshot::channel();
    (Completer { tx }, CompletionHandle { rx })
}

/// A record as handed to the consumer, with its completer
#[derive(Debug)]
pub struct Work {
    /// Identifier used to correlate logs
    pub id: Uuid,
    /// When the record was queued
    pub enqueued_at: DateTime<Utc>,
    /// The record itself
    pub item: QueueItem,
    /// Settles the producer's handle
    pub completer: Completer,
}

impl Work {
    /// Wrap a record with a fresh completion pair
    pub fn new(item: QueueItem) -> (Self, CompletionHandle) {
        let (completer, handle) = completion();
        let work = Self {
            id: Uuid::new_v4(),
            enqueued_at: Utc::now(),
            item,
            completer,
        };
        (work, handle)
    }

    /// Split into the record and its completer
    pub fn into_parts(self) -> (QueueItem, Completer) {
        (self.item, self.completer)
    }
}
