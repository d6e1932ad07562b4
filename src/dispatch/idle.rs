//! Idle loop driver
//!
//! The idle loop is the consumer of the event queue whenever no task script
//! holds the channel. It pops records forever, runs the matching task script
//! through [`TaskScripts`], and settles each producer's completion handle
//! with the script's result.

use chrono::Utc;
use futures::future::{self, BoxFuture};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::dispatcher::Dispatcher;
use super::error::{DialogError, DialogResult};
use super::event::{Outcome, QueueItem};

/// Task scripts run once the channel is granted to a record.
pub trait TaskScripts: Send + Sync + 'static {
    /// Run the script for `item` to completion.
    ///
    /// Cancellations from the dispatcher should be propagated, not swallowed,
    /// so control returns to the idle loop.
    fn run(&self, dispatcher: Arc<Dispatcher>, item: QueueItem)
    -> BoxFuture<'static, DialogResult<Outcome>>;

    /// Greet the user before the first record is processed
    fn welcome(&self, _dispatcher: Arc<Dispatcher>) -> BoxFuture<'static, DialogResult<()>> {
        Box::pin(future::ready(Ok(())))
    }
}

impl<F> TaskScripts for F
where
    F: Fn(Arc<Dispatcher>, QueueItem) -> BoxFuture<'static, DialogResult<Outcome>>
        + Send
        + Sync
        + 'static,
{
    fn run(
        &self,
        dispatcher: Arc<Dispatcher>,
        item: QueueItem,
    ) -> BoxFuture<'static, DialogResult<Outcome>> {
        self(dispatcher, item)
    }
}

/// Consume the event queue until the dispatcher closes.
///
/// Only returns with an error: [`DialogError::Closed`] once the dispatcher
/// shuts down. Cancellation of the idle wait itself is expected (a user
/// intent can abort it) and simply re-arms the wait.
pub async fn run_idle_loop(
    dispatcher: Arc<Dispatcher>,
    scripts: Arc<dyn TaskScripts>,
) -> DialogResult<()> {
    if dispatcher.config().show_welcome {
        match scripts.welcome(Arc::clone(&dispatcher)).await {
            Ok(()) => {}
            Err(err) if err.is_cancelled() => debug!("welcome cancelled"),
            Err(DialogError::Closed) => return Err(DialogError::Closed),
            Err(err) => warn!(error = %err, "welcome script failed"),
        }
    }

    loop {
        let work = match dispatcher.next_queue_item().await {
            Ok(work) => work,
            Err(DialogError::Cancelled(_)) => {
                debug!("idle wait cancelled");
                continue;
            }
            Err(err) => return Err(err),
        };

        let id = work.id;
        let waited_ms = (Utc::now() - work.enqueued_at).num_milliseconds();
        let (item, completer) = work.into_parts();
        let kind = item.kind();
        debug!(%id, kind, waited_ms, "running task script");

        let result = scripts.run(Arc::clone(&dispatcher), item).await;
        match &result {
            Ok(outcome) => debug!(%id, kind, ?outcome, "task script finished"),
            Err(err) if err.is_cancelled() => info!(%id, kind, "task script cancelled"),
            Err(DialogError::Closed) => {
                completer.settle(result);
                return Err(DialogError::Closed);
            }
            Err(err) => warn!(%id, kind, error = %err, "task script failed"),
        }
        completer.settle(result);
    }
}
