//! Unbounded FIFO with a single blocking consumer
//!
//! The dispatcher keeps two of these: one for producer events and one for
//! user input delivered mid-turn. A pop registers its waiter eagerly, at call
//! time, so the queue reports a waiter before the returned future is polled.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use tokio::sync::oneshot;
use tracing::debug;

use super::error::{DialogError, DialogResult};

type Waiter<T> = oneshot::Sender<DialogResult<T>>;

struct QueueInner<T> {
    items: VecDeque<T>,
    waiter: Option<Waiter<T>>,
    closed: bool,
}

impl<T> QueueInner<T> {
    fn live_waiter(&self) -> bool {
        self.waiter.as_ref().is_some_and(|waiter| !waiter.is_closed())
    }
}

enum PopState<T> {
    Ready(DialogResult<T>),
    Waiting(oneshot::Receiver<DialogResult<T>>),
}

/// FIFO queue whose pop suspends until an item is pushed or the wait is cancelled.
pub struct BlockingQueue<T> {
    name: &'static str,
    inner: Mutex<QueueInner<T>>,
}

impl<T: Send + 'static> BlockingQueue<T> {
    /// Create an empty queue; `name` only appears in logs
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Mutex::new(QueueInner {
                items: VecDeque::new(),
                waiter: None,
                closed: false,
            }),
        }
    }

    /// Append an item, handing it straight to the waiter if one is suspended.
    ///
    /// Pushing onto a closed queue drops the item.
    pub fn push(&self, item: T) {
        let mut inner = self.inner.lock();
        if inner.closed {
            debug!(queue = self.name, "push on closed queue dropped");
            return;
        }

        if let Some(waiter) = inner.waiter.take() {
            match waiter.send(Ok(item)) {
                Ok(()) => {
                    debug!(queue = self.name, "item handed to waiter");
                    return;
                }
                // The pop future was dropped; keep the item for the next pop
                Err(returned) => {
                    if let Ok(item) = returned {
                        inner.items.push_back(item);
                    }
                }
            }
        } else {
            inner.items.push_back(item);
        }
        debug!(queue = self.name, len = inner.items.len(), "item queued");
    }

    /// Take the next item, suspending until one is available.
    ///
    /// # Panics
    ///
    /// Panics if another pop on this queue is still suspended.
    pub fn pop(&self) -> impl Future<Output = DialogResult<T>> + Send + use<T> {
        let state = {
            let mut inner = self.inner.lock();
            if inner.closed {
                PopState::Ready(Err(DialogError::Closed))
            } else if let Some(item) = inner.items.pop_front() {
                PopState::Ready(Ok(item))
            } else {
                assert!(
                    !inner.live_waiter(),
                    "{} queue: concurrent pop while another pop is suspended",
                    self.name
                );
                let (tx, rx) = oneshot::channel();
                inner.waiter = Some(tx);
                PopState::Waiting(rx)
            }
        };

        async move {
            match state {
                PopState::Ready(result) => result,
                PopState::Waiting(rx) => rx.await.unwrap_or(Err(DialogError::Closed)),
            }
        }
    }

    /// Fail the suspended pop, if any, with `err`.
    ///
    /// Returns whether a waiter received the error.
    pub fn cancel_wait(&self, err: DialogError) -> bool {
        let waiter = self.inner.lock().waiter.take();
        match waiter {
            Some(waiter) => {
                let delivered = waiter.send(Err(err)).is_ok();
                debug!(queue = self.name, delivered, "wait cancelled");
                delivered
            }
            None => false,
        }
    }

    /// Whether a pop is currently suspended on this queue
    pub fn has_waiter(&self) -> bool {
        self.inner.lock().live_waiter()
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Whether no items are queued
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Close the queue: fail the suspended pop and drop every queued item.
    pub fn close(&self) {
        let (waiter, dropped) = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            (inner.waiter.take(), std::mem::take(&mut inner.items))
        };
        if let Some(waiter) = waiter {
            let _ = waiter.send(Err(DialogError::Closed));
        }
        debug!(queue = self.name, dropped = dropped.len(), "queue closed");
    }
}
