//! Turn dispatcher
//!
//! Arbitrates the single conversation channel between the user and
//! asynchronous producers. Exactly one consumer holds the channel at a time:
//! the idle loop, suspended on the event queue (default state), or a task
//! script, suspended on the input queue (in turn). User intents rendezvous
//! with that consumer in [`Dispatcher::handle`]; producers enqueue records
//! with the `dispatch_*` operations.
//!
//! ```text
//!  producers ──dispatch_*──► event queue ──next_queue_item──► idle loop
//!                               ▲                                 │
//!  user ──handle──► classify ───┤ (default)                       │ runs
//!                               ▼ (in turn)                       ▼
//!                           input queue ──next_intent/expect──► task script
//! ```
//!
//! Every consumer operation marks the dispatcher "ready" when it suspends.
//! A pop that is satisfied from the queue does not, since the step it starts
//! has yet to say what it expects.
//! `handle` waits for readiness before classifying, so an intent is always
//! judged against the expectation of the step that will receive it.

use futures::FutureExt;
use futures::future::Shared;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::DispatcherConfig;
use super::error::{Cancellation, DialogError, DialogResult};
use super::event::{CompletionHandle, QueueItem, Work};
use super::expectation::{Expectation, Reaction, Verdict, classify};
use super::intent::{Ast, Intent, Value, ValueCategory};
use super::queue::BlockingQueue;
use super::session::{Choice, ConversationSession, SourceText, Translate};

/// Which consumer holds the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// No task script is active; the idle loop consumes the event queue
    Default,
    /// A task script is waiting for the user on the input queue
    InTurn,
}

type ReadyWait = Shared<oneshot::Receiver<()>>;

/// Armed rendezvous: resolved when the consumer next suspends
struct Ready {
    tx: oneshot::Sender<()>,
    wait: ReadyWait,
}

struct DispatchState {
    turn: TurnState,
    expectation: Expectation,
    icon: Option<String>,
    ready: Option<Ready>,
    handling: bool,
    closed: bool,
}

impl DispatchState {
    /// Arm the rendezvous unless it already is
    fn arm(&mut self) {
        if self.ready.is_none() {
            let (tx, rx) = oneshot::channel();
            self.ready = Some(Ready {
                tx,
                wait: rx.shared(),
            });
        }
    }

    /// The consumer just popped. If it really waits, hand back the rendezvous
    /// to fire; a pop satisfied from the queue keeps it armed until the step
    /// it starts suspends.
    fn suspend(&mut self, waiting: bool) -> Option<Ready> {
        if self.closed {
            return None;
        }
        if !waiting {
            self.arm();
            return None;
        }
        self.ready.take()
    }
}

fn fire(ready: Option<Ready>) {
    if let Some(ready) = ready {
        let _ = ready.tx.send(());
    }
}

/// Marks a `handle` call in flight; cleared on drop, even if the call is abandoned
struct Handling<'a>(&'a Mutex<DispatchState>);

impl<'a> Handling<'a> {
    fn enter(state: &'a Mutex<DispatchState>) -> DialogResult<Self> {
        let mut guard = state.lock();
        if guard.closed {
            return Err(DialogError::Closed);
        }
        assert!(
            !guard.handling,
            "handle called while another intent is being handled"
        );
        guard.handling = true;
        Ok(Self(state))
    }
}

impl Drop for Handling<'_> {
    fn drop(&mut self) {
        self.0.lock().handling = false;
    }
}

/// The turn dispatcher
pub struct Dispatcher {
    config: DispatcherConfig,
    session: Arc<dyn ConversationSession>,
    translator: Arc<dyn Translate>,
    state: Mutex<DispatchState>,
    event_queue: BlockingQueue<Work>,
    input_queue: BlockingQueue<Intent>,
}

impl Dispatcher {
    /// Create a dispatcher in the default state rendering through `session`
    pub fn new(config: DispatcherConfig, session: Arc<dyn ConversationSession>) -> Self {
        Self {
            config,
            session,
            translator: Arc::new(SourceText),
            state: Mutex::new(DispatchState {
                turn: TurnState::Default,
                expectation: Expectation::default(),
                icon: None,
                ready: None,
                handling: false,
                closed: false,
            }),
            event_queue: BlockingQueue::new("event"),
            input_queue: BlockingQueue::new("input"),
        }
    }

    /// Replace the translator used for every user-facing message
    pub fn with_translator(mut self, translator: Arc<dyn Translate>) -> Self {
        self.translator = translator;
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub(crate) fn session(&self) -> &dyn ConversationSession {
        self.session.as_ref()
    }

    /// Translate a message key
    pub fn tr(&self, key: &str, args: &[&str]) -> String {
        self.translator.translate(key, args)
    }

    /// Snapshot of the expectation slot
    pub fn expectation(&self) -> Expectation {
        self.state.lock().expectation.clone()
    }

    /// Which consumer currently holds the channel
    pub fn turn_state(&self) -> TurnState {
        self.state.lock().turn
    }

    /// Icon attached to replies that do not name their own
    pub fn icon(&self) -> Option<String> {
        let state = self.state.lock();
        state
            .icon
            .clone()
            .or_else(|| self.config.default_icon.clone())
    }

    /// Set the icon attached to subsequent replies
    pub fn set_icon(&self, icon: Option<String>) {
        self.state.lock().icon = icon;
    }

    /// Number of producer records waiting for the idle loop
    pub fn pending_events(&self) -> usize {
        self.event_queue.len()
    }

    /// Whether the dispatcher has shut down
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    // ---- consumer side -------------------------------------------------

    /// Wait for the next record, from the idle loop.
    ///
    /// Clears the expectation and returns the channel to the default state.
    /// Side effects happen at call time; the returned future only waits.
    pub fn next_queue_item(&self) -> impl Future<Output = DialogResult<Work>> + Send + use<> {
        {
            let mut state = self.state.lock();
            state.expectation.clear();
            state.turn = TurnState::Default;
        }
        self.session.expect(None);
        self.session.send_ask_special(None);

        let (pop, ready) = {
            let mut state = self.state.lock();
            let pop = self.event_queue.pop();
            let ready = state.suspend(self.event_queue.has_waiter());
            (pop, ready)
        };
        fire(ready);
        pop
    }

    /// Wait for the next user intent, from a task script.
    pub fn next_intent(&self) -> impl Future<Output = DialogResult<Intent>> + Send + use<> {
        let (pop, ready) = {
            let mut state = self.state.lock();
            state.turn = TurnState::InTurn;
            let pop = self.input_queue.pop();
            let ready = state.suspend(self.input_queue.has_waiter());
            (pop, ready)
        };
        fire(ready);
        pop
    }

    /// Record what the current step expects, then wait for the user's reply.
    pub fn expect(
        &self,
        category: Option<ValueCategory>,
    ) -> impl Future<Output = DialogResult<Intent>> + Send + use<> {
        self.state.lock().expectation.set(category);
        self.session.expect(category);
        self.session.send_ask_special(category);
        self.next_intent()
    }

    /// Ask a question and wait for the delivered intent.
    pub async fn ask(&self, category: ValueCategory, question: &str) -> DialogResult<Intent> {
        self.reply(question);
        self.expect(Some(category)).await
    }

    /// Ask a question and return the answer's value.
    pub async fn ask_value(&self, category: ValueCategory, question: &str) -> DialogResult<Value> {
        let intent = self.ask(category, question).await?;
        match intent {
            Intent::Answer { value, .. } => Ok(value),
            _ => Err(DialogError::UnexpectedAnswer { expected: category }),
        }
    }

    /// Ask a yes/no question.
    pub async fn ask_yes_no(&self, question: &str) -> DialogResult<bool> {
        match self.ask_value(ValueCategory::YesNo, question).await? {
            Value::Boolean(answer) => Ok(answer),
            _ => Err(DialogError::UnexpectedAnswer {
                expected: ValueCategory::YesNo,
            }),
        }
    }

    /// Present `choices` and return the index the user picked.
    pub async fn ask_choices(&self, question: &str, choices: Vec<Choice>) -> DialogResult<usize> {
        self.reply(question);
        self.state.lock().expectation.set_choices(choices.clone());
        self.session.expect(Some(ValueCategory::MultipleChoice));
        for (index, choice) in choices.iter().enumerate() {
            self.session.send_choice(index, choice);
        }
        self.session
            .send_ask_special(Some(ValueCategory::MultipleChoice));

        let intent = self.next_intent().await?;
        intent
            .answer_value()
            .and_then(Value::as_index)
            .ok_or(DialogError::UnexpectedAnswer {
                expected: ValueCategory::MultipleChoice,
            })
    }

    /// Offer more results; resolves with `Intent::More` or is cancelled.
    pub async fn ask_more_results(&self) -> DialogResult<Intent> {
        self.expect(Some(ValueCategory::More)).await
    }

    // ---- producer side -------------------------------------------------

    /// Queue a notification from a background task
    pub fn dispatch_notify(
        &self,
        source_id: Option<String>,
        icon: Option<String>,
        output_type: Option<String>,
        output_value: serde_json::Value,
    ) -> CompletionHandle {
        self.push_queue_item(QueueItem::Notification {
            source_id,
            icon,
            output_type,
            output_value,
        })
    }

    /// Queue a background task failure
    pub fn dispatch_notify_error(
        &self,
        source_id: Option<String>,
        icon: Option<String>,
        error: anyhow::Error,
    ) -> CompletionHandle {
        self.push_queue_item(QueueItem::Error {
            source_id,
            icon,
            error: Arc::new(error),
        })
    }

    /// Queue a permission request from another party
    pub fn dispatch_ask_for_permission(
        &self,
        principal: impl Into<String>,
        identity: impl Into<String>,
        program: Ast,
    ) -> CompletionHandle {
        self.push_queue_item(QueueItem::PermissionRequest {
            principal: principal.into(),
            identity: identity.into(),
            program,
        })
    }

    /// Queue a follow-up question from a running task
    pub fn dispatch_ask_question(
        &self,
        source_id: Option<String>,
        icon: Option<String>,
        answer_type: ValueCategory,
        prompt: impl Into<String>,
    ) -> CompletionHandle {
        self.push_queue_item(QueueItem::Question {
            source_id,
            icon,
            answer_type,
            prompt: prompt.into(),
        })
    }

    /// Queue an interactive configuration request
    pub fn dispatch_interactive_configure(&self, kind: Option<String>) -> CompletionHandle {
        self.push_queue_item(QueueItem::InteractiveConfigure { kind })
    }

    /// Queue a program execution request
    pub fn dispatch_run_program(
        &self,
        program: Ast,
        run_id: impl Into<String>,
        identity: impl Into<String>,
    ) -> CompletionHandle {
        self.push_queue_item(QueueItem::RunProgram {
            program,
            run_id: run_id.into(),
            identity: identity.into(),
        })
    }

    fn push_queue_item(&self, item: QueueItem) -> CompletionHandle {
        let mut state = self.state.lock();
        self.enqueue(&mut *state, item)
    }

    /// Queue a record while holding the state lock, so waiter registration
    /// and arming cannot interleave.
    fn enqueue(&self, state: &mut DispatchState, item: QueueItem) -> CompletionHandle {
        // A push wakes the idle loop, so user input must wait until it is ready
        // again. A script waiting on the input queue is not woken, so arming
        // there would hold user input back until the turn ends.
        if !state.closed && !self.input_queue.has_waiter() {
            state.arm();
        }

        let kind = item.kind();
        let (work, handle) = Work::new(item);
        info!(id = %work.id, kind, "queued event");
        self.event_queue.push(work);
        handle
    }

    // ---- user side -----------------------------------------------------

    /// Hand a classified user intent to the dispatcher.
    ///
    /// Waits until a consumer is suspended, classifies the intent against
    /// its expectation, and either deals with it directly or delivers it.
    /// Returns once the dispatcher is ready for the next intent.
    ///
    /// # Panics
    ///
    /// Panics if another `handle` call is still in flight; callers must
    /// await each `handle` before issuing the next one.
    pub async fn handle(&self, intent: Intent) -> DialogResult<()> {
        let _handling = Handling::enter(&self.state)?;

        let verdict = self
            .when_ready(|state| {
                let verdict = classify(&state.expectation, &intent);
                if verdict == Verdict::PassThrough {
                    self.deliver(state, intent.clone());
                }
                verdict
            })
            .await?;

        if self.config.debug {
            info!(intent = intent.tag(), ?verdict, "classified intent");
        } else {
            debug!(intent = intent.tag(), ?verdict, "classified intent");
        }

        match verdict {
            Verdict::Handled(reaction) => self.react(reaction),
            Verdict::Abort { apologize } => {
                if apologize {
                    self.reset();
                }
                self.cancel(Some(intent));
            }
            Verdict::SwitchSubject => {
                self.cancel(Some(intent.clone()));
                // Once the cancelled script has unwound the intent is a new
                // command; it queues behind any record that took the channel meanwhile
                self.when_ready(|state| {
                    let _ = self.enqueue(state, QueueItem::UserInput { intent });
                })
                .await?;
            }
            Verdict::PassThrough => {}
        }

        self.when_ready(|_| ()).await
    }

    /// Deliver to whichever consumer holds the channel. Errors from the
    /// user's own record are reported by the scripts.
    fn deliver(&self, state: &mut DispatchState, intent: Intent) {
        match state.turn {
            TurnState::Default => {
                let _ = self.enqueue(state, QueueItem::UserInput { intent });
            }
            TurnState::InTurn => {
                state.arm();
                debug!(intent = intent.tag(), "delivering intent to task script");
                self.input_queue.push(intent);
            }
        }
    }

    fn react(&self, reaction: Reaction) {
        match reaction {
            Reaction::DidNotUnderstand => self.fail(None),
            Reaction::DebugReport => self.debug_report(),
            Reaction::LookingFor => self.looking_for(),
            Reaction::Ignore => {}
            Reaction::SmallTalk(key) => self.reply(&self.tr(key, &[])),
            Reaction::YesWhat => self.reply(&self.tr("Yes what?", &[])),
            Reaction::Unexpected => self.unexpected(),
            Reaction::InvalidChoice => {
                self.reply(&self.tr("Please click on one of the provided choices.", &[]));
                self.resend_choices();
            }
        }
    }

    /// Cancel whichever consumer wait is active, carrying the triggering intent.
    ///
    /// The next rendezvous is armed first so that a record pushed while the
    /// cancelled script unwinds is not lost.
    pub fn cancel(&self, intent: Option<Intent>) {
        let (turn, delivered) = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.arm();
            let err = DialogError::Cancelled(Cancellation { intent });
            let delivered = match state.turn {
                TurnState::Default => self.event_queue.cancel_wait(err),
                TurnState::InTurn => self.input_queue.cancel_wait(err),
            };
            (state.turn, delivered)
        };
        info!(?turn, delivered, "cancelled current wait");
    }

    /// Wait until no rendezvous is armed, then run `f` under the same lock.
    ///
    /// A producer may re-arm the rendezvous between it firing and this task
    /// resuming, so readiness is re-checked until it holds.
    async fn when_ready<R>(&self, f: impl FnOnce(&mut DispatchState) -> R) -> DialogResult<R> {
        loop {
            let wait = {
                let mut state = self.state.lock();
                if state.closed {
                    return Err(DialogError::Closed);
                }
                match state.ready.as_ref().map(|ready| ready.wait.clone()) {
                    Some(wait) => wait,
                    None => return Ok(f(&mut *state)),
                }
            };
            wait.await.map_err(|_| DialogError::Closed)?;
        }
    }

    // ---- lifecycle -----------------------------------------------------

    /// Arm the first rendezvous and spawn the idle loop.
    ///
    /// The idle loop must run for the life of the conversation: if it ever
    /// returns, the dispatcher shuts down and every pending or later wait
    /// fails with [`DialogError::Closed`].
    pub fn start<F, Fut>(self: &Arc<Self>, idle: F) -> JoinHandle<()>
    where
        F: FnOnce(Arc<Dispatcher>) -> Fut,
        Fut: Future<Output = DialogResult<()>> + Send + 'static,
    {
        self.state.lock().arm();

        let idle_loop = idle(Arc::clone(self));
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            match idle_loop.await {
                Ok(()) => error!("idle loop returned; the channel has no consumer"),
                Err(err) => error!(error = %err, "idle loop failed"),
            }
            dispatcher.shutdown();
        })
    }

    /// Shut down: fail every pending wait and refuse further intents.
    pub fn shutdown(&self) {
        let ready = {
            let mut state = self.state.lock();
            state.closed = true;
            state.ready.take()
        };
        // Dropping the sender resolves every rendezvous with `Closed`
        drop(ready);
        self.event_queue.close();
        self.input_queue.close();
        info!("dispatcher shut down");
    }

    pub(crate) fn describe_state(&self) -> (TurnState, Option<ValueCategory>) {
        let state = self.state.lock();
        (state.turn, state.expectation.category())
    }
}
