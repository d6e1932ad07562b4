//! Turnstile REPL - interactive console for the turn dispatcher
//!
//! Reads utterances from stdin, classifies them with a keyword matcher, and
//! feeds them to a dispatcher whose replies are printed to stdout. Lines
//! starting with `notify` or `remind` act as background producers instead.

use clap::Parser;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use turnstile::DispatcherConfig;
use turnstile::dispatch::{
    Ast, Choice, ConversationSession, DialogError, DialogResult, Dispatcher, Intent, Outcome,
    QueueItem, TaskScripts, Value, ValueCategory, run_idle_loop,
};

#[derive(Parser)]
#[command(name = "turnstile-repl")]
#[command(about = "Interactive console for the turn dispatcher", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log every classification verdict
    #[arg(long)]
    debug: bool,

    /// Skip the welcome message
    #[arg(long)]
    no_welcome: bool,
}

/// Prints everything the dispatcher says.
struct ConsoleSession;

impl ConversationSession for ConsoleSession {
    fn send_reply(&self, message: &str, icon: Option<&str>) {
        match icon {
            Some(icon) => println!("[{icon}] {message}"),
            None => println!("{message}"),
        }
    }

    fn send_picture(&self, url: &str, _icon: Option<&str>) {
        println!("(picture) {url}");
    }

    fn send_rdl(&self, rdl: &serde_json::Value, _icon: Option<&str>) {
        println!("(link card) {rdl}");
    }

    fn send_choice(&self, index: usize, choice: &Choice) {
        println!("  {index}) {}", choice.title);
    }

    fn send_button(&self, title: &str, _payload: &serde_json::Value) {
        println!("  [{title}]");
    }

    fn send_link(&self, title: &str, url: &str) {
        println!("{title}: {url}");
    }

    fn send_ask_special(&self, category: Option<ValueCategory>) {
        if let Some(hint) = ValueCategory::ask_special(category) {
            println!("(waiting for {hint})");
        }
    }

    fn expect(&self, _category: Option<ValueCategory>) {}
}

/// Keyword classifier standing in for the semantic parser.
fn classify_utterance(line: &str, expecting: Option<ValueCategory>) -> Intent {
    let text = line.trim();
    let lower = text.to_lowercase();

    if expecting.is_some_and(ValueCategory::is_raw) {
        return Intent::Answer {
            category: ValueCategory::RawString,
            value: Value::String(text.to_string()),
        };
    }

    match lower.as_str() {
        "" => return Intent::Empty,
        "hi" | "hello" => return Intent::Hello,
        "cool" => return Intent::Cool,
        "sorry" => return Intent::Sorry,
        "thanks" | "thank you" => return Intent::ThankYou,
        "help" => return Intent::Help,
        "debug" => return Intent::Debug,
        "train" => return Intent::Train,
        "more" => return Intent::More,
        "back" => return Intent::Back,
        "maybe" => return Intent::Maybe,
        "never mind" | "cancel" | "stop" => return Intent::NeverMind,
        "list commands" => return Intent::CommandList { category: None },
        "yes" if expecting == Some(ValueCategory::YesNo) => return Intent::yes_no(true),
        "no" if expecting == Some(ValueCategory::YesNo) => return Intent::yes_no(false),
        "yes" => return Intent::Yes,
        "no" => return Intent::No,
        _ => {}
    }

    if let Ok(number) = lower.parse::<f64>() {
        let category = match expecting {
            Some(ValueCategory::MultipleChoice) => ValueCategory::MultipleChoice,
            _ => ValueCategory::Number,
        };
        return Intent::Answer {
            category,
            value: Value::Number(number),
        };
    }

    if let Some(program) = lower.strip_prefix("run ") {
        return Intent::Program(Ast::new(program));
    }

    Intent::Failed {
        utterance: Some(text.to_string()),
    }
}

/// Demo task scripts
struct DemoScripts;

impl TaskScripts for DemoScripts {
    fn run(
        &self,
        dispatcher: Arc<Dispatcher>,
        item: QueueItem,
    ) -> BoxFuture<'static, DialogResult<Outcome>> {
        run_script(dispatcher, item).boxed()
    }

    fn welcome(&self, dispatcher: Arc<Dispatcher>) -> BoxFuture<'static, DialogResult<()>> {
        async move {
            dispatcher.reply("Hello! Type 'help' to see what I can do.");
            Ok(())
        }
        .boxed()
    }
}

async fn run_script(dispatcher: Arc<Dispatcher>, item: QueueItem) -> DialogResult<Outcome> {
    match item {
        QueueItem::UserInput { intent } => match intent {
            Intent::Program(program) => {
                let question = format!("Do you want me to run {program}?");
                if dispatcher.ask_yes_no(&question).await? {
                    dispatcher.done();
                } else {
                    dispatcher.reply("Ok, I won't.");
                }
            }
            Intent::Failed { utterance } => dispatcher.fail(utterance.as_deref()),
            Intent::Help | Intent::CommandList { .. } => {
                dispatcher.reply(
                    "Try 'run <program>', 'notify <text>', 'remind <question>' or 'configure'.",
                );
            }
            other => {
                dispatcher.reply(&format!("I don't know what to do with {}.", other.tag()))
            }
        },
        QueueItem::Notification {
            source_id,
            icon,
            output_value,
            ..
        } => {
            let text = output_value
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| output_value.to_string());
            let message = match source_id {
                Some(source) => dispatcher.tr(
                    "Notification from %s: %s",
                    &[source.as_str(), text.as_str()],
                ),
                None => text,
            };
            dispatcher.reply_with_icon(&message, icon.as_deref());
        }
        QueueItem::Error { error, icon, .. } => {
            let message =
                dispatcher.tr("Sorry, that did not work: %s.", &[error.to_string().as_str()]);
            dispatcher.reply_with_icon(&message, icon.as_deref());
        }
        QueueItem::Question {
            answer_type,
            prompt,
            ..
        } => {
            let answer = dispatcher.ask_value(answer_type, &prompt).await?;
            return Ok(Outcome::Answer(answer));
        }
        QueueItem::PermissionRequest {
            principal, program, ..
        } => {
            let question = format!("{principal} wants to run {program}. Is that ok?");
            let allowed = dispatcher.ask_yes_no(&question).await?;
            return Ok(Outcome::Permission(allowed.then_some(program)));
        }
        QueueItem::InteractiveConfigure { .. } => {
            let choices = vec![
                Choice::new("device", "Kitchen light"),
                Choice::new("device", "Thermostat"),
            ];
            let index = dispatcher
                .ask_choices("What would you like to configure?", choices)
                .await?;
            dispatcher.reply(&format!("Configuring option {index}."));
        }
        QueueItem::RunProgram { program, .. } => {
            dispatcher.reply(&format!("Running {program}."));
            dispatcher.done();
        }
    }
    Ok(Outcome::Done)
}

/// Run a background producer for lines that are not user utterances.
fn spawn_producer(dispatcher: &Arc<Dispatcher>, line: &str) -> bool {
    let dispatcher = Arc::clone(dispatcher);
    if let Some(text) = line.strip_prefix("notify ") {
        let handle = dispatcher.dispatch_notify(
            Some("console".to_string()),
            None,
            None,
            serde_json::Value::String(text.to_string()),
        );
        tokio::spawn(async move {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "notification was not shown");
            }
        });
        return true;
    }
    if let Some(question) = line.strip_prefix("remind ") {
        let handle = dispatcher.dispatch_ask_question(
            Some("console".to_string()),
            None,
            ValueCategory::RawString,
            question,
        );
        tokio::spawn(async move {
            match handle.await {
                Ok(outcome) => tracing::info!(?outcome, "question answered"),
                Err(err) => tracing::info!(error = %err, "question abandoned"),
            }
        });
        return true;
    }
    if line == "configure" {
        drop(dispatcher.dispatch_interactive_configure(None));
        return true;
    }
    false
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => DispatcherConfig::load(path)?,
        None => DispatcherConfig::default(),
    };
    config.debug |= cli.debug;
    config.show_welcome &= !cli.no_welcome;

    let dispatcher = Arc::new(Dispatcher::new(config, Arc::new(ConsoleSession)));
    let idle = dispatcher.start(|dispatcher| run_idle_loop(dispatcher, Arc::new(DemoScripts)));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if spawn_producer(&dispatcher, line.trim()) {
            continue;
        }
        let intent = classify_utterance(&line, dispatcher.expectation().category());
        match dispatcher.handle(intent).await {
            Ok(()) => {}
            Err(DialogError::Closed) => break,
            Err(err) => tracing::warn!(error = %err, "intent was not handled"),
        }
    }

    dispatcher.shutdown();
    idle.await?;
    Ok(())
}
