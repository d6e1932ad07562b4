#![allow(dead_code)]

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use turnstile::dispatch::{Choice, ConversationSession, Dispatcher, DispatcherConfig, ValueCategory};

/// Something the dispatcher rendered
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Reply(String),
    Picture(String),
    Rdl(serde_json::Value),
    Choice(usize, String),
    Button(String),
    Link(String, String),
    AskSpecial(Option<ValueCategory>),
    Expect(Option<ValueCategory>),
}

/// Session that records every call in order
#[derive(Default)]
pub struct RecordingSession {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    pub fn replies(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|sent| match sent {
                Sent::Reply(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count_reply(&self, message: &str) -> usize {
        self.replies().iter().filter(|reply| *reply == message).count()
    }

    pub fn choices_sent(&self) -> usize {
        self.sent
            .lock()
            .iter()
            .filter(|sent| matches!(sent, Sent::Choice(..)))
            .count()
    }

    fn push(&self, sent: Sent) {
        self.sent.lock().push(sent);
    }
}

impl ConversationSession for RecordingSession {
    fn send_reply(&self, message: &str, _icon: Option<&str>) {
        self.push(Sent::Reply(message.to_string()));
    }

    fn send_picture(&self, url: &str, _icon: Option<&str>) {
        self.push(Sent::Picture(url.to_string()));
    }

    fn send_rdl(&self, rdl: &serde_json::Value, _icon: Option<&str>) {
        self.push(Sent::Rdl(rdl.clone()));
    }

    fn send_choice(&self, index: usize, choice: &Choice) {
        self.push(Sent::Choice(index, choice.title.clone()));
    }

    fn send_button(&self, title: &str, _payload: &serde_json::Value) {
        self.push(Sent::Button(title.to_string()));
    }

    fn send_link(&self, title: &str, url: &str) {
        self.push(Sent::Link(title.to_string(), url.to_string()));
    }

    fn send_ask_special(&self, category: Option<ValueCategory>) {
        self.push(Sent::AskSpecial(category));
    }

    fn expect(&self, category: Option<ValueCategory>) {
        self.push(Sent::Expect(category));
    }
}

/// Configuration without the welcome script
pub fn quiet_config() -> DispatcherConfig {
    DispatcherConfig {
        show_welcome: false,
        ..DispatcherConfig::default()
    }
}

pub fn dispatcher_with_session() -> (Arc<Dispatcher>, Arc<RecordingSession>) {
    let session = RecordingSession::new();
    let dispatcher = Arc::new(Dispatcher::new(quiet_config(), session.clone()));
    (dispatcher, session)
}

pub fn choices(count: usize) -> Vec<Choice> {
    (0..count)
        .map(|i| Choice::new("device", format!("option {i}")))
        .collect()
}

/// Fail the test instead of hanging when the dispatcher deadlocks
pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("dispatcher did not make progress")
}
