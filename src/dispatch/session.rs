//! Collaborators injected into the dispatcher
//!
//! The conversation session renders everything the dispatcher says, and the
//! translator turns message keys into user-facing text.

use serde::{Deserialize, Serialize};

use super::intent::ValueCategory;

/// One option of a multiple-choice question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// What kind of thing the option selects
    pub what: String,
    /// Button title
    pub title: String,
    /// Optional longer description
    pub text: Option<String>,
}

impl Choice {
    /// Create a choice without a description
    pub fn new(what: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            what: what.into(),
            title: title.into(),
            text: None,
        }
    }

    /// Attach a description
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// Conversation facade the dispatcher renders through.
///
/// Implementations own the transport; calls must not block and must not
/// call back into the dispatcher.
pub trait ConversationSession: Send + Sync {
    /// Plain text message
    fn send_reply(&self, message: &str, icon: Option<&str>);

    /// Picture by URL
    fn send_picture(&self, url: &str, icon: Option<&str>);

    /// Rich deep link card
    fn send_rdl(&self, rdl: &serde_json::Value, icon: Option<&str>);

    /// One option of a multiple-choice question
    fn send_choice(&self, index: usize, choice: &Choice);

    /// Button that replays `payload` as a command when clicked
    fn send_button(&self, title: &str, payload: &serde_json::Value);

    /// Hyperlink
    fn send_link(&self, title: &str, url: &str);

    /// Announce what kind of input is awaited so the transport can adapt
    fn send_ask_special(&self, category: Option<ValueCategory>);

    /// Mirror the expectation slot outward
    fn expect(&self, category: Option<ValueCategory>);
}

/// Localization capability: turn a message key and its arguments into text.
pub trait Translate: Send + Sync {
    /// Translate `key`, filling its placeholders with `args`
    fn translate(&self, key: &str, args: &[&str]) -> String;
}

/// Translator that uses the source-language key as the message.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceText;

impl Translate for SourceText {
    fn translate(&self, key: &str, args: &[&str]) -> String {
        fill_placeholders(key, args)
    }
}

/// Replace `%s` and `%d` placeholders in order; `%%` is a literal percent.
///
/// Placeholders without a matching argument are left as-is.
pub fn fill_placeholders(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('%') => {
                chars.next();
                out.push('%');
            }
            Some(spec @ ('s' | 'd')) => {
                chars.next();
                match args.next() {
                    Some(arg) => out.push_str(arg),
                    None => {
                        out.push('%');
                        out.push(spec);
                    }
                }
            }
            _ => out.push('%'),
        }
    }
    out
}
