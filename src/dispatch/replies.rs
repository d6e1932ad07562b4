//! Replies and canned conversational messages
//!
//! Thin wrappers over the conversation session that apply the current icon
//! and the translator, plus the generic messages the dispatcher uses when it
//! handles an intent itself.

use serde_json::json;
use tracing::{debug, info};

use super::dispatcher::{Dispatcher, TurnState};
use super::intent::ValueCategory;
use super::session::Choice;

impl Dispatcher {
    /// Send a text reply with the current icon
    pub fn reply(&self, message: &str) {
        self.reply_with_icon(message, None);
    }

    /// Send a text reply, falling back to the current icon
    pub fn reply_with_icon(&self, message: &str, icon: Option<&str>) {
        let fallback = self.icon();
        self.session()
            .send_reply(message, icon.or(fallback.as_deref()));
    }

    /// Send a picture
    pub fn reply_picture(&self, url: &str, icon: Option<&str>) {
        let fallback = self.icon();
        self.session()
            .send_picture(url, icon.or(fallback.as_deref()));
    }

    /// Send a rich deep link card
    pub fn reply_rdl(&self, rdl: &serde_json::Value, icon: Option<&str>) {
        let fallback = self.icon();
        self.session().send_rdl(rdl, icon.or(fallback.as_deref()));
    }

    /// Send one option of a multiple-choice question
    pub fn reply_choice(&self, index: usize, choice: &Choice) {
        if self.expectation().category() != Some(ValueCategory::MultipleChoice) {
            debug!(index, "sending a choice while not expecting a multiple choice");
        }
        self.session().send_choice(index, choice);
    }

    /// Send a button that replays `payload` when clicked
    pub fn reply_button(&self, title: &str, payload: &serde_json::Value) {
        self.session().send_button(title, payload);
    }

    /// Send a button for one of the special commands ("yes", "nevermind", ...)
    pub fn reply_special(&self, title: &str, special: &str) {
        let payload = json!({
            "code": ["bookkeeping", "special", format!("special:{special}")],
            "entities": {},
        });
        self.reply_button(title, &payload);
    }

    /// Send a hyperlink
    pub fn reply_link(&self, title: &str, url: &str) {
        self.session().send_link(title, url);
    }

    /// Confirm that a command was carried out
    pub fn done(&self) {
        self.reply(&self.tr("Consider it done.", &[]));
    }

    /// Refuse a command the user is not allowed to run
    pub fn forbid(&self) {
        self.reply(&self.tr("I'm sorry, you don't have permission to do that.", &[]));
    }

    /// Apologise for abandoning the current step
    pub fn reset(&self) {
        info!(event = "abort", "dialog aborted");
        self.reply(&self.tr("Sorry I couldn't help on that.", &[]));
    }

    /// Report a classification failure, re-prompting if something is expected
    pub fn fail(&self, message: Option<&str>) {
        let expecting = self.expectation().is_expecting();
        let text = match (message, expecting) {
            (Some(message), false) => self.tr(
                "Sorry, I did not understand that: %s. Can you rephrase it?",
                &[message],
            ),
            (None, false) => self.tr("Sorry, I did not understand that. Can you rephrase it?", &[]),
            (Some(message), true) => self.tr("Sorry, I did not understand that: %s.", &[message]),
            (None, true) => self.tr("Sorry, I did not understand that.", &[]),
        };
        self.reply(&text);
        if expecting {
            self.looking_for();
        }
    }

    /// Complain about an answer of the wrong type and re-prompt
    pub fn unexpected(&self) {
        info!(event = "unexpected", "unexpected answer");
        self.reply(&self.tr("Sorry, but that's not what I asked.", &[]));
        self.looking_for();
    }

    /// Describe what the current step expects
    pub fn looking_for(&self) {
        let expecting = self.expectation().category();
        let text = match expecting {
            None => self.tr("In fact, I did not ask for anything at all!", &[]),
            Some(ValueCategory::YesNo) => {
                self.tr("Sorry, I need you to confirm the last question first.", &[])
            }
            Some(ValueCategory::MultipleChoice) => {
                self.reply(&self.tr("Could you choose one of the following?", &[]));
                self.resend_choices();
                self.session().send_ask_special(expecting);
                return;
            }
            Some(ValueCategory::Measure(unit)) => {
                let quantity = self.tr(unit.quantity(), &[]);
                let units = unit.accepted_units().join(", ");
                self.tr(
                    "I'm looking for %s in any of the supported units (%s).",
                    &[quantity.as_str(), units.as_str()],
                )
            }
            Some(ValueCategory::Number) => self.tr("Could you give me a number?", &[]),
            Some(ValueCategory::Date) => self.tr("Could you give me a date?", &[]),
            Some(ValueCategory::Time) => self.tr("Could you give me a time of day?", &[]),
            Some(ValueCategory::Picture) => self.tr("Could you upload a picture?", &[]),
            Some(ValueCategory::Location) => self.tr("Could you give me a place?", &[]),
            Some(ValueCategory::PhoneNumber) => {
                self.tr("Could you give me a phone number?", &[])
            }
            Some(ValueCategory::EmailAddress) => {
                self.tr("Could you give me an email address?", &[])
            }
            // Raw mode takes almost anything; this only happens on a button or upload
            Some(ValueCategory::RawString | ValueCategory::Password) => self.tr(
                "Which is interesting, because I'll take anything at all. Just type your mind!",
                &[],
            ),
            Some(ValueCategory::Command) => self.tr("I'm looking for a command.", &[]),
            Some(ValueCategory::Predicate) => self.tr("I'm looking for a filter", &[]),
            Some(ValueCategory::PermissionResponse | ValueCategory::More) => {
                self.tr("In fact, I'm not even sure what I asked. Sorry!", &[])
            }
        };
        self.reply(&text);
        self.session().send_ask_special(expecting);
    }

    /// Send the registered multiple-choice options again
    pub fn resend_choices(&self) {
        let expectation = self.expectation();
        for (index, choice) in expectation.choices().iter().enumerate() {
            self.session().send_choice(index, choice);
        }
    }

    /// Report which consumer holds the channel and what it expects.
    ///
    /// Diagnostic output, left untranslated.
    pub fn debug_report(&self) {
        let (turn, expecting) = self.describe_state();
        match turn {
            TurnState::Default => self.reply("I'm in the default state"),
            TurnState::InTurn => self.reply("I'm not in the default state"),
        }
        match expecting {
            None => self.reply("I'm not expecting anything"),
            Some(category) => self.reply(&format!("I'm expecting a {category}")),
        }
    }
}
