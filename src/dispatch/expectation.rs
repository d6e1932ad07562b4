//! Expectation slot and generic intent classification
//!
//! Before a user intent reaches a task script, [`classify`] decides whether
//! the dispatcher can deal with it on its own (small talk, cancellation,
//! answers of the wrong shape) or must deliver it. Classification is pure;
//! the dispatcher carries out the resulting [`Verdict`].

use super::intent::{Intent, ValueCategory};
use super::session::Choice;

/// What the active dialog step is waiting for
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expectation {
    category: Option<ValueCategory>,
    choices: Vec<Choice>,
    raw: bool,
}

impl Expectation {
    /// Expected answer category, `None` when nothing is expected
    pub fn category(&self) -> Option<ValueCategory> {
        self.category
    }

    /// Choices registered for a multiple-choice question
    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    /// Whether the surface should accept free text verbatim
    pub fn is_raw(&self) -> bool {
        self.raw
    }

    /// Whether anything at all is expected
    pub fn is_expecting(&self) -> bool {
        self.category.is_some()
    }

    pub(crate) fn set(&mut self, category: Option<ValueCategory>) {
        self.category = category;
        self.choices.clear();
        self.raw = category.is_some_and(ValueCategory::is_raw);
    }

    pub(crate) fn set_choices(&mut self, choices: Vec<Choice>) {
        self.category = Some(ValueCategory::MultipleChoice);
        self.choices = choices;
        self.raw = false;
    }

    pub(crate) fn clear(&mut self) {
        self.set(None);
    }
}

/// Canned reply the dispatcher renders for a fully handled intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// Classification failed while something was expected
    DidNotUnderstand,
    /// Report internal state
    DebugReport,
    /// Re-describe what is expected
    LookingFor,
    /// Consume without replying
    Ignore,
    /// Small-talk reply with the given message key
    SmallTalk(&'static str),
    /// A bare "yes" where a typed answer was expected
    YesWhat,
    /// A typed answer of the wrong category
    Unexpected,
    /// A multiple-choice index outside the registered choices
    InvalidChoice,
}

/// Outcome of classifying a user intent against the current expectation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Consumed by the dispatcher
    Handled(Reaction),
    /// Cancel the current wait and consume the intent, optionally apologising
    Abort {
        /// Render the "couldn't help" message before cancelling
        apologize: bool,
    },
    /// Cancel the current wait, then deliver the intent once control is back
    SwitchSubject,
    /// Deliver to the authoritative queue
    PassThrough,
}

/// Small-talk intents answered identically in every dialog state.
fn small_talk(intent: &Intent) -> Option<&'static str> {
    match intent {
        Intent::Hello => Some("Hi!"),
        Intent::Cool => Some("I know, right?"),
        Intent::Sorry => Some("No need to be sorry."),
        Intent::ThankYou => Some("At your service."),
        _ => None,
    }
}

/// Intent shapes a dialog step accepts even though they are not typed answers.
fn accepts_shape(expected: ValueCategory, intent: &Intent) -> bool {
    match expected {
        ValueCategory::Command => matches!(
            intent,
            Intent::Program(_)
                | Intent::CommandList { .. }
                | Intent::Back
                | Intent::More
                | Intent::Empty
        ),
        ValueCategory::Predicate => {
            matches!(intent, Intent::Predicate(_) | Intent::Back | Intent::More)
        }
        ValueCategory::PermissionResponse => matches!(
            intent,
            Intent::Predicate(_)
                | Intent::PermissionRule(_)
                | Intent::More
                | Intent::Yes
                | Intent::Maybe
                | Intent::Back
        ),
        ValueCategory::Password => {
            intent.answer_category() == Some(ValueCategory::RawString)
        }
        _ => false,
    }
}

/// Classify `intent` against `expectation`.
///
/// Rules apply in priority order: parse failures, training, debug, help,
/// wake-up, small talk, the "more results" prompt, explicit cancellation,
/// category mismatches, and finally multiple-choice bounds.
pub fn classify(expectation: &Expectation, intent: &Intent) -> Verdict {
    let expected = expectation.category();

    match intent {
        Intent::Failed { .. } => {
            return if expected.is_some() {
                Verdict::Handled(Reaction::DidNotUnderstand)
            } else {
                Verdict::PassThrough
            };
        }
        Intent::Train => return Verdict::SwitchSubject,
        Intent::Debug => return Verdict::Handled(Reaction::DebugReport),
        Intent::Help if expected.is_some() => return Verdict::Handled(Reaction::LookingFor),
        Intent::WakeUp => return Verdict::Handled(Reaction::Ignore),
        _ => {}
    }

    if let Some(key) = small_talk(intent) {
        return Verdict::Handled(Reaction::SmallTalk(key));
    }

    if expected == Some(ValueCategory::More) {
        return match intent {
            Intent::More => Verdict::PassThrough,
            Intent::NeverMind | Intent::No => Verdict::Abort { apologize: false },
            _ => Verdict::SwitchSubject,
        };
    }

    if matches!(intent, Intent::NeverMind) {
        return Verdict::Abort { apologize: true };
    }

    let Some(expected) = expected else {
        return Verdict::PassThrough;
    };

    if intent.answer_category() != Some(expected) {
        if matches!(intent, Intent::No) {
            return Verdict::Abort { apologize: true };
        }
        if accepts_shape(expected, intent) {
            return Verdict::PassThrough;
        }
        return match intent {
            Intent::Yes => Verdict::Handled(Reaction::YesWhat),
            Intent::Answer { .. } => Verdict::Handled(Reaction::Unexpected),
            _ => Verdict::SwitchSubject,
        };
    }

    if expected == ValueCategory::MultipleChoice {
        let in_range = intent
            .answer_value()
            .and_then(|value| value.as_index())
            .is_some_and(|index| index < expectation.choices().len());
        if !in_range {
            return Verdict::Handled(Reaction::InvalidChoice);
        }
    }

    Verdict::PassThrough
}
