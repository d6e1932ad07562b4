//! Semantic intents and the answer-category vocabulary
//!
//! Intents arrive already classified by an external parser. The dispatcher
//! only switches on the closed tag set defined here; it never inspects the
//! contents of a program or predicate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque handle to a parsed program, predicate, or permission rule.
///
/// Equality is by reference: two handles are equal only when they point at
/// the same parsed object.
#[derive(Debug, Clone)]
pub struct Ast(Arc<str>);

impl Ast {
    /// Wrap source text produced by the external parser.
    pub fn new(code: impl Into<Arc<str>>) -> Self {
        Self(code.into())
    }

    /// Source text of the parsed object
    pub fn code(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Ast {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Ast {}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Base units a measure can be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasureUnit {
    /// Time interval (milliseconds)
    Ms,
    /// Length (metres)
    M,
    /// Speed (metres per second)
    Mps,
    /// Weight (kilograms)
    Kg,
    /// Pressure (pascal)
    Pa,
    /// Temperature (celsius)
    C,
    /// Energy (kilocalories)
    Kcal,
    /// Size (bytes)
    Byte,
}

impl MeasureUnit {
    /// Canonical unit symbol
    pub fn symbol(self) -> &'static str {
        match self {
            MeasureUnit::Ms => "ms",
            MeasureUnit::M => "m",
            MeasureUnit::Mps => "mps",
            MeasureUnit::Kg => "kg",
            MeasureUnit::Pa => "Pa",
            MeasureUnit::C => "C",
            MeasureUnit::Kcal => "kcal",
            MeasureUnit::Byte => "byte",
        }
    }

    /// Message key describing the quantity ("a length", "a speed", ...).
    pub fn quantity(self) -> &'static str {
        match self {
            MeasureUnit::Ms => "a time interval",
            MeasureUnit::M => "a length",
            MeasureUnit::Mps => "a speed",
            MeasureUnit::Kg => "a weight",
            MeasureUnit::Pa => "a pressure",
            MeasureUnit::C => "a temperature",
            MeasureUnit::Kcal => "an energy",
            MeasureUnit::Byte => "a size",
        }
    }

    /// Units the user may answer in when this measure is expected.
    pub fn accepted_units(self) -> &'static [&'static str] {
        match self {
            MeasureUnit::Ms => &["ms", "s", "min", "h", "day", "week", "mon", "year"],
            MeasureUnit::M => &["m", "km", "mm", "cm", "mi", "in"],
            MeasureUnit::Mps => &["mps", "kmph", "mph"],
            MeasureUnit::Kg => &["kg", "g", "lb", "oz"],
            MeasureUnit::Pa => &["Pa", "bar", "psi", "mmHg", "inHg", "atm"],
            MeasureUnit::C => &["C", "F", "K"],
            MeasureUnit::Kcal => &["kcal", "kJ"],
            MeasureUnit::Byte => &[
                "byte", "KB", "KiB", "MB", "MiB", "GB", "GiB", "TB", "TiB",
            ],
        }
    }
}

/// Category of answer a dialog step can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueCategory {
    /// Confirmation
    YesNo,
    /// Index into a list of registered choices
    MultipleChoice,
    /// Plain number
    Number,
    /// Calendar date
    Date,
    /// Time of day
    Time,
    /// Uploaded picture
    Picture,
    /// Place
    Location,
    /// Phone number
    PhoneNumber,
    /// Email address
    EmailAddress,
    /// Free text, taken verbatim
    RawString,
    /// Free text that must not be echoed
    Password,
    /// A whole new command
    Command,
    /// A filter
    Predicate,
    /// Reply to a permission request
    PermissionResponse,
    /// "More results" or cancel
    More,
    /// Quantity in the given base unit
    Measure(MeasureUnit),
}

impl ValueCategory {
    /// Every category, with one entry per measure unit.
    pub const ALL: [ValueCategory; 23] = [
        ValueCategory::YesNo,
        ValueCategory::MultipleChoice,
        ValueCategory::Number,
        ValueCategory::Date,
        ValueCategory::Time,
        ValueCategory::Picture,
        ValueCategory::Location,
        ValueCategory::PhoneNumber,
        ValueCategory::EmailAddress,
        ValueCategory::RawString,
        ValueCategory::Password,
        ValueCategory::Command,
        ValueCategory::Predicate,
        ValueCategory::PermissionResponse,
        ValueCategory::More,
        ValueCategory::Measure(MeasureUnit::Ms),
        ValueCategory::Measure(MeasureUnit::M),
        ValueCategory::Measure(MeasureUnit::Mps),
        ValueCategory::Measure(MeasureUnit::Kg),
        ValueCategory::Measure(MeasureUnit::Pa),
        ValueCategory::Measure(MeasureUnit::C),
        ValueCategory::Measure(MeasureUnit::Kcal),
        ValueCategory::Measure(MeasureUnit::Byte),
    ];

    /// Whether this category puts the conversation surface in raw text mode
    pub fn is_raw(self) -> bool {
        matches!(self, ValueCategory::RawString | ValueCategory::Password)
    }

    /// Transport hint announced with `send_ask_special`.
    pub fn ask_special(category: Option<ValueCategory>) -> Option<&'static str> {
        let category = category?;
        Some(match category {
            ValueCategory::YesNo => "yesno",
            ValueCategory::MultipleChoice => "choice",
            ValueCategory::Number => "number",
            ValueCategory::Date => "date",
            ValueCategory::Time => "time",
            ValueCategory::Picture => "picture",
            ValueCategory::Location => "location",
            ValueCategory::PhoneNumber => "phone_number",
            ValueCategory::EmailAddress => "email_address",
            ValueCategory::RawString => "raw_string",
            ValueCategory::Password => "password",
            ValueCategory::Command => "command",
            ValueCategory::More => "more",
            ValueCategory::Predicate
            | ValueCategory::PermissionResponse
            | ValueCategory::Measure(_) => "generic",
        })
    }
}

impl fmt::Display for ValueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueCategory::Measure(unit) => write!(f, "Measure({})", unit.symbol()),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Value carried by an answer intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Yes/no answer
    Boolean(bool),
    /// Numeric answer, also used for multiple-choice indices
    Number(f64),
    /// Text answer
    String(String),
    /// Quantity with its unit as typed by the user
    Measure {
        /// Magnitude
        value: f64,
        /// Unit symbol
        unit: String,
    },
    /// Entity value such as a phone number, email, date or place
    Entity {
        /// Canonical value
        value: String,
        /// Human readable rendering
        display: Option<String>,
    },
}

impl Value {
    /// Numeric payload, if any
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Measure { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Index into a choice list, when this is a non-negative integer.
    pub fn as_index(&self) -> Option<usize> {
        let n = self.as_number()?;
        if n.fract() != 0.0 || n < 0.0 || !n.is_finite() {
            return None;
        }
        Some(n as usize)
    }
}

/// A classified user utterance.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// The parser could not make sense of the utterance
    Failed {
        /// Raw utterance, when known
        utterance: Option<String>,
    },
    /// Training feedback for the parser
    Train,
    /// Request for an internal state report
    Debug,
    /// Request for help
    Help,
    /// Wake word without a command
    WakeUp,
    /// Greeting
    Hello,
    /// Acknowledgment ("cool")
    Cool,
    /// Apology
    Sorry,
    /// Thanks
    ThankYou,
    /// Request for more results
    More,
    /// Explicit cancellation
    NeverMind,
    /// Bare "no"
    No,
    /// Bare "yes"
    Yes,
    /// Bare "maybe"
    Maybe,
    /// Go back one step
    Back,
    /// Empty command
    Empty,
    /// Typed answer
    Answer {
        /// Category the parser recognised
        category: ValueCategory,
        /// Answer payload
        value: Value,
    },
    /// Complete program
    Program(Ast),
    /// Request to list commands, optionally within a category
    CommandList {
        /// Restricting category
        category: Option<String>,
    },
    /// Filter
    Predicate(Ast),
    /// Permission rule
    PermissionRule(Ast),
}

impl Intent {
    /// Build a yes/no answer
    pub fn yes_no(value: bool) -> Self {
        Intent::Answer {
            category: ValueCategory::YesNo,
            value: Value::Boolean(value),
        }
    }

    /// Build a multiple-choice answer
    pub fn choice(index: f64) -> Self {
        Intent::Answer {
            category: ValueCategory::MultipleChoice,
            value: Value::Number(index),
        }
    }

    /// Category of a typed answer, `None` for every other intent
    pub fn answer_category(&self) -> Option<ValueCategory> {
        match self {
            Intent::Answer { category, .. } => Some(*category),
            _ => None,
        }
    }

    /// Payload of a typed answer
    pub fn answer_value(&self) -> Option<&Value> {
        match self {
            Intent::Answer { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Short tag used in logs
    pub fn tag(&self) -> &'static str {
        match self {
            Intent::Failed { .. } => "failed",
            Intent::Train => "train",
            Intent::Debug => "debug",
            Intent::Help => "help",
            Intent::WakeUp => "wakeup",
            Intent::Hello => "hello",
            Intent::Cool => "cool",
            Intent::Sorry => "sorry",
            Intent::ThankYou => "thankyou",
            Intent::More => "more",
            Intent::NeverMind => "nevermind",
            Intent::No => "no",
            Intent::Yes => "yes",
            Intent::Maybe => "maybe",
            Intent::Back => "back",
            Intent::Empty => "empty",
            Intent::Answer { .. } => "answer",
            Intent::Program(_) => "program",
            Intent::CommandList { .. } => "commandlist",
            Intent::Predicate(_) => "predicate",
            Intent::PermissionRule(_) => "permissionrule",
        }
    }
}
