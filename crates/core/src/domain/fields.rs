use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::task::TaskType;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Integer,
    Float,
    Boolean,
    Text,
}

impl FieldKind {
    /// Value a field falls back to when an incoming value cannot be coerced.
    pub fn default_value(self) -> FieldValue {
        match self {
            Self::Integer => FieldValue::Int(0),
            Self::Float => FieldValue::Float(0.0),
            Self::Boolean => FieldValue::Bool(false),
            Self::Text => FieldValue::Text(String::new()),
        }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "number",
            Self::Boolean => "boolean",
            Self::Text => "string",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub description: &'static str,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        Self { name, kind, description }
    }

    pub fn label(&self) -> String {
        title_case(&self.name.replace('_', " "))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

const TRUTHY_WORDS: [&str; 6] = ["yes", "true", "prior", "evict", "bad", "negative"];
// Negations win over truthy words so "no prior eviction" reads as false.
const FALSY_WORDS: [&str; 7] = ["no", "not", "false", "none", "never", "clean", "without"];

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            Self::Text(value) => parse_number(value),
            Self::Bool(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Converts the value into the declared kind, or `None` when that is impossible.
    pub fn coerce(&self, kind: FieldKind) -> Option<FieldValue> {
        match kind {
            FieldKind::Integer => {
                let number = self.as_f64()?;
                number.is_finite().then(|| FieldValue::Int(number.trunc() as i64))
            }
            FieldKind::Float => {
                let number = self.as_f64()?;
                number.is_finite().then_some(FieldValue::Float(number))
            }
            FieldKind::Boolean => match self {
                Self::Bool(value) => Some(Self::Bool(*value)),
                Self::Int(value) => Some(Self::Bool(*value != 0)),
                Self::Text(value) => parse_flag(value).map(Self::Bool),
                Self::Float(_) => None,
            },
            FieldKind::Text => match self {
                Self::Text(value) => Some(Self::Text(value.trim().to_string())),
                Self::Bool(_) | Self::Int(_) | Self::Float(_) => Some(Self::Text(self.to_string())),
            },
        }
    }

    /// Empty text and numeric zero count as missing. Any boolean is a filled value.
    pub fn is_filled(&self) -> bool {
        match self {
            Self::Text(value) => !value.trim().is_empty(),
            Self::Int(value) => *value != 0,
            Self::Float(value) => *value != 0.0,
            Self::Bool(_) => true,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(true) => f.write_str("Yes"),
            Self::Bool(false) => f.write_str("No"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => f.write_str(&format_number(*value)),
            Self::Text(value) => f.write_str(value),
        }
    }
}

/// Typed field values collected for one task, keyed by canonical field name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateFieldSet {
    values: BTreeMap<String, FieldValue>,
}

impl CandidateFieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.values.insert(name.into(), value)
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.values.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Keeps only the fields of `task`, coerced to their declared kinds.
    pub fn scoped_to(&self, task: TaskType) -> CandidateFieldSet {
        let mut scoped = CandidateFieldSet::new();
        for spec in task.required_fields() {
            if let Some(raw) = self.values.get(spec.name) {
                let value = raw.coerce(spec.kind).unwrap_or_else(|| spec.kind.default_value());
                scoped.values.insert(spec.name.to_string(), value);
            }
        }
        scoped
    }

    /// Merges `incoming` into the set for `task`.
    ///
    /// Values are coerced to the declared kind first (falling back to the kind's default)
    /// and only filled values overwrite, so a turn that omits a field never clears it.
    /// Returns the names of the fields whose value changed.
    pub fn merge_for_task(
        &mut self,
        task: TaskType,
        incoming: &CandidateFieldSet,
    ) -> Vec<&'static str> {
        let mut changed = Vec::new();
        for spec in task.required_fields() {
            let Some(raw) = incoming.values.get(spec.name) else {
                continue;
            };
            let value = raw.coerce(spec.kind).unwrap_or_else(|| spec.kind.default_value());
            if !value.is_filled() {
                continue;
            }
            if self.values.get(spec.name) != Some(&value) {
                self.values.insert(spec.name.to_string(), value);
                changed.push(spec.name);
            }
        }
        changed
    }

    pub fn is_filled(&self, name: &str) -> bool {
        self.values.get(name).is_some_and(FieldValue::is_filled)
    }

    pub fn missing(&self, task: TaskType) -> Vec<&'static str> {
        task.required_fields()
            .iter()
            .filter(|spec| !self.is_filled(spec.name))
            .map(|spec| spec.name)
            .collect()
    }

    pub fn is_complete(&self, task: TaskType) -> bool {
        self.missing(task).is_empty()
    }
}

impl FromIterator<(String, FieldValue)> for CandidateFieldSet {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self { values: iter.into_iter().collect() }
    }
}

/// Parses a loosely written number such as `£1,200`, `800 sq ft` or `3.5`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let mut digits = String::new();
    let mut started = false;
    for ch in raw.trim().chars() {
        if ch.is_ascii_digit() || ch == '.' || (ch == '-' && !started) {
            digits.push(ch);
            started = true;
        } else if ch == ',' && started {
            continue;
        } else if started {
            break;
        }
    }
    digits.parse::<f64>().ok()
}

fn parse_flag(raw: &str) -> Option<bool> {
    let lowered = raw.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }
    let negated = lowered
        .split(|ch: char| !ch.is_alphanumeric() && ch != '\'')
        .any(|token| FALSY_WORDS.contains(&token));
    if negated {
        return Some(false);
    }
    if TRUTHY_WORDS.iter().any(|word| lowered.contains(word)) {
        return Some(true);
    }
    None
}

/// Renders floats without a trailing `.0` when they are whole.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

pub fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
