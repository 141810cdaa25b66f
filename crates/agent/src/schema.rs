use landlord_core::domain::fields::{CandidateFieldSet, FieldKind, FieldSpec, FieldValue};
use landlord_core::domain::task::TaskType;
use serde_json::Value;
use thiserror::Error;

/// The record shape a completion reply must follow for one task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSchema {
    task: TaskType,
}

impl FieldSchema {
    pub fn for_task(task: TaskType) -> Self {
        Self { task }
    }

    pub fn task(&self) -> TaskType {
        self.task
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        self.task.required_fields()
    }

    /// Instructions appended to extraction prompts.
    pub fn format_instructions(&self) -> String {
        let mut instructions = String::from(
            "Return only a JSON object, with no prose and no code fences, containing exactly \
             these keys:\n",
        );
        for spec in self.fields() {
            instructions.push_str(&format!(
                "- \"{}\" ({}): {}\n",
                spec.name,
                spec.kind.type_name(),
                spec.description
            ));
        }
        instructions.push_str(
            "If a value is not mentioned use an empty string for text, 0 for numbers and false \
             for booleans.",
        );
        instructions
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("reply is not valid JSON: {0}")]
    NotJson(String),
    #[error("reply is not a JSON object")]
    NotAnObject,
    #[error("record is missing field `{0}`")]
    MissingField(String),
    #[error("field `{field}` is not a valid {expected}")]
    TypeMismatch { field: String, expected: &'static str },
}

pub trait SchemaParser: Send + Sync {
    fn parse(&self, text: &str, schema: &FieldSchema) -> Result<CandidateFieldSet, ParseError>;
}

/// Strict JSON record parser. Every declared field must be present and convertible.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonSchemaParser;

impl SchemaParser for JsonSchemaParser {
    fn parse(&self, text: &str, schema: &FieldSchema) -> Result<CandidateFieldSet, ParseError> {
        let body = extract_json_object(text)
            .ok_or_else(|| ParseError::NotJson("no JSON object found".to_owned()))?;
        let value: Value =
            serde_json::from_str(body).map_err(|error| ParseError::NotJson(error.to_string()))?;
        let Value::Object(object) = value else {
            return Err(ParseError::NotAnObject);
        };

        let mut record = CandidateFieldSet::new();
        for spec in schema.fields() {
            let raw = object
                .get(spec.name)
                .or_else(|| object.get(&spec.name.replace(' ', "_")))
                .filter(|raw| !raw.is_null())
                .ok_or_else(|| ParseError::MissingField(spec.name.to_owned()))?;
            let value = json_to_field_value(raw)
                .and_then(|value| coerce_lenient(&value, spec.kind))
                .ok_or_else(|| ParseError::TypeMismatch {
                    field: spec.name.to_owned(),
                    expected: spec.kind.type_name(),
                })?;
            record.insert(spec.name, value);
        }
        Ok(record)
    }
}

/// Text between the first `{` and the last `}`, ignoring fences and prose around it.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn json_to_field_value(raw: &Value) -> Option<FieldValue> {
    match raw {
        Value::Bool(flag) => Some(FieldValue::Bool(*flag)),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => Some(FieldValue::Int(integer)),
            None => number.as_f64().map(FieldValue::Float),
        },
        Value::String(text) => Some(FieldValue::Text(text.clone())),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

// Empty strings stand for "not mentioned" and are kept as the kind's default.
fn coerce_lenient(value: &FieldValue, kind: FieldKind) -> Option<FieldValue> {
    if let FieldValue::Text(text) = value {
        if text.trim().is_empty() {
            return Some(kind.default_value());
        }
    }
    value.coerce(kind)
}
