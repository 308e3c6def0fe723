//! Submission translation: answer sets → record-service field records.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

/// A posted survey submission.
///
/// `surveyType` and `form` are required by the handler but optional here so
/// their absence yields a 400 with a descriptive message instead of a
/// deserialization rejection. `meta` carries the prefill identifiers the
/// form echoes back; it is logged, never forwarded.
#[derive(Debug, Clone, Deserialize)]
pub struct Submission {
    #[serde(rename = "surveyType")]
    pub survey_type: Option<String>,
    pub form: Option<Map<String, Value>>,
    #[serde(default)]
    pub meta: Option<Value>,
}

/// Coerce one raw answer for the record service. Pure-digit strings become
/// integers and missing or empty values become null; any other string
/// stays text, and non-string JSON values pass through untouched.
pub fn coerce_answer(raw: Option<&Value>) -> Value {
    match raw {
        None | Some(Value::Null) => Value::Null,
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Value::Null
            } else if trimmed.chars().all(|c| c.is_ascii_digit()) {
                match trimmed.parse::<i64>() {
                    Ok(n) => Value::from(n),
                    Err(_) => Value::from(trimmed),
                }
            } else {
                Value::from(trimmed)
            }
        }
        Some(other) => other.clone(),
    }
}

/// Translate a form's answers through the field map, producing the
/// `{fid: {"value": v}}` object the records API expects.
///
/// Iterates the field map's keys, so form keys with no configured field id
/// are dropped and mapped questions the form omitted become nulls.
pub fn to_record_fields(form: &Map<String, Value>, fields: &BTreeMap<String, String>) -> Value {
    let mut record = Map::new();
    for (question, field_id) in fields {
        let value = coerce_answer(form.get(question));
        record.insert(field_id.clone(), serde_json::json!({ "value": value }));
    }
    Value::Object(record)
}
