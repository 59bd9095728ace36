use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{AnswerOptionId, QuestionId};

/// Answer state of one touched question, multiple-choice or free-response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_answer_id: Option<AnswerOptionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frq_answer_text: Option<String>,
}

impl AnswerEntry {
    #[must_use]
    pub fn choice(option: impl Into<AnswerOptionId>) -> Self {
        Self {
            selected_answer_id: Some(option.into()),
            frq_answer_text: None,
        }
    }

    #[must_use]
    pub fn free_response(text: impl Into<String>) -> Self {
        Self {
            selected_answer_id: None,
            frq_answer_text: Some(text.into()),
        }
    }
}

/// Every question the user has touched, keyed by question id.
pub type Answers = BTreeMap<QuestionId, AnswerEntry>;

/// Questions considered answered. Maintained independently of [`Answers`].
pub type AnsweredSet = BTreeSet<QuestionId>;

/// Decode an answers map, dropping entries that are not answer objects.
///
/// Returns `None` when the value is not a map at all.
#[must_use]
pub fn answers_from_value(value: &Value) -> Option<Answers> {
    let object = value.as_object()?;
    let answers = object
        .iter()
        .filter_map(|(key, entry)| {
            let entry = AnswerEntry::deserialize(entry).ok()?;
            Some((QuestionId::new(key.as_str()), entry))
        })
        .collect();
    Some(answers)
}

/// The on-disk shapes `answeredQuestions` has had over time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AnsweredQuestionsShape {
    /// `["q1", "q2"]`, or numeric ids `[1, 2]`.
    List(Vec<Value>),
    /// A serialized set wrapper: `{ "dataType": "Set", "value": [...] }`.
    SetWrapper {
        #[serde(rename = "dataType")]
        data_type: String,
        value: Vec<Value>,
    },
    /// An object whose keys are the ids: `{ "q1": true, "q2": 1 }`.
    Keyed(serde_json::Map<String, Value>),
}

impl AnsweredQuestionsShape {
    /// Classify a raw JSON value into one of the known shapes.
    ///
    /// # Errors
    ///
    /// Returns an error if the value matches none of them (e.g. a bare string).
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Normalize any shape into a set of string ids.
    #[must_use]
    pub fn into_set(self) -> AnsweredSet {
        match self {
            AnsweredQuestionsShape::List(items)
            | AnsweredQuestionsShape::SetWrapper { value: items, .. } => {
                items.iter().filter_map(question_id_from_value).collect()
            }
            AnsweredQuestionsShape::Keyed(map) => map
                .into_iter()
                .filter(|(_, marker)| !matches!(marker, Value::Null | Value::Bool(false)))
                .map(|(key, _)| QuestionId::new(key))
                .collect(),
        }
    }
}

/// Tolerant decode of `answeredQuestions`: unknown shapes read as empty.
#[must_use]
pub fn answered_from_value(value: Value) -> AnsweredSet {
    AnsweredQuestionsShape::from_value(value)
        .map(AnsweredQuestionsShape::into_set)
        .unwrap_or_default()
}

fn question_id_from_value(value: &Value) -> Option<QuestionId> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(QuestionId::new(s.as_str())),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(QuestionId::new(i.to_string()))
            } else if let Some(u) = n.as_u64() {
                Some(QuestionId::new(u.to_string()))
            } else {
                // 3.0 -> "3"; anything with a fraction is not an id.
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.is_finite())
                    .map(|f| QuestionId::new(format!("{f:.0}")))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(raw: &[&str]) -> AnsweredSet {
        raw.iter().map(|s| QuestionId::new(*s)).collect()
    }

    #[test]
    fn numeric_list_becomes_string_ids() {
        let set = answered_from_value(json!([3, 1, 2, 2]));
        assert_eq!(set, ids(&["1", "2", "3"]));
    }

    #[test]
    fn mixed_list_skips_garbage() {
        let set = answered_from_value(json!(["q1", null, 7, {"x": 1}, "", 4.0]));
        assert_eq!(set, ids(&["q1", "7", "4"]));
    }

    #[test]
    fn set_wrapper_is_unwrapped() {
        let shape =
            AnsweredQuestionsShape::from_value(json!({"dataType": "Set", "value": ["a", "b"]}))
                .unwrap();
        assert!(matches!(shape, AnsweredQuestionsShape::SetWrapper { .. }));
        assert_eq!(shape.into_set(), ids(&["a", "b"]));
    }

    #[test]
    fn keyed_object_uses_truthy_keys() {
        let set = answered_from_value(json!({"q1": true, "q2": false, "q3": 1, "q4": null}));
        assert_eq!(set, ids(&["q1", "q3"]));
    }

    #[test]
    fn unknown_shape_reads_as_empty() {
        assert!(answered_from_value(json!("q1,q2")).is_empty());
        assert!(answered_from_value(Value::Null).is_empty());
    }

    #[test]
    fn answers_skip_malformed_entries() {
        let answers = answers_from_value(&json!({
            "q1": {"selectedAnswerId": 12},
            "q2": {"frqAnswerText": "photosynthesis"},
            "q3": "not an entry",
        }))
        .unwrap();
        assert_eq!(answers.len(), 2);
        assert_eq!(
            answers[&QuestionId::new("q1")],
            AnswerEntry::choice("12")
        );
        assert_eq!(
            answers[&QuestionId::new("q2")],
            AnswerEntry::free_response("photosynthesis")
        );
    }

    #[test]
    fn answers_require_an_object() {
        assert!(answers_from_value(&json!([1, 2])).is_none());
    }
}
