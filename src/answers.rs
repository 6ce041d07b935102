//! Typed answer values, one variant per question data type, with the four
//! projections the rest of the system consumes: `storage` (JSON persisted in
//! the submission), `form` (native prefill value), `expression` (what the
//! expression engine sees) and `text_export` (CSV/PDF rendering).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use serde_json::json;

use crate::error::AnswerParseError;
use crate::expr::value::Value;
use crate::schema::component::{DataSource, QuestionDataType};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());
static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").unwrap());

/// One selected choice, stored with both key and label so exports do not need
/// the schema version at hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceValue {
    pub key: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    TextSingleLine(String),
    TextMultiLine(String),
    Integer(i64),
    YesNo(bool),
    SingleChoice(ChoiceValue),
    MultiChoice(Vec<ChoiceValue>),
    Email(String),
    Url(String),
}

impl Answer {
    pub fn data_type(&self) -> QuestionDataType {
        match self {
            Answer::TextSingleLine(_) => QuestionDataType::TextSingleLine,
            Answer::TextMultiLine(_) => QuestionDataType::TextMultiLine,
            Answer::Integer(_) => QuestionDataType::Integer,
            Answer::YesNo(_) => QuestionDataType::YesNo,
            Answer::SingleChoice(_) => QuestionDataType::SingleChoice,
            Answer::MultiChoice(_) => QuestionDataType::MultiChoice,
            Answer::Email(_) => QuestionDataType::Email,
            Answer::Url(_) => QuestionDataType::Url,
        }
    }

    /// JSON-serialisable projection persisted inside `Submission.data`.
    pub fn to_storage(&self) -> JsonValue {
        match self {
            Answer::TextSingleLine(s)
            | Answer::TextMultiLine(s)
            | Answer::Email(s)
            | Answer::Url(s) => json!(s),
            Answer::Integer(i) => json!(i),
            Answer::YesNo(b) => json!(b),
            Answer::SingleChoice(choice) => json!({ "key": choice.key, "label": choice.label }),
            Answer::MultiChoice(choices) => json!({ "choices": choices }),
        }
    }

    /// Reconstructs the typed answer from its storage projection.
    pub fn from_storage(
        data_type: QuestionDataType,
        stored: &JsonValue,
    ) -> Result<Answer, AnswerParseError> {
        let shape_error = |detail: &str| AnswerParseError::InvalidStoredShape {
            data_type: data_type.label().to_string(),
            detail: detail.to_string(),
        };

        match data_type {
            QuestionDataType::TextSingleLine => stored
                .as_str()
                .map(|s| Answer::TextSingleLine(s.to_string()))
                .ok_or_else(|| shape_error("expected a string")),
            QuestionDataType::TextMultiLine => stored
                .as_str()
                .map(|s| Answer::TextMultiLine(s.to_string()))
                .ok_or_else(|| shape_error("expected a string")),
            QuestionDataType::Email => stored
                .as_str()
                .map(|s| Answer::Email(s.to_string()))
                .ok_or_else(|| shape_error("expected a string")),
            QuestionDataType::Url => stored
                .as_str()
                .map(|s| Answer::Url(s.to_string()))
                .ok_or_else(|| shape_error("expected a string")),
            QuestionDataType::Integer => stored
                .as_i64()
                .map(Answer::Integer)
                .ok_or_else(|| shape_error("expected an integer")),
            QuestionDataType::YesNo => stored
                .as_bool()
                .map(Answer::YesNo)
                .ok_or_else(|| shape_error("expected a boolean")),
            QuestionDataType::SingleChoice => {
                let choice: ChoiceValue = serde_json::from_value(stored.clone())
                    .map_err(|_| shape_error("expected {key, label}"))?;
                Ok(Answer::SingleChoice(choice))
            }
            QuestionDataType::MultiChoice => {
                let choices = stored
                    .get("choices")
                    .ok_or_else(|| shape_error("expected {choices: [...]}"))?;
                let choices: Vec<ChoiceValue> = serde_json::from_value(choices.clone())
                    .map_err(|_| shape_error("expected {choices: [{key, label}]}"))?;
                Ok(Answer::MultiChoice(choices))
            }
        }
    }

    /// Native value used to prefill a form input: keys for choice answers,
    /// the storage value otherwise.
    pub fn to_form(&self) -> JsonValue {
        match self {
            Answer::SingleChoice(choice) => json!(choice.key),
            Answer::MultiChoice(choices) => {
                json!(choices.iter().map(|c| c.key.clone()).collect::<Vec<_>>())
            }
            other => other.to_storage(),
        }
    }

    /// The value the expression engine sees: keys for choice answers, the raw
    /// value otherwise.
    pub fn to_expression_value(&self) -> Value {
        match self {
            Answer::TextSingleLine(s)
            | Answer::TextMultiLine(s)
            | Answer::Email(s)
            | Answer::Url(s) => Value::Str(s.clone()),
            Answer::Integer(i) => Value::Int(*i),
            Answer::YesNo(b) => Value::Bool(*b),
            Answer::SingleChoice(choice) => Value::Str(choice.key.clone()),
            Answer::MultiChoice(choices) => {
                Value::List(choices.iter().map(|c| Value::Str(c.key.clone())).collect())
            }
        }
    }

    /// Rendering for CSV/PDF export.
    pub fn to_text_export(&self) -> String {
        match self {
            Answer::TextSingleLine(s)
            | Answer::TextMultiLine(s)
            | Answer::Email(s)
            | Answer::Url(s) => s.clone(),
            Answer::Integer(i) => i.to_string(),
            Answer::YesNo(true) => "Yes".to_string(),
            Answer::YesNo(false) => "No".to_string(),
            Answer::SingleChoice(choice) => choice.label.clone(),
            Answer::MultiChoice(choices) => choices
                .iter()
                .map(|c| c.label.clone())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Parses raw form input (already split into one or more submitted
    /// values) into a typed answer. Choice answers resolve their labels from
    /// the question's data source; unknown keys are rejected.
    pub fn parse_input(
        data_type: QuestionDataType,
        values: &[String],
        data_source: Option<&DataSource>,
    ) -> Result<Answer, AnswerParseError> {
        let first = || -> Result<&str, AnswerParseError> {
            let value = values.first().map(String::as_str).unwrap_or("").trim();
            if value.is_empty() {
                Err(AnswerParseError::MissingValue)
            } else {
                Ok(value)
            }
        };

        match data_type {
            QuestionDataType::TextSingleLine => Ok(Answer::TextSingleLine(first()?.to_string())),
            QuestionDataType::TextMultiLine => Ok(Answer::TextMultiLine(first()?.to_string())),
            QuestionDataType::Integer => {
                let raw = first()?;
                // Accept digit grouping ("1,000") as entered in gov forms.
                let cleaned: String = raw.chars().filter(|c| *c != ',' && *c != ' ').collect();
                cleaned
                    .parse::<i64>()
                    .map(Answer::Integer)
                    .map_err(|_| AnswerParseError::InvalidInteger(raw.to_string()))
            }
            QuestionDataType::YesNo => match first()?.to_ascii_lowercase().as_str() {
                "yes" | "true" => Ok(Answer::YesNo(true)),
                "no" | "false" => Ok(Answer::YesNo(false)),
                other => Err(AnswerParseError::InvalidYesNo(other.to_string())),
            },
            QuestionDataType::Email => {
                let raw = first()?;
                if EMAIL_RE.is_match(raw) {
                    Ok(Answer::Email(raw.to_string()))
                } else {
                    Err(AnswerParseError::InvalidEmail(raw.to_string()))
                }
            }
            QuestionDataType::Url => {
                let raw = first()?;
                if URL_RE.is_match(raw) {
                    Ok(Answer::Url(raw.to_string()))
                } else {
                    Err(AnswerParseError::InvalidUrl(raw.to_string()))
                }
            }
            QuestionDataType::SingleChoice => {
                let key = first()?;
                let choice = resolve_choice(key, data_source)?;
                Ok(Answer::SingleChoice(choice))
            }
            QuestionDataType::MultiChoice => {
                if values.is_empty() {
                    return Err(AnswerParseError::MissingValue);
                }
                let choices = values
                    .iter()
                    .map(|key| resolve_choice(key.trim(), data_source))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Answer::MultiChoice(choices))
            }
        }
    }
}

fn resolve_choice(
    key: &str,
    data_source: Option<&DataSource>,
) -> Result<ChoiceValue, AnswerParseError> {
    let item = data_source
        .and_then(|ds| ds.item_by_key(key))
        .ok_or_else(|| AnswerParseError::UnknownChoiceKey(key.to_string()))?;
    Ok(ChoiceValue {
        key: item.key.clone(),
        label: item.label.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::component::DataSourceItem;
    use uuid::Uuid;

    fn colours() -> DataSource {
        DataSource {
            id: Uuid::new_v4(),
            items: vec![
                DataSourceItem {
                    id: Uuid::new_v4(),
                    key: "red".into(),
                    label: "Red".into(),
                    order: 0,
                },
                DataSourceItem {
                    id: Uuid::new_v4(),
                    key: "blue".into(),
                    label: "Blue".into(),
                    order: 1,
                },
            ],
        }
    }

    #[test]
    fn storage_round_trip_for_scalars() {
        let answer = Answer::Integer(42);
        let stored = answer.to_storage();
        assert_eq!(
            Answer::from_storage(QuestionDataType::Integer, &stored).unwrap(),
            answer
        );
    }

    #[test]
    fn single_choice_stores_key_and_label() {
        let ds = colours();
        let answer =
            Answer::parse_input(QuestionDataType::SingleChoice, &["red".into()], Some(&ds))
                .unwrap();
        assert_eq!(answer.to_storage(), serde_json::json!({"key": "red", "label": "Red"}));
        assert_eq!(answer.to_form(), serde_json::json!("red"));
        assert_eq!(answer.to_expression_value(), Value::Str("red".into()));
        assert_eq!(answer.to_text_export(), "Red");
    }

    #[test]
    fn multi_choice_exports_newline_joined_labels() {
        let ds = colours();
        let answer = Answer::parse_input(
            QuestionDataType::MultiChoice,
            &["red".into(), "blue".into()],
            Some(&ds),
        )
        .unwrap();
        assert_eq!(answer.to_text_export(), "Red\nBlue");
        assert_eq!(
            answer.to_expression_value(),
            Value::List(vec![Value::Str("red".into()), Value::Str("blue".into())])
        );
    }

    #[test]
    fn unknown_choice_key_is_rejected() {
        let ds = colours();
        let err = Answer::parse_input(QuestionDataType::SingleChoice, &["green".into()], Some(&ds))
            .unwrap_err();
        assert_eq!(err, AnswerParseError::UnknownChoiceKey("green".into()));
    }

    #[test]
    fn integer_accepts_digit_grouping() {
        let answer =
            Answer::parse_input(QuestionDataType::Integer, &["1,000".into()], None).unwrap();
        assert_eq!(answer, Answer::Integer(1000));
    }

    #[test]
    fn invalid_email_is_rejected() {
        assert!(matches!(
            Answer::parse_input(QuestionDataType::Email, &["not-an-email".into()], None),
            Err(AnswerParseError::InvalidEmail(_))
        ));
        assert!(
            Answer::parse_input(QuestionDataType::Email, &["a@b.co".into()], None).is_ok()
        );
    }

    #[test]
    fn yes_no_projections() {
        let answer = Answer::YesNo(true);
        assert_eq!(answer.to_storage(), serde_json::json!(true));
        assert_eq!(answer.to_text_export(), "Yes");
        assert_eq!(answer.to_expression_value(), Value::Bool(true));
    }
}
