//! The managed expression catalogue.
//!
//! Every condition or validation authored through the UI is an instance of a
//! catalogued template with a fixed parameter shape. Each template serialises
//! to a deterministic statement in the expression grammar, carries the named
//! references it needs in its `context`, and provides a human-readable
//! message with interpolation markers. The registry maps question data types
//! to the templates that support them.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Map as JsonMap;
use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

use crate::schema::component::{
    DataSourceItem, DataSourceItemReference, Expression, ExpressionType, QuestionDataType,
};
use crate::schema::qid::safe_qid;

/// Identifies a catalogued expression template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ManagedName {
    IsYes,
    IsNo,
    AnyOf,
    GreaterThan,
    LessThan,
    Between,
}

impl ManagedName {
    pub fn description(&self) -> &'static str {
        match self {
            ManagedName::IsYes => "Is yes",
            ManagedName::IsNo => "Is no",
            ManagedName::AnyOf => "Is one of",
            ManagedName::GreaterThan => "Is greater than",
            ManagedName::LessThan => "Is less than",
            ManagedName::Between => "Is between",
        }
    }
}

impl std::fmt::Display for ManagedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// A fully-parameterised managed expression, ready to serialise to statement,
/// context and message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "key", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ManagedExpression {
    IsYes {
        question_id: Uuid,
    },
    IsNo {
        question_id: Uuid,
    },
    AnyOf {
        question_id: Uuid,
        items: Vec<DataSourceItem>,
    },
    GreaterThan {
        question_id: Uuid,
        minimum_value: i64,
        #[serde(default)]
        inclusive: bool,
    },
    LessThan {
        question_id: Uuid,
        maximum_value: i64,
        #[serde(default)]
        inclusive: bool,
    },
    Between {
        question_id: Uuid,
        minimum_value: i64,
        maximum_value: i64,
        #[serde(default)]
        inclusive: bool,
    },
}

impl ManagedExpression {
    pub fn name(&self) -> ManagedName {
        match self {
            ManagedExpression::IsYes { .. } => ManagedName::IsYes,
            ManagedExpression::IsNo { .. } => ManagedName::IsNo,
            ManagedExpression::AnyOf { .. } => ManagedName::AnyOf,
            ManagedExpression::GreaterThan { .. } => ManagedName::GreaterThan,
            ManagedExpression::LessThan { .. } => ManagedName::LessThan,
            ManagedExpression::Between { .. } => ManagedName::Between,
        }
    }

    /// The question this expression reads.
    pub fn question_id(&self) -> Uuid {
        match self {
            ManagedExpression::IsYes { question_id }
            | ManagedExpression::IsNo { question_id }
            | ManagedExpression::AnyOf { question_id, .. }
            | ManagedExpression::GreaterThan { question_id, .. }
            | ManagedExpression::LessThan { question_id, .. }
            | ManagedExpression::Between { question_id, .. } => *question_id,
        }
    }

    /// Deterministic statement in the expression grammar.
    pub fn statement(&self) -> String {
        let qid = safe_qid(&self.question_id());
        match self {
            ManagedExpression::IsYes { .. } => format!("{qid} == True"),
            ManagedExpression::IsNo { .. } => format!("{qid} == False"),
            ManagedExpression::AnyOf { items, .. } => {
                let keys = items
                    .iter()
                    .map(|item| format!("'{}'", item.key.replace('\'', "\\'")))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{qid} in {{{keys}}}")
            }
            ManagedExpression::GreaterThan {
                minimum_value,
                inclusive,
                ..
            } => {
                let op = if *inclusive { ">=" } else { ">" };
                format!("{qid} {op} {minimum_value}")
            }
            ManagedExpression::LessThan {
                maximum_value,
                inclusive,
                ..
            } => {
                let op = if *inclusive { "<=" } else { "<" };
                format!("{qid} {op} {maximum_value}")
            }
            ManagedExpression::Between {
                minimum_value,
                maximum_value,
                inclusive,
                ..
            } => {
                let op = if *inclusive { "<=" } else { "<" };
                format!("{minimum_value} {op} {qid} {op} {maximum_value}")
            }
        }
    }

    /// Validation message shown when the expression evaluates false. Markers
    /// are resolved against the expression's context at interpolation time.
    pub fn message(&self) -> String {
        match self {
            ManagedExpression::IsYes { .. } => "The answer must be yes".to_string(),
            ManagedExpression::IsNo { .. } => "The answer must be no".to_string(),
            ManagedExpression::AnyOf { .. } => {
                "The answer must be one of: ((allowed_labels))".to_string()
            }
            ManagedExpression::GreaterThan { inclusive, .. } => {
                if *inclusive {
                    "The answer must be ((minimum_value)) or more".to_string()
                } else {
                    "The answer must be more than ((minimum_value))".to_string()
                }
            }
            ManagedExpression::LessThan { inclusive, .. } => {
                if *inclusive {
                    "The answer must be ((maximum_value)) or less".to_string()
                } else {
                    "The answer must be less than ((maximum_value))".to_string()
                }
            }
            ManagedExpression::Between { .. } => {
                "The answer must be between ((minimum_value)) and ((maximum_value))".to_string()
            }
        }
    }

    /// The context map stored on the built expression: the template's own
    /// parameters plus any flattened references the message interpolates.
    pub fn context(&self) -> JsonMap<String, JsonValue> {
        let mut context = match serde_json::to_value(self) {
            Ok(JsonValue::Object(map)) => map,
            _ => JsonMap::new(),
        };
        if let ManagedExpression::AnyOf { items, .. } = self {
            context.insert(
                "allowed_keys".to_string(),
                json!(items.iter().map(|i| i.key.clone()).collect::<Vec<_>>()),
            );
            context.insert(
                "allowed_labels".to_string(),
                json!(items.iter().map(|i| i.label.clone()).collect::<Vec<_>>()),
            );
        }
        context
    }

    pub fn data_source_item_references(&self) -> Vec<DataSourceItemReference> {
        match self {
            ManagedExpression::AnyOf { items, .. } => items
                .iter()
                .map(|item| DataSourceItemReference {
                    data_source_item_id: item.id,
                    key: item.key.clone(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Question data types this template can be attached to.
    pub fn supported_data_types(&self) -> &'static [QuestionDataType] {
        supported_data_types(self.name())
    }

    /// Builds the persistable expression record.
    pub fn to_expression(&self, kind: ExpressionType) -> Expression {
        Expression {
            id: Uuid::new_v4(),
            kind,
            statement: self.statement(),
            context: self.context(),
            managed_name: Some(self.name()),
            referenced_question_ids: vec![self.question_id()],
            data_source_item_references: self.data_source_item_references(),
        }
    }

    /// Reconstructs the template from a stored expression's context. Returns
    /// `None` for non-managed expressions or unreadable context.
    pub fn from_expression(expression: &Expression) -> Option<ManagedExpression> {
        expression.managed_name?;
        serde_json::from_value(JsonValue::Object(expression.context.clone())).ok()
    }
}

static REGISTRY: Lazy<HashMap<ManagedName, &'static [QuestionDataType]>> = Lazy::new(|| {
    let mut registry: HashMap<ManagedName, &'static [QuestionDataType]> = HashMap::new();
    registry.insert(ManagedName::IsYes, &[QuestionDataType::YesNo]);
    registry.insert(ManagedName::IsNo, &[QuestionDataType::YesNo]);
    registry.insert(ManagedName::AnyOf, &[QuestionDataType::SingleChoice]);
    registry.insert(ManagedName::GreaterThan, &[QuestionDataType::Integer]);
    registry.insert(ManagedName::LessThan, &[QuestionDataType::Integer]);
    registry.insert(ManagedName::Between, &[QuestionDataType::Integer]);
    registry
});

pub fn supported_data_types(name: ManagedName) -> &'static [QuestionDataType] {
    REGISTRY.get(&name).copied().unwrap_or(&[])
}

/// Templates available for a question data type, used by the authoring UI to
/// populate "add condition" / "add validation" choices.
pub fn managed_expressions_for(data_type: QuestionDataType) -> Vec<ManagedName> {
    REGISTRY
        .iter()
        .filter(|(_, types)| types.contains(&data_type))
        .map(|(name, _)| *name)
        .collect()
}

pub fn supports(name: ManagedName, data_type: QuestionDataType) -> bool {
    supported_data_types(name).contains(&data_type)
}
