use serde::{Deserialize, Serialize};
use serde_json::Map as JsonMap;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::expr::managed::ManagedName;
use crate::schema::qid::safe_qid;

/// The answer data types a question can collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionDataType {
    TextSingleLine,
    TextMultiLine,
    Integer,
    YesNo,
    SingleChoice,
    MultiChoice,
    Email,
    Url,
}

impl QuestionDataType {
    pub fn label(&self) -> &'static str {
        match self {
            QuestionDataType::TextSingleLine => "A single line of text",
            QuestionDataType::TextMultiLine => "Multiple lines of text",
            QuestionDataType::Integer => "A whole number",
            QuestionDataType::YesNo => "Yes or no",
            QuestionDataType::SingleChoice => "A single choice from a list",
            QuestionDataType::MultiChoice => "One or more choices from a list",
            QuestionDataType::Email => "An email address",
            QuestionDataType::Url => "A website address",
        }
    }

    pub fn is_choice(&self) -> bool {
        matches!(
            self,
            QuestionDataType::SingleChoice | QuestionDataType::MultiChoice
        )
    }
}

impl std::fmt::Display for QuestionDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// How a question's conditions combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionsOperator {
    Any,
    #[default]
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpressionType {
    Condition,
    Validation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceItem {
    pub id: Uuid,
    pub key: String,
    pub label: String,
    pub order: usize,
}

/// Choice list attached 1:1 to a single- or multi-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: Uuid,
    pub items: Vec<DataSourceItem>,
}

impl DataSource {
    pub fn item_by_key(&self, key: &str) -> Option<&DataSourceItem> {
        self.items.iter().find(|item| item.key == key)
    }
}

/// Strong link from an expression to a referenced choice item, so schema
/// edits cannot silently invalidate the expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceItemReference {
    pub data_source_item_id: Uuid,
    pub key: String,
}

/// A condition or validation attached to a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: ExpressionType,
    pub statement: String,
    /// Named references bound during evaluation and the managed expression's
    /// stored parameters.
    pub context: JsonMap<String, JsonValue>,
    pub managed_name: Option<ManagedName>,
    pub referenced_question_ids: Vec<Uuid>,
    #[serde(default)]
    pub data_source_item_references: Vec<DataSourceItemReference>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guidance {
    pub heading: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub text: String,
    /// Short name used in validation error lists and exports.
    pub name: String,
    pub slug: String,
    pub order: usize,
    pub hint: Option<String>,
    pub guidance: Option<Guidance>,
    pub data_type: QuestionDataType,
    pub data_source: Option<DataSource>,
    #[serde(default)]
    pub expressions: Vec<Expression>,
    #[serde(default)]
    pub add_another: bool,
    #[serde(default)]
    pub conditions_operator: ConditionsOperator,
}

impl Question {
    pub fn safe_qid(&self) -> String {
        safe_qid(&self.id)
    }

    pub fn conditions(&self) -> impl Iterator<Item = &Expression> {
        self.expressions
            .iter()
            .filter(|e| e.kind == ExpressionType::Condition)
    }

    pub fn validations(&self) -> impl Iterator<Item = &Expression> {
        self.expressions
            .iter()
            .filter(|e| e.kind == ExpressionType::Validation)
    }
}

/// Display options for a group, set by the author.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresentationOptions {
    #[serde(default)]
    pub show_questions_on_the_same_page: bool,
    /// Questions whose answers make up the add-another summary line. When
    /// empty or stale, the summary falls back to all answered values.
    #[serde(default)]
    pub add_another_summary_line_question_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub order: usize,
    pub guidance: Option<Guidance>,
    #[serde(default)]
    pub add_another: bool,
    #[serde(default)]
    pub presentation_options: PresentationOptions,
    #[serde(default)]
    pub children: Vec<Component>,
}

impl Group {
    /// All descendant questions in document order.
    pub fn questions(&self) -> Vec<&Question> {
        let mut questions = Vec::new();
        collect_questions(&self.children, &mut questions);
        questions
    }
}

/// The recursive element of a form: a leaf question or a nested group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "component_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Component {
    Question(Question),
    Group(Group),
}

impl Component {
    pub fn id(&self) -> Uuid {
        match self {
            Component::Question(q) => q.id,
            Component::Group(g) => g.id,
        }
    }

    pub fn set_order(&mut self, order: usize) {
        match self {
            Component::Question(q) => q.order = order,
            Component::Group(g) => g.order = order,
        }
    }

    pub fn add_another(&self) -> bool {
        match self {
            Component::Question(q) => q.add_another,
            Component::Group(g) => g.add_another,
        }
    }

    pub fn as_question(&self) -> Option<&Question> {
        match self {
            Component::Question(q) => Some(q),
            Component::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Component::Group(g) => Some(g),
            Component::Question(_) => None,
        }
    }

    /// Descendant questions including self when a question.
    pub fn questions(&self) -> Vec<&Question> {
        match self {
            Component::Question(q) => vec![q],
            Component::Group(g) => g.questions(),
        }
    }

    /// True when this component or any descendant has `add_another` set.
    pub fn contains_add_another(&self) -> bool {
        if self.add_another() {
            return true;
        }
        match self {
            Component::Question(_) => false,
            Component::Group(g) => g.children.iter().any(Component::contains_add_another),
        }
    }
}

pub(crate) fn collect_questions<'a>(components: &'a [Component], out: &mut Vec<&'a Question>) {
    for component in components {
        match component {
            Component::Question(q) => out.push(q),
            Component::Group(g) => collect_questions(&g.children, out),
        }
    }
}
