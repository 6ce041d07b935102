//! Error taxonomy for the collection runtime.
//!
//! The core never catches its own errors; callers map each kind to a
//! user-visible flow. Authoring errors carry the offending field name so the
//! caller can attach inline messages.

use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use crate::submission::events::SubmissionStatus;

/// Failures raised while evaluating or parsing expressions.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExpressionError {
    /// The expression source uses a construct outside the whitelisted grammar.
    #[error("expression uses a disallowed construct: {0}")]
    DisallowedExpression(String),

    /// An identifier in the expression resolved to nothing. Conditions treat
    /// this as false (fail closed); validations log and skip (fail open).
    #[error("undefined variable in expression: {0}")]
    UndefinedVariableInExpression(String),

    /// The expression evaluated successfully but the result is unusable,
    /// e.g. a non-boolean final value or mismatched operand types.
    #[error("invalid evaluation result: {0}")]
    InvalidEvaluationResult(String),
}

/// Failures raised by the schema authoring operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AuthoringError {
    /// A unique value within the parent scope was reused.
    #[error("duplicate value for {field_name}: {value}")]
    DuplicateValue { field_name: String, value: String },

    /// A data source item still referenced by an expression cannot be removed.
    #[error("data source item {item_id} is referenced by expression {expression_id}")]
    DataSourceItemReferenceDependency {
        item_id: Uuid,
        expression_id: Uuid,
    },

    /// A question still referenced by another question's expression cannot be
    /// removed.
    #[error("question {question_id} is referenced by expression {expression_id}")]
    QuestionReferenceDependency {
        question_id: Uuid,
        expression_id: Uuid,
    },

    /// `add_another` may only be set on the outermost container of a chain.
    #[error("invalid add another placement: {0}")]
    AddAnotherNotValid(String),

    /// Expressions may only reference questions strictly earlier in the
    /// global component order.
    #[error("question {question_id} cannot reference {referenced_question_id}: referenced question is not earlier")]
    CollectionChronology {
        question_id: Uuid,
        referenced_question_id: Uuid,
    },

    /// Structural edits are forbidden while live submissions exist.
    #[error("collection {collection_id} version {version} has {live_submissions} live submissions and cannot be edited")]
    CollectionLocked {
        collection_id: Uuid,
        version: u32,
        live_submissions: usize,
    },

    /// The managed expression does not support the question's data type.
    #[error("managed expression {managed_name} does not support data type {data_type}")]
    UnsupportedDataType {
        managed_name: String,
        data_type: String,
    },

    #[error("component {0} not found in collection")]
    ComponentNotFound(Uuid),

    #[error("form {0} not found in collection")]
    FormNotFound(Uuid),

    #[error("section {0} not found in collection")]
    SectionNotFound(Uuid),

    #[error("question {0} has no data source")]
    DataSourceNotFound(Uuid),
}

/// Failures raised by submission lifecycle transitions.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LifecycleError {
    #[error("cannot transition submission from {from} to {to}")]
    StateTransition {
        from: SubmissionStatus,
        to: SubmissionStatus,
    },

    /// Writes and events are rejected once a submission is submitted.
    #[error("submission {0} has been submitted and can no longer change")]
    SubmissionLocked(Uuid),

    /// Answers to questions inside an add-another container must name the
    /// entry they belong to.
    #[error("question {question_id} is inside add-another container {container_id}; an entry index is required")]
    EntryIndexRequired {
        question_id: Uuid,
        container_id: Uuid,
    },

    #[error("form {0} has unanswered visible questions")]
    FormNotComplete(Uuid),

    #[error("all forms must be completed before this transition")]
    FormsNotComplete,

    #[error("the grant must be live before submissions can be created")]
    GrantMustBeLive,

    #[error("the grant team needs at least {required} users before going live")]
    NotEnoughGrantTeamUsers { required: usize },

    #[error("organisation {0} has no grant recipient users")]
    GrantRecipientUsersRequired(Uuid),
}

/// Failures raised while parsing a raw form value into a typed answer.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnswerParseError {
    #[error("an answer is required")]
    MissingValue,

    #[error("enter a whole number")]
    InvalidInteger(String),

    #[error("enter an email address in the correct format")]
    InvalidEmail(String),

    #[error("enter a website address in the correct format")]
    InvalidUrl(String),

    #[error("'{0}' is not one of the available choices")]
    UnknownChoiceKey(String),

    #[error("enter yes or no")]
    InvalidYesNo(String),

    #[error("stored answer has the wrong shape for {data_type}: {detail}")]
    InvalidStoredShape { data_type: String, detail: String },
}

/// One failed managed validation, as surfaced on the submission review page.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub question_id: Uuid,
    pub question_name: String,
    pub form_id: Uuid,
    pub form_title: String,
    pub error_message: String,
    pub answer: JsonValue,
    pub add_another_index: Option<usize>,
}

/// Raised when any reachable managed validation fails at sign-off time.
#[derive(Debug, Clone, Error)]
#[error("submission {submission_id} has {} invalid answers", errors.len())]
pub struct SubmissionValidationFailed {
    pub submission_id: Uuid,
    pub errors: Vec<ValidationError>,
}

/// Wraps any upstream failure from the notification collaborator.
#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotificationError(pub String);
