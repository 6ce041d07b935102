//! Shared builders for integration tests.

use chrono::Utc;
use uuid::Uuid;

use reporting_cli::schema::authoring::QuestionSpec;
use reporting_cli::schema::{Collection, QuestionDataType};
use reporting_cli::submission::{Submission, SubmissionMode};

pub fn collection_with_form(form_title: &str) -> (Collection, Uuid) {
    let mut collection = Collection::new(
        Uuid::new_v4(),
        "Test collection",
        Uuid::new_v4(),
        Utc::now(),
    );
    let section_id = collection.sections[0].id;
    let form_id = collection
        .add_form(section_id, form_title)
        .expect("add form");
    (collection, form_id)
}

pub fn spec(text: &str, data_type: QuestionDataType) -> QuestionSpec {
    QuestionSpec {
        text: text.to_string(),
        name: text.to_string(),
        hint: None,
        guidance: None,
        data_type,
        items: Vec::new(),
    }
}

pub fn choice_spec(text: &str, items: &[(&str, &str)]) -> QuestionSpec {
    QuestionSpec {
        text: text.to_string(),
        name: text.to_string(),
        hint: None,
        guidance: None,
        data_type: QuestionDataType::SingleChoice,
        items: items
            .iter()
            .map(|(key, label)| (key.to_string(), label.to_string()))
            .collect(),
    }
}

pub fn submission_for(collection: &Collection) -> Submission {
    Submission::new(
        collection.id,
        collection.version,
        SubmissionMode::Test,
        "Test submission",
        None,
        Uuid::new_v4(),
    )
}

pub fn values(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}
