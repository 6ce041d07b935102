//! Submissions: the answer map, the event log, and the runtime services
//! built on them (helper, validator, lifecycle transitions).

pub mod events;
pub mod helper;
pub mod lifecycle;
pub mod validate;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Map as JsonMap;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use events::{
    FormState, SubmissionEvent, SubmissionState, SubmissionStatus, reduce_form_state,
    reduce_submission_state,
};

pub use helper::SubmissionHelper;
pub use validate::SubmissionValidator;

/// Test submissions are invisible to schema locking and can be purged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionMode {
    Test,
    Live,
}

impl std::fmt::Display for SubmissionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SubmissionMode::Test => "TEST",
            SubmissionMode::Live => "LIVE",
        })
    }
}

/// One recipient's answers against a pinned `(collection_id, version)`.
///
/// `data` maps question ids to stored answers; questions inside an
/// add-another container are nested as `data[container_id][index][question_id]`
/// with entries kept dense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub collection_id: Uuid,
    pub collection_version: u32,
    pub mode: SubmissionMode,
    pub name: String,
    pub organisation_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at_utc: DateTime<Utc>,
    #[serde(default)]
    pub data: JsonMap<String, JsonValue>,
    #[serde(default)]
    pub events: Vec<SubmissionEvent>,
}

impl Submission {
    pub fn new(
        collection_id: Uuid,
        collection_version: u32,
        mode: SubmissionMode,
        name: &str,
        organisation_id: Option<Uuid>,
        created_by: Uuid,
    ) -> Submission {
        Submission {
            id: Uuid::new_v4(),
            collection_id,
            collection_version,
            mode,
            name: name.to_string(),
            organisation_id,
            created_by,
            created_at_utc: Utc::now(),
            data: JsonMap::new(),
            events: Vec::new(),
        }
    }

    /// Short human-readable reference, derived from the id and immutable.
    pub fn reference(&self) -> String {
        self.id.simple().to_string()[..8].to_uppercase()
    }

    pub fn has_answers(&self) -> bool {
        !self.data.is_empty()
    }

    pub fn state(&self) -> SubmissionState {
        reduce_submission_state(&self.events, self.id)
    }

    pub fn form_state(&self, form_id: Uuid) -> FormState {
        reduce_form_state(&self.events, form_id)
    }

    pub fn status(&self) -> SubmissionStatus {
        let has_form_events = self
            .events
            .iter()
            .any(|event| event.related_entity_id != self.id);
        self.state().status(self.has_answers(), has_form_events)
    }

    /// Reads a stored answer at its storage path. `None` when absent, and
    /// also when the question sits in an add-another container but no entry
    /// index was given.
    pub fn stored_answer(
        &self,
        question_id: Uuid,
        container: Option<(Uuid, usize)>,
    ) -> Option<&JsonValue> {
        match container {
            None => self.data.get(&question_id.to_string()),
            Some((container_id, index)) => self
                .data
                .get(&container_id.to_string())?
                .as_array()?
                .get(index)?
                .as_object()?
                .get(&question_id.to_string()),
        }
    }

    /// Writes a stored answer, creating the add-another entry mapping as
    /// needed. Entries stay dense: writing at index `n` when `n == len`
    /// appends a new entry.
    pub fn store_answer(
        &mut self,
        question_id: Uuid,
        container: Option<(Uuid, usize)>,
        value: JsonValue,
    ) {
        match container {
            None => {
                self.data.insert(question_id.to_string(), value);
            }
            Some((container_id, index)) => {
                let entries = self
                    .data
                    .entry(container_id.to_string())
                    .or_insert_with(|| JsonValue::Array(Vec::new()));
                if let JsonValue::Array(entries) = entries {
                    while entries.len() <= index {
                        entries.push(JsonValue::Object(JsonMap::new()));
                    }
                    if let Some(JsonValue::Object(entry)) = entries.get_mut(index) {
                        entry.insert(question_id.to_string(), value);
                    }
                }
            }
        }
    }

    /// Number of add-another entries recorded for a container.
    pub fn add_another_count(&self, container_id: Uuid) -> usize {
        self.data
            .get(&container_id.to_string())
            .and_then(JsonValue::as_array)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Drops one add-another entry, keeping the list dense.
    pub fn remove_add_another_entry(&mut self, container_id: Uuid, index: usize) {
        if let Some(JsonValue::Array(entries)) = self.data.get_mut(&container_id.to_string()) {
            if index < entries.len() {
                entries.remove(index);
            }
        }
    }

    pub fn append_event(&mut self, event: SubmissionEvent) {
        self.events.push(event);
    }
}
