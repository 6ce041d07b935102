//! The submission event log and its state reducer.
//!
//! Submission and form status is never stored; it is reduced from the event
//! log on demand. Each event type is registered with the state slots it sets,
//! so the fold itself is generic: per event, apply the type's static
//! defaults, then the event's stored fields, then project the event metadata
//! into named slots. Adding an event type is a registry change only.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Map as JsonMap;
use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionEventType {
    FormCompleted,
    FormResetToInProgress,
    FormResetByCertifier,
    SubmissionSentForCertification,
    SubmissionDeclinedByCertifier,
    SubmissionApprovedByCertifier,
    SubmissionSubmitted,
}

impl SubmissionEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionEventType::FormCompleted => "FORM_COMPLETED",
            SubmissionEventType::FormResetToInProgress => "FORM_RESET_TO_IN_PROGRESS",
            SubmissionEventType::FormResetByCertifier => "FORM_RESET_BY_CERTIFIER",
            SubmissionEventType::SubmissionSentForCertification => {
                "SUBMISSION_SENT_FOR_CERTIFICATION"
            }
            SubmissionEventType::SubmissionDeclinedByCertifier => {
                "SUBMISSION_DECLINED_BY_CERTIFIER"
            }
            SubmissionEventType::SubmissionApprovedByCertifier => {
                "SUBMISSION_APPROVED_BY_CERTIFIER"
            }
            SubmissionEventType::SubmissionSubmitted => "SUBMISSION_SUBMITTED",
        }
    }
}

impl std::fmt::Display for SubmissionEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionEvent {
    pub id: Uuid,
    pub event_type: SubmissionEventType,
    /// The form the event concerns, or the submission id for
    /// submission-scoped events.
    pub related_entity_id: Uuid,
    pub created_by: Uuid,
    pub created_at_utc: DateTime<Utc>,
    /// Per-instance stored fields, e.g. a decline reason.
    #[serde(default)]
    pub data: JsonMap<String, JsonValue>,
}

impl SubmissionEvent {
    pub fn new(
        event_type: SubmissionEventType,
        related_entity_id: Uuid,
        created_by: Uuid,
        data: JsonMap<String, JsonValue>,
    ) -> SubmissionEvent {
        SubmissionEvent {
            id: Uuid::new_v4(),
            event_type,
            related_entity_id,
            created_by,
            created_at_utc: Utc::now(),
            data,
        }
    }
}

/// Which entity's state an event type folds into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventScope {
    Form,
    Submission,
}

struct EventDescriptor {
    scope: EventScope,
    /// Slots set unconditionally when the event is applied.
    defaults: Vec<(&'static str, JsonValue)>,
    /// `(by_slot, at_slot)` to project `created_by` / `created_at_utc` into.
    metadata_slots: Option<(&'static str, &'static str)>,
}

static REGISTRY: Lazy<HashMap<SubmissionEventType, EventDescriptor>> = Lazy::new(|| {
    use SubmissionEventType::*;
    let mut registry = HashMap::new();
    registry.insert(
        FormCompleted,
        EventDescriptor {
            scope: EventScope::Form,
            defaults: vec![("is_completed", json!(true))],
            metadata_slots: None,
        },
    );
    registry.insert(
        FormResetToInProgress,
        EventDescriptor {
            scope: EventScope::Form,
            defaults: vec![("is_completed", json!(false))],
            metadata_slots: None,
        },
    );
    registry.insert(
        FormResetByCertifier,
        EventDescriptor {
            scope: EventScope::Form,
            defaults: vec![("is_completed", json!(false))],
            metadata_slots: None,
        },
    );
    registry.insert(
        SubmissionSentForCertification,
        EventDescriptor {
            scope: EventScope::Submission,
            defaults: vec![
                ("is_awaiting_sign_off", json!(true)),
                ("declined_reason", JsonValue::Null),
            ],
            metadata_slots: Some(("sent_for_certification_by", "sent_for_certification_at_utc")),
        },
    );
    registry.insert(
        SubmissionDeclinedByCertifier,
        EventDescriptor {
            scope: EventScope::Submission,
            defaults: vec![
                ("is_awaiting_sign_off", json!(false)),
                ("is_approved", json!(false)),
            ],
            metadata_slots: None,
        },
    );
    registry.insert(
        SubmissionApprovedByCertifier,
        EventDescriptor {
            scope: EventScope::Submission,
            defaults: vec![("is_approved", json!(true))],
            metadata_slots: Some(("certified_by", "certified_at_utc")),
        },
    );
    registry.insert(
        SubmissionSubmitted,
        EventDescriptor {
            scope: EventScope::Submission,
            defaults: vec![("is_submitted", json!(true))],
            metadata_slots: Some(("submitted_by", "submitted_at_utc")),
        },
    );
    registry
});

/// Pure left-fold over the matching events in `created_at_utc` order.
fn fold_slots(
    events: &[SubmissionEvent],
    scope: EventScope,
    entity_id: Uuid,
) -> JsonMap<String, JsonValue> {
    let mut matching: Vec<&SubmissionEvent> = events
        .iter()
        .filter(|event| {
            event.related_entity_id == entity_id
                && REGISTRY
                    .get(&event.event_type)
                    .is_some_and(|d| d.scope == scope)
        })
        .collect();
    matching.sort_by_key(|event| event.created_at_utc);

    let mut slots = JsonMap::new();
    for event in matching {
        let Some(descriptor) = REGISTRY.get(&event.event_type) else {
            continue;
        };
        for (slot, value) in &descriptor.defaults {
            slots.insert((*slot).to_string(), value.clone());
        }
        for (slot, value) in &event.data {
            slots.insert(slot.clone(), value.clone());
        }
        if let Some((by_slot, at_slot)) = descriptor.metadata_slots {
            slots.insert(by_slot.to_string(), json!(event.created_by));
            slots.insert(at_slot.to_string(), json!(event.created_at_utc));
        }
    }
    slots
}

fn slot_bool(slots: &JsonMap<String, JsonValue>, name: &str) -> bool {
    slots.get(name).and_then(JsonValue::as_bool).unwrap_or(false)
}

fn slot_string(slots: &JsonMap<String, JsonValue>, name: &str) -> Option<String> {
    slots
        .get(name)
        .and_then(JsonValue::as_str)
        .map(str::to_string)
}

fn slot_uuid(slots: &JsonMap<String, JsonValue>, name: &str) -> Option<Uuid> {
    slots
        .get(name)
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
}

fn slot_datetime(slots: &JsonMap<String, JsonValue>, name: &str) -> Option<DateTime<Utc>> {
    slots
        .get(name)
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
}

/// Reduced lifecycle state of a submission. Empty event list reduces to the
/// zero state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionState {
    pub is_awaiting_sign_off: bool,
    pub is_approved: bool,
    pub is_submitted: bool,
    pub declined_reason: Option<String>,
    pub sent_for_certification_by: Option<Uuid>,
    pub sent_for_certification_at_utc: Option<DateTime<Utc>>,
    pub certified_by: Option<Uuid>,
    pub certified_at_utc: Option<DateTime<Utc>>,
    pub submitted_by: Option<Uuid>,
    pub submitted_at_utc: Option<DateTime<Utc>>,
}

impl SubmissionState {
    /// Collapses the reduced slots into a status. `has_answers` and
    /// `has_form_events` come from the submission, since the event fold only
    /// sees submission-scoped events.
    pub fn status(&self, has_answers: bool, has_form_events: bool) -> SubmissionStatus {
        if self.is_submitted {
            SubmissionStatus::Submitted
        } else if self.is_awaiting_sign_off || self.is_approved {
            SubmissionStatus::AwaitingSignOff
        } else if has_answers || has_form_events {
            SubmissionStatus::InProgress
        } else {
            SubmissionStatus::NotStarted
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState {
    pub is_completed: bool,
    pub has_events: bool,
}

impl FormState {
    pub fn status(&self, has_answers: bool) -> FormStatus {
        if self.is_completed {
            FormStatus::Completed
        } else if has_answers || self.has_events {
            FormStatus::InProgress
        } else {
            FormStatus::NotStarted
        }
    }
}

pub fn reduce_submission_state(events: &[SubmissionEvent], submission_id: Uuid) -> SubmissionState {
    let slots = fold_slots(events, EventScope::Submission, submission_id);
    SubmissionState {
        is_awaiting_sign_off: slot_bool(&slots, "is_awaiting_sign_off"),
        is_approved: slot_bool(&slots, "is_approved"),
        is_submitted: slot_bool(&slots, "is_submitted"),
        declined_reason: slot_string(&slots, "declined_reason"),
        sent_for_certification_by: slot_uuid(&slots, "sent_for_certification_by"),
        sent_for_certification_at_utc: slot_datetime(&slots, "sent_for_certification_at_utc"),
        certified_by: slot_uuid(&slots, "certified_by"),
        certified_at_utc: slot_datetime(&slots, "certified_at_utc"),
        submitted_by: slot_uuid(&slots, "submitted_by"),
        submitted_at_utc: slot_datetime(&slots, "submitted_at_utc"),
    }
}

pub fn reduce_form_state(events: &[SubmissionEvent], form_id: Uuid) -> FormState {
    let has_events = events.iter().any(|event| {
        event.related_entity_id == form_id
            && REGISTRY
                .get(&event.event_type)
                .is_some_and(|d| d.scope == EventScope::Form)
    });
    let slots = fold_slots(events, EventScope::Form, form_id);
    FormState {
        is_completed: slot_bool(&slots, "is_completed"),
        has_events,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    NotStarted,
    InProgress,
    AwaitingSignOff,
    Submitted,
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SubmissionStatus::NotStarted => "NOT_STARTED",
            SubmissionStatus::InProgress => "IN_PROGRESS",
            SubmissionStatus::AwaitingSignOff => "AWAITING_SIGN_OFF",
            SubmissionStatus::Submitted => "SUBMITTED",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormStatus {
    NotStarted,
    InProgress,
    Completed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn event_at(
        event_type: SubmissionEventType,
        related_entity_id: Uuid,
        offset_secs: i64,
    ) -> SubmissionEvent {
        SubmissionEvent {
            id: Uuid::new_v4(),
            event_type,
            related_entity_id,
            created_by: Uuid::new_v4(),
            created_at_utc: Utc::now() + Duration::seconds(offset_secs),
            data: JsonMap::new(),
        }
    }

    #[test]
    fn empty_log_reduces_to_zero_state() {
        let submission_id = Uuid::new_v4();
        let state = reduce_submission_state(&[], submission_id);
        assert_eq!(state, SubmissionState::default());
        assert_eq!(state.status(false, false), SubmissionStatus::NotStarted);
        assert_eq!(state.status(true, false), SubmissionStatus::InProgress);
    }

    #[test]
    fn latest_form_event_wins() {
        let form_id = Uuid::new_v4();
        let events = vec![
            event_at(SubmissionEventType::FormCompleted, form_id, 0),
            event_at(SubmissionEventType::FormResetToInProgress, form_id, 1),
        ];
        let state = reduce_form_state(&events, form_id);
        assert!(!state.is_completed);
        assert_eq!(state.status(true), FormStatus::InProgress);

        // Order is by created_at_utc, not slice position.
        let reversed: Vec<_> = events.into_iter().rev().collect();
        assert!(!reduce_form_state(&reversed, form_id).is_completed);
    }

    #[test]
    fn decline_round_trip_restores_in_progress() {
        let submission_id = Uuid::new_v4();
        let mut decline = event_at(
            SubmissionEventType::SubmissionDeclinedByCertifier,
            submission_id,
            1,
        );
        decline
            .data
            .insert("declined_reason".to_string(), json!("please revise"));
        let events = vec![
            event_at(
                SubmissionEventType::SubmissionSentForCertification,
                submission_id,
                0,
            ),
            decline,
        ];

        let state = reduce_submission_state(&events, submission_id);
        assert!(!state.is_awaiting_sign_off);
        assert_eq!(state.declined_reason.as_deref(), Some("please revise"));
        assert_eq!(state.status(true, true), SubmissionStatus::InProgress);
        // The first send still left its audit trail.
        assert!(state.sent_for_certification_by.is_some());
    }

    #[test]
    fn resend_after_decline_clears_the_reason() {
        let submission_id = Uuid::new_v4();
        let mut decline = event_at(
            SubmissionEventType::SubmissionDeclinedByCertifier,
            submission_id,
            0,
        );
        decline
            .data
            .insert("declined_reason".to_string(), json!("fix totals"));
        let events = vec![
            decline,
            event_at(
                SubmissionEventType::SubmissionSentForCertification,
                submission_id,
                1,
            ),
        ];
        let state = reduce_submission_state(&events, submission_id);
        assert!(state.is_awaiting_sign_off);
        assert_eq!(state.declined_reason, None);
    }

    #[test]
    fn metadata_projects_into_named_slots() {
        let submission_id = Uuid::new_v4();
        let submit = event_at(SubmissionEventType::SubmissionSubmitted, submission_id, 2);
        let events = vec![
            event_at(
                SubmissionEventType::SubmissionApprovedByCertifier,
                submission_id,
                1,
            ),
            submit.clone(),
        ];
        let state = reduce_submission_state(&events, submission_id);
        assert!(state.is_approved);
        assert_eq!(state.submitted_by, Some(submit.created_by));
        assert_eq!(state.submitted_at_utc, Some(submit.created_at_utc));
        assert_eq!(state.status(true, true), SubmissionStatus::Submitted);
    }

    #[test]
    fn events_for_other_entities_are_ignored() {
        let form_a = Uuid::new_v4();
        let form_b = Uuid::new_v4();
        let events = vec![event_at(SubmissionEventType::FormCompleted, form_a, 0)];
        assert!(reduce_form_state(&events, form_a).is_completed);
        let other = reduce_form_state(&events, form_b);
        assert!(!other.is_completed);
        assert!(!other.has_events);
    }

    #[test]
    fn reducer_is_pure() {
        let submission_id = Uuid::new_v4();
        let events = vec![event_at(
            SubmissionEventType::SubmissionSentForCertification,
            submission_id,
            0,
        )];
        let first = reduce_submission_state(&events, submission_id);
        let second = reduce_submission_state(&events, submission_id);
        assert_eq!(first, second);
    }
}
