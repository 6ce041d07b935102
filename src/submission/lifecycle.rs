//! Submission lifecycle transitions. Each transition validates the reduced
//! current state, then appends the corresponding event through the helper so
//! memoised state is dropped.

use anyhow::Result;
use log::info;
use serde_json::Map as JsonMap;
use serde_json::json;
use uuid::Uuid;

use crate::error::LifecycleError;
use crate::notify::Notifier;
use crate::submission::SubmissionHelper;
use crate::submission::events::{SubmissionEvent, SubmissionEventType, SubmissionStatus};
use crate::submission::validate::SubmissionValidator;

fn reject_submitted(helper: &SubmissionHelper<'_>) -> Result<(), LifecycleError> {
    if helper.submission().state().is_submitted {
        return Err(LifecycleError::SubmissionLocked(helper.submission().id));
    }
    Ok(())
}

/// Marks a form complete or reopens it. Completing requires every visible
/// question answered; neither direction is allowed while the submission is
/// awaiting sign-off or after it has been submitted.
pub fn toggle_form_completed(
    helper: &mut SubmissionHelper<'_>,
    form_id: Uuid,
    user_id: Uuid,
    complete: bool,
) -> Result<(), LifecycleError> {
    reject_submitted(helper)?;
    let status = helper.submission().status();
    if status == SubmissionStatus::AwaitingSignOff {
        return Err(LifecycleError::StateTransition {
            from: status,
            to: SubmissionStatus::InProgress,
        });
    }
    if complete && !helper.get_all_questions_are_answered_for_form(form_id) {
        return Err(LifecycleError::FormNotComplete(form_id));
    }
    let event_type = if complete {
        SubmissionEventType::FormCompleted
    } else {
        SubmissionEventType::FormResetToInProgress
    };
    helper.append_event(SubmissionEvent::new(
        event_type,
        form_id,
        user_id,
        JsonMap::new(),
    ));
    Ok(())
}

/// Sends the submission for certification. All forms must be complete and
/// every reachable managed validation must pass.
pub fn send_for_certification(helper: &mut SubmissionHelper<'_>, user_id: Uuid) -> Result<()> {
    reject_submitted(helper)?;
    let status = helper.submission().status();
    if status != SubmissionStatus::InProgress {
        return Err(LifecycleError::StateTransition {
            from: status,
            to: SubmissionStatus::AwaitingSignOff,
        }
        .into());
    }
    ensure_all_forms_complete(helper)?;
    SubmissionValidator::new(helper).validate_all_reachable_questions()?;

    let submission_id = helper.submission().id;
    helper.append_event(SubmissionEvent::new(
        SubmissionEventType::SubmissionSentForCertification,
        submission_id,
        user_id,
        JsonMap::new(),
    ));
    info!(target: "metrics", "submission_sent_for_certification submission={submission_id}");
    Ok(())
}

/// Certifier approval; the submission must be awaiting sign-off.
pub fn approve(helper: &mut SubmissionHelper<'_>, user_id: Uuid) -> Result<(), LifecycleError> {
    reject_submitted(helper)?;
    let state = helper.submission().state();
    if !state.is_awaiting_sign_off || state.is_approved {
        return Err(LifecycleError::StateTransition {
            from: helper.submission().status(),
            to: SubmissionStatus::AwaitingSignOff,
        });
    }
    let submission_id = helper.submission().id;
    helper.append_event(SubmissionEvent::new(
        SubmissionEventType::SubmissionApprovedByCertifier,
        submission_id,
        user_id,
        JsonMap::new(),
    ));
    Ok(())
}

/// Certifier decline: records the reason, drops the submission back to
/// in-progress and reopens each named form.
pub fn decline(
    helper: &mut SubmissionHelper<'_>,
    user_id: Uuid,
    reason: &str,
    forms_to_reset: &[Uuid],
) -> Result<(), LifecycleError> {
    reject_submitted(helper)?;
    let state = helper.submission().state();
    if !state.is_awaiting_sign_off {
        return Err(LifecycleError::StateTransition {
            from: helper.submission().status(),
            to: SubmissionStatus::InProgress,
        });
    }
    let submission_id = helper.submission().id;
    let mut data = JsonMap::new();
    data.insert("declined_reason".to_string(), json!(reason));
    helper.append_event(SubmissionEvent::new(
        SubmissionEventType::SubmissionDeclinedByCertifier,
        submission_id,
        user_id,
        data,
    ));
    for form_id in forms_to_reset {
        helper.append_event(SubmissionEvent::new(
            SubmissionEventType::FormResetByCertifier,
            *form_id,
            user_id,
            JsonMap::new(),
        ));
    }
    Ok(())
}

/// Final submit. With certification required the submission must be awaiting
/// sign-off and approved; without it, in progress with all forms complete.
/// The event append is terminal: no answers, events or transitions after it.
pub fn submit(
    helper: &mut SubmissionHelper<'_>,
    user_id: Uuid,
    notifier: &dyn Notifier,
    recipient_email: &str,
) -> Result<()> {
    reject_submitted(helper)?;
    let state = helper.submission().state();
    if helper.collection().requires_certification {
        if !state.is_awaiting_sign_off || !state.is_approved {
            return Err(LifecycleError::StateTransition {
                from: helper.submission().status(),
                to: SubmissionStatus::Submitted,
            }
            .into());
        }
    } else {
        if helper.submission().status() != SubmissionStatus::InProgress {
            return Err(LifecycleError::StateTransition {
                from: helper.submission().status(),
                to: SubmissionStatus::Submitted,
            }
            .into());
        }
        ensure_all_forms_complete(helper)?;
    }

    let submission_id = helper.submission().id;
    helper.append_event(SubmissionEvent::new(
        SubmissionEventType::SubmissionSubmitted,
        submission_id,
        user_id,
        JsonMap::new(),
    ));
    info!(target: "metrics", "submission_submitted submission={submission_id}");

    let notification = notifier.send_collection_submission(
        recipient_email,
        &helper.submission().reference(),
        &helper.collection().name,
    )?;
    info!(
        target: "submission",
        "submit notification {} sent for {submission_id}", notification.id
    );
    Ok(())
}

fn ensure_all_forms_complete(helper: &SubmissionHelper<'_>) -> Result<(), LifecycleError> {
    let all_complete = helper
        .get_ordered_visible_forms()
        .iter()
        .all(|form| helper.submission().form_state(form.id).is_completed);
    if all_complete {
        Ok(())
    } else {
        Err(LifecycleError::FormsNotComplete)
    }
}
