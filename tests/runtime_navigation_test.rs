//! Visibility, navigation and completeness through the runtime helper.

mod common;

use common::{collection_with_form, spec, submission_for, values};
use reporting_cli::answers::Answer;
use reporting_cli::error::LifecycleError;
use reporting_cli::expr::ManagedExpression;
use reporting_cli::schema::QuestionDataType;
use reporting_cli::submission::SubmissionHelper;
use reporting_cli::submission::events::FormStatus;
use reporting_cli::submission::helper::TraversalMode;
use reporting_cli::submission::lifecycle;
use uuid::Uuid;

#[test]
fn linear_form_navigates_in_order_and_completes() {
    let (mut collection, form_id) = collection_with_form("Details");
    let q1 = collection
        .add_question(form_id, None, spec("Favourite colour", QuestionDataType::TextSingleLine))
        .unwrap();
    let q2 = collection
        .add_question(form_id, None, spec("How many parks", QuestionDataType::Integer))
        .unwrap();

    let mut helper = SubmissionHelper::new(&collection, submission_for(&collection));
    let user = Uuid::new_v4();

    helper.submit_answer(q1, &values(&["Blue"]), None).unwrap();
    assert_eq!(
        helper.get_answer(q1, None),
        Some(Answer::TextSingleLine("Blue".into()))
    );
    assert_eq!(helper.get_next_question(q1, None).map(|q| q.id), Some(q2));

    helper.submit_answer(q2, &values(&["7"]), None).unwrap();
    assert_eq!(helper.get_answer(q2, None), Some(Answer::Integer(7)));
    assert!(helper.get_next_question(q2, None).is_none());
    assert_eq!(helper.get_previous_question(q2, None).map(|q| q.id), Some(q1));
    assert!(helper.get_previous_question(q1, None).is_none());

    // Answers alone leave the form in progress; completing it needs the event.
    assert_eq!(
        helper.submission().form_state(form_id).status(true),
        FormStatus::InProgress
    );
    assert!(helper.get_all_questions_are_answered_for_form(form_id));
    lifecycle::toggle_form_completed(&mut helper, form_id, user, true).unwrap();
    assert_eq!(
        helper.submission().form_state(form_id).status(true),
        FormStatus::Completed
    );
}

#[test]
fn conditional_question_is_skipped_when_gate_is_no() {
    let (mut collection, form_id) = collection_with_form("Details");
    let gate = collection
        .add_question(form_id, None, spec("Do you have a park", QuestionDataType::YesNo))
        .unwrap();
    let detail = collection
        .add_question(form_id, None, spec("Park details", QuestionDataType::TextSingleLine))
        .unwrap();
    collection
        .add_managed_condition(detail, &ManagedExpression::IsYes { question_id: gate })
        .unwrap();

    let mut helper = SubmissionHelper::new(&collection, submission_for(&collection));

    helper.submit_answer(gate, &values(&["no"]), None).unwrap();
    assert!(!helper.is_component_visible(detail, None));
    assert!(helper.get_next_question(gate, None).is_none());
    let visible: Vec<Uuid> = helper
        .get_ordered_visible_questions(form_id, TraversalMode::Structural)
        .iter()
        .map(|vq| vq.question.id)
        .collect();
    assert_eq!(visible, vec![gate]);
    // One unanswered hidden question does not block completeness.
    assert!(helper.get_all_questions_are_answered_for_form(form_id));

    helper.submit_answer(gate, &values(&["yes"]), None).unwrap();
    assert!(helper.is_component_visible(detail, None));
    assert_eq!(helper.get_next_question(gate, None).map(|q| q.id), Some(detail));
    assert!(!helper.get_all_questions_are_answered_for_form(form_id));
}

#[test]
fn unanswered_gate_hides_the_dependent_question() {
    let (mut collection, form_id) = collection_with_form("Details");
    let gate = collection
        .add_question(form_id, None, spec("Do you have a park", QuestionDataType::YesNo))
        .unwrap();
    let detail = collection
        .add_question(form_id, None, spec("Park details", QuestionDataType::TextSingleLine))
        .unwrap();
    collection
        .add_managed_condition(detail, &ManagedExpression::IsYes { question_id: gate })
        .unwrap();

    let helper = SubmissionHelper::new(&collection, submission_for(&collection));
    // Undefined variable in the condition: fail closed.
    assert!(!helper.is_component_visible(detail, None));
}

#[test]
fn add_another_conditions_are_scoped_per_entry() {
    let (mut collection, form_id) = collection_with_form("Parks");
    let group = collection.add_group(form_id, None, "Park").unwrap();
    let count = collection
        .add_question(form_id, Some(group), spec("Visitor count", QuestionDataType::Integer))
        .unwrap();
    let detail = collection
        .add_question(
            form_id,
            Some(group),
            spec("Busy park details", QuestionDataType::TextSingleLine),
        )
        .unwrap();
    collection
        .add_managed_condition(
            detail,
            &ManagedExpression::GreaterThan {
                question_id: count,
                minimum_value: 50,
                inclusive: false,
            },
        )
        .unwrap();
    collection.set_add_another(group, true).unwrap();

    let mut helper = SubmissionHelper::new(&collection, submission_for(&collection));
    helper.submit_answer(count, &values(&["55"]), Some(0)).unwrap();
    helper.submit_answer(count, &values(&["20"]), Some(1)).unwrap();

    assert_eq!(helper.get_count_for_add_another(group), 2);
    assert!(helper.is_component_visible(detail, Some(0)));
    assert!(!helper.is_component_visible(detail, Some(1)));

    // Entry 0 continues to the gated question; entry 1 ends immediately.
    assert_eq!(
        helper.get_next_question(count, Some(0)).map(|q| q.id),
        Some(detail)
    );
    assert!(helper.get_next_question(count, Some(1)).is_none());

    // Flattened traversal shows the gated question only for entry 0.
    let flattened: Vec<(Uuid, Option<usize>)> = helper
        .get_ordered_visible_questions(form_id, TraversalMode::Flattened)
        .iter()
        .map(|vq| (vq.question.id, vq.add_another_index))
        .collect();
    assert_eq!(
        flattened,
        vec![(count, Some(0)), (detail, Some(0)), (count, Some(1))]
    );
}

#[test]
fn add_another_summaries_report_entry_state() {
    let (mut collection, form_id) = collection_with_form("Parks");
    let group = collection.add_group(form_id, None, "Park").unwrap();
    let name = collection
        .add_question(form_id, Some(group), spec("Park name", QuestionDataType::TextSingleLine))
        .unwrap();
    let boards = collection
        .add_question(form_id, Some(group), spec("Board count", QuestionDataType::Integer))
        .unwrap();
    collection.set_add_another(group, true).unwrap();

    let mut helper = SubmissionHelper::new(&collection, submission_for(&collection));
    helper
        .submit_answer(name, &values(&["Victoria Park"]), Some(0))
        .unwrap();
    helper.submit_answer(boards, &values(&["3"]), Some(0)).unwrap();
    helper
        .submit_answer(name, &values(&["Mile End Park"]), Some(1))
        .unwrap();

    let first = helper.get_answer_summary_for_add_another(group, 0);
    assert_eq!(first.summary, "Victoria Park, 3");
    assert!(first.is_answered);

    let second = helper.get_answer_summary_for_add_another(group, 1);
    assert_eq!(second.summary, "Mile End Park");
    assert!(!second.is_answered);

    // Completeness follows the per-entry answers.
    assert!(!helper.get_all_questions_are_answered_for_form(form_id));
    helper.submit_answer(boards, &values(&["1"]), Some(1)).unwrap();
    assert!(helper.get_all_questions_are_answered_for_form(form_id));

    // Removing an entry shifts the later ones down.
    helper.remove_add_another_entry(group, 0).unwrap();
    assert_eq!(helper.get_count_for_add_another(group), 1);
    assert_eq!(
        helper.get_answer_summary_for_add_another(group, 0).summary,
        "Mile End Park, 1"
    );
}

#[test]
fn add_another_answer_without_an_entry_index_is_rejected() {
    let (mut collection, form_id) = collection_with_form("Parks");
    let group = collection.add_group(form_id, None, "Park").unwrap();
    let name = collection
        .add_question(form_id, Some(group), spec("Park name", QuestionDataType::TextSingleLine))
        .unwrap();
    collection.set_add_another(group, true).unwrap();

    let mut helper = SubmissionHelper::new(&collection, submission_for(&collection));
    let err = helper
        .submit_answer(name, &values(&["Victoria Park"]), None)
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<LifecycleError>(),
        Some(&LifecycleError::EntryIndexRequired {
            question_id: name,
            container_id: group,
        })
    );

    // Nothing was written.
    assert_eq!(helper.get_count_for_add_another(group), 0);
    helper
        .submit_answer(name, &values(&["Victoria Park"]), Some(0))
        .unwrap();
    assert_eq!(helper.get_count_for_add_another(group), 1);
}

#[test]
fn traversal_is_deterministic_for_fixed_data() {
    let (mut collection, form_id) = collection_with_form("Details");
    let q1 = collection
        .add_question(form_id, None, spec("First", QuestionDataType::TextSingleLine))
        .unwrap();
    let q2 = collection
        .add_question(form_id, None, spec("Second", QuestionDataType::Integer))
        .unwrap();

    let mut helper = SubmissionHelper::new(&collection, submission_for(&collection));
    helper.submit_answer(q1, &values(&["a"]), None).unwrap();

    let run = |helper: &SubmissionHelper| -> Vec<Uuid> {
        helper
            .get_ordered_visible_questions(form_id, TraversalMode::Structural)
            .iter()
            .map(|vq| vq.question.id)
            .collect()
    };
    assert_eq!(run(&helper), run(&helper));
    assert_eq!(run(&helper), vec![q1, q2]);
}
