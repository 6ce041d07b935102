//! The per-request runtime façade over one submission and its pinned schema
//! version: answer access, visibility, navigation and completeness, with a
//! per-helper memo cache invalidated on every write.

use std::cell::RefCell;
use std::collections::HashMap;

use anyhow::Result;
use log::{debug, warn};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::answers::Answer;
use crate::error::{ExpressionError, LifecycleError};
use crate::expr::{self, ExpressionContext};
use crate::schema::{Collection, Component, ConditionsOperator, Form, Question};
use crate::submission::Submission;
use crate::submission::events::SubmissionEvent;

/// How add-another containers are traversed.
///
/// `Structural` enumerates a container's descendants once overall (schema
/// shape); `Flattened` enumerates them once per stored entry (what the
/// validator and completeness checks walk).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalMode {
    Structural,
    Flattened,
}

/// One slot in a flattened visible-question traversal.
#[derive(Debug, Clone, Copy)]
pub struct VisibleQuestion<'a> {
    pub question: &'a Question,
    pub add_another_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddAnotherSummary {
    pub summary: String,
    pub is_answered: bool,
}

#[derive(Default)]
struct MemoCache {
    answers: HashMap<(Uuid, Option<usize>), Option<Answer>>,
    visibility: HashMap<(Uuid, Option<usize>), bool>,
    form_complete: HashMap<Uuid, bool>,
}

pub struct SubmissionHelper<'a> {
    collection: &'a Collection,
    submission: Submission,
    cache: RefCell<MemoCache>,
}

impl<'a> SubmissionHelper<'a> {
    pub fn new(collection: &'a Collection, submission: Submission) -> SubmissionHelper<'a> {
        SubmissionHelper {
            collection,
            submission,
            cache: RefCell::new(MemoCache::default()),
        }
    }

    pub fn collection(&self) -> &Collection {
        self.collection
    }

    pub fn submission(&self) -> &Submission {
        &self.submission
    }

    pub fn into_submission(self) -> Submission {
        self.submission
    }

    fn invalidate(&self) {
        *self.cache.borrow_mut() = MemoCache::default();
    }

    /// Appends a lifecycle event and drops the memo cache, since reduced
    /// state feeds completeness and write guards.
    pub fn append_event(&mut self, event: SubmissionEvent) {
        self.submission.append_event(event);
        self.invalidate();
    }

    /// The storage container for a question: `Some` when it sits inside an
    /// add-another component (possibly itself).
    fn container_id_of(&self, question_id: Uuid) -> Option<Uuid> {
        let form = self.collection.form_for_question(question_id)?;
        form.add_another_container_of(question_id)
            .map(Component::id)
    }

    /// Typed answer lookup at the storage path. `None` when absent, on a
    /// missing entry index for container questions, or when the stored value
    /// no longer matches the question's data type.
    pub fn get_answer(
        &self,
        question_id: Uuid,
        add_another_index: Option<usize>,
    ) -> Option<Answer> {
        let key = (question_id, add_another_index);
        if let Some(memo) = self.cache.borrow().answers.get(&key) {
            return memo.clone();
        }

        let answer = self.load_answer(question_id, add_another_index);
        self.cache.borrow_mut().answers.insert(key, answer.clone());
        answer
    }

    fn load_answer(&self, question_id: Uuid, add_another_index: Option<usize>) -> Option<Answer> {
        let question = self.collection.find_question(question_id)?;
        let container = match (self.container_id_of(question_id), add_another_index) {
            (None, _) => None,
            (Some(_), None) => return None,
            (Some(container_id), Some(index)) => Some((container_id, index)),
        };
        let stored = self.submission.stored_answer(question_id, container)?;
        match Answer::from_storage(question.data_type, stored) {
            Ok(answer) => Some(answer),
            Err(err) => {
                warn!(target: "submission", "stored answer for {question_id} unreadable: {err}");
                None
            }
        }
    }

    /// Parses a raw form value and persists it at the storage path. Rejected
    /// once the submission has been submitted.
    pub fn submit_answer(
        &mut self,
        question_id: Uuid,
        values: &[String],
        add_another_index: Option<usize>,
    ) -> Result<()> {
        if self.submission.state().is_submitted {
            return Err(LifecycleError::SubmissionLocked(self.submission.id).into());
        }
        let question = self
            .collection
            .find_question(question_id)
            .ok_or(crate::error::AuthoringError::ComponentNotFound(question_id))?;
        let answer = Answer::parse_input(question.data_type, values, question.data_source.as_ref())?;

        let container = match (self.container_id_of(question_id), add_another_index) {
            (None, _) => None,
            (Some(container_id), Some(index)) => Some((container_id, index)),
            (Some(container_id), None) => {
                return Err(LifecycleError::EntryIndexRequired {
                    question_id,
                    container_id,
                }
                .into());
            }
        };
        self.submission
            .store_answer(question_id, container, answer.to_storage());
        self.invalidate();
        Ok(())
    }

    /// Drops one add-another entry, keeping the remaining entries dense.
    /// Rejected once the submission has been submitted.
    pub fn remove_add_another_entry(&mut self, container_id: Uuid, index: usize) -> Result<()> {
        if self.submission.state().is_submitted {
            return Err(LifecycleError::SubmissionLocked(self.submission.id).into());
        }
        self.submission.remove_add_another_entry(container_id, index);
        self.invalidate();
        Ok(())
    }

    /// The base evaluation context: every answered top-level question bound
    /// by its safe qid. Container questions are bound per entry via the
    /// add-another scope.
    pub fn evaluation_context(&self) -> ExpressionContext {
        let mut ctx = ExpressionContext::new();
        for form in self.collection.forms() {
            for question in form.questions() {
                if self.container_id_of(question.id).is_some() {
                    continue;
                }
                if let Some(answer) = self.get_answer(question.id, None) {
                    ctx.insert_answer(question.safe_qid(), answer.to_expression_value());
                }
            }
        }
        ctx
    }

    fn entry_scoped_context(&self, container_id: Uuid, index: usize) -> ExpressionContext {
        let mut overrides = HashMap::new();
        if let Some(form) = self
            .collection
            .forms()
            .find(|f| f.find_component(container_id).is_some())
        {
            if let Some(container) = form.find_component(container_id) {
                for question in container.questions() {
                    let value = self
                        .get_answer(question.id, Some(index))
                        .map(|a| a.to_expression_value());
                    overrides.insert(question.safe_qid(), value);
                }
            }
        }
        self.evaluation_context().with_add_another_scope(overrides)
    }

    /// Evaluation context for one question: entry-scoped when it sits inside
    /// an add-another container and an index is given.
    pub fn context_for(&self, question_id: Uuid, add_another_index: Option<usize>) -> ExpressionContext {
        match (self.container_id_of(question_id), add_another_index) {
            (Some(container_id), Some(index)) => self.entry_scoped_context(container_id, index),
            _ => self.evaluation_context(),
        }
    }

    /// A component is visible iff every ancestor is visible and its own
    /// conditions hold under its `conditions_operator`. Groups carry no
    /// conditions. Evaluation fails closed: an undefined variable or any
    /// other evaluation failure hides the component.
    pub fn is_component_visible(
        &self,
        component_id: Uuid,
        add_another_index: Option<usize>,
    ) -> bool {
        let key = (component_id, add_another_index);
        if let Some(memo) = self.cache.borrow().visibility.get(&key) {
            return *memo;
        }
        let visible = self.compute_visibility(component_id, add_another_index);
        self.cache.borrow_mut().visibility.insert(key, visible);
        visible
    }

    fn compute_visibility(&self, component_id: Uuid, add_another_index: Option<usize>) -> bool {
        let Some(form) = self
            .collection
            .forms()
            .find(|f| f.find_component(component_id).is_some())
        else {
            return false;
        };
        let component = match form.find_component(component_id) {
            Some(component) => component,
            None => return false,
        };
        let Some(question) = component.as_question() else {
            // Groups have no conditions of their own.
            return true;
        };

        let conditions: Vec<_> = question.conditions().collect();
        if conditions.is_empty() {
            return true;
        }
        let ctx = self.context_for(question.id, add_another_index);
        let mut results = conditions.iter().map(|condition| {
            match expr::evaluate(condition, &ctx) {
                Ok(result) => result,
                Err(ExpressionError::UndefinedVariableInExpression(name)) => {
                    debug!(target: "submission", "condition on {} references unanswered {name}; hiding", question.id);
                    false
                }
                Err(err) => {
                    warn!(target: "submission", "condition on {} failed to evaluate: {err}", question.id);
                    false
                }
            }
        });
        match question.conditions_operator {
            ConditionsOperator::All => results.all(|r| r),
            ConditionsOperator::Any => results.any(|r| r),
        }
    }

    /// Forms in global section/form order. Forms carry no conditions, so all
    /// are returned; the method exists as the single traversal entry point.
    pub fn get_ordered_visible_forms(&self) -> Vec<&'a Form> {
        self.collection.forms().collect()
    }

    /// Visible questions of a form in pre-order.
    pub fn get_ordered_visible_questions(
        &self,
        form_id: Uuid,
        mode: TraversalMode,
    ) -> Vec<VisibleQuestion<'a>> {
        let mut out = Vec::new();
        let Some(form) = self.collection.find_form(form_id) else {
            return out;
        };
        self.walk(&form.components, mode, None, &mut out);
        out
    }

    fn walk(
        &self,
        components: &'a [Component],
        mode: TraversalMode,
        entry: Option<usize>,
        out: &mut Vec<VisibleQuestion<'a>>,
    ) {
        for component in components {
            if component.add_another() && entry.is_none() {
                match mode {
                    TraversalMode::Structural => {
                        // Descendants once, unscoped.
                        for question in component.questions() {
                            if self.is_component_visible(question.id, None) {
                                out.push(VisibleQuestion {
                                    question,
                                    add_another_index: None,
                                });
                            }
                        }
                    }
                    TraversalMode::Flattened => {
                        let count = self.submission.add_another_count(component.id());
                        for index in 0..count {
                            for question in component.questions() {
                                if self.is_component_visible(question.id, Some(index)) {
                                    out.push(VisibleQuestion {
                                        question,
                                        add_another_index: Some(index),
                                    });
                                }
                            }
                        }
                    }
                }
                continue;
            }
            match component {
                Component::Question(question) => {
                    if self.is_component_visible(question.id, entry) {
                        out.push(VisibleQuestion {
                            question,
                            add_another_index: entry,
                        });
                    }
                }
                Component::Group(group) => {
                    self.walk(&group.children, mode, entry, out);
                }
            }
        }
    }

    /// Visible questions of one add-another entry, in pre-order.
    pub fn get_visible_questions_for_entry(
        &self,
        container_id: Uuid,
        index: usize,
    ) -> Vec<VisibleQuestion<'a>> {
        let mut out = Vec::new();
        let Some(form) = self
            .collection
            .forms()
            .find(|f| f.find_component(container_id).is_some())
        else {
            return out;
        };
        let Some(container) = form.find_component(container_id) else {
            return out;
        };
        for question in container.questions() {
            if self.is_component_visible(question.id, Some(index)) {
                out.push(VisibleQuestion {
                    question,
                    add_another_index: Some(index),
                });
            }
        }
        out
    }

    /// Next question in the form's visible order. Navigation stays inside the
    /// current add-another entry; `None` at the end of the entry or form.
    pub fn get_next_question(
        &self,
        current_id: Uuid,
        add_another_index: Option<usize>,
    ) -> Option<&'a Question> {
        self.neighbour(current_id, add_another_index, 1)
    }

    pub fn get_previous_question(
        &self,
        current_id: Uuid,
        add_another_index: Option<usize>,
    ) -> Option<&'a Question> {
        self.neighbour(current_id, add_another_index, -1)
    }

    fn neighbour(
        &self,
        current_id: Uuid,
        add_another_index: Option<usize>,
        step: i64,
    ) -> Option<&'a Question> {
        let sequence: Vec<VisibleQuestion<'a>> = match self.container_id_of(current_id) {
            Some(container_id) => {
                let index = add_another_index?;
                self.get_visible_questions_for_entry(container_id, index)
            }
            None => {
                let form = self.collection.form_for_question(current_id)?;
                // Container questions are reached through their entry pages,
                // not top-level navigation.
                self.get_ordered_visible_questions(form.id, TraversalMode::Structural)
                    .into_iter()
                    .filter(|vq| self.container_id_of(vq.question.id).is_none())
                    .collect()
            }
        };
        let position = sequence
            .iter()
            .position(|vq| vq.question.id == current_id)?;
        let target = position as i64 + step;
        if target < 0 {
            return None;
        }
        sequence.get(target as usize).map(|vq| vq.question)
    }

    pub fn get_count_for_add_another(&self, container_id: Uuid) -> usize {
        self.submission.add_another_count(container_id)
    }

    /// One-line summary of an add-another entry: the author-configured
    /// summary-line questions when set and valid, otherwise every answered
    /// value in visible order.
    pub fn get_answer_summary_for_add_another(
        &self,
        container_id: Uuid,
        index: usize,
    ) -> AddAnotherSummary {
        let visible = self.get_visible_questions_for_entry(container_id, index);
        let is_answered = visible
            .iter()
            .all(|vq| self.get_answer(vq.question.id, Some(index)).is_some());

        let configured: Vec<Uuid> = self
            .collection
            .forms()
            .find_map(|f| f.find_component(container_id))
            .and_then(Component::as_group)
            .map(|g| {
                g.presentation_options
                    .add_another_summary_line_question_ids
                    .clone()
            })
            .unwrap_or_default();
        let question_ids: Vec<Uuid> = visible.iter().map(|vq| vq.question.id).collect();
        let valid_configured: Vec<Uuid> = configured
            .into_iter()
            .filter(|id| question_ids.contains(id))
            .collect();

        let parts: Vec<String> = if valid_configured.is_empty() {
            visible
                .iter()
                .filter_map(|vq| self.get_answer(vq.question.id, Some(index)))
                .map(|a| a.to_text_export())
                .collect()
        } else {
            valid_configured
                .iter()
                .filter_map(|id| self.get_answer(*id, Some(index)))
                .map(|a| a.to_text_export())
                .collect()
        };
        AddAnotherSummary {
            summary: parts.join(", "),
            is_answered,
        }
    }

    /// Per-form completeness: every visible question (per entry for
    /// add-another containers) has an answer. A container with zero entries
    /// contributes nothing and so counts as complete.
    pub fn get_all_questions_are_answered_for_form(&self, form_id: Uuid) -> bool {
        if let Some(memo) = self.cache.borrow().form_complete.get(&form_id) {
            return *memo;
        }
        let complete = self
            .get_ordered_visible_questions(form_id, TraversalMode::Flattened)
            .iter()
            .all(|vq| {
                self.get_answer(vq.question.id, vq.add_another_index)
                    .is_some()
            });
        self.cache
            .borrow_mut()
            .form_complete
            .insert(form_id, complete);
        complete
    }

    /// The stored answer as raw JSON, for validation error reporting.
    pub fn raw_answer(
        &self,
        question_id: Uuid,
        add_another_index: Option<usize>,
    ) -> Option<JsonValue> {
        let container = match (self.container_id_of(question_id), add_another_index) {
            (None, _) => None,
            (Some(_), None) => return None,
            (Some(container_id), Some(index)) => Some((container_id, index)),
        };
        self.submission.stored_answer(question_id, container).cloned()
    }
}
