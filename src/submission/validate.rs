//! Sign-off validation: every reachable answered question is checked against
//! its managed validations before a submission can be sent onwards.

use log::{info, warn};
use serde_json::Value as JsonValue;

use crate::error::{ExpressionError, SubmissionValidationFailed, ValidationError};
use crate::expr::{self, ManagedExpression, interpolate};
use crate::submission::helper::{SubmissionHelper, TraversalMode};

pub struct SubmissionValidator<'h, 'a> {
    helper: &'h SubmissionHelper<'a>,
}

impl<'h, 'a> SubmissionValidator<'h, 'a> {
    pub fn new(helper: &'h SubmissionHelper<'a>) -> Self {
        SubmissionValidator { helper }
    }

    /// Walks every visible form's flattened visible questions and evaluates
    /// the validations of each answered one; unanswered questions are the
    /// completeness guard's concern, not ours. Undefined variables fail open:
    /// the validation is skipped with a warning rather than blocking
    /// sign-off.
    ///
    /// # Panics
    ///
    /// On a non-managed validation expression. Validations can only be
    /// authored through the managed catalogue, so one without a catalogue
    /// entry is a programmer error.
    pub fn validate_all_reachable_questions(&self) -> Result<(), SubmissionValidationFailed> {
        let mut errors = Vec::new();
        for form in self.helper.get_ordered_visible_forms() {
            for vq in self
                .helper
                .get_ordered_visible_questions(form.id, TraversalMode::Flattened)
            {
                let question = vq.question;
                if self
                    .helper
                    .get_answer(question.id, vq.add_another_index)
                    .is_none()
                {
                    continue;
                }
                for validation in question.validations() {
                    let managed = match ManagedExpression::from_expression(validation) {
                        Some(managed) => managed,
                        None => panic!(
                            "validation {} on question {} is not from the managed catalogue",
                            validation.id, question.id
                        ),
                    };
                    let ctx = self.helper.context_for(question.id, vq.add_another_index);
                    match expr::evaluate(validation, &ctx) {
                        Ok(true) => {}
                        Ok(false) => {
                            let message_ctx = ctx.for_expression(&validation.context);
                            errors.push(ValidationError {
                                question_id: question.id,
                                question_name: question.name.clone(),
                                form_id: form.id,
                                form_title: form.title.clone(),
                                error_message: interpolate(&managed.message(), &message_ctx, false),
                                answer: self
                                    .helper
                                    .raw_answer(question.id, vq.add_another_index)
                                    .unwrap_or(JsonValue::Null),
                                add_another_index: vq.add_another_index,
                            });
                        }
                        Err(ExpressionError::UndefinedVariableInExpression(name)) => {
                            warn!(
                                target: "submission",
                                "skipping validation {} on {}: undefined variable {name}",
                                validation.id, question.id
                            );
                        }
                        Err(err) => {
                            warn!(
                                target: "submission",
                                "skipping validation {} on {}: {err}",
                                validation.id, question.id
                            );
                        }
                    }
                }
            }
        }

        let submission_id = self.helper.submission().id;
        if errors.is_empty() {
            info!(target: "metrics", "submission_validation_passed submission={submission_id}");
            Ok(())
        } else {
            info!(
                target: "metrics",
                "submission_validation_failed submission={submission_id} errors={}",
                errors.len()
            );
            Err(SubmissionValidationFailed {
                submission_id,
                errors,
            })
        }
    }
}
