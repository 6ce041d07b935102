//! Schema model: the Collection -> Section -> Form -> (Group | Question)
//! tree, with ordering and referential invariants enforced by the authoring
//! operations in `authoring`.

pub mod authoring;
pub mod component;
pub mod qid;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use component::{
    Component, ConditionsOperator, DataSource, DataSourceItem, DataSourceItemReference,
    Expression, ExpressionType, Group, Guidance, PresentationOptions, Question, QuestionDataType,
};
pub use qid::{parse_safe_qid, safe_qid};

/// A grant is opaque to the runtime beyond its identity; it owns collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grant {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub is_live: bool,
}

/// The slug given to the section created automatically when the author has
/// not split the collection into sections.
pub const DEFAULT_SECTION_SLUG: &str = "default";

/// A versioned schema of one reporting exercise for a grant.
///
/// `id` is stable across versions; `version` increments on schema change so
/// existing submissions stay attached to the version they were created under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: Uuid,
    pub version: u32,
    pub grant_id: Uuid,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub requires_certification: bool,
    pub created_by: Uuid,
    pub created_at_utc: DateTime<Utc>,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub order: usize,
    pub forms: Vec<Form>,
}

/// A "task": a page-group a recipient completes as a unit and marks complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Form {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub order: usize,
    pub components: Vec<Component>,
}

impl Form {
    /// All questions of the form, flattened in document (pre-order) order.
    pub fn questions(&self) -> Vec<&Question> {
        let mut questions = Vec::new();
        component::collect_questions(&self.components, &mut questions);
        questions
    }

    pub fn find_question(&self, question_id: Uuid) -> Option<&Question> {
        self.questions().into_iter().find(|q| q.id == question_id)
    }

    pub fn find_component(&self, component_id: Uuid) -> Option<&Component> {
        fn search(components: &[Component], id: Uuid) -> Option<&Component> {
            for component in components {
                if component.id() == id {
                    return Some(component);
                }
                if let Component::Group(group) = component {
                    if let Some(found) = search(&group.children, id) {
                        return Some(found);
                    }
                }
            }
            None
        }
        search(&self.components, component_id)
    }

    /// Ancestor groups of a component, outermost first. `None` when the
    /// component is not part of this form.
    pub fn ancestors_of(&self, component_id: Uuid) -> Option<Vec<&Group>> {
        fn search<'a>(
            components: &'a [Component],
            id: Uuid,
            stack: &mut Vec<&'a Group>,
        ) -> bool {
            for component in components {
                if component.id() == id {
                    return true;
                }
                if let Component::Group(group) = component {
                    stack.push(group);
                    if search(&group.children, id, stack) {
                        return true;
                    }
                    stack.pop();
                }
            }
            false
        }
        let mut stack = Vec::new();
        if search(&self.components, component_id, &mut stack) {
            Some(stack)
        } else {
            None
        }
    }

    /// The add-another container a component belongs to: itself when it is
    /// add-another, otherwise the (single, outermost) add-another ancestor.
    pub fn add_another_container_of(&self, component_id: Uuid) -> Option<&Component> {
        let component = self.find_component(component_id)?;
        if component.add_another() {
            return Some(component);
        }
        let ancestors = self.ancestors_of(component_id)?;
        for group in &ancestors {
            if group.add_another {
                return self.find_component(group.id);
            }
        }
        None
    }
}

impl Collection {
    /// Forms in global order: sections by `order`, forms by `order` within.
    pub fn forms(&self) -> impl Iterator<Item = &Form> {
        self.sections.iter().flat_map(|section| section.forms.iter())
    }

    pub fn find_form(&self, form_id: Uuid) -> Option<&Form> {
        self.forms().find(|form| form.id == form_id)
    }

    pub fn find_section(&self, section_id: Uuid) -> Option<&Section> {
        self.sections.iter().find(|section| section.id == section_id)
    }

    pub fn form_for_question(&self, question_id: Uuid) -> Option<&Form> {
        self.forms()
            .find(|form| form.find_question(question_id).is_some())
    }

    pub fn find_question(&self, question_id: Uuid) -> Option<&Question> {
        self.forms()
            .find_map(|form| form.find_question(question_id))
    }

    /// Every question id in the collection's global component order. The
    /// chronology invariant is defined against this sequence.
    pub fn ordered_question_ids(&self) -> Vec<Uuid> {
        self.forms()
            .flat_map(|form| form.questions().into_iter().map(|q| q.id))
            .collect()
    }

    /// All expressions anywhere in the collection, with their owning question.
    pub fn expressions(&self) -> Vec<(&Question, &Expression)> {
        self.forms()
            .flat_map(|form| form.questions())
            .flat_map(|q| q.expressions.iter().map(move |e| (q, e)))
            .collect()
    }
}
