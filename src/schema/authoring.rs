//! Schema authoring operations.
//!
//! Every structural mutation of a collection goes through these methods,
//! which enforce the referential invariants: dense unique ordering within a
//! parent, unique titles/slugs/names, add-another placement, backwards-only
//! expression references, and strong data-source item references.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AuthoringError;
use crate::expr::managed::{ManagedExpression, supports};
use crate::schema::component::{
    Component, ConditionsOperator, DataSource, DataSourceItem, Expression, ExpressionType, Group,
    Guidance, PresentationOptions, Question, QuestionDataType,
};
use crate::schema::{Collection, DEFAULT_SECTION_SLUG, Form, Section};

/// Author-supplied fields for creating or updating a question.
#[derive(Debug, Clone)]
pub struct QuestionSpec {
    pub text: String,
    pub name: String,
    pub hint: Option<String>,
    pub guidance: Option<Guidance>,
    pub data_type: QuestionDataType,
    /// `(key, label)` pairs for choice data types; ignored otherwise.
    pub items: Vec<(String, String)>,
}

impl Collection {
    /// Creates a new collection at version 1 with the conventional default
    /// section, satisfying the "every collection has at least one section"
    /// invariant from day one.
    pub fn new(
        grant_id: Uuid,
        name: &str,
        created_by: Uuid,
        now: DateTime<Utc>,
    ) -> Collection {
        Collection {
            id: Uuid::new_v4(),
            version: 1,
            grant_id,
            name: name.to_string(),
            slug: slugify(name),
            requires_certification: false,
            created_by,
            created_at_utc: now,
            sections: vec![Section {
                id: Uuid::new_v4(),
                title: "Default section".to_string(),
                slug: DEFAULT_SECTION_SLUG.to_string(),
                order: 0,
                forms: Vec::new(),
            }],
        }
    }

    /// Structural edits are only permitted while no live submissions exist
    /// against this `(id, version)`.
    pub fn assert_editable(&self, live_submissions: usize) -> Result<(), AuthoringError> {
        if live_submissions > 0 {
            return Err(AuthoringError::CollectionLocked {
                collection_id: self.id,
                version: self.version,
                live_submissions,
            });
        }
        Ok(())
    }

    /// Clones the schema at `version + 1`. Component ids are retained so the
    /// new version stays comparable with the old; submissions remain bound to
    /// the version they were created under.
    pub fn create_new_version(&self) -> Collection {
        let mut next = self.clone();
        next.version += 1;
        next
    }

    pub fn add_section(&mut self, title: &str) -> Result<Uuid, AuthoringError> {
        let slug = slugify(title);
        self.check_unique_section(title, &slug, None)?;
        let section = Section {
            id: Uuid::new_v4(),
            title: title.to_string(),
            slug,
            order: self.sections.len(),
            forms: Vec::new(),
        };
        let id = section.id;
        self.sections.push(section);
        Ok(id)
    }

    pub fn rename_section(&mut self, section_id: Uuid, title: &str) -> Result<(), AuthoringError> {
        let slug = slugify(title);
        self.check_unique_section(title, &slug, Some(section_id))?;
        let section = self
            .sections
            .iter_mut()
            .find(|s| s.id == section_id)
            .ok_or(AuthoringError::SectionNotFound(section_id))?;
        section.title = title.to_string();
        section.slug = slug;
        Ok(())
    }

    /// Moves a section to a new position; sibling orders stay dense and
    /// 0-based.
    pub fn move_section(
        &mut self,
        section_id: Uuid,
        new_order: usize,
    ) -> Result<(), AuthoringError> {
        let from = self
            .sections
            .iter()
            .position(|s| s.id == section_id)
            .ok_or(AuthoringError::SectionNotFound(section_id))?;
        let section = self.sections.remove(from);
        let to = new_order.min(self.sections.len());
        self.sections.insert(to, section);
        reindex_sections(&mut self.sections);
        Ok(())
    }

    pub fn add_form(&mut self, section_id: Uuid, title: &str) -> Result<Uuid, AuthoringError> {
        let slug = slugify(title);
        let section = self
            .sections
            .iter()
            .find(|s| s.id == section_id)
            .ok_or(AuthoringError::SectionNotFound(section_id))?;
        check_unique_form(section, title, &slug, None)?;

        let section = self
            .sections
            .iter_mut()
            .find(|s| s.id == section_id)
            .expect("section presence checked above");
        let form = Form {
            id: Uuid::new_v4(),
            title: title.to_string(),
            slug,
            order: section.forms.len(),
            components: Vec::new(),
        };
        let id = form.id;
        section.forms.push(form);
        Ok(id)
    }

    pub fn rename_form(&mut self, form_id: Uuid, title: &str) -> Result<(), AuthoringError> {
        let slug = slugify(title);
        let section_id = self
            .sections
            .iter()
            .find(|s| s.forms.iter().any(|f| f.id == form_id))
            .map(|s| s.id)
            .ok_or(AuthoringError::FormNotFound(form_id))?;
        let section = self.find_section(section_id).expect("section found above");
        check_unique_form(section, title, &slug, Some(form_id))?;

        let form = self
            .sections
            .iter_mut()
            .flat_map(|s| s.forms.iter_mut())
            .find(|f| f.id == form_id)
            .expect("form presence checked above");
        form.title = title.to_string();
        form.slug = slug;
        Ok(())
    }

    pub fn move_form(&mut self, form_id: Uuid, new_order: usize) -> Result<(), AuthoringError> {
        let section = self
            .sections
            .iter_mut()
            .find(|s| s.forms.iter().any(|f| f.id == form_id))
            .ok_or(AuthoringError::FormNotFound(form_id))?;
        let from = section
            .forms
            .iter()
            .position(|f| f.id == form_id)
            .expect("form presence checked above");
        let form = section.forms.remove(from);
        let to = new_order.min(section.forms.len());
        section.forms.insert(to, form);
        for (order, form) in section.forms.iter_mut().enumerate() {
            form.order = order;
        }
        Ok(())
    }

    pub fn add_question(
        &mut self,
        form_id: Uuid,
        parent_group_id: Option<Uuid>,
        spec: QuestionSpec,
    ) -> Result<Uuid, AuthoringError> {
        {
            let form = self
                .find_form(form_id)
                .ok_or(AuthoringError::FormNotFound(form_id))?;
            check_unique_question(form, &spec, None)?;
        }

        let data_source = build_data_source(&spec)?;
        let question = Question {
            id: Uuid::new_v4(),
            text: spec.text.clone(),
            name: spec.name.clone(),
            slug: slugify(&spec.text),
            order: 0, // set on insert
            hint: spec.hint.clone(),
            guidance: spec.guidance.clone(),
            data_type: spec.data_type,
            data_source,
            expressions: Vec::new(),
            add_another: false,
            conditions_operator: ConditionsOperator::default(),
        };
        let id = question.id;
        self.insert_component(form_id, parent_group_id, Component::Question(question))?;
        Ok(id)
    }

    pub fn add_group(
        &mut self,
        form_id: Uuid,
        parent_group_id: Option<Uuid>,
        title: &str,
    ) -> Result<Uuid, AuthoringError> {
        let slug = slugify(title);
        {
            let form = self
                .find_form(form_id)
                .ok_or(AuthoringError::FormNotFound(form_id))?;
            let clash = form
                .components
                .iter()
                .flat_map(flatten)
                .any(|c| c.as_group().is_some_and(|g| g.slug == slug));
            if clash {
                return Err(AuthoringError::DuplicateValue {
                    field_name: "title".to_string(),
                    value: title.to_string(),
                });
            }
        }
        let group = Group {
            id: Uuid::new_v4(),
            title: title.to_string(),
            slug,
            order: 0, // set on insert
            guidance: None,
            add_another: false,
            presentation_options: PresentationOptions::default(),
            children: Vec::new(),
        };
        let id = group.id;
        self.insert_component(form_id, parent_group_id, Component::Group(group))?;
        Ok(id)
    }

    pub fn update_question(
        &mut self,
        question_id: Uuid,
        spec: QuestionSpec,
    ) -> Result<(), AuthoringError> {
        {
            let form = self
                .form_for_question(question_id)
                .ok_or(AuthoringError::ComponentNotFound(question_id))?;
            check_unique_question(form, &spec, Some(question_id))?;
        }
        let data_source = build_data_source(&spec)?;
        let question = self
            .find_question_mut(question_id)
            .ok_or(AuthoringError::ComponentNotFound(question_id))?;
        question.text = spec.text.clone();
        question.slug = slugify(&spec.text);
        question.name = spec.name;
        question.hint = spec.hint;
        question.guidance = spec.guidance;
        question.data_type = spec.data_type;
        if question.data_type.is_choice() {
            question.data_source = data_source;
        } else {
            question.data_source = None;
        }
        Ok(())
    }

    /// Removes a component (and its descendants). Rejected while another
    /// question's expression still references a removed question.
    pub fn remove_component(&mut self, component_id: Uuid) -> Result<(), AuthoringError> {
        let removed_question_ids: Vec<Uuid> = {
            let form = self
                .form_containing(component_id)
                .ok_or(AuthoringError::ComponentNotFound(component_id))?;
            let component = form
                .find_component(component_id)
                .expect("component located above");
            component.questions().iter().map(|q| q.id).collect()
        };

        for (question, expression) in self.expressions() {
            if removed_question_ids.contains(&question.id) {
                continue;
            }
            if let Some(referenced) = expression
                .referenced_question_ids
                .iter()
                .find(|id| removed_question_ids.contains(id))
            {
                return Err(AuthoringError::QuestionReferenceDependency {
                    question_id: *referenced,
                    expression_id: expression.id,
                });
            }
        }

        let form = self
            .form_containing_mut(component_id)
            .expect("component located above");
        remove_from(&mut form.components, component_id);
        Ok(())
    }

    /// Moves a component within its sibling list. Rejected when the move
    /// would put a question ahead of one whose conditions reference it.
    pub fn move_component(
        &mut self,
        component_id: Uuid,
        new_order: usize,
    ) -> Result<(), AuthoringError> {
        let snapshot = self.clone();

        let form = self
            .form_containing_mut(component_id)
            .ok_or(AuthoringError::ComponentNotFound(component_id))?;
        let siblings = siblings_of_mut(&mut form.components, component_id)
            .expect("component located above");
        let from = siblings
            .iter()
            .position(|c| c.id() == component_id)
            .expect("component located above");
        let component = siblings.remove(from);
        let to = new_order.min(siblings.len());
        siblings.insert(to, component);
        for (order, sibling) in siblings.iter_mut().enumerate() {
            sibling.set_order(order);
        }

        if let Some((question_id, referenced_question_id)) = self.chronology_breach() {
            *self = snapshot;
            return Err(AuthoringError::CollectionChronology {
                question_id,
                referenced_question_id,
            });
        }
        Ok(())
    }

    /// First condition whose referenced question no longer strictly precedes
    /// the question carrying it.
    fn chronology_breach(&self) -> Option<(Uuid, Uuid)> {
        let order = self.ordered_question_ids();
        for (question, expression) in self.expressions() {
            if expression.kind != ExpressionType::Condition {
                continue;
            }
            let Some(subject) = order.iter().position(|id| *id == question.id) else {
                continue;
            };
            for referenced in &expression.referenced_question_ids {
                if let Some(position) = order.iter().position(|id| id == referenced) {
                    if position >= subject {
                        return Some((question.id, *referenced));
                    }
                }
            }
        }
        None
    }

    /// Sets or clears `add_another`. The flag may only sit on the outermost
    /// container of a nested chain: no ancestor and no descendant of an
    /// add-another component may itself be add-another.
    pub fn set_add_another(
        &mut self,
        component_id: Uuid,
        enabled: bool,
    ) -> Result<(), AuthoringError> {
        if enabled {
            let form = self
                .form_containing(component_id)
                .ok_or(AuthoringError::ComponentNotFound(component_id))?;
            let ancestors = form
                .ancestors_of(component_id)
                .ok_or(AuthoringError::ComponentNotFound(component_id))?;
            if let Some(ancestor) = ancestors.iter().find(|g| g.add_another) {
                return Err(AuthoringError::AddAnotherNotValid(format!(
                    "ancestor group '{}' already repeats",
                    ancestor.title
                )));
            }
            let component = form
                .find_component(component_id)
                .expect("component located above");
            if let Component::Group(group) = component {
                if group.children.iter().any(Component::contains_add_another) {
                    return Err(AuthoringError::AddAnotherNotValid(
                        "a descendant component already repeats".to_string(),
                    ));
                }
            }
        }

        let form = self
            .form_containing_mut(component_id)
            .ok_or(AuthoringError::ComponentNotFound(component_id))?;
        let component = find_component_mut(&mut form.components, component_id)
            .expect("component located above");
        match component {
            Component::Question(q) => q.add_another = enabled,
            Component::Group(g) => g.add_another = enabled,
        }
        Ok(())
    }

    pub fn set_conditions_operator(
        &mut self,
        question_id: Uuid,
        operator: ConditionsOperator,
    ) -> Result<(), AuthoringError> {
        let question = self
            .find_question_mut(question_id)
            .ok_or(AuthoringError::ComponentNotFound(question_id))?;
        question.conditions_operator = operator;
        Ok(())
    }

    /// Attaches a managed condition to a question. The referenced question
    /// must be strictly earlier in the collection's global component order,
    /// which makes reference cycles structurally impossible.
    pub fn add_managed_condition(
        &mut self,
        question_id: Uuid,
        managed: &ManagedExpression,
    ) -> Result<Uuid, AuthoringError> {
        let referenced_id = managed.question_id();
        let order = self.ordered_question_ids();
        let subject = order
            .iter()
            .position(|id| *id == question_id)
            .ok_or(AuthoringError::ComponentNotFound(question_id))?;
        let referenced = order
            .iter()
            .position(|id| *id == referenced_id)
            .ok_or(AuthoringError::ComponentNotFound(referenced_id))?;
        if referenced >= subject {
            return Err(AuthoringError::CollectionChronology {
                question_id,
                referenced_question_id: referenced_id,
            });
        }
        self.check_managed_data_type(referenced_id, managed)?;
        self.attach_expression(question_id, managed.to_expression(ExpressionType::Condition))
    }

    /// Attaches a managed validation; validations reference the question they
    /// sit on.
    pub fn add_managed_validation(
        &mut self,
        question_id: Uuid,
        managed: &ManagedExpression,
    ) -> Result<Uuid, AuthoringError> {
        if managed.question_id() != question_id {
            return Err(AuthoringError::CollectionChronology {
                question_id,
                referenced_question_id: managed.question_id(),
            });
        }
        self.check_managed_data_type(question_id, managed)?;
        self.attach_expression(
            question_id,
            managed.to_expression(ExpressionType::Validation),
        )
    }

    pub fn remove_expression(
        &mut self,
        question_id: Uuid,
        expression_id: Uuid,
    ) -> Result<(), AuthoringError> {
        let question = self
            .find_question_mut(question_id)
            .ok_or(AuthoringError::ComponentNotFound(question_id))?;
        question.expressions.retain(|e| e.id != expression_id);
        Ok(())
    }

    /// Replaces a choice question's items with the given `(key, label)`
    /// pairs. Existing items keep their ids; removing an item that an
    /// expression still references is rejected.
    pub fn upsert_data_source_items(
        &mut self,
        question_id: Uuid,
        items: &[(String, String)],
    ) -> Result<(), AuthoringError> {
        let mut seen = Vec::new();
        for (key, _) in items {
            if seen.contains(&key) {
                return Err(AuthoringError::DuplicateValue {
                    field_name: "key".to_string(),
                    value: key.clone(),
                });
            }
            seen.push(key);
        }

        // Items that would disappear must not be referenced anywhere.
        let removed: Vec<(Uuid, String)> = {
            let question = self
                .find_question(question_id)
                .ok_or(AuthoringError::ComponentNotFound(question_id))?;
            let Some(data_source) = &question.data_source else {
                return Err(AuthoringError::DataSourceNotFound(question_id));
            };
            data_source
                .items
                .iter()
                .filter(|item| !items.iter().any(|(key, _)| *key == item.key))
                .map(|item| (item.id, item.key.clone()))
                .collect()
        };
        for (item_id, _) in &removed {
            for (_, expression) in self.expressions() {
                if expression
                    .data_source_item_references
                    .iter()
                    .any(|r| r.data_source_item_id == *item_id)
                {
                    return Err(AuthoringError::DataSourceItemReferenceDependency {
                        item_id: *item_id,
                        expression_id: expression.id,
                    });
                }
            }
        }

        let question = self
            .find_question_mut(question_id)
            .expect("question located above");
        let data_source = question
            .data_source
            .as_mut()
            .expect("data source located above");
        let previous = std::mem::take(&mut data_source.items);
        data_source.items = items
            .iter()
            .enumerate()
            .map(|(order, (key, label))| DataSourceItem {
                id: previous
                    .iter()
                    .find(|item| item.key == *key)
                    .map(|item| item.id)
                    .unwrap_or_else(Uuid::new_v4),
                key: key.clone(),
                label: label.clone(),
                order,
            })
            .collect();
        Ok(())
    }

    fn check_managed_data_type(
        &self,
        referenced_question_id: Uuid,
        managed: &ManagedExpression,
    ) -> Result<(), AuthoringError> {
        let referenced = self
            .find_question(referenced_question_id)
            .ok_or(AuthoringError::ComponentNotFound(referenced_question_id))?;
        if !supports(managed.name(), referenced.data_type) {
            return Err(AuthoringError::UnsupportedDataType {
                managed_name: managed.name().description().to_string(),
                data_type: referenced.data_type.label().to_string(),
            });
        }
        Ok(())
    }

    fn attach_expression(
        &mut self,
        question_id: Uuid,
        expression: Expression,
    ) -> Result<Uuid, AuthoringError> {
        let question = self
            .find_question_mut(question_id)
            .ok_or(AuthoringError::ComponentNotFound(question_id))?;
        let id = expression.id;
        question.expressions.push(expression);
        Ok(id)
    }

    fn insert_component(
        &mut self,
        form_id: Uuid,
        parent_group_id: Option<Uuid>,
        component: Component,
    ) -> Result<(), AuthoringError> {
        let form = self
            .sections
            .iter_mut()
            .flat_map(|s| s.forms.iter_mut())
            .find(|f| f.id == form_id)
            .ok_or(AuthoringError::FormNotFound(form_id))?;
        let children = match parent_group_id {
            None => &mut form.components,
            Some(group_id) => {
                let Some(Component::Group(group)) =
                    find_component_mut(&mut form.components, group_id)
                else {
                    return Err(AuthoringError::ComponentNotFound(group_id));
                };
                &mut group.children
            }
        };
        let mut component = component;
        component.set_order(children.len());
        children.push(component);
        Ok(())
    }

    fn check_unique_section(
        &self,
        title: &str,
        slug: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), AuthoringError> {
        for section in &self.sections {
            if Some(section.id) == exclude {
                continue;
            }
            if section.title == title || section.slug == slug {
                return Err(AuthoringError::DuplicateValue {
                    field_name: "title".to_string(),
                    value: title.to_string(),
                });
            }
        }
        Ok(())
    }

    fn form_containing(&self, component_id: Uuid) -> Option<&Form> {
        self.forms()
            .find(|form| form.find_component(component_id).is_some())
    }

    fn form_containing_mut(&mut self, component_id: Uuid) -> Option<&mut Form> {
        self.sections
            .iter_mut()
            .flat_map(|s| s.forms.iter_mut())
            .find(|form| form.find_component(component_id).is_some())
    }

    pub fn find_question_mut(&mut self, question_id: Uuid) -> Option<&mut Question> {
        for section in &mut self.sections {
            for form in &mut section.forms {
                if let Some(Component::Question(question)) =
                    find_component_mut(&mut form.components, question_id)
                {
                    return Some(question);
                }
            }
        }
        None
    }
}

fn build_data_source(spec: &QuestionSpec) -> Result<Option<DataSource>, AuthoringError> {
    if !spec.data_type.is_choice() {
        return Ok(None);
    }
    let mut seen: Vec<&String> = Vec::new();
    for (key, _) in &spec.items {
        if seen.contains(&key) {
            return Err(AuthoringError::DuplicateValue {
                field_name: "key".to_string(),
                value: key.clone(),
            });
        }
        seen.push(key);
    }
    Ok(Some(DataSource {
        id: Uuid::new_v4(),
        items: spec
            .items
            .iter()
            .enumerate()
            .map(|(order, (key, label))| DataSourceItem {
                id: Uuid::new_v4(),
                key: key.clone(),
                label: label.clone(),
                order,
            })
            .collect(),
    }))
}

fn check_unique_form(
    section: &Section,
    title: &str,
    slug: &str,
    exclude: Option<Uuid>,
) -> Result<(), AuthoringError> {
    for form in &section.forms {
        if Some(form.id) == exclude {
            continue;
        }
        if form.title == title || form.slug == slug {
            return Err(AuthoringError::DuplicateValue {
                field_name: "title".to_string(),
                value: title.to_string(),
            });
        }
    }
    Ok(())
}

fn check_unique_question(
    form: &Form,
    spec: &QuestionSpec,
    exclude: Option<Uuid>,
) -> Result<(), AuthoringError> {
    let slug = slugify(&spec.text);
    for question in form.questions() {
        if Some(question.id) == exclude {
            continue;
        }
        if question.text == spec.text || question.slug == slug {
            return Err(AuthoringError::DuplicateValue {
                field_name: "text".to_string(),
                value: spec.text.clone(),
            });
        }
        if question.name == spec.name {
            return Err(AuthoringError::DuplicateValue {
                field_name: "name".to_string(),
                value: spec.name.clone(),
            });
        }
    }
    Ok(())
}

fn flatten(component: &Component) -> Vec<&Component> {
    let mut out = vec![component];
    if let Component::Group(group) = component {
        for child in &group.children {
            out.extend(flatten(child));
        }
    }
    out
}

fn find_component_mut(components: &mut [Component], id: Uuid) -> Option<&mut Component> {
    for component in components {
        if component.id() == id {
            return Some(component);
        }
        if let Component::Group(group) = component {
            if let Some(found) = find_component_mut(&mut group.children, id) {
                return Some(found);
            }
        }
    }
    None
}

/// The sibling list holding the component: the top-level list of its form or
/// its parent group's children.
fn siblings_of_mut(components: &mut Vec<Component>, id: Uuid) -> Option<&mut Vec<Component>> {
    if components.iter().any(|c| c.id() == id) {
        return Some(components);
    }
    for component in components {
        if let Component::Group(group) = component {
            if let Some(found) = siblings_of_mut(&mut group.children, id) {
                return Some(found);
            }
        }
    }
    None
}

fn remove_from(components: &mut Vec<Component>, id: Uuid) -> bool {
    if let Some(index) = components.iter().position(|c| c.id() == id) {
        components.remove(index);
        for (order, component) in components.iter_mut().enumerate() {
            component.set_order(order);
        }
        return true;
    }
    for component in components.iter_mut() {
        if let Component::Group(group) = component {
            if remove_from(&mut group.children, id) {
                return true;
            }
        }
    }
    false
}

fn reindex_sections(sections: &mut [Section]) {
    for (order, section) in sections.iter_mut().enumerate() {
        section.order = order;
    }
}

/// Lowercase, non-alphanumerics collapsed to single dashes.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_dash = true;
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection() -> Collection {
        Collection::new(Uuid::new_v4(), "Test collection", Uuid::new_v4(), Utc::now())
    }

    fn question_spec(text: &str, data_type: QuestionDataType) -> QuestionSpec {
        QuestionSpec {
            text: text.to_string(),
            name: text.to_string(),
            hint: None,
            guidance: None,
            data_type,
            items: Vec::new(),
        }
    }

    #[test]
    fn new_collection_has_a_default_section() {
        let collection = collection();
        assert_eq!(collection.sections.len(), 1);
        assert_eq!(collection.sections[0].slug, DEFAULT_SECTION_SLUG);
    }

    #[test]
    fn duplicate_form_title_is_rejected() {
        let mut collection = collection();
        let section_id = collection.sections[0].id;
        collection.add_form(section_id, "Park details").unwrap();
        let err = collection.add_form(section_id, "Park details").unwrap_err();
        assert!(matches!(err, AuthoringError::DuplicateValue { .. }));
    }

    #[test]
    fn orders_stay_dense_after_moves() {
        let mut collection = collection();
        let section_id = collection.sections[0].id;
        let a = collection.add_form(section_id, "A").unwrap();
        let _b = collection.add_form(section_id, "B").unwrap();
        let c = collection.add_form(section_id, "C").unwrap();

        collection.move_form(c, 0).unwrap();
        let section = &collection.sections[0];
        let orders: Vec<usize> = section.forms.iter().map(|f| f.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(section.forms[0].id, c);
        assert_eq!(section.forms[1].id, a);
    }

    #[test]
    fn moving_a_component_cannot_break_reference_order() {
        let mut collection = collection();
        let section_id = collection.sections[0].id;
        let form_id = collection.add_form(section_id, "Tasks").unwrap();
        let gate = collection
            .add_question(form_id, None, question_spec("Any parks?", QuestionDataType::YesNo))
            .unwrap();
        let detail = collection
            .add_question(form_id, None, question_spec("Details", QuestionDataType::TextSingleLine))
            .unwrap();
        collection
            .add_managed_condition(detail, &ManagedExpression::IsYes { question_id: gate })
            .unwrap();

        // Swapping them would make the condition point forwards.
        let err = collection.move_component(gate, 1).unwrap_err();
        assert!(matches!(err, AuthoringError::CollectionChronology { .. }));
        let form = collection.find_form(form_id).unwrap();
        assert_eq!(form.components[0].id(), gate);
        assert_eq!(form.components[1].id(), detail);

        // An unreferenced question moves freely and orders stay dense.
        let third = collection
            .add_question(form_id, None, question_spec("Anything else?", QuestionDataType::TextSingleLine))
            .unwrap();
        collection.move_component(third, 0).unwrap();
        let form = collection.find_form(form_id).unwrap();
        let ids: Vec<Uuid> = form.components.iter().map(Component::id).collect();
        assert_eq!(ids, vec![third, gate, detail]);
        let orders: Vec<usize> = form.questions().iter().map(|q| q.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn add_another_rejected_on_nested_chain() {
        let mut collection = collection();
        let section_id = collection.sections[0].id;
        let form_id = collection.add_form(section_id, "Tasks").unwrap();
        let outer = collection.add_group(form_id, None, "Outer").unwrap();
        let inner = collection.add_group(form_id, Some(outer), "Inner").unwrap();

        collection.set_add_another(outer, true).unwrap();
        let err = collection.set_add_another(inner, true).unwrap_err();
        assert!(matches!(err, AuthoringError::AddAnotherNotValid(_)));

        // And the other way round: a repeating descendant blocks the ancestor.
        collection.set_add_another(outer, false).unwrap();
        collection.set_add_another(inner, true).unwrap();
        let err = collection.set_add_another(outer, true).unwrap_err();
        assert!(matches!(err, AuthoringError::AddAnotherNotValid(_)));
    }

    #[test]
    fn conditions_must_point_backwards() {
        let mut collection = collection();
        let section_id = collection.sections[0].id;
        let form_id = collection.add_form(section_id, "Tasks").unwrap();
        let first = collection
            .add_question(form_id, None, question_spec("How many?", QuestionDataType::Integer))
            .unwrap();
        let second = collection
            .add_question(form_id, None, question_spec("Details", QuestionDataType::Integer))
            .unwrap();

        // Forwards reference: second cannot gate first.
        let err = collection
            .add_managed_condition(
                first,
                &ManagedExpression::GreaterThan {
                    question_id: second,
                    minimum_value: 1,
                    inclusive: false,
                },
            )
            .unwrap_err();
        assert!(matches!(err, AuthoringError::CollectionChronology { .. }));

        // Backwards reference is fine.
        collection
            .add_managed_condition(
                second,
                &ManagedExpression::GreaterThan {
                    question_id: first,
                    minimum_value: 1,
                    inclusive: false,
                },
            )
            .unwrap();
    }

    #[test]
    fn referenced_data_source_item_cannot_be_removed() {
        let mut collection = collection();
        let section_id = collection.sections[0].id;
        let form_id = collection.add_form(section_id, "Tasks").unwrap();
        let mut spec = question_spec("Colour?", QuestionDataType::SingleChoice);
        spec.items = vec![("red".into(), "Red".into()), ("blue".into(), "Blue".into())];
        let choice = collection.add_question(form_id, None, spec).unwrap();
        let gated = collection
            .add_question(form_id, None, question_spec("Why red?", QuestionDataType::TextSingleLine))
            .unwrap();

        let items = collection
            .find_question(choice)
            .unwrap()
            .data_source
            .as_ref()
            .unwrap()
            .items
            .clone();
        collection
            .add_managed_condition(
                gated,
                &ManagedExpression::AnyOf {
                    question_id: choice,
                    items: vec![items[0].clone()],
                },
            )
            .unwrap();

        let err = collection
            .upsert_data_source_items(choice, &[("blue".into(), "Blue".into())])
            .unwrap_err();
        assert!(matches!(
            err,
            AuthoringError::DataSourceItemReferenceDependency { .. }
        ));

        // Removing the unreferenced item is fine, and 'red' keeps its id.
        collection
            .upsert_data_source_items(choice, &[("red".into(), "Crimson".into())])
            .unwrap();
        let data_source = collection
            .find_question(choice)
            .unwrap()
            .data_source
            .as_ref()
            .unwrap();
        assert_eq!(data_source.items[0].id, items[0].id);
        assert_eq!(data_source.items[0].label, "Crimson");
    }

    #[test]
    fn removing_a_referenced_question_is_rejected() {
        let mut collection = collection();
        let section_id = collection.sections[0].id;
        let form_id = collection.add_form(section_id, "Tasks").unwrap();
        let first = collection
            .add_question(form_id, None, question_spec("How many?", QuestionDataType::Integer))
            .unwrap();
        let second = collection
            .add_question(form_id, None, question_spec("Details", QuestionDataType::TextSingleLine))
            .unwrap();
        collection
            .add_managed_condition(
                second,
                &ManagedExpression::GreaterThan {
                    question_id: first,
                    minimum_value: 0,
                    inclusive: false,
                },
            )
            .unwrap();

        let err = collection.remove_component(first).unwrap_err();
        assert!(matches!(
            err,
            AuthoringError::QuestionReferenceDependency { .. }
        ));

        // Removing the dependent question first unblocks the removal.
        collection.remove_component(second).unwrap();
        collection.remove_component(first).unwrap();
    }

    #[test]
    fn new_version_keeps_component_ids() {
        let mut collection = collection();
        let section_id = collection.sections[0].id;
        let form_id = collection.add_form(section_id, "Tasks").unwrap();
        let q = collection
            .add_question(form_id, None, question_spec("How many?", QuestionDataType::Integer))
            .unwrap();

        let next = collection.create_new_version();
        assert_eq!(next.id, collection.id);
        assert_eq!(next.version, 2);
        assert!(next.find_question(q).is_some());
    }

    #[test]
    fn locked_collection_rejects_edits() {
        let collection = collection();
        assert!(collection.assert_editable(0).is_ok());
        assert!(matches!(
            collection.assert_editable(3),
            Err(AuthoringError::CollectionLocked { .. })
        ));
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("What is the name of the park?"), "what-is-the-name-of-the-park");
        assert_eq!(slugify("  A  --  B  "), "a-b");
    }
}
