use std::collections::HashMap;

use serde_json::Map as JsonMap;
use serde_json::Value as JsonValue;

use crate::expr::value::Value;

/// Layered name binding for expression evaluation.
///
/// Two layers, checked in order: the submission's answers (keyed by safe qid)
/// and the expression's own `context` map of named references. The runtime
/// helper assembles the answer layer; an add-another scope is applied on top
/// by rebinding the container's descendant qids to one entry's values.
#[derive(Debug, Clone, Default)]
pub struct ExpressionContext {
    submission_data: HashMap<String, Value>,
    expression_context: HashMap<String, Value>,
}

impl ExpressionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.submission_data
            .get(name)
            .or_else(|| self.expression_context.get(name))
    }

    pub fn insert_answer(&mut self, safe_qid: String, value: Value) {
        self.submission_data.insert(safe_qid, value);
    }

    /// Replaces the expression-level layer, typically with the `context` map
    /// stored on the expression being evaluated.
    pub fn set_expression_context(&mut self, context: &JsonMap<String, JsonValue>) {
        self.expression_context = context
            .iter()
            .filter_map(|(key, json)| Value::from_json(json).map(|value| (key.clone(), value)))
            .collect();
    }

    /// Returns a copy with the expression-level layer applied.
    pub fn for_expression(&self, context: &JsonMap<String, JsonValue>) -> Self {
        let mut scoped = self.clone();
        scoped.set_expression_context(context);
        scoped
    }

    /// Returns a copy where the given qids are rebound (or unbound, for
    /// `None`) to one add-another entry's values.
    pub fn with_add_another_scope(&self, overrides: HashMap<String, Option<Value>>) -> Self {
        let mut scoped = self.clone();
        for (safe_qid, value) in overrides {
            match value {
                Some(value) => {
                    scoped.submission_data.insert(safe_qid, value);
                }
                None => {
                    scoped.submission_data.remove(&safe_qid);
                }
            }
        }
        scoped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn submission_answers_shadow_expression_context() {
        let mut ctx = ExpressionContext::new();
        ctx.insert_answer("q_a".into(), Value::Int(1));
        let mut extra = JsonMap::new();
        extra.insert("q_a".into(), json!(2));
        extra.insert("minimum_value".into(), json!(5));
        ctx.set_expression_context(&extra);

        assert_eq!(ctx.get("q_a"), Some(&Value::Int(1)));
        assert_eq!(ctx.get("minimum_value"), Some(&Value::Int(5)));
    }

    #[test]
    fn add_another_scope_rebinds_and_unbinds() {
        let mut ctx = ExpressionContext::new();
        ctx.insert_answer("q_child".into(), Value::Int(10));

        let mut overrides = HashMap::new();
        overrides.insert("q_child".to_string(), Some(Value::Int(55)));
        overrides.insert("q_other".to_string(), None);
        let scoped = ctx.with_add_another_scope(overrides);

        assert_eq!(scoped.get("q_child"), Some(&Value::Int(55)));
        assert_eq!(scoped.get("q_other"), None);
        // The original context is untouched.
        assert_eq!(ctx.get("q_child"), Some(&Value::Int(10)));
    }
}
