use serde_json::Value as JsonValue;

/// Runtime value produced while evaluating an expression.
///
/// Answers enter the context in their `expression` projection: choice answers
/// as their key(s), yes/no as booleans, everything else as the raw value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    /// Converts a stored JSON value into a runtime value. Nulls and objects
    /// have no expression representation and return `None`.
    pub fn from_json(json: &JsonValue) -> Option<Value> {
        match json {
            JsonValue::Bool(b) => Some(Value::Bool(*b)),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Value::Int(i))
                } else {
                    n.as_f64().map(Value::Float)
                }
            }
            JsonValue::String(s) => Some(Value::Str(s.clone())),
            JsonValue::Array(items) => {
                let values: Option<Vec<Value>> = items.iter().map(Value::from_json).collect();
                values.map(Value::List)
            }
            JsonValue::Null | JsonValue::Object(_) => None,
        }
    }

    /// Renders the value for interpolation into author-facing text:
    /// booleans as "Yes"/"No", numbers plainly, lists comma-joined.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Bool(true) => "Yes".to_string(),
            Value::Bool(false) => "No".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.clone(),
            Value::List(items) => items
                .iter()
                .map(Value::to_display_string)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn booleans_display_as_yes_no() {
        assert_eq!(Value::Bool(true).to_display_string(), "Yes");
        assert_eq!(Value::Bool(false).to_display_string(), "No");
    }

    #[test]
    fn converts_json_scalars() {
        assert_eq!(Value::from_json(&json!(7)), Some(Value::Int(7)));
        assert_eq!(Value::from_json(&json!("hi")), Some(Value::Str("hi".into())));
        assert_eq!(Value::from_json(&json!(null)), None);
    }

    #[test]
    fn lists_display_comma_joined() {
        let value = Value::List(vec![Value::Str("a".into()), Value::Str("b".into())]);
        assert_eq!(value.to_display_string(), "a, b");
    }
}
