use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use uuid::Uuid;

static SAFE_QID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^q_[0-9a-f]{32}$").unwrap());

#[derive(Debug, Clone, Error, PartialEq)]
#[error("invalid safe qid: {0}")]
pub struct InvalidSafeQid(pub String);

/// Encodes a question id for use as a variable name in expressions and as a
/// dynamically-built input name: `q_` + 32 lowercase hex digits, no dashes.
pub fn safe_qid(question_id: &Uuid) -> String {
    format!("q_{}", question_id.simple())
}

/// Decodes a safe qid back to the question id. Rejects any other shape; the
/// encoding is bijective.
pub fn parse_safe_qid(value: &str) -> Result<Uuid, InvalidSafeQid> {
    if !SAFE_QID_RE.is_match(value) {
        return Err(InvalidSafeQid(value.to_string()));
    }
    Uuid::parse_str(&value[2..]).map_err(|_| InvalidSafeQid(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let id = Uuid::new_v4();
        let qid = safe_qid(&id);
        assert!(qid.starts_with("q_"));
        assert_eq!(qid.len(), 34);
        assert_eq!(parse_safe_qid(&qid).unwrap(), id);
    }

    #[test]
    fn rejects_other_shapes() {
        assert!(parse_safe_qid("q_123").is_err());
        assert!(parse_safe_qid("abc").is_err());
        assert!(parse_safe_qid("q_ZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZ").is_err());
        // Dashed uuids are not valid safe qids.
        let dashed = format!("q_{}", Uuid::new_v4());
        assert!(parse_safe_qid(&dashed).is_err());
    }
}
