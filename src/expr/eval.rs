use crate::error::ExpressionError;
use crate::expr::ast::*;
use crate::expr::context::ExpressionContext;
use crate::expr::parser::parse_statement;
use crate::expr::value::Value;

/// Evaluates an expression statement to a boolean.
///
/// Fails with `UndefinedVariableInExpression` when an identifier resolves to
/// nothing and with `InvalidEvaluationResult` when the final value is not a
/// boolean. The caller decides whether an undefined variable fails open or
/// closed; this function just reports it.
pub fn evaluate_statement(
    statement: &str,
    ctx: &ExpressionContext,
) -> Result<bool, ExpressionError> {
    let ast = parse_statement(statement)?;
    match eval_expr(&ast, ctx)? {
        Value::Bool(result) => Ok(result),
        other => Err(ExpressionError::InvalidEvaluationResult(format!(
            "expected a boolean, got {} from '{statement}'",
            other.type_name()
        ))),
    }
}

/// Evaluates a parsed expression to its runtime value.
pub fn eval_expr(expr: &Expr, ctx: &ExpressionContext) -> Result<Value, ExpressionError> {
    match expr {
        Expr::Literal(literal) => Ok(match literal {
            Literal::Int(i) => Value::Int(*i),
            Literal::Float(f) => Value::Float(*f),
            Literal::Str(s) => Value::Str(s.clone()),
            Literal::Bool(b) => Value::Bool(*b),
        }),

        Expr::Name(name) => ctx
            .get(name)
            .cloned()
            .ok_or_else(|| ExpressionError::UndefinedVariableInExpression(name.clone())),

        Expr::Unary { op, operand } => {
            let value = eval_expr(operand, ctx)?;
            match (op, value) {
                (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                (UnaryOp::Neg, Value::Int(i)) => i.checked_neg().map(Value::Int).ok_or_else(|| {
                    ExpressionError::InvalidEvaluationResult("integer overflow in negation".into())
                }),
                (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
                (op, value) => Err(ExpressionError::InvalidEvaluationResult(format!(
                    "cannot apply {op:?} to {}",
                    value.type_name()
                ))),
            }
        }

        Expr::Binary { op, left, right } => {
            let left = eval_expr(left, ctx)?;
            let right = eval_expr(right, ctx)?;
            eval_binary(*op, left, right)
        }

        Expr::Bool { op, values } => {
            // Short-circuits left to right; every operand must be a boolean.
            for value in values {
                match (op, eval_expr(value, ctx)?) {
                    (BoolOp::And, Value::Bool(false)) => return Ok(Value::Bool(false)),
                    (BoolOp::Or, Value::Bool(true)) => return Ok(Value::Bool(true)),
                    (_, Value::Bool(_)) => continue,
                    (_, other) => {
                        return Err(ExpressionError::InvalidEvaluationResult(format!(
                            "boolean operator applied to {}",
                            other.type_name()
                        )));
                    }
                }
            }
            Ok(Value::Bool(matches!(op, BoolOp::And)))
        }

        Expr::Compare {
            left,
            ops,
            comparators,
        } => {
            let mut current = eval_expr(left, ctx)?;
            for (op, comparator) in ops.iter().zip(comparators) {
                let next = eval_expr(comparator, ctx)?;
                if !compare(*op, &current, &next)? {
                    return Ok(Value::Bool(false));
                }
                current = next;
            }
            Ok(Value::Bool(true))
        }

        Expr::Subscript { value, index } => {
            let value = eval_expr(value, ctx)?;
            let index = eval_expr(index, ctx)?;
            subscript(value, index)
        }

        Expr::Attribute { attr, .. } => Err(ExpressionError::InvalidEvaluationResult(format!(
            "attribute '{attr}' is not available on values"
        ))),

        Expr::List(elements) | Expr::Set(elements) => {
            let values: Result<Vec<Value>, ExpressionError> =
                elements.iter().map(|e| eval_expr(e, ctx)).collect();
            Ok(Value::List(values?))
        }
    }
}

fn eval_binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, ExpressionError> {
    use BinaryOp::*;
    use Value::*;

    match (op, &left, &right) {
        // Checked: an expression over stored answers must error, not panic,
        // when a result leaves the i64 range.
        (Add, Int(a), Int(b)) => checked_int(op, a.checked_add(*b)),
        (Sub, Int(a), Int(b)) => checked_int(op, a.checked_sub(*b)),
        (Mul, Int(a), Int(b)) => checked_int(op, a.checked_mul(*b)),
        (Add, Str(a), Str(b)) => Ok(Str(format!("{a}{b}"))),
        (Div, _, _) => {
            let (a, b) = (as_f64(&left), as_f64(&right));
            match (a, b) {
                (Some(_), Some(b)) if b == 0.0 => Err(ExpressionError::InvalidEvaluationResult(
                    "division by zero".into(),
                )),
                (Some(a), Some(b)) => Ok(Float(a / b)),
                _ => Err(numeric_type_error(op, &left, &right)),
            }
        }
        (_, _, _) => match (as_f64(&left), as_f64(&right)) {
            (Some(a), Some(b)) => Ok(Float(match op {
                Add => a + b,
                Sub => a - b,
                Mul => a * b,
                Div => unreachable!("handled above"),
            })),
            _ => Err(numeric_type_error(op, &left, &right)),
        },
    }
}

fn checked_int(op: BinaryOp, result: Option<i64>) -> Result<Value, ExpressionError> {
    result.map(Value::Int).ok_or_else(|| {
        ExpressionError::InvalidEvaluationResult(format!("integer overflow in {op:?}"))
    })
}

fn numeric_type_error(op: BinaryOp, left: &Value, right: &Value) -> ExpressionError {
    ExpressionError::InvalidEvaluationResult(format!(
        "cannot apply {op:?} to {} and {}",
        left.type_name(),
        right.type_name()
    ))
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<bool, ExpressionError> {
    match op {
        CmpOp::Eq => Ok(values_equal(left, right)),
        CmpOp::NotEq => Ok(!values_equal(left, right)),
        CmpOp::In => membership(left, right),
        CmpOp::NotIn => membership(left, right).map(|found| !found),
        CmpOp::Lt | CmpOp::LtE | CmpOp::Gt | CmpOp::GtE => {
            let ordering = match (left, right) {
                (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
                _ => match (as_f64(left), as_f64(right)) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => {
                        return Err(ExpressionError::InvalidEvaluationResult(format!(
                            "cannot order {} and {}",
                            left.type_name(),
                            right.type_name()
                        )));
                    }
                },
            };
            let Some(ordering) = ordering else {
                return Ok(false);
            };
            Ok(match op {
                CmpOp::Lt => ordering.is_lt(),
                CmpOp::LtE => ordering.is_le(),
                CmpOp::Gt => ordering.is_gt(),
                CmpOp::GtE => ordering.is_ge(),
                _ => unreachable!(),
            })
        }
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (as_f64(left), as_f64(right)) {
        (Some(a), Some(b)) => a == b,
        _ => left == right,
    }
}

fn membership(needle: &Value, haystack: &Value) -> Result<bool, ExpressionError> {
    match haystack {
        Value::List(items) => Ok(items.iter().any(|item| values_equal(needle, item))),
        Value::Str(s) => match needle {
            Value::Str(sub) => Ok(s.contains(sub.as_str())),
            other => Err(ExpressionError::InvalidEvaluationResult(format!(
                "cannot test {} membership in a string",
                other.type_name()
            ))),
        },
        other => Err(ExpressionError::InvalidEvaluationResult(format!(
            "cannot test membership in {}",
            other.type_name()
        ))),
    }
}

fn subscript(value: Value, index: Value) -> Result<Value, ExpressionError> {
    match (value, index) {
        (Value::List(items), Value::Int(i)) => {
            let len = items.len() as i64;
            let resolved = if i < 0 { len + i } else { i };
            if resolved < 0 || resolved >= len {
                return Err(ExpressionError::InvalidEvaluationResult(format!(
                    "index {i} out of range for list of length {len}"
                )));
            }
            Ok(items[resolved as usize].clone())
        }
        (value, index) => Err(ExpressionError::InvalidEvaluationResult(format!(
            "cannot subscript {} with {}",
            value.type_name(),
            index.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(pairs: &[(&str, Value)]) -> ExpressionContext {
        let mut ctx = ExpressionContext::new();
        for (name, value) in pairs {
            ctx.insert_answer((*name).to_string(), value.clone());
        }
        ctx
    }

    #[test]
    fn evaluates_comparisons() {
        let ctx = ctx(&[("q_n", Value::Int(55))]);
        assert!(evaluate_statement("q_n > 50", &ctx).unwrap());
        assert!(!evaluate_statement("q_n > 60", &ctx).unwrap());
    }

    #[test]
    fn evaluates_chained_range() {
        let ctx = ctx(&[("q_n", Value::Int(5))]);
        assert!(evaluate_statement("1 <= q_n <= 10", &ctx).unwrap());
        let ctx = ctx_with(42);
        assert!(!evaluate_statement("1 <= q_n <= 10", &ctx).unwrap());
    }

    fn ctx_with(n: i64) -> ExpressionContext {
        ctx(&[("q_n", Value::Int(n))])
    }

    #[test]
    fn evaluates_membership() {
        let ctx = ctx(&[("q_c", Value::Str("red".into()))]);
        assert!(evaluate_statement("q_c in {'red', 'blue'}", &ctx).unwrap());
        assert!(!evaluate_statement("q_c in {'green'}", &ctx).unwrap());
        assert!(evaluate_statement("q_c not in {'green'}", &ctx).unwrap());
    }

    #[test]
    fn multi_choice_answers_bind_as_lists() {
        let ctx = ctx(&[(
            "q_m",
            Value::List(vec![Value::Str("a".into()), Value::Str("b".into())]),
        )]);
        assert!(evaluate_statement("'a' in q_m", &ctx).unwrap());
        assert!(!evaluate_statement("'z' in q_m", &ctx).unwrap());
    }

    #[test]
    fn undefined_variable_is_reported() {
        let err = evaluate_statement("q_missing > 1", &ExpressionContext::new()).unwrap_err();
        assert_eq!(
            err,
            ExpressionError::UndefinedVariableInExpression("q_missing".into())
        );
    }

    #[test]
    fn non_boolean_result_is_rejected() {
        let ctx = ctx(&[("q_n", Value::Int(3))]);
        let err = evaluate_statement("q_n + 1", &ctx).unwrap_err();
        assert!(matches!(
            err,
            ExpressionError::InvalidEvaluationResult(_)
        ));
    }

    #[test]
    fn boolean_answers_evaluate_directly() {
        let ctx = ctx(&[("q_yes", Value::Bool(true))]);
        assert!(evaluate_statement("q_yes", &ctx).unwrap());
        assert!(!evaluate_statement("not q_yes", &ctx).unwrap());
        assert!(evaluate_statement("q_yes == True", &ctx).unwrap());
    }

    #[test]
    fn division_always_yields_float() {
        let ctx = ctx(&[("q_n", Value::Int(7))]);
        assert!(evaluate_statement("q_n / 2 == 3.5", &ctx).unwrap());
    }

    #[test]
    fn division_by_zero_is_an_evaluation_error() {
        let ctx = ctx(&[("q_n", Value::Int(7))]);
        assert!(matches!(
            evaluate_statement("q_n / 0 == 1", &ctx),
            Err(ExpressionError::InvalidEvaluationResult(_))
        ));
    }

    #[test]
    fn integer_overflow_is_an_evaluation_error() {
        let ctx = ctx(&[("q_n", Value::Int(i64::MAX))]);
        for statement in ["q_n + 1 == 0", "q_n * 2 == 0"] {
            assert!(
                matches!(
                    evaluate_statement(statement, &ctx),
                    Err(ExpressionError::InvalidEvaluationResult(_))
                ),
                "statement: {statement}"
            );
        }

        let ctx = self::ctx(&[("q_n", Value::Int(i64::MIN))]);
        for statement in ["q_n - 1 == 0", "-q_n == 0"] {
            assert!(
                matches!(
                    evaluate_statement(statement, &ctx),
                    Err(ExpressionError::InvalidEvaluationResult(_))
                ),
                "statement: {statement}"
            );
        }
    }

    #[test]
    fn int_and_float_compare_numerically() {
        let ctx = ctx(&[("q_n", Value::Int(3))]);
        assert!(evaluate_statement("q_n == 3.0", &ctx).unwrap());
    }
}
