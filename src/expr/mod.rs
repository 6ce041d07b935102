//! Safe expression engine for author-supplied conditions, validations and
//! text interpolation. A hand-written lexer and recursive-descent parser
//! produce a typed AST covering only the whitelisted grammar, so disallowed
//! constructs are parse failures rather than post-parse vetoes.

pub mod ast;
pub mod context;
pub mod eval;
pub mod interpolate;
pub mod lexer;
pub mod managed;
pub mod parser;
pub mod value;

pub use context::ExpressionContext;
pub use eval::evaluate_statement;
pub use interpolate::interpolate;
pub use managed::{ManagedExpression, ManagedName, managed_expressions_for};
pub use parser::parse_statement;
pub use value::Value;

use crate::error::ExpressionError;
use crate::schema::component::Expression;

/// Evaluates a stored expression to a boolean, with its own `context` map
/// layered under the submission answers.
pub fn evaluate(expression: &Expression, ctx: &ExpressionContext) -> Result<bool, ExpressionError> {
    let scoped = ctx.for_expression(&expression.context);
    evaluate_statement(&expression.statement, &scoped)
}
