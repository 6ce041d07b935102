use log::warn;

use crate::error::ExpressionError;
use crate::expr::context::ExpressionContext;
use crate::expr::eval::eval_expr;
use crate::expr::parser::parse_statement;

/// CSS class applied around substituted values when highlighting is on. The
/// template layer styles this for the authoring preview.
pub const HIGHLIGHT_CLASS: &str = "app-interpolated-value";

/// Interpolates `((expression))` markers in author-supplied text.
///
/// Each marker's sub-expression is evaluated under the same whitelist as
/// conditions and validations, stringified (booleans as "Yes"/"No", numbers
/// plainly) and spliced in. A marker whose expression references an unknown
/// identifier is rendered verbatim so authors see their own placeholder.
///
/// With `with_highlighting` the whole output is HTML-escaped and every
/// substitution wrapped in a `HIGHLIGHT_CLASS` span; otherwise a plain string
/// is returned for the template layer to escape.
pub fn interpolate(template: &str, ctx: &ExpressionContext, with_highlighting: bool) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("((") {
        let (literal, marker_onwards) = rest.split_at(start);
        push_literal(&mut output, literal, with_highlighting);

        let Some(end) = marker_onwards.find("))") else {
            // No closing marker; the remainder is literal text.
            push_literal(&mut output, marker_onwards, with_highlighting);
            return output;
        };

        let marker = &marker_onwards[..end + 2];
        let statement = &marker_onwards[2..end];
        match evaluate_marker(statement, ctx) {
            Ok(value) => {
                if with_highlighting {
                    output.push_str(&format!(
                        "<span class=\"{HIGHLIGHT_CLASS}\">{}</span>",
                        html_escape(&value)
                    ));
                } else {
                    output.push_str(&value);
                }
            }
            Err(err) => {
                if !matches!(err, ExpressionError::UndefinedVariableInExpression(_)) {
                    warn!("could not interpolate marker '{marker}': {err}");
                }
                push_literal(&mut output, marker, with_highlighting);
            }
        }
        rest = &marker_onwards[end + 2..];
    }

    push_literal(&mut output, rest, with_highlighting);
    output
}

fn evaluate_marker(statement: &str, ctx: &ExpressionContext) -> Result<String, ExpressionError> {
    let ast = parse_statement(statement)?;
    Ok(eval_expr(&ast, ctx)?.to_display_string())
}

fn push_literal(output: &mut String, text: &str, with_highlighting: bool) {
    if with_highlighting {
        output.push_str(&html_escape(text));
    } else {
        output.push_str(text);
    }
}

fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
