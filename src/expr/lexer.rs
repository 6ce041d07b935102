use crate::error::ExpressionError;

/// Tokens of the managed expression grammar.
///
/// The grammar is a closed whitelist: anything the lexer does not recognise
/// is a `DisallowedExpression` error rather than a post-parse veto.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals and names
    Identifier(String),
    Integer(i64),
    Float(f64),
    Str(String),
    True,
    False,

    // Boolean keywords
    And,
    Or,
    Not,
    In,

    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,

    // Comparisons
    Equal,        // ==
    NotEqual,     // !=
    LessThan,     // <
    LessEqual,    // <=
    GreaterThan,  // >
    GreaterEqual, // >=

    // Structural
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
}

/// Tokenizes an expression statement into a vector of tokens.
///
/// # Examples
/// ```rust
/// use reporting_cli::expr::lexer::{tokenize, Token};
///
/// let tokens = tokenize("q_abc > 50").unwrap();
/// assert_eq!(tokens[1], Token::GreaterThan);
/// ```
pub fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        match ch {
            ' ' | '\t' | '\r' | '\n' => continue,

            '(' => tokens.push(Token::LeftParen),
            ')' => tokens.push(Token::RightParen),
            '[' => tokens.push(Token::LeftBracket),
            ']' => tokens.push(Token::RightBracket),
            '{' => tokens.push(Token::LeftBrace),
            '}' => tokens.push(Token::RightBrace),
            ',' => tokens.push(Token::Comma),
            '.' => tokens.push(Token::Dot),
            '+' => tokens.push(Token::Plus),
            '-' => tokens.push(Token::Minus),
            '*' => tokens.push(Token::Star),
            '/' => tokens.push(Token::Slash),

            '=' => {
                if chars.peek().map(|(_, c)| *c) == Some('=') {
                    chars.next();
                    tokens.push(Token::Equal);
                } else {
                    return Err(disallowed_char('=', pos));
                }
            }
            '!' => {
                if chars.peek().map(|(_, c)| *c) == Some('=') {
                    chars.next();
                    tokens.push(Token::NotEqual);
                } else {
                    return Err(disallowed_char('!', pos));
                }
            }
            '<' => {
                if chars.peek().map(|(_, c)| *c) == Some('=') {
                    chars.next();
                    tokens.push(Token::LessEqual);
                } else {
                    tokens.push(Token::LessThan);
                }
            }
            '>' => {
                if chars.peek().map(|(_, c)| *c) == Some('=') {
                    chars.next();
                    tokens.push(Token::GreaterEqual);
                } else {
                    tokens.push(Token::GreaterThan);
                }
            }

            '\'' | '"' => {
                let mut value = String::new();
                let mut terminated = false;
                while let Some((_, c)) = chars.next() {
                    if c == ch {
                        terminated = true;
                        break;
                    }
                    if c == '\\' {
                        match chars.next().map(|(_, c)| c) {
                            Some('n') => value.push('\n'),
                            Some('t') => value.push('\t'),
                            Some(escaped @ ('\\' | '\'' | '"')) => value.push(escaped),
                            other => {
                                return Err(ExpressionError::DisallowedExpression(format!(
                                    "unsupported escape sequence '\\{}'",
                                    other.map(String::from).unwrap_or_default()
                                )));
                            }
                        }
                    } else {
                        value.push(c);
                    }
                }
                if !terminated {
                    return Err(ExpressionError::DisallowedExpression(format!(
                        "unterminated string starting at position {pos}"
                    )));
                }
                tokens.push(Token::Str(value));
            }

            c if c.is_ascii_digit() => {
                let mut literal = String::from(c);
                let mut is_float = false;
                while let Some((_, next)) = chars.peek() {
                    if next.is_ascii_digit() {
                        literal.push(*next);
                        chars.next();
                    } else if *next == '.' && !is_float {
                        // Only consume the dot when a digit follows, so that
                        // attribute access on a number stays a parse error.
                        let mut lookahead = chars.clone();
                        lookahead.next();
                        if lookahead.peek().map(|(_, c)| c.is_ascii_digit()) == Some(true) {
                            is_float = true;
                            literal.push('.');
                            chars.next();
                        } else {
                            break;
                        }
                    } else {
                        break;
                    }
                }
                if is_float {
                    let value: f64 = literal.parse().map_err(|_| {
                        ExpressionError::DisallowedExpression(format!("invalid number '{literal}'"))
                    })?;
                    tokens.push(Token::Float(value));
                } else {
                    let value: i64 = literal.parse().map_err(|_| {
                        ExpressionError::DisallowedExpression(format!("invalid number '{literal}'"))
                    })?;
                    tokens.push(Token::Integer(value));
                }
            }

            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                while let Some((_, next)) = chars.peek() {
                    if next.is_ascii_alphanumeric() || *next == '_' {
                        word.push(*next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    "True" | "true" => Token::True,
                    "False" | "false" => Token::False,
                    _ => Token::Identifier(word),
                });
            }

            other => return Err(disallowed_char(other, pos)),
        }
    }

    Ok(tokens)
}

fn disallowed_char(ch: char, pos: usize) -> ExpressionError {
    ExpressionError::DisallowedExpression(format!("unexpected character '{ch}' at position {pos}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_comparison() {
        let tokens = tokenize("q_abc >= 10").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Identifier("q_abc".into()),
                Token::GreaterEqual,
                Token::Integer(10),
            ]
        );
    }

    #[test]
    fn tokenizes_membership_over_set_literal() {
        let tokens = tokenize("q_x in {'red', 'blue'}").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Identifier("q_x".into()),
                Token::In,
                Token::LeftBrace,
                Token::Str("red".into()),
                Token::Comma,
                Token::Str("blue".into()),
                Token::RightBrace,
            ]
        );
    }

    #[test]
    fn tokenizes_chained_comparison() {
        let tokens = tokenize("1 <= q_n <= 10").unwrap();
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[1], Token::LessEqual);
        assert_eq!(tokens[3], Token::LessEqual);
    }

    #[test]
    fn floats_and_integers_are_distinct() {
        assert_eq!(tokenize("3.25").unwrap(), vec![Token::Float(3.25)]);
        assert_eq!(tokenize("3").unwrap(), vec![Token::Integer(3)]);
    }

    #[test]
    fn rejects_single_equals() {
        assert!(matches!(
            tokenize("q_a = 1"),
            Err(ExpressionError::DisallowedExpression(_))
        ));
    }

    #[test]
    fn rejects_unknown_characters() {
        assert!(matches!(
            tokenize("q_a ; drop"),
            Err(ExpressionError::DisallowedExpression(_))
        ));
        assert!(matches!(
            tokenize("q_a # comment"),
            Err(ExpressionError::DisallowedExpression(_))
        ));
    }

    #[test]
    fn rejects_unterminated_string() {
        assert!(matches!(
            tokenize("'open"),
            Err(ExpressionError::DisallowedExpression(_))
        ));
    }
}
