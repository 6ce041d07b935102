use crate::error::ExpressionError;
use crate::expr::ast::*;
use crate::expr::lexer::{Token, tokenize};

/// Parses an expression statement into a typed AST.
///
/// Any construct outside the whitelisted grammar (calls, assignment,
/// comprehensions, conditional expressions, ...) fails here with
/// `DisallowedExpression`; nothing is vetoed after the fact.
pub fn parse(tokens: Vec<Token>) -> Result<Expr, ExpressionError> {
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_or()?;
    if !parser.is_at_end() {
        return Err(ExpressionError::DisallowedExpression(format!(
            "unexpected trailing token {:?}",
            parser.peek()
        )));
    }
    Ok(expr)
}

/// Tokenizes and parses an expression statement in one step.
pub fn parse_statement(source: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(ExpressionError::DisallowedExpression(
            "empty expression".into(),
        ));
    }
    parse(tokens)
}

/// Parser state tracking the current position in the token stream.
#[derive(Debug)]
struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    fn parse_or(&mut self) -> Result<Expr, ExpressionError> {
        let first = self.parse_and()?;
        let mut values = vec![first];
        while self.peek() == Some(&Token::Or) {
            self.advance();
            values.push(self.parse_and()?);
        }
        Ok(collapse_bool(BoolOp::Or, values))
    }

    fn parse_and(&mut self) -> Result<Expr, ExpressionError> {
        let first = self.parse_not()?;
        let mut values = vec![first];
        while self.peek() == Some(&Token::And) {
            self.advance();
            values.push(self.parse_not()?);
        }
        Ok(collapse_bool(BoolOp::And, values))
    }

    fn parse_not(&mut self) -> Result<Expr, ExpressionError> {
        if self.peek() == Some(&Token::Not) {
            self.advance();
            let operand = self.parse_not()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    /// Comparisons chain like Python's: `1 <= q_x <= 10` holds when every
    /// adjacent pair holds.
    fn parse_comparison(&mut self) -> Result<Expr, ExpressionError> {
        let left = self.parse_arith()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();

        while let Some(op) = self.peek_cmp_op() {
            self.consume_cmp_op(op);
            ops.push(op);
            comparators.push(self.parse_arith()?);
        }

        if ops.is_empty() {
            return Ok(left);
        }
        Ok(Expr::Compare {
            left: Box::new(left),
            ops,
            comparators,
        })
    }

    fn peek_cmp_op(&self) -> Option<CmpOp> {
        match self.peek()? {
            Token::Equal => Some(CmpOp::Eq),
            Token::NotEqual => Some(CmpOp::NotEq),
            Token::LessThan => Some(CmpOp::Lt),
            Token::LessEqual => Some(CmpOp::LtE),
            Token::GreaterThan => Some(CmpOp::Gt),
            Token::GreaterEqual => Some(CmpOp::GtE),
            Token::In => Some(CmpOp::In),
            Token::Not if self.peek_at(1) == Some(&Token::In) => Some(CmpOp::NotIn),
            _ => None,
        }
    }

    fn consume_cmp_op(&mut self, op: CmpOp) {
        self.advance();
        if op == CmpOp::NotIn {
            self.advance(); // the trailing 'in'
        }
    }

    fn parse_arith(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        if self.peek() == Some(&Token::Minus) {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        self.parse_postfix()
    }

    /// Subscripting and attribute access bind tightest. A parenthesis after a
    /// postfix expression would be a call, which the grammar forbids.
    fn parse_postfix(&mut self) -> Result<Expr, ExpressionError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::LeftBracket) => {
                    self.advance();
                    let index = self.parse_or()?;
                    self.expect(Token::RightBracket)?;
                    expr = Expr::Subscript {
                        value: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Some(Token::Dot) => {
                    self.advance();
                    let attr = match self.peek() {
                        Some(Token::Identifier(name)) => name.clone(),
                        other => {
                            return Err(ExpressionError::DisallowedExpression(format!(
                                "expected attribute name after '.', found {other:?}"
                            )));
                        }
                    };
                    self.advance();
                    expr = Expr::Attribute {
                        value: Box::new(expr),
                        attr,
                    };
                }
                Some(Token::LeftParen) => {
                    return Err(ExpressionError::DisallowedExpression(
                        "function calls are not allowed".into(),
                    ));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        let token = self.peek().cloned().ok_or_else(|| {
            ExpressionError::DisallowedExpression("unexpected end of expression".into())
        })?;

        match token {
            Token::Integer(value) => {
                self.advance();
                Ok(Expr::Literal(Literal::Int(value)))
            }
            Token::Float(value) => {
                self.advance();
                Ok(Expr::Literal(Literal::Float(value)))
            }
            Token::Str(value) => {
                self.advance();
                Ok(Expr::Literal(Literal::Str(value)))
            }
            Token::True => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(true)))
            }
            Token::False => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(false)))
            }
            Token::Identifier(name) => {
                self.advance();
                Ok(Expr::Name(name))
            }
            Token::LeftParen => {
                self.advance();
                let inner = self.parse_or()?;
                self.expect(Token::RightParen)?;
                Ok(inner)
            }
            Token::LeftBracket => {
                self.advance();
                let elements = self.parse_elements(Token::RightBracket)?;
                Ok(Expr::List(elements))
            }
            Token::LeftBrace => {
                self.advance();
                let elements = self.parse_elements(Token::RightBrace)?;
                if elements.is_empty() {
                    // {} would be a dict display in the source grammar.
                    return Err(ExpressionError::DisallowedExpression(
                        "empty set literals are not allowed".into(),
                    ));
                }
                Ok(Expr::Set(elements))
            }
            other => Err(ExpressionError::DisallowedExpression(format!(
                "unexpected token {other:?}"
            ))),
        }
    }

    fn parse_elements(&mut self, terminator: Token) -> Result<Vec<Expr>, ExpressionError> {
        let mut elements = Vec::new();
        if self.peek() == Some(&terminator) {
            self.advance();
            return Ok(elements);
        }
        loop {
            elements.push(self.parse_or()?);
            match self.peek() {
                Some(Token::Comma) => {
                    self.advance();
                    // Trailing comma before the terminator is accepted.
                    if self.peek() == Some(&terminator) {
                        self.advance();
                        break;
                    }
                }
                Some(token) if *token == terminator => {
                    self.advance();
                    break;
                }
                other => {
                    return Err(ExpressionError::DisallowedExpression(format!(
                        "expected ',' or {terminator:?}, found {other:?}"
                    )));
                }
            }
        }
        Ok(elements)
    }

    fn expect(&mut self, token: Token) -> Result<(), ExpressionError> {
        if self.peek() == Some(&token) {
            self.advance();
            Ok(())
        } else {
            Err(ExpressionError::DisallowedExpression(format!(
                "expected {token:?}, found {:?}",
                self.peek()
            )))
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.current + offset)
    }

    fn advance(&mut self) {
        self.current += 1;
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len()
    }
}

fn collapse_bool(op: BoolOp, mut values: Vec<Expr>) -> Expr {
    if values.len() == 1 {
        values.pop().unwrap()
    } else {
        Expr::Bool { op, values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_comparison() {
        let expr = parse_statement("q_abc > 50").unwrap();
        assert_eq!(
            expr,
            Expr::Compare {
                left: Box::new(Expr::Name("q_abc".into())),
                ops: vec![CmpOp::Gt],
                comparators: vec![Expr::Literal(Literal::Int(50))],
            }
        );
    }

    #[test]
    fn parses_chained_range_check() {
        let expr = parse_statement("1 <= q_n <= 10").unwrap();
        match expr {
            Expr::Compare {
                ops, comparators, ..
            } => {
                assert_eq!(ops, vec![CmpOp::LtE, CmpOp::LtE]);
                assert_eq!(comparators.len(), 2);
            }
            other => panic!("expected comparison chain, got {other:?}"),
        }
    }

    #[test]
    fn parses_membership_with_set() {
        let expr = parse_statement("q_x in {'a', 'b'}").unwrap();
        match expr {
            Expr::Compare { ops, .. } => assert_eq!(ops, vec![CmpOp::In]),
            other => panic!("expected comparison, got {other:?}"),
        }
    }

    #[test]
    fn parses_not_in() {
        let expr = parse_statement("q_x not in ['a']").unwrap();
        match expr {
            Expr::Compare { ops, .. } => assert_eq!(ops, vec![CmpOp::NotIn]),
            other => panic!("expected comparison, got {other:?}"),
        }
    }

    #[test]
    fn boolean_operators_collect_operands() {
        let expr = parse_statement("q_a and q_b and q_c").unwrap();
        match expr {
            Expr::Bool { op, values } => {
                assert_eq!(op, BoolOp::And);
                assert_eq!(values.len(), 3);
            }
            other => panic!("expected bool op, got {other:?}"),
        }
    }

    #[test]
    fn rejects_function_calls() {
        let err = parse_statement("__import__('os')").unwrap_err();
        assert!(matches!(err, ExpressionError::DisallowedExpression(_)));
    }

    #[test]
    fn rejects_trailing_tokens() {
        let err = parse_statement("q_a q_b").unwrap_err();
        assert!(matches!(err, ExpressionError::DisallowedExpression(_)));
    }

    #[test]
    fn rejects_empty_statement() {
        let err = parse_statement("   ").unwrap_err();
        assert!(matches!(err, ExpressionError::DisallowedExpression(_)));
    }

    #[test]
    fn rejects_lambda_like_input() {
        assert!(parse_statement("lambda x: x").is_err());
    }

    #[test]
    fn parses_arithmetic_precedence() {
        let expr = parse_statement("1 + 2 * 3 == 7").unwrap();
        match expr {
            Expr::Compare { left, .. } => match *left {
                Expr::Binary {
                    op: BinaryOp::Add, ..
                } => {}
                other => panic!("expected addition at the top, got {other:?}"),
            },
            other => panic!("expected comparison, got {other:?}"),
        }
    }
}
