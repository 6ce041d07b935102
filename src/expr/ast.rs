/// Typed AST for the managed expression grammar.
///
/// Only the node kinds below can ever be produced by the parser, which is the
/// whole safety story: assignment, calls, imports, comprehensions and friends
/// simply have no representation here.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Name(String),
    /// Attribute access (`value.attr`). Permitted by the grammar but no
    /// runtime value currently exposes attributes.
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    /// Subscripting (`value[index]`).
    Subscript {
        value: Box<Expr>,
        index: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `and`/`or` over two or more operands, short-circuiting left to right.
    Bool {
        op: BoolOp,
        values: Vec<Expr>,
    },
    /// Comparison chain: `left op[0] comparators[0] op[1] comparators[1] ...`
    /// Chaining keeps range checks like `1 <= q_x <= 10` in the grammar.
    Compare {
        left: Box<Expr>,
        ops: Vec<CmpOp>,
        comparators: Vec<Expr>,
    },
    List(Vec<Expr>),
    /// Set display (`{'a', 'b'}`); evaluates like a list.
    Set(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
}
