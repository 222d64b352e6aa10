use crate::{
    error::{Error, Result},
    lexer::Token,
};

use super::shape::{classify, Shape};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOpKind {
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    LessThan,
    GreaterThan,
    Equal,
}

impl BinOpKind {
    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '+' => Some(BinOpKind::Add),
            '-' => Some(BinOpKind::Sub),
            '*' => Some(BinOpKind::Mul),
            '/' => Some(BinOpKind::Div),
            '&' => Some(BinOpKind::And),
            '|' => Some(BinOpKind::Or),
            '<' => Some(BinOpKind::LessThan),
            '>' => Some(BinOpKind::GreaterThan),
            '=' => Some(BinOpKind::Equal),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOpKind {
    Neg,
    Not,
}

impl UnaryOpKind {
    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '-' => Some(UnaryOpKind::Neg),
            '~' => Some(UnaryOpKind::Not),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeywordConstant {
    True,
    False,
    Null,
    This,
}

impl KeywordConstant {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "true" => Some(KeywordConstant::True),
            "false" => Some(KeywordConstant::False),
            "null" => Some(KeywordConstant::Null),
            "this" => Some(KeywordConstant::This),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    /// `Foo` in `Foo.bar()`: a variable or a class name.
    pub receiver: Option<String>,
    pub name: String,
    pub args: Vec<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Grouped(Box<Expr>),
    KeywordConstant(KeywordConstant),
    Number(u16),
    StringConstant(String),
    VarRef(String),
    Unary(UnaryOpKind, Box<Expr>),
    Call(Call),
    ArrayElement(String, Box<Expr>),
    /// `a op1 b op2 c ...`, grouped to the right: `a op1 (b op2 (c ...))`.
    /// Kept flat so that long chains do not deepen the tree.
    Binary(Box<Expr>, Vec<(BinOpKind, Expr)>),
}

/// Deepest nesting of parentheses, unary operators, calls and subscripts
/// accepted in one expression.
pub const MAX_NESTING: usize = 256;

impl Expr {
    /// Builds the expression tree for a token span by classifying it and
    /// then each of its parts.
    pub fn from_span(span: &[Token]) -> Result<Expr> {
        Expr::build(span, 0)
    }

    fn build(span: &[Token], depth: usize) -> Result<Expr> {
        if depth > MAX_NESTING {
            return Err(Error::NestingTooDeep {
                line: span.first().map_or(1, |t| t.line),
            });
        }
        let child = |span: &[Token]| Expr::build(span, depth + 1);

        let expr = match classify(span)? {
            Shape::Wrapped(inner) => Expr::Grouped(Box::new(child(inner)?)),
            Shape::KeywordConstant(k) => Expr::KeywordConstant(k),
            Shape::Number(value) => Expr::Number(value),
            Shape::StringConstant(s) => Expr::StringConstant(s.to_string()),
            Shape::VarName(name) => Expr::VarRef(name),
            Shape::UnaryOp(op, operand) => Expr::Unary(op, Box::new(child(operand)?)),
            Shape::Call { callee, args } => {
                let (receiver, name) = match callee.rsplit_once('.') {
                    Some((receiver, name)) => (Some(receiver.to_string()), name.to_string()),
                    None => (None, callee),
                };
                Expr::Call(Call {
                    receiver,
                    name,
                    args: args.into_iter().map(child).collect::<Result<_>>()?,
                })
            }
            Shape::ArrayElement { name, index } => {
                Expr::ArrayElement(name.to_string(), Box::new(child(index)?))
            }
            Shape::BinarySequence { left, op, right } => {
                // The right side is always the rest of the span, so the
                // chain is unrolled here instead of recursing on it.
                let first = child(left)?;
                let mut rest = vec![];
                let (mut op, mut right) = (op, right);
                loop {
                    match classify(right)? {
                        Shape::BinarySequence {
                            left,
                            op: next_op,
                            right: next_right,
                        } => {
                            rest.push((op, child(left)?));
                            (op, right) = (next_op, next_right);
                        }
                        _ => {
                            rest.push((op, child(right)?));
                            break;
                        }
                    }
                }
                Expr::Binary(Box::new(first), rest)
            }
        };

        Ok(expr)
    }
}
