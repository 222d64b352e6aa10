use crate::{
    error::{Error, Result},
    lexer::{Token, TokenKind},
};

use super::{BinOpKind, KeywordConstant, UnaryOpKind};

/// The syntactic form of an expression span. Sub-spans borrow from the
/// token stream; nothing is re-lexed.
#[derive(Debug, PartialEq)]
pub enum Shape<'a> {
    Wrapped(&'a [Token]),
    KeywordConstant(KeywordConstant),
    Number(u16),
    StringConstant(&'a str),
    /// One identifier or a dotted name such as `Foo.bar`. A dotted name
    /// without a call is taken as a plain variable reference.
    VarName(String),
    UnaryOp(UnaryOpKind, &'a [Token]),
    Call {
        callee: String,
        args: Vec<&'a [Token]>,
    },
    ArrayElement {
        name: &'a str,
        index: &'a [Token],
    },
    BinarySequence {
        left: &'a [Token],
        op: BinOpKind,
        right: &'a [Token],
    },
}

/// Decides the shape of `span`. The rules are tried in a fixed order and the
/// first match wins; they are not disjoint, so the order matters.
pub fn classify(span: &[Token]) -> Result<Shape<'_>> {
    if let Some(inner) = wrapped(span) {
        return Ok(Shape::Wrapped(inner));
    }
    if let [token] = span {
        match token.kind {
            TokenKind::Keyword => {
                if let Some(k) = KeywordConstant::from_keyword(&token.lexeme) {
                    return Ok(Shape::KeywordConstant(k));
                }
            }
            TokenKind::IntegerConstant => {
                if let Ok(value) = token.lexeme.parse() {
                    return Ok(Shape::Number(value));
                }
            }
            TokenKind::StringConstant => return Ok(Shape::StringConstant(&token.lexeme)),
            _ => (),
        }
    }
    if let Some(name) = var_name(span) {
        return Ok(Shape::VarName(name));
    }
    if let Some((op, operand)) = unary(span) {
        return Ok(Shape::UnaryOp(op, operand));
    }
    if let Some((callee, args)) = call(span) {
        return Ok(Shape::Call { callee, args });
    }
    if let Some((name, index)) = array_element(span) {
        return Ok(Shape::ArrayElement { name, index });
    }
    if let Some((left, op, right)) = binary_sequence(span) {
        return Ok(Shape::BinarySequence { left, op, right });
    }

    Err(Error::UnclassifiableExpression {
        span: span_text(span),
    })
}

pub(crate) fn span_text(span: &[Token]) -> String {
    span.iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_open(token: &Token) -> bool {
    token.is_symbol('(') || token.is_symbol('[')
}

fn is_close(token: &Token) -> bool {
    token.is_symbol(')') || token.is_symbol(']')
}

/// Index of the bracket closing the one opened at `open`.
fn matching_close(span: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in span.iter().enumerate().skip(open) {
        if is_open(token) {
            depth += 1;
        } else if is_close(token) {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

fn wrapped(span: &[Token]) -> Option<&[Token]> {
    let last = span.len().checked_sub(1)?;
    if !span[0].is_symbol('(') || !span[last].is_symbol(')') {
        return None;
    }
    (matching_close(span, 0)? == last).then(|| &span[1..last])
}

/// `ident ('.' ident)*`, joined back into one name.
fn var_name(span: &[Token]) -> Option<String> {
    if span.len() % 2 == 0 {
        return None;
    }
    let mut name = String::new();
    for (i, token) in span.iter().enumerate() {
        if i % 2 == 0 {
            if token.kind != TokenKind::Identifier {
                return None;
            }
            name.push_str(&token.lexeme);
        } else {
            if !token.is_symbol('.') {
                return None;
            }
            name.push('.');
        }
    }
    Some(name)
}

fn unary(span: &[Token]) -> Option<(UnaryOpKind, &[Token])> {
    let (first, operand) = span.split_first()?;
    let op = UnaryOpKind::from_symbol(first.symbol()?)?;
    (!operand.is_empty()).then_some((op, operand))
}

fn call(span: &[Token]) -> Option<(String, Vec<&[Token]>)> {
    let open = span.iter().position(|t| t.is_symbol('('))?;
    let callee = var_name(&span[..open])?;
    let close = matching_close(span, open)?;
    if close != span.len() - 1 {
        return None;
    }
    Some((callee, split_arguments(&span[open + 1..close])))
}

/// Splits a call's interior on commas outside any nested brackets.
fn split_arguments(interior: &[Token]) -> Vec<&[Token]> {
    if interior.is_empty() {
        return vec![];
    }

    let mut args = vec![];
    let mut depth = 0usize;
    let mut start = 0;
    for (i, token) in interior.iter().enumerate() {
        if is_open(token) {
            depth += 1;
        } else if is_close(token) {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && token.is_symbol(',') {
            args.push(&interior[start..i]);
            start = i + 1;
        }
    }
    args.push(&interior[start..]);
    args
}

fn array_element(span: &[Token]) -> Option<(&str, &[Token])> {
    let name = span.first()?;
    if name.kind != TokenKind::Identifier || !span.get(1)?.is_symbol('[') {
        return None;
    }
    let close = matching_close(span, 1)?;
    (close == span.len() - 1 && span[close].is_symbol(']'))
        .then(|| (name.lexeme.as_str(), &span[2..close]))
}

/// Splits at the first operator outside brackets, scanning left to right.
/// There is no precedence: `a+b*c` splits at `+`.
fn binary_sequence(span: &[Token]) -> Option<(&[Token], BinOpKind, &[Token])> {
    let mut depth = 0usize;
    for (i, token) in span.iter().enumerate() {
        if is_open(token) {
            depth += 1;
        } else if is_close(token) {
            depth = depth.checked_sub(1)?;
        } else if depth == 0 {
            if let Some(op) = token.symbol().and_then(BinOpKind::from_symbol) {
                let (left, right) = (&span[..i], &span[i + 1..]);
                if left.is_empty() || right.is_empty() {
                    return None;
                }
                return Some((left, op, right));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::lexer::Lexer;

    fn tokens(source: &str) -> Vec<Token> {
        Lexer::tokenize(source).unwrap()
    }

    fn text(span: &[Token]) -> String {
        span.iter().map(|t| t.lexeme.as_str()).collect()
    }

    #[test]
    fn wrapped_beats_binary_sequence() {
        let span = tokens("(1+2)");
        assert_matches!(classify(&span), Ok(Shape::Wrapped(inner)) if text(inner) == "1+2");
    }

    #[test]
    fn separate_groups_are_not_wrapped() {
        let span = tokens("(1)+(2)");
        assert_matches!(
            classify(&span),
            Ok(Shape::BinarySequence { left, op: BinOpKind::Add, right })
                if text(left) == "(1)" && text(right) == "(2)"
        );
    }

    #[test]
    fn single_token_shapes() {
        assert_eq!(
            classify(&tokens("true")).unwrap(),
            Shape::KeywordConstant(KeywordConstant::True)
        );
        assert_eq!(
            classify(&tokens("this")).unwrap(),
            Shape::KeywordConstant(KeywordConstant::This)
        );
        assert_eq!(classify(&tokens("17")).unwrap(), Shape::Number(17));
        assert_eq!(
            classify(&tokens("\"hi\"")).unwrap(),
            Shape::StringConstant("hi")
        );
        assert_eq!(
            classify(&tokens("count")).unwrap(),
            Shape::VarName("count".to_string())
        );
    }

    #[test]
    fn dotted_name_without_call_is_a_var_name() {
        assert_eq!(
            classify(&tokens("Foo.bar")).unwrap(),
            Shape::VarName("Foo.bar".to_string())
        );
    }

    #[test]
    fn unary_takes_the_whole_remainder() {
        let span = tokens("-x+1");
        assert_matches!(
            classify(&span),
            Ok(Shape::UnaryOp(UnaryOpKind::Neg, operand)) if text(operand) == "x+1"
        );
        let span = tokens("~done");
        assert_matches!(classify(&span), Ok(Shape::UnaryOp(UnaryOpKind::Not, _)));
    }

    #[test]
    fn call_splits_top_level_arguments() {
        let span = tokens("Screen.drawLine(f(1, 2), a[i, j], 3)");
        let Ok(Shape::Call { callee, args }) = classify(&span) else {
            panic!("expected a call");
        };
        assert_eq!(callee, "Screen.drawLine");
        let args: Vec<_> = args.into_iter().map(text).collect();
        assert_eq!(args, vec!["f(1,2)", "a[i,j]", "3"]);
    }

    #[test]
    fn call_without_arguments() {
        let span = tokens("run()");
        assert_eq!(
            classify(&span).unwrap(),
            Shape::Call {
                callee: "run".to_string(),
                args: vec![]
            }
        );
    }

    #[test]
    fn calls_joined_by_an_operator_are_a_sequence() {
        let span = tokens("f(a)+g(b)");
        assert_matches!(
            classify(&span),
            Ok(Shape::BinarySequence { op: BinOpKind::Add, .. })
        );
    }

    #[test]
    fn array_element_versus_sequence() {
        let span = tokens("a[i+1]");
        assert_matches!(
            classify(&span),
            Ok(Shape::ArrayElement { name: "a", index }) if text(index) == "i+1"
        );
        let span = tokens("a[i]-1");
        assert_matches!(
            classify(&span),
            Ok(Shape::BinarySequence { op: BinOpKind::Sub, .. })
        );
    }

    #[test]
    fn splits_at_first_operator_without_precedence() {
        let span = tokens("a+b*c");
        assert_matches!(
            classify(&span),
            Ok(Shape::BinarySequence { left, op: BinOpKind::Add, right })
                if text(left) == "a" && text(right) == "b*c"
        );
        let span = tokens("(a+b)*c");
        assert_matches!(
            classify(&span),
            Ok(Shape::BinarySequence { left, op: BinOpKind::Mul, right })
                if text(left) == "(a+b)" && text(right) == "c"
        );
    }

    #[test]
    fn malformed_spans_are_unclassifiable() {
        for source in ["1 2", "a +", "* b", "f(1", "class"] {
            assert_matches!(
                classify(&tokens(source)),
                Err(Error::UnclassifiableExpression { .. }),
                "{source}"
            );
        }
        assert_matches!(classify(&[]), Err(Error::UnclassifiableExpression { .. }));
    }
}
