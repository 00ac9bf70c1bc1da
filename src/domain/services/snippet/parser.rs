//! Pratt parser lowering snippet source into an `ExprTree`

use serde_json::Value;

use super::lexer::{tokenize, Token, TokenKind};
use crate::domain::entities::{BinaryOp, ExprTree, TreeParameter, UnaryOp};
use crate::error::CompileError;

const MAX_NESTING: usize = 128;

/// Binding power of unary prefix operators
const PREFIX_BP: u8 = 16;

/// Parse snippet source text into an expression tree
pub fn parse(source: &str) -> Result<ExprTree, CompileError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        nesting: 0,
    };
    let tree = parser.expression(0)?;
    match parser.peek() {
        TokenKind::End => Ok(tree),
        other => Err(parser.error(format!("unexpected {:?} after expression", other))),
    }
}

struct Parser<'s> {
    source: &'s str,
    tokens: Vec<Token>,
    pos: usize,
    nesting: usize,
}

fn infix(kind: &TokenKind) -> Option<(u8, u8, BinaryOp)> {
    let entry = match kind {
        TokenKind::QuestionQuestion => (3, 2, BinaryOp::Coalesce),
        TokenKind::OrOr => (4, 5, BinaryOp::Or),
        TokenKind::AndAnd => (6, 7, BinaryOp::And),
        TokenKind::EqEq => (8, 9, BinaryOp::Equal),
        TokenKind::BangEq => (8, 9, BinaryOp::NotEqual),
        TokenKind::Less => (10, 11, BinaryOp::Less),
        TokenKind::LessEq => (10, 11, BinaryOp::LessOrEqual),
        TokenKind::Greater => (10, 11, BinaryOp::Greater),
        TokenKind::GreaterEq => (10, 11, BinaryOp::GreaterOrEqual),
        TokenKind::Plus => (12, 13, BinaryOp::Add),
        TokenKind::Minus => (12, 13, BinaryOp::Subtract),
        TokenKind::Star => (14, 15, BinaryOp::Multiply),
        TokenKind::Slash => (14, 15, BinaryOp::Divide),
        TokenKind::Percent => (14, 15, BinaryOp::Remainder),
        _ => return None,
    };
    Some(entry)
}

impl Parser<'_> {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)].kind
    }

    fn position(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].position
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        CompileError::new(self.source, self.position(), message)
    }

    fn expect(&mut self, expected: TokenKind, what: &str) -> Result<(), CompileError> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected {}", what)))
        }
    }

    fn expression(&mut self, min_bp: u8) -> Result<ExprTree, CompileError> {
        self.nesting += 1;
        if self.nesting > MAX_NESTING {
            return Err(self.error("expression nested too deeply"));
        }
        let result = self.expression_inner(min_bp);
        self.nesting -= 1;
        result
    }

    fn expression_inner(&mut self, min_bp: u8) -> Result<ExprTree, CompileError> {
        let mut left = self.prefix()?;

        loop {
            let kind = self.peek().clone();
            if kind == TokenKind::Question {
                // Conditional binds loosest and associates to the right
                if min_bp > 1 {
                    break;
                }
                self.advance();
                let then = self.expression(0)?;
                self.expect(TokenKind::Colon, "':' in conditional expression")?;
                let otherwise = self.expression(1)?;
                left = ExprTree::Conditional {
                    test: Box::new(left),
                    then: Box::new(then),
                    otherwise: Box::new(otherwise),
                };
                continue;
            }
            let Some((left_bp, right_bp, op)) = infix(&kind) else {
                break;
            };
            if left_bp < min_bp {
                break;
            }
            self.advance();
            let right = self.expression(right_bp)?;
            left = ExprTree::binary(op, left, right);
        }
        Ok(left)
    }

    fn prefix(&mut self) -> Result<ExprTree, CompileError> {
        let start = self.position();
        let primary = match self.advance() {
            TokenKind::Number(value) => ExprTree::Constant { value },
            TokenKind::Str(text) => ExprTree::Constant {
                value: Value::String(text),
            },
            TokenKind::True => ExprTree::constant(true),
            TokenKind::False => ExprTree::constant(false),
            TokenKind::Null => ExprTree::Constant { value: Value::Null },
            TokenKind::Bang => {
                let operand = self.expression(PREFIX_BP)?;
                return Ok(ExprTree::not(operand));
            }
            TokenKind::Minus => {
                let operand = self.expression(PREFIX_BP)?;
                return Ok(ExprTree::Unary {
                    op: UnaryOp::Negate,
                    operand: Box::new(operand),
                });
            }
            TokenKind::LParen => {
                // `(x) => body`
                if let (TokenKind::Ident(name), TokenKind::RParen, TokenKind::Arrow) = (
                    self.peek().clone(),
                    self.peek_at(1).clone(),
                    self.peek_at(2).clone(),
                ) {
                    self.pos += 3;
                    let body = self.expression(0)?;
                    return Ok(ExprTree::lambda(name, body));
                }
                let inner = self.expression(0)?;
                self.expect(TokenKind::RParen, "')'")?;
                inner
            }
            TokenKind::Ident(name) => {
                if *self.peek() == TokenKind::Arrow {
                    self.advance();
                    let body = self.expression(0)?;
                    return Ok(ExprTree::lambda(name, body));
                }
                if *self.peek() == TokenKind::LParen {
                    self.advance();
                    let args = self.arguments()?;
                    ExprTree::Call {
                        function: name,
                        args,
                    }
                } else {
                    identifier(name)
                }
            }
            other => {
                return Err(CompileError::new(
                    self.source,
                    start,
                    match other {
                        TokenKind::End => "unexpected end of expression".to_string(),
                        other => format!("unexpected {:?}", other),
                    },
                ))
            }
        };
        self.postfix(primary)
    }

    fn postfix(&mut self, mut target: ExprTree) -> Result<ExprTree, CompileError> {
        loop {
            match self.peek() {
                TokenKind::Dot => {
                    self.advance();
                    let TokenKind::Ident(member) = self.advance() else {
                        return Err(self.error("expected member name after '.'"));
                    };
                    if *self.peek() == TokenKind::LParen {
                        self.advance();
                        let args = self.arguments()?;
                        target = ExprTree::method(target, member, args);
                    } else {
                        target = ExprTree::member(target, member);
                    }
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.expression(0)?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    target = ExprTree::Index {
                        target: Box::new(target),
                        index: Box::new(index),
                    };
                }
                _ => return Ok(target),
            }
        }
    }

    /// Comma-separated arguments; the opening '(' is already consumed
    fn arguments(&mut self) -> Result<Vec<ExprTree>, CompileError> {
        let mut args = Vec::new();
        if *self.peek() == TokenKind::RParen {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.expression(0)?);
            match self.advance() {
                TokenKind::Comma => continue,
                TokenKind::RParen => return Ok(args),
                _ => return Err(self.error("expected ',' or ')' in argument list")),
            }
        }
    }
}

fn identifier(name: String) -> ExprTree {
    match name.as_str() {
        "context" => ExprTree::parameter(TreeParameter::Context),
        "scopedObject" | "scope" => ExprTree::parameter(TreeParameter::Scope),
        "value" => ExprTree::parameter(TreeParameter::Value),
        _ => ExprTree::Variable { name },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope_member(name: &str) -> ExprTree {
        ExprTree::member(ExprTree::parameter(TreeParameter::Scope), name)
    }

    #[test]
    fn negated_member_chain() {
        let tree = parse("!scopedObject.DeceasedDate.HasValue").unwrap();
        assert_eq!(
            tree,
            ExprTree::not(ExprTree::member(scope_member("DeceasedDate"), "HasValue"))
        );
    }

    #[test]
    fn precedence_and_associativity() {
        let tree = parse("1 + 2 * 3 == 7 && true").unwrap();
        let expected = ExprTree::binary(
            BinaryOp::And,
            ExprTree::binary(
                BinaryOp::Equal,
                ExprTree::binary(
                    BinaryOp::Add,
                    ExprTree::constant(1),
                    ExprTree::binary(BinaryOp::Multiply, ExprTree::constant(2), ExprTree::constant(3)),
                ),
                ExprTree::constant(7),
            ),
            ExprTree::constant(true),
        );
        assert_eq!(tree, expected);

        let tree = parse("a - b - c").unwrap();
        assert_eq!(
            tree,
            ExprTree::binary(
                BinaryOp::Subtract,
                ExprTree::binary(BinaryOp::Subtract, ExprTree::variable("a"), ExprTree::variable("b")),
                ExprTree::variable("c"),
            )
        );
    }

    #[test]
    fn conditional_is_right_associative() {
        let tree = parse("a ? 1 : b ? 2 : 3").unwrap();
        match tree {
            ExprTree::Conditional { otherwise, .. } => {
                assert!(matches!(*otherwise, ExprTree::Conditional { .. }))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn methods_with_lambdas() {
        let tree = parse("scopedObject.tags.Any(t => t.key == 'smoker')").unwrap();
        match tree {
            ExprTree::Method { method, args, .. } => {
                assert_eq!(method, "Any");
                assert!(matches!(&args[0], ExprTree::Lambda { parameter, .. } if parameter == "t"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(parse("items.Where((x) => x > 1).Count()").is_ok());
    }

    #[test]
    fn calls_and_indexing() {
        let tree = parse("coalesce(scope.a[0], fact('isAlive'))").unwrap();
        match tree {
            ExprTree::Call { function, args } => {
                assert_eq!(function, "coalesce");
                assert!(matches!(args[0], ExprTree::Index { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn errors_report_offsets() {
        let err = parse("a &&").unwrap_err();
        assert_eq!(err.position, 4);
        assert!(err.message.contains("end of expression"));
        assert!(parse("(a").is_err());
        assert!(parse("a b").is_err());
        assert!(parse("f(a,)").is_err());
    }

    #[test]
    fn deep_nesting_is_rejected_not_overflowed() {
        let source = format!("{}1{}", "(".repeat(500), ")".repeat(500));
        assert!(parse(&source).is_err());
    }
}
