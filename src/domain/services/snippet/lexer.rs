//! Tokenizer for the rule expression language, generated with logos

use logos::Logos;
use serde_json::Value;

use crate::error::CompileError;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum TokenKind {
    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", number)]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", number)]
    Number(Value),

    #[regex(r#""([^"\\]|\\.)*""#, unquote)]
    #[regex(r"'([^'\\]|\\.)*'", unquote)]
    Str(String),

    #[regex(r"[A-Za-z_$@][A-Za-z0-9_$@]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    /// `.` and the null-conditional `?.`
    #[token(".")]
    #[token("?.")]
    Dot,
    #[token(",")]
    Comma,
    #[token("?")]
    Question,
    #[token("??")]
    QuestionQuestion,
    #[token(":")]
    Colon,
    #[token("!")]
    Bang,
    #[token("!=")]
    BangEq,
    #[token("==")]
    EqEq,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEq,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEq,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("=>")]
    Arrow,

    /// Appended by [`tokenize`]; never produced by the lexer itself
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset in the source
    pub position: usize,
}

/// Integers stay integers so that arithmetic on them is exact.
fn number(lex: &mut logos::Lexer<TokenKind>) -> Option<Value> {
    let text = lex.slice();
    if text.contains(['.', 'e', 'E']) {
        let parsed: f64 = text.parse().ok()?;
        serde_json::Number::from_f64(parsed).map(Value::Number)
    } else {
        text.parse::<i64>().ok().map(Value::from)
    }
}

fn unquote(lex: &mut logos::Lexer<TokenKind>) -> String {
    let slice = lex.slice();
    let body = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, CompileError> {
    let mut tokens = Vec::new();
    let mut lexer = TokenKind::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(kind) => tokens.push(Token {
                kind,
                position: span.start,
            }),
            Err(()) => return Err(lex_error(source, span.start)),
        }
    }

    tokens.push(Token {
        kind: TokenKind::End,
        position: source.len(),
    });
    Ok(tokens)
}

fn lex_error(source: &str, position: usize) -> CompileError {
    let rest = &source[position..];
    let message = match rest.chars().next() {
        Some('=') => "assignment is not an expression; use '=='".to_string(),
        Some('"') | Some('\'') => "unterminated string literal".to_string(),
        Some(c) if c.is_ascii_digit() => {
            let text: String = rest.chars().take_while(|c| c.is_ascii_alphanumeric() || *c == '.').collect();
            format!("invalid number '{}'", text)
        }
        Some(c) => format!("unexpected character '{}'", c),
        None => "unexpected end of input".to_string(),
    };
    CompileError::new(source, position, message)
}
