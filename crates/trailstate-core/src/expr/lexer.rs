//! Lexer for condition expressions using Logos

use crate::types::ComputationError;
use logos::Logos;
use std::fmt;

/// Token type for condition expressions
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    // === Keywords ===
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    // === Supported operators ===
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

    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("===")]
    EqEqEq,
    #[token("!==")]
    NotEqEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,

    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Bang,

    // === Delimiters ===
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    // === Recognized but rejected ===
    #[token("=", |lex| lex.slice().to_string())]
    #[token("&", |lex| lex.slice().to_string())]
    #[token("|", |lex| lex.slice().to_string())]
    #[token("^", |lex| lex.slice().to_string())]
    #[token("~", |lex| lex.slice().to_string())]
    #[token("**", |lex| lex.slice().to_string())]
    #[token("<<", |lex| lex.slice().to_string())]
    #[token(">>", |lex| lex.slice().to_string())]
    #[token(">>>", |lex| lex.slice().to_string())]
    #[token("??", |lex| lex.slice().to_string())]
    #[token("?", |lex| lex.slice().to_string())]
    #[token(":", |lex| lex.slice().to_string())]
    #[token(".", |lex| lex.slice().to_string())]
    #[token("?.", |lex| lex.slice().to_string())]
    #[token(",", |lex| lex.slice().to_string())]
    #[token("[", |lex| lex.slice().to_string())]
    #[token("]", |lex| lex.slice().to_string())]
    #[token("{", |lex| lex.slice().to_string())]
    #[token("}", |lex| lex.slice().to_string())]
    #[token("=>", |lex| lex.slice().to_string())]
    #[token("++", |lex| lex.slice().to_string())]
    #[token("--", |lex| lex.slice().to_string())]
    #[token("+=", |lex| lex.slice().to_string())]
    #[token("-=", |lex| lex.slice().to_string())]
    #[token("*=", |lex| lex.slice().to_string())]
    #[token("/=", |lex| lex.slice().to_string())]
    #[token("%=", |lex| lex.slice().to_string())]
    Unsupported(String),

    // === Literals ===
    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| unescape(lex.slice()))]
    String(String),

    // === Identifier ===
    #[regex(r"[a-zA-Z_$][a-zA-Z0-9_$]*", |lex| lex.slice().to_string())]
    Ident(String),
}

/// Strip the quotes of a string literal and resolve escapes.
fn unescape(quoted: &str) -> Option<String> {
    let inner = quoted.get(1..quoted.len().checked_sub(1)?)?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            other => out.push(other),
        }
    }
    Some(out)
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Null => write!(f, "null"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::EqEqEq => write!(f, "==="),
            Token::NotEqEq => write!(f, "!=="),
            Token::Lt => write!(f, "<"),
            Token::Le => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Ge => write!(f, ">="),
            Token::AndAnd => write!(f, "&&"),
            Token::OrOr => write!(f, "||"),
            Token::Bang => write!(f, "!"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Unsupported(op) => write!(f, "{}", op),
            Token::Number(n) => write!(f, "{}", n),
            Token::String(s) => write!(f, "{:?}", s),
            Token::Ident(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

/// Tokenize a whole expression.
///
/// Input Logos cannot match is a syntax error at its byte offset.
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, ComputationError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(token) => tokens.push(SpannedToken {
                token,
                start: span.start,
                end: span.end,
            }),
            Err(()) => {
                return Err(ComputationError::Syntax {
                    position: span.start,
                    message: format!("unexpected input '{}'", lexer.slice()),
                });
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        tokenize(source)
            .expect("tokenize")
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            lex(r#"42 3.5 .5 "a\"b" 'c' true null"#),
            vec![
                Token::Number(42.0),
                Token::Number(3.5),
                Token::Number(0.5),
                Token::String("a\"b".to_string()),
                Token::String("c".to_string()),
                Token::True,
                Token::Null,
            ]
        );
    }

    #[test]
    fn test_operators_longest_match() {
        assert_eq!(
            lex("a === b !== c <= -1"),
            vec![
                Token::Ident("a".to_string()),
                Token::EqEqEq,
                Token::Ident("b".to_string()),
                Token::NotEqEq,
                Token::Ident("c".to_string()),
                Token::Le,
                Token::Minus,
                Token::Number(1.0),
            ]
        );
    }

    #[test]
    fn test_rejected_operators_are_tokens() {
        assert_eq!(
            lex("a << b = c"),
            vec![
                Token::Ident("a".to_string()),
                Token::Unsupported("<<".to_string()),
                Token::Ident("b".to_string()),
                Token::Unsupported("=".to_string()),
                Token::Ident("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_unknown_input_is_syntax_error() {
        let err = tokenize("a # b").expect_err("should fail");
        assert!(matches!(err, ComputationError::Syntax { position: 2, .. }));
    }

    #[test]
    fn test_token_display() {
        assert_eq!(Token::EqEqEq.to_string(), "===");
        assert_eq!(Token::Unsupported(">>".to_string()).to_string(), ">>");
        assert_eq!(Token::String("x".to_string()).to_string(), "\"x\"");
    }
}
