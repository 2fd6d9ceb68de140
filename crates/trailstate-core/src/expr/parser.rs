//! Precedence-climbing parser for condition expressions.
//!
//! Column names that are not plain identifiers ("Date Created",
//! "Distance from last") are swapped for placeholder identifiers before
//! lexing and swapped back when the identifier is resolved.

use super::eval::Value;
use super::lexer::{SpannedToken, Token, tokenize};
use crate::types::ComputationError;

const PLACEHOLDER_PREFIX: &str = "__trailstate_ident_";

// =============================================================================
// AST
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    LooseEq,
    LooseNe,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    fn from_token(token: &Token) -> Option<Self> {
        Some(match token {
            Token::Plus => Self::Add,
            Token::Minus => Self::Sub,
            Token::Star => Self::Mul,
            Token::Slash => Self::Div,
            Token::Percent => Self::Rem,
            Token::EqEq => Self::LooseEq,
            Token::NotEq => Self::LooseNe,
            Token::EqEqEq => Self::StrictEq,
            Token::NotEqEq => Self::StrictNe,
            Token::Lt => Self::Lt,
            Token::Le => Self::Le,
            Token::Gt => Self::Gt,
            Token::Ge => Self::Ge,
            Token::AndAnd => Self::And,
            Token::OrOr => Self::Or,
            _ => return None,
        })
    }

    /// Binding power; higher binds tighter.
    const fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::LooseEq | Self::LooseNe | Self::StrictEq | Self::StrictNe => 3,
            Self::Lt | Self::Le | Self::Gt | Self::Ge => 4,
            Self::Add | Self::Sub => 5,
            Self::Mul | Self::Div | Self::Rem => 6,
        }
    }
}

/// Parsed expression. Identifiers hold the resolved column display name.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Ident(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

// =============================================================================
// PLACEHOLDERS
// =============================================================================

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(is_ident_char)
}

/// Replace every occurrence of a non-identifier column name outside string
/// literals with a placeholder. Longer names are tried first; matching is
/// ASCII case-insensitive and respects identifier boundaries.
///
/// Returns the rewritten text and the placeholder -> name table.
pub(crate) fn substitute_names(source: &str, allowed: &[&str]) -> (String, Vec<String>) {
    let mut names: Vec<&str> = allowed
        .iter()
        .copied()
        .filter(|n| !n.is_empty() && !is_plain_identifier(n))
        .collect();
    if names.is_empty() {
        return (source.to_string(), Vec::new());
    }
    names.sort_by_key(|n| std::cmp::Reverse(n.len()));

    let lowered = source.to_ascii_lowercase();
    let mut out = String::with_capacity(source.len());
    let mut table: Vec<String> = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut pos = 0;

    while let Some(c) = source[pos..].chars().next() {
        if let Some(q) = quote {
            out.push(c);
            pos += c.len_utf8();
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        if c == '"' || c == '\'' {
            quote = Some(c);
            out.push(c);
            pos += 1;
            continue;
        }

        let boundary_before = source[..pos].chars().next_back().is_none_or(|p| !is_ident_char(p));
        let matched = boundary_before
            .then(|| {
                names.iter().copied().find(|name| {
                    let end = pos + name.len();
                    lowered.get(pos..end) == Some(name.to_ascii_lowercase().as_str())
                        && source[end..].chars().next().is_none_or(|n| !is_ident_char(n))
                })
            })
            .flatten();

        match matched {
            Some(name) => {
                let slot = match table.iter().position(|t| t == name) {
                    Some(slot) => slot,
                    None => {
                        table.push(name.to_string());
                        table.len() - 1
                    }
                };
                out.push_str(&format!("{}{}", PLACEHOLDER_PREFIX, slot));
                pos += name.len();
            }
            None => {
                out.push(c);
                pos += c.len_utf8();
            }
        }
    }
    (out, table)
}

// =============================================================================
// PARSER
// =============================================================================

/// Parse `source` and resolve its identifiers against `allowed`.
///
/// An identifier that matches an allowed name exactly binds to it; otherwise
/// the first case-insensitive match is used; otherwise the identifier is
/// rejected.
pub fn parse(source: &str, allowed: &[&str]) -> Result<Expr, ComputationError> {
    let (rewritten, placeholders) = substitute_names(source, allowed);
    let tokens = tokenize(&rewritten)?;
    if tokens.is_empty() {
        return Err(ComputationError::Syntax {
            position: 0,
            message: "empty expression".to_string(),
        });
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        end: rewritten.len(),
        allowed,
        placeholders: &placeholders,
    };
    let expr = parser.expression(0)?;
    match parser.peek() {
        None => Ok(expr),
        Some(SpannedToken {
            token: Token::Unsupported(op),
            ..
        }) => Err(ComputationError::UnsupportedOperator(op.clone())),
        Some(SpannedToken { token, start, .. }) => Err(ComputationError::Syntax {
            position: *start,
            message: format!("unexpected '{}'", token),
        }),
    }
}

struct Parser<'a> {
    tokens: Vec<SpannedToken>,
    pos: usize,
    end: usize,
    allowed: &'a [&'a str],
    placeholders: &'a [String],
}

impl Parser<'_> {
    fn peek(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<SpannedToken> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expression(&mut self, min_precedence: u8) -> Result<Expr, ComputationError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(SpannedToken {
                    token: Token::Unsupported(op),
                    ..
                }) => return Err(ComputationError::UnsupportedOperator(op.clone())),
                Some(spanned) => match BinaryOp::from_token(&spanned.token) {
                    Some(op) if op.precedence() > min_precedence => op,
                    _ => break,
                },
                None => break,
            };
            self.advance();
            let right = self.expression(op.precedence())?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ComputationError> {
        let op = match self.peek().map(|t| &t.token) {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Plus,
            Some(Token::Bang) => UnaryOp::Not,
            _ => return self.primary(),
        };
        self.advance();
        let operand = self.unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn primary(&mut self) -> Result<Expr, ComputationError> {
        let Some(SpannedToken { token, start, .. }) = self.advance() else {
            return Err(ComputationError::Syntax {
                position: self.end,
                message: "unexpected end of expression".to_string(),
            });
        };
        let expr = match token {
            Token::Number(n) => Expr::Literal(Value::Number(n)),
            Token::String(s) => Expr::Literal(Value::Str(s)),
            Token::True => Expr::Literal(Value::Bool(true)),
            Token::False => Expr::Literal(Value::Bool(false)),
            Token::Null => Expr::Literal(Value::Null),
            Token::Ident(name) => Expr::Ident(self.resolve(&name)?),
            Token::LParen => {
                let inner = self.expression(0)?;
                match self.advance() {
                    Some(SpannedToken {
                        token: Token::RParen,
                        ..
                    }) => inner,
                    Some(SpannedToken {
                        token: Token::Unsupported(op),
                        ..
                    }) => return Err(ComputationError::UnsupportedOperator(op)),
                    Some(SpannedToken { token, start, .. }) => {
                        return Err(ComputationError::Syntax {
                            position: start,
                            message: format!("expected ')', found '{}'", token),
                        });
                    }
                    None => {
                        return Err(ComputationError::Syntax {
                            position: self.end,
                            message: "expected ')'".to_string(),
                        });
                    }
                }
            }
            Token::Unsupported(op) => return Err(ComputationError::UnsupportedOperator(op)),
            other => {
                return Err(ComputationError::Syntax {
                    position: start,
                    message: format!("unexpected '{}'", other),
                });
            }
        };

        if let Some(SpannedToken {
            token: Token::LParen,
            start,
            ..
        }) = self.peek()
        {
            return Err(ComputationError::Syntax {
                position: *start,
                message: "function calls are not supported".to_string(),
            });
        }
        Ok(expr)
    }

    fn resolve(&self, raw: &str) -> Result<String, ComputationError> {
        let name = raw
            .strip_prefix(PLACEHOLDER_PREFIX)
            .and_then(|slot| slot.parse::<usize>().ok())
            .and_then(|slot| self.placeholders.get(slot))
            .map(String::as_str)
            .unwrap_or(raw);

        if let Some(exact) = self.allowed.iter().find(|a| **a == name) {
            return Ok((*exact).to_string());
        }
        let lowered = name.to_lowercase();
        self.allowed
            .iter()
            .find(|a| a.to_lowercase() == lowered)
            .map(|a| (*a).to_string())
            .ok_or_else(|| ComputationError::UnknownIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Ident(name.to_string()))
    }

    #[test]
    fn precedence_multiplication_over_addition() {
        let expr = parse("a + b * 2", &["a", "b"]).expect("parse");
        let Expr::Binary { op, right, .. } = expr else {
            unreachable!("expected binary expression");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn logical_operators_bind_loosest() {
        let expr = parse("a > 1 && b < 2 || a == b", &["a", "b"]).expect("parse");
        assert!(matches!(expr, Expr::Binary { op: BinaryOp::Or, .. }));
    }

    #[test]
    fn names_with_spaces_are_substituted() {
        let expr = parse("Date Created (clean) > 3 && date created != ''", &[
            "Date Created",
            "Date Created (clean)",
        ])
        .expect("parse");
        let Expr::Binary { left, right, .. } = expr else {
            unreachable!("expected binary expression");
        };
        assert_eq!(
            *left,
            Expr::Binary {
                op: BinaryOp::Gt,
                left: ident("Date Created (clean)"),
                right: Box::new(Expr::Literal(Value::Number(3.0))),
            }
        );
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::LooseNe, .. }));
    }

    #[test]
    fn names_inside_strings_are_left_alone() {
        let (text, table) = substitute_names("Speed Limit == 'Speed Limit'", &["Speed Limit"]);
        assert_eq!(table, vec!["Speed Limit".to_string()]);
        assert!(text.ends_with("'Speed Limit'"));
        assert!(text.starts_with(PLACEHOLDER_PREFIX));
    }

    #[test]
    fn case_insensitive_fallback() {
        let expr = parse("speed > 3", &["Speed"]).expect("parse");
        let Expr::Binary { left, .. } = expr else {
            unreachable!("expected binary expression");
        };
        assert_eq!(left, ident("Speed"));
    }

    #[test]
    fn unknown_identifier_names_the_token() {
        let err = parse("Foo > 3", &["Bar"]).expect_err("should fail");
        assert_eq!(err, ComputationError::UnknownIdentifier("Foo".to_string()));
        assert!(err.to_string().contains("Foo"));
    }

    #[test]
    fn unsupported_operators_rejected() {
        for source in ["a << 2", "a = 2", "a ** 2", "a.b", "a ? 1 : 2"] {
            let err = parse(source, &["a", "b"]).expect_err(source);
            assert!(
                matches!(err, ComputationError::UnsupportedOperator(_)),
                "{source}: {err:?}"
            );
        }
    }

    #[test]
    fn syntax_errors() {
        for source in ["", "a >", "(a > 1", "a b", "f(1)"] {
            let err = parse(source, &["a", "b", "f"]).expect_err(source);
            assert!(matches!(err, ComputationError::Syntax { .. }), "{source}: {err:?}");
        }
    }
}
