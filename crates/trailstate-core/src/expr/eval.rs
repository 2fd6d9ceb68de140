//! Expression evaluation with loose, spreadsheet-like coercions.
//!
//! `+` concatenates when either side is text, `==` coerces, `===` does not,
//! and `&&`/`||` yield an operand rather than a boolean.

use super::parser::{BinaryOp, Expr, UnaryOp};
use crate::types::{CellValue, ComputationError};
use std::cmp::Ordering;
use std::fmt;

/// Runtime value of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
}

impl Value {
    /// Zero, NaN, empty text, `false` and null are falsy.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Str(s) => !s.is_empty(),
            Self::Bool(b) => *b,
            Self::Null => false,
        }
    }

    /// Numeric coercion: blank text is 0, unparseable text is NaN.
    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Number(n) => *n,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Null => 0.0,
            Self::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
        }
    }

    fn loose_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Null, _) | (_, Self::Null) => false,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            _ => self.to_number() == other.to_number(),
        }
    }

    fn strict_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Null, Self::Null) => true,
            _ => false,
        }
    }

    /// Relational comparison; `None` when either side is NaN.
    fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Some(a.cmp(b)),
            _ => self.to_number().partial_cmp(&other.to_number()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) if n.is_nan() => f.write_str("NaN"),
            Self::Number(n) if n.is_infinite() => {
                f.write_str(if *n > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e21 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{}", n),
            Self::Str(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Null => f.write_str("null"),
        }
    }
}

impl From<&CellValue> for Value {
    /// Timestamps evaluate to epoch milliseconds.
    fn from(cell: &CellValue) -> Self {
        match cell {
            CellValue::Null => Self::Null,
            CellValue::Bool(b) => Self::Bool(*b),
            CellValue::Int(i) => Self::Number(*i as f64),
            CellValue::Float(x) => Self::Number(*x),
            CellValue::Text(s) => Self::Str(s.clone()),
            CellValue::Time(t) => Self::Number(t.and_utc().timestamp_millis() as f64),
        }
    }
}

// =============================================================================
// CONTEXT
// =============================================================================

/// Supplies identifier values during evaluation.
pub trait Context {
    /// Value bound to a resolved identifier, `None` if it is unbound.
    fn value(&self, name: &str) -> Option<Value>;
}

impl<F> Context for F
where
    F: Fn(&str) -> Option<Value>,
{
    fn value(&self, name: &str) -> Option<Value> {
        self(name)
    }
}

// =============================================================================
// EVALUATION
// =============================================================================

pub(crate) fn evaluate(expr: &Expr, ctx: &dyn Context) -> Result<Value, ComputationError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Ident(name) => ctx
            .value(name)
            .ok_or_else(|| ComputationError::UnknownIdentifier(name.clone())),
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, ctx)?;
            Ok(match op {
                UnaryOp::Neg => Value::Number(-value.to_number()),
                UnaryOp::Plus => Value::Number(value.to_number()),
                UnaryOp::Not => Value::Bool(!value.truthy()),
            })
        }
        Expr::Binary { op, left, right } => {
            let left = evaluate(left, ctx)?;
            // && and || short-circuit and yield an operand.
            match op {
                BinaryOp::And if !left.truthy() => return Ok(left),
                BinaryOp::Or if left.truthy() => return Ok(left),
                BinaryOp::And | BinaryOp::Or => return evaluate(right, ctx),
                _ => {}
            }
            let right = evaluate(right, ctx)?;
            Ok(apply(*op, &left, &right))
        }
    }
}

fn apply(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => match (left, right) {
            (Value::Str(_), _) | (_, Value::Str(_)) => Value::Str(format!("{}{}", left, right)),
            _ => Value::Number(left.to_number() + right.to_number()),
        },
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::LooseEq => Value::Bool(left.loose_eq(right)),
        BinaryOp::LooseNe => Value::Bool(!left.loose_eq(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_eq(right)),
        BinaryOp::StrictNe => Value::Bool(!left.strict_eq(right)),
        BinaryOp::Lt => Value::Bool(left.compare(right) == Some(Ordering::Less)),
        BinaryOp::Le => Value::Bool(matches!(
            left.compare(right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Gt => Value::Bool(left.compare(right) == Some(Ordering::Greater)),
        BinaryOp::Ge => Value::Bool(matches!(
            left.compare(right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        // Handled with short-circuiting in `evaluate`.
        BinaryOp::And | BinaryOp::Or => Value::Null,
    }
}
