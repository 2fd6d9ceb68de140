//! # Condition Expressions
//!
//! A restricted expression language for filtering rows:
//! - identifiers are column display names (spaces allowed)
//! - number, string, boolean and `null` literals
//! - arithmetic `+ - * / %`, comparison `== != === !== < <= > >=`,
//!   logical `&& ||`, unary `- + !`, parentheses
//!
//! No assignment, no function calls, no member access. Identifiers are
//! resolved at compile time, so an expression that compiles only fails at
//! evaluation if the row lacks a bound value.

pub mod eval;
pub mod lexer;
pub mod parser;

pub use eval::{Context, Value};
pub use parser::{BinaryOp, Expr, UnaryOp};

use crate::types::ComputationError;
use std::collections::BTreeSet;

/// A compiled, reusable condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluator {
    source: String,
    expr: Expr,
}

/// Compile `source`, accepting only identifiers from `allowed`.
///
/// # Errors
/// - `ComputationError::UnknownIdentifier` naming the offending identifier
/// - `ComputationError::UnsupportedOperator` naming the offending operator
/// - `ComputationError::Syntax` for anything else that does not parse
pub fn compile(source: &str, allowed: &[&str]) -> Result<Evaluator, ComputationError> {
    let expr = parser::parse(source, allowed)?;
    Ok(Evaluator {
        source: source.to_string(),
        expr,
    })
}

impl Evaluator {
    /// The expression text as written.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Resolved identifiers the expression reads.
    #[must_use]
    pub fn identifiers(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        collect_identifiers(&self.expr, &mut names);
        names
    }

    /// Evaluate to a runtime value.
    pub fn evaluate(&self, ctx: &dyn Context) -> Result<Value, ComputationError> {
        eval::evaluate(&self.expr, ctx)
    }

    /// Evaluate and apply truthiness.
    pub fn matches(&self, ctx: &dyn Context) -> Result<bool, ComputationError> {
        self.evaluate(ctx).map(|v| v.truthy())
    }
}

fn collect_identifiers<'a>(expr: &'a Expr, out: &mut BTreeSet<&'a str>) {
    match expr {
        Expr::Literal(_) => {}
        Expr::Ident(name) => {
            out.insert(name.as_str());
        }
        Expr::Unary { operand, .. } => collect_identifiers(operand, out),
        Expr::Binary { left, right, .. } => {
            collect_identifiers(left, out);
            collect_identifiers(right, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn row(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn rejects_disallowed_identifier() {
        let err = compile("Foo > 3", &["Bar"]).expect_err("should fail");
        assert!(matches!(&err, ComputationError::UnknownIdentifier(name) if name == "Foo"));
        assert!(err.to_string().contains("Foo"));
    }

    #[test]
    fn evaluates_against_row() {
        let evaluator = compile("Speed * 2 >= 10 && Mode == 'walk'", &["Speed", "Mode"])
            .expect("compile");
        let data = row(&[
            ("Speed", Value::Number(5.0)),
            ("Mode", Value::Str("walk".to_string())),
        ]);
        let ctx = |name: &str| data.get(name).cloned();
        assert_eq!(evaluator.matches(&ctx), Ok(true));

        let slow = row(&[
            ("Speed", Value::Number(4.0)),
            ("Mode", Value::Str("walk".to_string())),
        ]);
        let ctx = |name: &str| slow.get(name).cloned();
        assert_eq!(evaluator.matches(&ctx), Ok(false));
    }

    #[test]
    fn logical_or_yields_operand() {
        let evaluator = compile("a || 'fallback'", &["a"]).expect("compile");
        let ctx = |_: &str| Some(Value::Str(String::new()));
        assert_eq!(
            evaluator.evaluate(&ctx),
            Ok(Value::Str("fallback".to_string()))
        );
    }

    #[test]
    fn unbound_identifier_at_evaluation() {
        let evaluator = compile("a > 1", &["a"]).expect("compile");
        let ctx = |_: &str| -> Option<Value> { None };
        assert_eq!(
            evaluator.matches(&ctx),
            Err(ComputationError::UnknownIdentifier("a".to_string()))
        );
    }

    #[test]
    fn identifiers_are_resolved_names() {
        let evaluator = compile("latitude > 0 || LATITUDE < -1", &["Latitude"]).expect("compile");
        assert_eq!(evaluator.identifiers().into_iter().collect::<Vec<_>>(), vec!["Latitude"]);
        assert_eq!(evaluator.source(), "latitude > 0 || LATITUDE < -1");
    }
}
