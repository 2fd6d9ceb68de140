//! Condition states: rows captured by an expression over column display names.
//!
//! The expression is evaluated once, at capture time. The state then holds
//! the matched Index values, so recomputing the column is a membership test
//! and never re-evaluates the expression.

use crate::config::EngineConfig;
use crate::expr::{self, Value};
use crate::table::Table;
use crate::types::ComputationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionState {
    pub expression: String,
    /// Index values of the rows the expression matched.
    pub matched: BTreeSet<i64>,
}

impl ConditionState {
    /// Evaluate `expression` against every row of `table`.
    ///
    /// # Errors
    /// - `InvalidParameters` when the expression exceeds the configured length
    /// - any compile or evaluation error of the expression
    pub fn capture(
        expression: &str,
        table: &Table,
        config: &EngineConfig,
    ) -> Result<Self, ComputationError> {
        if expression.len() > config.max_expression_length {
            return Err(ComputationError::InvalidParameters(format!(
                "expression longer than {} bytes",
                config.max_expression_length
            )));
        }
        let evaluator = expr::compile(expression, &table.display_names())?;

        let mut matched = BTreeSet::new();
        for row in table.rows() {
            let ctx = |name: &str| row.get_by_display_name(name).map(Value::from);
            if evaluator.matches(&ctx)? {
                matched.insert(row.index());
            }
        }

        debug!(expression, matched = matched.len(), "condition captured");
        Ok(Self {
            expression: expression.to_string(),
            matched,
        })
    }

    #[must_use]
    pub fn compute(&self, table: &Table) -> Vec<bool> {
        table
            .index_values()
            .iter()
            .map(|index| self.matched.contains(index))
            .collect()
    }
}
