use std::collections::BTreeMap;

use kestrel_common::datum::Datum;
use kestrel_common::error::RouteError;

use crate::column::Column;

/// Comparison operator of a sharding predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardingOperator {
    Equal,
    In,
}

/// One value expression inside a predicate: either a literal captured at
/// parse time or a `?` placeholder resolved from the statement parameters.
#[derive(Debug, Clone)]
pub enum ConditionExpr {
    Literal(Datum),
    Placeholder(usize),
}

/// One parsed predicate occurrence over a sharding column, e.g.
/// `user_id = 10` or `order_id IN (?, 2, ?)`.
///
/// Literal values and placeholder slots are recorded against their position
/// within the predicate's value list; `values()` merges both back into one
/// ordered list at execution time, preserving source-text position. The
/// union of the two maps' keys is always the contiguous range `0..k` because
/// construction assigns positions sequentially.
#[derive(Debug, Clone)]
pub struct ShardingCondition {
    column: Column,
    start_index: usize,
    stop_index: usize,
    operator: ShardingOperator,
    position_value_map: BTreeMap<usize, Datum>,
    position_index_map: BTreeMap<usize, usize>,
}

impl ShardingCondition {
    /// Build an `=` condition with a single value expression.
    pub fn equal(column: Column, start_index: usize, stop_index: usize, expr: ConditionExpr) -> Self {
        let mut condition = Self {
            column,
            start_index,
            stop_index,
            operator: ShardingOperator::Equal,
            position_value_map: BTreeMap::new(),
            position_index_map: BTreeMap::new(),
        };
        condition.put_position(0, expr);
        condition
    }

    /// Build an `IN` condition over the listed value expressions.
    pub fn in_values(
        column: Column,
        start_index: usize,
        stop_index: usize,
        exprs: impl IntoIterator<Item = ConditionExpr>,
    ) -> Self {
        let mut condition = Self {
            column,
            start_index,
            stop_index,
            operator: ShardingOperator::In,
            position_value_map: BTreeMap::new(),
            position_index_map: BTreeMap::new(),
        };
        for (position, expr) in exprs.into_iter().enumerate() {
            condition.put_position(position, expr);
        }
        condition
    }

    fn put_position(&mut self, position: usize, expr: ConditionExpr) {
        match expr {
            ConditionExpr::Literal(value) => {
                self.position_value_map.insert(position, value);
            }
            ConditionExpr::Placeholder(parameter_index) => {
                self.position_index_map.insert(position, parameter_index);
            }
        }
    }

    pub fn column(&self) -> &Column {
        &self.column
    }

    pub fn operator(&self) -> ShardingOperator {
        self.operator
    }

    /// Whether this condition covers the same source-text span.
    pub fn is_same_index(&self, start_index: usize, stop_index: usize) -> bool {
        self.start_index == start_index && self.stop_index == stop_index
    }

    /// Merge literal values with placeholder-resolved parameters into one
    /// ordered value list. A placeholder referencing a parameter slot the
    /// caller did not supply is an error, never a default.
    pub fn values(&self, parameters: &[Datum]) -> Result<Vec<Datum>, RouteError> {
        let mut result: Vec<Datum> = self.position_value_map.values().cloned().collect();
        for (&position, &parameter_index) in &self.position_index_map {
            let parameter = parameters
                .get(parameter_index)
                .cloned()
                .ok_or(RouteError::MissingParameter(parameter_index))?;
            if position < result.len() {
                result.insert(position, parameter);
            } else {
                result.push(parameter);
            }
        }
        Ok(result)
    }
}
