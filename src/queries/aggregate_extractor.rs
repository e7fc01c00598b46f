//! This module provides the expression processor that extracts aggregate function calls from
//! expression trees.

use ::expressions::{Expression, ExpressionError, ExpressionProcessor};

/// This expression-processor implementation looks for aggregate function calls within an
/// expression, extracts them and gives them a generated name (`#AGG0`, `#AGG1`, ...), then
/// replaces the aggregate calls with column references using the generated names.  The
/// extracted calls are handed to a
/// [`HashedGroupAggregateNode`](../plan_nodes/struct.HashedGroupAggregateNode.html), which
/// computes them and exposes the generated columns to the plan above it.
pub struct AggregateFunctionExtractor {
    aggregate_calls: Vec<(String, Expression)>,
    in_aggregate: Option<String>,
    found: bool,
}

impl AggregateFunctionExtractor {
    /// Create a new aggregate function extractor.
    pub fn new() -> AggregateFunctionExtractor {
        AggregateFunctionExtractor {
            aggregate_calls: Vec::new(),
            in_aggregate: None,
            found: false,
        }
    }

    /// Whether any aggregate calls were found in the expressions processed so far.
    pub fn found_aggregates(&self) -> bool {
        self.found
    }

    /// The extracted (generated column name, aggregate call) pairs, in extraction order.
    pub fn get_aggregate_calls(&self) -> Vec<(String, Expression)> {
        self.aggregate_calls.clone()
    }
}

impl ExpressionProcessor for AggregateFunctionExtractor {
    fn enter(&mut self, node: &Expression) -> Result<(), ExpressionError> {
        if let Expression::Function { ref name, .. } = *node {
            if ::functions::directory().is_aggregate(name.as_str()) {
                if let Some(ref parent) = self.in_aggregate {
                    return Err(ExpressionError::NestedAggregateCall(parent.clone(),
                                                                    format!("{}", node)));
                }
                self.in_aggregate = Some(format!("{}", node));
                self.found = true;
            }
        }
        Ok(())
    }

    fn leave(&mut self, node: &Expression) -> Result<Expression, ExpressionError> {
        if let Expression::Function { ref name, .. } = *node {
            if ::functions::directory().is_aggregate(name.as_str()) {
                // We compute the aggregate separately, so replace the call with a placeholder
                // column reference.
                let column = format!("#AGG{}", self.aggregate_calls.len());
                self.aggregate_calls.push((column.clone(), node.clone()));
                self.in_aggregate = None;
                return Ok(Expression::ColumnValue((None, Some(column))));
            }
        }
        Ok(node.clone())
    }
}
