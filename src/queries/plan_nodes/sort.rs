//! This module provides the sort plan node, which buffers its child's tuples and emits them in
//! sorted order.

use std::cmp::Ordering;

use ::Schema;
use ::expressions::{Environment, OrderByExpression};
use ::queries::plan_nodes::{PlanCost, PlanNode, indent_explain, make_eval_environment};
use ::queries::planning::{PlanError, PlanResult};
use ::stats::ColumnStats;
use ::storage::TupleLiteral;

/// A plan node that materializes its child's output and sorts it by a list of ordering
/// expressions.  The sort is stable, so tuples that compare equal keep their input order.
pub struct SortNode {
    child: Box<PlanNode>,
    order_by: Vec<OrderByExpression>,
    environment: Option<Environment>,
    sorted: Option<Vec<TupleLiteral>>,
    position: usize,
    marked_position: Option<usize>,
    schema: Option<Schema>,
    cost: Option<PlanCost>,
}

impl SortNode {
    /// Instantiate a new sort node.
    ///
    /// # Arguments
    /// * child - the node producing the tuples to sort.
    /// * order_by - the ordering terms, highest precedence first.
    pub fn new(child: Box<PlanNode>, order_by: Vec<OrderByExpression>) -> SortNode {
        SortNode {
            child: child,
            order_by: order_by,
            environment: None,
            sorted: None,
            position: 0,
            marked_position: None,
            schema: None,
            cost: None,
        }
    }

    /// Pulls every child tuple, computes its sort key, and sorts the buffer.
    fn materialize(&mut self) -> PlanResult<()> {
        let schema = self.schema.clone().ok_or(PlanError::NodeNotPrepared)?;

        self.child.initialize()?;
        let mut keyed: Vec<(Vec<::expressions::Literal>, TupleLiteral)> = Vec::new();
        while let Some(tuple) = self.child.get_next_tuple()? {
            let mut key = Vec::with_capacity(self.order_by.len());
            for term in self.order_by.iter() {
                let mut env = make_eval_environment(&schema, &tuple, &self.environment);
                let value = term.expression
                    .evaluate(&mut Some(&mut env))
                    .map_err(PlanError::ExpressionError)?;
                key.push(value);
            }
            keyed.push((key, tuple));
        }

        let order_by = self.order_by.clone();
        keyed.sort_by(|a, b| {
            for (i, term) in order_by.iter().enumerate() {
                let ordering = a.0[i].sort_compare(&b.0[i]);
                let ordering = if term.ascending {
                    ordering
                } else {
                    ordering.reverse()
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        self.sorted = Some(keyed.into_iter().map(|(_, tuple)| tuple).collect());
        self.position = 0;
        Ok(())
    }
}

impl PlanNode for SortNode {
    fn get_schema(&self) -> Schema {
        self.schema.clone().unwrap_or_else(Schema::new)
    }

    fn get_cost(&self) -> Option<PlanCost> {
        self.cost.clone()
    }

    fn get_column_stats(&self) -> Vec<ColumnStats> {
        self.child.get_column_stats()
    }

    fn prepare(&mut self) -> PlanResult<()> {
        self.child.prepare()?;

        let child_cost = self.child.get_cost().ok_or(PlanError::NodeNotPrepared)?;
        let t = child_cost.num_tuples.max(1.0);
        self.cost = Some(PlanCost {
            num_tuples: child_cost.num_tuples,
            tuple_size: child_cost.tuple_size,
            cpu_cost: child_cost.cpu_cost + t * t.log2(),
            num_block_ios: child_cost.num_block_ios,
            num_large_seeks: child_cost.num_large_seeks,
        });
        self.schema = Some(self.child.get_schema());
        Ok(())
    }

    fn initialize(&mut self) -> PlanResult<()> {
        self.sorted = None;
        self.position = 0;
        self.marked_position = None;
        Ok(())
    }

    fn get_next_tuple(&mut self) -> PlanResult<Option<TupleLiteral>> {
        if self.sorted.is_none() {
            self.materialize()?;
        }

        let sorted = self.sorted.as_ref().unwrap();
        if self.position < sorted.len() {
            let tuple = sorted[self.position].clone();
            self.position += 1;
            Ok(Some(tuple))
        } else {
            Ok(None)
        }
    }

    fn clean_up(&mut self) -> PlanResult<()> {
        self.sorted = None;
        self.position = 0;
        self.child.clean_up()
    }

    fn set_environment(&mut self, env: Environment) {
        self.environment = Some(env.clone());
        self.child.set_environment(env);
    }

    fn results_ordered_by(&self) -> Option<Vec<OrderByExpression>> {
        Some(self.order_by.clone())
    }

    fn supports_marking(&self) -> bool {
        true
    }

    fn mark_current_position(&mut self) -> PlanResult<()> {
        self.marked_position = Some(self.position);
        Ok(())
    }

    fn reset_to_last_mark(&mut self) -> PlanResult<()> {
        match self.marked_position {
            Some(position) => {
                self.position = position;
                Ok(())
            }
            None => Err(PlanError::MarkingNotSupported),
        }
    }

    fn explain(&self) -> String {
        let terms: Vec<String> = self.order_by.iter().map(|t| format!("{}", t)).collect();
        let mut line = format!("Sort[by: {}]", terms.join(", "));
        if let Some(ref cost) = self.cost {
            line.push_str(&format!(" {}", cost));
        }
        format!("{}\n{}", line, indent_explain(&self.child.explain()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::{ColumnInfo, ColumnType, Schema};
    use ::expressions::{Expression, Literal, OrderByExpression};
    use ::queries::plan_nodes::TupleBagNode;
    use ::storage::TupleLiteral;

    fn input() -> Box<PlanNode> {
        let schema = Schema::with_columns(vec![
            ColumnInfo::with_table_name(ColumnType::Integer, "A", "T"),
            ColumnInfo::with_table_name(ColumnType::VarChar { length: 8 }, "B", "T"),
        ])
            .unwrap();
        let rows = vec![(3, "c"), (1, "b"), (2, "a"), (1, "a")]
            .into_iter()
            .map(|(a, b)| {
                TupleLiteral::from_iter(vec![Literal::Int(a), Literal::String(b.into())])
            })
            .collect();
        Box::new(TupleBagNode::new(schema, rows))
    }

    fn column(name: &str) -> Expression {
        Expression::ColumnValue((None, Some(name.into())))
    }

    fn run(mut node: SortNode) -> Vec<Vec<Literal>> {
        node.prepare().unwrap();
        node.initialize().unwrap();
        let mut rows = Vec::new();
        while let Some(tuple) = node.get_next_tuple().unwrap() {
            rows.push(tuple.values());
        }
        node.clean_up().unwrap();
        rows
    }

    #[test]
    fn test_two_key_sort() {
        let node = SortNode::new(input(),
                                 vec![OrderByExpression::ascending(column("A")),
                                      OrderByExpression::descending(column("B"))]);
        assert_eq!(vec![
            vec![Literal::Int(1), Literal::String("b".into())],
            vec![Literal::Int(1), Literal::String("a".into())],
            vec![Literal::Int(2), Literal::String("a".into())],
            vec![Literal::Int(3), Literal::String("c".into())],
        ],
                   run(node));
    }

    #[test]
    fn test_descending_sort() {
        let node = SortNode::new(input(), vec![OrderByExpression::descending(column("A"))]);
        let first: Vec<Literal> = run(node).remove(0);
        assert_eq!(Literal::Int(3), first[0]);
    }

    #[test]
    fn test_nulls_sort_first() {
        let schema = Schema::with_columns(vec![
            ColumnInfo::with_table_name(ColumnType::Integer, "A", "T"),
        ])
            .unwrap();
        let rows = vec![TupleLiteral::from_iter(vec![Literal::Int(1)]),
                        TupleLiteral::from_iter(vec![Literal::Null]),
                        TupleLiteral::from_iter(vec![Literal::Int(0)])];
        let node = SortNode::new(Box::new(TupleBagNode::new(schema, rows)),
                                 vec![OrderByExpression::ascending(column("A"))]);
        assert_eq!(vec![vec![Literal::Null], vec![Literal::Int(0)], vec![Literal::Int(1)]],
                   run(node));
    }

    #[test]
    fn test_sort_cost_adds_t_log_t() {
        let mut node = SortNode::new(input(), vec![OrderByExpression::ascending(column("A"))]);
        node.prepare().unwrap();
        let cost = node.get_cost().unwrap();
        assert!(cost.cpu_cost > 4.0);
        assert_eq!(4.0, cost.num_tuples);
    }

    #[test]
    fn test_mark_and_reset() {
        let mut node = SortNode::new(input(), vec![OrderByExpression::ascending(column("A"))]);
        node.prepare().unwrap();
        node.initialize().unwrap();

        let first = node.get_next_tuple().unwrap().unwrap();
        node.mark_current_position().unwrap();
        let second = node.get_next_tuple().unwrap().unwrap();
        assert!(first != second);

        node.reset_to_last_mark().unwrap();
        assert_eq!(Some(second), node.get_next_tuple().unwrap());
    }
}
