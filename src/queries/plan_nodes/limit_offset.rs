//! This module provides the limit/offset plan node.

use ::Schema;
use ::expressions::Environment;
use ::queries::plan_nodes::{PlanCost, PlanNode, indent_explain};
use ::queries::planning::{PlanError, PlanResult};
use ::stats::ColumnStats;
use ::storage::TupleLiteral;

/// A plan node that skips the first `offset` child tuples and then emits at most `limit`
/// tuples.
///
/// The limit is optional, and an absent limit is not the same thing as `LIMIT 0`: with no
/// limit every remaining tuple flows through, while an explicit limit of zero truncates the
/// output to nothing.
pub struct LimitOffsetNode {
    child: Box<PlanNode>,
    limit: Option<u32>,
    offset: u32,
    skipped: u32,
    emitted: u32,
    cost: Option<PlanCost>,
}

impl LimitOffsetNode {
    /// Instantiate a new limit/offset node.
    ///
    /// # Arguments
    /// * child - the node producing the tuples.
    /// * limit - the maximum number of tuples to emit, or `None` for no limit.
    /// * offset - the number of initial tuples to skip.
    pub fn new(child: Box<PlanNode>, limit: Option<u32>, offset: u32) -> LimitOffsetNode {
        LimitOffsetNode {
            child: child,
            limit: limit,
            offset: offset,
            skipped: 0,
            emitted: 0,
            cost: None,
        }
    }
}

impl PlanNode for LimitOffsetNode {
    fn get_schema(&self) -> Schema {
        self.child.get_schema()
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
        let past_offset = (child_cost.num_tuples - self.offset as f32).max(0.0);
        let num_tuples = match self.limit {
            Some(limit) => past_offset.min(limit as f32),
            None => past_offset,
        };

        self.cost = Some(PlanCost {
            num_tuples: num_tuples,
            tuple_size: child_cost.tuple_size,
            cpu_cost: child_cost.cpu_cost,
            num_block_ios: child_cost.num_block_ios,
            num_large_seeks: child_cost.num_large_seeks,
        });
        Ok(())
    }

    fn initialize(&mut self) -> PlanResult<()> {
        self.skipped = 0;
        self.emitted = 0;
        self.child.initialize()
    }

    fn get_next_tuple(&mut self) -> PlanResult<Option<TupleLiteral>> {
        if let Some(limit) = self.limit {
            if self.emitted >= limit {
                return Ok(None);
            }
        }

        while self.skipped < self.offset {
            if self.child.get_next_tuple()?.is_none() {
                return Ok(None);
            }
            self.skipped += 1;
        }

        match self.child.get_next_tuple()? {
            Some(tuple) => {
                self.emitted += 1;
                Ok(Some(tuple))
            }
            None => Ok(None),
        }
    }

    fn clean_up(&mut self) -> PlanResult<()> {
        self.child.clean_up()
    }

    fn set_environment(&mut self, env: Environment) {
        self.child.set_environment(env);
    }

    fn results_ordered_by(&self) -> Option<Vec<::expressions::OrderByExpression>> {
        self.child.results_ordered_by()
    }

    fn explain(&self) -> String {
        let limit = match self.limit {
            Some(limit) => limit.to_string(),
            None => "none".to_string(),
        };
        let mut line = format!("LimitOffset[limit: {}, offset: {}]", limit, self.offset);
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
    use ::expressions::Literal;
    use ::queries::plan_nodes::TupleBagNode;
    use ::storage::TupleLiteral;

    fn five_tuples() -> Box<PlanNode> {
        let schema = Schema::with_columns(vec![
            ColumnInfo::with_table_name(ColumnType::Integer, "A", "T"),
        ])
            .unwrap();
        let rows = (1..6).map(|i| TupleLiteral::from_iter(vec![Literal::Int(i)])).collect();
        Box::new(TupleBagNode::new(schema, rows))
    }

    fn run(mut node: LimitOffsetNode) -> Vec<Literal> {
        node.prepare().unwrap();
        node.initialize().unwrap();
        let mut values = Vec::new();
        while let Some(tuple) = node.get_next_tuple().unwrap() {
            values.push(tuple.get(0).cloned().unwrap());
        }
        node.clean_up().unwrap();
        values
    }

    #[test]
    fn test_limit_and_offset() {
        let node = LimitOffsetNode::new(five_tuples(), Some(2), 1);
        assert_eq!(vec![Literal::Int(2), Literal::Int(3)], run(node));
    }

    #[test]
    fn test_no_limit_passes_everything_past_offset() {
        let node = LimitOffsetNode::new(five_tuples(), None, 1);
        assert_eq!(vec![Literal::Int(2), Literal::Int(3), Literal::Int(4), Literal::Int(5)],
                   run(node));
    }

    #[test]
    fn test_explicit_zero_limit_is_empty() {
        // LIMIT 0 truly limits: nothing comes out, even with tuples past the offset.
        let node = LimitOffsetNode::new(five_tuples(), Some(0), 1);
        assert!(run(node).is_empty());
    }

    #[test]
    fn test_offset_past_end_is_empty() {
        let node = LimitOffsetNode::new(five_tuples(), Some(3), 100);
        assert!(run(node).is_empty());
    }

    #[test]
    fn test_limit_without_offset() {
        let node = LimitOffsetNode::new(five_tuples(), Some(3), 0);
        assert_eq!(vec![Literal::Int(1), Literal::Int(2), Literal::Int(3)], run(node));
    }

    #[test]
    fn test_reinitialize_resets_counters() {
        let mut node = LimitOffsetNode::new(five_tuples(), Some(2), 1);
        node.prepare().unwrap();

        for _ in 0..2 {
            node.initialize().unwrap();
            let mut values = Vec::new();
            while let Some(tuple) = node.get_next_tuple().unwrap() {
                values.push(tuple.get(0).cloned().unwrap());
            }
            assert_eq!(vec![Literal::Int(2), Literal::Int(3)], values);
        }
    }
}
