//! This module provides the nested-loops join plan node.

use ::Schema;
use ::expressions::{Environment, Expression, JoinType, Literal};
use ::queries::plan_nodes::{PlanCost, PlanNode, indent_explain};
use ::queries::planning::{PlanError, PlanResult};
use ::stats::{ColumnStats, TableStats, estimate_selectivity, update_stats};
use ::storage::TupleLiteral;

/// This plan node implements a nested-loops join operation, which can support arbitrary join
/// conditions but is also the slowest join implementation.
///
/// The outer loop runs over the left child; for each left tuple the right child is restarted
/// (for a `FULL OUTER` join the right side is buffered instead, so unmatched right tuples can
/// be emitted at the end).  A `RIGHT OUTER` join cannot be evaluated directly by a nested loop,
/// so it is rewritten at construction time into a `LEFT OUTER` join with swapped children; the
/// output schema swaps back so callers see the original column order.
pub struct NestedLoopJoinNode {
    left: Box<PlanNode>,
    right: Box<PlanNode>,
    join_type: JoinType,
    /// The join predicate; `None` means an unconditional (cross) join.
    pub predicate: Option<Expression>,
    environment: Option<Environment>,
    /// Whether the children were swapped to emulate a right outer join.
    schema_swapped: bool,

    done: bool,
    left_tuple: Option<TupleLiteral>,
    /// Whether the current left tuple has joined with any right tuple yet.
    matched: bool,
    /// For `FULL OUTER` only: the buffered right side and per-tuple matched flags.
    buffered_right: Option<Vec<TupleLiteral>>,
    right_matched: Vec<bool>,
    right_position: usize,
    /// After the outer loop ends, a full outer join walks this index over the buffered right
    /// side to emit its unmatched tuples.
    emitting_right_remainder: bool,

    schema: Option<Schema>,
    left_schema: Option<Schema>,
    right_schema: Option<Schema>,
    cost: Option<PlanCost>,
    column_stats: Vec<ColumnStats>,
}

impl NestedLoopJoinNode {
    /// Instantiate a new nested-loops join node.
    pub fn new(left: Box<PlanNode>,
               right: Box<PlanNode>,
               join_type: JoinType,
               predicate: Option<Expression>)
               -> NestedLoopJoinNode {
        // We can't naturally evaluate a RIGHT OUTER join with nested loops, but we can get
        // around that limitation by swapping the children and the output schema.
        let (left, right, join_type, swapped) = match join_type {
            JoinType::RightOuter => (right, left, JoinType::LeftOuter, true),
            other => (left, right, other, false),
        };

        NestedLoopJoinNode {
            left: left,
            right: right,
            join_type: join_type,
            predicate: predicate,
            environment: None,
            schema_swapped: swapped,
            done: false,
            left_tuple: None,
            matched: false,
            buffered_right: None,
            right_matched: Vec::new(),
            right_position: 0,
            emitting_right_remainder: false,
            schema: None,
            left_schema: None,
            right_schema: None,
            cost: None,
            column_stats: Vec::new(),
        }
    }

    /// Whether the join emits only left-side columns.
    fn left_only_output(&self) -> bool {
        match self.join_type {
            JoinType::Semijoin | JoinType::Antijoin => true,
            _ => false,
        }
    }

    fn can_join_tuples(&self,
                       left: &TupleLiteral,
                       right: &TupleLiteral)
                       -> PlanResult<bool> {
        let predicate = match self.predicate {
            Some(ref predicate) => predicate,
            None => {
                return Ok(true);
            }
        };

        let mut env = Environment::new();
        env.add_tuple(self.left_schema.clone().unwrap(), left.clone());
        env.add_tuple(self.right_schema.clone().unwrap(), right.clone());
        if let Some(ref parent) = self.environment {
            env.add_parent_env(parent.clone());
        }

        match predicate.evaluate(&mut Some(&mut env)) {
            Ok(Literal::True) => Ok(true),
            Ok(Literal::False) | Ok(Literal::Null) => Ok(false),
            Ok(other) => Err(PlanError::InvalidPredicate(other)),
            Err(e) => Err(PlanError::CouldNotApplyPredicate(e)),
        }
    }

    fn join_tuples(&self, left: &TupleLiteral, right: &TupleLiteral) -> TupleLiteral {
        let mut result = TupleLiteral::new();
        if !self.schema_swapped {
            for value in left.values() {
                result.add_value(value);
            }
            for value in right.values() {
                result.add_value(value);
            }
        } else {
            for value in right.values() {
                result.add_value(value);
            }
            for value in left.values() {
                result.add_value(value);
            }
        }
        result
    }

    /// Pulls the next right tuple for the current left tuple: from the buffer for full outer
    /// joins, from the restarted right child otherwise.  Returns the tuple along with its
    /// buffer index (meaningful only when buffering).
    fn next_right_tuple(&mut self) -> PlanResult<Option<(TupleLiteral, usize)>> {
        match self.buffered_right {
            Some(ref buffered) => {
                if self.right_position < buffered.len() {
                    let index = self.right_position;
                    self.right_position += 1;
                    Ok(Some((buffered[index].clone(), index)))
                } else {
                    Ok(None)
                }
            }
            None => Ok(self.right.get_next_tuple()?.map(|t| (t, 0))),
        }
    }

    /// Advances the outer loop to the next left tuple and restarts the right side.  Returns
    /// false when the left side is exhausted.
    fn advance_left(&mut self) -> PlanResult<bool> {
        self.left_tuple = self.left.get_next_tuple()?;
        self.matched = false;
        if self.left_tuple.is_none() {
            return Ok(false);
        }

        if self.buffered_right.is_some() {
            self.right_position = 0;
        } else {
            self.right.initialize()?;
        }
        Ok(true)
    }

    fn null_padded_right(&self) -> TupleLiteral {
        TupleLiteral::null(self.right_schema.as_ref().map(Schema::num_columns).unwrap_or(0))
    }

    fn null_padded_left(&self) -> TupleLiteral {
        TupleLiteral::null(self.left_schema.as_ref().map(Schema::num_columns).unwrap_or(0))
    }

    fn get_next_tuple_helper(&mut self) -> PlanResult<Option<TupleLiteral>> {
        loop {
            if self.emitting_right_remainder {
                // Full outer only: sweep the buffered right side for unmatched tuples.
                let buffered = self.buffered_right.as_ref().unwrap();
                while self.right_position < buffered.len() {
                    let index = self.right_position;
                    self.right_position += 1;
                    if !self.right_matched[index] {
                        let left_nulls = self.null_padded_left();
                        return Ok(Some(self.join_tuples(&left_nulls, &buffered[index])));
                    }
                }
                self.done = true;
                return Ok(None);
            }

            if self.left_tuple.is_none() {
                if !self.advance_left()? {
                    if self.join_type == JoinType::FullOuter {
                        self.emitting_right_remainder = true;
                        self.right_position = 0;
                        continue;
                    }
                    self.done = true;
                    return Ok(None);
                }
            }

            let left = self.left_tuple.clone().unwrap();
            match self.next_right_tuple()? {
                Some((right, index)) => {
                    if self.can_join_tuples(&left, &right)? {
                        match self.join_type {
                            JoinType::Inner | JoinType::Cross => {
                                return Ok(Some(self.join_tuples(&left, &right)));
                            }
                            JoinType::LeftOuter => {
                                self.matched = true;
                                return Ok(Some(self.join_tuples(&left, &right)));
                            }
                            JoinType::FullOuter => {
                                self.matched = true;
                                self.right_matched[index] = true;
                                return Ok(Some(self.join_tuples(&left, &right)));
                            }
                            JoinType::Semijoin => {
                                // Emit the left tuple once, then move on to the next one.
                                self.left_tuple = None;
                                return Ok(Some(left));
                            }
                            JoinType::Antijoin => {
                                // A match disqualifies this left tuple entirely.
                                self.left_tuple = None;
                            }
                            JoinType::RightOuter => {
                                // Rewritten to LeftOuter at construction time.
                                unreachable!()
                            }
                        }
                    }
                }
                None => {
                    // Right side exhausted for this left tuple.
                    let unmatched = !self.matched;
                    self.left_tuple = None;

                    match self.join_type {
                        JoinType::LeftOuter | JoinType::FullOuter if unmatched => {
                            let right_nulls = self.null_padded_right();
                            return Ok(Some(self.join_tuples(&left, &right_nulls)));
                        }
                        JoinType::Antijoin if unmatched => {
                            return Ok(Some(left));
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}

impl PlanNode for NestedLoopJoinNode {
    fn get_schema(&self) -> Schema {
        self.schema.clone().unwrap_or_else(Schema::new)
    }

    fn get_cost(&self) -> Option<PlanCost> {
        self.cost.clone()
    }

    fn get_column_stats(&self) -> Vec<ColumnStats> {
        self.column_stats.clone()
    }

    fn prepare(&mut self) -> PlanResult<()> {
        self.left.prepare()?;
        self.right.prepare()?;

        let left_schema = self.left.get_schema();
        let right_schema = self.right.get_schema();
        let left_cost = self.left.get_cost().ok_or(PlanError::NodeNotPrepared)?;
        let right_cost = self.right.get_cost().ok_or(PlanError::NodeNotPrepared)?;

        // Build the output schema.  For semi/anti joins only the left side is emitted; for a
        // swapped (right outer) join the original column order is restored.
        let mut schema = Schema::new();
        let mut column_stats: Vec<ColumnStats>;
        if self.left_only_output() {
            schema.add_columns(left_schema.clone())?;
            column_stats = self.left.get_column_stats();
        } else if !self.schema_swapped {
            schema.add_columns(left_schema.clone())?;
            schema.add_columns(right_schema.clone())?;
            column_stats = self.left.get_column_stats();
            column_stats.extend(self.right.get_column_stats());
        } else {
            schema.add_columns(right_schema.clone())?;
            schema.add_columns(left_schema.clone())?;
            column_stats = self.right.get_column_stats();
            column_stats.extend(self.left.get_column_stats());
        }

        let lt = left_cost.num_tuples;
        let rt = right_cost.num_tuples;

        let selectivity = match self.predicate {
            Some(ref predicate) => {
                let input_stats = TableStats {
                    num_data_pages: 0,
                    num_tuples: Some((lt * rt) as u32),
                    avg_tuple_size: Some(left_cost.tuple_size + right_cost.tuple_size),
                };
                estimate_selectivity(predicate, &schema, &input_stats, &column_stats)
            }
            None => 1.0,
        };

        let num_tuples = match self.join_type {
            // Unmatched tuples come back NULL-padded, so outer joins add their preserved side.
            JoinType::LeftOuter => lt * rt * selectivity + lt,
            JoinType::FullOuter => lt * rt * selectivity + lt + rt,
            // Semi/anti joins emit each left tuple at most once.
            JoinType::Semijoin | JoinType::Antijoin => lt * 0.5,
            _ => lt * rt * selectivity,
        };

        let tuple_size = if self.left_only_output() {
            left_cost.tuple_size
        } else {
            left_cost.tuple_size + right_cost.tuple_size
        };

        if let Some(ref predicate) = self.predicate {
            update_stats(predicate, &schema, &mut column_stats);
        }

        self.cost = Some(PlanCost {
            num_tuples: num_tuples,
            tuple_size: tuple_size,
            // The right subtree re-runs once per left tuple.
            cpu_cost: left_cost.cpu_cost + right_cost.cpu_cost * lt.max(1.0) + lt * rt,
            num_block_ios: left_cost.num_block_ios + right_cost.num_block_ios,
            num_large_seeks: left_cost.num_large_seeks + right_cost.num_large_seeks,
        });
        self.schema = Some(schema);
        self.left_schema = Some(left_schema);
        self.right_schema = Some(right_schema);
        self.column_stats = column_stats;
        Ok(())
    }

    fn initialize(&mut self) -> PlanResult<()> {
        self.left.initialize()?;
        self.done = false;
        self.left_tuple = None;
        self.matched = false;
        self.emitting_right_remainder = false;
        self.right_position = 0;
        self.buffered_right = None;
        self.right_matched.clear();

        if self.join_type == JoinType::FullOuter {
            // Buffer the right side once so unmatched right tuples can be found afterwards.
            self.right.initialize()?;
            let mut buffered = Vec::new();
            while let Some(tuple) = self.right.get_next_tuple()? {
                buffered.push(tuple);
            }
            self.right_matched = vec![false; buffered.len()];
            self.buffered_right = Some(buffered);
        }
        Ok(())
    }

    fn get_next_tuple(&mut self) -> PlanResult<Option<TupleLiteral>> {
        if self.schema.is_none() {
            return Err(PlanError::NodeNotPrepared);
        }
        if self.done {
            return Ok(None);
        }
        self.get_next_tuple_helper()
    }

    fn clean_up(&mut self) -> PlanResult<()> {
        self.buffered_right = None;
        self.right_matched.clear();
        self.left.clean_up()?;
        self.right.clean_up()
    }

    fn set_environment(&mut self, env: Environment) {
        self.environment = Some(env.clone());
        self.left.set_environment(env.clone());
        self.right.set_environment(env);
    }

    fn explain(&self) -> String {
        let mut line = format!("NestedLoopJoin[{}", self.join_type);
        if self.schema_swapped {
            line.push_str(", swapped");
        }
        if let Some(ref predicate) = self.predicate {
            line.push_str(&format!(", pred: {}", predicate));
        }
        line.push(']');
        if let Some(ref cost) = self.cost {
            line.push_str(&format!(" {}", cost));
        }
        format!("{}\n{}\n{}",
                line,
                indent_explain(&self.left.explain()),
                indent_explain(&self.right.explain()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::{ColumnInfo, ColumnType, Schema};
    use ::expressions::{CompareType, Expression, JoinType, Literal};
    use ::queries::plan_nodes::{PlanNode, TupleBagNode};
    use ::storage::TupleLiteral;

    fn left_table() -> Box<PlanNode> {
        let schema = Schema::with_columns(vec![
            ColumnInfo::with_table_name(ColumnType::Integer, "A", "L"),
            ColumnInfo::with_table_name(ColumnType::Integer, "B", "L"),
        ])
            .unwrap();
        let rows = vec![TupleLiteral::from_iter(vec![Literal::Int(1), Literal::Int(10)]),
                        TupleLiteral::from_iter(vec![Literal::Int(1), Literal::Int(20)]),
                        TupleLiteral::from_iter(vec![Literal::Int(3), Literal::Null]),
                        TupleLiteral::from_iter(vec![Literal::Int(5), Literal::Int(40)])];
        Box::new(TupleBagNode::new(schema, rows))
    }

    fn right_table(rows: Vec<(i32, &str)>) -> Box<PlanNode> {
        let schema = Schema::with_columns(vec![
            ColumnInfo::with_table_name(ColumnType::Integer, "C", "R"),
            ColumnInfo::with_table_name(ColumnType::VarChar { length: 8 }, "D", "R"),
        ])
            .unwrap();
        let tuples = rows.into_iter()
            .map(|(c, d)| {
                TupleLiteral::from_iter(vec![Literal::Int(c), Literal::String(d.into())])
            })
            .collect();
        Box::new(TupleBagNode::new(schema, tuples))
    }

    fn join_predicate() -> Expression {
        Expression::Compare(Box::new(Expression::ColumnValue((Some("L".into()),
                                                              Some("A".into())))),
                            CompareType::Equals,
                            Box::new(Expression::ColumnValue((Some("R".into()),
                                                              Some("C".into())))))
    }

    fn run(mut node: NestedLoopJoinNode) -> Vec<Vec<Literal>> {
        node.prepare().unwrap();
        node.initialize().unwrap();
        let mut rows = Vec::new();
        while let Some(tuple) = node.get_next_tuple().unwrap() {
            rows.push(tuple.values());
        }
        node.clean_up().unwrap();
        rows
    }

    fn row(values: Vec<Literal>) -> Vec<Literal> {
        values
    }

    #[test]
    fn test_inner_join() {
        let node = NestedLoopJoinNode::new(left_table(),
                                           right_table(vec![(1, "a"), (3, "b"), (5, "c")]),
                                           JoinType::Inner,
                                           Some(join_predicate()));
        let rows = run(node);
        assert_eq!(vec![
            row(vec![1.into(), 10.into(), 1.into(), "a".into()]),
            row(vec![1.into(), 20.into(), 1.into(), "a".into()]),
            row(vec![3.into(), Literal::Null, 3.into(), "b".into()]),
            row(vec![5.into(), 40.into(), 5.into(), "c".into()]),
        ],
                   rows);
    }

    #[test]
    fn test_left_outer_join() {
        // Only C = 1 matches; other left tuples come back NULL-padded exactly once.
        let node = NestedLoopJoinNode::new(left_table(),
                                           right_table(vec![(1, "a")]),
                                           JoinType::LeftOuter,
                                           Some(join_predicate()));
        let rows = run(node);
        assert_eq!(vec![
            row(vec![1.into(), 10.into(), 1.into(), "a".into()]),
            row(vec![1.into(), 20.into(), 1.into(), "a".into()]),
            row(vec![3.into(), Literal::Null, Literal::Null, Literal::Null]),
            row(vec![5.into(), 40.into(), Literal::Null, Literal::Null]),
        ],
                   rows);
    }

    #[test]
    fn test_right_outer_join_swaps_and_restores_columns() {
        // RIGHT OUTER is rewritten to LEFT OUTER with swapped children; the output columns
        // still read (L columns, R columns).
        let node = NestedLoopJoinNode::new(left_table(),
                                           right_table(vec![(1, "a"), (9, "z")]),
                                           JoinType::RightOuter,
                                           Some(join_predicate()));

        let mut prepared = node;
        prepared.prepare().unwrap();
        let schema = prepared.get_schema();
        assert_eq!(Some("R".to_string()), schema[0].table_name);
        assert_eq!(4, schema.num_columns());

        prepared.initialize().unwrap();
        let mut rows = Vec::new();
        while let Some(tuple) = prepared.get_next_tuple().unwrap() {
            rows.push(tuple.values());
        }

        // Matched rows for C=1, and the unmatched right tuple (9, "z") NULL-padded on the
        // left-table side.
        assert!(rows.contains(&row(vec![1.into(), "a".into(), 1.into(), 10.into()])));
        assert!(rows.contains(&row(vec![1.into(), "a".into(), 1.into(), 20.into()])));
        assert!(rows.contains(&row(vec![9.into(), "z".into(), Literal::Null, Literal::Null])));
        assert_eq!(3, rows.len());
    }

    #[test]
    fn test_joins_with_empty_right_side() {
        // An inner join against an empty right side is empty; a right outer join is too,
        // because there are no right tuples to preserve.
        let inner = NestedLoopJoinNode::new(left_table(),
                                            right_table(vec![]),
                                            JoinType::Inner,
                                            Some(join_predicate()));
        assert!(run(inner).is_empty());

        let right_outer = NestedLoopJoinNode::new(left_table(),
                                                  right_table(vec![]),
                                                  JoinType::RightOuter,
                                                  Some(join_predicate()));
        assert!(run(right_outer).is_empty());

        // A left outer join preserves every left tuple.
        let left_outer = NestedLoopJoinNode::new(left_table(),
                                                 right_table(vec![]),
                                                 JoinType::LeftOuter,
                                                 Some(join_predicate()));
        assert_eq!(4, run(left_outer).len());
    }

    #[test]
    fn test_full_outer_join() {
        let node = NestedLoopJoinNode::new(left_table(),
                                           right_table(vec![(1, "a"), (9, "z")]),
                                           JoinType::FullOuter,
                                           Some(join_predicate()));
        let rows = run(node);

        // Matches for A=1, every unmatched left tuple, and the unmatched right tuple.
        assert_eq!(5, rows.len());
        assert!(rows.contains(&row(vec![3.into(), Literal::Null, Literal::Null,
                                        Literal::Null])));
        assert!(rows.contains(&row(vec![5.into(), 40.into(), Literal::Null, Literal::Null])));
        assert!(rows.contains(&row(vec![Literal::Null, Literal::Null, 9.into(),
                                        "z".into()])));
    }

    #[test]
    fn test_semi_and_anti_join() {
        let semi = NestedLoopJoinNode::new(left_table(),
                                           right_table(vec![(1, "a"), (5, "c")]),
                                           JoinType::Semijoin,
                                           Some(join_predicate()));
        let rows = run(semi);
        // Left tuples with a match, each exactly once, left columns only.
        assert_eq!(vec![
            row(vec![1.into(), 10.into()]),
            row(vec![1.into(), 20.into()]),
            row(vec![5.into(), 40.into()]),
        ],
                   rows);

        let anti = NestedLoopJoinNode::new(left_table(),
                                           right_table(vec![(1, "a"), (5, "c")]),
                                           JoinType::Antijoin,
                                           Some(join_predicate()));
        let rows = run(anti);
        assert_eq!(vec![row(vec![3.into(), Literal::Null])], rows);
    }

    #[test]
    fn test_cross_join_counts() {
        let node = NestedLoopJoinNode::new(left_table(),
                                           right_table(vec![(1, "a"), (2, "b")]),
                                           JoinType::Cross,
                                           None);
        assert_eq!(8, run(node).len());
    }

    #[test]
    fn test_join_cost_accumulates_children() {
        let mut node = NestedLoopJoinNode::new(left_table(),
                                               right_table(vec![(1, "a"), (2, "b")]),
                                               JoinType::Inner,
                                               Some(join_predicate()));
        node.prepare().unwrap();
        let cost = node.get_cost().unwrap();

        // cpu(join) >= cpu(left) + cpu(right); 4 + 2*4 + 4*2 = 20.
        assert!(cost.cpu_cost >= 4.0 + 2.0);
        assert_eq!(20.0, cost.cpu_cost);
    }
}
