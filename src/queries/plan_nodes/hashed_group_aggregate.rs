//! This module provides the hashed grouping/aggregation plan node.

use std::collections::HashMap;

use ::{ColumnInfo, Schema};
use ::expressions::{Environment, Expression, Literal};
use ::functions::AggregateFunction;
use ::queries::plan_nodes::{PlanCost, PlanNode, indent_explain, make_eval_environment};
use ::queries::planning::{PlanError, PlanResult};
use ::stats::ColumnStats;
use ::storage::TupleLiteral;

/// Resolves an aggregate call to the directory entry that implements it, applying the name
/// mangling for `DISTINCT` calls and for `COUNT(*)`.
fn instantiate_aggregate(name: &str,
                         distinct: bool,
                         args: &[Expression])
                         -> PlanResult<Box<AggregateFunction>> {
    let wildcard = Expression::ColumnValue((None, None));
    let has_wildcard_arg = args.iter().any(|arg| *arg == wildcard);

    let mut func_name = name.to_uppercase();
    if has_wildcard_arg {
        if func_name != "COUNT" {
            return Err(PlanError::WildcardInNonCountFunction(func_name));
        }
        func_name = "COUNT#STAR".into();
    } else if distinct {
        func_name.push_str("#DISTINCT");
    }

    let function = ::functions::directory()
        .get(func_name.as_str())
        .map_err(|e| PlanError::ExpressionError(e.into()))?;
    function.into_aggregate()
        .ok_or_else(|| PlanError::ExpressionError(
            ::expressions::ExpressionError::NotAggregate(name.to_string())))
}

/// One aggregate computed by the node: its generated output column name, the original call, and
/// a prototype used to stamp out per-group accumulator instances.
struct AggregateCall {
    column_name: String,
    name: String,
    distinct: bool,
    args: Vec<Expression>,
}

impl AggregateCall {
    fn fresh_accumulator(&self) -> PlanResult<Box<AggregateFunction>> {
        instantiate_aggregate(&self.name, self.distinct, &self.args)
    }
}

/// Implements grouping and aggregation, using hashing to identify each input tuple's group.
/// The node consumes its entire input before emitting anything; output groups come out in
/// first-seen order, which is stable across a single execution.
pub struct HashedGroupAggregateNode {
    child: Box<PlanNode>,
    group_by_exprs: Vec<Expression>,
    aggregates: Vec<AggregateCall>,
    environment: Option<Environment>,
    results: Option<Vec<TupleLiteral>>,
    position: usize,
    schema: Option<Schema>,
    child_schema: Option<Schema>,
    cost: Option<PlanCost>,
    column_stats: Vec<ColumnStats>,
}

impl HashedGroupAggregateNode {
    /// Instantiate a new hashed grouping/aggregation node.
    ///
    /// # Arguments
    /// * child - the node producing the tuples to aggregate.
    /// * group_by_exprs - the grouping expressions; empty for a single whole-input group.
    /// * aggregates - (output column name, aggregate call) pairs, as produced by the
    ///   aggregate-function extractor.
    pub fn new(child: Box<PlanNode>,
               group_by_exprs: Vec<Expression>,
               aggregates: Vec<(String, Expression)>)
               -> PlanResult<HashedGroupAggregateNode> {
        let mut calls = Vec::with_capacity(aggregates.len());
        for (column_name, expr) in aggregates {
            match expr {
                Expression::Function { name, distinct, args } => {
                    // Verify the call resolves to a real aggregate now, rather than failing
                    // mid-execution.
                    instantiate_aggregate(&name, distinct, &args)?;
                    calls.push(AggregateCall {
                        column_name: column_name,
                        name: name,
                        distinct: distinct,
                        args: args,
                    });
                }
                other => {
                    return Err(PlanError::ExpressionError(
                        ::expressions::ExpressionError::NotAggregate(format!("{}", other))));
                }
            }
        }

        Ok(HashedGroupAggregateNode {
            child: child,
            group_by_exprs: group_by_exprs,
            aggregates: calls,
            environment: None,
            results: None,
            position: 0,
            schema: None,
            child_schema: None,
            cost: None,
            column_stats: Vec::new(),
        })
    }

    /// Consumes the child's tuples and computes every group's aggregate values.
    fn compute_aggregates(&mut self) -> PlanResult<()> {
        let child_schema = self.child_schema.clone().ok_or(PlanError::NodeNotPrepared)?;

        let mut groups: HashMap<TupleLiteral, Vec<Box<AggregateFunction>>> = HashMap::new();
        let mut group_order: Vec<TupleLiteral> = Vec::new();

        self.child.initialize()?;
        while let Some(tuple) = self.child.get_next_tuple()? {
            let mut env = make_eval_environment(&child_schema, &tuple, &self.environment);

            // Compute the group key for this row.
            let mut key = TupleLiteral::new();
            for expr in self.group_by_exprs.iter() {
                key.add_value(expr.evaluate(&mut Some(&mut env))
                    .map_err(PlanError::ExpressionError)?);
            }

            if !groups.contains_key(&key) {
                let mut accumulators = Vec::with_capacity(self.aggregates.len());
                for call in self.aggregates.iter() {
                    accumulators.push(call.fresh_accumulator()?);
                }
                groups.insert(key.clone(), accumulators);
                group_order.push(key.clone());
            }
            let accumulators = groups.get_mut(&key).unwrap();

            for (call, accumulator) in self.aggregates.iter().zip(accumulators.iter_mut()) {
                let wildcard = Expression::ColumnValue((None, None));
                let value = if call.args.len() == 1 && call.args[0] != wildcard {
                    call.args[0]
                        .evaluate(&mut Some(&mut env))
                        .map_err(PlanError::ExpressionError)?
                } else {
                    // COUNT(*) doesn't care what the value is, just that the row exists.
                    Literal::True
                };
                accumulator.add_value(value);
            }
        }

        // Aggregates over an empty input (with no GROUP BY) still produce one row, e.g.
        // `SELECT COUNT(*) FROM empty` is 0.
        if group_order.is_empty() && self.group_by_exprs.is_empty() {
            let mut accumulators = Vec::with_capacity(self.aggregates.len());
            for call in self.aggregates.iter() {
                accumulators.push(call.fresh_accumulator()?);
            }
            groups.insert(TupleLiteral::new(), accumulators);
            group_order.push(TupleLiteral::new());
        }

        let mut results = Vec::with_capacity(group_order.len());
        for key in group_order {
            let accumulators = &groups[&key];
            let mut row = key;
            for accumulator in accumulators.iter() {
                row.add_value(accumulator.get_result());
            }
            results.push(row);
        }

        self.results = Some(results);
        self.position = 0;
        Ok(())
    }
}

impl PlanNode for HashedGroupAggregateNode {
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
        self.child.prepare()?;

        let child_schema = self.child.get_schema();
        let child_stats = self.child.get_column_stats();
        let child_cost = self.child.get_cost().ok_or(PlanError::NodeNotPrepared)?;

        let mut schema = Schema::new();
        let mut column_stats = Vec::new();

        // Group-by columns come first, keeping their identity and statistics.
        let mut group_uniques: Option<f32> = Some(1.0);
        for expr in self.group_by_exprs.iter() {
            match *expr {
                Expression::ColumnValue(ref name) => {
                    let matches = child_schema.find_columns(name);
                    match matches.len() {
                        0 => {
                            return Err(PlanError::UnknownColumn(name.clone()));
                        }
                        1 => {
                            let (index, info) = matches.into_iter().next().unwrap();
                            schema.add_column(info)?;
                            let stats = child_stats.get(index)
                                .cloned()
                                .unwrap_or_else(ColumnStats::unknown);
                            group_uniques = match (group_uniques, stats.num_unique_values) {
                                (Some(acc), Some(v)) => Some(acc * v as f32),
                                _ => None,
                            };
                            column_stats.push(stats);
                        }
                        _ => {
                            return Err(PlanError::AmbiguousColumn(name.clone()));
                        }
                    }
                }
                ref other => {
                    return Err(PlanError::GroupByNeedsColumnRef(format!("{}", other)));
                }
            }
        }

        // Then the aggregate result columns, under their generated names.
        for call in self.aggregates.iter() {
            let prototype = call.fresh_accumulator()?;
            let col_type = prototype.return_type(&call.args, &child_schema)
                .map_err(|e| PlanError::ExpressionError(e.into()))?;
            schema.add_column(ColumnInfo::with_name(col_type, call.column_name.clone()))?;
            column_stats.push(ColumnStats::unknown());
        }

        let num_groups = if self.group_by_exprs.is_empty() {
            1.0
        } else {
            let estimate = match group_uniques {
                Some(uniques) => uniques,
                None => child_cost.num_tuples * 0.1,
            };
            estimate.max(1.0).min(child_cost.num_tuples.max(1.0))
        };

        self.cost = Some(PlanCost {
            num_tuples: num_groups,
            tuple_size: child_cost.tuple_size,
            cpu_cost: child_cost.cpu_cost + child_cost.num_tuples,
            num_block_ios: child_cost.num_block_ios,
            num_large_seeks: child_cost.num_large_seeks,
        });
        self.schema = Some(schema);
        self.child_schema = Some(child_schema);
        self.column_stats = column_stats;
        Ok(())
    }

    fn initialize(&mut self) -> PlanResult<()> {
        self.results = None;
        self.position = 0;
        Ok(())
    }

    fn get_next_tuple(&mut self) -> PlanResult<Option<TupleLiteral>> {
        if self.results.is_none() {
            self.compute_aggregates()?;
        }

        let results = self.results.as_ref().unwrap();
        if self.position < results.len() {
            let tuple = results[self.position].clone();
            self.position += 1;
            Ok(Some(tuple))
        } else {
            Ok(None)
        }
    }

    fn clean_up(&mut self) -> PlanResult<()> {
        self.results = None;
        self.position = 0;
        self.child.clean_up()
    }

    fn set_environment(&mut self, env: Environment) {
        self.environment = Some(env.clone());
        self.child.set_environment(env);
    }

    fn explain(&self) -> String {
        let groups: Vec<String> = self.group_by_exprs.iter().map(|e| format!("{}", e)).collect();
        let aggs: Vec<String> = self.aggregates
            .iter()
            .map(|call| {
                format!("{}={}({}{})",
                        call.column_name,
                        call.name,
                        if call.distinct { "DISTINCT " } else { "" },
                        call.args
                            .iter()
                            .map(|a| format!("{}", a))
                            .collect::<Vec<_>>()
                            .join(", "))
            })
            .collect();
        let mut line = format!("HashedGroupAggregate[group by: [{}], aggregates: [{}]]",
                               groups.join(", "),
                               aggs.join(", "));
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
    use ::expressions::{Expression, Literal};
    use ::queries::plan_nodes::TupleBagNode;
    use ::storage::TupleLiteral;

    fn input(rows: Vec<(i32, Option<i32>)>) -> Box<PlanNode> {
        let schema = Schema::with_columns(vec![
            ColumnInfo::with_table_name(ColumnType::Integer, "A", "T"),
            ColumnInfo::with_table_name(ColumnType::Integer, "B", "T"),
        ])
            .unwrap();
        let tuples = rows.into_iter()
            .map(|(a, b)| {
                TupleLiteral::from_iter(vec![Literal::Int(a),
                                             b.map(Literal::Int).unwrap_or(Literal::Null)])
            })
            .collect();
        Box::new(TupleBagNode::new(schema, tuples))
    }

    fn column(name: &str) -> Expression {
        Expression::ColumnValue((None, Some(name.into())))
    }

    fn call(name: &str, distinct: bool, arg: Expression) -> Expression {
        Expression::Function {
            name: name.into(),
            distinct: distinct,
            args: vec![arg],
        }
    }

    fn run(mut node: HashedGroupAggregateNode) -> Vec<Vec<Literal>> {
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
    fn test_grouped_count_and_sum() {
        let rows = vec![(3, Some(6)), (3, Some(7)), (2, Some(10)), (1, Some(9)), (1, None)];
        let node = HashedGroupAggregateNode::new(
            input(rows),
            vec![column("A")],
            vec![("#AGG0".into(), call("COUNT", false, column("B"))),
                 ("#AGG1".into(), call("SUM", false, column("B")))])
            .unwrap();

        let mut result = run(node);
        result.sort_by(|a, b| a[0].sort_compare(&b[0]));

        // COUNT(B) skips the NULL; SUM ignores it too.
        assert_eq!(vec![
            vec![Literal::Int(1), Literal::Int(1), Literal::Long(9)],
            vec![Literal::Int(2), Literal::Int(1), Literal::Long(10)],
            vec![Literal::Int(3), Literal::Int(2), Literal::Long(13)],
        ],
                   result);
    }

    #[test]
    fn test_count_star_counts_null_rows() {
        let rows = vec![(1, None), (1, Some(5))];
        let node = HashedGroupAggregateNode::new(
            input(rows),
            vec![column("A")],
            vec![("#AGG0".into(),
                  call("COUNT", false, Expression::ColumnValue((None, None))))])
            .unwrap();

        assert_eq!(vec![vec![Literal::Int(1), Literal::Int(2)]], run(node));
    }

    #[test]
    fn test_distinct_aggregate_ignores_duplicates_and_nulls() {
        let rows = vec![(1, Some(5)), (1, Some(5)), (1, Some(7)), (1, None)];
        let node = HashedGroupAggregateNode::new(
            input(rows),
            vec![column("A")],
            vec![("#AGG0".into(), call("COUNT", true, column("B")))])
            .unwrap();

        assert_eq!(vec![vec![Literal::Int(1), Literal::Int(2)]], run(node));
    }

    #[test]
    fn test_ungrouped_aggregate_over_empty_input() {
        let node = HashedGroupAggregateNode::new(
            input(vec![]),
            vec![],
            vec![("#AGG0".into(),
                  call("COUNT", false, Expression::ColumnValue((None, None)))),
                 ("#AGG1".into(), call("SUM", false, column("B")))])
            .unwrap();

        // COUNT(*) of nothing is 0; SUM of nothing is NULL.
        assert_eq!(vec![vec![Literal::Int(0), Literal::Null]], run(node));
    }

    #[test]
    fn test_distinct_grouping_without_aggregates() {
        let rows = vec![(1, Some(5)), (1, Some(5)), (2, Some(5)), (1, Some(5))];
        let node = HashedGroupAggregateNode::new(input(rows),
                                                 vec![column("A"), column("B")],
                                                 vec![])
            .unwrap();

        let mut result = run(node);
        result.sort_by(|a, b| a[0].sort_compare(&b[0]));
        assert_eq!(vec![
            vec![Literal::Int(1), Literal::Int(5)],
            vec![Literal::Int(2), Literal::Int(5)],
        ],
                   result);
    }

    #[test]
    fn test_output_schema_names() {
        let node = HashedGroupAggregateNode::new(
            input(vec![(1, Some(1))]),
            vec![column("A")],
            vec![("#AGG0".into(), call("AVG", false, column("B")))])
            .unwrap();
        let mut node = node;
        node.prepare().unwrap();

        let schema = node.get_schema();
        assert_eq!(2, schema.num_columns());
        assert_eq!(Some("A".to_string()), schema[0].name);
        assert_eq!(Some("#AGG0".to_string()), schema[1].name);
        assert_eq!(ColumnType::Double, schema[1].column_type);
    }

    #[test]
    fn test_wildcard_in_non_count_rejected() {
        let result = HashedGroupAggregateNode::new(
            input(vec![]),
            vec![],
            vec![("#AGG0".into(),
                  call("SUM", false, Expression::ColumnValue((None, None))))]);
        assert!(match result {
            Err(PlanError::WildcardInNonCountFunction(_)) => true,
            _ => false,
        });
    }
}
