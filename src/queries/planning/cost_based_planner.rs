//! The cost-based query planner.
//!
//! Planning a `SELECT` proceeds in the order the clause is logically evaluated:
//!
//! 1. Aggregate calls in the SELECT list, `HAVING`, and `ORDER BY` are extracted and replaced
//!    by generated columns; aggregates in `WHERE`, join conditions, or `GROUP BY` are errors.
//! 2. Subquery expressions get execution plans of their own attached.
//! 3. The FROM clause is decomposed into leaves and conjuncts; `WHERE` conjuncts join the set.
//! 4. Conjuncts local to one leaf are pushed into that leaf's scan; join orders over the leaves
//!    are enumerated by dynamic programming; conjuncts nothing consumed end up in a filter
//!    above the join tree.
//! 5. Grouping/aggregation, `HAVING`, projection, `DISTINCT`, `ORDER BY`, and
//!    `LIMIT`/`OFFSET` wrap the result, in that order.

use std::cell::RefCell;
use std::mem;
use std::rc::Rc;

use ::Schema;
use ::expressions::{Environment, Expression, FromClauseType, FromClause, SelectClause,
                    SelectValue, make_predicate};
use ::expressions::expression::SubqueryExpression;
use ::queries::AggregateFunctionExtractor;
use ::queries::plan_nodes::{FileScanNode, HashedGroupAggregateNode, LimitOffsetNode,
                            NestedLoopJoinNode, NodeResult, PlanNode, ProjectNode, RenameNode,
                            SimpleFilterNode, SortNode, TupleBagNode};
use ::queries::planning::{PlanError, PlanResult, Planner};
use ::queries::planning::from_decomposition::{DecomposedFrom, PlannedLeaf, condition_conjuncts};
use ::queries::planning::join_enumeration::{enumerate_joins, wrap_with_remaining_conjuncts};
use ::storage::{StorageManager, TableManager, TupleLiteral};

/// Whether the expression contains an aggregate function call (not counting calls inside
/// subqueries, which are evaluated in their own scope).
fn expression_has_aggregate(expr: &Expression) -> bool {
    match *expr {
        Expression::Function { ref name, ref args, .. } => {
            ::functions::directory().is_aggregate(name.as_str()) ||
            args.iter().any(expression_has_aggregate)
        }
        Expression::OR(ref exprs) |
        Expression::AND(ref exprs) => exprs.iter().any(expression_has_aggregate),
        Expression::NOT(ref e) |
        Expression::IsNull(ref e) |
        Expression::Like(ref e, _) => expression_has_aggregate(e),
        Expression::Compare(ref l, _, ref r) |
        Expression::Arithmetic(ref l, _, ref r) => {
            expression_has_aggregate(l) || expression_has_aggregate(r)
        }
        Expression::Between(ref v, ref lo, ref hi) => {
            expression_has_aggregate(v) || expression_has_aggregate(lo) ||
            expression_has_aggregate(hi)
        }
        Expression::InList(ref v, ref choices) => {
            expression_has_aggregate(v) || choices.iter().any(expression_has_aggregate)
        }
        Expression::InSubquery(ref v, _) => expression_has_aggregate(v),
        _ => false,
    }
}

/// This class generates execution plans for SQL queries, choosing join orders by cost.  The
/// primary responsibility is planning `SELECT` statements, but `UPDATE` and `DELETE` use
/// [`make_simple_select`](../fn.make_simple_select.html) to identify the tuples they modify.
pub struct CostBasedPlanner<'a> {
    storage: &'a StorageManager,
    table_manager: &'a mut TableManager,
}

impl<'a> CostBasedPlanner<'a> {
    /// Instantiates a new planner around the session's storage state.
    pub fn new(storage: &'a StorageManager,
               table_manager: &'a mut TableManager)
               -> CostBasedPlanner<'a> {
        CostBasedPlanner {
            storage: storage,
            table_manager: table_manager,
        }
    }

    /// Plans a single FROM leaf that is not a dissolvable join: a base table, a derived table,
    /// or an opaque join subtree.
    fn plan_leaf(&mut self, from: &FromClause) -> PlanResult<PlannedLeaf> {
        match from.clause_type {
            FromClauseType::BaseTable { ref table, ref alias } => {
                let handle = self.table_manager.get_table(self.storage, table.as_str())?;
                let mut plan: Box<PlanNode> = Box::new(FileScanNode::new(handle, None));
                if let Some(ref alias) = *alias {
                    plan = Box::new(RenameNode::new(plan, alias.clone()));
                }
                plan.prepare()?;
                Ok(PlannedLeaf {
                    plan: plan,
                    name: alias.clone().unwrap_or_else(|| table.clone()),
                })
            }
            FromClauseType::SelectSubquery { ref select, ref alias } => {
                let inner = self.make_plan((**select).clone(), None)?;
                let mut plan: Box<PlanNode> = Box::new(RenameNode::new(inner, alias.clone()));
                plan.prepare()?;
                Ok(PlannedLeaf {
                    plan: plan,
                    name: alias.clone(),
                })
            }
            FromClauseType::JoinExpression { ref left, ref right, ref join_type,
                                             ref condition_type } => {
                // Only non-reorderable joins land here; each side is planned independently and
                // the join is baked into a single opaque leaf.
                let mut left_plan = self.make_from_plan(left, Vec::new())?;
                let mut right_plan = self.make_from_plan(right, Vec::new())?;
                left_plan.prepare()?;
                right_plan.prepare()?;

                let conjuncts = condition_conjuncts(condition_type,
                                                    &left_plan.get_schema(),
                                                    &right_plan.get_schema())?;
                for conjunct in conjuncts.iter() {
                    if expression_has_aggregate(conjunct) {
                        return Err(PlanError::AggregateInWrongPlace(format!("{}", conjunct)));
                    }
                }

                let mut plan: Box<PlanNode> =
                    Box::new(NestedLoopJoinNode::new(left_plan,
                                                     right_plan,
                                                     *join_type,
                                                     make_predicate(&conjuncts)));
                plan.prepare()?;
                Ok(PlannedLeaf {
                    plan: plan,
                    name: format!("{}", join_type),
                })
            }
        }
    }

    /// Recursively decomposes a FROM clause into `out`, returning the indices of the leaves
    /// the clause contributed.
    fn decompose_from(&mut self,
                      from: &FromClause,
                      out: &mut DecomposedFrom)
                      -> PlanResult<Vec<usize>> {
        match from.clause_type {
            FromClauseType::JoinExpression { ref left, ref right, ref join_type,
                                             ref condition_type }
                if !join_type.is_outer() &&
                   *join_type != ::expressions::JoinType::Semijoin &&
                   *join_type != ::expressions::JoinType::Antijoin => {
                let left_indices = self.decompose_from(left, out)?;
                let right_indices = self.decompose_from(right, out)?;

                let left_schema = out.combined_schema(&left_indices)?;
                let right_schema = out.combined_schema(&right_indices)?;
                for conjunct in
                    condition_conjuncts(condition_type, &left_schema, &right_schema)? {
                    if expression_has_aggregate(&conjunct) {
                        return Err(PlanError::AggregateInWrongPlace(format!("{}", conjunct)));
                    }
                    out.add_conjunct(conjunct);
                }

                let mut indices = left_indices;
                indices.extend(right_indices);
                Ok(indices)
            }
            _ => {
                let leaf = self.plan_leaf(from)?;
                Ok(vec![out.add_leaf(leaf)])
            }
        }
    }

    /// Builds the join portion of a plan: decomposes the FROM clause, pushes leaf-local
    /// conjuncts into their leaves, enumerates join orders, and applies whatever conjuncts are
    /// left above the join tree.
    fn make_from_plan(&mut self,
                      from: &FromClause,
                      extra_conjuncts: Vec<Expression>)
                      -> NodeResult {
        let mut decomposed = DecomposedFrom::new();
        self.decompose_from(from, &mut decomposed)?;

        for conjunct in extra_conjuncts {
            decomposed.add_conjunct(conjunct);
        }

        // Attach subquery plans before the conjuncts scatter into scans and joins.
        let planned: PlanResult<Vec<Expression>> = decomposed.conjuncts
            .iter()
            .map(|c| self.plan_subqueries(c))
            .collect();
        decomposed.conjuncts = planned?;

        // Classify every conjunct: local to one leaf, enumerable across several, or
        // unresolvable here (correlated references handled by the caller's environment).
        let mut pushdown: Vec<(usize, Expression)> = Vec::new();
        let mut enumerable: Vec<(Expression, u64)> = Vec::new();
        let mut leftover: Vec<Expression> = Vec::new();

        for conjunct in mem::replace(&mut decomposed.conjuncts, Vec::new()) {
            let mask = decomposed.conjunct_coverage(&conjunct)?;
            if !decomposed.conjunct_fully_covered(&conjunct) || mask == 0 {
                leftover.push(conjunct);
            } else if mask.count_ones() == 1 {
                pushdown.push((mask.trailing_zeros() as usize, conjunct));
            } else {
                enumerable.push((conjunct, mask));
            }
        }

        // Push leaf-local conjuncts as close to the data as possible.
        for (index, conjunct) in pushdown {
            let leaf = &mut decomposed.leaves[index];
            if leaf.plan.has_predicate() {
                let mut conjuncts = Vec::new();
                if let Some(existing) = leaf.plan.get_predicate() {
                    existing.collect_conjuncts(&mut conjuncts);
                }
                conjunct.collect_conjuncts(&mut conjuncts);
                leaf.plan.set_predicate(make_predicate(&conjuncts).unwrap())?;
            } else {
                let plan = mem::replace(&mut leaf.plan,
                                        Box::new(TupleBagNode::new(Schema::new(), vec![])));
                leaf.plan = Box::new(SimpleFilterNode::new(plan, conjunct));
            }
            // Costs feed the enumeration below, so refresh them now.
            leaf.plan.prepare()?;
        }

        let (exprs, masks): (Vec<Expression>, Vec<u64>) = {
            let mut exprs = Vec::with_capacity(enumerable.len());
            let mut masks = Vec::with_capacity(enumerable.len());
            for (expr, mask) in enumerable {
                exprs.push(expr);
                masks.push(mask);
            }
            (exprs, masks)
        };
        decomposed.conjuncts = exprs;

        let num_conjuncts = decomposed.conjuncts.len();
        let conjuncts_copy = decomposed.conjuncts.clone();
        let (plan, used) = enumerate_joins(decomposed, &masks)?;

        // Anything the enumeration did not consume is applied above the join tree.
        for index in 0..num_conjuncts {
            if !used.contains(&index) {
                leftover.push(conjuncts_copy[index].clone());
            }
        }

        Ok(wrap_with_remaining_conjuncts(plan, leftover))
    }

    /// Recursively attaches execution plans to every subquery operator in the expression.
    fn plan_subqueries(&mut self, expr: &Expression) -> PlanResult<Expression> {
        let planned = match *expr {
            Expression::InSubquery(ref value, ref subquery) => {
                Expression::InSubquery(Box::new(self.plan_subqueries(value)?),
                                       self.plan_subquery(subquery)?)
            }
            Expression::Exists(ref subquery) => {
                Expression::Exists(self.plan_subquery(subquery)?)
            }
            Expression::ScalarSubquery(ref subquery) => {
                Expression::ScalarSubquery(self.plan_subquery(subquery)?)
            }
            Expression::OR(ref exprs) => {
                let rebuilt: PlanResult<Vec<_>> =
                    exprs.iter().map(|e| self.plan_subqueries(e)).collect();
                Expression::OR(rebuilt?)
            }
            Expression::AND(ref exprs) => {
                let rebuilt: PlanResult<Vec<_>> =
                    exprs.iter().map(|e| self.plan_subqueries(e)).collect();
                Expression::AND(rebuilt?)
            }
            Expression::NOT(ref e) => Expression::NOT(Box::new(self.plan_subqueries(e)?)),
            Expression::IsNull(ref e) => {
                Expression::IsNull(Box::new(self.plan_subqueries(e)?))
            }
            Expression::Like(ref e, ref pattern) => {
                Expression::Like(Box::new(self.plan_subqueries(e)?), pattern.clone())
            }
            Expression::Compare(ref l, op, ref r) => {
                Expression::Compare(Box::new(self.plan_subqueries(l)?),
                                    op,
                                    Box::new(self.plan_subqueries(r)?))
            }
            Expression::Arithmetic(ref l, op, ref r) => {
                Expression::Arithmetic(Box::new(self.plan_subqueries(l)?),
                                       op,
                                       Box::new(self.plan_subqueries(r)?))
            }
            Expression::Between(ref v, ref lo, ref hi) => {
                Expression::Between(Box::new(self.plan_subqueries(v)?),
                                    Box::new(self.plan_subqueries(lo)?),
                                    Box::new(self.plan_subqueries(hi)?))
            }
            Expression::InList(ref v, ref choices) => {
                let rebuilt: PlanResult<Vec<_>> =
                    choices.iter().map(|e| self.plan_subqueries(e)).collect();
                Expression::InList(Box::new(self.plan_subqueries(v)?), rebuilt?)
            }
            Expression::Function { ref name, distinct, ref args } => {
                let rebuilt: PlanResult<Vec<_>> =
                    args.iter().map(|e| self.plan_subqueries(e)).collect();
                Expression::Function {
                    name: name.clone(),
                    distinct: distinct,
                    args: rebuilt?,
                }
            }
            ref other => other.clone(),
        };
        Ok(planned)
    }

    fn plan_subquery(&mut self,
                     subquery: &SubqueryExpression)
                     -> PlanResult<SubqueryExpression> {
        debug!("Planning subquery: {}", subquery.clause);
        let plan = self.make_plan((*subquery.clause).clone(), None)?;
        Ok(SubqueryExpression {
            clause: subquery.clause.clone(),
            plan: Some(Rc::new(RefCell::new(plan))),
        })
    }
}

impl<'a> Planner for CostBasedPlanner<'a> {
    fn make_plan(&mut self,
                 mut clause: SelectClause,
                 _enclosing_env: Option<&Environment>)
                 -> NodeResult {
        // Normalize and vet the WHERE clause first: simplification folds constant subtrees,
        // and aggregates are not allowed there.
        let mut where_expr = match clause.where_expr.take().map(|e| e.simplify()) {
            Some(Expression::True) => None,
            other => other,
        };
        if let Some(ref expr) = where_expr {
            if expression_has_aggregate(expr) {
                return Err(PlanError::AggregateInWrongPlace(format!("{}", expr)));
            }
        }
        for expr in clause.group_by_exprs.iter() {
            if expression_has_aggregate(expr) {
                return Err(PlanError::AggregateInWrongPlace(format!("{}", expr)));
            }
        }

        // Extract aggregate calls from the SELECT list, HAVING, and ORDER BY, replacing each
        // with a generated #AGGn column.
        let mut extractor = AggregateFunctionExtractor::new();
        for value in clause.values.iter_mut() {
            if let SelectValue::Expression { ref mut expression, .. } = *value {
                *expression = expression.traverse(&mut extractor)?;
            }
        }
        let mut having = match clause.having.take() {
            Some(expr) => Some(expr.traverse(&mut extractor)?),
            None => None,
        };
        for term in clause.order_by_exprs.iter_mut() {
            term.expression = term.expression.traverse(&mut extractor)?;
        }

        let aggregates = extractor.get_aggregate_calls();
        if extractor.found_aggregates() {
            info!("Found {} aggregate function call(s).", aggregates.len());
            for &(ref name, ref expr) in aggregates.iter() {
                info!(" * {} = {}", name, expr);
            }
        }

        // Attach subquery plans everywhere expressions will be evaluated.
        where_expr = match where_expr {
            Some(expr) => Some(self.plan_subqueries(&expr)?),
            None => None,
        };
        for value in clause.values.iter_mut() {
            if let SelectValue::Expression { ref mut expression, .. } = *value {
                *expression = self.plan_subqueries(expression)?;
            }
        }
        having = match having {
            Some(expr) => Some(self.plan_subqueries(&expr)?),
            None => None,
        };

        // Build the FROM portion, with the WHERE conjuncts participating in pushdown and join
        // enumeration.
        let mut plan: Box<PlanNode> = match clause.from_clause {
            Some(ref from) => {
                let mut where_conjuncts = Vec::new();
                if let Some(expr) = where_expr {
                    expr.collect_conjuncts(&mut where_conjuncts);
                }
                self.make_from_plan(from, where_conjuncts)?
            }
            None => {
                // A table-less SELECT evaluates its select list against one empty row.
                let mut plan: Box<PlanNode> =
                    Box::new(TupleBagNode::new(Schema::new(), vec![TupleLiteral::new()]));
                if let Some(expr) = where_expr {
                    plan = Box::new(SimpleFilterNode::new(plan, expr));
                }
                plan
            }
        };

        // Grouping and aggregation.
        if extractor.found_aggregates() || !clause.group_by_exprs.is_empty() {
            plan = Box::new(HashedGroupAggregateNode::new(plan,
                                                          clause.group_by_exprs.clone(),
                                                          aggregates)?);
        }
        if let Some(having_expr) = having {
            plan = Box::new(SimpleFilterNode::new(plan, having_expr));
        }

        // The projection always applies; a trivial `SELECT *` list passes tuples through.
        plan = Box::new(ProjectNode::new(plan, clause.values.clone()));

        // DISTINCT: group on every output column, with no aggregate computations.
        if clause.distinct {
            plan.prepare()?;
            let group_refs: Vec<Expression> = plan.get_schema()
                .iter()
                .map(|info| Expression::ColumnValue(info.get_column_name()))
                .collect();
            plan = Box::new(HashedGroupAggregateNode::new(plan, group_refs, vec![])?);
        }

        if !clause.order_by_exprs.is_empty() {
            plan = Box::new(SortNode::new(plan, clause.order_by_exprs.clone()));
        }

        if clause.limit.is_some() || clause.offset.is_some() {
            // An explicit LIMIT 0 must survive as Some(0): it empties the result, which is
            // not the same as having no LIMIT clause at all.
            plan = Box::new(LimitOffsetNode::new(plan,
                                                 clause.limit,
                                                 clause.offset.unwrap_or(0)));
        }

        plan.prepare()?;
        Ok(plan)
    }
}
