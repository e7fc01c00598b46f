//! Dynamic-programming join enumeration.
//!
//! Join orders are enumerated bottom-up over bitmasks of the FROM clause's leaves: for every
//! subset of leaves, the cheapest join tree producing that subset is remembered, and larger
//! subsets are built by combining the best trees of their disjoint splits with a nested-loop
//! join carrying the conjuncts that first become applicable at that level.  Plans are compared
//! by CPU cost, then by estimated tuple count, and the enumeration order itself is the final,
//! deterministic tie-break.
//!
//! The enumeration works over plan *descriptions* (trees of leaf indices plus cost estimates);
//! only the winning description is materialized into plan nodes, since plan nodes themselves
//! cannot be duplicated.

use std::collections::HashMap;

use ::Schema;
use ::expressions::{Expression, JoinType, make_predicate};
use ::queries::plan_nodes::{NestedLoopJoinNode, PlanCost, PlanNode, SimpleFilterNode};
use ::queries::planning::{PlanError, PlanResult};
use ::queries::planning::from_decomposition::DecomposedFrom;
use ::stats::{ColumnStats, TableStats, estimate_selectivity, update_stats};

/// The shape of a candidate join: a leaf, or a join of two sub-shapes applying a set of
/// conjuncts (identified by index into the decomposition's conjunct list).
#[derive(Debug, Clone)]
pub enum JoinTree {
    /// A single FROM-clause leaf.
    Leaf(usize),
    /// A nested-loop join of two subtrees, with the indices of the conjuncts it applies.
    Join(Box<JoinTree>, Box<JoinTree>, Vec<usize>),
}

/// The best candidate found so far for one subset of leaves.
#[derive(Clone)]
struct JoinComponent {
    tree: JoinTree,
    cost: PlanCost,
    schema: Schema,
    column_stats: Vec<ColumnStats>,
}

/// Whether `candidate` is a better plan than `incumbent`: lower CPU cost, with estimated tuple
/// count as the tie-break.  An exact tie keeps the incumbent, making the enumeration order the
/// final deterministic tie-break.
fn improves(candidate: &PlanCost, incumbent: &PlanCost) -> bool {
    if candidate.cpu_cost != incumbent.cpu_cost {
        return candidate.cpu_cost < incumbent.cpu_cost;
    }
    candidate.num_tuples < incumbent.num_tuples
}

/// Estimates the cost of nested-loop-joining two components under the given predicate, along
/// with the output schema and predicate-updated statistics.  This mirrors the cost model in
/// [`NestedLoopJoinNode::prepare`](../../plan_nodes/struct.NestedLoopJoinNode.html).
fn estimate_join(left: &JoinComponent,
                 right: &JoinComponent,
                 predicate: Option<&Expression>)
                 -> PlanResult<(PlanCost, Schema, Vec<ColumnStats>)> {
    let mut schema = Schema::new();
    schema.add_columns(left.schema.clone())?;
    schema.add_columns(right.schema.clone())?;

    let mut column_stats = left.column_stats.clone();
    column_stats.extend(right.column_stats.clone());

    let lt = left.cost.num_tuples;
    let rt = right.cost.num_tuples;

    let selectivity = match predicate {
        Some(predicate) => {
            let input_stats = TableStats {
                num_data_pages: 0,
                num_tuples: Some((lt * rt) as u32),
                avg_tuple_size: Some(left.cost.tuple_size + right.cost.tuple_size),
            };
            estimate_selectivity(predicate, &schema, &input_stats, &column_stats)
        }
        None => 1.0,
    };

    if let Some(predicate) = predicate {
        update_stats(predicate, &schema, &mut column_stats);
    }

    let cost = PlanCost {
        num_tuples: lt * rt * selectivity,
        tuple_size: left.cost.tuple_size + right.cost.tuple_size,
        cpu_cost: left.cost.cpu_cost + right.cost.cpu_cost * lt.max(1.0) + lt * rt,
        num_block_ios: left.cost.num_block_ios + right.cost.num_block_ios,
        num_large_seeks: left.cost.num_large_seeks + right.cost.num_large_seeks,
    };
    Ok((cost, schema, column_stats))
}

/// Runs the DP enumeration over the decomposition's leaves and the covered conjuncts, and
/// materializes the winning join order into a plan.  Conjuncts consumed by the join tree are
/// reported back so the planner can apply the remainder above the joins.
///
/// # Arguments
/// * decomposed - the decomposed FROM clause; its leaf plans are consumed.
/// * conjunct_masks - for each conjunct, its leaf-coverage bitmask (0 for conjuncts that
///   cannot take part in enumeration).
///
/// Returns the built (unprepared) plan and the indices of the consumed conjuncts.
pub fn enumerate_joins(decomposed: DecomposedFrom,
                       conjunct_masks: &[u64])
                       -> PlanResult<(Box<PlanNode>, Vec<usize>)> {
    let num_leaves = decomposed.leaves.len();
    assert!(num_leaves > 0, "join enumeration requires at least one leaf");
    // The DP table covers every subset of the leaves, so the leaf count must stay small.
    if num_leaves > 16 {
        return Err(PlanError::UnsupportedConstruct("more than 16 FROM-clause leaves".into()));
    }

    let DecomposedFrom { leaves, conjuncts } = decomposed;

    // Seed the table with the singleton subsets.
    let mut best: HashMap<u64, JoinComponent> = HashMap::new();
    for (index, leaf) in leaves.iter().enumerate() {
        let cost = leaf.plan.get_cost().ok_or(PlanError::NodeNotPrepared)?;
        best.insert(1u64 << index,
                    JoinComponent {
                        tree: JoinTree::Leaf(index),
                        cost: cost,
                        schema: leaf.plan.get_schema(),
                        column_stats: leaf.plan.get_column_stats(),
                    });
    }

    let full_mask: u64 = (1u64 << num_leaves) - 1;

    // Subsets are visited in increasing popcount so both halves of any split are ready.
    let mut masks: Vec<u64> = (1..full_mask + 1).filter(|m| m & full_mask == *m).collect();
    masks.sort_by_key(|m| m.count_ones());

    for mask in masks {
        if mask.count_ones() < 2 {
            continue;
        }

        // The conjuncts that first become applicable at this level: covered by the whole
        // subset but by neither side alone.  (Which side they straddle depends on the split,
        // so the split loop re-checks below.)
        let candidate_conjuncts: Vec<usize> = conjunct_masks.iter()
            .enumerate()
            .filter(|&(_, &m)| m != 0 && m & mask == m)
            .map(|(i, _)| i)
            .collect();

        // Enumerate every split of `mask` into two non-empty disjoint halves.  Both
        // orientations are distinct candidates, since nested-loop joins are asymmetric.
        // Splits are visited in ascending left-mask order and exact cost ties keep the
        // earliest candidate, so tied plans fall back to the leaves' syntactic order.
        let mut splits: Vec<u64> = Vec::new();
        let mut sub = (mask - 1) & mask;
        while sub > 0 {
            splits.push(sub);
            sub = (sub - 1) & mask;
        }
        splits.sort();

        for left_mask in splits {
            let right_mask = mask & !left_mask;

            // Build the candidate (and end every borrow of the DP table) before deciding
            // whether it displaces the incumbent.
            let candidate = {
                let (left, right) = match (best.get(&left_mask), best.get(&right_mask)) {
                    (Some(left), Some(right)) => (left, right),
                    _ => continue,
                };

                let join_conjuncts: Vec<usize> = candidate_conjuncts.iter()
                    .cloned()
                    .filter(|&i| {
                        let m = conjunct_masks[i];
                        m & left_mask != m && m & right_mask != m
                    })
                    .collect();

                let exprs: Vec<Expression> =
                    join_conjuncts.iter().map(|&i| conjuncts[i].clone()).collect();
                let predicate = make_predicate(&exprs);

                let (cost, schema, column_stats) =
                    estimate_join(left, right, predicate.as_ref())?;

                JoinComponent {
                    tree: JoinTree::Join(Box::new(left.tree.clone()),
                                         Box::new(right.tree.clone()),
                                         join_conjuncts),
                    cost: cost,
                    schema: schema,
                    column_stats: column_stats,
                }
            };

            let replace = match best.get(&mask) {
                Some(incumbent) => improves(&candidate.cost, &incumbent.cost),
                None => true,
            };
            if replace {
                best.insert(mask, candidate);
            }
        }
    }

    let winner = best.remove(&full_mask)
        .ok_or_else(|| PlanError::UnsupportedConstruct("join enumeration found no plan".into()))?;

    debug!("Join enumeration chose plan with {}", winner.cost);

    // Materialize the winning description into actual plan nodes.
    let mut leaf_plans: Vec<Option<Box<PlanNode>>> =
        leaves.into_iter().map(|leaf| Some(leaf.plan)).collect();
    let mut used = Vec::new();
    let plan = materialize(&winner.tree, &mut leaf_plans, &conjuncts, &mut used)?;
    Ok((plan, used))
}

fn materialize(tree: &JoinTree,
               leaf_plans: &mut Vec<Option<Box<PlanNode>>>,
               conjuncts: &[Expression],
               used: &mut Vec<usize>)
               -> PlanResult<Box<PlanNode>> {
    match *tree {
        JoinTree::Leaf(index) => {
            leaf_plans[index]
                .take()
                .ok_or_else(|| PlanError::UnsupportedConstruct("leaf used twice".into()))
        }
        JoinTree::Join(ref left, ref right, ref conjunct_indices) => {
            let left_plan = materialize(left, leaf_plans, conjuncts, used)?;
            let right_plan = materialize(right, leaf_plans, conjuncts, used)?;

            let exprs: Vec<Expression> =
                conjunct_indices.iter().map(|&i| conjuncts[i].clone()).collect();
            used.extend(conjunct_indices.iter().cloned());

            let join_type = if exprs.is_empty() {
                JoinType::Cross
            } else {
                JoinType::Inner
            };
            Ok(Box::new(NestedLoopJoinNode::new(left_plan,
                                                right_plan,
                                                join_type,
                                                make_predicate(&exprs))))
        }
    }
}

/// Wraps a plan in a filter carrying the given conjuncts, unless there are none.
pub fn wrap_with_remaining_conjuncts(plan: Box<PlanNode>,
                                     remaining: Vec<Expression>)
                                     -> Box<PlanNode> {
    match make_predicate(&remaining) {
        Some(predicate) => Box::new(SimpleFilterNode::new(plan, predicate)),
        None => plan,
    }
}
