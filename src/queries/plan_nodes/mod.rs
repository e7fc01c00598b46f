//! This module contains all plan nodes.
//!
//! A query plan is a tree of nodes, each of which produces tuples on demand through
//! [`get_next_tuple`](trait.PlanNode.html#tymethod.get_next_tuple).  A node's lifecycle is:
//! `prepare()` once after planning (computes schema, cost, and statistics bottom-up),
//! `initialize()` before each scan, repeated `get_next_tuple()` until it yields `None`, and
//! `clean_up()` when the plan is finished with.

mod file_scan;
mod hashed_group_aggregate;
mod limit_offset;
mod nested_loop_join;
mod project;
mod rename;
mod simple_filter;
mod sort;
mod tuple_bag;

pub use self::file_scan::FileScanNode;
pub use self::hashed_group_aggregate::HashedGroupAggregateNode;
pub use self::limit_offset::LimitOffsetNode;
pub use self::nested_loop_join::NestedLoopJoinNode;
pub use self::project::ProjectNode;
pub use self::rename::RenameNode;
pub use self::simple_filter::SimpleFilterNode;
pub use self::sort::SortNode;
pub use self::tuple_bag::TupleBagNode;

use ::Schema;
use ::expressions::{Environment, Expression, Literal, OrderByExpression};
use ::queries::planning::{PlanError, PlanResult};
use ::stats::ColumnStats;
use ::storage::TupleLiteral;

/// A result that returns a boxed plan node.
pub type NodeResult = Result<Box<PlanNode>, PlanError>;

/// The estimated cost of executing a plan subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanCost {
    /// The estimated number of tuples the subtree produces.
    pub num_tuples: f32,
    /// The estimated average size of the produced tuples, in bytes.
    pub tuple_size: f32,
    /// An abstract measure of how much computation the subtree performs.
    pub cpu_cost: f32,
    /// The estimated number of block IO operations the subtree performs.
    pub num_block_ios: u64,
    /// The estimated number of large disk seeks (one per file scanned).
    pub num_large_seeks: u64,
}

impl ::std::fmt::Display for PlanCost {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        write!(f,
               "cost[tuples={:.1}, tupSize={:.1}, cpuCost={:.1}, blockIOs={}, largeSeeks={}]",
               self.num_tuples,
               self.tuple_size,
               self.cpu_cost,
               self.num_block_ios,
               self.num_large_seeks)
    }
}

/// Represents a query plan node in its most abstract form.
pub trait PlanNode {
    /// Retrieves the current plan node's output schema.  Only valid after
    /// [`prepare`](#tymethod.prepare).
    fn get_schema(&self) -> Schema;

    /// Retrieves the node's estimated cost, computed by [`prepare`](#tymethod.prepare).
    fn get_cost(&self) -> Option<PlanCost>;

    /// Retrieves the node's output column statistics (parallel to the output schema), computed
    /// by [`prepare`](#tymethod.prepare).
    fn get_column_stats(&self) -> Vec<ColumnStats>;

    /// Prepare the plan node for execution: children are prepared first, then this node's
    /// schema, cost and statistics are computed from theirs.
    fn prepare(&mut self) -> PlanResult<()>;

    /// Resets the node (and its children) to the start of its tuple sequence.
    fn initialize(&mut self) -> PlanResult<()>;

    /// Retrieves the next tuple in the plan, or `None` at the end of the sequence.
    fn get_next_tuple(&mut self) -> PlanResult<Option<TupleLiteral>>;

    /// Releases any resources the node is holding (pinned pages, buffered tuples).
    fn clean_up(&mut self) -> PlanResult<()>;

    /// Sets the parent environment used to resolve correlated column references.  The
    /// environment propagates to the node's children.
    fn set_environment(&mut self, env: Environment);

    /// If the node's results have a known ordering, the ordering columns.
    fn results_ordered_by(&self) -> Option<Vec<OrderByExpression>> {
        None
    }

    /// Whether the node supports marking a position in its tuple sequence and later rewinding
    /// to it.
    fn supports_marking(&self) -> bool {
        false
    }

    /// Remembers the current position in the tuple sequence.
    fn mark_current_position(&mut self) -> PlanResult<()> {
        Err(PlanError::MarkingNotSupported)
    }

    /// Rewinds to the last marked position.
    fn reset_to_last_mark(&mut self) -> PlanResult<()> {
        Err(PlanError::MarkingNotSupported)
    }

    /// Check whether the node can carry a selection predicate.  Nodes that can (scans,
    /// filters) let the planner push conjuncts into them.
    #[inline]
    fn has_predicate(&self) -> bool {
        false
    }

    /// Retrieve the node's predicate, if it carries one.
    #[inline]
    fn get_predicate(&self) -> Option<Expression> {
        None
    }

    /// Replace the node's predicate, if it can carry one.
    fn set_predicate(&mut self, _predicate: Expression) -> PlanResult<()> {
        Err(PlanError::PredicateNotSupported)
    }

    /// A human-readable description of this node (and its children, indented), used by
    /// `EXPLAIN`.
    fn explain(&self) -> String;
}

/// Builds the environment a node evaluates per-tuple expressions in: the tuple itself under the
/// node's input schema, chained to the node's parent environment when one is set (so correlated
/// subquery references resolve).
pub fn make_eval_environment(schema: &Schema,
                             tuple: &TupleLiteral,
                             parent: &Option<Environment>)
                             -> Environment {
    let mut env = Environment::new();
    env.add_tuple(schema.clone(), tuple.clone());
    if let Some(ref parent) = *parent {
        env.add_parent_env(parent.clone());
    }
    env
}

/// Evaluates a predicate against a tuple, yielding true only when the predicate evaluates to
/// exactly `TRUE`.  (`NULL` predicates reject the tuple, per SQL semantics.)
pub fn is_tuple_selected(predicate: &Expression,
                         schema: &Schema,
                         tuple: &TupleLiteral,
                         parent: &Option<Environment>)
                         -> PlanResult<bool> {
    let mut env = make_eval_environment(schema, tuple, parent);
    match predicate.evaluate(&mut Some(&mut env)) {
        Ok(Literal::True) => Ok(true),
        Ok(Literal::False) | Ok(Literal::Null) => Ok(false),
        Ok(other) => Err(PlanError::InvalidPredicate(other)),
        Err(e) => Err(PlanError::CouldNotApplyPredicate(e)),
    }
}

/// Indents a child node's `explain` output by one level.
pub fn indent_explain(child: &str) -> String {
    child.lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}
