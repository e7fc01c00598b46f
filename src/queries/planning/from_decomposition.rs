//! FROM-clause decomposition: breaking the FROM tree into *leaves* (units the join enumerator
//! can reorder freely) and a set of join conjuncts.
//!
//! A leaf is a base table, a derived table (nested `SELECT`), or a subtree whose top-level join
//! is one the enumerator must not reorder across (outer joins, semijoins, antijoins).  Inner
//! and cross joins dissolve: their children are decomposed recursively and their `ON`/`USING`/
//! `NATURAL` conditions are flattened into the conjunct set.

use ::Schema;
use ::expressions::{CompareType, Expression, JoinConditionType};
use ::queries::plan_nodes::PlanNode;
use ::queries::planning::{PlanError, PlanResult};

/// One reorderable unit of the FROM clause, carrying its already-prepared plan.
pub struct PlannedLeaf {
    /// The leaf's prepared plan.
    pub plan: Box<PlanNode>,
    /// A short description of the leaf, for logging and EXPLAIN output.
    pub name: String,
}

/// The result of decomposing a FROM clause.
pub struct DecomposedFrom {
    /// The reorderable leaves, in syntactic order.
    pub leaves: Vec<PlannedLeaf>,
    /// The conjuncts gathered from join conditions.
    pub conjuncts: Vec<Expression>,
}

impl DecomposedFrom {
    /// Creates an empty decomposition to be filled in during the FROM walk.
    pub fn new() -> DecomposedFrom {
        DecomposedFrom {
            leaves: Vec::new(),
            conjuncts: Vec::new(),
        }
    }

    /// Records a leaf, returning its index.
    pub fn add_leaf(&mut self, leaf: PlannedLeaf) -> usize {
        self.leaves.push(leaf);
        self.leaves.len() - 1
    }

    /// Adds a conjunct (each distinct conjunct only once).
    pub fn add_conjunct(&mut self, conjunct: Expression) {
        let mut flattened = Vec::new();
        conjunct.collect_conjuncts(&mut flattened);
        for c in flattened {
            if !self.conjuncts.contains(&c) {
                self.conjuncts.push(c);
            }
        }
    }

    /// The combined schema of the leaves named by `indices`, in index order.
    pub fn combined_schema(&self, indices: &[usize]) -> PlanResult<Schema> {
        let mut schema = Schema::new();
        for &index in indices {
            schema.add_columns(self.leaves[index].plan.get_schema())?;
        }
        Ok(schema)
    }

    /// Computes the leaf-coverage bitmask of a conjunct: bit `i` is set when leaf `i`'s schema
    /// resolves one of the conjunct's column references.  A reference that resolves in no leaf
    /// leaves the mask untouched (it may be a correlated reference handled higher up); one that
    /// resolves in several leaves is ambiguous.
    pub fn conjunct_coverage(&self, conjunct: &Expression) -> PlanResult<u64> {
        let mut refs = Vec::new();
        conjunct.collect_column_refs(&mut refs);

        let mut mask = 0u64;
        for column_ref in refs {
            let mut matches = 0;
            let mut matched_leaf = 0;
            for (index, leaf) in self.leaves.iter().enumerate() {
                let found = leaf.plan.get_schema().find_columns(&column_ref);
                if found.len() > 1 {
                    return Err(PlanError::AmbiguousColumn(column_ref.clone()));
                }
                if found.len() == 1 {
                    matches += 1;
                    matched_leaf = index;
                }
            }
            match matches {
                0 => {}
                1 => mask |= 1 << matched_leaf,
                _ => {
                    return Err(PlanError::AmbiguousColumn(column_ref));
                }
            }
        }
        Ok(mask)
    }

    /// Whether every column reference in the conjunct resolves within the leaves.  Conjuncts
    /// that don't (correlated references, unknown columns) cannot take part in join
    /// enumeration.
    pub fn conjunct_fully_covered(&self, conjunct: &Expression) -> bool {
        let mut refs = Vec::new();
        conjunct.collect_column_refs(&mut refs);

        refs.into_iter().all(|column_ref| {
            self.leaves
                .iter()
                .any(|leaf| leaf.plan.get_schema().find_columns(&column_ref).len() == 1)
        })
    }
}

/// Synthesizes the equality conjuncts of a `NATURAL` or `USING` join from the two sides'
/// schemas.
///
/// # Arguments
/// * left_schema - the combined schema of the join's left side.
/// * right_schema - the combined schema of the join's right side.
/// * using_columns - the explicit `USING` column list, or `None` for a natural join (which
///   equates every shared column name).
pub fn synthesize_join_condition(left_schema: &Schema,
                                 right_schema: &Schema,
                                 using_columns: Option<&[String]>)
                                 -> PlanResult<Vec<Expression>> {
    let shared: Vec<String> = match using_columns {
        Some(columns) => columns.to_vec(),
        None => {
            if left_schema.has_multiple_columns_with_same_name() ||
               right_schema.has_multiple_columns_with_same_name() {
                return Err(PlanError::UnsupportedConstruct(
                    "NATURAL join over a side with duplicate column names".into()));
            }
            let mut common: Vec<String> =
                left_schema.get_common_column_names(right_schema).into_iter().collect();
            common.sort();
            if common.is_empty() {
                return Err(PlanError::UnsupportedConstruct(
                    "NATURAL join with no shared column names".into()));
            }
            common
        }
    };

    let mut conjuncts = Vec::with_capacity(shared.len());
    for name in shared {
        let left_info = left_schema.get_column(name.as_str())
            .ok_or_else(|| PlanError::UnknownColumn((None, Some(name.clone()))))?;
        let right_info = right_schema.get_column(name.as_str())
            .ok_or_else(|| PlanError::UnknownColumn((None, Some(name.clone()))))?;

        conjuncts.push(Expression::Compare(
            Box::new(Expression::ColumnValue(left_info.get_column_name())),
            CompareType::Equals,
            Box::new(Expression::ColumnValue(right_info.get_column_name()))));
    }
    Ok(conjuncts)
}

/// Extracts the conjuncts of a join condition, synthesizing them for `NATURAL`/`USING` joins.
pub fn condition_conjuncts(condition: &JoinConditionType,
                           left_schema: &Schema,
                           right_schema: &Schema)
                           -> PlanResult<Vec<Expression>> {
    match *condition {
        JoinConditionType::OnExpr(ref expr) => {
            let mut conjuncts = Vec::new();
            expr.simplify().collect_conjuncts(&mut conjuncts);
            // A constant-true condition contributes nothing.
            conjuncts.retain(|c| *c != Expression::True);
            Ok(conjuncts)
        }
        JoinConditionType::NaturalJoin => {
            synthesize_join_condition(left_schema, right_schema, None)
        }
        JoinConditionType::Using(ref columns) => {
            synthesize_join_condition(left_schema, right_schema, Some(columns))
        }
    }
}
