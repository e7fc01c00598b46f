//! This module contains `FROM` clause information.

use ::expressions::{Expression, SelectClause};

/// For FROM clauses that contain join expressions, this enumeration specifies the kind of
/// join-condition for each join expression.
#[derive(Clone, Debug, PartialEq)]
pub enum JoinConditionType {
    /// Perform a natural join, which implicitly specifies that values in all shared columns must
    /// be equal.
    NaturalJoin,
    /// The join clause specifies an ON clause with an expression that must evaluate to true.
    OnExpr(Expression),
    /// The join clause specifies a USING clause, which explicitly lists the shared columns whose
    /// values must be equal.
    Using(Vec<String>),
}

impl ::std::fmt::Display for JoinConditionType {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        match *self {
            JoinConditionType::NaturalJoin => write!(f, "NaturalJoin"),
            JoinConditionType::OnExpr(_) => write!(f, "JoinOnExpression"),
            JoinConditionType::Using(_) => write!(f, "JoinUsing"),
        }
    }
}

/// An enumeration specifying the different types of join operation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum JoinType {
    /// Inner joins, where only matching rows are included in the result.
    Inner,
    /// Left outer joins, where non-matching rows from the left table are included in the results.
    LeftOuter,
    /// Right outer joins, where non-matching rows from the right table are included in the
    /// results.
    RightOuter,
    /// Full outer joins, where non-matching rows from either the left or right table are
    /// included in the results.
    FullOuter,
    /// Cross joins, which are simply a Cartesian product.
    Cross,
    /// Semijoin, where the left table's rows are included when they match one or more rows from
    /// the right table.
    Semijoin,
    /// Antijoin (aka anti-semijoin), where the left table's rows are included when they match
    /// none of the rows from the right table.
    Antijoin,
}

impl JoinType {
    /// Whether this join type preserves unmatched tuples from at least one side.  Outer joins
    /// cannot be decomposed by the planner; they stay opaque units in join enumeration.
    pub fn is_outer(&self) -> bool {
        match *self {
            JoinType::LeftOuter | JoinType::RightOuter | JoinType::FullOuter => true,
            _ => false,
        }
    }
}

impl ::std::fmt::Display for JoinType {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        match *self {
            JoinType::Inner => write!(f, "Inner"),
            JoinType::LeftOuter => write!(f, "Left Outer"),
            JoinType::RightOuter => write!(f, "Right Outer"),
            JoinType::FullOuter => write!(f, "Full Outer"),
            JoinType::Cross => write!(f, "Cross"),
            JoinType::Semijoin => write!(f, "Semijoin"),
            JoinType::Antijoin => write!(f, "Antijoin"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
/// This enum contains information about what kind of FROM clause the clause is.
pub enum FromClauseType {
    /// A `FROM` clause that just selects a base table and possibly an alias.
    BaseTable {
        /// The name of the table being selected from.
        table: String,
        /// An optional alias to rename the table with.
        alias: Option<String>,
    },
    /// A `FROM` clause that is a nested `SELECT`, also called a derived table.  Derived tables
    /// must carry an alias.
    SelectSubquery {
        /// The nested query producing the derived table's rows.
        select: Box<SelectClause>,
        /// The name the derived table is exposed under.
        alias: String,
    },
    /// A `FROM` clause that is a join expression (may be nested).
    JoinExpression {
        /// The left child of the join.
        left: Box<FromClause>,
        /// The right child of the join.
        right: Box<FromClause>,
        /// The join type.
        join_type: JoinType,
        /// The join condition type.
        condition_type: JoinConditionType,
    },
}

impl ::std::fmt::Display for FromClauseType {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        match *self {
            FromClauseType::BaseTable { .. } => write!(f, "BaseTable"),
            FromClauseType::SelectSubquery { .. } => write!(f, "SelectSubquery"),
            FromClauseType::JoinExpression { .. } => write!(f, "JoinExpression"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
/// This struct represents a hierarchy of one or more base and derived relations that produce the
/// rows considered by `SELECT` clauses.
pub struct FromClause {
    /// The actual FROM clause data.
    pub clause_type: FromClauseType,
}

impl ::std::ops::Deref for FromClause {
    type Target = FromClauseType;
    fn deref(&self) -> &Self::Target {
        &self.clause_type
    }
}

impl FromClause {
    /// Instantiate a FROM clause that is a base table.
    pub fn base_table<S: Into<String>>(table: S, alias: Option<String>) -> FromClause {
        FromClause {
            clause_type: FromClauseType::BaseTable {
                table: table.into(),
                alias: alias,
            },
        }
    }

    /// Instantiate a FROM clause that is a derived table.
    pub fn select_subquery<S: Into<String>>(select: SelectClause, alias: S) -> FromClause {
        FromClause {
            clause_type: FromClauseType::SelectSubquery {
                select: Box::new(select),
                alias: alias.into(),
            },
        }
    }

    /// Instantiate a FROM clause that is a join expression.
    pub fn join_expression(left: FromClause,
                           right: FromClause,
                           join_type: JoinType,
                           condition_type: JoinConditionType)
                           -> FromClause {
        FromClause {
            clause_type: FromClauseType::JoinExpression {
                left: Box::new(left),
                right: Box::new(right),
                join_type: join_type,
                condition_type: condition_type,
            },
        }
    }

    /// Whether this FROM clause is an outer-join expression at its top level.
    pub fn is_outer_join(&self) -> bool {
        match self.clause_type {
            FromClauseType::JoinExpression { ref join_type, .. } => join_type.is_outer(),
            _ => false,
        }
    }

    /// The name this clause exposes its columns under, when it has a single one: the alias (or
    /// name) of a base table, or the alias of a derived table.
    pub fn result_table_name(&self) -> Option<String> {
        match self.clause_type {
            FromClauseType::BaseTable { ref table, ref alias } => {
                Some(alias.clone().unwrap_or_else(|| table.clone()))
            }
            FromClauseType::SelectSubquery { ref alias, .. } => Some(alias.clone()),
            FromClauseType::JoinExpression { .. } => None,
        }
    }
}

impl ::std::fmt::Display for FromClause {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        write!(f, "JoinClause[type={}", self.clause_type)?;
        match self.clause_type {
            FromClauseType::BaseTable { ref table, ref alias } => {
                write!(f, ", table={}", table)?;
                if let Some(ref name) = *alias {
                    write!(f, " AS {}", name)?;
                }
            }
            FromClauseType::SelectSubquery { ref select, ref alias } => {
                write!(f, ", select={} AS {}", select, alias)?;
            }
            FromClauseType::JoinExpression { ref left, ref right, ref join_type, ref condition_type } => {
                write!(f, ", join_type={}", join_type)?;
                write!(f, ", cond_type={}", condition_type)?;
                if let JoinConditionType::OnExpr(ref expr) = *condition_type {
                    if *expr != Expression::True {
                        write!(f, ", on_expr={}", expr)?;
                    }
                }
                if let JoinConditionType::Using(ref names) = *condition_type {
                    write!(f, ", using_names={:?}", names)?;
                }
                write!(f, ", left_child={}", left)?;
                write!(f, ", right_child={}", right)?;
            }
        }
        write!(f, "]")
    }
}
