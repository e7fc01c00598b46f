//! This package contains modules for representing query execution plans, as well as analyzing
//! their costs.

pub mod cost_based_planner;
mod from_decomposition;
mod join_enumeration;

pub use self::cost_based_planner::CostBasedPlanner;

use ::expressions::{Environment, Expression, ExpressionError, SelectClause};
use ::queries::FileScanNode;
use ::queries::plan_nodes::{NodeResult, PlanNode};
use ::relations::{ColumnName, SchemaError, column_name_to_string};
use ::storage::{PinError, StorageManager, TableManager, TupleError, TupleLiteral, table_manager,
                tuple_files};
use ::expressions::Literal;

/// An error that could occur during planning or plan execution.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// A table manager error occurred.
    TableManagerError(table_manager::Error),
    /// A tuple-file error occurred.
    TupleFileError(tuple_files::Error),
    /// A schema error occurred.
    SchemaError(SchemaError),
    /// A pin error occurred.
    PinError(PinError),
    /// A tuple-level error occurred.
    TupleError(TupleError),
    /// The predicate evaluated to a non-boolean value.
    InvalidPredicate(Literal),
    /// The predicate could not be evaluated.
    CouldNotApplyPredicate(ExpressionError),
    /// An expression failed while being evaluated or analyzed.
    ExpressionError(ExpressionError),
    /// A column name could not be resolved against the schemas in scope.
    UnknownColumn(ColumnName),
    /// A column name resolved to more than one column.
    AmbiguousColumn(ColumnName),
    /// An aggregate call appeared inside another aggregate call.
    NestedAggregate(String),
    /// An aggregate call appeared somewhere aggregates may not appear (WHERE, ON, GROUP BY).
    AggregateInWrongPlace(String),
    /// `GROUP BY` currently requires simple column references.
    GroupByNeedsColumnRef(String),
    /// Only `COUNT` may take `*` as its argument.
    WildcardInNonCountFunction(String),
    /// The node was not prepared before being used.
    NodeNotPrepared,
    /// The node does not support position marking.
    MarkingNotSupported,
    /// The node does not carry a predicate.
    PredicateNotSupported,
    /// A construct the planner does not support.
    UnsupportedConstruct(String),
}

impl From<table_manager::Error> for Error {
    fn from(e: table_manager::Error) -> Error {
        Error::TableManagerError(e)
    }
}

impl From<tuple_files::Error> for Error {
    fn from(e: tuple_files::Error) -> Error {
        Error::TupleFileError(e)
    }
}

impl From<SchemaError> for Error {
    fn from(e: SchemaError) -> Error {
        Error::SchemaError(e)
    }
}

impl From<PinError> for Error {
    fn from(e: PinError) -> Error {
        Error::PinError(e)
    }
}

impl From<TupleError> for Error {
    fn from(e: TupleError) -> Error {
        Error::TupleError(e)
    }
}

impl From<ExpressionError> for Error {
    fn from(e: ExpressionError) -> Error {
        Error::ExpressionError(e)
    }
}

impl ::std::fmt::Display for Error {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        match *self {
            Error::TableManagerError(ref e) => write!(f, "{}", e),
            Error::TupleFileError(ref e) => write!(f, "{}", e),
            Error::SchemaError(ref e) => write!(f, "{}", e),
            Error::PinError(ref e) => write!(f, "{}", e),
            Error::TupleError(ref e) => write!(f, "{}", e),
            Error::InvalidPredicate(ref value) => {
                write!(f, "The predicate evaluated to the non-boolean value {}.", value)
            }
            Error::CouldNotApplyPredicate(ref e) => {
                write!(f, "The predicate could not be applied: {}", e)
            }
            Error::ExpressionError(ref e) => write!(f, "{}", e),
            Error::UnknownColumn(ref name) => {
                write!(f, "Unknown column {}.", column_name_to_string(name))
            }
            Error::AmbiguousColumn(ref name) => {
                write!(f, "Ambiguous column {}.", column_name_to_string(name))
            }
            Error::NestedAggregate(ref call) => {
                write!(f, "Aggregate calls cannot be nested: {}.", call)
            }
            Error::AggregateInWrongPlace(ref call) => {
                write!(f,
                       "Aggregate calls may not appear in WHERE, ON, or GROUP BY clauses: {}.",
                       call)
            }
            Error::GroupByNeedsColumnRef(ref expr) => {
                write!(f, "GROUP BY expressions must be column references; got {}.", expr)
            }
            Error::WildcardInNonCountFunction(ref name) => {
                write!(f, "Only COUNT may take * as an argument, not {}.", name)
            }
            Error::NodeNotPrepared => write!(f, "A plan node was not prepared before use."),
            Error::MarkingNotSupported => {
                write!(f, "The plan node does not support position marking.")
            }
            Error::PredicateNotSupported => {
                write!(f, "The plan node does not carry a predicate.")
            }
            Error::UnsupportedConstruct(ref what) => {
                write!(f, "Unsupported construct: {}.", what)
            }
        }
    }
}

pub use self::Error as PlanError;

/// A result with a plan error.
pub type PlanResult<T> = Result<T, Error>;

/// Executes a plan node to completion and returns the tuples it produced.
pub fn get_plan_results(plan: &mut Box<::queries::PlanNode>)
                        -> PlanResult<Vec<TupleLiteral>> {
    let mut tuples: Vec<TupleLiteral> = Vec::new();
    plan.initialize()?;

    loop {
        match plan.get_next_tuple() {
            Ok(Some(tuple)) => tuples.push(tuple),
            Ok(None) => break,
            Err(e) => {
                // Still release the node's resources before propagating the failure.
                let _ = plan.clean_up();
                return Err(e);
            }
        }
    }

    plan.clean_up()?;
    Ok(tuples)
}

/// Returns a plan tree for executing a simple select against a single table, whose tuples can
/// also be used for updating and deletion.
///
/// # Arguments
/// * storage - the storage manager.
/// * table_manager - the table manager.
/// * table_name - The name of the table to select on.
/// * predicate - An optional predicate to filter on.
pub fn make_simple_select<S: Into<String>>(storage: &StorageManager,
                                           table_manager: &mut TableManager,
                                           table_name: S,
                                           predicate: Option<Expression>)
                                           -> NodeResult {
    let table = table_manager.get_table(storage, table_name)?;

    let mut select_node = FileScanNode::new(table, predicate);
    select_node.prepare()?;
    Ok(Box::new(select_node))
}

/// This trait specifies the common entry-point for all query planner/optimizer implementations.
/// The trait is very simple, but a particular implementation might be very complicated depending
/// on what kinds of optimizations are implemented.  Note that a new planner/optimizer is created
/// for each query being planned.
pub trait Planner {
    /// Create an execution plan for a SELECT clause.  When the clause is a subquery, the
    /// enclosing environment is passed; correlated column references resolve against the
    /// environment chain at evaluation time.
    fn make_plan(&mut self,
                 clause: SelectClause,
                 enclosing_env: Option<&Environment>)
                 -> NodeResult;
}
