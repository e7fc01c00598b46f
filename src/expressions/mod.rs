//! A module containing classes for representing and evaluating arithmetic and logical
//! expressions, along with the clause structures that SQL statements are built from.

pub mod environment;
pub mod expression;
pub mod from_clause;
pub mod literal;
pub mod select_clause;

pub use self::environment::Environment;
pub use self::expression::{Expression, ExpressionProcessor, make_predicate};
pub use self::from_clause::{FromClause, FromClauseType, JoinConditionType, JoinType};
pub use self::literal::Literal;
pub use self::select_clause::{OrderByExpression, SelectClause, SelectValue};

use ::functions::FunctionError;
use ::relations::ColumnName;
use ::storage::TupleError;

/// Describes a comparison operation.
#[derive(Debug, Clone, PartialEq, Copy)]
pub enum CompareType {
    /// Equality
    Equals,
    /// Inequality
    NotEquals,
    /// Less than
    LessThan,
    /// Less than or equal to
    LessThanEqual,
    /// Greater than
    GreaterThan,
    /// Greater than or equal to
    GreaterThanEqual,
}

impl CompareType {
    /// The comparison with its operands swapped, e.g. `a < b` becomes `b > a`.
    pub fn flipped(&self) -> CompareType {
        match *self {
            CompareType::LessThan => CompareType::GreaterThan,
            CompareType::LessThanEqual => CompareType::GreaterThanEqual,
            CompareType::GreaterThan => CompareType::LessThan,
            CompareType::GreaterThanEqual => CompareType::LessThanEqual,
            other => other,
        }
    }
}

impl ::std::fmt::Display for CompareType {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        let op = match *self {
            CompareType::Equals => "=",
            CompareType::NotEquals => "!=",
            CompareType::LessThan => "<",
            CompareType::LessThanEqual => "<=",
            CompareType::GreaterThan => ">",
            CompareType::GreaterThanEqual => ">=",
        };
        write!(f, "{}", op)
    }
}

/// Describes an arithmetic operation.
#[derive(Debug, Clone, PartialEq, Copy)]
pub enum ArithmeticType {
    /// Addition
    Plus,
    /// Subtraction
    Minus,
    /// Multiplication
    Multiply,
    /// Division
    Divide,
    /// Modulo
    Remainder,
}

impl ::std::fmt::Display for ArithmeticType {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        let op = match *self {
            ArithmeticType::Plus => "+",
            ArithmeticType::Minus => "-",
            ArithmeticType::Multiply => "*",
            ArithmeticType::Divide => "/",
            ArithmeticType::Remainder => "%",
        };
        write!(f, "{}", op)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// An error that can occur while evaluating or transforming an expression.
pub enum Error {
    /// The expression (e.g. an `AND` or `OR`) has no subexpressions at all.
    EmptyExpression,
    /// A value that was required to be boolean was not.
    NotBoolean(Literal),
    /// A value that was required to be numeric was not.
    NotNumeric(Literal),
    /// Two values could not be compared with each other.
    NotComparable(Literal, Literal),
    /// Integer division or remainder by zero.
    DivideByZero,
    /// The column name could not be resolved in the current environment chain.
    CouldNotResolve(ColumnName),
    /// The column name matched more than one column.
    AmbiguousColumnName(ColumnName),
    /// Reading a column value out of a tuple failed.
    CouldNotRead(TupleError),
    /// A function call failed.
    FunctionError(FunctionError),
    /// An aggregate call appeared inside another aggregate call. In the form of (parent, nested).
    NestedAggregateCall(String, String),
    /// A scalar function was called where an aggregate was required, or vice versa.
    NotAggregate(String),
    /// A subquery expression was evaluated before the planner attached a plan to it.
    SubqueryNotPlanned,
    /// A scalar subquery produced more than one row.
    ScalarSubqueryMultipleRows,
    /// A scalar subquery's rows do not have exactly one column.
    ScalarSubqueryWrongArity(usize),
    /// A subquery plan failed while being evaluated.  The plan error is carried as a string to
    /// keep the two error types from being mutually recursive.
    SubqueryPlanFailure(String),
    /// The type of the expression could not be determined against the given schema.
    CouldNotDetermineType(String),
}

impl From<FunctionError> for Error {
    fn from(e: FunctionError) -> Error {
        Error::FunctionError(e)
    }
}

impl From<TupleError> for Error {
    fn from(e: TupleError) -> Error {
        Error::CouldNotRead(e)
    }
}

impl ::std::fmt::Display for Error {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        match *self {
            Error::EmptyExpression => write!(f, "The expression has no subexpressions."),
            Error::NotBoolean(ref l) => write!(f, "The value {} is not boolean.", l),
            Error::NotNumeric(ref l) => write!(f, "The value {} is not numeric.", l),
            Error::NotComparable(ref a, ref b) => {
                write!(f, "The values {} and {} cannot be compared.", a, b)
            }
            Error::DivideByZero => write!(f, "Division by zero."),
            Error::CouldNotResolve(ref name) => {
                write!(f,
                       "The column {} could not be resolved.",
                       super::relations::column_name_to_string(name))
            }
            Error::AmbiguousColumnName(ref name) => {
                write!(f,
                       "The column {} is ambiguous.",
                       super::relations::column_name_to_string(name))
            }
            Error::CouldNotRead(ref e) => write!(f, "Unable to read a column value: {:?}", e),
            Error::FunctionError(ref e) => write!(f, "{}", e),
            Error::NestedAggregateCall(ref parent, ref nested) => {
                write!(f,
                       "The aggregate call {} contains the nested aggregate call {}.",
                       parent,
                       nested)
            }
            Error::NotAggregate(ref name) => {
                write!(f, "The function {} is not an aggregate function.", name)
            }
            Error::SubqueryNotPlanned => {
                write!(f, "A subquery expression has no plan attached to it.")
            }
            Error::ScalarSubqueryMultipleRows => {
                write!(f, "A scalar subquery produced more than one row.")
            }
            Error::ScalarSubqueryWrongArity(n) => {
                write!(f, "A scalar subquery must produce one column, not {}.", n)
            }
            Error::SubqueryPlanFailure(ref msg) => {
                write!(f, "A subquery plan failed to execute: {}", msg)
            }
            Error::CouldNotDetermineType(ref expr) => {
                write!(f, "Unable to determine the type of the expression {}.", expr)
            }
        }
    }
}

pub use self::Error as ExpressionError;
