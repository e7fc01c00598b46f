//! This module provides NanoDB's function framework: the directory of known functions, and the
//! scalar and aggregate function interfaces.

pub mod directory;

mod count;
mod min_max;
mod scalar;
mod sum_avg;

pub use self::count::{CountAggregate, CountStar};
pub use self::directory::Directory;
pub use self::min_max::MinMax;
pub use self::scalar::{Abs, Coalesce};
pub use self::sum_avg::SumAverage;

use ::expressions::{Expression, Literal};
use ::relations::{ColumnType, Schema};

/// An error that can occur while looking up or applying a function.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionError {
    /// The named function does not exist in the directory.
    DoesNotExist(String),
    /// The function was called with the wrong number of arguments.  In the form of (name,
    /// expected, got).
    TakesArguments(String, usize, usize),
    /// The function received an argument value it cannot operate on.
    InvalidArgument(String, Literal),
    /// The function's return type could not be determined from its arguments.
    CouldNotDetermineType(String),
}

impl ::std::fmt::Display for FunctionError {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        match *self {
            FunctionError::DoesNotExist(ref name) => {
                write!(f, "The function {} does not exist.", name)
            }
            FunctionError::TakesArguments(ref name, expected, got) => {
                write!(f,
                       "The function {} takes {} argument(s), but was given {}.",
                       name,
                       expected,
                       got)
            }
            FunctionError::InvalidArgument(ref name, ref value) => {
                write!(f, "The function {} cannot operate on the value {}.", name, value)
            }
            FunctionError::CouldNotDetermineType(ref name) => {
                write!(f, "Unable to determine the return type of the function {}.", name)
            }
        }
    }
}

/// A result from a function application.
pub type FunctionResult = Result<Literal, FunctionError>;

/// A function that is applied row-by-row to already-evaluated argument values.
pub trait ScalarFunction {
    /// Applies the function to the evaluated argument values.
    fn evaluate(&self, args: &[Literal]) -> FunctionResult;

    /// Determines the type of the function result, given the (unevaluated) argument expressions
    /// and the schema they will be evaluated against.
    fn return_type(&self,
                   args: &[Expression],
                   schema: &Schema)
                   -> Result<ColumnType, FunctionError>;
}

/// A function that accumulates a result over many input values, one group at a time.
///
/// Aggregate objects carry scratch state between [`add_value`](#tymethod.add_value) calls;
/// grouping nodes keep one instance per group and per call, clearing them with
/// [`clear_result`](#tymethod.clear_result) when an instance is reused.
pub trait AggregateFunction {
    /// Whether the aggregate supports the `DISTINCT` modifier.
    fn supports_distinct(&self) -> bool;

    /// Resets the aggregate's scratch state for a fresh accumulation.
    fn clear_result(&mut self);

    /// Feeds one input value into the aggregate.
    fn add_value(&mut self, value: Literal);

    /// Produces the aggregate result for the values fed in so far.
    fn get_result(&self) -> Literal;

    /// Determines the type of the aggregate result, given the (unevaluated) argument
    /// expressions and the schema they will be evaluated against.
    fn return_type(&self,
                   args: &[Expression],
                   schema: &Schema)
                   -> Result<ColumnType, FunctionError>;
}

/// An entry in the function directory: either a scalar function or an aggregate function.
pub enum Function {
    /// A scalar (row-by-row) function.
    Scalar(Box<ScalarFunction>),
    /// An aggregate function.
    Aggregate(Box<AggregateFunction>),
}

impl Function {
    /// Whether this entry is an aggregate function.
    pub fn is_aggregate(&self) -> bool {
        match *self {
            Function::Aggregate(_) => true,
            Function::Scalar(_) => false,
        }
    }

    /// Borrows the entry as a scalar function, if it is one.
    pub fn as_scalar(&self) -> Option<&ScalarFunction> {
        match *self {
            Function::Scalar(ref f) => Some(&**f),
            Function::Aggregate(_) => None,
        }
    }

    /// Converts the entry into an aggregate function, if it is one.
    pub fn into_aggregate(self) -> Option<Box<AggregateFunction>> {
        match self {
            Function::Aggregate(f) => Some(f),
            Function::Scalar(_) => None,
        }
    }

    /// Determines the type of the function result.
    pub fn return_type(&self,
                       args: &[Expression],
                       schema: &Schema)
                       -> Result<ColumnType, FunctionError> {
        match *self {
            Function::Scalar(ref f) => f.return_type(args, schema),
            Function::Aggregate(ref f) => f.return_type(args, schema),
        }
    }
}

lazy_static! {
    static ref DIRECTORY: Directory = Directory::new();
}

/// The process-wide directory of built-in functions.
pub fn directory() -> &'static Directory {
    &DIRECTORY
}
