//! Simple scalar functions.

use ::expressions::{Expression, Literal};
use ::functions::{Function, FunctionError, FunctionResult, ScalarFunction};
use ::relations::{ColumnType, Schema};

/// `ABS(x)`: the absolute value of a numeric argument.
pub struct Abs;

impl Abs {
    /// Creates the `ABS` function.
    pub fn new() -> Function {
        Function::Scalar(Box::new(Abs))
    }
}

impl ScalarFunction for Abs {
    fn evaluate(&self, args: &[Literal]) -> FunctionResult {
        if args.len() != 1 {
            return Err(FunctionError::TakesArguments("ABS".into(), 1, args.len()));
        }
        match args[0] {
            Literal::Null => Ok(Literal::Null),
            Literal::Int(i) => Ok(Literal::Int(i.abs())),
            Literal::Long(l) => Ok(Literal::Long(l.abs())),
            Literal::Float(f) => Ok(Literal::Float(f.abs())),
            Literal::Double(d) => Ok(Literal::Double(d.abs())),
            ref other => Err(FunctionError::InvalidArgument("ABS".into(), other.clone())),
        }
    }

    fn return_type(&self,
                   args: &[Expression],
                   schema: &Schema)
                   -> Result<ColumnType, FunctionError> {
        if args.len() != 1 {
            return Err(FunctionError::TakesArguments("ABS".into(), 1, args.len()));
        }
        args[0].get_column_type(schema)
            .map_err(|_| FunctionError::CouldNotDetermineType("ABS".into()))
    }
}

/// `COALESCE(a, b, ...)`: the first non-`NULL` argument, or `NULL` when every argument is.
pub struct Coalesce;

impl Coalesce {
    /// Creates the `COALESCE` function.
    pub fn new() -> Function {
        Function::Scalar(Box::new(Coalesce))
    }
}

impl ScalarFunction for Coalesce {
    fn evaluate(&self, args: &[Literal]) -> FunctionResult {
        for arg in args {
            if *arg != Literal::Null {
                return Ok(arg.clone());
            }
        }
        Ok(Literal::Null)
    }

    fn return_type(&self,
                   args: &[Expression],
                   schema: &Schema)
                   -> Result<ColumnType, FunctionError> {
        match args.first() {
            Some(first) => {
                first.get_column_type(schema)
                    .map_err(|_| FunctionError::CouldNotDetermineType("COALESCE".into()))
            }
            None => Err(FunctionError::TakesArguments("COALESCE".into(), 1, 0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use ::expressions::Literal;
    use ::functions::ScalarFunction;
    use super::*;

    #[test]
    fn test_abs() {
        assert_eq!(Ok(Literal::Int(5)), Abs.evaluate(&[Literal::Int(-5)]));
        assert_eq!(Ok(Literal::Double(2.5)), Abs.evaluate(&[Literal::Double(-2.5)]));
        assert_eq!(Ok(Literal::Null), Abs.evaluate(&[Literal::Null]));
        assert!(Abs.evaluate(&[Literal::String("x".into())]).is_err());
    }

    #[test]
    fn test_coalesce() {
        assert_eq!(Ok(Literal::Int(3)),
                   Coalesce.evaluate(&[Literal::Null, Literal::Int(3), Literal::Int(4)]));
        assert_eq!(Ok(Literal::Null), Coalesce.evaluate(&[Literal::Null, Literal::Null]));
    }
}
