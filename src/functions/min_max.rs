//! The `MIN` and `MAX` aggregate functions.

use std::cmp::Ordering;

use ::expressions::{Expression, Literal};
use ::functions::{AggregateFunction, Function, FunctionError};
use ::relations::{ColumnType, Schema};

/// Tracks the smallest or largest non-`NULL` value seen so far.
#[derive(Debug, Clone)]
pub struct MinMax {
    minimize: bool,
    current: Option<Literal>,
}

impl MinMax {
    /// Creates a `MIN` aggregate.
    pub fn min() -> Function {
        Function::Aggregate(Box::new(MinMax {
            minimize: true,
            current: None,
        }))
    }

    /// Creates a `MAX` aggregate.
    pub fn max() -> Function {
        Function::Aggregate(Box::new(MinMax {
            minimize: false,
            current: None,
        }))
    }
}

impl AggregateFunction for MinMax {
    fn supports_distinct(&self) -> bool {
        // DISTINCT makes no difference to MIN/MAX; it is accepted and ignored.
        true
    }

    fn clear_result(&mut self) {
        self.current = None;
    }

    fn add_value(&mut self, value: Literal) {
        if value == Literal::Null {
            return;
        }

        let replace = match self.current {
            Some(ref current) => {
                match value.compare(current) {
                    Some(Ordering::Less) => self.minimize,
                    Some(Ordering::Greater) => !self.minimize,
                    _ => false,
                }
            }
            None => true,
        };
        if replace {
            self.current = Some(value);
        }
    }

    fn get_result(&self) -> Literal {
        self.current.clone().unwrap_or(Literal::Null)
    }

    fn return_type(&self,
                   args: &[Expression],
                   schema: &Schema)
                   -> Result<ColumnType, FunctionError> {
        let name = if self.minimize { "MIN" } else { "MAX" };
        if args.len() != 1 {
            return Err(FunctionError::TakesArguments(name.into(), 1, args.len()));
        }
        args[0].get_column_type(schema)
            .map_err(|_| FunctionError::CouldNotDetermineType(name.into()))
    }
}

#[cfg(test)]
mod tests {
    use ::expressions::Literal;
    use ::functions::{AggregateFunction, Function};
    use super::*;

    fn unwrap_aggregate(f: Function) -> Box<AggregateFunction> {
        f.into_aggregate().unwrap()
    }

    #[test]
    fn test_min_max() {
        let mut min = unwrap_aggregate(MinMax::min());
        let mut max = unwrap_aggregate(MinMax::max());
        for v in vec![5, 3, 9, 3] {
            min.add_value(Literal::Int(v));
            max.add_value(Literal::Int(v));
        }
        min.add_value(Literal::Null);
        max.add_value(Literal::Null);
        assert_eq!(Literal::Int(3), min.get_result());
        assert_eq!(Literal::Int(9), max.get_result());
    }

    #[test]
    fn test_strings() {
        let mut min = unwrap_aggregate(MinMax::min());
        for s in vec!["pear", "apple", "quince"] {
            min.add_value(Literal::String(s.into()));
        }
        assert_eq!(Literal::String("apple".into()), min.get_result());
    }

    #[test]
    fn test_empty_is_null() {
        let min = unwrap_aggregate(MinMax::min());
        assert_eq!(Literal::Null, min.get_result());
    }
}
