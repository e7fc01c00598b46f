//! The `SUM` and `AVG` aggregate functions, which share their accumulation machinery.

use std::collections::HashSet;

use ::expressions::{Expression, Literal};
use ::functions::{AggregateFunction, Function, FunctionError};
use ::relations::{ColumnType, Schema};

/// Accumulates a sum (and a count, for `AVG`) over non-`NULL` numeric inputs.
#[derive(Debug, Clone)]
pub struct SumAverage {
    sum: f64,
    count: i64,
    all_integral: bool,
    compute_average: bool,
    distinct: bool,
    values_seen: HashSet<Literal>,
}

impl SumAverage {
    fn with_flags(compute_average: bool, distinct: bool) -> Function {
        Function::Aggregate(Box::new(SumAverage {
            sum: 0.0,
            count: 0,
            all_integral: true,
            compute_average: compute_average,
            distinct: distinct,
            values_seen: HashSet::new(),
        }))
    }

    /// Creates a `SUM` aggregate.
    pub fn sum() -> Function {
        SumAverage::with_flags(false, false)
    }

    /// Creates a `SUM(DISTINCT ...)` aggregate.
    pub fn sum_distinct() -> Function {
        SumAverage::with_flags(false, true)
    }

    /// Creates an `AVG` aggregate.
    pub fn average() -> Function {
        SumAverage::with_flags(true, false)
    }

    /// Creates an `AVG(DISTINCT ...)` aggregate.
    pub fn average_distinct() -> Function {
        SumAverage::with_flags(true, true)
    }
}

impl AggregateFunction for SumAverage {
    fn supports_distinct(&self) -> bool {
        true
    }

    fn clear_result(&mut self) {
        self.sum = 0.0;
        self.count = 0;
        self.all_integral = true;
        self.values_seen.clear();
    }

    fn add_value(&mut self, value: Literal) {
        if value == Literal::Null {
            return;
        }

        let numeric = match value.as_f64() {
            Some(v) => v,
            // Non-numeric inputs are a type error reported at planning time via return_type;
            // at accumulation time they are simply skipped.
            None => {
                return;
            }
        };

        if self.distinct && !self.values_seen.insert(value.clone()) {
            return;
        }

        if value.is_floating() {
            self.all_integral = false;
        }
        self.sum += numeric;
        self.count += 1;
    }

    fn get_result(&self) -> Literal {
        if self.count == 0 {
            return Literal::Null;
        }
        if self.compute_average {
            Literal::Double(self.sum / self.count as f64)
        } else if self.all_integral {
            Literal::Long(self.sum as i64)
        } else {
            Literal::Double(self.sum)
        }
    }

    fn return_type(&self,
                   args: &[Expression],
                   schema: &Schema)
                   -> Result<ColumnType, FunctionError> {
        let name = if self.compute_average { "AVG" } else { "SUM" };
        if args.len() != 1 {
            return Err(FunctionError::TakesArguments(name.into(), 1, args.len()));
        }
        if self.compute_average {
            return Ok(ColumnType::Double);
        }
        match args[0].get_column_type(schema) {
            Ok(ColumnType::Float) | Ok(ColumnType::Double) => Ok(ColumnType::Double),
            Ok(ref t) if t.is_numeric() => Ok(ColumnType::BigInt),
            _ => Err(FunctionError::CouldNotDetermineType(name.into())),
        }
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
    fn test_sum_integral() {
        let mut sum = unwrap_aggregate(SumAverage::sum());
        for v in vec![1, 2, 3] {
            sum.add_value(Literal::Int(v));
        }
        sum.add_value(Literal::Null);
        assert_eq!(Literal::Long(6), sum.get_result());
    }

    #[test]
    fn test_sum_floats_widen() {
        let mut sum = unwrap_aggregate(SumAverage::sum());
        sum.add_value(Literal::Int(1));
        sum.add_value(Literal::Double(0.5));
        assert_eq!(Literal::Double(1.5), sum.get_result());
    }

    #[test]
    fn test_avg_ignores_nulls() {
        let mut avg = unwrap_aggregate(SumAverage::average());
        avg.add_value(Literal::Int(6));
        avg.add_value(Literal::Null);
        avg.add_value(Literal::Int(10));
        assert_eq!(Literal::Double(8.0), avg.get_result());
    }

    #[test]
    fn test_empty_input_is_null() {
        let sum = unwrap_aggregate(SumAverage::sum());
        assert_eq!(Literal::Null, sum.get_result());
        let avg = unwrap_aggregate(SumAverage::average());
        assert_eq!(Literal::Null, avg.get_result());
    }

    #[test]
    fn test_sum_distinct() {
        let mut sum = unwrap_aggregate(SumAverage::sum_distinct());
        for v in vec![5, 5, 7] {
            sum.add_value(Literal::Int(v));
        }
        assert_eq!(Literal::Long(12), sum.get_result());
    }
}
