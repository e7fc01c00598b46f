//! The `COUNT` family of aggregate functions.

use std::collections::HashSet;

use ::expressions::{Expression, Literal};
use ::functions::{AggregateFunction, Function, FunctionError};
use ::relations::{ColumnType, Schema};

/// `COUNT(expr)` and `COUNT(DISTINCT expr)`: counts non-`NULL` input values.
#[derive(Debug, Clone)]
pub struct CountAggregate {
    count: i32,
    distinct: bool,
    values_seen: HashSet<Literal>,
}

impl CountAggregate {
    /// Creates a plain `COUNT` aggregate.
    pub fn count() -> Function {
        Function::Aggregate(Box::new(CountAggregate {
            count: 0,
            distinct: false,
            values_seen: HashSet::new(),
        }))
    }

    /// Creates a `COUNT(DISTINCT ...)` aggregate.
    pub fn count_distinct() -> Function {
        Function::Aggregate(Box::new(CountAggregate {
            count: 0,
            distinct: true,
            values_seen: HashSet::new(),
        }))
    }
}

impl AggregateFunction for CountAggregate {
    fn supports_distinct(&self) -> bool {
        true
    }

    fn clear_result(&mut self) {
        self.count = 0;
        self.values_seen.clear();
    }

    fn add_value(&mut self, value: Literal) {
        // NULL values are never counted, and never enter the distinct set.
        if value == Literal::Null {
            return;
        }

        if self.distinct {
            if self.values_seen.insert(value) {
                self.count += 1;
            }
        } else {
            self.count += 1;
        }
    }

    fn get_result(&self) -> Literal {
        Literal::Int(self.count)
    }

    fn return_type(&self,
                   args: &[Expression],
                   _schema: &Schema)
                   -> Result<ColumnType, FunctionError> {
        if args.len() != 1 {
            return Err(FunctionError::TakesArguments("COUNT".into(), 1, args.len()));
        }
        Ok(ColumnType::Integer)
    }
}

/// `COUNT(*)`: counts every input row, `NULL`s included.
#[derive(Debug, Clone)]
pub struct CountStar {
    count: i32,
}

impl CountStar {
    /// Creates a `COUNT(*)` aggregate.
    pub fn count() -> Function {
        Function::Aggregate(Box::new(CountStar { count: 0 }))
    }
}

impl AggregateFunction for CountStar {
    fn supports_distinct(&self) -> bool {
        false
    }

    fn clear_result(&mut self) {
        self.count = 0;
    }

    fn add_value(&mut self, _value: Literal) {
        self.count += 1;
    }

    fn get_result(&self) -> Literal {
        Literal::Int(self.count)
    }

    fn return_type(&self,
                   _args: &[Expression],
                   _schema: &Schema)
                   -> Result<ColumnType, FunctionError> {
        Ok(ColumnType::Integer)
    }
}

#[cfg(test)]
mod tests {
    use ::expressions::Literal;
    use ::functions::AggregateFunction;
    use super::*;

    #[test]
    fn test_count_skips_nulls() {
        let mut count = CountAggregate {
            count: 0,
            distinct: false,
            values_seen: Default::default(),
        };
        count.add_value(Literal::Int(1));
        count.add_value(Literal::Null);
        count.add_value(Literal::Int(1));
        assert_eq!(Literal::Int(2), count.get_result());
    }

    #[test]
    fn test_count_distinct() {
        let mut count = CountAggregate {
            count: 0,
            distinct: true,
            values_seen: Default::default(),
        };
        for v in vec![1, 1, 2, 3, 3, 3] {
            count.add_value(Literal::Int(v));
        }
        count.add_value(Literal::Null);
        assert_eq!(Literal::Int(3), count.get_result());

        count.clear_result();
        assert_eq!(Literal::Int(0), count.get_result());
    }

    #[test]
    fn test_count_star_counts_nulls() {
        let mut count = CountStar { count: 0 };
        count.add_value(Literal::Null);
        count.add_value(Literal::Int(5));
        assert_eq!(Literal::Int(2), count.get_result());
    }
}
