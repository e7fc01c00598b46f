//! This module contains the directory of all functions recognized within NanoDB, including both
//! simple and aggregate functions.

use std::collections::HashMap;

use super::{Abs, Coalesce, CountAggregate, CountStar, Function, FunctionError, MinMax, SumAverage};

/// This class is a directory of all functions recognized within NanoDB.  Lookups are
/// case-insensitive; aggregate variants with the `DISTINCT` modifier are registered under
/// mangled `NAME#DISTINCT` entries, and `COUNT(*)` under `COUNT#STAR`.
pub struct Directory {
    map: HashMap<String, Box<Fn() -> Function + Sync>>,
}

impl Directory {
    /// Creates a new function directory holding the built-in functions.
    pub fn new() -> Directory {
        let mut result = Directory { map: HashMap::new() };
        result.init_builtin_functions();
        result
    }

    fn init_builtin_functions(&mut self) {
        self.add_function("ABS", Box::new(Abs::new));
        self.add_function("COALESCE", Box::new(Coalesce::new));

        self.add_function("COUNT", Box::new(CountAggregate::count));
        self.add_function("COUNT#DISTINCT", Box::new(CountAggregate::count_distinct));
        self.add_function("COUNT#STAR", Box::new(CountStar::count));
        self.add_function("SUM", Box::new(SumAverage::sum));
        self.add_function("SUM#DISTINCT", Box::new(SumAverage::sum_distinct));
        self.add_function("AVG", Box::new(SumAverage::average));
        self.add_function("AVG#DISTINCT", Box::new(SumAverage::average_distinct));
        self.add_function("AVERAGE", Box::new(SumAverage::average));
        self.add_function("AVERAGE#DISTINCT", Box::new(SumAverage::average_distinct));
        self.add_function("MIN", Box::new(MinMax::min));
        self.add_function("MAX", Box::new(MinMax::max));
    }

    fn add_function<S, F>(&mut self, name: S, constructor: Box<F>)
        where S: Into<String>,
              F: Fn() -> Function + 'static + Sync
    {
        // Function names should come in cleaned up, but make doubly sure.
        let name: String = name.into().to_uppercase();
        self.map.insert(name, constructor);
    }

    /// Retrieves a fresh instance of the named function, if it exists.
    pub fn get<S: Into<String>>(&self, name: S) -> Result<Function, FunctionError> {
        let name: String = name.into().to_uppercase();
        match self.map.get(&name) {
            Some(constructor) => Ok(constructor()),
            None => Err(FunctionError::DoesNotExist(name)),
        }
    }

    /// Whether the named function exists and is an aggregate.
    pub fn is_aggregate<S: Into<String>>(&self, name: S) -> bool {
        match self.get(name) {
            Ok(f) => f.is_aggregate(),
            Err(_) => false,
        }
    }
}
