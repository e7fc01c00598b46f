//! A module which stores utilities for a tuple literal.

use std::hash::{Hash, Hasher};

use super::{PinError, Pinnable, Tuple, TupleError};
use super::super::expressions::Literal;

/// A simple implementation of the [`Tuple`](../trait.Tuple.html) interface for storing literal
/// tuple values.  Tuple literals are the currency of the plan-node pipeline: disk-backed tuples
/// are copied into literals as soon as a plan node needs to hold onto them.
#[derive(Clone, Debug, PartialEq)]
pub struct TupleLiteral {
    values: Vec<Literal>,
}

impl TupleLiteral {
    /// Construct a new tuple-literal that initially has zero columns.  Column values can be
    /// added with the [`add_value`](#method.add_value) method, or entire tuples can be appended
    /// using the [`append_tuple`](#method.append_tuple) method.
    pub fn new() -> TupleLiteral {
        TupleLiteral { values: vec![] }
    }

    /// Construct a tuple-literal from a collection of values.
    pub fn from_iter<I: IntoIterator<Item = Literal>>(values: I) -> TupleLiteral {
        TupleLiteral { values: values.into_iter().collect() }
    }

    /// Construct a tuple-literal holding `count` `NULL` values, e.g. for padding the
    /// unmatched side of an outer join.
    pub fn null(count: usize) -> TupleLiteral {
        TupleLiteral { values: vec![Literal::Null; count] }
    }

    /// Appends the specified value to the end of the tuple-literal.
    ///
    /// # Arguments
    /// * value - The value to append.  This is allowed to be `NULL`.
    pub fn add_value(&mut self, value: Literal) {
        self.values.push(value);
    }

    /// Constructs a new tuple-literal that is a copy of the specified tuple.  After
    /// construction, the new tuple-literal object can be manipulated in various ways, just like
    /// all tuple-literals.
    ///
    /// # Arguments
    /// * tuple - the tuple to make a copy of
    pub fn from_tuple<T: Tuple + ?Sized>(tuple: &mut T) -> TupleLiteral {
        let mut result = TupleLiteral::new();
        result.append_tuple(tuple);
        result
    }

    /// Appends the specified tuple's contents to this tuple-literal object.
    ///
    /// # Arguments
    /// * tuple - the tuple data to copy into this tuple-literal
    pub fn append_tuple<T: Tuple + ?Sized>(&mut self, tuple: &mut T) {
        for i in 0..tuple.get_column_count() {
            // Reading out of an in-range column of a pinned tuple cannot fail.
            self.values.push(tuple.get_column_value(i).unwrap_or(Literal::Null));
        }
    }

    /// The number of values in the tuple.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the tuple holds no values at all.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// A copy of the tuple's values, in column order.
    pub fn values(&self) -> Vec<Literal> {
        self.values.clone()
    }

    /// Borrows the value at the given column index.
    pub fn get(&self, index: usize) -> Option<&Literal> {
        self.values.get(index)
    }
}

// Tuple literals serve as grouping keys, so they hash by their values.
impl Eq for TupleLiteral {}

impl Hash for TupleLiteral {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.values.hash(state);
    }
}

impl Pinnable for TupleLiteral {
    fn pin(&mut self) {}

    fn unpin(&mut self) -> Result<(), PinError> {
        Ok(())
    }

    fn get_pin_count(&self) -> u32 {
        0
    }
}

impl Tuple for TupleLiteral {
    fn is_disk_backed(&self) -> bool {
        false
    }

    fn is_null_value(&self, col_index: usize) -> Result<bool, TupleError> {
        match self.values.get(col_index) {
            Some(value) => Ok(*value == Literal::Null),
            None => Err(TupleError::InvalidColumnIndex(col_index, self.values.len())),
        }
    }

    fn get_column_count(&self) -> usize {
        self.values.len()
    }

    fn get_column_value(&mut self, col_index: usize) -> Result<Literal, TupleError> {
        match self.values.get(col_index) {
            Some(value) => Ok(value.clone()),
            None => Err(TupleError::InvalidColumnIndex(col_index, self.values.len())),
        }
    }
}

impl ::std::fmt::Display for TupleLiteral {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        write!(f, "TL[")?;
        let num_columns = self.values.len();
        for i in 0..num_columns {
            write!(f, "{}", self.values[i])?;
            if i < num_columns - 1 {
                write!(f, ",")?;
            }
        }
        write!(f, "]")
    }
}

impl From<TupleLiteral> for Vec<String> {
    fn from(tl: TupleLiteral) -> Vec<String> {
        tl.values.iter().map(|v| format!("{}", v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::expressions::Literal;
    use ::storage::Tuple;

    #[test]
    fn test_append_and_read() {
        let mut first = TupleLiteral::from_iter(vec![Literal::Int(1), Literal::Null]);
        let mut combined = TupleLiteral::from_tuple(&mut first);
        combined.add_value(Literal::String("x".into()));

        assert_eq!(3, combined.get_column_count());
        assert_eq!(Ok(Literal::Int(1)), combined.get_column_value(0));
        assert_eq!(Ok(true), combined.is_null_value(1));
        assert_eq!(Ok(false), combined.is_null_value(2));
    }

    #[test]
    fn test_null_padding() {
        let padded = TupleLiteral::null(3);
        assert_eq!(3, padded.len());
        assert!(padded.values().iter().all(|v| *v == Literal::Null));
    }

    #[test]
    fn test_out_of_range() {
        let mut tuple = TupleLiteral::from_iter(vec![Literal::Int(1)]);
        assert!(tuple.get_column_value(1).is_err());
        assert!(tuple.is_null_value(1).is_err());
    }
}
