//! This module contains classes and utilities for storing environment information for NanoDB.
//! These environments are used for evaluating expressions.

use std::default::Default;

use ::{ColumnName, Schema};
use ::expressions::{ExpressionError, Literal};
use ::storage::{Tuple, TupleLiteral};

/// This class holds the environment for evaluating expressions that include symbols.  For
/// example, in the SQL command:
///
/// ```sql
/// SELECT a, b + 5 FROM t WHERE c < 20;
/// ```
///
/// all of the expressions refer to columns in the current tuple being considered from the table
/// `t`, and thus need to be able to access the current tuple.  This is the role that the
/// environment class serves.
///
/// An important detail about the environment is that a single tuple's schema can hold values from
/// multiple tables, such as when a tuple is produced as the result of a join operation between
/// two tables.
///
/// Environments can refer to parent environments, for cases where a query contains subqueries.
/// The subqueries can refer to the same table(s) as the outer query, and thus they need their own
/// environment to track that information.  This becomes especially useful with correlated
/// subqueries, as the inner query needs to be completely reevaluated for each value of the outer
/// query.
///
/// Matching a symbol name goes from child to parent.  If a child environment contains a value for
/// a particular symbol, that value is returned.  It is only if the child environment *doesn't*
/// contain a value that the parent environment is utilized.
#[derive(Clone, Debug, PartialEq)]
pub struct Environment {
    current_schemas: Vec<Schema>,
    current_tuples: Vec<TupleLiteral>,
    parent_envs: Vec<Environment>,
}

impl Environment {
    /// Instantiate a new environment.
    pub fn new() -> Environment {
        Default::default()
    }

    /// Add a parent environment.
    ///
    /// # Arguments
    /// * env - The environment to add as a parent.
    pub fn add_parent_env(&mut self, env: Environment) {
        self.parent_envs.push(env);
    }

    /// Adds a tuple to the environment with the given schema.
    ///
    /// # Arguments
    /// * schema - the schema for the specified tuple
    /// * tuple - the tuple to be added
    pub fn add_tuple<T: Tuple>(&mut self, schema: Schema, mut tuple: T) {
        self.current_schemas.push(schema);
        self.current_tuples.push(TupleLiteral::from_tuple(&mut tuple));
    }

    /// Adds a tuple to the environment with the given schema, given a reference to a tuple.
    ///
    /// # Arguments
    /// * schema - the schema for the specified tuple
    /// * tuple - the tuple to be added
    pub fn add_tuple_ref<T: Tuple + ?Sized>(&mut self, schema: Schema, tuple: &mut T) {
        self.current_schemas.push(schema);
        self.current_tuples.push(TupleLiteral::from_tuple(tuple));
    }

    /// Get the actual value at the specified column.
    ///
    /// # Arguments
    /// * col_name - the name of the column.
    ///
    /// # Errors
    /// Returns an `AmbiguousColumnName` error if the name matches more than one column in this
    /// environment, or a `CouldNotResolve` error if neither this environment nor any parent can
    /// resolve the name.
    pub fn get_column_value(&mut self, col_name: &ColumnName) -> Result<Literal, ExpressionError> {
        let mut found = false;
        let mut result: Option<Literal> = None;

        // First try to find it in the current environment.
        for i in 0..self.current_tuples.len() {
            let columns = self.current_schemas[i].find_columns(col_name);
            if columns.is_empty() {
                continue;
            }

            if found || columns.len() > 1 {
                return Err(ExpressionError::AmbiguousColumnName(col_name.clone()));
            }

            let value = self.current_tuples[i].get_column_value(columns[0].0)?;
            result = Some(value);
            found = true;
        }

        // If that doesn't work, try the parents.
        if !found {
            for parent in self.parent_envs.iter_mut() {
                if let Ok(value) = parent.get_column_value(col_name) {
                    result = Some(value);
                    found = true;
                    break;
                }
            }
        }

        match result {
            Some(value) => Ok(value),
            None => Err(ExpressionError::CouldNotResolve(col_name.clone())),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment {
            current_schemas: vec![],
            current_tuples: vec![],
            parent_envs: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::{ColumnInfo, ColumnName, ColumnType, Schema};
    use ::expressions::ExpressionError::*;
    use ::expressions::Literal::*;
    use ::storage::TupleLiteral;

    #[test]
    fn test_get_column_value() {
        let sch1 = Schema::with_columns(vec![
            ColumnInfo::with_table_name(ColumnType::Integer, "A", "FOO"),
            ColumnInfo::with_table_name(ColumnType::Double, "B", "FOO"),
        ])
            .unwrap();
        let sch2 = Schema::with_columns(vec![
            ColumnInfo::with_table_name(ColumnType::Integer, "A", "BAR"),
            ColumnInfo::with_table_name(ColumnType::Double, "C", "BAR"),
        ])
            .unwrap();

        let mut tup1 = TupleLiteral::from_iter(vec![Int(1), Double(1.5)]);
        let mut tup2 = TupleLiteral::from_iter(vec![Int(3), Double(2.5)]);

        let mut env1 = {
            let mut env = Environment::new();
            env.add_tuple_ref(sch1.clone(), &mut tup1);
            env
        };
        let mut env2 = {
            let mut env = Environment::new();
            env.add_tuple_ref(sch1.clone(), &mut tup1);
            env.add_tuple_ref(sch2.clone(), &mut tup2);
            env
        };

        let col_a: ColumnName = (None, Some("A".into()));
        let col_b: ColumnName = (None, Some("B".into()));
        let col_c: ColumnName = (None, Some("C".into()));
        let foo_a: ColumnName = (Some("FOO".into()), Some("A".into()));
        let bar_a: ColumnName = (Some("BAR".into()), Some("A".into()));
        let bar_c: ColumnName = (Some("BAR".into()), Some("C".into()));

        assert_eq!(Ok(Int(1)), env1.get_column_value(&foo_a));
        assert_eq!(Ok(Int(1)), env1.get_column_value(&col_a));
        assert_eq!(Ok(Double(1.5)), env1.get_column_value(&col_b));
        assert_eq!(Err(CouldNotResolve(bar_a.clone())), env1.get_column_value(&bar_a));

        assert_eq!(Ok(Int(1)), env2.get_column_value(&foo_a));
        assert_eq!(Ok(Int(3)), env2.get_column_value(&bar_a));
        assert_eq!(Ok(Double(2.5)), env2.get_column_value(&bar_c));
        assert_eq!(Err(AmbiguousColumnName(col_a.clone())),
                   env2.get_column_value(&col_a));
        assert_eq!(Ok(Double(2.5)), env2.get_column_value(&col_c));
    }

    #[test]
    fn test_parent_env_resolution() {
        let outer_schema = Schema::with_columns(vec![
            ColumnInfo::with_table_name(ColumnType::Integer, "A", "T1"),
        ])
            .unwrap();
        let inner_schema = Schema::with_columns(vec![
            ColumnInfo::with_table_name(ColumnType::Integer, "B", "T2"),
        ])
            .unwrap();

        let mut outer = Environment::new();
        outer.add_tuple_ref(outer_schema,
                            &mut TupleLiteral::from_iter(vec![Int(7)]));

        let mut inner = Environment::new();
        inner.add_tuple_ref(inner_schema,
                            &mut TupleLiteral::from_iter(vec![Int(70)]));
        inner.add_parent_env(outer);

        // Local resolution wins; missing names fall through to the parent.
        assert_eq!(Ok(Int(70)),
                   inner.get_column_value(&(None, Some("B".into()))));
        assert_eq!(Ok(Int(7)),
                   inner.get_column_value(&(Some("T1".into()), Some("A".into()))));
        assert_eq!(Ok(Int(7)), inner.get_column_value(&(None, Some("A".into()))));
    }
}
