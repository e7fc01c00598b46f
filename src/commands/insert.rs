//! The `INSERT` command.

use std::io::Write;

use std::cmp::Ordering;

use ::Server;
use ::commands::{Command, CommandResult, ExecutionError};
use ::expressions::{Expression, Literal};
use ::queries::plan_nodes::{PlanNode, TupleBagNode};
use ::relations::schema::{KeyConstraint, KeyType};
use ::server::properties;
use ::storage::{Pinnable, Tuple, TupleLiteral};

#[derive(Debug, Clone, PartialEq)]
/// A command for inserting rows into a table.  Each row is a list of value expressions, which
/// must be constant.
pub struct InsertCommand {
    /// The name of the table receiving the rows.
    pub table_name: String,
    /// The rows to insert, one expression list per row.
    pub rows: Vec<Vec<Expression>>,
}

impl InsertCommand {
    /// Creates an `INSERT` command.
    pub fn new<S: Into<String>>(table_name: S, rows: Vec<Vec<Expression>>) -> InsertCommand {
        InsertCommand {
            table_name: table_name.into(),
            rows: rows,
        }
    }
}

/// Checks one new row against a key constraint: primary-key columns may not be NULL, and no
/// existing row may share the new row's key values.
fn check_key_constraint(table: &mut ::storage::Table,
                        constraint: &KeyConstraint,
                        key_indexes: &[usize],
                        new_row: &TupleLiteral)
                        -> Result<(), ExecutionError> {
    let columns = constraint.columns.join(", ");

    let new_key: Vec<Literal> = key_indexes.iter()
        .map(|&i| new_row.get(i).cloned().unwrap_or(Literal::Null))
        .collect();

    if constraint.kind == KeyType::Primary {
        for (value, name) in new_key.iter().zip(constraint.columns.iter()) {
            if *value == Literal::Null {
                return Err(ExecutionError::NullInNotNullColumn(name.clone()));
            }
        }
    }

    // NULLs never compare equal, so a key containing one cannot collide.
    if new_key.iter().any(|v| *v == Literal::Null) {
        return Ok(());
    }

    let mut cur = table.tuple_file.get_first_tuple()?;
    while let Some(mut tuple) = cur {
        let mut all_equal = true;
        for (&index, expected) in key_indexes.iter().zip(new_key.iter()) {
            let value = tuple.get_column_value(index)?;
            if value.compare(expected) != Some(Ordering::Equal) {
                all_equal = false;
                break;
            }
        }
        if all_equal {
            tuple.unpin()?;
            return Err(ExecutionError::UniquenessViolation(columns));
        }

        let next = table.tuple_file.get_next_tuple(&tuple)?;
        tuple.unpin()?;
        cur = next;
    }
    Ok(())
}

impl Command for InsertCommand {
    fn execute(&mut self, server: &mut Server, out: &mut ::std::io::Write) -> CommandResult {
        let table = server.table_manager.get_table(&server.storage, self.table_name.as_str())?;

        let schema = table.borrow().tuple_file.schema.clone();
        let num_columns = schema.num_columns();

        // Evaluate every row's value expressions up front; they must be constants.
        let mut literal_rows: Vec<TupleLiteral> = Vec::with_capacity(self.rows.len());
        for row in self.rows.iter() {
            if row.len() != num_columns {
                return Err(ExecutionError::WrongValueCount(num_columns, row.len()));
            }
            let mut tuple = TupleLiteral::new();
            for expr in row.iter() {
                tuple.add_value(expr.evaluate(&mut None)?);
            }
            literal_rows.push(tuple);
        }

        let enforce_keys = server.properties
            .get(properties::PROP_ENFORCE_KEY_CONSTRAINTS)
            .ok()
            .and_then(::server::PropertyValue::as_bool)
            .unwrap_or(true);

        // Resolve the key columns once, outside the per-row loop.
        let constraints: Vec<(KeyConstraint, Vec<usize>)> = if enforce_keys {
            schema.key_constraints()
                .iter()
                .filter(|c| c.kind != KeyType::Foreign)
                .map(|constraint| {
                    let indexes: Vec<usize> = constraint.columns
                        .iter()
                        .filter_map(|name| {
                            schema.find_columns(&(None, Some(name.clone())))
                                .into_iter()
                                .next()
                                .map(|(index, _)| index)
                        })
                        .collect();
                    (constraint.clone(), indexes)
                })
                .collect()
        } else {
            vec![]
        };

        // The rows flow through a tuple-bag leaf, exactly like any other plan's row source.
        let mut source = TupleBagNode::new(schema.clone(), literal_rows);
        source.prepare()?;
        source.initialize()?;

        let mut count = 0;
        while let Some(mut row) = source.get_next_tuple()? {
            let mut table = table.borrow_mut();
            for &(ref constraint, ref key_indexes) in constraints.iter() {
                check_key_constraint(&mut table, constraint, key_indexes, &row)?;
            }

            let mut stored = table.tuple_file.add_tuple(&mut row)?;
            stored.unpin()?;
            count += 1;
        }
        source.clean_up()?;

        let _ = writeln!(out, "Inserted {} row(s) into {}.", count, self.table_name);
        Ok(None)
    }
}
