//! The `UPDATE` command.

use std::io::Write;

use ::Server;
use ::commands::{Command, CommandResult, ExecutionError};
use ::expressions::{Environment, Expression, Literal};
use ::storage::{Pinnable, Tuple, TupleLiteral};

#[derive(Debug, Clone, PartialEq)]
/// A command that updates the rows of a table matching an optional `WHERE` predicate.
///
/// The command runs in two phases: a scan identifies the matching rows and computes their new
/// values, and then each identified row is re-fetched by its (page, slot) reference and
/// rewritten.  This keeps the scan's view stable even when an update relocates a row.
pub struct UpdateCommand {
    /// The name of the table being updated.
    pub table_name: String,
    /// (column name, value expression) assignments; expressions may reference the row's
    /// current column values.
    pub assignments: Vec<(String, Expression)>,
    /// The predicate selecting the rows to update; `None` updates every row.
    pub where_expr: Option<Expression>,
}

impl UpdateCommand {
    /// Creates an `UPDATE` command.
    pub fn new<S: Into<String>>(table_name: S,
                                assignments: Vec<(String, Expression)>,
                                where_expr: Option<Expression>)
                                -> UpdateCommand {
        UpdateCommand {
            table_name: table_name.into(),
            assignments: assignments,
            where_expr: where_expr,
        }
    }
}

impl Command for UpdateCommand {
    fn execute(&mut self, server: &mut Server, out: &mut ::std::io::Write) -> CommandResult {
        let table = server.table_manager.get_table(&server.storage, self.table_name.as_str())?;
        let schema = table.borrow().tuple_file.schema.clone();

        // Resolve the assigned columns once.
        let mut assignment_indexes: Vec<(usize, Expression)> = Vec::new();
        for &(ref name, ref expr) in self.assignments.iter() {
            let matches = schema.find_columns(&(None, Some(name.clone())));
            match matches.len() {
                1 => assignment_indexes.push((matches[0].0, expr.clone())),
                0 => {
                    return Err(ExecutionError::Plan(
                        ::queries::PlanError::UnknownColumn((None, Some(name.clone())))));
                }
                _ => {
                    return Err(ExecutionError::Plan(
                        ::queries::PlanError::AmbiguousColumn((None, Some(name.clone())))));
                }
            }
        }

        // Phase 1: scan for matching rows and compute their replacement values.
        let mut updates: Vec<((u32, u16), TupleLiteral)> = Vec::new();
        {
            let mut table = table.borrow_mut();
            let mut cur = table.tuple_file.get_first_tuple()?;
            while let Some(mut tuple) = cur {
                if server.is_cancel_requested() {
                    tuple.unpin()?;
                    return Err(ExecutionError::Cancelled);
                }

                let current = TupleLiteral::from_tuple(&mut tuple);
                let mut env = Environment::new();
                env.add_tuple(schema.clone(), current.clone());

                let selected = match self.where_expr {
                    Some(ref predicate) => {
                        predicate.evaluate(&mut Some(&mut env))? == Literal::True
                    }
                    None => true,
                };

                if selected {
                    let mut new_values = current.values();
                    for &(index, ref expr) in assignment_indexes.iter() {
                        new_values[index] = expr.evaluate(&mut Some(&mut env))?;
                    }
                    updates.push((tuple.location(), TupleLiteral::from_iter(new_values)));
                }

                let next = table.tuple_file.get_next_tuple(&tuple)?;
                tuple.unpin()?;
                cur = next;
            }
        }

        // Phase 2: apply the updates through fresh (page, slot) references.
        let count = updates.len();
        {
            let mut table = table.borrow_mut();
            for ((page_no, slot), mut new_values) in updates {
                let mut tuple = table.tuple_file.get_tuple_at(page_no, slot)?;
                let moved = table.tuple_file.update_tuple(&tuple, &mut new_values)?;
                tuple.unpin()?;
                if let Some(mut moved) = moved {
                    moved.unpin()?;
                }
            }
        }

        let _ = writeln!(out, "Updated {} row(s) in {}.", count, self.table_name);
        Ok(None)
    }
}
