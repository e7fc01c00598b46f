//! The `DELETE` command.

use std::io::Write;

use ::Server;
use ::commands::{Command, CommandResult, ExecutionError};
use ::expressions::{Environment, Expression, Literal};
use ::storage::{Pinnable, Tuple, TupleLiteral};

#[derive(Debug, Clone, PartialEq)]
/// A command that deletes the rows of a table matching an optional `WHERE` predicate.
///
/// Like [`UpdateCommand`](struct.UpdateCommand.html), deletion is two-phase: the scan collects
/// the matching (page, slot) references, then each row is re-fetched and deleted, so earlier
/// deletions cannot disturb the scan.
pub struct DeleteCommand {
    /// The name of the table rows are deleted from.
    pub table_name: String,
    /// The predicate selecting the rows to delete; `None` deletes every row.
    pub where_expr: Option<Expression>,
}

impl DeleteCommand {
    /// Creates a `DELETE` command.
    pub fn new<S: Into<String>>(table_name: S, where_expr: Option<Expression>) -> DeleteCommand {
        DeleteCommand {
            table_name: table_name.into(),
            where_expr: where_expr,
        }
    }
}

impl Command for DeleteCommand {
    fn execute(&mut self, server: &mut Server, out: &mut ::std::io::Write) -> CommandResult {
        let table = server.table_manager.get_table(&server.storage, self.table_name.as_str())?;
        let schema = table.borrow().tuple_file.schema.clone();

        // Phase 1: find the rows to delete.
        let mut locations: Vec<(u32, u16)> = Vec::new();
        {
            let mut table = table.borrow_mut();
            let mut cur = table.tuple_file.get_first_tuple()?;
            while let Some(mut tuple) = cur {
                if server.is_cancel_requested() {
                    tuple.unpin()?;
                    return Err(ExecutionError::Cancelled);
                }

                let selected = match self.where_expr {
                    Some(ref predicate) => {
                        let current = TupleLiteral::from_tuple(&mut tuple);
                        let mut env = Environment::new();
                        env.add_tuple(schema.clone(), current);
                        predicate.evaluate(&mut Some(&mut env))? == Literal::True
                    }
                    None => true,
                };
                if selected {
                    locations.push(tuple.location());
                }

                let next = table.tuple_file.get_next_tuple(&tuple)?;
                tuple.unpin()?;
                cur = next;
            }
        }

        // Phase 2: delete them through fresh references.
        let count = locations.len();
        {
            let mut table = table.borrow_mut();
            for (page_no, slot) in locations {
                let mut tuple = table.tuple_file.get_tuple_at(page_no, slot)?;
                table.tuple_file.delete_tuple(&tuple)?;
                tuple.unpin()?;
            }
        }

        let _ = writeln!(out, "Deleted {} row(s) from {}.", count, self.table_name);
        Ok(None)
    }
}
