//! The `CREATE TABLE` command.

use std::io::Write;

use ::Server;
use ::commands::{Command, CommandResult};
use ::relations::ColumnInfo;
use ::relations::schema::KeyConstraint;
use ::Schema;

#[derive(Debug, Clone, PartialEq)]
/// A command for creating a new table with a given schema.
pub struct CreateCommand {
    /// The name of the table being created.
    pub table_name: String,
    /// The table's columns, in declaration order.
    pub columns: Vec<ColumnInfo>,
    /// The key constraints declared on the table.
    pub constraints: Vec<KeyConstraint>,
    /// Whether `IF NOT EXISTS` was specified, making an existing table a no-op rather than an
    /// error.
    pub if_not_exists: bool,
}

impl CreateCommand {
    /// Creates a `CREATE TABLE` command with no constraints.
    pub fn new<S: Into<String>>(table_name: S, columns: Vec<ColumnInfo>) -> CreateCommand {
        CreateCommand {
            table_name: table_name.into(),
            columns: columns,
            constraints: vec![],
            if_not_exists: false,
        }
    }
}

impl Command for CreateCommand {
    fn execute(&mut self, server: &mut Server, out: &mut ::std::io::Write) -> CommandResult {
        if self.if_not_exists &&
           server.table_manager.table_exists(&server.storage, self.table_name.as_str()) {
            let _ = writeln!(out, "Table {} already exists; nothing done.", self.table_name);
            return Ok(None);
        }

        // Columns are stored qualified by their table so joins resolve names cleanly.
        let mut schema = Schema::new();
        for column in self.columns.iter() {
            let mut column = column.clone();
            if column.table_name.is_none() {
                column.table_name = Some(self.table_name.clone());
            }
            schema.add_column(column)?;
        }
        for constraint in self.constraints.iter() {
            schema.add_key_constraint(constraint.clone())?;
        }

        let page_size = server.current_pagesize();
        server.table_manager
            .create_table(&server.storage, self.table_name.as_str(), schema, page_size)?;

        let _ = writeln!(out, "Created table {}.", self.table_name);
        Ok(None)
    }
}
