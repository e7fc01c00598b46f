//! The `DROP TABLE` command.

use std::io::Write;

use ::Server;
use ::commands::{Command, CommandResult};

#[derive(Debug, Clone, PartialEq)]
/// A command for dropping a table and deleting its data file.
pub struct DropCommand {
    /// The name of the table being dropped.
    pub table_name: String,
    /// Whether `IF EXISTS` was specified, making a missing table a no-op rather than an error.
    pub if_exists: bool,
}

impl DropCommand {
    /// Creates a `DROP TABLE` command.
    pub fn new<S: Into<String>>(table_name: S) -> DropCommand {
        DropCommand {
            table_name: table_name.into(),
            if_exists: false,
        }
    }
}

impl Command for DropCommand {
    fn execute(&mut self, server: &mut Server, out: &mut ::std::io::Write) -> CommandResult {
        if self.if_exists &&
           !server.table_manager.table_exists(&server.storage, self.table_name.as_str()) {
            let _ = writeln!(out, "Table {} does not exist; nothing done.", self.table_name);
            return Ok(None);
        }

        server.table_manager.drop_table(&server.storage, self.table_name.as_str())?;
        let _ = writeln!(out, "Dropped table {}.", self.table_name);
        Ok(None)
    }
}
