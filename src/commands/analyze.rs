//! The `ANALYZE` command.

use std::io::Write;

use ::Server;
use ::commands::{Command, CommandResult};

#[derive(Debug, Clone, PartialEq)]
/// A command that recomputes and persists the statistics of one or more tables.
pub struct AnalyzeCommand {
    /// The names of the tables to analyze.
    pub table_names: Vec<String>,
}

impl AnalyzeCommand {
    /// Creates an `ANALYZE` command over the given tables.
    pub fn new(table_names: Vec<String>) -> AnalyzeCommand {
        AnalyzeCommand { table_names: table_names }
    }
}

impl Command for AnalyzeCommand {
    fn execute(&mut self, server: &mut Server, out: &mut ::std::io::Write) -> CommandResult {
        for name in self.table_names.iter() {
            let table = server.table_manager.get_table(&server.storage, name.as_str())?;
            table.borrow_mut().tuple_file.analyze()?;
            let _ = writeln!(out, "Analyzed table {}.", name);
        }
        Ok(None)
    }
}
