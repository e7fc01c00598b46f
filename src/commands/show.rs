//! The `SHOW` family of commands: `SHOW TABLES`, `SHOW TABLE ... STATS`, `SHOW PROPERTIES`.

use std::io::Write;

use ::Server;
use ::commands::{Command, CommandResult, ExecutionError};
use ::commands::utils::print_table;
use ::expressions::Literal;
use ::storage::TupleLiteral;

#[derive(Debug, Clone, PartialEq)]
/// The different `SHOW` commands.
pub enum ShowCommand {
    /// `SHOW TABLES`: lists the tables in the database.
    Tables,
    /// `SHOW TABLE t STATS`: shows the stored statistics of a table.
    TableStats(String),
    /// `SHOW PROPERTIES [LIKE '...']`: lists configuration properties, optionally filtered by
    /// a substring.
    Properties(Option<String>),
}

impl Command for ShowCommand {
    fn execute(&mut self, server: &mut Server, out: &mut ::std::io::Write) -> CommandResult {
        match *self {
            ShowCommand::Tables => {
                let names = server.table_manager.list_tables(&server.storage)?;
                let rows: Vec<Vec<String>> = names.iter().map(|n| vec![n.clone()]).collect();
                print_table(out, &["TABLE NAME".to_string()], &rows)
                    .map_err(|e| ExecutionError::PrintError(format!("{}", e)))?;

                let tuples = names.into_iter()
                    .map(|n| TupleLiteral::from_iter(vec![Literal::String(n)]))
                    .collect();
                Ok(Some(tuples))
            }
            ShowCommand::TableStats(ref name) => {
                let table = server.table_manager.get_table(&server.storage, name.as_str())?;
                let table = table.borrow();

                let stats = &table.tuple_file.table_stats;
                let _ = writeln!(out,
                                 "Statistics for table {}: {} data page(s), {} tuple(s), \
                                  average tuple size {} byte(s).",
                                 name,
                                 stats.num_data_pages,
                                 stats.num_tuples
                                     .map(|t| t.to_string())
                                     .unwrap_or_else(|| "unknown".to_string()),
                                 stats.avg_tuple_size
                                     .map(|s| format!("{:.1}", s))
                                     .unwrap_or_else(|| "unknown".to_string()));

                let headers = vec!["COLUMN".to_string(),
                                   "UNIQUE".to_string(),
                                   "NULLS".to_string(),
                                   "MIN".to_string(),
                                   "MAX".to_string()];
                let display_count =
                    |v: &Option<u32>| v.map(|n| n.to_string()).unwrap_or_else(|| "?".into());
                let display_value = |v: &Option<Literal>| {
                    v.as_ref().map(|l| format!("{}", l)).unwrap_or_else(|| "?".into())
                };

                let rows: Vec<Vec<String>> = table.tuple_file
                    .schema
                    .iter()
                    .zip(table.tuple_file.column_stats.iter())
                    .map(|(info, stats)| {
                        vec![info.name.clone().unwrap_or_else(|| "?".into()),
                             display_count(&stats.num_unique_values),
                             display_count(&stats.num_null_values),
                             display_value(&stats.min_value),
                             display_value(&stats.max_value)]
                    })
                    .collect();
                print_table(out, &headers, &rows)
                    .map_err(|e| ExecutionError::PrintError(format!("{}", e)))?;
                Ok(None)
            }
            ShowCommand::Properties(ref filter) => {
                let entries = server.properties.list(filter.as_ref().map(String::as_str));
                let rows: Vec<Vec<String>> = entries.iter()
                    .map(|&(ref name, ref value)| vec![name.clone(), format!("{}", value)])
                    .collect();
                print_table(out,
                            &["PROPERTY".to_string(), "VALUE".to_string()],
                            &rows)
                    .map_err(|e| ExecutionError::PrintError(format!("{}", e)))?;

                let tuples = entries.into_iter()
                    .map(|(name, value)| {
                        TupleLiteral::from_iter(vec![Literal::String(name),
                                                     Literal::String(format!("{}", value))])
                    })
                    .collect();
                Ok(Some(tuples))
            }
        }
    }
}
