//! The `SELECT` command.

use std::io::Write;

use ::Server;
use ::commands::{Command, CommandResult, ExecutionError};
use ::commands::utils::print_table;
use ::expressions::SelectClause;
use ::queries::{CostBasedPlanner, PlanNode, Planner};
use ::relations::column_name_to_string;
use ::storage::TupleLiteral;

#[derive(Debug, Clone, PartialEq)]
/// A command for running a query and delivering its result rows.
pub struct SelectCommand {
    clause: SelectClause,
}

impl SelectCommand {
    /// Creates a new select command around a `SELECT` clause.
    pub fn new(select_clause: SelectClause) -> SelectCommand {
        SelectCommand { clause: select_clause }
    }
}

impl Command for SelectCommand {
    fn execute(&mut self, server: &mut Server, out: &mut ::std::io::Write) -> CommandResult {
        debug!("Planning SelectClause: {}", self.clause);

        let mut plan = {
            let mut planner = CostBasedPlanner::new(&server.storage, &mut server.table_manager);
            planner.make_plan(self.clause.clone(), None)?
        };

        let col_names: Vec<String> = plan.get_schema()
            .iter()
            .map(|info| column_name_to_string(&info.get_column_name()))
            .collect();

        // Drive the iterator pipeline, polling for cooperative cancellation between tuples.
        plan.initialize()?;
        let mut tuples: Vec<TupleLiteral> = Vec::new();
        loop {
            if server.is_cancel_requested() {
                let _ = plan.clean_up();
                return Err(ExecutionError::Cancelled);
            }
            match plan.get_next_tuple() {
                Ok(Some(tuple)) => tuples.push(tuple),
                Ok(None) => break,
                Err(e) => {
                    let _ = plan.clean_up();
                    return Err(e.into());
                }
            }
        }
        plan.clean_up()?;

        if tuples.is_empty() {
            let _ = writeln!(out, "No rows selected.");
        } else {
            let rows: Vec<Vec<String>> = tuples.iter().map(|t| t.clone().into()).collect();
            print_table(out, &col_names, &rows)
                .map_err(|e| ExecutionError::PrintError(format!("{}", e)))?;
            let _ = writeln!(out, "{} row(s) selected.", tuples.len());
        }

        Ok(Some(tuples))
    }
}
