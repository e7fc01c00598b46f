//! The `EXPLAIN` command.

use std::io::Write;

use ::Server;
use ::commands::{Command, CommandResult};
use ::expressions::SelectClause;
use ::queries::{CostBasedPlanner, PlanNode, Planner};

#[derive(Debug, Clone, PartialEq)]
/// A command that plans a query and prints the chosen execution plan with its cost estimates,
/// without running it.
pub struct ExplainCommand {
    clause: SelectClause,
}

impl ExplainCommand {
    /// Creates an `EXPLAIN` command around a `SELECT` clause.
    pub fn new(clause: SelectClause) -> ExplainCommand {
        ExplainCommand { clause: clause }
    }
}

impl Command for ExplainCommand {
    fn execute(&mut self, server: &mut Server, out: &mut ::std::io::Write) -> CommandResult {
        let plan = {
            let mut planner = CostBasedPlanner::new(&server.storage, &mut server.table_manager);
            planner.make_plan(self.clause.clone(), None)?
        };

        let _ = writeln!(out, "Execution plan:");
        let _ = writeln!(out, "{}", plan.explain());
        Ok(None)
    }
}
