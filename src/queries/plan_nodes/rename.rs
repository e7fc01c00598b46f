//! This module provides the rename plan node, which gives its child's output a new table name.
//! It performs no work per tuple; only the schema changes.

use ::Schema;
use ::expressions::Environment;
use ::queries::plan_nodes::{PlanCost, PlanNode, indent_explain};
use ::queries::planning::PlanResult;
use ::stats::ColumnStats;
use ::storage::TupleLiteral;

/// A plan node that renames the table qualifier of its child's schema, e.g. for `FROM t AS x`
/// or for derived tables.
pub struct RenameNode {
    child: Box<PlanNode>,
    table_name: String,
    schema: Option<Schema>,
}

impl RenameNode {
    /// Instantiate a new rename node.
    ///
    /// # Arguments
    /// * child - the node whose output is being renamed.
    /// * table_name - the new table qualifier.
    pub fn new<S: Into<String>>(child: Box<PlanNode>, table_name: S) -> RenameNode {
        RenameNode {
            child: child,
            table_name: table_name.into(),
            schema: None,
        }
    }
}

impl PlanNode for RenameNode {
    fn get_schema(&self) -> Schema {
        self.schema.clone().unwrap_or_else(Schema::new)
    }

    fn get_cost(&self) -> Option<PlanCost> {
        self.child.get_cost()
    }

    fn get_column_stats(&self) -> Vec<ColumnStats> {
        self.child.get_column_stats()
    }

    fn prepare(&mut self) -> PlanResult<()> {
        self.child.prepare()?;

        let mut schema = self.child.get_schema();
        schema.set_table_name(self.table_name.clone())?;
        self.schema = Some(schema);
        Ok(())
    }

    fn initialize(&mut self) -> PlanResult<()> {
        self.child.initialize()
    }

    fn get_next_tuple(&mut self) -> PlanResult<Option<TupleLiteral>> {
        self.child.get_next_tuple()
    }

    fn clean_up(&mut self) -> PlanResult<()> {
        self.child.clean_up()
    }

    fn set_environment(&mut self, env: Environment) {
        self.child.set_environment(env);
    }

    fn results_ordered_by(&self) -> Option<Vec<::expressions::OrderByExpression>> {
        self.child.results_ordered_by()
    }

    fn explain(&self) -> String {
        format!("Rename[as: {}]\n{}",
                self.table_name,
                indent_explain(&self.child.explain()))
    }
}
