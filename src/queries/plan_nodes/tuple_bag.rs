//! This module provides a leaf plan node that emits a fixed collection of in-memory tuples.

use ::Schema;
use ::expressions::Environment;
use ::queries::plan_nodes::{PlanCost, PlanNode};
use ::queries::planning::{PlanError, PlanResult};
use ::stats::ColumnStats;
use ::storage::TupleLiteral;

/// A leaf node producing a caller-supplied list of tuples.  `INSERT ... VALUES` planning uses
/// it as the row source, and tests use it to drive the other plan nodes with known inputs.
pub struct TupleBagNode {
    schema: Schema,
    tuples: Vec<TupleLiteral>,
    position: usize,
    marked_position: Option<usize>,
}

impl TupleBagNode {
    /// Instantiate a new tuple-bag node.
    ///
    /// # Arguments
    /// * schema - the schema the tuples follow.
    /// * tuples - the tuples to emit, in order.
    pub fn new(schema: Schema, tuples: Vec<TupleLiteral>) -> TupleBagNode {
        TupleBagNode {
            schema: schema,
            tuples: tuples,
            position: 0,
            marked_position: None,
        }
    }
}

impl PlanNode for TupleBagNode {
    fn get_schema(&self) -> Schema {
        self.schema.clone()
    }

    fn get_cost(&self) -> Option<PlanCost> {
        Some(PlanCost {
            num_tuples: self.tuples.len() as f32,
            tuple_size: 32.0,
            cpu_cost: self.tuples.len() as f32,
            num_block_ios: 0,
            num_large_seeks: 0,
        })
    }

    fn get_column_stats(&self) -> Vec<ColumnStats> {
        vec![ColumnStats::unknown(); self.schema.num_columns()]
    }

    fn prepare(&mut self) -> PlanResult<()> {
        Ok(())
    }

    fn initialize(&mut self) -> PlanResult<()> {
        self.position = 0;
        self.marked_position = None;
        Ok(())
    }

    fn get_next_tuple(&mut self) -> PlanResult<Option<TupleLiteral>> {
        if self.position < self.tuples.len() {
            let tuple = self.tuples[self.position].clone();
            self.position += 1;
            Ok(Some(tuple))
        } else {
            Ok(None)
        }
    }

    fn clean_up(&mut self) -> PlanResult<()> {
        Ok(())
    }

    fn set_environment(&mut self, _env: Environment) {}

    fn supports_marking(&self) -> bool {
        true
    }

    fn mark_current_position(&mut self) -> PlanResult<()> {
        self.marked_position = Some(self.position);
        Ok(())
    }

    fn reset_to_last_mark(&mut self) -> PlanResult<()> {
        match self.marked_position {
            Some(position) => {
                self.position = position;
                Ok(())
            }
            None => Err(PlanError::MarkingNotSupported),
        }
    }

    fn explain(&self) -> String {
        format!("TupleBag[{} tuples]", self.tuples.len())
    }
}
