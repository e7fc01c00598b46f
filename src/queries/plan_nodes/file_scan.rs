//! This module provides the file scan plan node.

use std::cell::RefCell;
use std::rc::Rc;

use ::Schema;
use ::expressions::{Environment, Expression};
use ::queries::plan_nodes::{PlanCost, PlanNode, is_tuple_selected};
use ::queries::planning::PlanResult;
use ::stats::{ColumnStats, estimate_selectivity, update_stats};
use ::storage::{Pinnable, Table, TupleLiteral};
use ::storage::tuple_files::HeapFilePageTuple;

/// A select plan-node that scans a tuple file, checking the optional predicate against each
/// tuple in the file.
///
/// The scan holds the current tuple pinned; advancing to the next tuple unpins the previous
/// one, and `clean_up` unpins whatever is still held, so a completed scan leaves no pins
/// behind.
pub struct FileScanNode {
    table: Rc<RefCell<Table>>,
    /// The predicate to filter the scan with; conjuncts pushed down by the planner land here.
    pub predicate: Option<Expression>,
    environment: Option<Environment>,
    current_tuple: Option<HeapFilePageTuple>,
    done: bool,
    schema: Option<Schema>,
    cost: Option<PlanCost>,
    column_stats: Vec<ColumnStats>,
}

impl FileScanNode {
    /// Instantiate a new file scan node.
    ///
    /// # Arguments
    /// * table - The table to scan.
    /// * predicate - The predicate to filter on, if any.
    pub fn new(table: Rc<RefCell<Table>>, predicate: Option<Expression>) -> FileScanNode {
        FileScanNode {
            table: table,
            predicate: predicate,
            environment: None,
            current_tuple: None,
            done: false,
            schema: None,
            cost: None,
            column_stats: Vec::new(),
        }
    }

    fn unpin_current(&mut self) -> PlanResult<()> {
        if let Some(mut tuple) = self.current_tuple.take() {
            tuple.unpin()?;
        }
        Ok(())
    }

    fn advance_current_tuple(&mut self) -> PlanResult<()> {
        let next = {
            let mut table = self.table.borrow_mut();
            match self.current_tuple {
                Some(ref tuple) => table.tuple_file.get_next_tuple(tuple)?,
                None => table.tuple_file.get_first_tuple()?,
            }
        };

        // The previous tuple is released only after the next one is in hand.
        self.unpin_current()?;
        self.current_tuple = next;
        Ok(())
    }
}

impl PlanNode for FileScanNode {
    fn get_schema(&self) -> Schema {
        self.schema.clone().unwrap_or_else(Schema::new)
    }

    fn get_cost(&self) -> Option<PlanCost> {
        self.cost.clone()
    }

    fn get_column_stats(&self) -> Vec<ColumnStats> {
        self.column_stats.clone()
    }

    fn prepare(&mut self) -> PlanResult<()> {
        let (schema, table_stats, mut column_stats) = {
            let table = self.table.borrow();
            (table.tuple_file.schema.clone(),
             table.tuple_file.table_stats.clone(),
             table.tuple_file.column_stats.clone())
        };

        let num_tuples = table_stats.estimated_num_tuples();
        let selectivity = match self.predicate {
            Some(ref predicate) => {
                estimate_selectivity(predicate, &schema, &table_stats, &column_stats)
            }
            None => 1.0,
        };

        if let Some(ref predicate) = self.predicate {
            update_stats(predicate, &schema, &mut column_stats);
        }

        self.cost = Some(PlanCost {
            num_tuples: num_tuples * selectivity,
            tuple_size: table_stats.estimated_tuple_size(),
            cpu_cost: num_tuples,
            num_block_ios: table_stats.num_data_pages as u64,
            num_large_seeks: 1,
        });
        self.schema = Some(schema);
        self.column_stats = column_stats;
        Ok(())
    }

    fn initialize(&mut self) -> PlanResult<()> {
        self.unpin_current()?;
        self.done = false;
        Ok(())
    }

    fn get_next_tuple(&mut self) -> PlanResult<Option<TupleLiteral>> {
        if self.schema.is_none() {
            return Err(::queries::planning::PlanError::NodeNotPrepared);
        }
        if self.done {
            return Ok(None);
        }

        // Continue to advance the current tuple until one satisfies the predicate.
        loop {
            self.advance_current_tuple()?;

            let literal = match self.current_tuple {
                Some(ref mut tuple) => TupleLiteral::from_tuple(tuple),
                None => {
                    self.done = true;
                    return Ok(None);
                }
            };

            let selected = match self.predicate {
                Some(ref predicate) => {
                    is_tuple_selected(predicate,
                                      self.schema.as_ref().unwrap(),
                                      &literal,
                                      &self.environment)?
                }
                None => true,
            };

            if selected {
                return Ok(Some(literal));
            }
        }
    }

    fn clean_up(&mut self) -> PlanResult<()> {
        self.unpin_current()?;
        self.done = false;
        Ok(())
    }

    fn set_environment(&mut self, env: Environment) {
        self.environment = Some(env);
    }

    #[inline]
    fn has_predicate(&self) -> bool {
        true
    }

    #[inline]
    fn get_predicate(&self) -> Option<Expression> {
        self.predicate.clone()
    }

    fn set_predicate(&mut self, predicate: Expression) -> PlanResult<()> {
        self.predicate = Some(predicate);
        Ok(())
    }

    fn explain(&self) -> String {
        let table = self.table.borrow();
        let mut line = format!("FileScan[table: {}", table.name);
        if let Some(ref predicate) = self.predicate {
            line.push_str(&format!(", pred: {}", predicate));
        }
        line.push(']');
        if let Some(ref cost) = self.cost {
            line.push_str(&format!(" {}", cost));
        }
        line
    }
}
