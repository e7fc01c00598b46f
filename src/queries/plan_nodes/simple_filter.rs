//! This module provides the simple filter plan node, which applies a predicate to the tuples
//! its child produces.

use ::Schema;
use ::expressions::{Environment, Expression};
use ::queries::plan_nodes::{PlanCost, PlanNode, indent_explain, is_tuple_selected};
use ::queries::planning::{PlanError, PlanResult};
use ::stats::{ColumnStats, TableStats, estimate_selectivity, update_stats};
use ::storage::TupleLiteral;

/// A plan node that emits exactly those child tuples satisfying its predicate.
pub struct SimpleFilterNode {
    child: Box<PlanNode>,
    /// The predicate tuples must satisfy.
    pub predicate: Expression,
    environment: Option<Environment>,
    schema: Option<Schema>,
    cost: Option<PlanCost>,
    column_stats: Vec<ColumnStats>,
}

impl SimpleFilterNode {
    /// Instantiate a new filter node over the given child.
    pub fn new(child: Box<PlanNode>, predicate: Expression) -> SimpleFilterNode {
        SimpleFilterNode {
            child: child,
            predicate: predicate,
            environment: None,
            schema: None,
            cost: None,
            column_stats: Vec::new(),
        }
    }
}

impl PlanNode for SimpleFilterNode {
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
        self.child.prepare()?;

        let schema = self.child.get_schema();
        let mut column_stats = self.child.get_column_stats();
        let child_cost = self.child.get_cost().ok_or(PlanError::NodeNotPrepared)?;

        // Selectivity is estimated against the child's (already updated) statistics.
        let input_stats = TableStats {
            num_data_pages: 0,
            num_tuples: Some(child_cost.num_tuples as u32),
            avg_tuple_size: Some(child_cost.tuple_size),
        };
        let selectivity =
            estimate_selectivity(&self.predicate, &schema, &input_stats, &column_stats);
        update_stats(&self.predicate, &schema, &mut column_stats);

        self.cost = Some(PlanCost {
            num_tuples: child_cost.num_tuples * selectivity,
            tuple_size: child_cost.tuple_size,
            cpu_cost: child_cost.cpu_cost + child_cost.num_tuples,
            num_block_ios: child_cost.num_block_ios,
            num_large_seeks: child_cost.num_large_seeks,
        });
        self.schema = Some(schema);
        self.column_stats = column_stats;
        Ok(())
    }

    fn initialize(&mut self) -> PlanResult<()> {
        self.child.initialize()
    }

    fn get_next_tuple(&mut self) -> PlanResult<Option<TupleLiteral>> {
        let schema = match self.schema {
            Some(ref schema) => schema.clone(),
            None => {
                return Err(PlanError::NodeNotPrepared);
            }
        };

        loop {
            let tuple = match self.child.get_next_tuple()? {
                Some(tuple) => tuple,
                None => {
                    return Ok(None);
                }
            };

            if is_tuple_selected(&self.predicate, &schema, &tuple, &self.environment)? {
                return Ok(Some(tuple));
            }
        }
    }

    fn clean_up(&mut self) -> PlanResult<()> {
        self.child.clean_up()
    }

    fn set_environment(&mut self, env: Environment) {
        self.environment = Some(env.clone());
        self.child.set_environment(env);
    }

    fn results_ordered_by(&self) -> Option<Vec<::expressions::OrderByExpression>> {
        // Filtering preserves the child's ordering.
        self.child.results_ordered_by()
    }

    #[inline]
    fn has_predicate(&self) -> bool {
        true
    }

    #[inline]
    fn get_predicate(&self) -> Option<Expression> {
        Some(self.predicate.clone())
    }

    fn set_predicate(&mut self, predicate: Expression) -> PlanResult<()> {
        self.predicate = predicate;
        Ok(())
    }

    fn explain(&self) -> String {
        let mut line = format!("SimpleFilter[pred: {}]", self.predicate);
        if let Some(ref cost) = self.cost {
            line.push_str(&format!(" {}", cost));
        }
        format!("{}\n{}", line, indent_explain(&self.child.explain()))
    }
}
