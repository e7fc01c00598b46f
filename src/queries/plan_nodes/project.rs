//! This module provides the project plan node, which evaluates the `SELECT` list against each
//! tuple its child produces.

use ::{ColumnInfo, Schema};
use ::expressions::{Environment, Expression, SelectValue};
use ::queries::plan_nodes::{PlanCost, PlanNode, indent_explain, make_eval_environment};
use ::queries::planning::{PlanError, PlanResult};
use ::stats::ColumnStats;
use ::storage::TupleLiteral;

/// How one output column of the projection is produced.
enum OutputColumn {
    /// Copy the child column at the given index straight through.
    Passthrough(usize),
    /// Evaluate an expression against the child tuple.
    Evaluated(Expression),
}

/// A plan node that computes the `SELECT` list for each input tuple.  A trivial `SELECT *`
/// projection passes tuples through untouched.
pub struct ProjectNode {
    child: Box<PlanNode>,
    values: Vec<SelectValue>,
    environment: Option<Environment>,
    outputs: Vec<OutputColumn>,
    schema: Option<Schema>,
    child_schema: Option<Schema>,
    cost: Option<PlanCost>,
    column_stats: Vec<ColumnStats>,
}

impl ProjectNode {
    /// Instantiate a new project node over the given child.
    ///
    /// # Arguments
    /// * child - the node producing input tuples.
    /// * values - the `SELECT` list to compute.
    pub fn new(child: Box<PlanNode>, values: Vec<SelectValue>) -> ProjectNode {
        ProjectNode {
            child: child,
            values: values,
            environment: None,
            outputs: Vec::new(),
            schema: None,
            child_schema: None,
            cost: None,
            column_stats: Vec::new(),
        }
    }

    /// Whether the select list is a single unqualified `*`.
    fn is_trivial(&self) -> bool {
        self.values.len() == 1 && self.values[0].is_bare_wildcard()
    }
}

impl PlanNode for ProjectNode {
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

        let child_schema = self.child.get_schema();
        let child_stats = self.child.get_column_stats();
        let child_cost = self.child.get_cost().ok_or(PlanError::NodeNotPrepared)?;

        let mut schema = Schema::new();
        let mut outputs = Vec::new();
        let mut column_stats = Vec::new();

        for value in self.values.iter() {
            match *value {
                SelectValue::WildcardColumn { ref table } => {
                    // Expand the wildcard against the child's schema, in schema order.
                    let matches = child_schema.find_columns(&(table.clone(), None));
                    if matches.is_empty() {
                        return Err(PlanError::UnknownColumn((table.clone(), None)));
                    }
                    for (index, info) in matches {
                        schema.add_column(info)?;
                        outputs.push(OutputColumn::Passthrough(index));
                        column_stats.push(child_stats.get(index)
                            .cloned()
                            .unwrap_or_else(ColumnStats::unknown));
                    }
                }
                SelectValue::Expression { ref expression, ref alias } => {
                    // A bare column reference keeps its identity (and statistics); computed
                    // expressions get a generated column description.
                    if let Expression::ColumnValue(ref name) = *expression {
                        let matches = child_schema.find_columns(name);
                        match matches.len() {
                            0 => {
                                return Err(PlanError::UnknownColumn(name.clone()));
                            }
                            1 => {
                                let (index, mut info) = matches.into_iter().next().unwrap();
                                if let Some(ref alias) = *alias {
                                    info = ColumnInfo::with_name(info.column_type,
                                                                 alias.clone());
                                }
                                schema.add_column(info)?;
                                outputs.push(OutputColumn::Passthrough(index));
                                column_stats.push(child_stats.get(index)
                                    .cloned()
                                    .unwrap_or_else(ColumnStats::unknown));
                                continue;
                            }
                            _ => {
                                return Err(PlanError::AmbiguousColumn(name.clone()));
                            }
                        }
                    }

                    let col_type = expression.get_column_type(&child_schema)?;
                    let name = match *alias {
                        Some(ref alias) => alias.clone(),
                        None => expression.get_column_name(),
                    };
                    schema.add_column(ColumnInfo::with_name(col_type, name))?;
                    outputs.push(OutputColumn::Evaluated(expression.clone()));
                    column_stats.push(ColumnStats::unknown());
                }
            }
        }

        // Each projected expression costs roughly one evaluation per row.
        let eval_cost = child_cost.num_tuples * outputs.len() as f32;
        self.cost = Some(PlanCost {
            num_tuples: child_cost.num_tuples,
            tuple_size: child_cost.tuple_size,
            cpu_cost: child_cost.cpu_cost + eval_cost,
            num_block_ios: child_cost.num_block_ios,
            num_large_seeks: child_cost.num_large_seeks,
        });
        self.schema = Some(schema);
        self.child_schema = Some(child_schema);
        self.outputs = outputs;
        self.column_stats = column_stats;
        Ok(())
    }

    fn initialize(&mut self) -> PlanResult<()> {
        self.child.initialize()
    }

    fn get_next_tuple(&mut self) -> PlanResult<Option<TupleLiteral>> {
        let tuple = match self.child.get_next_tuple()? {
            Some(tuple) => tuple,
            None => {
                return Ok(None);
            }
        };

        if self.is_trivial() {
            return Ok(Some(tuple));
        }

        let child_schema = self.child_schema.as_ref().ok_or(PlanError::NodeNotPrepared)?;
        let mut result = TupleLiteral::new();
        for output in self.outputs.iter() {
            match *output {
                OutputColumn::Passthrough(index) => {
                    result.add_value(tuple.get(index)
                        .cloned()
                        .unwrap_or(::expressions::Literal::Null));
                }
                OutputColumn::Evaluated(ref expression) => {
                    let mut env =
                        make_eval_environment(child_schema, &tuple, &self.environment);
                    let value = expression.evaluate(&mut Some(&mut env))
                        .map_err(PlanError::ExpressionError)?;
                    result.add_value(value);
                }
            }
        }
        Ok(Some(result))
    }

    fn clean_up(&mut self) -> PlanResult<()> {
        self.child.clean_up()
    }

    fn set_environment(&mut self, env: Environment) {
        self.environment = Some(env.clone());
        self.child.set_environment(env);
    }

    fn results_ordered_by(&self) -> Option<Vec<::expressions::OrderByExpression>> {
        self.child.results_ordered_by()
    }

    fn explain(&self) -> String {
        let values: Vec<String> = self.values.iter().map(|v| format!("{}", v)).collect();
        let mut line = format!("Project[values: {}]", values.join(", "));
        if let Some(ref cost) = self.cost {
            line.push_str(&format!(" {}", cost));
        }
        format!("{}\n{}", line, indent_explain(&self.child.explain()))
    }
}
