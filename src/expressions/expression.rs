//! This module contains utilities for dealing with expressions, including the `Expression` enum.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use ::ColumnName;
use ::expressions::{ArithmeticType, CompareType, Environment, ExpressionError, Literal,
                    SelectClause};
use ::queries::PlanNode;
use ::relations::{ColumnType, Schema, column_name_to_string};

/// A transformation (or scan) applied to an expression tree by
/// [`Expression::traverse`](enum.Expression.html#method.traverse).
///
/// Traversal visits each node twice: [`enter`](#method.enter) on the way down, before the
/// node's children, and [`leave`](#tymethod.leave) on the way back up, after the children have
/// been rebuilt.  Replacement happens on the way up: `leave` returns the node that takes the
/// visited node's place, so a processor that only wants to observe simply hands the node back.
/// Processors that only care about the upward pass (most do) can rely on the default `enter`,
/// which accepts every node.
///
/// The aggregate-function extractor is the canonical processor: it uses `enter` to reject
/// nested aggregate calls and `leave` to splice generated column references in place of the
/// calls it lifts out.
pub trait ExpressionProcessor {
    /// Called when traversal reaches `node`, before its children are visited.  Returning an
    /// error aborts the whole traversal.  Nodes cannot be replaced on the way down; that is
    /// what [`leave`](#tymethod.leave) is for.
    fn enter(&mut self, _node: &Expression) -> Result<(), ExpressionError> {
        Ok(())
    }

    /// Called when traversal leaves `node`, its children already rebuilt.  The returned
    /// expression replaces `node` in the rebuilt tree; return `node.clone()` to keep it.
    fn leave(&mut self, node: &Expression) -> Result<Expression, ExpressionError>;
}

/// Coerces a pair of numeric literals to a common type, following the usual widening rules:
/// doubles win over floats, floats over longs, longs over ints.
pub fn coerce_literals(left: Literal, right: Literal) -> (Literal, Literal) {
    fn is_double(l: &Literal) -> bool {
        match *l {
            Literal::Double(_) => true,
            _ => false,
        }
    }
    fn is_float(l: &Literal) -> bool {
        match *l {
            Literal::Float(_) => true,
            _ => false,
        }
    }
    fn is_long(l: &Literal) -> bool {
        match *l {
            Literal::Long(_) => true,
            _ => false,
        }
    }

    if is_double(&left) || is_double(&right) {
        (Literal::Double(left.as_f64().unwrap()), Literal::Double(right.as_f64().unwrap()))
    } else if is_float(&left) || is_float(&right) {
        (Literal::Float(left.as_f64().unwrap() as f32),
         Literal::Float(right.as_f64().unwrap() as f32))
    } else if is_long(&left) || is_long(&right) {
        (Literal::Long(left.as_i64().unwrap()), Literal::Long(right.as_i64().unwrap()))
    } else {
        (left, right)
    }
}

/// A subquery appearing inside an expression: `EXISTS (...)`, `x IN (...)`, or a scalar
/// subquery.  The AST form is the `SELECT` clause itself; before the expression can be
/// evaluated, the planner attaches an execution plan.  The plan is shared behind an `Rc` so that
/// cloning the containing expression (which happens freely during planning) does not duplicate
/// the plan.
pub struct SubqueryExpression {
    /// The subquery itself.
    pub clause: Box<SelectClause>,
    /// The execution plan for the subquery, attached by the planner.
    pub plan: Option<Rc<RefCell<Box<PlanNode>>>>,
}

impl SubqueryExpression {
    /// Wraps a `SELECT` clause as a subquery with no plan attached yet.
    pub fn new(clause: SelectClause) -> SubqueryExpression {
        SubqueryExpression {
            clause: Box::new(clause),
            plan: None,
        }
    }

    /// Runs the subquery plan and collects its result tuples, with the given environment set as
    /// the plan's parent environment so that correlated column references resolve.
    fn run(&self, env: &Option<&mut Environment>) -> Result<Vec<Vec<Literal>>, ExpressionError> {
        let plan = match self.plan {
            Some(ref plan) => plan.clone(),
            None => {
                return Err(ExpressionError::SubqueryNotPlanned);
            }
        };

        let mut plan = plan.borrow_mut();
        if let Some(ref env) = *env {
            plan.set_environment((**env).clone());
        }
        plan.initialize().map_err(|e| ExpressionError::SubqueryPlanFailure(format!("{}", e)))?;

        let mut rows = Vec::new();
        loop {
            let tuple = plan.get_next_tuple()
                .map_err(|e| ExpressionError::SubqueryPlanFailure(format!("{}", e)))?;
            match tuple {
                Some(t) => rows.push(t.values()),
                None => break,
            }
        }
        plan.clean_up().map_err(|e| ExpressionError::SubqueryPlanFailure(format!("{}", e)))?;
        Ok(rows)
    }

    /// The schema of the subquery's plan, when one is attached.
    pub fn result_schema(&self) -> Option<Schema> {
        self.plan.as_ref().map(|plan| plan.borrow().get_schema())
    }
}

impl Clone for SubqueryExpression {
    fn clone(&self) -> Self {
        SubqueryExpression {
            clause: self.clause.clone(),
            plan: self.plan.clone(),
        }
    }
}

// Two subquery expressions are the same expression if their ASTs agree; the attached plan is an
// execution artifact, not part of the expression's identity.
impl PartialEq for SubqueryExpression {
    fn eq(&self, other: &Self) -> bool {
        self.clause == other.clause
    }
}

impl ::std::fmt::Debug for SubqueryExpression {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        f.debug_struct("SubqueryExpression")
            .field("clause", &self.clause)
            .field("planned", &self.plan.is_some())
            .finish()
    }
}

/// A SQL-supported expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A Boolean OR expression
    OR(Vec<Expression>),
    /// A Boolean AND expression
    AND(Vec<Expression>),
    /// A Boolean NOT expression
    NOT(Box<Expression>),
    /// A comparison expression
    Compare(Box<Expression>, CompareType, Box<Expression>),
    /// An IS NULL operator
    IsNull(Box<Expression>),
    /// A BETWEEN operator, in the form of (value, low, high).
    Between(Box<Expression>, Box<Expression>, Box<Expression>),
    /// A LIKE operator matching against a pattern with `%` and `_` wildcards.
    Like(Box<Expression>, String),
    /// An IN operator against an explicit value list.
    InList(Box<Expression>, Vec<Expression>),
    /// An IN operator against a subquery.
    InSubquery(Box<Expression>, SubqueryExpression),
    /// An EXISTS operator against a subquery.
    Exists(SubqueryExpression),
    /// A scalar subquery producing a single value.
    ScalarSubquery(SubqueryExpression),
    /// A function call, either scalar or aggregate.
    Function {
        /// The name of the function being called.
        name: String,
        /// Whether the call was marked DISTINCT (only meaningful for aggregates).
        distinct: bool,
        /// The function's argument expressions.
        args: Vec<Expression>,
    },
    /// An arithmetic expression
    Arithmetic(Box<Expression>, ArithmeticType, Box<Expression>),
    /// A column value for later dynamic evaluation.
    ColumnValue(ColumnName),
    /// NULL
    Null,
    /// TRUE
    True,
    /// FALSE
    False,
    /// An integer
    Int(i32),
    /// A long
    Long(i64),
    /// A float
    Float(f32),
    /// A double
    Double(f64),
    /// A string
    String(String),
}

impl From<Literal> for Expression {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::Int(i) => Expression::Int(i),
            Literal::Long(l) => Expression::Long(l),
            Literal::Float(f) => Expression::Float(f),
            Literal::Double(d) => Expression::Double(d),
            Literal::String(s) => Expression::String(s),
            Literal::FilePointer { page_no, offset } => {
                // File pointers do not have a literal syntax; represent them structurally.
                Expression::Arithmetic(Box::new(Expression::Int(page_no as i32)),
                                       ArithmeticType::Plus,
                                       Box::new(Expression::Int(offset as i32)))
            }
            Literal::Null => Expression::Null,
            Literal::True => Expression::True,
            Literal::False => Expression::False,
        }
    }
}

impl From<ColumnName> for Expression {
    fn from(name: ColumnName) -> Self {
        Expression::ColumnValue(name)
    }
}

impl<'a> From<&'a str> for Expression {
    fn from(s: &str) -> Self {
        Expression::String(s.into())
    }
}

/// Matches a SQL `LIKE` pattern against a string.  `%` matches any run of characters (including
/// an empty one) and `_` matches exactly one character.
fn like_matches(pattern: &[char], text: &[char]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some((&'%', rest)) => {
            (0..text.len() + 1).any(|skip| like_matches(rest, &text[skip..]))
        }
        Some((&'_', rest)) => {
            match text.split_first() {
                Some((_, text_rest)) => like_matches(rest, text_rest),
                None => false,
            }
        }
        Some((&c, rest)) => {
            match text.split_first() {
                Some((&t, text_rest)) => c == t && like_matches(rest, text_rest),
                None => false,
            }
        }
    }
}

impl Expression {
    fn try_literal(&self) -> Option<Literal> {
        match *self {
            Expression::Int(i) => Some(Literal::Int(i)),
            Expression::Long(l) => Some(Literal::Long(l)),
            Expression::Float(f) => Some(Literal::Float(f)),
            Expression::Double(d) => Some(Literal::Double(d)),
            Expression::String(ref s) => Some(Literal::String(s.clone())),
            Expression::Null => Some(Literal::Null),
            Expression::True => Some(Literal::True),
            Expression::False => Some(Literal::False),
            _ => None,
        }
    }

    /// Evaluates this expression object in the context of the specified environment.  The
    /// environment provides any external information necessary to evaluate the expression, such
    /// as the current tuples loaded from tables referenced within the expression.
    ///
    /// Comparisons and arithmetic involving `NULL` evaluate to `NULL`; boolean connectives use
    /// three-valued logic.
    ///
    /// # Arguments
    /// * env - the environment to look up symbol-values from, when evaluating the expression
    ///
    /// # Errors
    /// This will return some `ExpressionError` if the expression cannot be evaluated given the
    /// environment.
    pub fn evaluate(&self, env: &mut Option<&mut Environment>) -> Result<Literal, ExpressionError> {
        if let Some(l) = self.try_literal() {
            return Ok(l);
        }
        match *self {
            Expression::Arithmetic(ref left, op, ref right) => {
                Expression::evaluate_arithmetic(env, left, right, op)
            }
            Expression::Compare(ref left, op, ref right) => {
                Expression::evaluate_compare(env, left, right, op)
            }
            Expression::OR(ref exprs) => {
                if exprs.is_empty() {
                    return Err(ExpressionError::EmptyExpression);
                }
                let mut saw_null = false;
                for expr in exprs {
                    match expr.evaluate(env)? {
                        Literal::True => {
                            return Ok(Literal::True);
                        }
                        Literal::False => {}
                        Literal::Null => {
                            saw_null = true;
                        }
                        value => {
                            return Err(ExpressionError::NotBoolean(value));
                        }
                    }
                }
                Ok(if saw_null {
                    Literal::Null
                } else {
                    Literal::False
                })
            }
            Expression::AND(ref exprs) => {
                if exprs.is_empty() {
                    return Err(ExpressionError::EmptyExpression);
                }
                let mut saw_null = false;
                for expr in exprs {
                    match expr.evaluate(env)? {
                        Literal::False => {
                            return Ok(Literal::False);
                        }
                        Literal::True => {}
                        Literal::Null => {
                            saw_null = true;
                        }
                        value => {
                            return Err(ExpressionError::NotBoolean(value));
                        }
                    }
                }
                Ok(if saw_null {
                    Literal::Null
                } else {
                    Literal::True
                })
            }
            Expression::NOT(ref inner) => {
                match inner.evaluate(env)? {
                    Literal::False => Ok(Literal::True),
                    Literal::True => Ok(Literal::False),
                    Literal::Null => Ok(Literal::Null),
                    value => Err(ExpressionError::NotBoolean(value)),
                }
            }
            Expression::IsNull(ref inner) => {
                let value = inner.evaluate(env)?;
                Ok(Literal::from(value == Literal::Null))
            }
            Expression::Between(ref value, ref low, ref high) => {
                // v BETWEEN lo AND hi is exactly (v >= lo) AND (v <= hi).
                let rewritten =
                    Expression::AND(vec![Expression::Compare(value.clone(),
                                                             CompareType::GreaterThanEqual,
                                                             low.clone()),
                                         Expression::Compare(value.clone(),
                                                             CompareType::LessThanEqual,
                                                             high.clone())]);
                rewritten.evaluate(env)
            }
            Expression::Like(ref value, ref pattern) => {
                let value = value.evaluate(env)?;
                if value == Literal::Null {
                    return Ok(Literal::Null);
                }
                match value {
                    Literal::String(ref s) => {
                        let pattern: Vec<char> = pattern.chars().collect();
                        let text: Vec<char> = s.chars().collect();
                        Ok(Literal::from(like_matches(&pattern, &text)))
                    }
                    other => Err(ExpressionError::NotComparable(other,
                                                                Literal::String(pattern.clone()))),
                }
            }
            Expression::InList(ref value, ref choices) => {
                let value = value.evaluate(env)?;
                if value == Literal::Null {
                    return Ok(Literal::Null);
                }
                let mut saw_null = false;
                for choice in choices {
                    let choice = choice.evaluate(env)?;
                    if choice == Literal::Null {
                        saw_null = true;
                        continue;
                    }
                    if value.compare(&choice) == Some(Ordering::Equal) {
                        return Ok(Literal::True);
                    }
                }
                Ok(if saw_null {
                    Literal::Null
                } else {
                    Literal::False
                })
            }
            Expression::InSubquery(ref value, ref subquery) => {
                let value = value.evaluate(env)?;
                if value == Literal::Null {
                    return Ok(Literal::Null);
                }
                let rows = subquery.run(env)?;
                let mut saw_null = false;
                for row in rows {
                    if row.len() != 1 {
                        return Err(ExpressionError::ScalarSubqueryWrongArity(row.len()));
                    }
                    if row[0] == Literal::Null {
                        saw_null = true;
                        continue;
                    }
                    if value.compare(&row[0]) == Some(Ordering::Equal) {
                        return Ok(Literal::True);
                    }
                }
                Ok(if saw_null {
                    Literal::Null
                } else {
                    Literal::False
                })
            }
            Expression::Exists(ref subquery) => {
                let rows = subquery.run(env)?;
                Ok(Literal::from(!rows.is_empty()))
            }
            Expression::ScalarSubquery(ref subquery) => {
                let rows = subquery.run(env)?;
                if rows.len() > 1 {
                    return Err(ExpressionError::ScalarSubqueryMultipleRows);
                }
                match rows.into_iter().next() {
                    Some(row) => {
                        if row.len() != 1 {
                            return Err(ExpressionError::ScalarSubqueryWrongArity(row.len()));
                        }
                        Ok(row.into_iter().next().unwrap())
                    }
                    None => Ok(Literal::Null),
                }
            }
            Expression::Function { ref name, ref args, .. } => {
                let function = ::functions::directory().get(name.clone())?;
                match function.as_scalar() {
                    Some(scalar) => {
                        let mut arg_values = Vec::with_capacity(args.len());
                        for arg in args {
                            arg_values.push(arg.evaluate(env)?);
                        }
                        scalar.evaluate(&arg_values).map_err(Into::into)
                    }
                    None => {
                        // A bare aggregate call cannot be evaluated row-by-row; the planner
                        // replaces these with generated column references before execution.
                        Err(ExpressionError::NotAggregate(name.clone()))
                    }
                }
            }
            Expression::ColumnValue(ref name) => {
                if let Some(ref mut inner) = *env {
                    inner.get_column_value(name)
                } else {
                    Err(ExpressionError::CouldNotResolve(name.clone()))
                }
            }
            // All simple literals were handled by try_literal() above.
            _ => unreachable!(),
        }
    }

    fn evaluate_arithmetic(env: &mut Option<&mut Environment>,
                           left: &Expression,
                           right: &Expression,
                           op: ArithmeticType)
                           -> Result<Literal, ExpressionError> {
        let left_val = left.evaluate(env)?;
        let right_val = right.evaluate(env)?;
        if left_val == Literal::Null || right_val == Literal::Null {
            return Ok(Literal::Null);
        }
        if !left_val.is_numeric() {
            return Err(ExpressionError::NotNumeric(left_val));
        }
        if !right_val.is_numeric() {
            return Err(ExpressionError::NotNumeric(right_val));
        }
        let (left_val, right_val) = coerce_literals(left_val, right_val);

        macro_rules! arith {
            ($op:tt, $int_guard:expr) => {
                match (left_val, right_val) {
                    (Literal::Int(l), Literal::Int(r)) => {
                        if $int_guard && r == 0 {
                            Err(ExpressionError::DivideByZero)
                        } else {
                            Ok(Literal::Int(l $op r))
                        }
                    }
                    (Literal::Long(l), Literal::Long(r)) => {
                        if $int_guard && r == 0 {
                            Err(ExpressionError::DivideByZero)
                        } else {
                            Ok(Literal::Long(l $op r))
                        }
                    }
                    (Literal::Float(l), Literal::Float(r)) => Ok(Literal::Float(l $op r)),
                    (Literal::Double(l), Literal::Double(r)) => Ok(Literal::Double(l $op r)),
                    _ => unreachable!(),
                }
            }
        }

        match op {
            ArithmeticType::Plus => arith!(+, false),
            ArithmeticType::Minus => arith!(-, false),
            ArithmeticType::Multiply => arith!(*, false),
            ArithmeticType::Divide => arith!(/, true),
            ArithmeticType::Remainder => arith!(%, true),
        }
    }

    fn evaluate_compare(env: &mut Option<&mut Environment>,
                        left: &Expression,
                        right: &Expression,
                        op: CompareType)
                        -> Result<Literal, ExpressionError> {
        let left_val = left.evaluate(env)?;
        let right_val = right.evaluate(env)?;
        if left_val == Literal::Null || right_val == Literal::Null {
            return Ok(Literal::Null);
        }
        match left_val.compare(&right_val) {
            Some(ordering) => {
                let result = match op {
                    CompareType::Equals => ordering == Ordering::Equal,
                    CompareType::NotEquals => ordering != Ordering::Equal,
                    CompareType::LessThan => ordering == Ordering::Less,
                    CompareType::LessThanEqual => ordering != Ordering::Greater,
                    CompareType::GreaterThan => ordering == Ordering::Greater,
                    CompareType::GreaterThanEqual => ordering != Ordering::Less,
                };
                Ok(Literal::from(result))
            }
            None => Err(ExpressionError::NotComparable(left_val, right_val)),
        }
    }

    /// Walks the expression tree with the given processor.  The processor's `enter` is called
    /// before a node's children are visited and `leave` afterwards; `leave` may return a
    /// replacement for the node.  Subquery clauses are treated as opaque: traversal does not
    /// descend into them.
    pub fn traverse<P: ExpressionProcessor>(&self,
                                            processor: &mut P)
                                            -> Result<Expression, ExpressionError> {
        processor.enter(self)?;

        let rebuilt = match *self {
            Expression::OR(ref exprs) => {
                let children: Result<Vec<_>, _> =
                    exprs.iter().map(|e| e.traverse(processor)).collect();
                Expression::OR(children?)
            }
            Expression::AND(ref exprs) => {
                let children: Result<Vec<_>, _> =
                    exprs.iter().map(|e| e.traverse(processor)).collect();
                Expression::AND(children?)
            }
            Expression::NOT(ref inner) => Expression::NOT(Box::new(inner.traverse(processor)?)),
            Expression::IsNull(ref inner) => {
                Expression::IsNull(Box::new(inner.traverse(processor)?))
            }
            Expression::Compare(ref l, op, ref r) => {
                Expression::Compare(Box::new(l.traverse(processor)?),
                                    op,
                                    Box::new(r.traverse(processor)?))
            }
            Expression::Arithmetic(ref l, op, ref r) => {
                Expression::Arithmetic(Box::new(l.traverse(processor)?),
                                       op,
                                       Box::new(r.traverse(processor)?))
            }
            Expression::Between(ref v, ref lo, ref hi) => {
                Expression::Between(Box::new(v.traverse(processor)?),
                                    Box::new(lo.traverse(processor)?),
                                    Box::new(hi.traverse(processor)?))
            }
            Expression::Like(ref v, ref pattern) => {
                Expression::Like(Box::new(v.traverse(processor)?), pattern.clone())
            }
            Expression::InList(ref v, ref choices) => {
                let choices: Result<Vec<_>, _> =
                    choices.iter().map(|e| e.traverse(processor)).collect();
                Expression::InList(Box::new(v.traverse(processor)?), choices?)
            }
            Expression::InSubquery(ref v, ref subquery) => {
                Expression::InSubquery(Box::new(v.traverse(processor)?), subquery.clone())
            }
            Expression::Function { ref name, distinct, ref args } => {
                let args: Result<Vec<_>, _> = args.iter().map(|e| e.traverse(processor)).collect();
                Expression::Function {
                    name: name.clone(),
                    distinct: distinct,
                    args: args?,
                }
            }
            ref other => other.clone(),
        };

        processor.leave(&rebuilt)
    }

    /// Whether the expression can be evaluated without any environment: it references no
    /// columns, subqueries, or function calls.
    pub fn is_constant(&self) -> bool {
        match *self {
            Expression::ColumnValue(_) |
            Expression::Function { .. } |
            Expression::InSubquery(..) |
            Expression::Exists(_) |
            Expression::ScalarSubquery(_) => false,
            Expression::OR(ref exprs) |
            Expression::AND(ref exprs) => exprs.iter().all(Expression::is_constant),
            Expression::NOT(ref e) |
            Expression::IsNull(ref e) |
            Expression::Like(ref e, _) => e.is_constant(),
            Expression::Compare(ref l, _, ref r) |
            Expression::Arithmetic(ref l, _, ref r) => l.is_constant() && r.is_constant(),
            Expression::Between(ref v, ref lo, ref hi) => {
                v.is_constant() && lo.is_constant() && hi.is_constant()
            }
            Expression::InList(ref v, ref choices) => {
                v.is_constant() && choices.iter().all(Expression::is_constant)
            }
            _ => true,
        }
    }

    /// Performs equivalence-preserving rewrites on the expression: constant subtrees are folded
    /// to their literal values, nested `AND`/`OR` groups are flattened, boolean identities are
    /// applied, and double negation is eliminated.
    pub fn simplify(&self) -> Expression {
        // Fold whole constant subtrees first; this handles arithmetic, comparisons, BETWEEN and
        // friends in one step.  Errors (e.g. division by zero) leave the node as-is so that
        // evaluation reports them at the proper time.
        if self.is_constant() && self.try_literal().is_none() {
            if let Ok(value) = self.evaluate(&mut None) {
                return value.into();
            }
        }

        match *self {
            Expression::AND(ref exprs) => {
                let mut flattened = Vec::new();
                for e in exprs {
                    match e.simplify() {
                        Expression::AND(inner) => flattened.extend(inner),
                        Expression::True => {}
                        Expression::False => {
                            return Expression::False;
                        }
                        other => flattened.push(other),
                    }
                }
                match flattened.len() {
                    0 => Expression::True,
                    1 => flattened.pop().unwrap(),
                    _ => Expression::AND(flattened),
                }
            }
            Expression::OR(ref exprs) => {
                let mut flattened = Vec::new();
                for e in exprs {
                    match e.simplify() {
                        Expression::OR(inner) => flattened.extend(inner),
                        Expression::False => {}
                        Expression::True => {
                            return Expression::True;
                        }
                        other => flattened.push(other),
                    }
                }
                match flattened.len() {
                    0 => Expression::False,
                    1 => flattened.pop().unwrap(),
                    _ => Expression::OR(flattened),
                }
            }
            Expression::NOT(ref inner) => {
                match inner.simplify() {
                    Expression::True => Expression::False,
                    Expression::False => Expression::True,
                    Expression::NOT(e) => *e,
                    other => Expression::NOT(Box::new(other)),
                }
            }
            Expression::Compare(ref l, op, ref r) => {
                Expression::Compare(Box::new(l.simplify()), op, Box::new(r.simplify()))
            }
            Expression::Arithmetic(ref l, op, ref r) => {
                Expression::Arithmetic(Box::new(l.simplify()), op, Box::new(r.simplify()))
            }
            Expression::IsNull(ref e) => Expression::IsNull(Box::new(e.simplify())),
            Expression::Between(ref v, ref lo, ref hi) => {
                Expression::Between(Box::new(v.simplify()),
                                    Box::new(lo.simplify()),
                                    Box::new(hi.simplify()))
            }
            Expression::InList(ref v, ref choices) => {
                Expression::InList(Box::new(v.simplify()),
                                   choices.iter().map(Expression::simplify).collect())
            }
            ref other => other.clone(),
        }
    }

    /// Flattens the expression into its `AND`ed conjuncts.  Non-`AND` expressions produce a
    /// single conjunct; nested `AND`s are descended into.
    pub fn collect_conjuncts(&self, conjuncts: &mut Vec<Expression>) {
        match *self {
            Expression::AND(ref exprs) => {
                for e in exprs {
                    e.collect_conjuncts(conjuncts);
                }
            }
            ref other => {
                let other = other.clone();
                if !conjuncts.contains(&other) {
                    conjuncts.push(other);
                }
            }
        }
    }

    /// Collects every column name the expression references, including references made inside
    /// value lists and function arguments.  Subquery clauses are not descended into.
    pub fn collect_column_refs(&self, refs: &mut Vec<ColumnName>) {
        match *self {
            Expression::ColumnValue(ref name) => {
                if !refs.contains(name) {
                    refs.push(name.clone());
                }
            }
            Expression::OR(ref exprs) |
            Expression::AND(ref exprs) => {
                for e in exprs {
                    e.collect_column_refs(refs);
                }
            }
            Expression::NOT(ref e) |
            Expression::IsNull(ref e) |
            Expression::Like(ref e, _) => e.collect_column_refs(refs),
            Expression::Compare(ref l, _, ref r) |
            Expression::Arithmetic(ref l, _, ref r) => {
                l.collect_column_refs(refs);
                r.collect_column_refs(refs);
            }
            Expression::Between(ref v, ref lo, ref hi) => {
                v.collect_column_refs(refs);
                lo.collect_column_refs(refs);
                hi.collect_column_refs(refs);
            }
            Expression::InList(ref v, ref choices) => {
                v.collect_column_refs(refs);
                for e in choices {
                    e.collect_column_refs(refs);
                }
            }
            Expression::InSubquery(ref v, _) => v.collect_column_refs(refs),
            Expression::Function { ref args, .. } => {
                for e in args {
                    e.collect_column_refs(refs);
                }
            }
            _ => {}
        }
    }

    /// Whether the expression contains any subquery operator.
    pub fn has_subquery(&self) -> bool {
        match *self {
            Expression::InSubquery(..) |
            Expression::Exists(_) |
            Expression::ScalarSubquery(_) => true,
            Expression::OR(ref exprs) |
            Expression::AND(ref exprs) => exprs.iter().any(Expression::has_subquery),
            Expression::NOT(ref e) |
            Expression::IsNull(ref e) |
            Expression::Like(ref e, _) => e.has_subquery(),
            Expression::Compare(ref l, _, ref r) |
            Expression::Arithmetic(ref l, _, ref r) => l.has_subquery() || r.has_subquery(),
            Expression::Between(ref v, ref lo, ref hi) => {
                v.has_subquery() || lo.has_subquery() || hi.has_subquery()
            }
            Expression::InList(ref v, ref choices) => {
                v.has_subquery() || choices.iter().any(Expression::has_subquery)
            }
            Expression::Function { ref args, .. } => args.iter().any(Expression::has_subquery),
            _ => false,
        }
    }

    /// A best-effort display name for the expression, used when a projected expression has no
    /// explicit alias.  Column references use their column name; everything else stringifies.
    pub fn get_column_name(&self) -> String {
        match *self {
            Expression::ColumnValue(ref name) => column_name_to_string(name),
            ref other => format!("{}", other),
        }
    }

    /// Determines the type that this expression produces when evaluated against tuples of the
    /// given schema.
    pub fn get_column_type(&self, schema: &Schema) -> Result<ColumnType, ExpressionError> {
        match *self {
            Expression::Int(_) => Ok(ColumnType::Integer),
            Expression::Long(_) => Ok(ColumnType::BigInt),
            Expression::Float(_) => Ok(ColumnType::Float),
            Expression::Double(_) => Ok(ColumnType::Double),
            Expression::String(ref s) => Ok(ColumnType::VarChar { length: s.len() as u16 }),
            Expression::Null => Ok(ColumnType::Null),
            Expression::True | Expression::False => Ok(ColumnType::TinyInt),
            Expression::OR(_) |
            Expression::AND(_) |
            Expression::NOT(_) |
            Expression::IsNull(_) |
            Expression::Between(..) |
            Expression::Like(..) |
            Expression::InList(..) |
            Expression::InSubquery(..) |
            Expression::Exists(_) |
            Expression::Compare(..) => Ok(ColumnType::TinyInt),
            Expression::Arithmetic(ref l, _, ref r) => {
                let left = l.get_column_type(schema)?;
                let right = r.get_column_type(schema)?;
                // The result widens to the larger operand type.
                let rank = |t: &ColumnType| {
                    match *t {
                        ColumnType::Double => 5,
                        ColumnType::Float => 4,
                        ColumnType::BigInt => 3,
                        ColumnType::Integer => 2,
                        ColumnType::SmallInt => 1,
                        _ => 0,
                    }
                };
                Ok(if rank(&left) >= rank(&right) {
                    left
                } else {
                    right
                })
            }
            Expression::ColumnValue(ref name) => {
                let found = schema.find_columns(name);
                match found.len() {
                    0 => Err(ExpressionError::CouldNotResolve(name.clone())),
                    1 => Ok(found[0].1.column_type),
                    _ => Err(ExpressionError::AmbiguousColumnName(name.clone())),
                }
            }
            Expression::Function { ref name, ref args, .. } => {
                let function = ::functions::directory().get(name.clone())?;
                function.return_type(args, schema).map_err(Into::into)
            }
            Expression::ScalarSubquery(ref subquery) => {
                match subquery.result_schema() {
                    Some(ref sub_schema) if sub_schema.num_columns() == 1 => {
                        Ok(sub_schema[0].column_type)
                    }
                    _ => Err(ExpressionError::CouldNotDetermineType(format!("{}", self))),
                }
            }
        }
    }
}

/// Builds a single predicate out of a set of conjuncts: `None` for an empty set, the conjunct
/// itself for a singleton, and an `AND` of all of them otherwise.
pub fn make_predicate(conjuncts: &[Expression]) -> Option<Expression> {
    match conjuncts.len() {
        0 => None,
        1 => Some(conjuncts[0].clone()),
        _ => Some(Expression::AND(conjuncts.to_vec())),
    }
}

fn wrap_expr_parens(expr: &Expression) -> String {
    if expr.try_literal().is_some() {
        format!("{}", expr)
    } else {
        format!("({})", expr)
    }
}

impl ::std::fmt::Display for Expression {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        match *self {
            Expression::True => write!(f, "TRUE"),
            Expression::False => write!(f, "FALSE"),
            Expression::Null => write!(f, "NULL"),
            Expression::Int(num) => write!(f, "{}", num),
            Expression::Long(num) => write!(f, "{}", num),
            Expression::Float(num) => write!(f, "{}", num),
            Expression::Double(num) => write!(f, "{}", num),
            Expression::String(ref s) => write!(f, "'{}'", s),
            Expression::ColumnValue(ref name) => write!(f, "{}", column_name_to_string(name)),
            Expression::OR(ref exprs) => {
                let r: Vec<_> = exprs.iter().map(wrap_expr_parens).collect();
                write!(f, "{}", r.join(" OR "))
            }
            Expression::AND(ref exprs) => {
                let r: Vec<_> = exprs.iter().map(wrap_expr_parens).collect();
                write!(f, "{}", r.join(" AND "))
            }
            Expression::NOT(ref e) => write!(f, "NOT {}", wrap_expr_parens(e)),
            Expression::IsNull(ref e) => write!(f, "{} IS NULL", wrap_expr_parens(e)),
            Expression::Between(ref v, ref lo, ref hi) => {
                write!(f,
                       "{} BETWEEN {} AND {}",
                       wrap_expr_parens(v),
                       wrap_expr_parens(lo),
                       wrap_expr_parens(hi))
            }
            Expression::Like(ref v, ref pattern) => {
                write!(f, "{} LIKE '{}'", wrap_expr_parens(v), pattern)
            }
            Expression::InList(ref v, ref choices) => {
                let r: Vec<_> = choices.iter().map(|e| format!("{}", e)).collect();
                write!(f, "{} IN ({})", wrap_expr_parens(v), r.join(", "))
            }
            Expression::InSubquery(ref v, ref subquery) => {
                write!(f, "{} IN ({})", wrap_expr_parens(v), subquery.clause)
            }
            Expression::Exists(ref subquery) => write!(f, "EXISTS ({})", subquery.clause),
            Expression::ScalarSubquery(ref subquery) => write!(f, "({})", subquery.clause),
            Expression::Function { ref name, distinct, ref args } => {
                let r: Vec<_> = args.iter().map(|e| format!("{}", e)).collect();
                write!(f,
                       "{}({}{})",
                       name,
                       if distinct { "DISTINCT " } else { "" },
                       r.join(", "))
            }
            Expression::Compare(ref l, op, ref r) => {
                write!(f, "{} {} {}", wrap_expr_parens(l), op, wrap_expr_parens(r))
            }
            Expression::Arithmetic(ref l, op, ref r) => {
                write!(f, "{} {} {}", wrap_expr_parens(l), op, wrap_expr_parens(r))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::expressions::{ArithmeticType, CompareType, ExpressionError, Literal};

    fn arith(l: Expression, op: ArithmeticType, r: Expression) -> Expression {
        Expression::Arithmetic(Box::new(l), op, Box::new(r))
    }

    fn compare(l: Expression, op: CompareType, r: Expression) -> Expression {
        Expression::Compare(Box::new(l), op, Box::new(r))
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(Ok(Literal::Int(555)),
                   arith(Expression::Int(123), ArithmeticType::Plus, Expression::Int(432))
                       .evaluate(&mut None));
        assert_eq!(Ok(Literal::Int(-309)),
                   arith(Expression::Int(123), ArithmeticType::Minus, Expression::Int(432))
                       .evaluate(&mut None));
        assert_eq!(Ok(Literal::Long(555)),
                   arith(Expression::Int(123), ArithmeticType::Plus, Expression::Long(432))
                       .evaluate(&mut None));
        assert_eq!(Ok(Literal::Int(21)),
                   arith(Expression::Int(3), ArithmeticType::Multiply, Expression::Int(7))
                       .evaluate(&mut None));
        assert_eq!(Ok(Literal::Int(2)),
                   arith(Expression::Int(11), ArithmeticType::Divide, Expression::Int(4))
                       .evaluate(&mut None));
        assert_eq!(Ok(Literal::Int(3)),
                   arith(Expression::Int(11), ArithmeticType::Remainder, Expression::Int(4))
                       .evaluate(&mut None));
        assert_eq!(Ok(Literal::Double(2.75)),
                   arith(Expression::Int(11), ArithmeticType::Divide, Expression::Double(4.0))
                       .evaluate(&mut None));
        assert_eq!(Err(ExpressionError::NotNumeric(Literal::True)),
                   arith(Expression::Long(123), ArithmeticType::Plus, Expression::True)
                       .evaluate(&mut None));
        assert_eq!(Err(ExpressionError::DivideByZero),
                   arith(Expression::Int(11), ArithmeticType::Divide, Expression::Int(0))
                       .evaluate(&mut None));
        assert_eq!(Ok(Literal::Null),
                   arith(Expression::Int(11), ArithmeticType::Plus, Expression::Null)
                       .evaluate(&mut None));
    }

    #[test]
    fn test_compare() {
        let cases = vec![(CompareType::LessThan, true),
                         (CompareType::LessThanEqual, true),
                         (CompareType::GreaterThan, false),
                         (CompareType::GreaterThanEqual, false),
                         (CompareType::Equals, false),
                         (CompareType::NotEquals, true)];
        for (op, expected) in cases {
            assert_eq!(Ok(Literal::from(expected)),
                       compare(Expression::Int(30), op, Expression::Long(35)).evaluate(&mut None));
        }

        // Comparisons involving NULL are NULL, not errors.
        assert_eq!(Ok(Literal::Null),
                   compare(Expression::Int(30), CompareType::LessThan, Expression::Null)
                       .evaluate(&mut None));

        assert_eq!(Err(ExpressionError::NotComparable(Literal::Int(30), Literal::True)),
                   compare(Expression::Int(30), CompareType::LessThan, Expression::True)
                       .evaluate(&mut None));
    }

    #[test]
    fn test_boolean_three_valued() {
        let null_cmp = compare(Expression::Null, CompareType::Equals, Expression::Int(1));

        assert_eq!(Ok(Literal::Null),
                   Expression::AND(vec![Expression::True, null_cmp.clone()]).evaluate(&mut None));
        assert_eq!(Ok(Literal::False),
                   Expression::AND(vec![Expression::False, null_cmp.clone()]).evaluate(&mut None));
        assert_eq!(Ok(Literal::True),
                   Expression::OR(vec![Expression::True, null_cmp.clone()]).evaluate(&mut None));
        assert_eq!(Ok(Literal::Null),
                   Expression::OR(vec![Expression::False, null_cmp.clone()]).evaluate(&mut None));
        assert_eq!(Ok(Literal::Null),
                   Expression::NOT(Box::new(null_cmp.clone())).evaluate(&mut None));

        assert_eq!(Err(ExpressionError::EmptyExpression),
                   Expression::AND(vec![]).evaluate(&mut None));
        assert_eq!(Err(ExpressionError::NotBoolean(Literal::Int(34))),
                   Expression::OR(vec![Expression::Int(34)]).evaluate(&mut None));
    }

    #[test]
    fn test_is_null() {
        assert_eq!(Ok(Literal::True),
                   Expression::IsNull(Box::new(Expression::Null)).evaluate(&mut None));
        assert_eq!(Ok(Literal::False),
                   Expression::IsNull(Box::new(Expression::Int(430))).evaluate(&mut None));
    }

    #[test]
    fn test_between() {
        let between = Expression::Between(Box::new(Expression::Int(5)),
                                          Box::new(Expression::Int(1)),
                                          Box::new(Expression::Int(10)));
        assert_eq!(Ok(Literal::True), between.evaluate(&mut None));

        let outside = Expression::Between(Box::new(Expression::Int(15)),
                                          Box::new(Expression::Int(1)),
                                          Box::new(Expression::Int(10)));
        assert_eq!(Ok(Literal::False), outside.evaluate(&mut None));
    }

    #[test]
    fn test_like() {
        let like = |text: &str, pattern: &str| {
            Expression::Like(Box::new(Expression::String(text.into())), pattern.into())
                .evaluate(&mut None)
        };
        assert_eq!(Ok(Literal::True), like("hello", "hello"));
        assert_eq!(Ok(Literal::True), like("hello", "h%"));
        assert_eq!(Ok(Literal::True), like("hello", "%llo"));
        assert_eq!(Ok(Literal::True), like("hello", "h_llo"));
        assert_eq!(Ok(Literal::True), like("hello", "%"));
        assert_eq!(Ok(Literal::False), like("hello", "h_l"));
        assert_eq!(Ok(Literal::False), like("hello", "world"));
        assert_eq!(Ok(Literal::Null),
                   Expression::Like(Box::new(Expression::Null), "x%".into()).evaluate(&mut None));
    }

    #[test]
    fn test_in_list() {
        let in_list = Expression::InList(Box::new(Expression::Int(3)),
                                         vec![Expression::Int(1),
                                              Expression::Int(3),
                                              Expression::Int(5)]);
        assert_eq!(Ok(Literal::True), in_list.evaluate(&mut None));

        let not_in = Expression::InList(Box::new(Expression::Int(4)),
                                        vec![Expression::Int(1), Expression::Int(3)]);
        assert_eq!(Ok(Literal::False), not_in.evaluate(&mut None));

        // A NULL element makes a failed lookup NULL rather than FALSE.
        let with_null = Expression::InList(Box::new(Expression::Int(4)),
                                           vec![Expression::Int(1), Expression::Null]);
        assert_eq!(Ok(Literal::Null), with_null.evaluate(&mut None));
    }

    #[test]
    fn test_simplify_constant_folding() {
        let expr = arith(Expression::Int(2), ArithmeticType::Multiply, Expression::Int(21));
        assert_eq!(Expression::Int(42), expr.simplify());

        let cmp = compare(Expression::Int(1), CompareType::LessThan, Expression::Int(2));
        assert_eq!(Expression::True, cmp.simplify());
    }

    #[test]
    fn test_simplify_boolean_identities() {
        let col: Expression = Expression::ColumnValue((None, Some("a".into())));

        assert_eq!(col.clone(),
                   Expression::AND(vec![Expression::True, col.clone()]).simplify());
        assert_eq!(Expression::False,
                   Expression::AND(vec![Expression::False, col.clone()]).simplify());
        assert_eq!(col.clone(),
                   Expression::OR(vec![Expression::False, col.clone()]).simplify());
        assert_eq!(Expression::True,
                   Expression::OR(vec![Expression::True, col.clone()]).simplify());
        assert_eq!(col.clone(),
                   Expression::NOT(Box::new(Expression::NOT(Box::new(col.clone())))).simplify());

        // Nested ANDs flatten.
        let nested = Expression::AND(vec![Expression::AND(vec![col.clone(), col.clone()]),
                                          col.clone()]);
        assert_eq!(Expression::AND(vec![col.clone(), col.clone(), col.clone()]),
                   nested.simplify());
    }

    #[test]
    fn test_conjunct_round_trip() {
        let a = compare(Expression::ColumnValue((None, Some("a".into()))),
                        CompareType::Equals,
                        Expression::Int(1));
        let b = compare(Expression::ColumnValue((None, Some("b".into()))),
                        CompareType::GreaterThan,
                        Expression::Int(2));
        let c = Expression::IsNull(Box::new(Expression::ColumnValue((None, Some("c".into())))));

        let predicate = Expression::AND(vec![a.clone(),
                                             Expression::AND(vec![b.clone(), c.clone()])]);
        let mut conjuncts = Vec::new();
        predicate.collect_conjuncts(&mut conjuncts);
        assert_eq!(vec![a.clone(), b.clone(), c.clone()], conjuncts);

        let rebuilt = make_predicate(&conjuncts).unwrap();
        let mut round_trip = Vec::new();
        rebuilt.collect_conjuncts(&mut round_trip);
        assert_eq!(conjuncts, round_trip);

        assert_eq!(None, make_predicate(&[]));
        assert_eq!(Some(a.clone()), make_predicate(&[a.clone()]));
    }

    #[test]
    fn test_collect_column_refs() {
        let expr = Expression::AND(vec![compare(Expression::ColumnValue((Some("t".into()),
                                                                         Some("a".into()))),
                                                CompareType::Equals,
                                                Expression::ColumnValue((None,
                                                                         Some("b".into())))),
                                        Expression::IsNull(Box::new(
                                            Expression::ColumnValue((None, Some("b".into())))))]);
        let mut refs = Vec::new();
        expr.collect_column_refs(&mut refs);
        assert_eq!(vec![(Some("t".into()), Some("a".into())), (None, Some("b".into()))],
                   refs);
    }
}
