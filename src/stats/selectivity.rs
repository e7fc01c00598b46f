//! Selectivity estimation: given a predicate and the statistics of the tuples flowing into it,
//! estimate the fraction of tuples that satisfy the predicate, and tighten column statistics to
//! reflect the tuples that survive.
//!
//! All estimates assume uniformly-distributed values and independent predicates.  Conjuncts that
//! cannot be analyzed (two column references, no column reference, unsupported shapes) receive a
//! neutral default selectivity and leave the statistics untouched.

use ::expressions::{CompareType, Expression, Literal};
use ::relations::Schema;
use ::stats::{ColumnStats, TableStats};

/// The selectivity assumed for predicates the estimator cannot analyze.
pub const DEFAULT_SELECTIVITY: f32 = 0.1;

fn clamp01(value: f32) -> f32 {
    if value < 0.0 {
        0.0
    } else if value > 1.0 {
        1.0
    } else {
        value
    }
}

/// A comparison of one schema column against a constant value, extracted from a conjunct.
struct ColumnComparison {
    column_index: usize,
    op: CompareType,
    value: Literal,
}

/// Recognizes `column op constant` and `constant op column` conjuncts against the given schema.
/// Anything else (including ambiguous column references) yields `None`.
fn resolve_column_comparison(left: &Expression,
                             op: CompareType,
                             right: &Expression,
                             schema: &Schema)
                             -> Option<ColumnComparison> {
    fn column_index(expr: &Expression, schema: &Schema) -> Option<usize> {
        match *expr {
            Expression::ColumnValue(ref name) => {
                let found = schema.find_columns(name);
                if found.len() == 1 {
                    Some(found[0].0)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn constant_value(expr: &Expression) -> Option<Literal> {
        if expr.is_constant() {
            expr.evaluate(&mut None).ok()
        } else {
            None
        }
    }

    if let (Some(index), Some(value)) = (column_index(left, schema), constant_value(right)) {
        return Some(ColumnComparison {
            column_index: index,
            op: op,
            value: value,
        });
    }
    if let (Some(value), Some(index)) = (constant_value(left), column_index(right, schema)) {
        return Some(ColumnComparison {
            column_index: index,
            op: op.flipped(),
            value: value,
        });
    }
    None
}

fn equality_selectivity(stats: &ColumnStats) -> f32 {
    match stats.num_unique_values {
        Some(v) if v > 0 => 1.0 / v as f32,
        _ => DEFAULT_SELECTIVITY,
    }
}

fn range_selectivity(stats: &ColumnStats, comparison: &ColumnComparison) -> f32 {
    let (min, max, value) = match (stats.min_value.as_ref().and_then(Literal::as_f64),
                                   stats.max_value.as_ref().and_then(Literal::as_f64),
                                   comparison.value.as_f64()) {
        (Some(min), Some(max), Some(value)) => (min, max, value),
        _ => {
            return DEFAULT_SELECTIVITY;
        }
    };

    let range = max - min;
    if range <= 0.0 {
        return DEFAULT_SELECTIVITY;
    }

    let fraction = match comparison.op {
        CompareType::GreaterThan |
        CompareType::GreaterThanEqual => (max - value) / range,
        CompareType::LessThan |
        CompareType::LessThanEqual => (value - min) / range,
        _ => {
            return DEFAULT_SELECTIVITY;
        }
    };
    clamp01(fraction as f32)
}

fn comparison_selectivity(comparison: &ColumnComparison, column_stats: &[ColumnStats]) -> f32 {
    let stats = match column_stats.get(comparison.column_index) {
        Some(stats) => stats,
        None => {
            return DEFAULT_SELECTIVITY;
        }
    };

    match comparison.op {
        CompareType::Equals => equality_selectivity(stats),
        CompareType::NotEquals => 1.0 - equality_selectivity(stats),
        _ => range_selectivity(stats, comparison),
    }
}

/// Estimates the fraction of input tuples that will satisfy the given predicate, in [0, 1].
///
/// # Arguments
/// * predicate - the predicate being applied
/// * schema - the schema of the tuples flowing into the predicate
/// * table_stats - table-level statistics of the input
/// * column_stats - per-column statistics of the input, parallel to the schema
pub fn estimate_selectivity(predicate: &Expression,
                            schema: &Schema,
                            table_stats: &TableStats,
                            column_stats: &[ColumnStats])
                            -> f32 {
    let selectivity = match *predicate {
        Expression::True => 1.0,
        Expression::False => 0.0,
        Expression::AND(ref exprs) => {
            // Independence assumption: conjunct selectivities multiply.
            exprs.iter()
                .map(|e| estimate_selectivity(e, schema, table_stats, column_stats))
                .product()
        }
        Expression::OR(ref exprs) => {
            // Inclusion-exclusion under independence.
            let miss: f32 = exprs.iter()
                .map(|e| 1.0 - estimate_selectivity(e, schema, table_stats, column_stats))
                .product();
            1.0 - miss
        }
        Expression::NOT(ref inner) => {
            1.0 - estimate_selectivity(inner, schema, table_stats, column_stats)
        }
        Expression::Compare(ref left, op, ref right) => {
            match resolve_column_comparison(left, op, right, schema) {
                Some(comparison) => comparison_selectivity(&comparison, column_stats),
                None => DEFAULT_SELECTIVITY,
            }
        }
        Expression::Between(ref value, ref low, ref high) => {
            let rewritten =
                Expression::AND(vec![Expression::Compare(value.clone(),
                                                         CompareType::GreaterThanEqual,
                                                         low.clone()),
                                     Expression::Compare(value.clone(),
                                                         CompareType::LessThanEqual,
                                                         high.clone())]);
            estimate_selectivity(&rewritten, schema, table_stats, column_stats)
        }
        Expression::IsNull(ref inner) => {
            match **inner {
                Expression::ColumnValue(ref name) => {
                    let found = schema.find_columns(name);
                    if found.len() != 1 {
                        DEFAULT_SELECTIVITY
                    } else {
                        let nulls = column_stats.get(found[0].0)
                            .and_then(|s| s.num_null_values);
                        match (nulls, table_stats.num_tuples) {
                            (Some(n), Some(t)) if t > 0 => n as f32 / t as f32,
                            _ => DEFAULT_SELECTIVITY,
                        }
                    }
                }
                _ => DEFAULT_SELECTIVITY,
            }
        }
        _ => DEFAULT_SELECTIVITY,
    };

    clamp01(selectivity)
}

/// Tightens column statistics to describe the tuples that survive the given predicate.  The
/// predicate is broken into conjuncts, which are applied one at a time so later conjuncts see
/// the effect of earlier ones; the result does not depend on conjunct order for the supported
/// shapes.
///
/// Only `column op constant` conjuncts update statistics: equality collapses the distinct count
/// to one and pins MIN = MAX = the value; range comparisons move the matching bound to the
/// comparison value.
pub fn update_stats(predicate: &Expression, schema: &Schema, column_stats: &mut [ColumnStats]) {
    let mut conjuncts = Vec::new();
    predicate.collect_conjuncts(&mut conjuncts);

    for conjunct in conjuncts {
        if let Expression::Compare(ref left, op, ref right) = conjunct {
            if let Some(comparison) = resolve_column_comparison(left, op, right, schema) {
                if let Some(stats) = column_stats.get_mut(comparison.column_index) {
                    apply_comparison(stats, &comparison);
                }
            }
        }
    }
}

fn apply_comparison(stats: &mut ColumnStats, comparison: &ColumnComparison) {
    match comparison.op {
        CompareType::Equals => {
            stats.num_unique_values = Some(1);
            if comparison.value.is_numeric() {
                stats.min_value = Some(comparison.value.clone());
                stats.max_value = Some(comparison.value.clone());
            }
        }
        CompareType::GreaterThan |
        CompareType::GreaterThanEqual => {
            // Survivors are all at least the comparison value.
            let raise = match stats.min_value {
                Some(ref min) => {
                    comparison.value.compare(min) == Some(::std::cmp::Ordering::Greater)
                }
                None => comparison.value.is_numeric(),
            };
            if raise {
                stats.min_value = Some(comparison.value.clone());
            }
        }
        CompareType::LessThan |
        CompareType::LessThanEqual => {
            let lower = match stats.max_value {
                Some(ref max) => {
                    comparison.value.compare(max) == Some(::std::cmp::Ordering::Less)
                }
                None => comparison.value.is_numeric(),
            };
            if lower {
                stats.max_value = Some(comparison.value.clone());
            }
        }
        CompareType::NotEquals => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::{ColumnInfo, ColumnType, Schema};
    use ::expressions::{CompareType, Expression, Literal};
    use ::stats::{ColumnStats, TableStats};

    fn cities_schema() -> Schema {
        Schema::with_columns(vec![
            ColumnInfo::with_table_name(ColumnType::Integer, "POPULATION", "CITIES"),
            ColumnInfo::with_table_name(ColumnType::VarChar { length: 30 }, "NAME", "CITIES"),
        ])
            .unwrap()
    }

    fn cities_stats() -> (TableStats, Vec<ColumnStats>) {
        let table = TableStats {
            num_data_pages: 10,
            num_tuples: Some(1000),
            avg_tuple_size: Some(30.0),
        };
        let columns = vec![ColumnStats {
                               num_unique_values: Some(200),
                               num_null_values: Some(50),
                               min_value: Some(Literal::Int(0)),
                               max_value: Some(Literal::Int(100_000)),
                           },
                           ColumnStats {
                               num_unique_values: Some(1000),
                               num_null_values: Some(0),
                               min_value: None,
                               max_value: None,
                           }];
        (table, columns)
    }

    fn population() -> Expression {
        Expression::ColumnValue((None, Some("POPULATION".into())))
    }

    fn compare(l: Expression, op: CompareType, r: Expression) -> Expression {
        Expression::Compare(Box::new(l), op, Box::new(r))
    }

    #[test]
    fn test_equality_uses_unique_count() {
        let schema = cities_schema();
        let (table, columns) = cities_stats();

        let eq = compare(population(), CompareType::Equals, Expression::Int(42));
        let sel = estimate_selectivity(&eq, &schema, &table, &columns);
        assert!((sel - 1.0 / 200.0).abs() < 1e-6);

        let ne = compare(population(), CompareType::NotEquals, Expression::Int(42));
        let sel = estimate_selectivity(&ne, &schema, &table, &columns);
        assert!((sel - (1.0 - 1.0 / 200.0)).abs() < 1e-6);
    }

    #[test]
    fn test_range_interpolates() {
        let schema = cities_schema();
        let (table, columns) = cities_stats();

        let gt = compare(population(), CompareType::GreaterThan, Expression::Int(75_000));
        let sel = estimate_selectivity(&gt, &schema, &table, &columns);
        assert!((sel - 0.25).abs() < 1e-6);

        // The flipped form estimates identically.
        let flipped = compare(Expression::Int(75_000), CompareType::LessThan, population());
        let sel = estimate_selectivity(&flipped, &schema, &table, &columns);
        assert!((sel - 0.25).abs() < 1e-6);

        // Out-of-range constants clamp.
        let all = compare(population(), CompareType::GreaterThan, Expression::Int(-5));
        assert_eq!(1.0, estimate_selectivity(&all, &schema, &table, &columns));
        let none = compare(population(), CompareType::GreaterThan, Expression::Int(200_000));
        assert_eq!(0.0, estimate_selectivity(&none, &schema, &table, &columns));
    }

    #[test]
    fn test_is_null_uses_null_count() {
        let schema = cities_schema();
        let (table, columns) = cities_stats();

        let is_null = Expression::IsNull(Box::new(population()));
        let sel = estimate_selectivity(&is_null, &schema, &table, &columns);
        assert!((sel - 0.05).abs() < 1e-6);

        let not_null = Expression::NOT(Box::new(Expression::IsNull(Box::new(population()))));
        let sel = estimate_selectivity(&not_null, &schema, &table, &columns);
        assert!((sel - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_boolean_combinations() {
        let schema = cities_schema();
        let (table, columns) = cities_stats();

        let a = compare(population(), CompareType::GreaterThan, Expression::Int(50_000));
        let b = compare(population(), CompareType::Equals, Expression::Int(42));

        let and = Expression::AND(vec![a.clone(), b.clone()]);
        let sel_and = estimate_selectivity(&and, &schema, &table, &columns);
        assert!((sel_and - 0.5 * (1.0 / 200.0)).abs() < 1e-6);

        let or = Expression::OR(vec![a.clone(), b.clone()]);
        let expected = 1.0 - (1.0 - 0.5) * (1.0 - 1.0 / 200.0);
        let sel_or = estimate_selectivity(&or, &schema, &table, &columns);
        assert!((sel_or - expected).abs() < 1e-6);
    }

    #[test]
    fn test_unanalyzable_conjuncts_get_default() {
        let schema = cities_schema();
        let (table, columns) = cities_stats();

        // Two columns.
        let two_cols = compare(population(),
                               CompareType::Equals,
                               Expression::ColumnValue((None, Some("NAME".into()))));
        assert_eq!(DEFAULT_SELECTIVITY,
                   estimate_selectivity(&two_cols, &schema, &table, &columns));

        // No columns.
        let no_cols = compare(Expression::Int(1), CompareType::Equals, Expression::Int(1));
        assert_eq!(DEFAULT_SELECTIVITY,
                   estimate_selectivity(&no_cols, &schema, &table, &columns));
    }

    #[test]
    fn test_selectivity_always_in_bounds() {
        let schema = cities_schema();
        let (table, columns) = cities_stats();

        let ops = vec![CompareType::Equals,
                       CompareType::NotEquals,
                       CompareType::LessThan,
                       CompareType::LessThanEqual,
                       CompareType::GreaterThan,
                       CompareType::GreaterThanEqual];
        for op in ops {
            for v in vec![-1_000_000, 0, 42, 100_000, 1_000_000] {
                let expr = compare(population(), op, Expression::Int(v));
                let sel = estimate_selectivity(&expr, &schema, &table, &columns);
                assert!(sel >= 0.0 && sel <= 1.0, "selectivity {} out of bounds", sel);

                let negated = Expression::NOT(Box::new(expr));
                let sel = estimate_selectivity(&negated, &schema, &table, &columns);
                assert!(sel >= 0.0 && sel <= 1.0);
            }
        }
    }

    #[test]
    fn test_range_filter_shrinks_stats() {
        let schema = cities_schema();
        let (_, mut columns) = cities_stats();

        // population > 75000 raises MIN to the comparison value and keeps MAX.
        let gt = compare(population(), CompareType::GreaterThan, Expression::Int(75_000));
        update_stats(&gt, &schema, &mut columns);
        assert_eq!(Some(Literal::Int(75_000)), columns[0].min_value);
        assert_eq!(Some(Literal::Int(100_000)), columns[0].max_value);

        // A later equality collapses the column to a single value.
        let eq = compare(population(), CompareType::Equals, Expression::Int(80_000));
        update_stats(&eq, &schema, &mut columns);
        assert_eq!(Some(1), columns[0].num_unique_values);
        assert_eq!(Some(Literal::Int(80_000)), columns[0].min_value);
        assert_eq!(Some(Literal::Int(80_000)), columns[0].max_value);
    }

    #[test]
    fn test_update_stats_order_invariant() {
        let schema = cities_schema();

        let gt = compare(population(), CompareType::GreaterThan, Expression::Int(10));
        let lt = compare(population(), CompareType::LessThan, Expression::Int(90));

        let (_, mut forward) = cities_stats();
        update_stats(&Expression::AND(vec![gt.clone(), lt.clone()]), &schema, &mut forward);

        let (_, mut backward) = cities_stats();
        update_stats(&Expression::AND(vec![lt, gt]), &schema, &mut backward);

        assert_eq!(forward, backward);
        assert_eq!(Some(Literal::Int(10)), forward[0].min_value);
        assert_eq!(Some(Literal::Int(90)), forward[0].max_value);
    }
}
