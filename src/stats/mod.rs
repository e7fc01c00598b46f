//! Table and column statistics.
//!
//! Statistics are collected by `ANALYZE` (a full scan of the table), persisted into the table
//! file's header page, and consumed by the planner: selectivity estimates scale tuple counts,
//! and plan nodes propagate *updated copies* of the column statistics so that predicates applied
//! higher in a plan see the effects of predicates applied below.

pub mod selectivity;

pub use self::selectivity::{DEFAULT_SELECTIVITY, estimate_selectivity, update_stats};

use std::cmp::Ordering;
use std::collections::HashSet;
use std::io::{self, Seek};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use ::expressions::Literal;
use ::relations::{ColumnType, Schema};

/// Sentinel stored on disk for an unknown count.
const UNKNOWN_COUNT: u32 = 0xFFFF_FFFF;

/// Once a column's distinct-value set grows past this bound, exact distinct counting is
/// abandoned for that column.
pub const MAX_DISTINCT_TRACKED: usize = 1024;

/// Statistics describing a whole table: `B(R)` data pages, `T(R)` tuples, and `A(R)` average
/// tuple bytes.  Fresh tables have unknown statistics until `ANALYZE` runs.
#[derive(Debug, Clone, PartialEq)]
pub struct TableStats {
    /// The number of data pages in the table file (the header page is not counted).
    pub num_data_pages: u16,
    /// The number of live tuples in the table, when known.
    pub num_tuples: Option<u32>,
    /// The average number of bytes a live tuple occupies, when known.
    pub avg_tuple_size: Option<f32>,
}

impl TableStats {
    /// Statistics for a table that has never been analyzed.
    pub fn unknown() -> TableStats {
        TableStats {
            num_data_pages: 0,
            num_tuples: None,
            avg_tuple_size: None,
        }
    }

    /// The tuple count to plan with: the recorded count, or a guess when the table has never
    /// been analyzed.
    pub fn estimated_num_tuples(&self) -> f32 {
        match self.num_tuples {
            Some(t) => t as f32,
            // An unanalyzed table is assumed to be small but not empty.
            None => 1000.0,
        }
    }

    /// The average tuple size to plan with.
    pub fn estimated_tuple_size(&self) -> f32 {
        self.avg_tuple_size.unwrap_or(100.0)
    }

    /// Serializes the table statistics at the writer's current position.
    pub fn write<W: WriteBytesExt>(&self, output: &mut W) -> io::Result<()> {
        output.write_u16::<BigEndian>(self.num_data_pages)?;
        output.write_u32::<BigEndian>(self.num_tuples.unwrap_or(UNKNOWN_COUNT))?;
        output.write_f32::<BigEndian>(self.avg_tuple_size.unwrap_or(-1.0))?;
        Ok(())
    }

    /// Deserializes table statistics from the reader's current position.
    pub fn read<R: ReadBytesExt>(input: &mut R) -> io::Result<TableStats> {
        let num_data_pages = input.read_u16::<BigEndian>()?;
        let num_tuples = match input.read_u32::<BigEndian>()? {
            UNKNOWN_COUNT => None,
            t => Some(t),
        };
        let avg_tuple_size = match input.read_f32::<BigEndian>()? {
            s if s < 0.0 => None,
            s => Some(s),
        };
        Ok(TableStats {
            num_data_pages: num_data_pages,
            num_tuples: num_tuples,
            avg_tuple_size: avg_tuple_size,
        })
    }
}

/// Statistics describing one column: `V(c)` distinct non-null values, `N(c)` nulls, and the
/// observed MIN/MAX for ordered (numeric) types.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnStats {
    /// The number of distinct non-`NULL` values, when known.
    pub num_unique_values: Option<u32>,
    /// The number of `NULL` values, when known.
    pub num_null_values: Option<u32>,
    /// The smallest non-`NULL` value, for ordered column types.
    pub min_value: Option<Literal>,
    /// The largest non-`NULL` value, for ordered column types.
    pub max_value: Option<Literal>,
}

impl ColumnStats {
    /// Statistics for a column that has never been analyzed.
    pub fn unknown() -> ColumnStats {
        ColumnStats {
            num_unique_values: None,
            num_null_values: None,
            min_value: None,
            max_value: None,
        }
    }

    /// Serializes the column statistics.  Min/max values are encoded by the column's type; only
    /// numeric types carry them.
    pub fn write<W: WriteBytesExt>(&self,
                                   output: &mut W,
                                   col_type: ColumnType)
                                   -> io::Result<()> {
        let mut flags = 0u8;
        if self.num_unique_values.is_some() {
            flags |= 0x01;
        }
        if self.num_null_values.is_some() {
            flags |= 0x02;
        }
        if self.min_value.is_some() {
            flags |= 0x04;
        }
        if self.max_value.is_some() {
            flags |= 0x08;
        }
        output.write_u8(flags)?;

        output.write_u32::<BigEndian>(self.num_unique_values.unwrap_or(UNKNOWN_COUNT))?;
        output.write_u32::<BigEndian>(self.num_null_values.unwrap_or(UNKNOWN_COUNT))?;

        if let Some(ref min) = self.min_value {
            write_stat_literal(output, col_type, min)?;
        }
        if let Some(ref max) = self.max_value {
            write_stat_literal(output, col_type, max)?;
        }
        Ok(())
    }

    /// Deserializes column statistics written by [`write`](#method.write).
    pub fn read<R: ReadBytesExt>(input: &mut R, col_type: ColumnType) -> io::Result<ColumnStats> {
        let flags = input.read_u8()?;

        let num_unique = input.read_u32::<BigEndian>()?;
        let num_null = input.read_u32::<BigEndian>()?;

        let min_value = if flags & 0x04 != 0 {
            Some(read_stat_literal(input, col_type)?)
        } else {
            None
        };
        let max_value = if flags & 0x08 != 0 {
            Some(read_stat_literal(input, col_type)?)
        } else {
            None
        };

        Ok(ColumnStats {
            num_unique_values: if flags & 0x01 != 0 {
                Some(num_unique)
            } else {
                None
            },
            num_null_values: if flags & 0x02 != 0 {
                Some(num_null)
            } else {
                None
            },
            min_value: min_value,
            max_value: max_value,
        })
    }
}

fn write_stat_literal<W: WriteBytesExt>(output: &mut W,
                                        col_type: ColumnType,
                                        value: &Literal)
                                        -> io::Result<()> {
    let bad_value = || io::Error::from(io::ErrorKind::InvalidData);
    match col_type {
        ColumnType::TinyInt => output.write_i8(value.as_i64().ok_or_else(&bad_value)? as i8),
        ColumnType::SmallInt => {
            output.write_i16::<BigEndian>(value.as_i64().ok_or_else(&bad_value)? as i16)
        }
        ColumnType::Integer => {
            output.write_i32::<BigEndian>(value.as_i64().ok_or_else(&bad_value)? as i32)
        }
        ColumnType::BigInt => {
            output.write_i64::<BigEndian>(value.as_i64().ok_or_else(&bad_value)?)
        }
        ColumnType::Float => {
            output.write_f32::<BigEndian>(value.as_f64().ok_or_else(&bad_value)? as f32)
        }
        ColumnType::Double => {
            output.write_f64::<BigEndian>(value.as_f64().ok_or_else(&bad_value)?)
        }
        _ => Err(bad_value()),
    }
}

fn read_stat_literal<R: ReadBytesExt>(input: &mut R, col_type: ColumnType) -> io::Result<Literal> {
    match col_type {
        ColumnType::TinyInt => Ok(Literal::Int(input.read_i8()? as i32)),
        ColumnType::SmallInt => Ok(Literal::Int(input.read_i16::<BigEndian>()? as i32)),
        ColumnType::Integer => Ok(Literal::Int(input.read_i32::<BigEndian>()?)),
        ColumnType::BigInt => Ok(Literal::Long(input.read_i64::<BigEndian>()?)),
        ColumnType::Float => Ok(Literal::Float(input.read_f32::<BigEndian>()?)),
        ColumnType::Double => Ok(Literal::Double(input.read_f64::<BigEndian>()?)),
        _ => Err(io::ErrorKind::InvalidData.into()),
    }
}

/// Serializes a full set of table statistics (table-level plus one entry per column) at the
/// writer's current position, returning the number of bytes written.
pub fn write_table_stats<W: WriteBytesExt + Seek>(output: &mut W,
                                                  schema: &Schema,
                                                  table_stats: &TableStats,
                                                  column_stats: &[ColumnStats])
                                                  -> io::Result<u16> {
    let start = output.seek(io::SeekFrom::Current(0))?;

    table_stats.write(output)?;
    for (info, stats) in schema.iter().zip(column_stats.iter()) {
        stats.write(output, info.column_type)?;
    }

    let end = output.seek(io::SeekFrom::Current(0))?;
    Ok((end - start) as u16)
}

/// Deserializes a full set of table statistics written by
/// [`write_table_stats`](fn.write_table_stats.html).
pub fn read_table_stats<R: ReadBytesExt>(input: &mut R,
                                         schema: &Schema)
                                         -> io::Result<(TableStats, Vec<ColumnStats>)> {
    let table_stats = TableStats::read(input)?;
    let mut column_stats = Vec::with_capacity(schema.num_columns());
    for info in schema.iter() {
        column_stats.push(ColumnStats::read(input, info.column_type)?);
    }
    Ok((table_stats, column_stats))
}

/// Gathers one column's statistics during a table scan.  Distinct values are counted exactly
/// through a bounded set; once the set overflows, the collector falls back to reporting the
/// non-null count as a coarse upper bound on the distinct count.
#[derive(Debug, Clone)]
pub struct ColumnStatsCollector {
    col_type: ColumnType,
    num_null_values: u32,
    num_non_null: u32,
    distinct: HashSet<Literal>,
    distinct_overflowed: bool,
    min_value: Option<Literal>,
    max_value: Option<Literal>,
}

impl ColumnStatsCollector {
    /// Creates a collector for a column of the given type.
    pub fn new(col_type: ColumnType) -> ColumnStatsCollector {
        ColumnStatsCollector {
            col_type: col_type,
            num_null_values: 0,
            num_non_null: 0,
            distinct: HashSet::new(),
            distinct_overflowed: false,
            min_value: None,
            max_value: None,
        }
    }

    /// Feeds one column value from the scan into the collector.
    pub fn add_value(&mut self, value: Literal) {
        if value == Literal::Null {
            self.num_null_values += 1;
            return;
        }
        self.num_non_null += 1;

        if !self.distinct_overflowed {
            self.distinct.insert(value.clone());
            if self.distinct.len() > MAX_DISTINCT_TRACKED {
                self.distinct.clear();
                self.distinct_overflowed = true;
            }
        }

        if self.col_type.is_ordered() {
            let replace_min = match self.min_value {
                Some(ref min) => value.compare(min) == Some(Ordering::Less),
                None => true,
            };
            if replace_min {
                self.min_value = Some(value.clone());
            }
            let replace_max = match self.max_value {
                Some(ref max) => value.compare(max) == Some(Ordering::Greater),
                None => true,
            };
            if replace_max {
                self.max_value = Some(value);
            }
        }
    }

    /// Produces the collected statistics.
    pub fn finish(self) -> ColumnStats {
        let num_unique = if self.distinct_overflowed {
            self.num_non_null
        } else {
            self.distinct.len() as u32
        };
        ColumnStats {
            num_unique_values: Some(num_unique),
            num_null_values: Some(self.num_null_values),
            min_value: self.min_value,
            max_value: self.max_value,
        }
    }
}
