//! This module contains utilities and classes for handling table schemas.

use std::collections::{HashMap, HashSet};
use std::io::{self, Seek, SeekFrom};
use std::iter::{FromIterator, IntoIterator};
use std::ops::Index;
use std::slice::Iter;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use ::relations::{ColumnInfo, ColumnName, ColumnType, EMPTY_CHAR, EMPTY_NUMERIC, EMPTY_VARCHAR};
use ::storage::{ReadNanoDBExt, WriteNanoDBExt};

/// The kind of a key constraint declared on a table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyType {
    /// A primary key: unique and not null.
    Primary,
    /// A unique (candidate) key.
    Unique,
    /// A foreign key referencing another table's candidate key.
    Foreign,
}

impl From<KeyType> for u8 {
    fn from(kind: KeyType) -> u8 {
        match kind {
            KeyType::Primary => 1,
            KeyType::Unique => 2,
            KeyType::Foreign => 3,
        }
    }
}

/// A key constraint over a set of the table's columns.  Foreign-key constraints record the
/// referenced table; referential enforcement is left to the commands that care.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyConstraint {
    /// What kind of key this is.
    pub kind: KeyType,
    /// The names of the columns making up the key, in declaration order.
    pub columns: Vec<String>,
    /// For foreign keys, the name of the referenced table.
    pub ref_table: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
/// An error that can occur while handling schemas.
pub enum Error {
    /// An error occurred while performing I/O.
    IOError(String),
    /// The serialized schema could not be decoded.
    ParseError,
    /// The specified column is a duplicate of an existing one.
    Duplicate(ColumnInfo),
    /// Tables must have at least one column.
    NoColumns,
    /// Schemas can hold at most 255 columns.
    TooManyColumns(usize),
    /// The column name at the given index was empty.
    EmptyColumnName(usize),
    /// Setting all of the tables on the schema to a certain name would result in ambiguous
    /// column names.  In the form of (new table name, ambiguous columns).
    AmbiguousColumnsAfterTableRename(String, Vec<String>),
    /// A key constraint references a column that is not part of the schema.
    UnknownKeyColumn(String),
}

impl ::std::fmt::Display for Error {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        match *self {
            Error::IOError(ref e) => write!(f, "An IO error occurred: {}", e),
            Error::ParseError => write!(f, "The stored schema could not be decoded."),
            Error::Duplicate(ref ci) => {
                write!(f, "The column info {} is a duplicate of an existing one.", ci)
            }
            Error::NoColumns => write!(f, "All schemas must have at least one column."),
            Error::TooManyColumns(n) => {
                write!(f, "Schemas are limited to 255 columns; got {}.", n)
            }
            Error::EmptyColumnName(idx) => {
                write!(f, "The column name at index {} does not have a name.", idx)
            }
            Error::AmbiguousColumnsAfterTableRename(ref table_name, ref ambiguous_columns) => {
                write!(f,
                       "Overriding table-name to \"{}\" would produce ambiguous columns: {}",
                       table_name,
                       ambiguous_columns.join(", "))
            }
            Error::UnknownKeyColumn(ref name) => {
                write!(f, "The key column {} is not part of the schema.", name)
            }
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::IOError(format!("{}", e))
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A schema is an ordered collection of column names and associated types.
///
/// Many different entities in the database code can have schema associated with them.  Both
/// tables and tuples have schemas, for obvious reasons.  `SELECT` and `FROM` clauses also have
/// schemas, used by the database engine to verify the semantics of database queries.  Finally,
/// relational algebra plan nodes also have schemas, which specify the kinds of tuples that they
/// generate.
pub struct Schema {
    column_infos: Vec<ColumnInfo>,
    cols_hashed_by_table: HashMap<Option<String>, HashMap<Option<String>, usize>>,
    cols_hashed_by_column: HashMap<Option<String>, Vec<usize>>,
    key_constraints: Vec<KeyConstraint>,
}

impl Index<usize> for Schema {
    type Output = ColumnInfo;

    fn index(&self, i: usize) -> &Self::Output {
        &self.column_infos[i]
    }
}

impl IntoIterator for Schema {
    type Item = ColumnInfo;
    type IntoIter = ::std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.column_infos.into_iter()
    }
}

impl Schema {
    /// Instantiates a new schema with no columns in it.
    pub fn new() -> Schema {
        Schema {
            column_infos: vec![],
            cols_hashed_by_table: Default::default(),
            cols_hashed_by_column: Default::default(),
            key_constraints: vec![],
        }
    }

    /// Instantiates a schema with the given columns.
    ///
    /// # Arguments
    /// * column_infos - Some collection of column infos.
    ///
    /// # Errors
    /// This constructor will fail if adding a column would fail at any point.
    pub fn with_columns<I: IntoIterator<Item = ColumnInfo>>(column_infos: I)
                                                            -> Result<Schema, Error> {
        let mut result = Schema::new();
        result.add_columns(column_infos).map(|_| result)
    }

    /// Checks if the schema is empty.
    pub fn is_empty(&self) -> bool {
        self.column_infos.is_empty()
    }

    /// Returns an iterator on the column infos.
    pub fn iter(&self) -> Iter<ColumnInfo> {
        self.column_infos.iter()
    }

    /// Returns the number of columns currently in the schema.
    pub fn num_columns(&self) -> usize {
        self.column_infos.len()
    }

    /// The key constraints declared on the schema.
    pub fn key_constraints(&self) -> &[KeyConstraint] {
        &self.key_constraints
    }

    /// Declares a key constraint over columns of this schema.
    ///
    /// # Errors
    /// Fails if any named column is not present in the schema.
    pub fn add_key_constraint(&mut self, constraint: KeyConstraint) -> Result<(), Error> {
        for name in constraint.columns.iter() {
            if self.get_column(name.clone()).is_none() {
                return Err(Error::UnknownKeyColumn(name.clone()));
            }
        }
        self.key_constraints.push(constraint);
        Ok(())
    }

    /// Checks if the schema has a column with the provided name.
    ///
    /// # Arguments
    /// * name - The desired column name.
    pub fn has_column<S: Into<String>>(&self, name: S) -> bool {
        self.get_column(name).is_some()
    }

    /// If the schema has a column with the provided name, return that column.
    ///
    /// # Arguments
    /// * name - The desired column name.
    pub fn get_column<S: Into<String>>(&self, name: S) -> Option<&ColumnInfo> {
        let name = name.into();
        self.column_infos
            .iter()
            .find(|info| info.name.as_ref() == Some(&name))
    }

    /// This helper method returns true if this schema contains any columns with the same column
    /// name but different table names.  If so, the schema is not valid for use on one side of a
    /// `NATURAL` join.
    pub fn has_multiple_columns_with_same_name(&self) -> bool {
        self.cols_hashed_by_column
            .values()
            .any(|indexes| indexes.len() > 1)
    }

    /// Returns the number of columns that have the specified column name.  Note that multiple
    /// columns can have the same column name but different table names.
    pub fn num_columns_with_name<S: Into<String>>(&self, name: S) -> usize {
        match self.cols_hashed_by_column.get(&Some(name.into())) {
            Some(names) => names.len(),
            None => 0,
        }
    }

    /// Returns the names of columns that are common between this schema and the specified
    /// schema.  This kind of operation is mainly used for resolving `NATURAL` joins.
    pub fn get_common_column_names(&self, other: &Schema) -> HashSet<String> {
        let left_names: HashSet<&Option<String>> =
            HashSet::from_iter(self.cols_hashed_by_column.keys());
        let right_names = HashSet::from_iter(other.cols_hashed_by_column.keys());

        let mut result = HashSet::new();
        for common in left_names.intersection(&right_names) {
            if let Some(ref name) = **common {
                result.insert(name.clone());
            }
        }
        result
    }

    /// Add one column to the schema.
    ///
    /// # Arguments
    /// * column - The information about the desired column to add.
    ///
    /// # Errors
    /// This will fail if a column with the same (table, column) name already exists.
    pub fn add_column(&mut self, column: ColumnInfo) -> Result<(), Error> {
        if column.name.is_some() {
            // If the column is named, make sure it's not already in the schema under the same
            // table name.
            if let Some(table_map) = self.cols_hashed_by_table.get(&column.table_name) {
                if table_map.get(&column.name).is_some() {
                    return Err(Error::Duplicate(column));
                }
            }
        }

        let index = self.column_infos.len();

        let table_map = self.cols_hashed_by_table
            .entry(column.table_name.clone())
            .or_insert(Default::default());
        table_map.insert(column.name.clone(), index);

        let column_list = self.cols_hashed_by_column
            .entry(column.name.clone())
            .or_insert(Default::default());
        column_list.push(index);

        self.column_infos.push(column);
        Ok(())
    }

    /// Add multiple columns to the schema.
    ///
    /// # Arguments
    /// * schema - Some collection of column info.
    ///
    /// # Errors
    /// This method will fail if adding a column would fail at any point.
    pub fn add_columns<T: IntoIterator<Item = ColumnInfo>>(&mut self, schema: T) -> Result<(), Error> {
        for column in schema {
            self.add_column(column)?;
        }
        Ok(())
    }

    /// Given a (possibly wildcard) column-name, this method returns the collection of all
    /// columns that match the specified column name, as (index, column-info) pairs in schema
    /// order.
    ///
    /// Any valid column-name object will work, so all of these options are available:
    ///
    ///   * **No table, only a column name** - to resolve an unqualified column name, e.g. in an
    ///     expression or predicate
    ///   * **A table and column name** - to check whether the schema contains such a column
    ///   * **A wildcard without a table name** - to retrieve all columns in the schema
    ///   * **A wildcard with a table name** - to retrieve all columns associated with a
    ///     particular table name
    pub fn find_columns(&self, col_name: &ColumnName) -> Vec<(usize, ColumnInfo)> {
        let mut found: Vec<(usize, ColumnInfo)> = Vec::new();

        match *col_name {
            (Some(ref table_name), Some(ref column_name)) => {
                let table_key = Some(table_name.clone());
                let column_key = Some(column_name.clone());
                if let Some(table_cols) = self.cols_hashed_by_table.get(&table_key) {
                    if let Some(index) = table_cols.get(&column_key) {
                        found.push((*index, self.column_infos[*index].clone()));
                    }
                }
            }
            (Some(ref table_name), None) => {
                let key = Some(table_name.clone());
                if let Some(table_cols) = self.cols_hashed_by_table.get(&key) {
                    found.extend(table_cols.values()
                        .map(|idx| (*idx, self.column_infos[*idx].clone())));
                }
            }
            (None, Some(ref column_name)) => {
                let key = Some(column_name.clone());
                if let Some(columns) = self.cols_hashed_by_column.get(&key) {
                    for index in columns {
                        found.push((*index, self.column_infos[*index].clone()));
                    }
                }
            }
            (None, None) => {
                for (idx, val) in self.column_infos.iter().enumerate() {
                    found.push((idx, val.clone()));
                }
            }
        }

        found.sort_by_key(|&(idx, _)| idx);
        found
    }

    /// This method iterates through all columns in this schema and sets them all to be on the
    /// specified table.  This method will return an error if the result would be an invalid
    /// schema with duplicate column names.
    pub fn set_table_name<S: Into<String>>(&mut self, name: S) -> Result<(), Error> {
        let name = name.into();

        // First, verify that overriding the table names will not produce multiple ambiguous
        // column names.
        let mut duplicates: Vec<String> = Vec::new();
        for (col_name, indices) in self.cols_hashed_by_column.iter() {
            if let Some(ref col_name) = *col_name {
                if indices.len() > 1 {
                    duplicates.push(col_name.clone());
                }
            }
        }
        if !duplicates.is_empty() {
            duplicates.sort();
            return Err(Error::AmbiguousColumnsAfterTableRename(name, duplicates));
        }

        let old_infos = self.column_infos.clone();
        let old_constraints = self.key_constraints.clone();

        self.column_infos.clear();
        self.cols_hashed_by_column.clear();
        self.cols_hashed_by_table.clear();
        self.key_constraints.clear();

        // Re-add every column with the new table name so the hash structures stay consistent.
        for info in old_infos {
            let mut new_info = info;
            new_info.table_name = Some(name.clone());
            self.add_column(new_info)?;
        }
        self.key_constraints = old_constraints;

        Ok(())
    }

    /// Write the schema to some output, starting at the output's current position.  Returns the
    /// number of bytes written.
    ///
    /// The layout is: `u8` column count, then for each column a 1-byte type id, the per-type
    /// parameters (`CHAR`/`VARCHAR`: `u16` length; `NUMERIC`: `u8` precision, `u8` scale), the
    /// table name and the column name as length-prefixed strings; finally the key-constraint
    /// section.
    pub fn write<W: WriteNanoDBExt + Seek>(&self, output: &mut W) -> Result<u16, Error> {
        if self.column_infos.is_empty() {
            return Err(Error::NoColumns);
        }
        if self.column_infos.len() > 255 {
            return Err(Error::TooManyColumns(self.column_infos.len()));
        }

        let start = output.seek(SeekFrom::Current(0))?;

        output.write_u8(self.column_infos.len() as u8)?;
        for column_info in self.column_infos.iter() {
            output.write_u8(column_info.column_type.into())?;

            match column_info.column_type {
                ColumnType::Char { length } |
                ColumnType::VarChar { length } => {
                    output.write_u16::<BigEndian>(length)?;
                }
                ColumnType::Numeric { precision, scale } => {
                    output.write_u8(precision)?;
                    output.write_u8(scale)?;
                }
                _ => {}
            }

            output.write_varchar255(column_info.table_name.clone().unwrap_or_default())?;
            output.write_varchar255(column_info.name.clone().unwrap_or_default())?;
        }

        output.write_u8(self.key_constraints.len() as u8)?;
        for constraint in self.key_constraints.iter() {
            output.write_u8(constraint.kind.into())?;
            output.write_u8(constraint.columns.len() as u8)?;
            for column in constraint.columns.iter() {
                output.write_varchar255(column.clone())?;
            }
            output.write_varchar255(constraint.ref_table.clone().unwrap_or_default())?;
        }

        let end = output.seek(SeekFrom::Current(0))?;
        Ok((end - start) as u16)
    }

    /// Reads a schema from some input, starting at the input's current position.  This is the
    /// inverse of [`write`](#method.write).
    pub fn read<R: ReadNanoDBExt + Seek>(input: &mut R) -> Result<Schema, Error> {
        let num_cols = input.read_u8()?;
        debug!("Stored schema has {} columns.", num_cols);

        if num_cols < 1 {
            return Err(Error::NoColumns);
        }

        let mut result = Schema::new();
        for i in 0..num_cols {
            let type_id = input.read_u8()?;
            let col_type = if type_id == u8::from(EMPTY_CHAR) {
                ColumnType::Char { length: input.read_u16::<BigEndian>()? }
            } else if type_id == u8::from(EMPTY_VARCHAR) {
                ColumnType::VarChar { length: input.read_u16::<BigEndian>()? }
            } else if type_id == u8::from(EMPTY_NUMERIC) {
                ColumnType::Numeric {
                    precision: input.read_u8()?,
                    scale: input.read_u8()?,
                }
            } else {
                type_id.into()
            };

            let table_name = input.read_varchar255().map_err(|_| Error::ParseError)?;
            let col_name = input.read_varchar255().map_err(|_| Error::ParseError)?;

            if col_name.is_empty() {
                return Err(Error::EmptyColumnName(i as usize));
            }

            let info = if table_name.is_empty() {
                ColumnInfo::with_name(col_type, col_name)
            } else {
                ColumnInfo::with_table_name(col_type, col_name, table_name)
            };
            result.add_column(info)?;
        }

        let num_constraints = input.read_u8()?;
        for _ in 0..num_constraints {
            let kind = match input.read_u8()? {
                1 => KeyType::Primary,
                2 => KeyType::Unique,
                3 => KeyType::Foreign,
                _ => {
                    return Err(Error::ParseError);
                }
            };
            let num_key_cols = input.read_u8()?;
            let mut columns = Vec::with_capacity(num_key_cols as usize);
            for _ in 0..num_key_cols {
                columns.push(input.read_varchar255().map_err(|_| Error::ParseError)?);
            }
            let ref_table = input.read_varchar255().map_err(|_| Error::ParseError)?;
            result.add_key_constraint(KeyConstraint {
                    kind: kind,
                    columns: columns,
                    ref_table: if ref_table.is_empty() {
                        None
                    } else {
                        Some(ref_table)
                    },
                })?;
        }

        Ok(result)
    }
}

impl ::std::fmt::Display for Schema {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        let infos: Vec<String> = self.column_infos.iter().map(|c| format!("{}", c)).collect();
        write!(f, "Schema[cols={}]", infos.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Seek, SeekFrom};

    use super::*;
    use ::relations::{ColumnInfo, ColumnType};

    #[test]
    fn test_index_and_iter() {
        let info1 = ColumnInfo::with_name(ColumnType::Integer, "foo");
        let info2 = ColumnInfo::with_name(ColumnType::Float, "bar");
        let schema = Schema::with_columns(vec![info1.clone(), info2.clone()]).unwrap();

        assert_eq!(schema[0], info1);
        assert_eq!(schema[1], info2);
        assert_eq!(schema.clone().into_iter().collect::<Vec<ColumnInfo>>(),
                   vec![info1, info2]);
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let mut schema = Schema::new();
        schema.add_column(ColumnInfo::with_table_name(ColumnType::Integer, "A", "FOO")).unwrap();
        let dup = ColumnInfo::with_table_name(ColumnType::Integer, "A", "FOO");
        assert_eq!(Err(Error::Duplicate(dup.clone())), schema.add_column(dup));

        // Same column name under a different table name is fine.
        assert_eq!(Ok(()),
                   schema.add_column(ColumnInfo::with_table_name(ColumnType::Integer, "A", "BAR")));
    }

    #[test]
    fn test_write_read_round_trip() {
        let mut schema = Schema::with_columns(vec![
            ColumnInfo::with_table_name(ColumnType::Integer, "A", "FOO"),
            ColumnInfo::with_table_name(ColumnType::VarChar { length: 20 }, "B", "FOO"),
            ColumnInfo::with_table_name(ColumnType::Char { length: 4 }, "C", "FOO"),
            ColumnInfo::with_table_name(ColumnType::Numeric { precision: 10, scale: 2 },
                                        "D",
                                        "FOO"),
        ])
            .unwrap();
        schema.add_key_constraint(KeyConstraint {
                kind: KeyType::Primary,
                columns: vec!["A".into()],
                ref_table: None,
            })
            .unwrap();

        let mut cursor = Cursor::new(vec![0u8; 512]);
        let size = schema.write(&mut cursor).unwrap();
        assert!(size > 0);

        cursor.seek(SeekFrom::Start(0)).unwrap();
        let read_back = Schema::read(&mut cursor).unwrap();
        assert_eq!(schema, read_back);
    }

    #[test]
    fn test_find_columns() {
        let foo_a = ColumnInfo::with_table_name(ColumnType::Integer, "A", "FOO");
        let foo_b = ColumnInfo::with_table_name(ColumnType::VarChar { length: 20 }, "B", "FOO");
        let bar_a = ColumnInfo::with_table_name(ColumnType::Integer, "A", "BAR");

        let schema = Schema::with_columns(vec![foo_a.clone(), foo_b.clone(), bar_a.clone()])
            .unwrap();

        assert_eq!(vec![(0, foo_a.clone()), (1, foo_b.clone())],
                   schema.find_columns(&(Some("FOO".into()), None)));
        assert_eq!(vec![(1, foo_b.clone())],
                   schema.find_columns(&(Some("FOO".into()), Some("B".into()))));
        assert_eq!(vec![(0, foo_a.clone()), (2, bar_a.clone())],
                   schema.find_columns(&(None, Some("A".into()))));
        assert_eq!(vec![(0, foo_a.clone()), (1, foo_b.clone()), (2, bar_a.clone())],
                   schema.find_columns(&(None, None)));
        assert!(schema.find_columns(&(Some("BAZ".into()), None)).is_empty());
    }

    #[test]
    fn test_set_table_name() {
        let a = ColumnInfo::with_name(ColumnType::Integer, "A");
        let b = ColumnInfo::with_name(ColumnType::Float, "B");
        let a_abc = ColumnInfo::with_table_name(ColumnType::Integer, "A", "ABC");
        let b_abc = ColumnInfo::with_table_name(ColumnType::Float, "B", "ABC");

        let mut schema = Schema::with_columns(vec![a, b]).unwrap();
        assert_eq!(Ok(()), schema.set_table_name("ABC"));
        assert_eq!(vec![(0, a_abc), (1, b_abc)],
                   schema.find_columns(&(Some("ABC".into()), None)));

        let a_foo = ColumnInfo::with_table_name(ColumnType::Integer, "A", "FOO");
        let a_bar = ColumnInfo::with_table_name(ColumnType::Integer, "A", "BAR");
        let mut clashing = Schema::with_columns(vec![a_foo, a_bar]).unwrap();
        assert_eq!(Err(Error::AmbiguousColumnsAfterTableRename("ABC".into(),
                                                               vec!["A".into()])),
                   clashing.set_table_name("ABC"));
    }

    #[test]
    fn test_common_column_names() {
        let left = Schema::with_columns(vec![
            ColumnInfo::with_table_name(ColumnType::Integer, "A", "L"),
            ColumnInfo::with_table_name(ColumnType::Integer, "B", "L"),
        ])
            .unwrap();
        let right = Schema::with_columns(vec![
            ColumnInfo::with_table_name(ColumnType::Integer, "B", "R"),
            ColumnInfo::with_table_name(ColumnType::Integer, "C", "R"),
        ])
            .unwrap();

        let common = left.get_common_column_names(&right);
        assert_eq!(1, common.len());
        assert!(common.contains("B"));
    }
}
