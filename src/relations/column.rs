//! This module contains classes and enums for column information.

use std::fmt;

/// A shorthand type for storing a column name in (table_name, column_name) form. A `None` in
/// either position is a wildcard; `(None, None)` is the bare `*` wildcard.
pub type ColumnName = (Option<String>, Option<String>);

/// Convert a column name to string form, with wildcards.
pub fn column_name_to_string(name: &ColumnName) -> String {
    match *name {
        (Some(ref table_name), Some(ref col_name)) => format!("{}.{}", table_name, col_name),
        (None, Some(ref col_name)) => col_name.clone(),
        (Some(ref table_name), None) => format!("{}.*", table_name),
        (None, None) => "*".into(),
    }
}

/// An empty Char column type. Useful for comparing type IDs.
pub const EMPTY_CHAR: ColumnType = ColumnType::Char { length: 0 };

/// An empty VarChar column type. Useful for comparing type IDs.
pub const EMPTY_VARCHAR: ColumnType = ColumnType::VarChar { length: 0 };

/// An empty Numeric column type. Useful for comparing type IDs.
pub const EMPTY_NUMERIC: ColumnType = ColumnType::Numeric {
    precision: 0,
    scale: 0,
};

/// The type of a single column in a relation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// A placeholder type for `NULL` literals.
    Null,
    /// A 1-byte signed integer.
    TinyInt,
    /// A 2-byte signed integer.
    SmallInt,
    /// A 4-byte signed integer.
    Integer,
    /// An 8-byte signed integer.
    BigInt,
    /// A 4-byte floating-point number.
    Float,
    /// An 8-byte floating-point number.
    Double,
    /// A decimal value with a specified precision and scale.
    Numeric {
        /// The total number of digits stored.
        precision: u8,
        /// The number of digits stored to the right of the decimal point.
        scale: u8,
    },
    /// A fixed-length character sequence.  Values shorter than the declared length are padded.
    Char {
        /// The length of the string.
        length: u16,
    },
    /// A variable-length character sequence, stored with a two-byte length prefix.
    VarChar {
        /// The maximum length of the string.
        length: u16,
    },
    /// A file-pointer value, comprised of a page number and an offset within the page.  This is
    /// not exposed in SQL, but is used internally.
    FilePointer,
}

impl From<ColumnType> for u8 {
    fn from(col_type: ColumnType) -> u8 {
        match col_type {
            ColumnType::Null => 0,
            ColumnType::Integer => 1,
            ColumnType::SmallInt => 2,
            ColumnType::BigInt => 3,
            ColumnType::TinyInt => 4,
            ColumnType::Float => 5,
            ColumnType::Double => 6,
            ColumnType::Numeric { .. } => 7,
            ColumnType::Char { .. } => 21,
            ColumnType::VarChar { .. } => 22,
            ColumnType::FilePointer => 41,
        }
    }
}

impl From<u8> for ColumnType {
    fn from(byte: u8) -> ColumnType {
        match byte {
            1 => ColumnType::Integer,
            2 => ColumnType::SmallInt,
            3 => ColumnType::BigInt,
            4 => ColumnType::TinyInt,
            5 => ColumnType::Float,
            6 => ColumnType::Double,
            7 => EMPTY_NUMERIC,
            21 => EMPTY_CHAR,
            22 => EMPTY_VARCHAR,
            41 => ColumnType::FilePointer,
            _ => ColumnType::Null,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ColumnType::Numeric { precision, scale } => {
                write!(f, "NUMERIC({}, {})", precision, scale)
            }
            ColumnType::Char { length } => write!(f, "CHAR({})", length),
            ColumnType::VarChar { length } => write!(f, "VARCHAR({})", length),
            _ => write!(f, "{}", format!("{:?}", self).to_uppercase()),
        }
    }
}

impl ColumnType {
    /// Whether the column type is numeric.
    pub fn is_numeric(&self) -> bool {
        match *self {
            ColumnType::TinyInt |
            ColumnType::SmallInt |
            ColumnType::Integer |
            ColumnType::BigInt |
            ColumnType::Float |
            ColumnType::Double |
            ColumnType::Numeric { .. } => true,
            _ => false,
        }
    }

    /// Whether values of this type have a total order that statistics can track MIN/MAX values
    /// over.  Strings are explicitly excluded; the statistics model does not keep string bounds.
    pub fn is_ordered(&self) -> bool {
        self.is_numeric()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Basic information about a table column, including its name and SQL type.  Constraints, even
/// `NOT NULL` constraints, appear at the table level, since some constraints can involve multiple
/// columns.
pub struct ColumnInfo {
    /// The type information for the column.
    pub column_type: ColumnType,
    /// The name of the attribute.  If the name is `None`, that means this is a wildcard.
    pub name: Option<String>,
    /// An optional table-name for the attribute, in cases where a join or Cartesian product
    /// generates a result with duplicate attribute-names.
    pub table_name: Option<String>,
}

impl ColumnInfo {
    /// Create a new column-info object with a name, but not associated with a table.
    pub fn with_name<S: Into<String>>(column_type: ColumnType, name: S) -> ColumnInfo {
        ColumnInfo {
            column_type: column_type,
            name: Some(name.into()),
            table_name: None,
        }
    }

    /// Create a new column-info object with a name that is associated with a table.
    pub fn with_table_name<S1, S2>(column_type: ColumnType, name: S1, table_name: S2) -> ColumnInfo
        where S1: Into<String>,
              S2: Into<String>
    {
        ColumnInfo {
            column_type: column_type,
            name: Some(name.into()),
            table_name: Some(table_name.into()),
        }
    }

    /// Returns the column name for a column-info object.
    pub fn get_column_name(&self) -> ColumnName {
        (self.table_name.clone(), self.name.clone())
    }
}

impl fmt::Display for ColumnInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.table_name.as_ref(), self.name.as_ref()) {
            (None, None) => write!(f, "ColumnInfo[*:{}]", self.column_type),
            (None, Some(name)) => write!(f, "ColumnInfo[{}:{}]", name, self.column_type),
            (Some(table_name), None) => write!(f, "ColumnInfo[{}.*:{}]", table_name, self.column_type),
            (Some(table_name), Some(name)) => {
                write!(f, "ColumnInfo[{}.{}:{}]", table_name, name, self.column_type)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_type_display() {
        assert_eq!(format!("{}", ColumnType::Null), "NULL");
        assert_eq!(format!("{}", ColumnType::Char { length: 12 }), "CHAR(12)");
        assert_eq!(format!("{}", ColumnType::VarChar { length: 13 }), "VARCHAR(13)");
        assert_eq!(format!("{}",
                           ColumnType::Numeric {
                               precision: 16,
                               scale: 2,
                           }),
                   "NUMERIC(16, 2)");
    }

    #[test]
    fn test_type_id_round_trip() {
        let types = vec![ColumnType::Null,
                         ColumnType::TinyInt,
                         ColumnType::SmallInt,
                         ColumnType::Integer,
                         ColumnType::BigInt,
                         ColumnType::Float,
                         ColumnType::Double,
                         ColumnType::FilePointer];
        for t in types {
            assert_eq!(t, ColumnType::from(u8::from(t)));
        }
        // Parameterized types round-trip to their empty forms; the parameters are serialized
        // separately.
        assert_eq!(EMPTY_CHAR,
                   ColumnType::from(u8::from(ColumnType::Char { length: 5 })));
        assert_eq!(EMPTY_VARCHAR,
                   ColumnType::from(u8::from(ColumnType::VarChar { length: 5 })));
    }

    #[test]
    fn test_is_numeric() {
        assert!(ColumnType::Integer.is_numeric());
        assert!(ColumnType::BigInt.is_numeric());
        assert!(ColumnType::TinyInt.is_numeric());
        assert!(ColumnType::SmallInt.is_numeric());
        assert!(ColumnType::Float.is_numeric());
        assert!(ColumnType::Double.is_numeric());
        assert!(!ColumnType::Char { length: 1 }.is_numeric());
        assert!(!ColumnType::VarChar { length: 1 }.is_numeric());
        assert!(!ColumnType::FilePointer.is_numeric());
        assert!(!ColumnType::Null.is_numeric());
    }

    #[test]
    fn test_column_name_to_string() {
        assert_eq!("*", column_name_to_string(&(None, None)));
        assert_eq!("a", column_name_to_string(&(None, Some("a".into()))));
        assert_eq!("t.*", column_name_to_string(&(Some("t".into()), None)));
        assert_eq!("t.a",
                   column_name_to_string(&(Some("t".into()), Some("a".into()))));
    }
}
