//! This module contains the classes that describe relations: column types, column metadata, and
//! schemas.

pub mod column;
pub mod schema;

pub use self::column::{ColumnInfo, ColumnName, ColumnType, column_name_to_string,
                        EMPTY_CHAR, EMPTY_NUMERIC, EMPTY_VARCHAR};
pub use self::schema::Schema;
pub use self::schema::Error as SchemaError;
