//! This module contains the classes that represent the commands that the NanoDB database
//! recognizes.
//!
//! All of the commands implement the [`Command`](trait.Command.html) trait.  Commands are
//! grouped into the following categories:
//!
//! # Data Definition Language (DDL) Commands
//!
//! - `CREATE TABLE` - [`CreateCommand`](struct.CreateCommand.html)
//! - `DROP TABLE` - [`DropCommand`](struct.DropCommand.html)
//!
//! # Data Manipulation Language (DML) Commands
//!
//! - `SELECT ...` - [`SelectCommand`](struct.SelectCommand.html)
//! - `INSERT ...` - [`InsertCommand`](struct.InsertCommand.html)
//! - `UPDATE ...` - [`UpdateCommand`](struct.UpdateCommand.html)
//! - `DELETE ...` - [`DeleteCommand`](struct.DeleteCommand.html)
//!
//! # Utility Commands
//!
//! - `ANALYZE ...` - [`AnalyzeCommand`](struct.AnalyzeCommand.html)
//! - `EXPLAIN ...` - [`ExplainCommand`](struct.ExplainCommand.html)
//! - `SHOW TABLES` / `SHOW TABLE ... STATS` / `SHOW PROPERTIES` -
//!   [`ShowCommand`](enum.ShowCommand.html)
//! - `SET PROPERTY` - [`SetPropertyCommand`](struct.SetPropertyCommand.html)
//! - `FLUSH` - [`FlushCommand`](struct.FlushCommand.html)
//! - `EXIT` | `QUIT` - [`ExitCommand`](struct.ExitCommand.html)

mod analyze;
mod create;
mod delete;
mod drop;
mod explain;
mod insert;
mod select;
mod set_property;
mod show;
mod update;
mod utils;

pub use self::analyze::AnalyzeCommand;
pub use self::create::CreateCommand;
pub use self::delete::DeleteCommand;
pub use self::drop::DropCommand;
pub use self::explain::ExplainCommand;
pub use self::insert::InsertCommand;
pub use self::select::SelectCommand;
pub use self::set_property::SetPropertyCommand;
pub use self::show::ShowCommand;
pub use self::update::UpdateCommand;
pub use self::utils::print_table;

use ::Server;
use ::expressions::ExpressionError;
use ::queries::PlanError;
use ::relations::SchemaError;
use ::server::properties;
use ::storage::{PinError, TupleError, TupleLiteral, buffer_manager, file_manager,
                table_manager, tuple_files};

#[derive(Debug, Clone, PartialEq)]
/// An error that occurred while attempting to execute a command.
pub enum ExecutionError {
    /// A table-manager error occurred.
    TableManager(table_manager::Error),
    /// A tuple-file error occurred.
    TupleFile(tuple_files::Error),
    /// A schema could not be constructed from the command's column definitions.
    CouldNotCreateSchema(SchemaError),
    /// Planning or executing a query plan failed.
    Plan(PlanError),
    /// Evaluating an expression failed.
    Expression(ExpressionError),
    /// A pinning error occurred.
    Pin(PinError),
    /// A buffer-manager error occurred.
    Buffer(buffer_manager::Error),
    /// A file-manager error occurred.
    FileManager(file_manager::Error),
    /// A property-registry error occurred.
    Property(properties::Error),
    /// An INSERT supplied the wrong number of values.  In the form of (expected, got).
    WrongValueCount(usize, usize),
    /// A NOT NULL (key) column received a NULL value.
    NullInNotNullColumn(String),
    /// A key constraint was violated by an inserted row.
    UniquenessViolation(String),
    /// The command was cancelled cooperatively.
    Cancelled,
    /// The results could not be written to the output.
    PrintError(String),
}

impl From<table_manager::Error> for ExecutionError {
    fn from(error: table_manager::Error) -> ExecutionError {
        ExecutionError::TableManager(error)
    }
}

impl From<tuple_files::Error> for ExecutionError {
    fn from(error: tuple_files::Error) -> ExecutionError {
        ExecutionError::TupleFile(error)
    }
}

impl From<SchemaError> for ExecutionError {
    fn from(error: SchemaError) -> ExecutionError {
        ExecutionError::CouldNotCreateSchema(error)
    }
}

impl From<PlanError> for ExecutionError {
    fn from(error: PlanError) -> ExecutionError {
        ExecutionError::Plan(error)
    }
}

impl From<ExpressionError> for ExecutionError {
    fn from(error: ExpressionError) -> ExecutionError {
        ExecutionError::Expression(error)
    }
}

impl From<PinError> for ExecutionError {
    fn from(error: PinError) -> ExecutionError {
        ExecutionError::Pin(error)
    }
}

impl From<TupleError> for ExecutionError {
    fn from(error: TupleError) -> ExecutionError {
        ExecutionError::TupleFile(tuple_files::Error::Tuple(error))
    }
}

impl From<buffer_manager::Error> for ExecutionError {
    fn from(error: buffer_manager::Error) -> ExecutionError {
        ExecutionError::Buffer(error)
    }
}

impl From<file_manager::Error> for ExecutionError {
    fn from(error: file_manager::Error) -> ExecutionError {
        ExecutionError::FileManager(error)
    }
}

impl From<properties::Error> for ExecutionError {
    fn from(error: properties::Error) -> ExecutionError {
        ExecutionError::Property(error)
    }
}

impl ::std::fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        match *self {
            ExecutionError::TableManager(ref e) => write!(f, "{}", e),
            ExecutionError::TupleFile(ref e) => write!(f, "{}", e),
            ExecutionError::CouldNotCreateSchema(ref e) => {
                write!(f, "Unable to create schema. {}", e)
            }
            ExecutionError::Plan(ref e) => write!(f, "{}", e),
            ExecutionError::Expression(ref e) => write!(f, "{}", e),
            ExecutionError::Pin(ref e) => write!(f, "{}", e),
            ExecutionError::Buffer(ref e) => write!(f, "{}", e),
            ExecutionError::FileManager(ref e) => write!(f, "{}", e),
            ExecutionError::Property(ref e) => write!(f, "{}", e),
            ExecutionError::WrongValueCount(expected, got) => {
                write!(f, "Expected {} value(s) per row, but got {}.", expected, got)
            }
            ExecutionError::NullInNotNullColumn(ref column) => {
                write!(f, "Column {} cannot hold NULL values.", column)
            }
            ExecutionError::UniquenessViolation(ref columns) => {
                write!(f, "A row with the same key ({}) already exists.", columns)
            }
            ExecutionError::Cancelled => write!(f, "The command was cancelled."),
            ExecutionError::PrintError(ref e) => write!(f, "Unable to print results: {}.", e),
        }
    }
}

/// A result from a command execution: the result tuples for queries that produce them, `None`
/// for everything else.
pub type CommandResult = Result<Option<Vec<TupleLiteral>>, ExecutionError>;

/// Trait for all commands that NanoDB supports.  Command objects contain both the arguments and
/// configuration details for the command being executed, as well as the code for actually
/// performing the command.  Databases tend to have large `switch` statements controlling how
/// various commands are handled, and this really isn't a very pretty way to do things; NanoDB
/// instead gives each command its own type.
pub trait Command: ::std::fmt::Debug {
    /// Actually performs the command.
    ///
    /// # Errors
    ///
    /// If executing the command results in an error, an
    /// [`ExecutionError`](enum.ExecutionError.html) will be returned.
    fn execute(&mut self, server: &mut Server, out: &mut ::std::io::Write) -> CommandResult;
}

#[derive(Debug, Clone, PartialEq)]
/// A command that requests a clean server shutdown (`EXIT` / `QUIT`).
pub struct ExitCommand;

impl Command for ExitCommand {
    fn execute(&mut self, server: &mut Server, _out: &mut ::std::io::Write) -> CommandResult {
        server.request_shutdown();
        Ok(None)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A command that forces every dirty page to disk (`FLUSH`).
pub struct FlushCommand;

impl Command for FlushCommand {
    fn execute(&mut self, server: &mut Server, _out: &mut ::std::io::Write) -> CommandResult {
        server.storage.write_all(true)?;
        Ok(None)
    }
}
