#![deny(missing_docs)]
//! NanoDB is a simple SQL relational database suitable for use in courses about relational
//! database implementation.  Even with a simple implementation, NanoDB has grown to become quite a
//! substantial code-base.
//!
//! The crate is organized around the query-execution pipeline and the storage substrate that
//! feeds it:
//!
//! - [`storage`](storage/index.html) holds the paged-file layer, the pinning buffer manager, and
//!   the heap tuple-file format.
//! - [`relations`](relations/index.html) holds column and schema descriptions.
//! - [`expressions`](expressions/index.html) holds the expression AST and the environments that
//!   expressions are evaluated against.
//! - [`stats`](stats/index.html) holds table/column statistics and selectivity estimation.
//! - [`queries`](queries/index.html) holds the plan-node pipeline and the cost-based planner.
//! - [`commands`](commands/index.html) and [`server`](server/index.html) tie everything together
//!   into executable commands against a server instance.
//!
//! The SQL grammar and the interactive client are intentionally not part of this crate; commands
//! are constructed from their AST representations directly.

extern crate byteorder;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
extern crate fern;

#[cfg(test)]
extern crate tempdir;

pub mod commands;
pub mod expressions;
pub mod functions;
pub mod queries;
pub mod relations;
pub mod stats;
pub mod storage;
pub mod server;

pub use relations::{Schema, SchemaError, ColumnInfo, ColumnName, ColumnType};
pub use server::Server;
