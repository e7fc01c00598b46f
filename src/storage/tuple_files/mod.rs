//! This module contains tuple-file implementations.  The only format currently provided is the
//! heap tuple file, which stores variable-size tuples in no particular order.

pub mod heap_tuple_file;

pub use self::heap_tuple_file::{HeapFilePageTuple, HeapTupleFile};

use ::relations::SchemaError;
use ::storage::{PinError, TupleError, buffer_manager, dbpage, file_manager, header_page};

#[derive(Debug, Clone, PartialEq)]
/// An error that can occur while operating on a tuple file.
pub enum Error {
    /// A file-manager error occurred.
    FileManager(file_manager::Error),
    /// A buffer-manager error occurred.
    Buffer(buffer_manager::Error),
    /// A page-level error occurred.
    Page(dbpage::Error),
    /// A schema (de)serialization error occurred.
    Schema(SchemaError),
    /// A header-page error occurred.
    Header(header_page::Error),
    /// A tuple-level error occurred.
    Tuple(TupleError),
    /// A pin-count error occurred.
    Pin(PinError),
    /// Statistics could not be read or written.
    Stats(String),
}

impl From<file_manager::Error> for Error {
    fn from(e: file_manager::Error) -> Error {
        Error::FileManager(e)
    }
}

impl From<buffer_manager::Error> for Error {
    fn from(e: buffer_manager::Error) -> Error {
        Error::Buffer(e)
    }
}

impl From<dbpage::Error> for Error {
    fn from(e: dbpage::Error) -> Error {
        Error::Page(e)
    }
}

impl From<SchemaError> for Error {
    fn from(e: SchemaError) -> Error {
        Error::Schema(e)
    }
}

impl From<header_page::Error> for Error {
    fn from(e: header_page::Error) -> Error {
        Error::Header(e)
    }
}

impl From<TupleError> for Error {
    fn from(e: TupleError) -> Error {
        Error::Tuple(e)
    }
}

impl From<PinError> for Error {
    fn from(e: PinError) -> Error {
        Error::Pin(e)
    }
}

impl ::std::fmt::Display for Error {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        match *self {
            Error::FileManager(ref e) => write!(f, "{}", e),
            Error::Buffer(ref e) => write!(f, "{}", e),
            Error::Page(ref e) => write!(f, "{}", e),
            Error::Schema(ref e) => write!(f, "{}", e),
            Error::Header(ref e) => write!(f, "{}", e),
            Error::Tuple(ref e) => write!(f, "{}", e),
            Error::Pin(ref e) => write!(f, "{}", e),
            Error::Stats(ref e) => write!(f, "Statistics error: {}", e),
        }
    }
}
