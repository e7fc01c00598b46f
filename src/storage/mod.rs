//! This module contains the classes for the storage layer, which is responsible for how data is
//! stored in and retrieved from database files.
//!
//! The layering looks like this, bottom to top:
//!
//! - [`file_manager`](file_manager/index.html) performs raw page reads and writes against files
//!   on disk, and knows nothing about what the pages hold.
//! - [`buffer_manager`](buffer_manager/index.html) caches loaded pages in memory, tracks pin
//!   counts so in-use pages cannot be evicted, and writes dirty pages back when they are evicted
//!   or flushed.
//! - [`dbpage`](dbpage/index.html) gives structure to a page's bytes: the slotted-page layout
//!   that tuple files use.
//! - [`tuple_files`](tuple_files/index.html) implements the heap tuple-file format on top of
//!   slotted pages, and [`table_manager`](table_manager/index.html) maps table names onto tuple
//!   files.
//! - [`storage_manager`](storage_manager/index.html) wires the pieces together for the rest of
//!   the system.

pub mod buffer_manager;
pub mod dbfile;
pub mod dbpage;
pub mod file_manager;
pub mod header_page;
pub mod page_tuple;
pub mod storage_manager;
pub mod table_manager;
pub mod tuple_files;
pub mod tuple_literal;

pub use self::buffer_manager::BufferManager;
pub use self::dbfile::{DBFile, DBFileInfo, DBFileType};
pub use self::dbpage::DBPage;
pub use self::file_manager::FileManager;
pub use self::storage_manager::StorageManager;
pub use self::table_manager::{Table, TableManager};
pub use self::tuple_files::HeapTupleFile;
pub use self::tuple_literal::TupleLiteral;

use std::io;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::expressions::Literal;

#[derive(Debug, Copy, Clone, PartialEq)]
/// An error that may occur while pinning or unpinning a page in some file.
pub enum PinError {
    /// A caller attempted to unpin a `Pinnable` object, but the pin count was not positive;
    /// i.e. the object had not been pinned in the first place.
    PinCountNotPositive(u32),
}

impl ::std::fmt::Display for PinError {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        match *self {
            PinError::PinCountNotPositive(count) => {
                write!(f, "pin count is not positive (value is {})", count)
            }
        }
    }
}

/// This interface provides the basic "pin" and "unpin" operations that pinnable objects need to
/// provide.  An object's pin-count is simply a reference count, but with a shorter name so it's
/// easier to type!
///
/// Currently, tuples and data pages are pinnable.
pub trait Pinnable {
    /// Increase the pin-count on the object by one.  An object with a nonzero pin-count cannot
    /// be released because it is in use.
    fn pin(&mut self);

    /// Decrease the pin-count on the object by one.  When the pin-count reaches zero, the
    /// object can be released.
    fn unpin(&mut self) -> Result<(), PinError>;

    /// Returns the total number of times the object has been pinned.
    fn get_pin_count(&self) -> u32;

    /// Returns true if the object is currently pinned, false otherwise.
    fn is_pinned(&self) -> bool {
        self.get_pin_count() > 0
    }
}

/// This interface provides additional writing operations for the string shapes NanoDB stores.
pub trait WriteNanoDBExt: WriteBytesExt {
    /// Write a string to the output, assuming that it is a VARCHAR that fits in 255 bytes (i.e.
    /// the length can be represented in one byte).
    ///
    /// # Errors
    /// This will fail if writing the length or the bytes in the string themselves fail.
    fn write_varchar255<S>(&mut self, string: S) -> io::Result<()>
        where S: Into<String>
    {
        let bytes = string.into().into_bytes();

        self.write_u8(bytes.len() as u8)?;
        self.write_all(&bytes)?;
        Ok(())
    }

    /// Write a string to the output, assuming that it is a VARCHAR that fits in 65535 bytes
    /// (i.e. the length can be represented in a short).
    ///
    /// # Errors
    /// This will fail if writing the length or the bytes in the string themselves fail.
    fn write_varchar65535<S>(&mut self, string: S) -> io::Result<()>
        where S: Into<String>
    {
        let bytes = string.into().into_bytes();

        self.write_u16::<BigEndian>(bytes.len() as u16)?;
        self.write_all(&bytes)?;
        Ok(())
    }
}

impl<W: io::Write + ?Sized> WriteNanoDBExt for W {}

/// This interface provides additional reading operations for the string shapes NanoDB stores.
pub trait ReadNanoDBExt: ReadBytesExt {
    /// Read a string from the input, assuming that it is a VARCHAR that fits in 255 bytes.
    fn read_varchar255(&mut self) -> io::Result<String> {
        let len = self.read_u8()? as usize;
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;

        String::from_utf8(buf).map_err(|_| io::ErrorKind::InvalidData.into())
    }

    /// Read a string from the input, assuming that it is a VARCHAR that fits in 65535 bytes.
    fn read_varchar65535(&mut self) -> io::Result<String> {
        let len = self.read_u16::<BigEndian>()? as usize;
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;

        String::from_utf8(buf).map_err(|_| io::ErrorKind::InvalidData.into())
    }
}

impl<R: io::Read + ?Sized> ReadNanoDBExt for R {}

/// Errors that can occur while handling a tuple.
#[derive(Clone, Debug, PartialEq)]
pub enum TupleError {
    /// For when an IO error occurs.
    IOError,
    /// For when a pinning error occurs.
    PinError(PinError),
    /// For when a file manager error occurs.
    FileManagerError(file_manager::Error),
    /// For when a DBPage error occurs.
    DBPageError(dbpage::Error),
    /// For when a column type is not supported for storage.
    UnsupportedColumnType,
    /// For when the column index provided is out of range.  In the form of (index, columns).
    InvalidColumnIndex(usize, usize),
    /// A value cannot be stored into the column type.  In the form of (column name, value).
    CannotStoreValue(String, Literal),
    /// The tuple size is too large for the page.  In the form of (tuple size, page size).
    TupleTooBig(u16, u32),
    /// The (page, slot) reference does not name a live tuple.
    InvalidTupleReference(u32, u16),
}

impl From<io::Error> for TupleError {
    fn from(_: io::Error) -> Self {
        TupleError::IOError
    }
}

impl From<file_manager::Error> for TupleError {
    fn from(error: file_manager::Error) -> Self {
        TupleError::FileManagerError(error)
    }
}

impl From<dbpage::Error> for TupleError {
    fn from(error: dbpage::Error) -> Self {
        TupleError::DBPageError(error)
    }
}

impl From<PinError> for TupleError {
    fn from(error: PinError) -> Self {
        TupleError::PinError(error)
    }
}

impl ::std::fmt::Display for TupleError {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        match *self {
            TupleError::IOError => write!(f, "An IO error occurred."),
            TupleError::PinError(ref e) => write!(f, "{}", e),
            TupleError::FileManagerError(ref e) => write!(f, "{}", e),
            TupleError::DBPageError(ref e) => write!(f, "{}", e),
            TupleError::UnsupportedColumnType => {
                write!(f, "The column type is not supported for storage.")
            }
            TupleError::InvalidColumnIndex(index, count) => {
                write!(f, "Valid column indexes are in [0, {}). Got {}.", count, index)
            }
            TupleError::CannotStoreValue(ref column, ref value) => {
                write!(f, "The value {} cannot be stored in column {}.", value, column)
            }
            TupleError::TupleTooBig(size, page_size) => {
                write!(f,
                       "The tuple requires {} bytes, which cannot fit in a page of {} bytes.",
                       size,
                       page_size)
            }
            TupleError::InvalidTupleReference(page_no, slot) => {
                write!(f,
                       "Page {} slot {} does not reference a live tuple.",
                       page_no,
                       slot)
            }
        }
    }
}

/// This interface provides the operations that can be performed with a tuple.  In relational
/// database theory, a tuple is an ordered set of attribute-value pairs, but in this
/// implementation the tuple's data and its schema are kept completely separate.  This tuple
/// interface simply provides an index-accessed collection of values; the schema is represented
/// separately using the [`Schema`](../relations/schema/struct.Schema.html) class.
///
/// Different implementations of this interface store their data in different places.  Some tuple
/// implementations (e.g. [`PageTuple`](page_tuple/struct.PageTuple.html)) load and store values
/// straight out of a tuple file, and thus their data is backed by a buffer page that can be
/// written back to the filesystem.  Other tuples may exist entirely in memory, with no
/// corresponding back-end storage.
pub trait Tuple: Pinnable {
    /// Returns true if this tuple is backed by a disk page that must be kept in memory as long
    /// as the tuple is in use.  In cases where a plan-node needs to hold onto a tuple for a long
    /// time (e.g. for sorting or grouping), the plan node should make a copy of disk-backed
    /// tuples.
    fn is_disk_backed(&self) -> bool;

    /// Determine if the column at index `col_index` is `NULL`.
    fn is_null_value(&self, col_index: usize) -> Result<bool, TupleError>;

    /// Returns a count of the number of columns in the tuple.
    fn get_column_count(&self) -> usize;

    /// Returns the value of a column.
    ///
    /// # Arguments
    /// * col_index - The index of the column
    fn get_column_value(&mut self, col_index: usize) -> Result<Literal, TupleError>;
}
