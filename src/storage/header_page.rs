//! This module contains utility functions for handling the first page of a heap tuple file, the
//! header page.
//!
//! **Note that the first two bytes of the first page are always devoted to the type and
//! page-size of the data file** (see [`DBFile`](../dbfile/struct.DBFile.html)).  All other
//! values must follow the first two bytes.
//!
//! Heap table-file header pages are laid out as follows:
//!
//! 1. As with all `DBFile`s, the first two bytes are the file type and encoded page size.
//! 2. Two sizes follow: the number of bytes the serialized table schema occupies, and the number
//!    of bytes the serialized table statistics occupy.
//! 3. The table's schema is recorded starting at
//!    [`OFFSET_SCHEMA_START`](constant.OFFSET_SCHEMA_START.html); see
//!    [`Schema::write`](../../relations/schema/struct.Schema.html#method.write).
//! 4. The table's statistics immediately follow the schema; see
//!    [`stats`](../../stats/index.html) for the format.
//!
//! Even with all this information, usually only a few hundred bytes are required for storing the
//! details of most tables.

use std::io::SeekFrom;
use std::io::prelude::*;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::DBPage;
use super::dbpage;

/// The offset in the header page where the size of the table schema is stored.  This value is an
/// unsigned short.
pub const OFFSET_SCHEMA_SIZE: u16 = 2;

/// The offset in the header page where the size of the table statistics is stored.  This value
/// is an unsigned short.
pub const OFFSET_STATS_SIZE: u16 = 4;

/// The offset in the header page where the table schema starts.
pub const OFFSET_SCHEMA_START: u16 = 6;

#[derive(Debug, Clone, PartialEq)]
/// Errors that can occur while using the header page of a file.
pub enum Error {
    /// The header page *must* be page 0, but a different page was used.
    IncorrectPage(u32),
    /// A page-level error occurred.
    PageError(dbpage::Error),
}

impl From<dbpage::Error> for Error {
    fn from(e: dbpage::Error) -> Error {
        Error::PageError(e)
    }
}

impl ::std::fmt::Display for Error {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        match *self {
            Error::IncorrectPage(page_no) => {
                write!(f, "Header operations require page 0, not page {}.", page_no)
            }
            Error::PageError(ref e) => write!(f, "{}", e),
        }
    }
}

/// This helper method simply verifies that the data page provided is in fact a header-page
/// (i.e. page 0 in the data file).
pub fn verify(page: &DBPage) -> Result<(), Error> {
    if page.page_no != 0 {
        Err(Error::IncorrectPage(page.page_no))
    } else {
        Ok(())
    }
}

/// Returns the number of bytes that the table's schema occupies for storage in the header page.
pub fn get_schema_size(page: &mut DBPage) -> Result<u16, Error> {
    verify(page)?;
    page.seek(SeekFrom::Start(OFFSET_SCHEMA_SIZE as u64)).map_err(dbpage::Error::from)?;
    page.read_u16::<BigEndian>().map_err(dbpage::Error::from).map_err(Into::into)
}

/// Records the number of bytes that the table's schema occupies in the header page.
pub fn set_schema_size(page: &mut DBPage, size: u16) -> Result<(), Error> {
    verify(page)?;
    page.seek(SeekFrom::Start(OFFSET_SCHEMA_SIZE as u64)).map_err(dbpage::Error::from)?;
    page.write_u16::<BigEndian>(size).map_err(dbpage::Error::from).map_err(Into::into)
}

/// Returns the number of bytes that the table's statistics occupy in the header page.
pub fn get_stats_size(page: &mut DBPage) -> Result<u16, Error> {
    verify(page)?;
    page.seek(SeekFrom::Start(OFFSET_STATS_SIZE as u64)).map_err(dbpage::Error::from)?;
    page.read_u16::<BigEndian>().map_err(dbpage::Error::from).map_err(Into::into)
}

/// Records the number of bytes that the table's statistics occupy in the header page.
pub fn set_stats_size(page: &mut DBPage, size: u16) -> Result<(), Error> {
    verify(page)?;
    page.seek(SeekFrom::Start(OFFSET_STATS_SIZE as u64)).map_err(dbpage::Error::from)?;
    page.write_u16::<BigEndian>(size).map_err(dbpage::Error::from).map_err(Into::into)
}

/// The offset in the header page where the serialized statistics begin: immediately after the
/// serialized schema.
pub fn get_stats_offset(page: &mut DBPage) -> Result<u16, Error> {
    let schema_size = get_schema_size(page)?;
    Ok(OFFSET_SCHEMA_START + schema_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::storage::{DBFileInfo, DBPage};
    use ::storage::dbfile::DBFileType;

    fn header_page() -> DBPage {
        let info = DBFileInfo {
            file_type: DBFileType::HeapTupleFile,
            page_size: 512,
            path: None,
        };
        DBPage::new(&info, 0)
    }

    #[test]
    fn test_sizes_round_trip() {
        let mut page = header_page();
        set_schema_size(&mut page, 0x17).unwrap();
        set_stats_size(&mut page, 0x2a).unwrap();

        assert_eq!(0x17, get_schema_size(&mut page).unwrap());
        assert_eq!(0x2a, get_stats_size(&mut page).unwrap());
        assert_eq!(OFFSET_SCHEMA_START + 0x17, get_stats_offset(&mut page).unwrap());
    }

    #[test]
    fn test_requires_page_zero() {
        let info = DBFileInfo {
            file_type: DBFileType::HeapTupleFile,
            page_size: 512,
            path: None,
        };
        let mut page = DBPage::new(&info, 3);
        assert_eq!(Err(Error::IncorrectPage(3)), get_schema_size(&mut page));
    }
}
