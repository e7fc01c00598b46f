//! The File Manager provides unbuffered, low-level operations for working with paged data files.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::PinError;
use super::dbfile::{self, DBFile, DBFileType, encode_pagesize, decode_pagesize};
use super::dbpage;

#[derive(Debug, Clone, PartialEq)]
/// An error that can occur during file-manager operations.
pub enum Error {
    /// The base directory does not exist or is not a directory.
    InvalidBaseDir,
    /// The directory contents could not be listed.
    FilePathsError,
    /// A file with the requested name already exists.
    DBFileExists,
    /// The requested file does not exist.
    DBFileDoesNotExist,
    /// An error occurred at the `DBFile` level.
    DBFileError(dbfile::Error),
    /// An error occurred at the `DBPage` level.
    DBPageError(dbpage::Error),
    /// A pinning error occurred.
    PinError(PinError),
    /// The file's two-byte header could not be read or decoded.
    DBFileParseError,
    /// A general IO error occurred.
    IOError,
    /// The file could not be extended to hold a new page.
    CantExtendDBFile,
    /// The backing file could not be created.
    CantCreateFile,
    /// The backing file could not be opened.
    CantOpenFile,
    /// The page size stored in the file is not valid.
    InvalidDBFilePageSize,
    /// The type byte stored in the file is not a known file type.
    InvalidDBFileType,
    /// A page buffer of the wrong size was passed in.
    IncorrectBufferSize,
    /// A page write did not write the full page.
    NotFullyWritten,
    /// A page read did not read the full page (e.g. the page is past end-of-file).
    NotFullyRead,
    /// The page could not be saved to the file.
    PageSaveError,
}

impl From<dbfile::Error> for Error {
    fn from(error: dbfile::Error) -> Error {
        Error::DBFileError(error)
    }
}

impl From<dbpage::Error> for Error {
    fn from(error: dbpage::Error) -> Error {
        Error::DBPageError(error)
    }
}

impl From<io::Error> for Error {
    fn from(_: io::Error) -> Error {
        Error::IOError
    }
}

impl From<PinError> for Error {
    fn from(error: PinError) -> Error {
        Error::PinError(error)
    }
}

impl ::std::fmt::Display for Error {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        match *self {
            Error::InvalidBaseDir => write!(f, "The base directory is not usable."),
            Error::FilePathsError => write!(f, "The data directory could not be listed."),
            Error::DBFileExists => write!(f, "The database file already exists."),
            Error::DBFileDoesNotExist => write!(f, "The database file does not exist."),
            Error::DBFileError(ref e) => write!(f, "{}", e),
            Error::DBPageError(ref e) => write!(f, "{}", e),
            Error::PinError(ref e) => write!(f, "{}", e),
            Error::DBFileParseError => write!(f, "The database file header could not be parsed."),
            Error::IOError => write!(f, "An IO error occurred."),
            Error::CantExtendDBFile => write!(f, "The database file could not be extended."),
            Error::CantCreateFile => write!(f, "The database file could not be created."),
            Error::CantOpenFile => write!(f, "The database file could not be opened."),
            Error::InvalidDBFilePageSize => {
                write!(f, "The database file's stored page size is invalid.")
            }
            Error::InvalidDBFileType => write!(f, "The database file's type byte is invalid."),
            Error::IncorrectBufferSize => {
                write!(f, "The page buffer does not match the file's page size.")
            }
            Error::NotFullyWritten => write!(f, "A page was not fully written."),
            Error::NotFullyRead => write!(f, "A page was not fully read."),
            Error::PageSaveError => write!(f, "A page could not be saved."),
        }
    }
}

/// This helper function calculates the file-position of the specified page.  Obviously, this
/// value is dependent on the page size.
fn get_page_start<F: Read + Seek + Write>(dbfile: &DBFile<F>, page_no: u32) -> u64 {
    (page_no as u64) * (dbfile.get_page_size() as u64)
}

/// Saves a page to the DB file.
///
/// Note that the data might not actually be written to disk until a sync operation is performed.
///
/// # Arguments
/// * dbfile - the data file to write to
/// * page_no - the page number to write the buffer to
/// * buffer - the data to write back to the page
///
/// # Errors
/// This function will return an error in the following situations:
///
/// * If the buffer length is not the same as the page size.
/// * If an I/O error occurs while writing.
pub fn save_page<F>(dbfile: &mut DBFile<F>, page_no: u32, buffer: &[u8]) -> Result<(), Error>
    where F: Read + Seek + Write
{
    if buffer.len() as u32 != dbfile.get_page_size() {
        return Err(Error::IncorrectBufferSize);
    }

    let page_start = get_page_start(dbfile, page_no);

    let save_result = dbfile.seek(SeekFrom::Start(page_start)).and_then(|_| dbfile.write(buffer));
    match save_result {
        Ok(written) if written == buffer.len() => Ok(()),
        Ok(_) => Err(Error::NotFullyWritten),
        Err(_) => Err(Error::PageSaveError),
    }
}

/// Loads a page from the underlying data file into the provided buffer.  The `create` flag
/// controls whether an error is propagated if the requested page is past the end of the file:
/// with `create` set, the file is extended with zeroed pages so that the requested page exists.
///
/// *This function does no page caching whatsoever.*  Requesting a particular page multiple times
/// will read from the file each time; the
/// [`BufferManager`](../buffer_manager/struct.BufferManager.html) is the caching layer.
///
/// # Arguments
/// * dbfile - the database file to load the page from
/// * page_no - the number of the page to load
/// * buffer - the buffer to read the page into
/// * create - a flag specifying whether the page should be created if it doesn't already exist
///
/// # Errors
/// Fails with `IncorrectBufferSize` if the buffer does not match the page size, `NotFullyRead`
/// if the page is past end-of-file and `create` was not given, and `CantExtendDBFile` if
/// extending the file fails.
pub fn load_page(dbfile: &mut DBFile<File>,
                 page_no: u32,
                 buffer: &mut [u8],
                 create: bool)
                 -> Result<(), Error> {
    if buffer.len() as u32 != dbfile.get_page_size() {
        return Err(Error::IncorrectBufferSize);
    }

    let page_start = get_page_start(dbfile, page_no);

    match dbfile.seek(SeekFrom::Start(page_start)).and_then(|_| dbfile.read_exact(buffer)) {
        Ok(()) => Ok(()),
        Err(_) if create => {
            debug!("Requested page {} doesn't yet exist in file {:?}; creating.",
                   page_no,
                   dbfile.file_name());

            let new_length = (page_no as u64 + 1) * (dbfile.get_page_size() as u64);
            dbfile.set_file_length(new_length)
                .and_then(|_| dbfile.flush())
                .map_err(|_| Error::CantExtendDBFile)?;

            // The new page is all zeroes.
            for byte in buffer.iter_mut() {
                *byte = 0;
            }
            Ok(())
        }
        Err(_) => Err(Error::NotFullyRead),
    }
}

/// The File Manager provides unbuffered, low-level operations for working with paged data files.
/// It really doesn't know anything about the internal file formats of the data files, except
/// that the first two bytes of the first page must specify the type and page size for the data
/// file.  (This is a requirement of [`open_dbfile`](#method.open_dbfile).)
///
/// # Design
/// Although it might make more sense to put per-file operations like "load page" and "store
/// page" on the `DBFile` class, we provide them here so that the buffer manager can provide
/// global caching capabilities in one place.
///
/// This class includes no multithreading support, and it maintains no internal state beyond the
/// directory it works in.
#[derive(Debug, Clone, PartialEq)]
pub struct FileManager {
    base_dir: PathBuf,
}

impl FileManager {
    /// Creates a file manager rooted at the given directory.
    ///
    /// # Errors
    /// Fails with `InvalidBaseDir` when the path does not name an existing directory.
    pub fn with_directory<P: AsRef<Path>>(base_dir: P) -> Result<FileManager, Error> {
        if !base_dir.as_ref().is_dir() {
            return Err(Error::InvalidBaseDir);
        }
        Ok(FileManager { base_dir: base_dir.as_ref().to_path_buf() })
    }

    /// The directory the file manager stores data files in.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Lists the paths of all files in the data directory.
    pub fn get_file_paths(&self) -> Result<Vec<PathBuf>, Error> {
        let dir = fs::read_dir(&self.base_dir).map_err(|_| Error::FilePathsError)?;
        let mut paths = Vec::new();
        for entry in dir {
            match entry {
                Ok(e) => paths.push(e.path()),
                Err(_) => {
                    return Err(Error::FilePathsError);
                }
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// This method checks if a database file exists.
    ///
    /// # Arguments
    /// * filename - the filename the DBFile is backed by.
    pub fn dbfile_exists<P: AsRef<Path>>(&self, filename: P) -> bool {
        self.base_dir.join(filename).exists()
    }

    /// This method removes a database file from the storage directory.
    ///
    /// # Arguments
    /// * filename - the filename the DBFile is backed by.
    ///
    /// # Errors
    /// Fails with `DBFileDoesNotExist` when there is no such file.
    pub fn remove_dbfile<P: AsRef<Path>>(&self, filename: P) -> Result<(), Error> {
        if !self.dbfile_exists(&filename) {
            return Err(Error::DBFileDoesNotExist);
        }

        fs::remove_file(self.base_dir.join(filename)).map_err(Into::into)
    }

    /// This method creates a new database file in the directory used by the storage manager,
    /// writing the file-type and page-size header into page 0.
    ///
    /// # Arguments
    /// * filename - the filename the DBFile is backed by.
    /// * file_type - The type of the DBFile.
    /// * page_size - The page size the DBFile will use.
    ///
    /// # Errors
    /// Fails with `DBFileExists` if the file already exists, with a `DBFileError` if the page
    /// size is invalid, and with IO-flavored errors if the file cannot be written.
    pub fn create_dbfile<P: AsRef<Path>>(&self,
                                         filename: P,
                                         file_type: DBFileType,
                                         page_size: u32)
                                         -> Result<DBFile<File>, Error> {
        let full_path = self.base_dir.join(filename);

        if full_path.exists() {
            return Err(Error::DBFileExists);
        }

        let encoded_size = encode_pagesize(page_size)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&full_path)
            .map_err(|_| Error::CantCreateFile)?;

        let mut db_file = DBFile::with_path(file_type, page_size, file, &full_path)?;

        let mut buffer = vec![0; page_size as usize];
        buffer[0] = file_type as u8;
        buffer[1] = encoded_size as u8;

        debug!("Creating new database file {}.", full_path.display());
        save_page(&mut db_file, 0, &buffer)?;
        db_file.flush()?;

        Ok(db_file)
    }

    /// This method opens a database file, and reads in the file's type and page size from the
    /// first two bytes of the first page.
    ///
    /// # Arguments
    /// * filename - The name of the database file to open.
    ///
    /// # Errors
    /// Fails with `DBFileDoesNotExist` when the file is missing, and with parse-flavored errors
    /// when the two-byte header is truncated or invalid.
    pub fn open_dbfile<P: AsRef<Path>>(&self, filename: P) -> Result<DBFile<File>, Error> {
        let full_path = self.base_dir.join(filename);

        if !full_path.exists() {
            return Err(Error::DBFileDoesNotExist);
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&full_path)
            .map_err(|_| Error::CantOpenFile)?;

        let mut header = [0u8; 2];
        file.read_exact(&mut header).map_err(|_| Error::DBFileParseError)?;

        let file_type = match DBFileType::from(header[0]) {
            DBFileType::Unknown => {
                return Err(Error::InvalidDBFileType);
            }
            known => known,
        };
        let page_size =
            decode_pagesize(header[1] as u32).map_err(|_| Error::InvalidDBFilePageSize)?;

        debug!("Opened existing database file {}; type is {:?}, page size is {}.",
               full_path.display(),
               file_type,
               page_size);

        DBFile::with_path(file_type, page_size, file, &full_path).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use std::fs::{File, OpenOptions};
    use std::io::{Cursor, Read, Seek, SeekFrom, Write};
    use std::path::PathBuf;

    use tempdir::TempDir;

    use super::{Error, FileManager, get_page_start, load_page, save_page};
    use super::super::dbfile::{DBFile, DBFileType};

    #[test]
    fn test_file_manager_creation() {
        let dir = TempDir::new("test_dbfiles").unwrap();
        let file_path = dir.path().join("foo.tbl");
        File::create(&file_path).unwrap();

        assert_eq!(Err(Error::InvalidBaseDir),
                   FileManager::with_directory("no_such_directory"));
        assert_eq!(Err(Error::InvalidBaseDir),
                   FileManager::with_directory(&file_path));
        assert!(FileManager::with_directory(dir.path()).is_ok());
    }

    #[test]
    fn test_file_manager_list_files() {
        let dir = TempDir::new("test_dbfiles").unwrap();
        let file_path = dir.path().join("foo.tbl");
        File::create(&file_path).unwrap();

        let file_manager = FileManager::with_directory(dir.path()).unwrap();
        assert_eq!(Ok(vec![PathBuf::from(file_path)]),
                   file_manager.get_file_paths());
    }

    #[test]
    fn test_create_dbfile() {
        let dir = TempDir::new("test_dbfiles").unwrap();
        let file_manager = FileManager::with_directory(dir.path()).unwrap();

        File::create(dir.path().join("foo.tbl")).unwrap();
        assert_eq!(Err(Error::DBFileExists),
                   file_manager.create_dbfile("foo.tbl", DBFileType::HeapTupleFile, 512)
                       .map(|_| ()));

        let created = file_manager.create_dbfile("bar.tbl", DBFileType::HeapTupleFile, 512);
        assert!(created.is_ok());

        // The header bytes land in page 0.
        let mut contents = Vec::new();
        File::open(dir.path().join("bar.tbl")).unwrap().read_to_end(&mut contents).unwrap();
        assert_eq!(512, contents.len());
        assert_eq!(DBFileType::HeapTupleFile as u8, contents[0]);
        assert_eq!(0x09, contents[1]);
    }

    #[test]
    fn test_open_dbfile() {
        let dir = TempDir::new("test_dbfiles").unwrap();
        let file_manager = FileManager::with_directory(dir.path()).unwrap();

        let file_path = dir.path().join("foo.tbl");
        assert_eq!(Err(Error::DBFileDoesNotExist),
                   file_manager.open_dbfile("foo.tbl").map(|_| ()));

        let mut file = File::create(&file_path).unwrap();

        // Empty file: the header can't be read.
        assert_eq!(Err(Error::DBFileParseError),
                   file_manager.open_dbfile("foo.tbl").map(|_| ()));

        file.write_all(&[DBFileType::BTreeTupleFile as u8, 0x09]).unwrap();
        file.flush().unwrap();

        let opened = file_manager.open_dbfile("foo.tbl").unwrap();
        assert_eq!(DBFileType::BTreeTupleFile, opened.file_type);
        assert_eq!(512, opened.get_page_size());
    }

    #[test]
    fn test_page_start() {
        let dbfile = DBFile::new(DBFileType::HeapTupleFile, 512, Cursor::new(vec![])).unwrap();
        assert_eq!(0u64, get_page_start(&dbfile, 0));
        assert_eq!(512u64, get_page_start(&dbfile, 1));
    }

    #[test]
    fn test_save_page() {
        let mut dbfile =
            DBFile::new(DBFileType::HeapTupleFile, 512, Cursor::new(vec![0; 512])).unwrap();

        let first_page = [0xac; 512];
        let second_page = [0xfd; 512];

        assert_eq!(Err(Error::IncorrectBufferSize),
                   save_page(&mut dbfile, 0, &[0; 5]));
        assert_eq!(Ok(()), save_page(&mut dbfile, 0, &first_page));

        let mut expected = first_page.to_vec();
        assert_eq!(&dbfile.get_contents().get_ref()[..], &expected[..]);

        expected.extend_from_slice(&second_page);
        assert_eq!(Ok(()), save_page(&mut dbfile, 1, &second_page));
        assert_eq!(&dbfile.get_contents().get_ref()[..], &expected[..]);
    }

    #[test]
    fn test_load_page_round_trip() {
        let dir = TempDir::new("test_dbfiles").unwrap();
        let file_path = dir.path().join("foo.tbl");

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&file_path)
            .unwrap();
        let file_type = DBFileType::HeapTupleFile;
        file.write_all(&[file_type as u8, 0x09]).unwrap();
        file.write_all(&[0xaf; 510]).unwrap();
        file.flush().unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();

        let mut dbfile = DBFile::with_path(file_type, 512, file, &file_path).unwrap();

        let mut result = [0u8; 512];
        let mut expected = vec![file_type as u8, 0x09];
        expected.extend_from_slice(&[0xaf; 510][..]);

        assert_eq!(Err(Error::NotFullyRead),
                   load_page(&mut dbfile, 1000, &mut result, false));
        assert_eq!(Ok(()), load_page(&mut dbfile, 0, &mut result, false));
        assert_eq!(expected.as_slice(), &result[..]);

        // Every page written through save_page loads back byte-for-byte.
        let page_data = [0x5a; 512];
        save_page(&mut dbfile, 3, &page_data).unwrap();
        let mut loaded = [0u8; 512];
        load_page(&mut dbfile, 3, &mut loaded, false).unwrap();
        assert_eq!(&page_data[..], &loaded[..]);
    }

    #[test]
    fn test_load_page_create_extends_file() {
        let dir = TempDir::new("test_dbfiles").unwrap();
        let file_manager = FileManager::with_directory(dir.path()).unwrap();
        let mut dbfile = file_manager.create_dbfile("t.tbl", DBFileType::HeapTupleFile, 512)
            .unwrap();

        let mut buffer = [0xffu8; 512];
        assert_eq!(Ok(()), load_page(&mut dbfile, 4, &mut buffer, true));
        assert!(buffer.iter().all(|&b| b == 0));
        assert_eq!(5 * 512, dbfile.get_file_length().unwrap());
    }
}
