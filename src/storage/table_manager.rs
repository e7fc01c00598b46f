//! This module contains utilities to handle tables themselves: mapping table names onto tuple
//! files, and caching the open tuple files.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::{HeapTupleFile, StorageManager, file_manager, tuple_files};
use super::super::Schema;

/// This class represents a single table in the database, including the table's name, and the
/// tuple file that holds the table's data.
pub struct Table {
    /// The name of the table.
    pub name: String,
    /// The tuple file holding the table's rows.
    pub tuple_file: HeapTupleFile,
}

impl ::std::ops::Deref for Table {
    type Target = HeapTupleFile;
    fn deref(&self) -> &Self::Target {
        &self.tuple_file
    }
}

impl ::std::ops::DerefMut for Table {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tuple_file
    }
}

/// Given the name of a table, return the file name which will correspond to the table in the
/// data directory.
///
/// # Arguments
/// * table_name - The name of the table.
#[inline]
pub fn get_table_file_name<S: Into<String>>(table_name: S) -> String {
    table_name.into() + ".tbl"
}

/// The inverse of [`get_table_file_name`](fn.get_table_file_name.html): the table name a data
/// file corresponds to, if it is a table file.
pub fn get_table_name_from_file(file_name: &str) -> Option<String> {
    if file_name.ends_with(".tbl") {
        Some(file_name[..file_name.len() - 4].to_string())
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
/// An error that can occur while handling tables.
pub enum Error {
    /// A file manager error occurred while using a table utility method.
    FileManagerError(file_manager::Error),
    /// A tuple-file error occurred.
    TupleFileError(tuple_files::Error),
    /// The requested table does not exist.
    TableDoesNotExist(String),
    /// A table with the requested name already exists.
    TableAlreadyExists(String),
}

impl From<file_manager::Error> for Error {
    fn from(error: file_manager::Error) -> Error {
        Error::FileManagerError(error)
    }
}

impl From<tuple_files::Error> for Error {
    fn from(error: tuple_files::Error) -> Error {
        Error::TupleFileError(error)
    }
}

impl ::std::fmt::Display for Error {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        match *self {
            Error::FileManagerError(ref e) => write!(f, "{}", e),
            Error::TupleFileError(ref e) => write!(f, "{}", e),
            Error::TableDoesNotExist(ref name) => {
                write!(f, "The table {} does not exist.", name)
            }
            Error::TableAlreadyExists(ref name) => {
                write!(f, "The table {} already exists.", name)
            }
        }
    }
}

/// This class keeps track of the tables in the database: opening their tuple files on first use
/// and caching them for later commands in the session.
pub struct TableManager {
    open_tables: HashMap<String, Rc<RefCell<Table>>>,
}

impl TableManager {
    /// Instantiates the table manager.
    pub fn new() -> TableManager {
        TableManager { open_tables: HashMap::new() }
    }

    /// Returns a handle to the named table, opening its tuple file if it is not already open.
    ///
    /// # Arguments
    /// * storage - the storage manager that owns the files.
    /// * name - The name of the table.
    pub fn get_table<S: Into<String>>(&mut self,
                                      storage: &StorageManager,
                                      name: S)
                                      -> Result<Rc<RefCell<Table>>, Error> {
        let name = name.into();

        if let Some(table) = self.open_tables.get(&name) {
            return Ok(table.clone());
        }

        let file_name = get_table_file_name(name.as_str());
        if !storage.file_manager.dbfile_exists(&file_name) {
            return Err(Error::TableDoesNotExist(name));
        }

        let tuple_file = if storage.buffers.borrow().is_file_registered(&file_name) {
            // The file is already registered (e.g. the table was dropped from the open-table
            // cache but its pages live on); reopening through the file manager would clash, so
            // read the metadata through the buffered file.
            HeapTupleFile::open_registered(storage.buffers.clone(), &file_name)?
        } else {
            let db_file = storage.file_manager.open_dbfile(&file_name)?;
            HeapTupleFile::open(storage.buffers.clone(), db_file)?
        };

        let table = Rc::new(RefCell::new(Table {
            name: name.clone(),
            tuple_file: tuple_file,
        }));
        self.open_tables.insert(name, table.clone());
        Ok(table)
    }

    /// Checks if a table with the given name exists.
    pub fn table_exists<S: Into<String>>(&self, storage: &StorageManager, name: S) -> bool {
        let name = name.into();
        self.open_tables.contains_key(&name) ||
        storage.file_manager.dbfile_exists(get_table_file_name(name))
    }

    /// Creates a new table file with the table-name and schema specified.
    ///
    /// # Arguments
    /// * storage - the storage manager that owns the files.
    /// * table_name - the name of the new table.
    /// * schema - the schema of the new table.
    /// * page_size - the page size for the new table file.
    pub fn create_table<S: Into<String>>(&mut self,
                                         storage: &StorageManager,
                                         table_name: S,
                                         schema: Schema,
                                         page_size: u32)
                                         -> Result<Rc<RefCell<Table>>, Error> {
        let table_name = table_name.into();
        if self.table_exists(storage, table_name.as_str()) {
            return Err(Error::TableAlreadyExists(table_name));
        }

        let table_filename = get_table_file_name(table_name.as_str());
        let db_file = storage.file_manager
            .create_dbfile(&table_filename,
                           super::dbfile::DBFileType::HeapTupleFile,
                           page_size)?;
        let tuple_file = HeapTupleFile::create(storage.buffers.clone(), db_file, schema)?;

        let table = Rc::new(RefCell::new(Table {
            name: table_name.clone(),
            tuple_file: tuple_file,
        }));
        self.open_tables.insert(table_name, table.clone());
        Ok(table)
    }

    /// Drops the named table: its pages are discarded from the buffer cache and its file is
    /// deleted.
    pub fn drop_table<S: Into<String>>(&mut self,
                                       storage: &StorageManager,
                                       name: S)
                                       -> Result<(), Error> {
        let name = name.into();
        if !self.table_exists(storage, name.as_str()) {
            return Err(Error::TableDoesNotExist(name));
        }

        self.open_tables.remove(&name);
        let file_name = get_table_file_name(name.as_str());
        storage.buffers.borrow_mut().discard_file(&file_name);
        storage.file_manager.remove_dbfile(&file_name)?;
        Ok(())
    }

    /// The names of the tables present in the data directory, sorted.
    pub fn list_tables(&self, storage: &StorageManager) -> Result<Vec<String>, Error> {
        let mut names: Vec<String> = storage.file_manager
            .get_file_paths()?
            .into_iter()
            .filter_map(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .and_then(get_table_name_from_file)
            })
            .collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;
    use ::{ColumnInfo, ColumnType, Schema};
    use ::storage::StorageManager;
    use ::storage::buffer_manager::EvictionPolicy;

    fn test_schema() -> Schema {
        Schema::with_columns(vec![
            ColumnInfo::with_name(ColumnType::Integer, "A"),
            ColumnInfo::with_name(ColumnType::VarChar { length: 16 }, "B"),
        ])
            .unwrap()
    }

    #[test]
    fn test_create_and_get_table() {
        let dir = TempDir::new("test_dbfiles").unwrap();
        let storage =
            StorageManager::new(dir.path(), EvictionPolicy::LRU, 64 * 1024).unwrap();
        let mut table_manager = TableManager::new();

        table_manager.create_table(&storage, "foo", test_schema(), 512).unwrap();

        let table = table_manager.get_table(&storage, "foo").unwrap();
        assert_eq!("foo", table.borrow().name);
        assert_eq!(test_schema(), table.borrow().tuple_file.schema);

        assert!(table_manager.table_exists(&storage, "foo"));
        assert!(!table_manager.table_exists(&storage, "bar"));
        assert_eq!(vec!["foo".to_string()], table_manager.list_tables(&storage).unwrap());
    }

    #[test]
    fn test_duplicate_create_rejected() {
        let dir = TempDir::new("test_dbfiles").unwrap();
        let storage =
            StorageManager::new(dir.path(), EvictionPolicy::LRU, 64 * 1024).unwrap();
        let mut table_manager = TableManager::new();

        table_manager.create_table(&storage, "foo", test_schema(), 512).unwrap();
        assert_eq!(Err(Error::TableAlreadyExists("foo".into())),
                   table_manager.create_table(&storage, "foo", test_schema(), 512).map(|_| ()));
    }

    #[test]
    fn test_drop_table() {
        let dir = TempDir::new("test_dbfiles").unwrap();
        let storage =
            StorageManager::new(dir.path(), EvictionPolicy::LRU, 64 * 1024).unwrap();
        let mut table_manager = TableManager::new();

        table_manager.create_table(&storage, "foo", test_schema(), 512).unwrap();
        storage.buffers.borrow_mut().release_session_pins();

        table_manager.drop_table(&storage, "foo").unwrap();
        assert!(!table_manager.table_exists(&storage, "foo"));
        assert_eq!(Err(Error::TableDoesNotExist("foo".into())),
                   table_manager.get_table(&storage, "foo").map(|_| ()));
    }
}
