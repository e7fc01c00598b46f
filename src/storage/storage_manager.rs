//! This module contains the storage manager, which wires the file manager and buffer manager
//! together for the rest of the system.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use super::{BufferManager, FileManager, buffer_manager, file_manager};
use super::buffer_manager::EvictionPolicy;

/// The storage manager owns the file manager for the data directory and the shared buffer
/// manager that caches the pages of every open file.  Components that operate on pages (tuple
/// files, plan nodes) hold clones of the buffer-manager handle.
pub struct StorageManager {
    /// The low-level paged-file operations.
    pub file_manager: FileManager,
    /// The shared page cache.
    pub buffers: Rc<RefCell<BufferManager>>,
}

impl StorageManager {
    /// Creates a storage manager rooted at the given data directory.
    ///
    /// # Arguments
    /// * base_dir - the directory data files live in.
    /// * policy - the page-cache eviction policy.
    /// * cache_size - the page-cache capacity in bytes.
    pub fn new<P: AsRef<Path>>(base_dir: P,
                               policy: EvictionPolicy,
                               cache_size: usize)
                               -> Result<StorageManager, file_manager::Error> {
        let file_manager = FileManager::with_directory(base_dir)?;
        Ok(StorageManager {
            file_manager: file_manager,
            buffers: Rc::new(RefCell::new(BufferManager::new(policy, cache_size))),
        })
    }

    /// Writes every dirty cached page back to its file.
    pub fn flush_all(&self) -> Result<(), buffer_manager::Error> {
        self.buffers.borrow_mut().flush_all()
    }

    /// Writes every dirty cached page back and syncs the files to stable storage.
    pub fn write_all(&self, sync: bool) -> Result<(), buffer_manager::Error> {
        self.buffers.borrow_mut().write_all(sync)
    }

    /// The total number of page pins currently outstanding.  Used by the executor to verify
    /// and enforce the end-of-command pin discipline.
    pub fn total_pin_count(&self) -> u32 {
        self.buffers.borrow().total_pin_count()
    }

    /// Releases any page pins still outstanding, returning how many there were.
    pub fn release_session_pins(&self) -> u32 {
        self.buffers.borrow_mut().release_session_pins()
    }
}
