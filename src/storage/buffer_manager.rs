//! The Buffer Manager caches loaded database pages in memory, so that repeated accesses to the
//! same page do not hit the filesystem, and so that the rest of the system can share one page
//! object per (file, page) pair.
//!
//! Pages handed out by the buffer manager carry pin counts: a page with a nonzero pin count is
//! in use and will never be evicted.  When the cache exceeds its configured size, unpinned pages
//! are evicted in FIFO or LRU order; dirty pages are written back to their file first, after any
//! registered observers have been notified (this is the hook a transaction manager uses to force
//! the write-ahead log before data pages reach disk).

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::rc::Rc;
use std::str::FromStr;

use super::dbfile::DBFile;
use super::dbpage::DBPage;
use super::file_manager;
use super::Pinnable;

/// The default page-cache capacity, in bytes.
pub const DEFAULT_PAGECACHE_SIZE: usize = 1024 * 1024;

/// The policy used to choose which unpinned page to evict when the cache is full.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EvictionPolicy {
    /// Evict the page that has been cached the longest.
    FIFO,
    /// Evict the page that was used least recently.
    LRU,
}

impl FromStr for EvictionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<EvictionPolicy, String> {
        match s.to_uppercase().as_ref() {
            "FIFO" => Ok(EvictionPolicy::FIFO),
            "LRU" => Ok(EvictionPolicy::LRU),
            other => Err(format!("unknown eviction policy {}", other)),
        }
    }
}

/// Observers are notified before the buffer manager writes dirty pages to disk.  The pages are
/// identified by (file name, page number).  The transaction manager registers an observer that
/// forces the write-ahead log up to each page's last-update LSN.
pub trait BufferObserver {
    /// Called with the identities of the dirty pages about to be written.
    fn before_writing_dirty_pages(&mut self, pages: &[(String, u32)]);
}

#[derive(Debug, Clone, PartialEq)]
/// An error that can occur during buffer-manager operations.
pub enum Error {
    /// The named file has not been registered with the buffer manager.
    FileNotRegistered(String),
    /// A file without a backing path cannot be cached.
    FileHasNoName,
    /// An error occurred at the file-manager level.
    FileManagerError(file_manager::Error),
}

impl From<file_manager::Error> for Error {
    fn from(e: file_manager::Error) -> Error {
        Error::FileManagerError(e)
    }
}

impl ::std::fmt::Display for Error {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        match *self {
            Error::FileNotRegistered(ref name) => {
                write!(f, "The file {} is not registered with the buffer manager.", name)
            }
            Error::FileHasNoName => {
                write!(f, "Files without a backing path cannot be buffered.")
            }
            Error::FileManagerError(ref e) => write!(f, "{}", e),
        }
    }
}

/// The buffer manager itself: a mapping from (file name, page number) to cached pages, plus the
/// open file handles the pages came from, so that write-back is always possible.
pub struct BufferManager {
    files: HashMap<String, DBFile<File>>,
    cache: HashMap<(String, u32), Rc<RefCell<DBPage>>>,
    /// Cache keys in eviction-candidate order; the front is the first candidate.
    usage_order: Vec<(String, u32)>,
    policy: EvictionPolicy,
    max_cache_size: usize,
    current_size: usize,
    observers: Vec<Box<BufferObserver>>,
}

impl BufferManager {
    /// Creates a buffer manager with the given eviction policy and capacity in bytes.
    pub fn new(policy: EvictionPolicy, max_cache_size: usize) -> BufferManager {
        BufferManager {
            files: HashMap::new(),
            cache: HashMap::new(),
            usage_order: Vec::new(),
            policy: policy,
            max_cache_size: max_cache_size,
            current_size: 0,
            observers: Vec::new(),
        }
    }

    /// Registers an observer to be notified before dirty pages are written.
    pub fn add_observer(&mut self, observer: Box<BufferObserver>) {
        self.observers.push(observer);
    }

    /// Adjusts the cache capacity.  The new capacity takes effect on the next page load.
    pub fn set_max_cache_size(&mut self, bytes: usize) {
        self.max_cache_size = bytes;
    }

    /// Registers an open file with the buffer manager so its pages can be cached and written
    /// back.  Returns the name the file is registered under.
    pub fn register_file(&mut self, file: DBFile<File>) -> Result<String, Error> {
        let name = file.file_name().ok_or(Error::FileHasNoName)?;
        self.files.entry(name.clone()).or_insert(file);
        Ok(name)
    }

    /// Whether a file with the given name is registered.
    pub fn is_file_registered(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    /// The page size of the registered file.
    pub fn file_page_size(&self, name: &str) -> Result<u32, Error> {
        self.files
            .get(name)
            .map(|f| f.get_page_size())
            .ok_or_else(|| Error::FileNotRegistered(name.into()))
    }

    /// The number of whole pages in the registered file.
    pub fn file_num_pages(&self, name: &str) -> Result<u32, Error> {
        let file = self.files.get(name).ok_or_else(|| Error::FileNotRegistered(name.to_string()))?;
        file.num_pages().map_err(|_| Error::FileManagerError(file_manager::Error::IOError))
    }

    /// Retrieves the requested page, loading it through the file manager on a cache miss.  The
    /// returned page has been pinned once on behalf of the caller, who must unpin it when done.
    ///
    /// # Arguments
    /// * file_name - the name the file was registered under
    /// * page_no - the page to retrieve
    /// * create - whether to extend the file if the page is past end-of-file
    pub fn get_page(&mut self,
                    file_name: &str,
                    page_no: u32,
                    create: bool)
                    -> Result<Rc<RefCell<DBPage>>, Error> {
        let key = (file_name.to_string(), page_no);

        if let Some(page) = self.cache.get(&key).cloned() {
            trace!("Cache hit for page {} of file {}.", page_no, file_name);
            if self.policy == EvictionPolicy::LRU {
                // Move the page to the back of the eviction order.
                self.usage_order.retain(|k| *k != key);
                self.usage_order.push(key);
            }
            page.borrow_mut().pin();
            return Ok(page);
        }

        if !self.files.contains_key(file_name) {
            return Err(Error::FileNotRegistered(file_name.into()));
        }

        let page_size = self.file_page_size(file_name)? as usize;
        self.make_room(page_size)?;

        let page = {
            let file = self.files.get_mut(file_name).unwrap();
            let mut page = DBPage::new(&file.file_info, page_no);
            file_manager::load_page(file, page_no, &mut page.page_data, create)?;
            page
        };

        debug!("Loaded page {} of file {} into the cache.", page_no, file_name);

        let page = Rc::new(RefCell::new(page));
        page.borrow_mut().pin();
        self.cache.insert(key.clone(), page.clone());
        self.usage_order.push(key);
        self.current_size += page_size;

        Ok(page)
    }

    /// Makes room for `incoming` more bytes of page data, evicting unpinned pages as needed.
    /// When every cached page is pinned the cache simply grows past its capacity, with a
    /// warning.
    fn make_room(&mut self, incoming: usize) -> Result<(), Error> {
        while self.current_size + incoming > self.max_cache_size {
            let victim = self.usage_order
                .iter()
                .position(|key| self.cache[key].borrow().get_pin_count() == 0)
                .map(|pos| self.usage_order[pos].clone());

            match victim {
                Some(key) => {
                    self.evict(&key)?;
                }
                None => {
                    warn!("Page cache is over capacity ({} + {} > {} bytes) but every page \
                           is pinned; growing the cache.",
                          self.current_size,
                          incoming,
                          self.max_cache_size);
                    break;
                }
            }
        }
        Ok(())
    }

    /// Evicts the page with the given key, writing it back first if it is dirty.
    fn evict(&mut self, key: &(String, u32)) -> Result<(), Error> {
        debug!("Evicting page {} of file {}.", key.1, key.0);

        let page = match self.cache.get(key).cloned() {
            Some(page) => page,
            None => {
                return Ok(());
            }
        };

        if page.borrow().is_dirty() {
            let written = vec![key.clone()];
            for observer in self.observers.iter_mut() {
                observer.before_writing_dirty_pages(&written);
            }
            self.write_page(key, &page)?;
        }

        let page_size = page.borrow().page_data.len();
        self.cache.remove(key);
        self.usage_order.retain(|k| k != key);
        self.current_size -= page_size;
        Ok(())
    }

    fn write_page(&mut self,
                  key: &(String, u32),
                  page: &Rc<RefCell<DBPage>>)
                  -> Result<(), Error> {
        let file = self.files
            .get_mut(&key.0)
            .ok_or_else(|| Error::FileNotRegistered(key.0.clone()))?;
        let mut page = page.borrow_mut();
        file_manager::save_page(file, key.1, &page.page_data)?;
        page.set_dirty(false);
        Ok(())
    }

    /// Writes the given page back to its file if it is dirty, leaving it in the cache.
    pub fn flush_page(&mut self, file_name: &str, page_no: u32) -> Result<(), Error> {
        let key = (file_name.to_string(), page_no);
        if let Some(page) = self.cache.get(&key).cloned() {
            if page.borrow().is_dirty() {
                let written = vec![key.clone()];
                for observer in self.observers.iter_mut() {
                    observer.before_writing_dirty_pages(&written);
                }
                self.write_page(&key, &page)?;
            }
        }
        Ok(())
    }

    /// Writes all of the named file's dirty pages back, leaving them in the cache.
    pub fn flush_file(&mut self, file_name: &str) -> Result<(), Error> {
        let keys: Vec<(String, u32)> = self.cache
            .keys()
            .filter(|key| key.0 == file_name)
            .cloned()
            .collect();
        self.flush_keys(keys)
    }

    /// Writes every dirty page in the cache back to its file.
    pub fn flush_all(&mut self) -> Result<(), Error> {
        let keys: Vec<(String, u32)> = self.cache.keys().cloned().collect();
        self.flush_keys(keys)
    }

    fn flush_keys(&mut self, mut keys: Vec<(String, u32)>) -> Result<(), Error> {
        keys.retain(|key| self.cache[key].borrow().is_dirty());
        if keys.is_empty() {
            return Ok(());
        }
        keys.sort();

        for observer in self.observers.iter_mut() {
            observer.before_writing_dirty_pages(&keys);
        }
        for key in keys {
            let page = self.cache[&key].clone();
            self.write_page(&key, &page)?;
        }
        Ok(())
    }

    /// Flushes every dirty page and then the underlying file streams.  With `sync` set the
    /// files are synced to stable storage.
    pub fn write_all(&mut self, sync: bool) -> Result<(), Error> {
        self.flush_all()?;
        for file in self.files.values_mut() {
            file.flush().map_err(|_| Error::FileManagerError(file_manager::Error::IOError))?;
            if sync {
                file.get_contents()
                    .sync_all()
                    .map_err(|_| Error::FileManagerError(file_manager::Error::IOError))?;
            }
        }
        Ok(())
    }

    /// Removes the named file from the buffer manager: its dirty pages are flushed, its cached
    /// pages dropped, and its handle closed.  Used when a table is dropped or renamed.
    pub fn remove_file(&mut self, file_name: &str) -> Result<(), Error> {
        self.flush_file(file_name)?;

        let keys: Vec<(String, u32)> = self.cache
            .keys()
            .filter(|key| key.0 == file_name)
            .cloned()
            .collect();
        for key in keys {
            let page_size = self.cache[&key].borrow().page_data.len();
            self.cache.remove(&key);
            self.usage_order.retain(|k| *k != key);
            self.current_size -= page_size;
        }

        self.files.remove(file_name);
        Ok(())
    }

    /// Drops the named file's pages without flushing them, and closes its handle.  Used when a
    /// table is being deleted outright.
    pub fn discard_file(&mut self, file_name: &str) {
        let keys: Vec<(String, u32)> = self.cache
            .keys()
            .filter(|key| key.0 == file_name)
            .cloned()
            .collect();
        for key in keys {
            let page_size = self.cache[&key].borrow().page_data.len();
            self.cache.remove(&key);
            self.usage_order.retain(|k| *k != key);
            self.current_size -= page_size;
        }
        self.files.remove(file_name);
    }

    /// The sum of the pin counts of every cached page.  A well-behaved command execution ends
    /// with this at zero.
    pub fn total_pin_count(&self) -> u32 {
        self.cache.values().map(|page| page.borrow().get_pin_count()).sum()
    }

    /// Unpins every page the session still holds pinned, returning how many pins were released.
    /// The executor calls this at the end of every command so that stray pins (e.g. after an
    /// error unwound the plan tree) cannot pin pages forever.
    pub fn release_session_pins(&mut self) -> u32 {
        let mut released = 0;
        for page in self.cache.values() {
            let mut page = page.borrow_mut();
            while page.get_pin_count() > 0 {
                let _ = page.unpin();
                released += 1;
            }
        }
        if released > 0 {
            debug!("Released {} leftover page pin(s) at end of command.", released);
        }
        released
    }

    /// The number of pages currently cached.
    pub fn num_cached_pages(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;
    use ::storage::{FileManager, Pinnable};
    use ::storage::dbfile::DBFileType;

    struct Fixture {
        _dir: TempDir,
        buffers: BufferManager,
        name: String,
    }

    fn fixture(policy: EvictionPolicy, cache_bytes: usize) -> Fixture {
        let dir = TempDir::new("test_dbfiles").unwrap();
        let file_manager = FileManager::with_directory(dir.path()).unwrap();
        let file = file_manager.create_dbfile("test.tbl", DBFileType::TestFile, 512).unwrap();

        let mut buffers = BufferManager::new(policy, cache_bytes);
        let name = buffers.register_file(file).unwrap();
        Fixture {
            _dir: dir,
            buffers: buffers,
            name: name,
        }
    }

    #[test]
    fn test_cache_returns_same_page() {
        let mut f = fixture(EvictionPolicy::LRU, 8192);

        let page = f.buffers.get_page(&f.name, 1, true).unwrap();
        page.borrow_mut().write_at_position(10, &[7, 7, 7]).unwrap();

        // A second fetch sees the same bytes (in fact the same page object).
        let again = f.buffers.get_page(&f.name, 1, false).unwrap();
        let mut read = [0u8; 3];
        again.borrow().read_at_position(10, &mut read).unwrap();
        assert_eq!([7, 7, 7], read);
        assert_eq!(2, again.borrow().get_pin_count());

        page.borrow_mut().unpin().unwrap();
        again.borrow_mut().unpin().unwrap();
        assert_eq!(0, f.buffers.total_pin_count());
    }

    #[test]
    fn test_missing_page_without_create_fails() {
        let mut f = fixture(EvictionPolicy::LRU, 8192);
        assert!(f.buffers.get_page(&f.name, 99, false).is_err());
    }

    #[test]
    fn test_eviction_skips_pinned_pages() {
        // Cache of two pages.
        let mut f = fixture(EvictionPolicy::FIFO, 1024);

        let page1 = f.buffers.get_page(&f.name, 1, true).unwrap();
        let page2 = f.buffers.get_page(&f.name, 2, true).unwrap();
        assert_eq!(2, f.buffers.num_cached_pages());

        // Unpin page 2 only; loading page 3 must evict page 2, not the pinned page 1.
        page2.borrow_mut().unpin().unwrap();
        let _page3 = f.buffers.get_page(&f.name, 3, true).unwrap();

        assert_eq!(2, f.buffers.num_cached_pages());
        assert_eq!(1, page1.borrow().get_pin_count());

        // Page 1 is still cached: fetching it again does not reload (the object is shared).
        let again = f.buffers.get_page(&f.name, 1, false).unwrap();
        assert_eq!(2, again.borrow().get_pin_count());
    }

    #[test]
    fn test_cache_grows_when_everything_pinned() {
        let mut f = fixture(EvictionPolicy::FIFO, 512);

        let _page1 = f.buffers.get_page(&f.name, 1, true).unwrap();
        let _page2 = f.buffers.get_page(&f.name, 2, true).unwrap();
        // Both pages pinned, capacity exceeded, but both stay cached.
        assert_eq!(2, f.buffers.num_cached_pages());
    }

    #[test]
    fn test_eviction_writes_dirty_page_back() {
        let mut f = fixture(EvictionPolicy::FIFO, 512);

        {
            let page = f.buffers.get_page(&f.name, 1, true).unwrap();
            page.borrow_mut().write_at_position(0, &[0xde, 0xad]).unwrap();
            page.borrow_mut().unpin().unwrap();
        }

        // Loading another page evicts page 1, which must be written back.
        let _other = f.buffers.get_page(&f.name, 2, true).unwrap();

        let reloaded = f.buffers.get_page(&f.name, 1, false).unwrap();
        let mut read = [0u8; 2];
        reloaded.borrow().read_at_position(0, &mut read).unwrap();
        assert_eq!([0xde, 0xad], read);
    }

    struct CountingObserver {
        log: ::std::rc::Rc<::std::cell::RefCell<Vec<(String, u32)>>>,
    }

    impl BufferObserver for CountingObserver {
        fn before_writing_dirty_pages(&mut self, pages: &[(String, u32)]) {
            self.log.borrow_mut().extend(pages.iter().cloned());
        }
    }

    #[test]
    fn test_observers_fire_before_writes() {
        let mut f = fixture(EvictionPolicy::FIFO, 8192);
        let log = ::std::rc::Rc::new(::std::cell::RefCell::new(Vec::new()));
        f.buffers.add_observer(Box::new(CountingObserver { log: log.clone() }));

        let page = f.buffers.get_page(&f.name, 1, true).unwrap();
        page.borrow_mut().write_at_position(0, &[1]).unwrap();
        page.borrow_mut().unpin().unwrap();

        f.buffers.flush_all().unwrap();
        assert_eq!(vec![(f.name.clone(), 1)], *log.borrow());

        // A clean flush notifies nobody.
        f.buffers.flush_all().unwrap();
        assert_eq!(1, log.borrow().len());
    }

    #[test]
    fn test_release_session_pins() {
        let mut f = fixture(EvictionPolicy::LRU, 8192);

        let _page1 = f.buffers.get_page(&f.name, 1, true).unwrap();
        let _page2 = f.buffers.get_page(&f.name, 2, true).unwrap();
        assert_eq!(2, f.buffers.total_pin_count());

        assert_eq!(2, f.buffers.release_session_pins());
        assert_eq!(0, f.buffers.total_pin_count());
    }

    #[test]
    fn test_lru_order() {
        let mut f = fixture(EvictionPolicy::LRU, 1024);

        let page1 = f.buffers.get_page(&f.name, 1, true).unwrap();
        let page2 = f.buffers.get_page(&f.name, 2, true).unwrap();
        page1.borrow_mut().unpin().unwrap();
        page2.borrow_mut().unpin().unwrap();

        // Touch page 1 so page 2 becomes least-recently-used.
        let touched = f.buffers.get_page(&f.name, 1, false).unwrap();
        touched.borrow_mut().unpin().unwrap();

        let _page3 = f.buffers.get_page(&f.name, 3, true).unwrap();

        // Page 1 must have survived; it is still a cache hit with its data shared.
        assert!(f.buffers.get_page(&f.name, 1, false).is_ok());
        // 2 pages: either page2 was evicted (expected) leaving {1, 3} cached plus the re-fetch
        // of page 1.
        assert_eq!(2, f.buffers.num_cached_pages());
    }
}
