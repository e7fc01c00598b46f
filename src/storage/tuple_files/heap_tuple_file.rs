//! This module implements tuple file processing for heap files: tuples are stored wherever they
//! fit, in no particular order.

use std::cell::RefCell;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::rc::Rc;

use super::Error;
use super::super::{BufferManager, DBFile, DBPage, Pinnable, Tuple, TupleError, buffer_manager,
                   file_manager, header_page};
use super::super::dbpage::EMPTY_SLOT;
use super::super::page_tuple::{PageTuple, get_tuple_storage_size};
use ::Schema;
use ::expressions::Literal;
use ::stats::{ColumnStats, ColumnStatsCollector, TableStats, read_table_stats, write_table_stats};

/// A page tuple stored in a heap file, so it has an associated slot.
pub struct HeapFilePageTuple {
    page_tuple: PageTuple,
    /// The slot at which the tuple is stored in the heap tuple file.
    pub slot: u16,
}

impl HeapFilePageTuple {
    /// The tuple's external reference: its (page number, slot) pair.
    pub fn location(&self) -> (u32, u16) {
        (self.page_tuple.page_no(), self.slot)
    }
}

impl ::std::ops::Deref for HeapFilePageTuple {
    type Target = PageTuple;

    fn deref(&self) -> &Self::Target {
        &self.page_tuple
    }
}

impl Pinnable for HeapFilePageTuple {
    fn pin(&mut self) {
        self.page_tuple.pin()
    }

    fn unpin(&mut self) -> Result<(), super::super::PinError> {
        self.page_tuple.unpin()
    }

    fn get_pin_count(&self) -> u32 {
        self.page_tuple.get_pin_count()
    }
}

impl Tuple for HeapFilePageTuple {
    fn is_disk_backed(&self) -> bool {
        self.page_tuple.is_disk_backed()
    }

    fn is_null_value(&self, col_index: usize) -> Result<bool, TupleError> {
        self.page_tuple.is_null_value(col_index)
    }

    fn get_column_count(&self) -> usize {
        self.page_tuple.get_column_count()
    }

    fn get_column_value(&mut self, col_index: usize) -> Result<Literal, TupleError> {
        self.page_tuple.get_column_value(col_index)
    }
}

/// Whether a page-fetch failure means "past the end of the data file", which the sequential
/// operations treat as a normal stop condition.
fn is_past_eof(error: &buffer_manager::Error) -> bool {
    match *error {
        buffer_manager::Error::FileManagerError(file_manager::Error::NotFullyRead) => true,
        _ => false,
    }
}

/// This class implements tuple file processing for heap files.
///
/// The file itself is reached through the buffer manager: every page access pins the page for
/// the duration of its use, and tuples handed out by this class keep their backing page pinned
/// until the caller unpins them.
pub struct HeapTupleFile {
    buffers: Rc<RefCell<BufferManager>>,
    file_name: String,
    page_size: u32,
    /// The schema of tuples in this tuple file.
    pub schema: Schema,
    /// Table-level statistics, recomputed by [`analyze`](#method.analyze).
    pub table_stats: TableStats,
    /// Per-column statistics, parallel to the schema's columns.
    pub column_stats: Vec<ColumnStats>,
}

impl HeapTupleFile {
    /// Initializes a brand-new heap tuple file around a freshly created `DBFile`, writing the
    /// schema (and empty statistics) into the header page.
    ///
    /// # Arguments
    /// * buffers - the buffer manager that will own the file's pages.
    /// * db_file - The backing `DBFile`.
    /// * schema - The schema that the file is based on.
    pub fn create(buffers: Rc<RefCell<BufferManager>>,
                  db_file: DBFile<File>,
                  schema: Schema)
                  -> Result<HeapTupleFile, Error> {
        let page_size = db_file.get_page_size();
        let num_columns = schema.num_columns();
        let file_name = buffers.borrow_mut().register_file(db_file)?;

        let mut result = HeapTupleFile {
            buffers: buffers,
            file_name: file_name,
            page_size: page_size,
            schema: schema,
            table_stats: TableStats::unknown(),
            column_stats: vec![ColumnStats::unknown(); num_columns],
        };
        result.save_metadata()?;
        Ok(result)
    }

    /// Opens an existing heap tuple file, reading its schema and statistics from the header
    /// page.
    ///
    /// # Arguments
    /// * buffers - the buffer manager that will own the file's pages.
    /// * db_file - The backing `DBFile`.
    pub fn open(buffers: Rc<RefCell<BufferManager>>,
                db_file: DBFile<File>)
                -> Result<HeapTupleFile, Error> {
        let page_size = db_file.get_page_size();
        let file_name = buffers.borrow_mut().register_file(db_file)?;

        let header = buffers.borrow_mut().get_page(&file_name, 0, false)?;
        let read_result = {
            let mut page = header.borrow_mut();
            HeapTupleFile::read_metadata(&mut page)
        };
        header.borrow_mut().unpin()?;
        let (schema, table_stats, column_stats) = read_result?;

        Ok(HeapTupleFile {
            buffers: buffers,
            file_name: file_name,
            page_size: page_size,
            schema: schema,
            table_stats: table_stats,
            column_stats: column_stats,
        })
    }

    /// Opens a heap tuple file whose backing `DBFile` is already registered with the buffer
    /// manager, reading the schema and statistics through the page cache.
    pub fn open_registered(buffers: Rc<RefCell<BufferManager>>,
                           file_name: &str)
                           -> Result<HeapTupleFile, Error> {
        let page_size = buffers.borrow().file_page_size(file_name)?;

        let header = buffers.borrow_mut().get_page(file_name, 0, false)?;
        let read_result = {
            let mut page = header.borrow_mut();
            HeapTupleFile::read_metadata(&mut page)
        };
        header.borrow_mut().unpin()?;
        let (schema, table_stats, column_stats) = read_result?;

        Ok(HeapTupleFile {
            buffers: buffers,
            file_name: file_name.to_string(),
            page_size: page_size,
            schema: schema,
            table_stats: table_stats,
            column_stats: column_stats,
        })
    }

    fn read_metadata(page: &mut DBPage)
                     -> Result<(Schema, TableStats, Vec<ColumnStats>), Error> {
        page.seek(SeekFrom::Start(header_page::OFFSET_SCHEMA_START as u64))
            .map_err(|e| Error::Stats(format!("{}", e)))?;
        let schema = Schema::read(page)?;

        // The statistics sit immediately after the schema, which is where the cursor is now.
        let (table_stats, column_stats) = read_table_stats(page, &schema)
            .map_err(|e| Error::Stats(format!("{}", e)))?;

        Ok((schema, table_stats, column_stats))
    }

    /// The name the file is registered under with the buffer manager.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The file's page size in bytes.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Writes the schema and statistics of the tuple file into the header page and flushes it.
    pub fn save_metadata(&mut self) -> Result<(), Error> {
        let header = self.buffers.borrow_mut().get_page(&self.file_name, 0, false)?;
        {
            let mut page = header.borrow_mut();

            page.seek(SeekFrom::Start(header_page::OFFSET_SCHEMA_START as u64))
                .map_err(|e| Error::Stats(format!("{}", e)))?;
            let schema_size = self.schema.write(&mut *page)?;
            let stats_size =
                write_table_stats(&mut *page, &self.schema, &self.table_stats, &self.column_stats)
                    .map_err(|e| Error::Stats(format!("{}", e)))?;

            header_page::set_schema_size(&mut page, schema_size)?;
            header_page::set_stats_size(&mut page, stats_size)?;
        }
        header.borrow_mut().unpin()?;
        self.buffers.borrow_mut().flush_page(&self.file_name, 0)?;
        Ok(())
    }

    /// Adds the specified tuple into the table file, returning a `HeapFilePageTuple`
    /// corresponding to the actual tuple added.  The returned tuple is pinned; the caller must
    /// unpin it.
    ///
    /// Pages are searched in allocation order and the tuple is placed in the first page with
    /// enough free space; if no page fits, the file grows by one page.
    ///
    /// # Arguments
    /// * tuple - a tuple object containing the values to add to the table
    pub fn add_tuple<T: Tuple + ?Sized>(&mut self,
                                        tuple: &mut T)
                                        -> Result<HeapFilePageTuple, Error> {
        let tuple_size = get_tuple_storage_size(&self.schema, tuple)?;
        debug!("Adding new tuple of size {} bytes.", tuple_size);

        // A tuple must fit in a page alongside its two-byte slot.
        if (tuple_size as u32) + 2 > self.page_size {
            return Err(Error::Tuple(TupleError::TupleTooBig(tuple_size, self.page_size)));
        }

        let mut page_no = 1;
        let mut db_page: Option<Rc<RefCell<DBPage>>> = None;
        loop {
            let fetched = self.buffers.borrow_mut().get_page(&self.file_name, page_no, false);
            let cur_page = match fetched {
                Ok(page) => page,
                Err(ref e) if is_past_eof(e) => {
                    debug!("Reached end of data file without finding space for new tuple.");
                    break;
                }
                Err(e) => {
                    return Err(e.into());
                }
            };

            let free_space = cur_page.borrow_mut().get_free_space()?;
            trace!("Page {} has {} bytes of free space.", page_no, free_space);

            if free_space >= tuple_size + 2 {
                debug!("Found space for new tuple in page {}.", page_no);
                db_page = Some(cur_page);
                break;
            }

            // Not enough room; drop the pin on this page and try the next one.
            cur_page.borrow_mut().unpin()?;
            page_no += 1;
        }

        let db_page = match db_page {
            Some(page) => page,
            None => {
                // Create a new page at the end of the file.  Here, page_no is just past the
                // current end of the file.
                debug!("Creating new page {} to store new tuple.", page_no);
                let page = self.buffers.borrow_mut().get_page(&self.file_name, page_no, true)?;
                page.borrow_mut().init_new_page()?;
                page
            }
        };

        let (slot, tuple_offset) = {
            let mut page = db_page.borrow_mut();
            let slot = page.alloc_new_tuple(tuple_size)?;
            let tuple_offset = page.get_slot_value(slot)?;
            page.store_new_tuple(tuple_offset, &self.schema, tuple)?;
            (slot, tuple_offset)
        };

        debug!("New tuple resides on page {}, slot {}.", page_no, slot);

        // The page pin acquired above transfers to the returned tuple.
        let page_tuple = PageTuple::new(db_page, tuple_offset, self.schema.clone())?;
        Ok(HeapFilePageTuple {
            page_tuple: page_tuple,
            slot: slot,
        })
    }

    /// Deletes the specified tuple from the table.  The tuple's own pin is unaffected; the
    /// caller remains responsible for unpinning it.
    ///
    /// # Errors
    /// Fails with an `InvalidTupleReference` tuple error if the (page, slot) reference is
    /// stale.
    pub fn delete_tuple(&mut self, tuple: &HeapFilePageTuple) -> Result<(), Error> {
        let (page_no, slot) = tuple.location();
        let page = self.buffers.borrow_mut().get_page(&self.file_name, page_no, false)?;

        let result = {
            let mut page = page.borrow_mut();
            match page.get_slot_value(slot) {
                Ok(offset) if offset == tuple.page_offset() && offset != EMPTY_SLOT => {
                    page.delete_tuple(slot).map_err(Error::from)
                }
                Ok(_) => Err(Error::Tuple(TupleError::InvalidTupleReference(page_no, slot))),
                Err(_) => Err(Error::Tuple(TupleError::InvalidTupleReference(page_no, slot))),
            }
        };
        page.borrow_mut().unpin()?;
        result
    }

    /// Replaces the specified tuple's values.  When the new encoding fits the tuple's current
    /// page (possibly after shifting its neighbors), the tuple keeps its (page, slot) reference
    /// and `None` is returned.  Otherwise the tuple is deleted and re-inserted wherever it
    /// fits, and the new (pinned) tuple is returned: the external reference has changed.
    pub fn update_tuple<T: Tuple + ?Sized>(&mut self,
                                           tuple: &HeapFilePageTuple,
                                           new_values: &mut T)
                                           -> Result<Option<HeapFilePageTuple>, Error> {
        let new_size = get_tuple_storage_size(&self.schema, new_values)?;
        let (page_no, slot) = tuple.location();

        let page = self.buffers.borrow_mut().get_page(&self.file_name, page_no, false)?;

        enum Outcome {
            Done,
            Relocate,
        }

        // The pin on the fetched page must be released on every path, so the page-local work
        // reports its outcome instead of returning early.
        let outcome = {
            let mut page = page.borrow_mut();
            let schema = &self.schema;

            let mut attempt = || -> Result<Outcome, Error> {
                match page.get_slot_value(slot) {
                    Ok(offset) if offset == tuple.page_offset() && offset != EMPTY_SLOT => {}
                    _ => {
                        return Err(Error::Tuple(
                            TupleError::InvalidTupleReference(page_no, slot)));
                    }
                }

                let old_size = page.get_tuple_length(slot)?;
                if new_size == old_size {
                    let offset = page.get_slot_value(slot)?;
                    page.store_new_tuple(offset, schema, new_values)?;
                    return Ok(Outcome::Done);
                }

                match page.resize_tuple(slot, new_size) {
                    Ok(new_offset) => {
                        page.store_new_tuple(new_offset, schema, new_values)?;
                        Ok(Outcome::Done)
                    }
                    Err(super::super::dbpage::Error::NotEnoughFreeSpace(..)) => {
                        Ok(Outcome::Relocate)
                    }
                    Err(e) => Err(e.into()),
                }
            };
            attempt()
        };

        page.borrow_mut().unpin()?;

        match outcome? {
            Outcome::Done => Ok(None),
            Outcome::Relocate => {
                debug!("Updated tuple no longer fits page {}; relocating.", page_no);
                self.delete_tuple(tuple)?;
                self.add_tuple(new_values).map(Some)
            }
        }
    }

    /// Returns the tuple at the given (page, slot) reference.  The returned tuple is pinned on
    /// behalf of the caller.
    ///
    /// # Errors
    /// Fails with an `InvalidTupleReference` tuple error when the reference does not name a
    /// live tuple.
    pub fn get_tuple_at(&mut self,
                        page_no: u32,
                        slot: u16)
                        -> Result<HeapFilePageTuple, Error> {
        let page = self.buffers.borrow_mut().get_page(&self.file_name, page_no, false)?;

        let offset = {
            let mut page = page.borrow_mut();
            match page.get_slot_value(slot) {
                Ok(offset) if offset != EMPTY_SLOT => Some(offset),
                _ => None,
            }
        };

        match offset {
            Some(offset) => {
                let page_tuple = PageTuple::new(page, offset, self.schema.clone())?;
                Ok(HeapFilePageTuple {
                    page_tuple: page_tuple,
                    slot: slot,
                })
            }
            None => {
                page.borrow_mut().unpin()?;
                Err(Error::Tuple(TupleError::InvalidTupleReference(page_no, slot)))
            }
        }
    }

    /// Returns the first tuple in this table file, or `None` if there are no tuples in the
    /// file.  The returned tuple is pinned on behalf of the caller.
    pub fn get_first_tuple(&mut self) -> Result<Option<HeapFilePageTuple>, Error> {
        // Scan through the data pages until we hit the end of the table file.  It may be that
        // the first run of data pages is empty, so just keep looking until we hit the end.

        // Header page is page 0, so first data page is page 1.
        let mut page_no = 1;
        loop {
            let fetched = self.buffers.borrow_mut().get_page(&self.file_name, page_no, false);
            let db_page = match fetched {
                Ok(page) => page,
                Err(ref e) if is_past_eof(e) => break,
                Err(e) => {
                    return Err(e.into());
                }
            };

            let num_slots = db_page.borrow_mut().get_num_slots()?;
            for slot in 0..num_slots {
                let offset = db_page.borrow_mut().get_slot_value(slot)?;
                if offset == EMPTY_SLOT {
                    continue;
                }

                // This is the first tuple in the file; the page pin transfers to it.
                let page_tuple = PageTuple::new(db_page, offset, self.schema.clone())?;
                return Ok(Some(HeapFilePageTuple {
                    page_tuple: page_tuple,
                    slot: slot,
                }));
            }

            db_page.borrow_mut().unpin()?;
            page_no += 1;
        }

        Ok(None)
    }

    /// Returns the tuple that follows the specified tuple, or `None` if there are no more
    /// tuples in the file.  The returned tuple is pinned on behalf of the caller; the previous
    /// tuple's pin is untouched.
    pub fn get_next_tuple(&mut self,
                          cur_tuple: &HeapFilePageTuple)
                          -> Result<Option<HeapFilePageTuple>, Error> {
        // Procedure:
        //   1)  Get the slot index of the current tuple.
        //   2)  If there are more slots in the current page, find the next non-empty slot.
        //   3)  If we get to the end of this page, go to the next page and try again.
        //   4)  If we get to the end of the file, return None.

        let (prev_page_no, prev_slot) = cur_tuple.location();

        // Retrieve the page itself so that we can access the internal data.  The page comes
        // back pinned on behalf of the caller; if it is still in the buffer manager's cache it
        // will not be read from disk, so this is not expensive.
        let mut db_page =
            self.buffers.borrow_mut().get_page(&self.file_name, prev_page_no, false)?;

        let mut next_slot = prev_slot + 1;
        loop {
            let num_slots = db_page.borrow_mut().get_num_slots()?;

            while next_slot < num_slots {
                let next_offset = db_page.borrow_mut().get_slot_value(next_slot)?;
                if next_offset != EMPTY_SLOT {
                    let page_tuple = PageTuple::new(db_page, next_offset, self.schema.clone())?;
                    return Ok(Some(HeapFilePageTuple {
                        page_tuple: page_tuple,
                        slot: next_slot,
                    }));
                }
                next_slot += 1;
            }

            // We reached the end of this page with no more tuples.  Go on to the next data
            // page, and start with the first slot in that page.
            let next_page_no = db_page.borrow().page_no + 1;
            db_page.borrow_mut().unpin()?;

            let fetched = self.buffers.borrow_mut().get_page(&self.file_name, next_page_no, false);
            match fetched {
                Ok(page) => {
                    db_page = page;
                    next_slot = 0;
                }
                Err(ref e) if is_past_eof(e) => break,
                Err(e) => {
                    return Err(e.into());
                }
            }
        }

        Ok(None)
    }

    /// Performs a full scan of the table, recomputing the table-level and per-column
    /// statistics, and persists the new statistics into the header page.
    pub fn analyze(&mut self) -> Result<(), Error> {
        let mut num_tuples: u32 = 0;
        let mut total_bytes: u64 = 0;
        let mut num_data_pages: u16 = 0;
        let mut collectors: Vec<ColumnStatsCollector> = self.schema
            .iter()
            .map(|info| ColumnStatsCollector::new(info.column_type))
            .collect();

        let mut page_no = 1;
        loop {
            let fetched = self.buffers.borrow_mut().get_page(&self.file_name, page_no, false);
            let db_page = match fetched {
                Ok(page) => page,
                Err(ref e) if is_past_eof(e) => break,
                Err(e) => {
                    return Err(e.into());
                }
            };
            num_data_pages += 1;

            let num_slots = db_page.borrow_mut().get_num_slots()?;
            for slot in 0..num_slots {
                let offset = db_page.borrow_mut().get_slot_value(slot)?;
                if offset == EMPTY_SLOT {
                    continue;
                }

                num_tuples += 1;
                total_bytes += db_page.borrow_mut().get_tuple_length(slot)? as u64;

                // Read the tuple's values through a temporary page tuple, which takes a pin of
                // its own on the page.
                db_page.borrow_mut().pin();
                let mut tuple = PageTuple::new(db_page.clone(), offset, self.schema.clone())?;
                for (col_idx, collector) in collectors.iter_mut().enumerate() {
                    collector.add_value(tuple.get_column_value(col_idx)?);
                }
                tuple.unpin()?;
            }

            db_page.borrow_mut().unpin()?;
            page_no += 1;
        }

        self.table_stats = TableStats {
            num_data_pages: num_data_pages,
            num_tuples: Some(num_tuples),
            avg_tuple_size: Some(if num_tuples > 0 {
                total_bytes as f32 / num_tuples as f32
            } else {
                0.0
            }),
        };
        self.column_stats = collectors.into_iter().map(ColumnStatsCollector::finish).collect();

        info!("Analyzed table {}: {} tuples in {} pages.",
              self.file_name,
              num_tuples,
              num_data_pages);

        self.save_metadata()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use tempdir::TempDir;

    use super::*;
    use ::{ColumnInfo, ColumnType, Schema};
    use ::expressions::Literal;
    use ::storage::{BufferManager, FileManager, Pinnable, Tuple, TupleLiteral};
    use ::storage::buffer_manager::EvictionPolicy;
    use ::storage::dbfile::DBFileType;

    struct Fixture {
        _dir: TempDir,
        file_manager: FileManager,
        buffers: Rc<RefCell<BufferManager>>,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new("test_dbfiles").unwrap();
        let file_manager = FileManager::with_directory(dir.path()).unwrap();
        let buffers = Rc::new(RefCell::new(BufferManager::new(EvictionPolicy::LRU,
                                                              64 * 1024)));
        Fixture {
            _dir: dir,
            file_manager: file_manager,
            buffers: buffers,
        }
    }

    fn test_schema() -> Schema {
        Schema::with_columns(vec![
            ColumnInfo::with_table_name(ColumnType::Integer, "A", "T"),
            ColumnInfo::with_table_name(ColumnType::VarChar { length: 20 }, "B", "T"),
        ])
            .unwrap()
    }

    fn heap_file(fixture: &Fixture, name: &str) -> HeapTupleFile {
        let db_file = fixture.file_manager
            .create_dbfile(name, DBFileType::HeapTupleFile, 512)
            .unwrap();
        HeapTupleFile::create(fixture.buffers.clone(), db_file, test_schema()).unwrap()
    }

    fn row(i: i32) -> TupleLiteral {
        TupleLiteral::from_iter(vec![Literal::Int(i), Literal::String(format!("row{}", i))])
    }

    fn scan_first_column(heap: &mut HeapTupleFile) -> Vec<Literal> {
        let mut values = Vec::new();
        let mut cur = heap.get_first_tuple().unwrap();
        while let Some(mut tuple) = cur {
            values.push(tuple.get_column_value(0).unwrap());
            let next = heap.get_next_tuple(&tuple).unwrap();
            tuple.unpin().unwrap();
            cur = next;
        }
        values
    }

    #[test]
    fn test_insert_and_scan_in_order() {
        let f = fixture();
        let mut heap = heap_file(&f, "t1.tbl");

        for i in 1..11 {
            let mut tuple = heap.add_tuple(&mut row(i)).unwrap();
            tuple.unpin().unwrap();
        }

        let expected: Vec<Literal> = (1..11).map(Literal::Int).collect();
        assert_eq!(expected, scan_first_column(&mut heap));

        // Scans leave no pins behind.
        assert_eq!(0, f.buffers.borrow().total_pin_count());
    }

    #[test]
    fn test_delete_preserves_relative_order() {
        let f = fixture();
        let mut heap = heap_file(&f, "t1.tbl");

        for i in 1..11 {
            let mut tuple = heap.add_tuple(&mut row(i)).unwrap();
            tuple.unpin().unwrap();
        }

        // Find and delete the tuple with A = 5.
        let mut cur = heap.get_first_tuple().unwrap();
        while let Some(mut tuple) = cur {
            if tuple.get_column_value(0).unwrap() == Literal::Int(5) {
                heap.delete_tuple(&tuple).unwrap();
                tuple.unpin().unwrap();
                break;
            }
            let next = heap.get_next_tuple(&tuple).unwrap();
            tuple.unpin().unwrap();
            cur = next;
        }

        let expected: Vec<Literal> =
            vec![1, 2, 3, 4, 6, 7, 8, 9, 10].into_iter().map(Literal::Int).collect();
        assert_eq!(expected, scan_first_column(&mut heap));
        assert_eq!(0, f.buffers.borrow().total_pin_count());
    }

    #[test]
    fn test_delete_stale_reference_fails() {
        let f = fixture();
        let mut heap = heap_file(&f, "t1.tbl");

        let mut tuple = heap.add_tuple(&mut row(1)).unwrap();
        heap.delete_tuple(&tuple).unwrap();

        // Deleting again through the stale reference is rejected.
        assert!(match heap.delete_tuple(&tuple) {
            Err(Error::Tuple(TupleError::InvalidTupleReference(..))) => true,
            _ => false,
        });
        tuple.unpin().unwrap();
    }

    #[test]
    fn test_update_in_place_and_relocating() {
        let f = fixture();
        let mut heap = heap_file(&f, "t1.tbl");

        let mut first = heap.add_tuple(&mut row(1)).unwrap();
        let mut second = heap.add_tuple(&mut row(2)).unwrap();

        // Same-size update stays put.
        let mut same_size =
            TupleLiteral::from_iter(vec![Literal::Int(100), Literal::String("row9".into())]);
        assert!(heap.update_tuple(&first, &mut same_size).unwrap().is_none());

        // A longer value still fits the page, so the reference is stable.
        let mut longer =
            TupleLiteral::from_iter(vec![Literal::Int(101),
                                         Literal::String("a longer value".into())]);
        assert!(heap.update_tuple(&first, &mut longer).unwrap().is_none());

        first.unpin().unwrap();
        second.unpin().unwrap();

        let values = scan_first_column(&mut heap);
        assert_eq!(vec![Literal::Int(101), Literal::Int(2)], values);
        assert_eq!(0, f.buffers.borrow().total_pin_count());
    }

    #[test]
    fn test_tuple_too_big_rejected() {
        let f = fixture();
        let db_file = f.file_manager
            .create_dbfile("big.tbl", DBFileType::HeapTupleFile, 512)
            .unwrap();
        let schema = Schema::with_columns(vec![
            ColumnInfo::with_table_name(ColumnType::VarChar { length: 2000 }, "B", "T"),
        ])
            .unwrap();
        let mut heap = HeapTupleFile::create(f.buffers.clone(), db_file, schema).unwrap();

        let big_string: String = ::std::iter::repeat('x').take(1000).collect();
        let mut tuple = TupleLiteral::from_iter(vec![Literal::String(big_string)]);
        assert!(match heap.add_tuple(&mut tuple) {
            Err(Error::Tuple(TupleError::TupleTooBig(..))) => true,
            _ => false,
        });
    }

    #[test]
    fn test_inserts_spill_to_new_pages() {
        let f = fixture();
        let mut heap = heap_file(&f, "t1.tbl");

        // 512-byte pages fill up quickly; fifty rows need several pages.
        for i in 0..50 {
            let mut tuple = heap.add_tuple(&mut row(i)).unwrap();
            tuple.unpin().unwrap();
        }

        let values = scan_first_column(&mut heap);
        assert_eq!(50, values.len());
        assert_eq!((0..50).map(Literal::Int).collect::<Vec<_>>(), values);
    }

    #[test]
    fn test_analyze_and_reopen() {
        let f = fixture();
        let file_name = {
            let mut heap = heap_file(&f, "t1.tbl");
            for i in 1..21 {
                let mut tuple = heap.add_tuple(&mut row(i % 10)).unwrap();
                tuple.unpin().unwrap();
            }
            let mut null_row =
                TupleLiteral::from_iter(vec![Literal::Null, Literal::String("n".into())]);
            let mut tuple = heap.add_tuple(&mut null_row).unwrap();
            tuple.unpin().unwrap();

            heap.analyze().unwrap();

            assert_eq!(Some(21), heap.table_stats.num_tuples);
            assert!(heap.table_stats.num_data_pages > 0);
            assert_eq!(Some(10), heap.column_stats[0].num_unique_values);
            assert_eq!(Some(1), heap.column_stats[0].num_null_values);
            assert_eq!(Some(Literal::Int(0)), heap.column_stats[0].min_value);
            assert_eq!(Some(Literal::Int(9)), heap.column_stats[0].max_value);
            // Strings carry no min/max.
            assert_eq!(None, heap.column_stats[1].min_value);
            heap.file_name().to_string()
        };

        // Reopening the file recovers both the schema and the persisted statistics.
        f.buffers.borrow_mut().release_session_pins();
        f.buffers.borrow_mut().remove_file(&file_name).unwrap();
        let db_file = f.file_manager.open_dbfile(&file_name).unwrap();
        let reopened = HeapTupleFile::open(f.buffers.clone(), db_file).unwrap();

        assert_eq!(test_schema(), reopened.schema);
        assert_eq!(Some(21), reopened.table_stats.num_tuples);
        assert_eq!(Some(10), reopened.column_stats[0].num_unique_values);
    }
}
