//! This module contains utilities to handle pages within database files for NanoDB.
//!
//! Data pages use a slotted layout: a slot directory grows forward from the start of the page,
//! and tuple data grows backward from the end.
//!
//! ```text
//! [ u16 num_slots | u16 slot[0] | ... | u16 slot[n-1] | ... FREE ... | tuple_{n-1} | ... | tuple_0 ]
//! ```
//!
//! A slot holds the offset of its tuple's first byte, or [`EMPTY_SLOT`](constant.EMPTY_SLOT.html)
//! when the tuple has been deleted.  Tuples are kept packed against the end of the page: slot
//! order corresponds to descending data offsets, and the free space always forms one contiguous
//! run between the end of the slot directory and the start of tuple data.

use std::io::{self, ErrorKind, SeekFrom};
use std::io::prelude::*;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use ::{ColumnType, Schema};
use ::expressions::Literal;
use ::storage::{DBFileInfo, PinError, Pinnable, ReadNanoDBExt, Tuple, TupleError, WriteNanoDBExt};
use ::storage::page_tuple::get_null_flags_size;

/// The offset in the data page where the number of slots in the slot table is stored.
const OFFSET_NUM_SLOTS: u16 = 0;

/// This offset-value is stored into a slot when it is empty.  It is set to zero because this is
/// where the page's slot-count is stored and therefore this is obviously an invalid offset for a
/// tuple to be located at.
pub const EMPTY_SLOT: u16 = 0;

#[derive(Debug, Clone, PartialEq)]
/// An error that can occur during the operations on a `DBPage`.
pub enum Error {
    /// Some I/O error occurred.
    IOError(String),
    /// For when a tuple error occurs.
    TupleError(Box<TupleError>),
    /// The slot asked for is at an invalid position.  In the form of (num slots, slot desired).
    InvalidSlot(u16, u16),
    /// The slot is empty when a live tuple was required.  In the form of (page no, slot).
    EmptySlot(u32, u16),
    /// The page does not have enough space for the tuple.  In the form of (needed, free space).
    NotEnoughFreeSpace(u16, u16),
    /// The provided offset is not in the tuple data portion of the page.  In the form of
    /// (offset, tuple data start).
    OffsetNotInTuplePortion(u16, u16),
    /// The tuple provided does not have the same arity as the schema provided.  In the form of
    /// (tuple size, schema size).
    WrongArity(usize, usize),
    /// A value cannot be stored in the declared column type.
    CannotStoreValue(ColumnType, Literal),
}

impl ::std::fmt::Display for Error {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        match *self {
            Error::IOError(ref e) => write!(f, "An IO error occurred: {}", e),
            Error::TupleError(ref e) => write!(f, "{}", e),
            Error::InvalidSlot(num_slots, slot) => {
                write!(f, "Valid slots are in range [0, {}). Got {}.", num_slots, slot)
            }
            Error::EmptySlot(page_no, slot) => {
                write!(f, "Slot {} of page {} is empty.", slot, page_no)
            }
            Error::NotEnoughFreeSpace(needed, free) => {
                write!(f,
                       "Requested {} bytes, but not enough free space in the page ({} bytes).",
                       needed,
                       free)
            }
            Error::OffsetNotInTuplePortion(offset, tuple_data_start) => {
                write!(f,
                       "Specified offset {} is not actually in the tuple data portion of this \
                        page (data starts at offset {}).",
                       offset,
                       tuple_data_start)
            }
            Error::WrongArity(tup_size, schema_size) => {
                write!(f,
                       "Tuple has different arity ({} columns) than target schema ({} columns).",
                       tup_size,
                       schema_size)
            }
            Error::CannotStoreValue(ref col_type, ref value) => {
                write!(f, "The value {} cannot be stored as {}.", value, col_type)
            }
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::IOError(format!("{}", e))
    }
}

impl From<TupleError> for Error {
    fn from(error: TupleError) -> Error {
        Error::TupleError(Box::new(error))
    }
}

#[inline]
fn get_slot_offset(slot: u16) -> u16 {
    (1 + slot) * 2
}

/// This class represents a single page in a database file.  The page's (zero-based) index in the
/// file, and whether the page has been changed in memory, are tracked by the object.
///
/// Database pages do not provide any locking mechanisms to guard against concurrent access.
/// Locking must be managed at a level above what this class provides.
///
/// The class provides methods to read and write a wide range of data types.  Multibyte values
/// are stored in big-endian format, with the most significant byte (MSB) stored at the lowest
/// index.  (This is also the network byte order specified by the Internet Protocol.)
///
/// # Design
/// It is very important that the page is marked dirty *before* any changes are made, because
/// this is the point when the old version of the page data is copied before changes are made.
/// Additionally, the page's data must not be manipulated separately from the methods provided by
/// this class, or else the old version of the page won't be recorded properly.
pub struct DBPage {
    /// The page number of the `DBPage`.
    pub page_no: u32,
    pin_count: u32,
    dirty: bool,
    /// The data contained in the page.
    pub page_data: Vec<u8>,
    old_page_data: Option<Vec<u8>>,

    cur_page_position: u64,
}

impl DBPage {
    /// Instantiate a new `DBPage` instance, referring to a page number on a `DBFile` with the
    /// provided information.
    ///
    /// # Arguments
    /// * db_file_info - The `DBFile` metadata.
    /// * page_no - The page number.
    pub fn new(db_file_info: &DBFileInfo, page_no: u32) -> DBPage {
        DBPage {
            page_no: page_no,
            pin_count: 0,
            dirty: false,
            page_data: vec![0; db_file_info.page_size as usize],
            old_page_data: None,
            cur_page_position: 0,
        }
    }

    /// Whether the page has been modified since it was loaded or last written back.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Sets the dirty flag to true or false, indicating whether the page's data has or has not
    /// been changed in memory.  The first transition to dirty snapshots the page contents so the
    /// original data remains available until the page is written back.
    ///
    /// # Arguments
    /// * is_dirty - the dirty flag; true if the page's data is dirty, or false otherwise
    pub fn set_dirty(&mut self, is_dirty: bool) {
        if !self.dirty && is_dirty {
            self.old_page_data = Some(self.page_data.clone());
        } else if self.dirty && !is_dirty {
            self.old_page_data = None;
        }

        self.dirty = is_dirty;
    }

    /// The snapshot of the page data taken when the page first became dirty, if it is dirty.
    pub fn get_old_page_data(&self) -> Option<&[u8]> {
        self.old_page_data.as_ref().map(|v| v.as_slice())
    }

    /// Given a position within the page, read enough data to fill the provided buffer.
    pub fn read_at_position(&self, position: usize, buffer: &mut [u8]) -> Result<usize, Error> {
        let length = buffer.len();
        if position + length > self.page_data.len() {
            return Err(Error::IOError("read past the end of the page".into()));
        }
        buffer.copy_from_slice(&self.page_data[position..(position + length)]);
        Ok(length)
    }

    /// Given a position within the page, write the provided buffer into the page data.
    pub fn write_at_position(&mut self, position: usize, buffer: &[u8]) -> Result<usize, Error> {
        let length = buffer.len();
        if position + length > self.page_data.len() {
            return Err(Error::IOError("write past the end of the page".into()));
        }
        self.set_dirty(true);
        self.page_data[position..(position + length)].copy_from_slice(buffer);
        Ok(length)
    }

    /// This helper function returns the amount of free space in a tuple data page.  It simply
    /// uses other methods in this class to perform the simple computation.
    #[inline]
    pub fn get_free_space(&mut self) -> Result<u16, Error> {
        let data_start = self.get_tuple_data_start()?;
        let slot_end = self.get_slots_end_index()?;
        Ok(data_start - slot_end)
    }

    /// Initialize a newly allocated data page.  Currently this involves setting the number of
    /// slots to 0.  There is no other internal structure in data pages at this point.
    #[inline]
    pub fn init_new_page(&mut self) -> Result<(), Error> {
        self.set_num_slots(0)
    }

    fn set_num_slots(&mut self, num_slots: u16) -> Result<(), Error> {
        self.seek(SeekFrom::Start(OFFSET_NUM_SLOTS as u64))?;
        self.write_u16::<BigEndian>(num_slots).map_err(Into::into)
    }

    /// Returns the number of slots in this data page.  This can be considered to be the current
    /// "capacity" of the page, since any number of the slots could be set to
    /// [`EMPTY_SLOT`](constant.EMPTY_SLOT.html) to indicate that they are empty.
    pub fn get_num_slots(&mut self) -> Result<u16, Error> {
        self.seek(SeekFrom::Start(OFFSET_NUM_SLOTS as u64))?;
        self.read_u16::<BigEndian>().map_err(Into::into)
    }

    fn set_slot_value(&mut self, slot: u16, value: u16) -> Result<(), Error> {
        let num_slots = self.get_num_slots()?;
        if slot >= num_slots {
            return Err(Error::InvalidSlot(num_slots, slot));
        }

        self.seek(SeekFrom::Start(get_slot_offset(slot) as u64))?;
        self.write_u16::<BigEndian>(value).map_err(Into::into)
    }

    /// This helper function returns the value stored in the specified slot.  This will either be
    /// the offset of the start of a tuple in the data page, or it will be
    /// [`EMPTY_SLOT`](constant.EMPTY_SLOT.html) if the slot is empty.
    ///
    /// # Arguments
    /// * slot - the slot to retrieve the value for.
    ///
    /// # Errors
    /// Returns an `InvalidSlot` error if the slot provided is not within the range
    /// [0, num_slots).
    pub fn get_slot_value(&mut self, slot: u16) -> Result<u16, Error> {
        let num_slots = self.get_num_slots()?;
        if slot >= num_slots {
            return Err(Error::InvalidSlot(num_slots, slot));
        }

        self.seek(SeekFrom::Start(get_slot_offset(slot) as u64))?;
        self.read_u16::<BigEndian>().map_err(Into::into)
    }

    fn get_slots_end_index(&mut self) -> Result<u16, Error> {
        self.get_num_slots().map(get_slot_offset)
    }

    /// The offset where tuple data currently starts: the smallest offset held by any live slot,
    /// or the page size when the page holds no tuples.
    fn get_tuple_data_start(&mut self) -> Result<u16, Error> {
        let num_slots = self.get_num_slots()?;

        // If there are no tuples in this page, "data start" is the top of the page data.
        let mut data_start = self.page_data.len() as u16;

        // Slot order corresponds to descending data offsets, so the last live slot names the
        // lowest tuple offset.
        if num_slots > 0 {
            let mut slot = num_slots;
            while slot > 0 {
                slot -= 1;
                let slot_value = self.get_slot_value(slot)?;
                if slot_value != EMPTY_SLOT {
                    data_start = slot_value;
                    break;
                }
            }
        }

        Ok(data_start)
    }

    /// The number of bytes the tuple in the given slot occupies: from its offset up to the next
    /// live tuple's offset above it (or the end of the page).
    pub fn get_tuple_length(&mut self, slot: u16) -> Result<u16, Error> {
        let offset = self.get_slot_value(slot)?;
        if offset == EMPTY_SLOT {
            return Err(Error::EmptySlot(self.page_no, slot));
        }

        let num_slots = self.get_num_slots()?;
        let mut tuple_end = self.page_data.len() as u16;
        for other in 0..num_slots {
            let other_offset = self.get_slot_value(other)?;
            if other_offset != EMPTY_SLOT && other_offset > offset && other_offset < tuple_end {
                tuple_end = other_offset;
            }
        }

        Ok(tuple_end - offset)
    }

    /// Update the data page so that it has space for a new tuple of the specified size.  The new
    /// tuple is assigned a slot (whose index is returned by this method), and the space for the
    /// tuple is initialized to all zero values.
    ///
    /// Returns the slot-index for the new tuple.  The offset to the start of the requested
    /// space is available via that slot.  (Use `get_slot_value` to retrieve that offset.)
    ///
    /// # Arguments
    /// * len - The length of the new tuple's data.
    pub fn alloc_new_tuple(&mut self, len: u16) -> Result<u16, Error> {
        let num_slots = self.get_num_slots()?;

        // Pick the slot: the first tombstone in the directory, or a fresh one past the end.
        // Slot order mirrors descending data offsets, so the new tuple's body must end exactly
        // where the last live tuple before the chosen slot begins; track that boundary while
        // scanning.
        let mut target_slot = num_slots;
        let mut body_end = self.page_data.len() as u16;
        for candidate in 0..num_slots {
            let offset = self.get_slot_value(candidate)?;
            if offset == EMPTY_SLOT {
                target_slot = candidate;
                break;
            }
            body_end = offset;
        }

        // A fresh slot costs two directory bytes on top of the tuple body.
        let grows_directory = target_slot == num_slots;
        let needed = if grows_directory { len + 2 } else { len };
        let available = self.get_free_space()?;
        if needed > available {
            return Err(Error::NotEnoughFreeSpace(needed, available));
        }

        if grows_directory {
            self.set_num_slots(num_slots + 1)?;
            self.set_slot_value(target_slot, EMPTY_SLOT)?;
        }

        // Open a hole for the body; the target slot is still EMPTY_SLOT at this point, so the
        // gap operation leaves it alone while repointing its neighbors.
        self.open_tuple_gap(body_end, len)?;
        let body_start = body_end - len;
        self.set_slot_value(target_slot, body_start)?;

        debug!("New {}-byte tuple assigned slot {} at [{}, {}).",
               len,
               target_slot,
               body_start,
               body_end);

        Ok(target_slot)
    }

    /// Deletes the tuple in the given slot: the slot becomes a tombstone, the tuple's bytes are
    /// reclaimed by sliding lower-offset tuple data over them, and trailing tombstones are
    /// trimmed from the slot directory.
    pub fn delete_tuple(&mut self, slot: u16) -> Result<(), Error> {
        let offset = self.get_slot_value(slot)?;
        if offset == EMPTY_SLOT {
            return Err(Error::EmptySlot(self.page_no, slot));
        }
        let length = self.get_tuple_length(slot)?;

        self.set_slot_value(slot, EMPTY_SLOT)?;
        self.close_tuple_gap(offset, length)?;

        // Trim trailing tombstones so the slot directory doesn't grow without bound.
        let mut num_slots = self.get_num_slots()?;
        while num_slots > 0 && self.get_slot_value(num_slots - 1)? == EMPTY_SLOT {
            num_slots -= 1;
        }
        self.set_num_slots(num_slots)?;

        Ok(())
    }

    /// Resizes the tuple in the given slot to `new_len` bytes, keeping the tuple's END offset
    /// fixed and sliding all lower-offset tuple data by the size delta.  The slot keeps its
    /// index; its offset is updated.  Returns the tuple's new starting offset.
    ///
    /// # Errors
    /// Fails with `NotEnoughFreeSpace` if the page cannot absorb a growth delta.
    pub fn resize_tuple(&mut self, slot: u16, new_len: u16) -> Result<u16, Error> {
        let old_offset = self.get_slot_value(slot)?;
        if old_offset == EMPTY_SLOT {
            return Err(Error::EmptySlot(self.page_no, slot));
        }
        let old_len = self.get_tuple_length(slot)?;

        if new_len == old_len {
            return Ok(old_offset);
        }

        let data_start = self.get_tuple_data_start()?;
        let below = (old_offset - data_start) as usize;

        // The tuple's END stays fixed, so its start simply moves by the size delta, in the
        // opposite direction from its downstream neighbors.
        let new_offset;
        if new_len > old_len {
            let delta = new_len - old_len;
            let available = self.get_free_space()?;
            if delta > available {
                return Err(Error::NotEnoughFreeSpace(delta, available));
            }
            new_offset = old_offset - delta;

            // Slide everything stored below this tuple toward the page start, growing the
            // tuple downward, and zero the grown region so stale bytes don't linger.
            self.move_data_range(data_start as usize, (data_start - delta) as usize, below);
            self.shift_slots_below(old_offset, -(delta as i32))?;
            self.set_slot_value(slot, new_offset)?;
            self.set_data_range(new_offset as usize, delta as usize, 0);
        } else {
            let delta = old_len - new_len;
            new_offset = old_offset + delta;

            // Slide everything stored below this tuple toward the page end, reclaiming the
            // bytes the tuple no longer needs, and zero the freed span.
            self.move_data_range(data_start as usize, (data_start + delta) as usize, below);
            self.shift_slots_below(old_offset, delta as i32)?;
            self.set_slot_value(slot, new_offset)?;
            self.set_data_range(data_start as usize, delta as usize, 0);
        }

        Ok(new_offset)
    }

    fn move_data_range(&mut self, src_pos: usize, dest_pos: usize, length: usize) {
        if length == 0 || src_pos == dest_pos {
            return;
        }
        self.set_dirty(true);

        let src_data = self.page_data[src_pos..(src_pos + length)].to_vec();
        self.page_data[dest_pos..(dest_pos + length)].copy_from_slice(&src_data);
    }

    fn set_data_range(&mut self, position: usize, length: usize, value: u8) {
        if length == 0 {
            return;
        }
        self.set_dirty(true);
        for i in 0..length {
            self.page_data[position + i] = value;
        }
    }

    /// Repoints every live slot whose tuple sits below `boundary` by `delta` bytes.  The gap
    /// and resize operations use this after sliding tuple data, so the directory keeps
    /// matching the bytes.
    fn shift_slots_below(&mut self, boundary: u16, delta: i32) -> Result<(), Error> {
        let num_slots = self.get_num_slots()?;
        for slot in 0..num_slots {
            let offset = self.get_slot_value(slot)?;
            if offset != EMPTY_SLOT && offset < boundary {
                self.set_slot_value(slot, (offset as i32 + delta) as u16)?;
            }
        }
        Ok(())
    }

    /// Opens a zeroed `len`-byte hole whose last byte sits just below `gap_end`: every tuple
    /// stored in `[data start, gap_end)` slides toward the page start and its slot follows.
    fn open_tuple_gap(&mut self, gap_end: u16, len: u16) -> Result<(), Error> {
        let data_start = self.get_tuple_data_start()?;
        if gap_end < data_start {
            return Err(Error::OffsetNotInTuplePortion(gap_end, data_start));
        }
        let available = self.get_free_space()?;
        if len > available {
            return Err(Error::NotEnoughFreeSpace(len, available));
        }

        self.move_data_range(data_start as usize,
                             (data_start - len) as usize,
                             (gap_end - data_start) as usize);
        self.shift_slots_below(gap_end, -(len as i32))?;
        self.set_data_range((gap_end - len) as usize, len as usize, 0);
        Ok(())
    }

    /// Closes the `len`-byte hole a deleted tuple left at `[gap_start, gap_start + len)`: every
    /// tuple stored below it slides back toward the page end, slots follow, and the freed span
    /// at the new data start is zeroed.
    fn close_tuple_gap(&mut self, gap_start: u16, len: u16) -> Result<(), Error> {
        let data_start = self.get_tuple_data_start()?;
        if gap_start < data_start {
            return Err(Error::OffsetNotInTuplePortion(gap_start, data_start));
        }

        self.move_data_range(data_start as usize,
                             (data_start + len) as usize,
                             (gap_start - data_start) as usize);
        self.shift_slots_below(gap_start, len as i32)?;
        self.set_data_range(data_start as usize, len as usize, 0);
        Ok(())
    }

    /// This is a helper function to set or clear the value of a column's `NULL` flag.
    ///
    /// # Arguments
    /// * tuple_start - the byte-offset in the page where the tuple starts
    /// * col_index - the index of the column to set the null-flag for
    /// * value - the new value for the null-flag
    pub fn set_null_flag(&mut self,
                         tuple_start: u16,
                         col_index: usize,
                         value: bool)
                         -> Result<(), Error> {
        // Skip to the byte that contains the NULL-flag for this specific column.
        let null_flag_offset = tuple_start + (col_index as u16 / 8);
        let mask = 1u8 << (col_index % 8);

        self.seek(SeekFrom::Start(null_flag_offset as u64))?;
        let mut null_flag = self.read_u8()?;

        null_flag = if value {
            null_flag | mask
        } else {
            null_flag & !mask
        };

        self.seek(SeekFrom::Start(null_flag_offset as u64))?;
        self.write_u8(null_flag).map_err(Into::into)
    }

    /// Reads the value of a column's `NULL` flag.
    ///
    /// # Arguments
    /// * tuple_start - the byte-offset in the page where the tuple starts
    /// * col_index - the index of the column to read the null-flag for
    pub fn get_null_flag(&mut self, tuple_start: u16, col_index: usize) -> Result<bool, Error> {
        let null_flag_offset = tuple_start + (col_index as u16 / 8);
        let mask = 1u8 << (col_index % 8);

        self.seek(SeekFrom::Start(null_flag_offset as u64))?;
        let null_flag = self.read_u8()?;
        Ok(null_flag & mask != 0)
    }

    /// Writes a non-`NULL` value of the given column type at the given offset, returning the
    /// number of bytes the stored form occupies.
    pub fn write_value_at(&mut self,
                          offset: u16,
                          col_type: ColumnType,
                          value: &Literal)
                          -> Result<u16, Error> {
        self.seek(SeekFrom::Start(offset as u64))?;

        let unstorable = || Error::CannotStoreValue(col_type, value.clone());

        match col_type {
            ColumnType::TinyInt => {
                let v = value.as_i64().ok_or_else(&unstorable)?;
                self.write_i8(v as i8)?;
                Ok(1)
            }
            ColumnType::SmallInt => {
                let v = value.as_i64().ok_or_else(&unstorable)?;
                self.write_i16::<BigEndian>(v as i16)?;
                Ok(2)
            }
            ColumnType::Integer => {
                let v = value.as_i64().ok_or_else(&unstorable)?;
                self.write_i32::<BigEndian>(v as i32)?;
                Ok(4)
            }
            ColumnType::BigInt => {
                let v = value.as_i64().ok_or_else(&unstorable)?;
                self.write_i64::<BigEndian>(v)?;
                Ok(8)
            }
            ColumnType::Float => {
                let v = value.as_f64().ok_or_else(&unstorable)?;
                self.write_f32::<BigEndian>(v as f32)?;
                Ok(4)
            }
            ColumnType::Double => {
                let v = value.as_f64().ok_or_else(&unstorable)?;
                self.write_f64::<BigEndian>(v)?;
                Ok(8)
            }
            ColumnType::Char { length } => {
                let v = value.as_string().ok_or_else(&unstorable)?;
                if v.len() > length as usize {
                    return Err(unstorable());
                }
                // CHAR(k) always occupies k bytes; short values are space-padded.
                let mut bytes = v.as_bytes().to_vec();
                bytes.resize(length as usize, b' ');
                self.write_all(&bytes).map_err(Error::from)?;
                Ok(length)
            }
            ColumnType::VarChar { length } => {
                let v = value.as_string().ok_or_else(&unstorable)?;
                if v.len() > length as usize {
                    return Err(unstorable());
                }
                self.write_varchar65535(v)?;
                Ok(2 + v.len() as u16)
            }
            ColumnType::FilePointer => {
                match *value {
                    Literal::FilePointer { page_no, offset: tuple_offset } => {
                        self.write_u16::<BigEndian>(page_no)?;
                        self.write_u16::<BigEndian>(tuple_offset)?;
                        Ok(4)
                    }
                    _ => Err(unstorable()),
                }
            }
            _ => Err(Error::TupleError(Box::new(TupleError::UnsupportedColumnType))),
        }
    }

    /// Reads a non-`NULL` value of the given column type from the given offset.
    pub fn read_value_at(&mut self, offset: u16, col_type: ColumnType) -> Result<Literal, Error> {
        self.seek(SeekFrom::Start(offset as u64))?;

        match col_type {
            ColumnType::TinyInt => Ok(Literal::Int(self.read_i8()? as i32)),
            ColumnType::SmallInt => Ok(Literal::Int(self.read_i16::<BigEndian>()? as i32)),
            ColumnType::Integer => Ok(Literal::Int(self.read_i32::<BigEndian>()?)),
            ColumnType::BigInt => Ok(Literal::Long(self.read_i64::<BigEndian>()?)),
            ColumnType::Float => Ok(Literal::Float(self.read_f32::<BigEndian>()?)),
            ColumnType::Double => Ok(Literal::Double(self.read_f64::<BigEndian>()?)),
            ColumnType::Char { length } => {
                let mut buf = vec![0u8; length as usize];
                self.read_exact(&mut buf)?;
                let text = String::from_utf8(buf)
                    .map_err(|_| Error::IOError("invalid string bytes".into()))?;
                Ok(Literal::String(text.trim_right_matches(' ').into()))
            }
            ColumnType::VarChar { .. } => Ok(Literal::String(self.read_varchar65535()?)),
            ColumnType::FilePointer => {
                let page_no = self.read_u16::<BigEndian>()?;
                let tuple_offset = self.read_u16::<BigEndian>()?;
                Ok(Literal::FilePointer {
                    page_no: page_no,
                    offset: tuple_offset,
                })
            }
            _ => Err(Error::TupleError(Box::new(TupleError::UnsupportedColumnType))),
        }
    }

    /// Store a new tuple in the page at the given offset: the null bitmap followed by the
    /// packed column values, in schema order.
    ///
    /// # Arguments
    /// * offset - The offset at which to put the tuple.
    /// * schema - A reference to the schema the tuple should follow.
    /// * tuple - A reference to the tuple itself.
    pub fn store_new_tuple<T: Tuple + ?Sized>(&mut self,
                                              offset: u16,
                                              schema: &Schema,
                                              tuple: &mut T)
                                              -> Result<(), Error> {
        if schema.num_columns() != tuple.get_column_count() {
            return Err(Error::WrongArity(tuple.get_column_count(), schema.num_columns()));
        }

        let mut cur_offset = offset + get_null_flags_size(schema.num_columns());
        for (col_idx, col_info) in schema.iter().enumerate() {
            let value = tuple.get_column_value(col_idx)?;

            if value == Literal::Null {
                self.set_null_flag(offset, col_idx, true)?;
            } else {
                self.set_null_flag(offset, col_idx, false)?;
                cur_offset += self.write_value_at(cur_offset, col_info.column_type, &value)?;
            }
        }
        Ok(())
    }
}

impl Read for DBPage {
    #[inline]
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        match self.read_at_position(self.cur_page_position as usize, buffer) {
            Ok(bytes) => {
                self.cur_page_position += bytes as u64;
                Ok(bytes)
            }
            Err(_) => Err(ErrorKind::Other.into()),
        }
    }
}

impl Write for DBPage {
    fn write(&mut self, buffer: &[u8]) -> io::Result<usize> {
        let position = self.cur_page_position as usize;
        match self.write_at_position(position, buffer) {
            Ok(bytes) => {
                self.cur_page_position += bytes as u64;
                Ok(bytes)
            }
            Err(_) => Err(ErrorKind::Other.into()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for DBPage {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match pos {
            SeekFrom::Current(offset) => {
                self.cur_page_position = (self.cur_page_position as i64 + offset) as u64;
            }
            SeekFrom::Start(offset) => {
                if offset > self.page_data.len() as u64 {
                    return Err(ErrorKind::Other.into());
                }
                self.cur_page_position = offset;
            }
            SeekFrom::End(offset) => {
                let new_pos = self.page_data.len() as i64 + offset;
                if new_pos < 0 {
                    return Err(ErrorKind::Other.into());
                }
                self.cur_page_position = new_pos as u64;
            }
        }
        Ok(self.cur_page_position)
    }
}

impl Pinnable for DBPage {
    fn pin(&mut self) {
        self.pin_count += 1;
    }

    fn unpin(&mut self) -> Result<(), PinError> {
        if self.pin_count == 0 {
            return Err(PinError::PinCountNotPositive(self.pin_count));
        }

        self.pin_count -= 1;
        Ok(())
    }

    fn get_pin_count(&self) -> u32 {
        self.pin_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::storage::{DBFileInfo, Pinnable, PinError};
    use ::storage::dbfile::DBFileType;

    fn test_page() -> DBPage {
        let info = DBFileInfo {
            file_type: DBFileType::HeapTupleFile,
            page_size: 512,
            path: None,
        };
        let mut page = DBPage::new(&info, 1);
        page.init_new_page().unwrap();
        page
    }

    /// Asserts the slotted-page invariant: live slots reference disjoint in-bounds tuple
    /// ranges, and the free space between the slot directory and the tuple data is one
    /// contiguous zero region boundary.
    fn assert_slot_invariant(page: &mut DBPage) {
        let num_slots = page.get_num_slots().unwrap();
        let page_size = page.page_data.len() as u16;

        let mut ranges: Vec<(u16, u16)> = Vec::new();
        for slot in 0..num_slots {
            let offset = page.get_slot_value(slot).unwrap();
            if offset == EMPTY_SLOT {
                continue;
            }
            let length = page.get_tuple_length(slot).unwrap();
            assert!(offset + length <= page_size,
                    "tuple range [{}, {}) escapes the page",
                    offset,
                    offset + length);
            ranges.push((offset, offset + length));
        }

        ranges.sort();
        for pair in ranges.windows(2) {
            assert!(pair[0].1 <= pair[1].0,
                    "tuple ranges {:?} and {:?} overlap",
                    pair[0],
                    pair[1]);
        }

        // Tuple data is packed against the end of the page with no internal gaps.
        let mut expected_start = page_size;
        for &(start, end) in ranges.iter().rev() {
            assert_eq!(expected_start, end, "gap in tuple data region");
            expected_start = start;
        }
    }

    #[test]
    fn test_pinning() {
        let mut page = test_page();

        assert_eq!(Err(PinError::PinCountNotPositive(0)), page.unpin());
        page.pin();
        assert_eq!(Ok(()), page.unpin());
        page.pin();
        page.pin();
        assert_eq!(Ok(()), page.unpin());
        assert_eq!(Ok(()), page.unpin());
        assert_eq!(Err(PinError::PinCountNotPositive(0)), page.unpin());
    }

    #[test]
    fn test_dirty_snapshot() {
        let mut page = test_page();
        assert!(page.get_old_page_data().is_none());

        let before = page.page_data.clone();
        page.write_at_position(100, &[1, 2, 3]).unwrap();
        assert!(page.is_dirty());
        assert_eq!(Some(&before[..]), page.get_old_page_data());

        page.set_dirty(false);
        assert!(page.get_old_page_data().is_none());
    }

    #[test]
    fn test_alloc_tuples() {
        let mut page = test_page();

        let slot0 = page.alloc_new_tuple(10).unwrap();
        assert_eq!(0, slot0);
        assert_eq!(512 - 10, page.get_slot_value(slot0).unwrap());

        let slot1 = page.alloc_new_tuple(20).unwrap();
        assert_eq!(1, slot1);
        assert_eq!(512 - 30, page.get_slot_value(slot1).unwrap());

        assert_eq!(10, page.get_tuple_length(slot0).unwrap());
        assert_eq!(20, page.get_tuple_length(slot1).unwrap());
        assert_slot_invariant(&mut page);

        // Free space accounts for the two-byte header, the slot entries, and tuple bytes.
        assert_eq!(512 - 2 - 2 * 2 - 30, page.get_free_space().unwrap());
    }

    #[test]
    fn test_alloc_too_large_fails() {
        let mut page = test_page();
        assert!(match page.alloc_new_tuple(512) {
            Err(Error::NotEnoughFreeSpace(..)) => true,
            _ => false,
        });
    }

    #[test]
    fn test_delete_compacts_and_trims() {
        let mut page = test_page();
        page.alloc_new_tuple(10).unwrap();
        page.alloc_new_tuple(20).unwrap();
        page.alloc_new_tuple(30).unwrap();

        // Fill the tuples with recognizable bytes.
        for (slot, byte) in vec![(0u16, 0xaau8), (1, 0xbb), (2, 0xcc)] {
            let offset = page.get_slot_value(slot).unwrap() as usize;
            let length = page.get_tuple_length(slot).unwrap() as usize;
            for i in 0..length {
                page.page_data[offset + i] = byte;
            }
        }

        page.delete_tuple(1).unwrap();
        assert_eq!(EMPTY_SLOT, page.get_slot_value(1).unwrap());
        assert_slot_invariant(&mut page);

        // Neighbors survive with their contents intact.
        let offset0 = page.get_slot_value(0).unwrap() as usize;
        assert!(page.page_data[offset0..offset0 + 10].iter().all(|&b| b == 0xaa));
        let offset2 = page.get_slot_value(2).unwrap() as usize;
        assert!(page.page_data[offset2..offset2 + 30].iter().all(|&b| b == 0xcc));

        // Deleting the last slot trims the tombstone (and any trailing ones).
        page.delete_tuple(2).unwrap();
        assert_eq!(1, page.get_num_slots().unwrap());
        assert_slot_invariant(&mut page);

        // Slot 1 is gone entirely now.
        assert!(match page.get_slot_value(1) {
            Err(Error::InvalidSlot(1, 1)) => true,
            _ => false,
        });
    }

    #[test]
    fn test_delete_reuses_slot() {
        let mut page = test_page();
        page.alloc_new_tuple(10).unwrap();
        page.alloc_new_tuple(20).unwrap();
        page.alloc_new_tuple(30).unwrap();

        page.delete_tuple(1).unwrap();
        let slot = page.alloc_new_tuple(8).unwrap();
        assert_eq!(1, slot);
        assert_slot_invariant(&mut page);
    }

    #[test]
    fn test_resize_grow_and_shrink() {
        let mut page = test_page();
        page.alloc_new_tuple(10).unwrap();
        page.alloc_new_tuple(20).unwrap();

        // Mark tuple 1's contents.
        let offset1 = page.get_slot_value(1).unwrap() as usize;
        for i in 0..20 {
            page.page_data[offset1 + i] = 0xbb;
        }

        let new_offset = page.resize_tuple(0, 14).unwrap();
        assert_eq!(new_offset, page.get_slot_value(0).unwrap());
        assert_eq!(14, page.get_tuple_length(0).unwrap());
        assert_eq!(20, page.get_tuple_length(1).unwrap());
        assert_slot_invariant(&mut page);

        // Tuple 1's bytes moved but survived.
        let offset1 = page.get_slot_value(1).unwrap() as usize;
        assert!(page.page_data[offset1..offset1 + 20].iter().all(|&b| b == 0xbb));

        page.resize_tuple(0, 6).unwrap();
        assert_eq!(6, page.get_tuple_length(0).unwrap());
        assert_slot_invariant(&mut page);

        let offset1 = page.get_slot_value(1).unwrap() as usize;
        assert!(page.page_data[offset1..offset1 + 20].iter().all(|&b| b == 0xbb));
    }

    #[test]
    fn test_value_round_trip() {
        let mut page = test_page();

        let cases = vec![(ColumnType::TinyInt, Literal::Int(-5)),
                         (ColumnType::SmallInt, Literal::Int(-300)),
                         (ColumnType::Integer, Literal::Int(123456)),
                         (ColumnType::BigInt, Literal::Long(-9876543210)),
                         (ColumnType::Double, Literal::Double(2.5)),
                         (ColumnType::Char { length: 6 }, Literal::String("ab".into())),
                         (ColumnType::VarChar { length: 20 }, Literal::String("hello".into())),
                         (ColumnType::FilePointer,
                          Literal::FilePointer {
                              page_no: 3,
                              offset: 444,
                          })];

        for (col_type, value) in cases {
            page.write_value_at(100, col_type, &value).unwrap();
            assert_eq!(value, page.read_value_at(100, col_type).unwrap());
        }
    }

    #[test]
    fn test_null_flags() {
        let mut page = test_page();

        page.set_null_flag(50, 0, true).unwrap();
        page.set_null_flag(50, 9, true).unwrap();
        assert_eq!(true, page.get_null_flag(50, 0).unwrap());
        assert_eq!(false, page.get_null_flag(50, 1).unwrap());
        assert_eq!(true, page.get_null_flag(50, 9).unwrap());

        page.set_null_flag(50, 0, false).unwrap();
        assert_eq!(false, page.get_null_flag(50, 0).unwrap());
        assert_eq!(true, page.get_null_flag(50, 9).unwrap());
    }
}
