//! A module which stores utilities for a basic page tuple.

use std::cell::RefCell;
use std::rc::Rc;

use ::{ColumnType, Schema};
use ::expressions::Literal;
use ::storage::{DBPage, PinError, Pinnable, Tuple, TupleError};

/// This value is used in the cached value-offset array when a column value is set to `NULL`.
pub const NULL_OFFSET: u16 = 0;

/// This helper function takes a tuple (from an arbitrary source) and computes how much space it
/// would require to be stored in a heap table file with the specified schema.  This is used to
/// insert new tuples into a table file by computing how much space will be needed, so that an
/// appropriate page can be found.
pub fn get_tuple_storage_size<T: Tuple + ?Sized>(schema: &Schema,
                                                 tuple: &mut T)
                                                 -> Result<u16, TupleError> {
    let mut storage_size = get_null_flags_size(schema.num_columns());
    for (col_idx, col_info) in schema.iter().enumerate() {
        let value = tuple.get_column_value(col_idx)?;
        if value != Literal::Null {
            let data_length = match col_info.column_type {
                ColumnType::VarChar { .. } => {
                    match value.as_string() {
                        Some(s) => s.len() as u16,
                        None => {
                            return Err(TupleError::CannotStoreValue(
                                format!("{}", col_info), value));
                        }
                    }
                }
                _ => 0,
            };
            storage_size += get_storage_size(col_info.column_type, data_length)?;
        }
    }

    Ok(storage_size)
}

/// This method computes and returns the number of bytes that are used to store the null-flags in
/// each tuple.
///
/// # Arguments
/// * num_cols - the total number of columns in the table.
pub fn get_null_flags_size(num_cols: usize) -> u16 {
    if num_cols > 0 {
        1 + (num_cols as u16 - 1) / 8
    } else {
        0
    }
}

/// Returns the storage size of a particular column's (non-`NULL`) value, in bytes.  The length
/// of the value is required in cases where the column value can be variable size, such as if the
/// type is a `VARCHAR`.  Note that the data-length is actually *not* required when the type is
/// `CHAR`, since `CHAR` fields always have a specific size.
///
/// # Arguments
/// * col_type - The column's data type.
/// * data_length - for column-types that specify a length, this is the length value.
pub fn get_storage_size(col_type: ColumnType, data_length: u16) -> Result<u16, TupleError> {
    match col_type {
        ColumnType::TinyInt => Ok(1),
        ColumnType::SmallInt => Ok(2),
        ColumnType::Integer | ColumnType::Float => Ok(4),
        ColumnType::BigInt | ColumnType::Double => Ok(8),
        // CHAR values are of a fixed size, but the size is specified in the length field and
        // there is no other storage required.
        ColumnType::Char { length } => Ok(length),
        // VARCHAR values are of a variable size, but there is always a two byte length
        // specified at the start of the value.
        ColumnType::VarChar { .. } => Ok(2 + data_length),
        // File-pointers are comprised of a two-byte page number and a two-byte offset.
        ColumnType::FilePointer => Ok(4),
        // Unsupported types have no size.
        _ => Err(TupleError::UnsupportedColumnType),
    }
}

/// This class implements the [`Tuple`](../trait.Tuple.html) interface by reading and writing
/// tuple data against a [`DBPage`](../dbpage/struct.DBPage.html) object.  This can be used to
/// read and write tuples in a table file, keys in an index file, etc.
///
/// Each tuple is stored in a layout like this:
///
/// * The first one or more bytes are dedicated to a `NULL`-bitmap, which records columns that
///   are currently `NULL`.
/// * The remaining bytes are dedicated to storing the non-`NULL` values for the columns in the
///   tuple, tightly packed in schema order.
///
/// The page is shared behind an `Rc` so that many tuples can reference tuples on the same page;
/// a page tuple holds one pin on its page for as long as the tuple itself is pinned.
pub struct PageTuple {
    db_page: Rc<RefCell<DBPage>>,
    page_offset: u16,
    schema: Schema,
    value_offsets: Vec<u16>,
    pin_count: u32,
}

impl PageTuple {
    /// Construct a new tuple object that is backed by the data in the database page.  The caller
    /// hands its page pin over to the new tuple: the tuple starts with a pin count of one, and
    /// unpinning it releases the page pin.
    ///
    /// # Arguments
    /// * db_page - the specific database page that holds the tuple, already pinned once on
    ///   behalf of this tuple
    /// * page_offset - the offset of the tuple's actual data in the page
    /// * schema - the details of the columns that appear within the tuple
    pub fn new(db_page: Rc<RefCell<DBPage>>,
               page_offset: u16,
               schema: Schema)
               -> Result<PageTuple, TupleError> {
        let value_offsets = vec![NULL_OFFSET; schema.num_columns()];
        let mut result = PageTuple {
            db_page: db_page,
            page_offset: page_offset,
            schema: schema,
            value_offsets: value_offsets,
            pin_count: 1,
        };
        result.compute_value_offsets()?;
        Ok(result)
    }

    /// The page number this tuple lives on.
    pub fn page_no(&self) -> u32 {
        self.db_page.borrow().page_no
    }

    /// The offset of the tuple's first byte within its page.
    pub fn page_offset(&self) -> u16 {
        self.page_offset
    }

    /// The schema the tuple is interpreted with.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    fn check_column_index(&self, col_index: usize) -> Result<(), TupleError> {
        if col_index < self.schema.num_columns() {
            Ok(())
        } else {
            Err(TupleError::InvalidColumnIndex(col_index, self.schema.num_columns()))
        }
    }

    /// Returns the offset where the tuple's data actually starts.  This is past the bytes used
    /// to store NULL-flags.
    fn get_data_start_offset(&self) -> u16 {
        self.page_offset + get_null_flags_size(self.schema.num_columns())
    }

    /// This helper function computes and caches the offset of each column value in the tuple.
    /// If a column has a `NULL` value then [`NULL_OFFSET`](constant.NULL_OFFSET.html) is used
    /// for the offset.
    fn compute_value_offsets(&mut self) -> Result<(), TupleError> {
        let mut page = self.db_page.borrow_mut();
        let mut value_offset = self.get_data_start_offset();

        for i in 0..self.schema.num_columns() {
            if page.get_null_flag(self.page_offset, i)? {
                self.value_offsets[i] = NULL_OFFSET;
            } else {
                self.value_offsets[i] = value_offset;

                let col_type = self.schema[i].column_type;
                let data_length = match col_type {
                    ColumnType::VarChar { .. } => {
                        // The storage size depends on the stored value; read out its length
                        // prefix.
                        use byteorder::{BigEndian, ReadBytesExt};
                        use std::io::{Seek, SeekFrom};
                        page.seek(SeekFrom::Start(value_offset as u64))
                            .map_err(|_| TupleError::IOError)?;
                        page.read_u16::<BigEndian>().map_err(|_| TupleError::IOError)?
                    }
                    _ => 0,
                };
                value_offset += get_storage_size(col_type, data_length)?;
            }
        }

        Ok(())
    }
}

impl Pinnable for PageTuple {
    fn pin(&mut self) {
        self.db_page.borrow_mut().pin();
        self.pin_count += 1;
    }

    fn unpin(&mut self) -> Result<(), PinError> {
        if self.pin_count == 0 {
            return Err(PinError::PinCountNotPositive(self.pin_count));
        }
        self.pin_count -= 1;
        self.db_page.borrow_mut().unpin()
    }

    fn get_pin_count(&self) -> u32 {
        self.pin_count
    }
}

impl Tuple for PageTuple {
    fn is_disk_backed(&self) -> bool {
        true
    }

    fn is_null_value(&self, col_index: usize) -> Result<bool, TupleError> {
        self.check_column_index(col_index)?;
        Ok(self.value_offsets[col_index] == NULL_OFFSET)
    }

    fn get_column_count(&self) -> usize {
        self.schema.num_columns()
    }

    fn get_column_value(&mut self, col_index: usize) -> Result<Literal, TupleError> {
        self.check_column_index(col_index)?;

        let offset = self.value_offsets[col_index];
        if offset == NULL_OFFSET {
            return Ok(Literal::Null);
        }

        let col_type = self.schema[col_index].column_type;
        self.db_page
            .borrow_mut()
            .read_value_at(offset, col_type)
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use ::{ColumnInfo, ColumnType, Schema};
    use ::expressions::Literal;
    use ::storage::{DBFileInfo, DBPage, Pinnable, Tuple, TupleLiteral};
    use ::storage::dbfile::DBFileType;

    fn schema() -> Schema {
        Schema::with_columns(vec![
            ColumnInfo::with_table_name(ColumnType::Integer, "A", "T"),
            ColumnInfo::with_table_name(ColumnType::VarChar { length: 20 }, "B", "T"),
            ColumnInfo::with_table_name(ColumnType::Double, "C", "T"),
        ])
            .unwrap()
    }

    fn page_with_tuple(values: Vec<Literal>) -> (Rc<RefCell<DBPage>>, u16) {
        let info = DBFileInfo {
            file_type: DBFileType::HeapTupleFile,
            page_size: 512,
            path: None,
        };
        let mut page = DBPage::new(&info, 1);
        page.init_new_page().unwrap();

        let schema = schema();
        let mut tuple = TupleLiteral::from_iter(values);
        let size = get_tuple_storage_size(&schema, &mut tuple).unwrap();
        let slot = page.alloc_new_tuple(size).unwrap();
        let offset = page.get_slot_value(slot).unwrap();
        page.store_new_tuple(offset, &schema, &mut tuple).unwrap();
        page.pin();

        (Rc::new(RefCell::new(page)), offset)
    }

    #[test]
    fn test_read_values_back() {
        let (page, offset) =
            page_with_tuple(vec![Literal::Int(42),
                                 Literal::String("hello".into()),
                                 Literal::Double(2.5)]);
        let mut tuple = PageTuple::new(page, offset, schema()).unwrap();

        assert_eq!(3, tuple.get_column_count());
        assert_eq!(Ok(Literal::Int(42)), tuple.get_column_value(0));
        assert_eq!(Ok(Literal::String("hello".into())), tuple.get_column_value(1));
        assert_eq!(Ok(Literal::Double(2.5)), tuple.get_column_value(2));
        assert!(tuple.get_column_value(3).is_err());
    }

    #[test]
    fn test_null_columns() {
        let (page, offset) =
            page_with_tuple(vec![Literal::Int(1), Literal::Null, Literal::Double(0.5)]);
        let mut tuple = PageTuple::new(page, offset, schema()).unwrap();

        assert_eq!(Ok(false), tuple.is_null_value(0));
        assert_eq!(Ok(true), tuple.is_null_value(1));
        assert_eq!(Ok(Literal::Null), tuple.get_column_value(1));
        // The value after the NULL is still located correctly.
        assert_eq!(Ok(Literal::Double(0.5)), tuple.get_column_value(2));
    }

    #[test]
    fn test_pin_transfers_to_tuple() {
        let (page, offset) = page_with_tuple(vec![Literal::Int(1),
                                                  Literal::String("x".into()),
                                                  Literal::Double(1.0)]);
        let mut tuple = PageTuple::new(page.clone(), offset, schema()).unwrap();
        assert_eq!(1, tuple.get_pin_count());
        assert_eq!(1, page.borrow().get_pin_count());

        tuple.unpin().unwrap();
        assert_eq!(0, tuple.get_pin_count());
        assert_eq!(0, page.borrow().get_pin_count());
    }
}
