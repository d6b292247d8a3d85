// In: src/messages/multi.rs

use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::record_batch::RecordBatch;
use log::debug;

use super::derived::Windowed;
use super::ranges::{apply_offset_to_ranges, RowRange};
use crate::error::MessageError;
use crate::meta::MessageMeta;

/// A window of rows over a shared `MessageMeta`.
///
/// Holds no row data of its own: `meta` is shared with every other message built
/// over the same batch, and `[mess_offset, mess_offset + mess_count)` names the rows
/// that belong to this message. Cloning copies the window and bumps the reference
/// count on `meta`.
#[derive(Debug, Clone)]
pub struct MultiMessage {
    meta: Arc<MessageMeta>,
    mess_offset: usize,
    mess_count: usize,
}

impl MultiMessage {
    /// Creates a message over rows `[offset, offset + count)` of `meta`.
    ///
    /// A `count` of `None` takes every row from `offset` to the end of the batch.
    pub fn new(
        meta: Arc<MessageMeta>,
        offset: usize,
        count: Option<usize>,
    ) -> Result<Self, MessageError> {
        let num_rows = meta.count()?;
        if offset > num_rows {
            return Err(MessageError::InvalidArgument(format!(
                "offset {} exceeds the {} rows of the batch",
                offset, num_rows
            )));
        }

        let mess_count = match count {
            None => num_rows - offset,
            Some(count) if count <= num_rows - offset => count,
            Some(count) => {
                return Err(MessageError::InvalidArgument(format!(
                    "window of {} rows at offset {} exceeds the {} rows of the batch",
                    count, offset, num_rows
                )))
            }
        };

        debug!(
            "Created message over rows [{}, {})",
            offset,
            offset + mess_count
        );
        Ok(Self {
            meta,
            mess_offset: offset,
            mess_count,
        })
    }

    /// A message covering every row of `meta`.
    pub fn from_meta(meta: Arc<MessageMeta>) -> Result<Self, MessageError> {
        Self::new(meta, 0, None)
    }

    pub fn meta(&self) -> &Arc<MessageMeta> {
        &self.meta
    }

    pub fn mess_offset(&self) -> usize {
        self.mess_offset
    }

    pub fn mess_count(&self) -> usize {
        self.mess_count
    }

    /// Alias for `mess_count`.
    pub fn row_count(&self) -> usize {
        self.mess_count
    }

    /// All column names of the underlying batch, independent of the window.
    pub fn column_names(&self) -> Result<Vec<String>, MessageError> {
        self.meta.column_names()
    }

    /// Every column, restricted to this message's rows.
    pub fn read_all(&self) -> Result<RecordBatch, MessageError> {
        self.read_columns::<&str>(&[])
    }

    pub fn read_column(&self, name: &str) -> Result<RecordBatch, MessageError> {
        self.read_columns(&[name])
    }

    /// The named columns restricted to this message's rows. An empty list selects every column.
    pub fn read_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<RecordBatch, MessageError> {
        self.meta
            .read_range(self.mess_offset, self.mess_count, names)
    }

    /// Writes `values` over this message's rows of column `name`.
    ///
    /// The write goes to the shared batch and is visible through every message
    /// whose window overlaps this one.
    pub fn write_column(&self, name: &str, values: ArrayRef) -> Result<(), MessageError> {
        self.write_columns(&[name], &[values])
    }

    pub fn write_columns<S: AsRef<str>>(
        &self,
        names: &[S],
        values: &[ArrayRef],
    ) -> Result<(), MessageError> {
        debug!(
            "Writing {} column(s) over rows [{}, {})",
            names.len(),
            self.mess_offset,
            self.mess_offset + self.mess_count
        );
        self.meta
            .write_range(self.mess_offset, self.mess_count, names, values)
    }
}

impl Windowed for MultiMessage {
    fn root(&self) -> &MultiMessage {
        self
    }

    fn adjust_for_slice(&mut self, start: usize, stop: usize) -> Result<(), MessageError> {
        if start > stop || stop > self.mess_count {
            return Err(MessageError::InvalidArgument(format!(
                "slice [{}, {}) is not within a window of {} rows",
                start, stop, self.mess_count
            )));
        }

        self.mess_offset += start;
        self.mess_count = stop - start;
        Ok(())
    }

    fn adjust_for_range_copy(
        &mut self,
        ranges: &[RowRange],
        num_selected_rows: usize,
    ) -> Result<(), MessageError> {
        let absolute = apply_offset_to_ranges(self.mess_offset, ranges)?;
        let meta = self.meta.copy_ranges(&absolute, num_selected_rows)?;

        log_metric!("event" = "copy_meta_ranges", "ranges" = ranges.len(), "rows" = num_selected_rows);

        self.meta = Arc::new(meta);
        self.mess_offset = 0;
        self.mess_count = num_selected_rows;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};

    fn meta_with_rows(rows: i64) -> Arc<MessageMeta> {
        let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int64, false)]));
        let column: ArrayRef = Arc::new(Int64Array::from((0..rows).collect::<Vec<_>>()));
        Arc::new(MessageMeta::try_new(schema, vec![column]).unwrap())
    }

    #[test]
    fn test_default_count_takes_remaining_rows() {
        let meta = meta_with_rows(10);

        let msg = MultiMessage::new(meta.clone(), 3, None).unwrap();
        assert_eq!((msg.mess_offset(), msg.mess_count()), (3, 7));

        let msg = MultiMessage::from_meta(meta.clone()).unwrap();
        assert_eq!((msg.mess_offset(), msg.mess_count()), (0, 10));

        let msg = MultiMessage::new(meta, 10, None).unwrap();
        assert_eq!(msg.row_count(), 0);
    }

    #[test]
    fn test_construction_bounds() {
        let meta = meta_with_rows(10);

        for offset in 0..=12 {
            for count in 0..=12 {
                let result = MultiMessage::new(meta.clone(), offset, Some(count));
                assert_eq!(
                    result.is_ok(),
                    offset + count <= 10,
                    "offset={} count={}",
                    offset,
                    count
                );
                if let Err(e) = result {
                    assert!(matches!(e, MessageError::InvalidArgument(_)));
                }
            }
        }
        assert!(MultiMessage::new(meta, 11, None).is_err());
    }

    #[test]
    fn test_clone_shares_meta() {
        let meta = meta_with_rows(4);
        let msg = MultiMessage::from_meta(meta.clone()).unwrap();

        let copy = msg.clone();

        assert!(Arc::ptr_eq(copy.meta(), msg.meta()));
        assert_eq!(Arc::strong_count(&meta), 3);
    }

    #[test]
    fn test_adjust_for_slice_rejects_inverted_range() {
        let mut msg = MultiMessage::from_meta(meta_with_rows(4)).unwrap();
        assert!(matches!(
            msg.adjust_for_slice(3, 1),
            Err(MessageError::InvalidArgument(_))
        ));
        assert_eq!((msg.mess_offset(), msg.mess_count()), (0, 4));
    }
}
