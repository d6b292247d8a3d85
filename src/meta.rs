// In: src/meta.rs

//! `MessageMeta` owns the full batch of rows that many messages window into.
//!
//! The rows live in a single Arrow `RecordBatch` behind a `RwLock`. Readers take
//! zero-copy slices of it. Writers rebuild the affected columns and swap the
//! whole batch in one step while holding the write lock, so any message sharing
//! this `MessageMeta` observes either the old batch or the new one, never a mix.
//! The row count of a `MessageMeta` never changes after construction.

use std::sync::{Arc, RwLock};

use arrow::array::{new_null_array, Array, ArrayRef, UInt64Array};
use arrow::compute::{concat, take};
use arrow::datatypes::{Field, FieldRef, Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use hashbrown::HashSet;
use log::{debug, trace};

use crate::config::{ColumnSpec, MessageConfig};
use crate::error::MessageError;
use crate::messages::ranges::{validate_ranges, RowRange};

#[derive(Debug)]
pub struct MessageMeta {
    data: RwLock<RecordBatch>,
}

impl MessageMeta {
    pub fn new(batch: RecordBatch) -> Self {
        Self {
            data: RwLock::new(batch),
        }
    }

    /// Builds the batch from a schema and its columns.
    pub fn try_new(schema: SchemaRef, columns: Vec<ArrayRef>) -> Result<Self, MessageError> {
        Ok(Self::new(RecordBatch::try_new(schema, columns)?))
    }

    /// Number of rows in the batch.
    pub fn count(&self) -> Result<usize, MessageError> {
        Ok(self.data.read()?.num_rows())
    }

    pub fn column_names(&self) -> Result<Vec<String>, MessageError> {
        let guard = self.data.read()?;
        Ok(guard
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect())
    }

    pub fn has_column(&self, name: &str) -> Result<bool, MessageError> {
        Ok(self.data.read()?.schema().index_of(name).is_ok())
    }

    /// A cheap copy of the current batch. The column buffers are shared, not copied.
    pub fn snapshot(&self) -> Result<RecordBatch, MessageError> {
        Ok(self.data.read()?.clone())
    }

    /// Returns rows `[offset, offset + count)` restricted to `columns`.
    ///
    /// An empty `columns` slice selects every column. No row data is copied.
    pub fn read_range<S: AsRef<str>>(
        &self,
        offset: usize,
        count: usize,
        columns: &[S],
    ) -> Result<RecordBatch, MessageError> {
        let guard = self.data.read()?;
        check_window(offset, count, guard.num_rows())?;

        let window = guard.slice(offset, count);
        if columns.is_empty() {
            return Ok(window);
        }

        let schema = window.schema();
        let indices = columns
            .iter()
            .map(|name| {
                let name = name.as_ref();
                schema
                    .index_of(name)
                    .map_err(|_| MessageError::ColumnNotFound(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(window.project(&indices)?)
    }

    /// Materializes a new, independent `MessageMeta` holding exactly the rows in
    /// `ranges` (absolute row indices), in the order the ranges are listed.
    ///
    /// `num_selected_rows` must equal the summed length of `ranges`.
    pub fn copy_ranges(
        &self,
        ranges: &[RowRange],
        num_selected_rows: usize,
    ) -> Result<MessageMeta, MessageError> {
        let guard = self.data.read()?;
        validate_ranges(ranges, guard.num_rows(), num_selected_rows)?;

        for r in ranges {
            trace!("copying meta rows [{}, {})", r.start, r.stop);
        }

        let indices = UInt64Array::from_iter_values(
            ranges
                .iter()
                .flat_map(|r| (r.start as u64)..(r.stop as u64)),
        );

        let columns = guard
            .columns()
            .iter()
            .map(|column| take(column.as_ref(), &indices, None))
            .collect::<Result<Vec<_>, _>>()?;

        let options = RecordBatchOptions::new().with_row_count(Some(num_selected_rows));
        let batch = RecordBatch::try_new_with_options(guard.schema(), columns, &options)?;

        debug!(
            "Materialized {} rows from {} ranges into a new batch",
            num_selected_rows,
            ranges.len()
        );
        Ok(MessageMeta::new(batch))
    }

    /// Overwrites rows `[offset, offset + count)` of each named column with the
    /// matching array in `values`.
    ///
    /// Columns that do not exist yet are added as nullable columns holding nulls
    /// outside the written window. All checks run before the batch is replaced,
    /// so a failed write leaves the batch untouched.
    pub fn write_range<S: AsRef<str>>(
        &self,
        offset: usize,
        count: usize,
        columns: &[S],
        values: &[ArrayRef],
    ) -> Result<(), MessageError> {
        if columns.len() != values.len() {
            return Err(MessageError::size_mismatch(
                "column value arrays",
                columns.len(),
                values.len(),
            ));
        }
        for (name, array) in columns.iter().zip(values) {
            if array.len() != count {
                return Err(MessageError::size_mismatch(
                    format!("values for column '{}'", name.as_ref()),
                    count,
                    array.len(),
                ));
            }
        }

        let mut guard = self.data.write()?;
        let num_rows = guard.num_rows();
        check_window(offset, count, num_rows)?;

        let schema = guard.schema();
        let mut fields: Vec<FieldRef> = schema.fields().iter().cloned().collect();
        let mut arrays: Vec<ArrayRef> = guard.columns().to_vec();

        for (name, array) in columns.iter().zip(values) {
            let name = name.as_ref();
            match fields.iter().position(|f| f.name() == name) {
                Some(idx) => {
                    let expected = fields[idx].data_type();
                    if expected != array.data_type() {
                        return Err(MessageError::TypeMismatch {
                            column: name.to_string(),
                            expected: expected.to_string(),
                            actual: array.data_type().to_string(),
                        });
                    }
                    arrays[idx] = splice_column(&arrays[idx], offset, array)?;
                    if array.null_count() > 0 && !fields[idx].is_nullable() {
                        fields[idx] = Arc::new(fields[idx].as_ref().clone().with_nullable(true));
                    }
                }
                None => {
                    debug!("Adding column '{}' to message meta", name);
                    let base = new_null_array(array.data_type(), num_rows);
                    arrays.push(splice_column(&base, offset, array)?);
                    fields.push(Arc::new(Field::new(name, array.data_type().clone(), true)));
                }
            }
        }

        *guard = rebuild(&schema, fields, arrays, num_rows)?;
        Ok(())
    }

    /// Appends an all-null column for every spec missing from the batch.
    ///
    /// Returns how many columns were added.
    pub fn ensure_columns(&self, specs: &[ColumnSpec]) -> Result<usize, MessageError> {
        let mut guard = self.data.write()?;
        let schema = guard.schema();
        let num_rows = guard.num_rows();

        let mut seen = HashSet::new();
        let missing: Vec<&ColumnSpec> = specs
            .iter()
            .filter(|spec| schema.index_of(&spec.name).is_err())
            .filter(|spec| seen.insert(spec.name.as_str()))
            .collect();

        if missing.is_empty() {
            return Ok(0);
        }

        let mut fields: Vec<FieldRef> = schema.fields().iter().cloned().collect();
        let mut arrays: Vec<ArrayRef> = guard.columns().to_vec();
        for spec in &missing {
            debug!("Preallocating column {}[{}]", spec.name, spec.data_type);
            fields.push(Arc::new(Field::new(&spec.name, spec.data_type.clone(), true)));
            arrays.push(new_null_array(&spec.data_type, num_rows));
        }

        *guard = rebuild(&schema, fields, arrays, num_rows)?;
        Ok(missing.len())
    }

    /// Preallocates the config's `needed_columns`.
    pub fn preallocate(&self, config: &MessageConfig) -> Result<usize, MessageError> {
        self.ensure_columns(&config.needed_columns)
    }

    /// Runs `f` with exclusive access to the batch.
    ///
    /// `f` may replace columns but must keep the row count; otherwise the
    /// previous batch is restored and an error is returned.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut RecordBatch) -> R) -> Result<R, MessageError> {
        let mut guard = self.data.write()?;
        let previous = guard.clone();

        let result = f(&mut *guard);

        if guard.num_rows() != previous.num_rows() {
            let actual = guard.num_rows();
            *guard = previous;
            return Err(MessageError::InvalidArgument(format!(
                "mutation changed the row count from {} to {}",
                guard.num_rows(),
                actual
            )));
        }
        Ok(result)
    }
}

impl From<RecordBatch> for MessageMeta {
    fn from(batch: RecordBatch) -> Self {
        MessageMeta::new(batch)
    }
}

fn check_window(offset: usize, count: usize, num_rows: usize) -> Result<(), MessageError> {
    match offset.checked_add(count) {
        Some(end) if end <= num_rows => Ok(()),
        _ => Err(MessageError::OutOfRange(format!(
            "window of {} rows at offset {} exceeds the {} rows of the batch",
            count, offset, num_rows
        ))),
    }
}

fn splice_column(
    existing: &ArrayRef,
    offset: usize,
    values: &ArrayRef,
) -> Result<ArrayRef, MessageError> {
    let len = values.len();
    let head = existing.slice(0, offset);
    let tail = existing.slice(offset + len, existing.len() - offset - len);
    Ok(concat(&[head.as_ref(), values.as_ref(), tail.as_ref()])?)
}

fn rebuild(
    schema: &SchemaRef,
    fields: Vec<FieldRef>,
    arrays: Vec<ArrayRef>,
    num_rows: usize,
) -> Result<RecordBatch, MessageError> {
    let schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));
    let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
    Ok(RecordBatch::try_new_with_options(schema, arrays, &options)?)
}
