// In: src/messages/tensor.rs

//! Per-row tensors carried alongside the batch window.
//!
//! `TensorMemory` is shared storage for a set of named 2-D tensors that all have
//! the same number of rows. `TensorAttributes` is the derivation level that gives
//! a message its own window into that memory, independent of the batch window,
//! so slicing a tensor message narrows both windows without copying either.

use std::sync::{Arc, RwLock};

use hashbrown::HashMap;
use log::debug;
use ndarray::{concatenate, s, Array2, ArrayView2, Axis};

use super::derived::{Derived, MessageExtension, Windowed};
use super::multi::MultiMessage;
use super::ranges::{apply_offset_to_ranges, validate_ranges, RowRange};
use crate::config::MessageConfig;
use crate::error::MessageError;

//==================================================================================
// 1. Shared Tensor Storage
//==================================================================================

#[derive(Debug)]
pub struct TensorMemory {
    count: usize,
    tensors: RwLock<HashMap<String, Array2<f32>>>,
}

impl TensorMemory {
    /// Empty memory for `count` rows.
    pub fn new(count: usize) -> Self {
        Self {
            count,
            tensors: RwLock::new(HashMap::new()),
        }
    }

    /// Memory holding `tensors`, each of which must have exactly `count` rows.
    pub fn with_tensors(
        count: usize,
        tensors: HashMap<String, Array2<f32>>,
    ) -> Result<Self, MessageError> {
        for (name, tensor) in &tensors {
            if tensor.nrows() != count {
                return Err(MessageError::size_mismatch(
                    format!("tensor '{}'", name),
                    count,
                    tensor.nrows(),
                ));
            }
        }
        Ok(Self {
            count,
            tensors: RwLock::new(tensors),
        })
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Tensor names in sorted order.
    pub fn tensor_names(&self) -> Result<Vec<String>, MessageError> {
        let mut names: Vec<String> = self.tensors.read()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    pub fn has_tensor(&self, name: &str) -> Result<bool, MessageError> {
        Ok(self.tensors.read()?.contains_key(name))
    }

    /// A copy of rows `[offset, offset + count)` of tensor `name`.
    pub fn get_tensor(
        &self,
        name: &str,
        offset: usize,
        count: usize,
    ) -> Result<Array2<f32>, MessageError> {
        self.check_rows(offset, count)?;

        let guard = self.tensors.read()?;
        let tensor = guard
            .get(name)
            .ok_or_else(|| MessageError::TensorNotFound(name.to_string()))?;

        Ok(tensor.slice(s![offset..offset + count, ..]).to_owned())
    }

    /// Overwrites rows starting at `offset` of tensor `name` with `values`.
    ///
    /// A missing tensor is created zero-filled with the column count of `values`.
    pub fn set_tensor(
        &self,
        name: &str,
        offset: usize,
        values: ArrayView2<'_, f32>,
    ) -> Result<(), MessageError> {
        let rows = values.nrows();
        self.check_rows(offset, rows)?;

        let mut guard = self.tensors.write()?;
        match guard.get_mut(name) {
            Some(tensor) => {
                if tensor.ncols() != values.ncols() {
                    return Err(MessageError::size_mismatch(
                        format!("columns of tensor '{}'", name),
                        tensor.ncols(),
                        values.ncols(),
                    ));
                }
                tensor.slice_mut(s![offset..offset + rows, ..]).assign(&values);
            }
            None => {
                debug!("Creating tensor '{}' with {} columns", name, values.ncols());
                let mut tensor = Array2::<f32>::zeros((self.count, values.ncols()));
                tensor.slice_mut(s![offset..offset + rows, ..]).assign(&values);
                guard.insert(name.to_string(), tensor);
            }
        }
        Ok(())
    }

    /// New memory holding copies of the rows in `ranges` (absolute row indices)
    /// of every tensor, in range order.
    pub fn copy_tensor_ranges(
        &self,
        ranges: &[RowRange],
        num_selected_rows: usize,
    ) -> Result<TensorMemory, MessageError> {
        validate_ranges(ranges, self.count, num_selected_rows)?;

        let guard = self.tensors.read()?;
        let mut copied = HashMap::with_capacity(guard.len());
        for (name, tensor) in guard.iter() {
            let gathered = if ranges.is_empty() {
                Array2::<f32>::zeros((0, tensor.ncols()))
            } else {
                let views: Vec<ArrayView2<'_, f32>> = ranges
                    .iter()
                    .map(|r| tensor.slice(s![r.start..r.stop, ..]))
                    .collect();
                concatenate(Axis(0), &views)?
            };
            copied.insert(name.clone(), gathered);
        }

        Ok(TensorMemory {
            count: num_selected_rows,
            tensors: RwLock::new(copied),
        })
    }

    fn check_rows(&self, offset: usize, count: usize) -> Result<(), MessageError> {
        match offset.checked_add(count) {
            Some(end) if end <= self.count => Ok(()),
            _ => Err(MessageError::OutOfRange(format!(
                "{} tensor rows at offset {} exceed the {} rows of tensor memory",
                count, offset, self.count
            ))),
        }
    }
}

//==================================================================================
// 2. The Tensor Derivation Level
//==================================================================================

#[derive(Debug, Clone)]
pub struct TensorAttributes {
    memory: Arc<TensorMemory>,
    offset: usize,
    count: usize,
    id_tensor_name: String,
}

impl TensorAttributes {
    /// A window of `count` rows (all remaining rows when `None`) into `memory`.
    pub fn new(
        memory: Arc<TensorMemory>,
        offset: usize,
        count: Option<usize>,
    ) -> Result<Self, MessageError> {
        Self::with_config(memory, offset, count, &MessageConfig::default())
    }

    pub fn with_config(
        memory: Arc<TensorMemory>,
        offset: usize,
        count: Option<usize>,
        config: &MessageConfig,
    ) -> Result<Self, MessageError> {
        let total = memory.count();
        let count = match count {
            None if offset <= total => total - offset,
            Some(count) if offset.checked_add(count).is_some_and(|end| end <= total) => count,
            _ => {
                return Err(MessageError::InvalidArgument(format!(
                    "tensor window at offset {} does not fit {} tensor rows",
                    offset, total
                )))
            }
        };

        Ok(Self {
            memory,
            offset,
            count,
            id_tensor_name: config.id_tensor_name.clone(),
        })
    }

    pub fn memory(&self) -> &Arc<TensorMemory> {
        &self.memory
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn id_tensor_name(&self) -> &str {
        &self.id_tensor_name
    }
}

impl MessageExtension for TensorAttributes {
    fn slice_rows(&mut self, start: usize, stop: usize) -> Result<(), MessageError> {
        if start > stop {
            return Err(MessageError::InvalidArgument(format!(
                "slice [{}, {}) has start after stop",
                start, stop
            )));
        }
        if stop > self.count {
            return Err(MessageError::OutOfRange(format!(
                "slice [{}, {}) exceeds the {} rows of the tensor window",
                start, stop, self.count
            )));
        }

        self.offset += start;
        self.count = stop - start;
        Ok(())
    }

    fn copy_rows(
        &mut self,
        ranges: &[RowRange],
        num_selected_rows: usize,
    ) -> Result<(), MessageError> {
        validate_ranges(ranges, self.count, num_selected_rows)?;
        let absolute = apply_offset_to_ranges(self.offset, ranges)?;
        let memory = self.memory.copy_tensor_ranges(&absolute, num_selected_rows)?;

        self.memory = Arc::new(memory);
        self.offset = 0;
        self.count = num_selected_rows;
        Ok(())
    }
}

/// A message carrying per-row tensors, e.g. model inputs.
pub type MultiTensorMessage = Derived<MultiMessage, TensorAttributes>;

impl<B: Windowed> Derived<B, TensorAttributes> {
    pub fn tensor_memory(&self) -> &Arc<TensorMemory> {
        self.extension().memory()
    }

    pub fn tensor_offset(&self) -> usize {
        self.extension().offset()
    }

    pub fn tensor_count(&self) -> usize {
        self.extension().count()
    }

    /// The rows of tensor `name` that belong to this message.
    pub fn get_tensor(&self, name: &str) -> Result<Array2<f32>, MessageError> {
        let attrs = self.extension();
        attrs.memory.get_tensor(name, attrs.offset, attrs.count)
    }

    /// Writes `values` over this message's rows of tensor `name`.
    pub fn set_tensor(&self, name: &str, values: ArrayView2<'_, f32>) -> Result<(), MessageError> {
        let attrs = self.extension();
        if values.nrows() != attrs.count {
            return Err(MessageError::size_mismatch(
                format!("rows of tensor '{}'", name),
                attrs.count,
                values.nrows(),
            ));
        }
        attrs.memory.set_tensor(name, attrs.offset, values)
    }

    pub fn get_id_tensor(&self) -> Result<Array2<f32>, MessageError> {
        self.get_tensor(self.extension().id_tensor_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn memory() -> Arc<TensorMemory> {
        let mut tensors = HashMap::new();
        tensors.insert(
            "probs".to_string(),
            array![[0.0, 0.5], [1.0, 1.5], [2.0, 2.5], [3.0, 3.5], [4.0, 4.5]],
        );
        tensors.insert(
            "seq_ids".to_string(),
            array![[0.0], [1.0], [2.0], [3.0], [4.0]],
        );
        Arc::new(TensorMemory::with_tensors(5, tensors).unwrap())
    }

    #[test]
    fn test_with_tensors_rejects_wrong_row_count() {
        let mut tensors = HashMap::new();
        tensors.insert("probs".to_string(), Array2::<f32>::zeros((3, 2)));
        assert!(matches!(
            TensorMemory::with_tensors(4, tensors),
            Err(MessageError::SizeMismatch {
                expected: 4,
                actual: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_get_tensor_window_and_missing_name() {
        let memory = memory();

        let rows = memory.get_tensor("probs", 1, 2).unwrap();
        assert_eq!(rows, array![[1.0, 1.5], [2.0, 2.5]]);

        assert!(matches!(
            memory.get_tensor("nope", 0, 1),
            Err(MessageError::TensorNotFound(_))
        ));
        assert!(matches!(
            memory.get_tensor("probs", 4, 2),
            Err(MessageError::OutOfRange(_))
        ));
        assert_eq!(memory.tensor_names().unwrap(), vec!["probs", "seq_ids"]);
    }

    #[test]
    fn test_set_tensor_creates_and_overwrites() {
        let memory = memory();

        memory.set_tensor("mask", 3, array![[7.0], [8.0]].view()).unwrap();
        assert_eq!(
            memory.get_tensor("mask", 0, 5).unwrap(),
            array![[0.0], [0.0], [0.0], [7.0], [8.0]]
        );

        assert!(matches!(
            memory.set_tensor("probs", 0, array![[1.0]].view()),
            Err(MessageError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_copy_tensor_ranges_gathers_in_order() {
        let memory = memory();

        let copy = memory
            .copy_tensor_ranges(&[RowRange::new(3, 5), RowRange::new(0, 1)], 3)
            .unwrap();

        assert_eq!(copy.count(), 3);
        assert_eq!(
            copy.get_tensor("seq_ids", 0, 3).unwrap(),
            array![[3.0], [4.0], [0.0]]
        );

        let empty = memory.copy_tensor_ranges(&[], 0).unwrap();
        assert_eq!(empty.count(), 0);
        assert_eq!(empty.get_tensor("probs", 0, 0).unwrap().dim(), (0, 2));
    }

    #[test]
    fn test_attributes_window_validation() {
        let memory = memory();

        let attrs = TensorAttributes::new(memory.clone(), 2, None).unwrap();
        assert_eq!((attrs.offset(), attrs.count()), (2, 3));
        assert_eq!(attrs.id_tensor_name(), "seq_ids");

        assert!(TensorAttributes::new(memory.clone(), 6, None).is_err());
        assert!(TensorAttributes::new(memory, 2, Some(4)).is_err());
    }

    #[test]
    fn test_slice_rows_rejects_rows_beyond_tensor_window() {
        let mut attrs = TensorAttributes::new(memory(), 0, Some(2)).unwrap();
        assert!(matches!(
            attrs.slice_rows(0, 3),
            Err(MessageError::OutOfRange(_))
        ));

        assert!(matches!(
            attrs.slice_rows(2, 1),
            Err(MessageError::InvalidArgument(_))
        ));

        attrs.slice_rows(1, 2).unwrap();
        assert_eq!((attrs.offset(), attrs.count()), (1, 1));
    }

    #[test]
    fn test_copy_rows_rejects_rows_beyond_tensor_window() {
        let mut attrs = TensorAttributes::new(memory(), 1, Some(2)).unwrap();
        assert!(matches!(
            attrs.copy_rows(&[RowRange::new(0, 3)], 3),
            Err(MessageError::OutOfRange(_))
        ));
        assert_eq!((attrs.offset(), attrs.count()), (1, 2));

        attrs.copy_rows(&[RowRange::new(1, 2)], 1).unwrap();
        assert_eq!(attrs.memory().get_tensor("seq_ids", 0, 1).unwrap(), array![[2.0]]);
    }
}
