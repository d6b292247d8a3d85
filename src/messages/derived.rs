// In: src/messages/derived.rs

//! Slicing and range copying shared by every message kind.
//!
//! A message kind is a chain of levels. The root level is `MultiMessage`, which
//! owns the window into the batch. Every other level is a `Derived<B, X>` that
//! wraps the level below it (`B`) and adds its own per-row attributes (`X`).
//!
//! `Windowed` supplies `get_slice` and `copy_ranges` once for the whole chain.
//! Both clone the receiver and then run each level's hook on the clone, most
//! derived level first, down to the root. The result keeps the receiver's concrete
//! type, so `MultiResponseMessage::get_slice` returns a `MultiResponseMessage`.
//!
//! A level only touches the attributes it introduced. Levels that add no
//! per-row data leave both `MessageExtension` hooks at their no-op defaults.

use std::ops::Deref;

use super::multi::MultiMessage;
use super::ranges::{validate_ranges, RowRange};
use crate::error::MessageError;

//==================================================================================
// 1. The Windowed Contract
//==================================================================================

pub trait Windowed: Clone {
    /// The root level holding the batch window.
    fn root(&self) -> &MultiMessage;

    /// Narrows this message, in place, to local rows `[start, stop)`.
    fn adjust_for_slice(&mut self, start: usize, stop: usize) -> Result<(), MessageError>;

    /// Replaces this message's data, in place, with copies of the local rows in `ranges`.
    fn adjust_for_range_copy(
        &mut self,
        ranges: &[RowRange],
        num_selected_rows: usize,
    ) -> Result<(), MessageError>;

    /// Returns a message of the same kind over local rows `[start, stop)`.
    ///
    /// The result shares the batch with `self`; no row data is touched.
    fn get_slice(&self, start: usize, stop: usize) -> Result<Self, MessageError> {
        let count = self.root().mess_count();
        if start > stop || stop > count {
            return Err(MessageError::InvalidArgument(format!(
                "slice [{}, {}) is not within a window of {} rows",
                start, stop, count
            )));
        }

        let mut sliced = self.clone();
        sliced.adjust_for_slice(start, stop)?;

        log_metric!("event" = "get_slice", "start" = start, "stop" = stop);
        Ok(sliced)
    }

    /// Returns a message of the same kind over a new batch holding copies of the
    /// local rows in `ranges`, in order.
    ///
    /// `num_selected_rows` must equal the summed length of `ranges`. Every range
    /// must lie inside this message's window.
    fn copy_ranges(&self, ranges: &[RowRange], num_selected_rows: usize) -> Result<Self, MessageError> {
        validate_ranges(ranges, self.root().mess_count(), num_selected_rows)?;

        let mut copied = self.clone();
        copied.adjust_for_range_copy(ranges, num_selected_rows)?;

        log_metric!("event" = "copy_ranges", "ranges" = ranges.len(), "rows" = num_selected_rows);
        Ok(copied)
    }
}

//==================================================================================
// 2. Per-Level Hooks
//==================================================================================

/// The attributes one derivation level adds on top of its base.
pub trait MessageExtension: Clone {
    /// Narrows this level's attributes to local rows `[start, stop)`.
    fn slice_rows(&mut self, _start: usize, _stop: usize) -> Result<(), MessageError> {
        Ok(())
    }

    /// Replaces this level's attributes with copies of the local rows in `ranges`.
    fn copy_rows(
        &mut self,
        _ranges: &[RowRange],
        _num_selected_rows: usize,
    ) -> Result<(), MessageError> {
        Ok(())
    }
}

//==================================================================================
// 3. Static Composition
//==================================================================================

/// A message kind built from base kind `B` plus the attributes `X`.
#[derive(Debug, Clone)]
pub struct Derived<B, X> {
    base: B,
    ext: X,
}

impl<B: Windowed, X: MessageExtension> Derived<B, X> {
    pub fn new(base: B, ext: X) -> Self {
        Self { base, ext }
    }

    pub fn base(&self) -> &B {
        &self.base
    }

    pub fn extension(&self) -> &X {
        &self.ext
    }

    pub fn into_parts(self) -> (B, X) {
        (self.base, self.ext)
    }
}

impl<B: Windowed, X: MessageExtension> Windowed for Derived<B, X> {
    fn root(&self) -> &MultiMessage {
        self.base.root()
    }

    // Each level commits its attributes only after every level below succeeds.
    fn adjust_for_slice(&mut self, start: usize, stop: usize) -> Result<(), MessageError> {
        let mut ext = self.ext.clone();
        ext.slice_rows(start, stop)?;
        self.base.adjust_for_slice(start, stop)?;
        self.ext = ext;
        Ok(())
    }

    fn adjust_for_range_copy(
        &mut self,
        ranges: &[RowRange],
        num_selected_rows: usize,
    ) -> Result<(), MessageError> {
        let mut ext = self.ext.clone();
        ext.copy_rows(ranges, num_selected_rows)?;
        self.base.adjust_for_range_copy(ranges, num_selected_rows)?;
        self.ext = ext;
        Ok(())
    }
}

impl<B, X> Deref for Derived<B, X> {
    type Target = B;

    fn deref(&self) -> &B {
        &self.base
    }
}
