// In: src/messages/ranges.rs

//! Row ranges and the translation between a message's local window and the
//! absolute row space of the storage behind it.

use serde::{Deserialize, Serialize};

use crate::error::MessageError;

/// A half-open interval `[start, stop)` of row indices.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowRange {
    pub start: usize,
    pub stop: usize,
}

impl RowRange {
    pub fn new(start: usize, stop: usize) -> Self {
        Self { start, stop }
    }

    /// Number of rows covered. An inverted range covers none.
    pub fn len(&self) -> usize {
        self.stop.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<(usize, usize)> for RowRange {
    fn from((start, stop): (usize, usize)) -> Self {
        Self { start, stop }
    }
}

/// Shifts every bound in `ranges` by `offset`.
///
/// No bounds checking happens here; the storage that consumes the translated
/// ranges is responsible for rejecting rows it does not have.
pub fn apply_offset_to_ranges(
    offset: usize,
    ranges: &[RowRange],
) -> Result<Vec<RowRange>, MessageError> {
    ranges
        .iter()
        .map(|r| {
            let start = r.start.checked_add(offset);
            let stop = r.stop.checked_add(offset);
            match (start, stop) {
                (Some(start), Some(stop)) => Ok(RowRange { start, stop }),
                _ => Err(MessageError::OutOfRange(format!(
                    "range [{}, {}) shifted by {} overflows",
                    r.start, r.stop, offset
                ))),
            }
        })
        .collect()
}

/// Total number of rows selected by `ranges`, counting overlaps twice.
pub fn total_rows(ranges: &[RowRange]) -> usize {
    ranges.iter().map(RowRange::len).sum()
}

/// Checks `ranges` against a space of `available` rows and the caller's declared total.
///
/// Inverted ranges are an invalid argument, ranges past `available` are out of
/// range, and a total that disagrees with `num_selected_rows` is a size mismatch.
pub fn validate_ranges(
    ranges: &[RowRange],
    available: usize,
    num_selected_rows: usize,
) -> Result<(), MessageError> {
    for r in ranges {
        if r.start > r.stop {
            return Err(MessageError::InvalidArgument(format!(
                "range start {} is greater than stop {}",
                r.start, r.stop
            )));
        }
        if r.stop > available {
            return Err(MessageError::OutOfRange(format!(
                "range [{}, {}) exceeds the {} available rows",
                r.start, r.stop, available
            )));
        }
    }

    let selected = total_rows(ranges);
    if selected != num_selected_rows {
        return Err(MessageError::size_mismatch(
            "selected ranges",
            num_selected_rows,
            selected,
        ));
    }

    Ok(())
}
