// In: src/messages/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: Windowed Messages
// ====================================================================================
//
// A message never owns its rows. It holds a shared `Arc<MessageMeta>` (the whole
// batch) and a window `[mess_offset, mess_offset + mess_count)` into it.
//
//   MultiMessage                      <- root level: the batch window
//     `-> Derived<_, TensorAttributes>  <- per-row tensors with their own window
//           `-> Derived<_, ResponseAttributes>  <- names the output tensor
//
// Two operations are available on every level through the `Windowed` trait:
//
//   get_slice(start, stop)      O(1). Clone, then narrow every level's window.
//                               The batch is shared with the source message.
//
//   copy_ranges(ranges, rows)   O(rows). Clone, then let every level gather the
//                               selected rows into brand new storage.
//
// ====================================================================================
pub mod derived;
pub mod multi;
pub mod ranges;
pub mod response;
pub mod tensor;

pub use derived::{Derived, MessageExtension, Windowed};
pub use multi::MultiMessage;
pub use ranges::{apply_offset_to_ranges, total_rows, validate_ranges, RowRange};
pub use response::{MultiResponseMessage, ResponseAttributes};
pub use tensor::{MultiTensorMessage, TensorAttributes, TensorMemory};
