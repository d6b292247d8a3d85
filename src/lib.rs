//! This file is the root of the `batchmsg` Rust crate.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring the top-level modules of the library (`meta`, `messages`, etc.)
//!     and re-exporting the types most callers need.
//! 2.  Defining the `#[pymodule]` which acts as the entry point when the library
//!     is built with the `python` feature and imported into Python.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
mod observability; // Make macros available throughout the crate

pub mod config;
pub mod error;
pub mod messages;
pub mod meta;

#[cfg(feature = "python")]
mod ffi;

#[doc(hidden)]
pub use log as __log;

pub use config::{ColumnSpec, MessageConfig};
pub use error::MessageError;
pub use messages::{
    Derived, MessageExtension, MultiMessage, MultiResponseMessage, MultiTensorMessage,
    ResponseAttributes, RowRange, TensorAttributes, TensorMemory, Windowed,
};
pub use meta::MessageMeta;

//==================================================================================
// 2. Python Module Definition
//==================================================================================
#[cfg(feature = "python")]
use pyo3::prelude::*;

/// The `batchmsg` Python module.
#[cfg(feature = "python")]
#[pymodule]
fn batchmsg(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<ffi::PyMessageMeta>()?;
    m.add_class::<ffi::PyMultiMessage>()?;

    // --- Expose version string as a module attribute ---
    m.add("__version__", VERSION)?;

    // --- Turn on debug logging for message operations ---
    m.add_function(wrap_pyfunction!(ffi::enable_verbose_logging_py, m)?)?;

    Ok(())
}
