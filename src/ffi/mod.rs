// In: src/ffi/mod.rs

//! The Python binding layer. Only argument conversion lives here; every
//! operation forwards to the message types in `crate::messages`.

pub mod python;

pub use python::{enable_verbose_logging_py, PyMessageMeta, PyMultiMessage};
