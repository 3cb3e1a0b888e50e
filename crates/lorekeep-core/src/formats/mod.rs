//! # Formats
//!
//! Byte-level encodings of a session. File I/O lives in the app.

mod persistence;

pub use persistence::*;
