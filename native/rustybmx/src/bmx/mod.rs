//! Binary Micro XML (BMX)
//!
//! Compact binary serialization of micro-DOM trees:
//! - Every distinct string is stored once in a table at the front of the body
//! - Nodes follow in document order, each as a one-byte tag plus fixed payload
//! - Children are bracketed by CHILDREN_START / CHILDREN_END markers
//!
//! Encoding and decoding are both single-pass over the body and never recurse,
//! so document depth is bounded only by memory.

pub mod error;
pub mod format;
pub mod reader;
pub mod settings;
pub mod strings;
pub mod writer;

pub use error::{BmxError, FormatError};
pub use reader::{decode, read_file, BmxReader};
pub use settings::{Setting, Settings};
pub use writer::{encode, encode_with_settings, encode_with_storage_value, write_file, BmxWriter};
