//! Directory listing streams
//! -------------------------
//!
//! A backed-up directory is stored as a stream of JSON records, one per child
//! (see `crate::entry::EntryMetadata`). To keep the number of stored objects
//! down, the write path may pack runs of small files into a single block and
//! describe them with one *bundle parent* record.
//!
//! This crate reads such streams back: it checks the stream type, decodes the
//! records, expands every bundle into standalone entries addressed as byte
//! sections of the bundle's block, and merges everything into one listing
//! sorted by name, exactly as if nothing had been bundled.
//!
//! The single entry point is [`reader::read_entries`]; [`writer::write_entries`]
//! produces streams in the same format.

#[macro_use]
extern crate serde_derive;

pub mod bundle;
pub mod entry;
pub mod error;
pub mod json_stream;
pub mod merge;
pub mod object_id;
pub mod options;
pub mod reader;
pub mod writer;

pub use crate::entry::{EntryMetadata, EntryType};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::object_id::{ObjectId, Section};
pub use crate::options::DecodeOptions;
pub use crate::reader::{read_entries, read_entries_with_options, DirectoryStreamRead};
