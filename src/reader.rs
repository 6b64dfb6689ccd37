//! Directory decoding
//!
//! Reads one directory listing from a stream written by [`crate::writer`],
//! flattens its bundles and returns the children sorted by name.
//!
//! ```rust,no_run
//! use dirstream::reader::read_entries;
//! use std::fs::File;
//!
//! fn main() -> dirstream::Result<()> {
//!     let entries = read_entries(File::open("dir.json")?)?;
//!     for entry in &entries {
//!         println!("{} {} {:?}", entry.name, entry.file_size, entry.object_id);
//!     }
//!     Ok(())
//! }
//! ```
use std::io::{BufReader, Read};

use tracing::debug;

use crate::bundle::flatten_bundles_with_options;
use crate::entry::EntryMetadata;
use crate::error::Result;
use crate::json_stream::JsonStreamReader;
use crate::options::DecodeOptions;

/// Type tag carried by every directory listing stream.
pub const DIRECTORY_STREAM_TYPE: &str = "kopia:directory";

/// Decode all entries of a directory stream.
///
/// An empty directory yields an empty `Vec`. On error nothing is returned, not
/// even the entries decoded before the failure.
pub fn read_entries<R: Read>(reader: R) -> Result<Vec<EntryMetadata>> {
    read_entries_with_options(reader, &DecodeOptions::default())
}

pub fn read_entries_with_options<R: Read>(
    reader: R,
    options: &DecodeOptions,
) -> Result<Vec<EntryMetadata>> {
    let mut stream = JsonStreamReader::with_max_record_size(
        BufReader::new(reader),
        DIRECTORY_STREAM_TYPE,
        options.max_record_size,
    )?;

    let mut entries = Vec::new();
    while let Some(entry) = stream.read::<EntryMetadata>()? {
        entries.push(entry);
    }
    debug!(records = entries.len(), "read directory stream");

    flatten_bundles_with_options(entries, options)
}

/// DirectoryStreamRead decodes a directory listing straight off any reader.
pub trait DirectoryStreamRead: Read + Sized {
    fn read_directory_entries(self) -> Result<Vec<EntryMetadata>> {
        read_entries(self)
    }

    fn read_directory_entries_with_options(
        self,
        options: &DecodeOptions,
    ) -> Result<Vec<EntryMetadata>> {
        read_entries_with_options(self, options)
    }
}

impl<R: Read> DirectoryStreamRead for R {}
