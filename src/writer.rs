//! Directory encoding
//!
//! The inverse of [`crate::reader`]: writes a listing as a directory stream.
//! Records are written as given, bundle parents included; keeping the listing
//! in name order (and each bundle's children in name order) is the caller's job.
use std::io::Write;

use crate::entry::EntryMetadata;
use crate::error::Result;
use crate::json_stream::JsonStreamWriter;
use crate::reader::DIRECTORY_STREAM_TYPE;

pub fn write_entries<W: Write>(writer: W, entries: &[EntryMetadata]) -> Result<W> {
    let mut stream = JsonStreamWriter::new(writer, DIRECTORY_STREAM_TYPE)?;
    for entry in entries {
        stream.write(entry)?;
    }
    stream.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_id::ObjectId;
    use crate::reader::read_entries;

    #[test]
    fn test_written_bundle_reads_back_flattened() {
        let entries = vec![
            EntryMetadata::bundle(
                "pack0",
                ObjectId::root("R"),
                4,
                vec![
                    EntryMetadata {
                        name: "x".into(),
                        file_size: 1,
                        ..Default::default()
                    },
                    EntryMetadata {
                        name: "y".into(),
                        file_size: 3,
                        ..Default::default()
                    },
                ],
            ),
            EntryMetadata::new("w", ObjectId::root("W"), 2),
        ];

        let bytes = write_entries(Vec::new(), &entries).unwrap();
        let decoded = read_entries(&bytes[..]).unwrap();

        let names: Vec<&str> = decoded.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["w", "x", "y"]);
        assert_eq!(
            decoded[2].object_id,
            Some(ObjectId::section(1, 3, &ObjectId::root("R")))
        );
    }
}
