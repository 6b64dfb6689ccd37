//! Directory entries
//! -----------------
//!
//! A directory is persisted as a stream of `EntryMetadata` records, one per
//! child. Runs of small files may be packed into one stored block: the writer
//! then emits a single *bundle parent* record whose `obj`/`size` describe the
//! block and whose `bundled` list holds the children, in the order their bytes
//! appear in the block.
//!
//! ```ascii
//!     {"name":"pack0","obj":"Dabc","size":30,"bundled":[
//!         {"name":"a","size":10},
//!         {"name":"b","size":10},
//!         {"name":"c","size":10}
//!     ]}
//! ```
//!
//! Bundles never nest: bundled children carry no `bundled` list of their own.
use chrono::{DateTime, Utc};

use crate::object_id::ObjectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum EntryType {
    #[serde(rename = "f")]
    File,
    #[serde(rename = "d")]
    Directory,
    #[serde(rename = "s")]
    Symlink,
}

/// Metadata of one directory child.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct EntryMetadata {
    pub name: String,
    #[serde(rename = "type")]
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub entry_type: Option<EntryType>,
    #[serde(rename = "mode")]
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[serde(with = "octal_mode")]
    pub permissions: Option<u32>,
    #[serde(rename = "size")]
    #[serde(skip_serializing_if = "is_zero", default)]
    pub file_size: u64,
    #[serde(rename = "mtime")]
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mod_time: Option<DateTime<Utc>>,
    #[serde(rename = "uid")]
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user_id: Option<u32>,
    #[serde(rename = "gid")]
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub group_id: Option<u32>,
    #[serde(rename = "obj")]
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub object_id: Option<ObjectId>,
    #[serde(rename = "bundled")]
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub bundled_children: Vec<EntryMetadata>,
}

impl EntryMetadata {
    pub fn new<S: Into<String>>(name: S, object_id: ObjectId, file_size: u64) -> Self {
        EntryMetadata {
            name: name.into(),
            object_id: Some(object_id),
            file_size,
            ..Default::default()
        }
    }

    /// A bundle parent record covering `children`, whose bytes were written
    /// back to back into `object_id`.
    pub fn bundle<S: Into<String>>(
        name: S,
        object_id: ObjectId,
        file_size: u64,
        children: Vec<EntryMetadata>,
    ) -> Self {
        EntryMetadata {
            name: name.into(),
            object_id: Some(object_id),
            file_size,
            bundled_children: children,
            ..Default::default()
        }
    }

    pub fn is_bundle(&self) -> bool {
        !self.bundled_children.is_empty()
    }

    pub fn is_directory(&self) -> bool {
        self.entry_type == Some(EntryType::Directory)
    }
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

// Mode bits travel as an octal string ("0644"). Older writers emitted a plain
// integer, which is still accepted.
mod octal_mode {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(mode: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match mode {
            Some(m) => serializer.serialize_str(&format!("0{m:o}")),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Mode {
            Int(u32),
            Str(String),
            Null,
        }

        match Mode::deserialize(deserializer)? {
            Mode::Int(m) => Ok(Some(m)),
            Mode::Str(s) => u32::from_str_radix(&s, 8).map(Some).map_err(|_| {
                serde::de::Error::custom(format!("expected octal mode, got \"{}\"", s))
            }),
            Mode::Null => Ok(None),
        }
    }
}
