//! Object identifiers
//! ------------------
//!
//! Every entry in a directory listing points at the content it holds through an
//! `ObjectId`. Content stored on its own is referenced by an opaque root
//! identifier handed out by the storage layer. Content that was packed together
//! with its siblings into a single block is referenced by a *section*: a byte
//! range inside another object.
//!
//! String form:
//!
//! ```ascii
//!     <root>                       /* anything not starting with 'S' */
//!     S<start>,<length>,<base>     /* section of <base>, base may itself be any form */
//! ```
//!
//! Sections are only ever built by this crate (see `ObjectId::section`); the
//! storage layer resolves them to bytes.
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

use crate::error::{Error, Result};

const SECTION_PREFIX: char = 'S';

// Readers only ever wrap a stored block once; deeper nesting is garbage.
pub const MAX_SECTION_DEPTH: usize = 8;

/// Byte range `[start, start + length)` of `base`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Section {
    pub start: u64,
    pub length: u64,
    pub base: Box<ObjectId>,
}

impl Section {
    pub fn byte_range(&self) -> Range<u64> {
        self.start..self.start.saturating_add(self.length)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectId {
    Root(String),
    Section(Section),
}

impl ObjectId {
    pub fn root<S: Into<String>>(id: S) -> ObjectId {
        ObjectId::Root(id.into())
    }

    /// Address `length` bytes of `parent` starting at `offset`.
    pub fn section(offset: u64, length: u64, parent: &ObjectId) -> ObjectId {
        ObjectId::Section(Section {
            start: offset,
            length,
            base: Box::new(parent.clone()),
        })
    }

    pub fn as_section(&self) -> Option<&Section> {
        match self {
            ObjectId::Section(section) => Some(section),
            ObjectId::Root(_) => None,
        }
    }

    /// The identifier of the independently stored object this id ultimately
    /// reads from, following section bases.
    pub fn storage_root(&self) -> &str {
        let mut current = self;
        loop {
            match current {
                ObjectId::Root(id) => return id,
                ObjectId::Section(section) => current = &section.base,
            }
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ObjectId::Root(id) => write!(f, "{id}"),
            ObjectId::Section(section) => write!(
                f,
                "{SECTION_PREFIX}{},{},{}",
                section.start, section.length, section.base
            ),
        }
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<ObjectId> {
        let malformed = || Error::InvalidFormat(format!("malformed section object id '{s}'"));
        let parse_u64 = |value: &str| value.parse::<u64>().map_err(|_| malformed());

        // Sections are peeled off left to right and rebuilt innermost first.
        let mut ranges = Vec::new();
        let mut rest = s;
        while let Some(body) = rest.strip_prefix(SECTION_PREFIX) {
            if ranges.len() == MAX_SECTION_DEPTH {
                return Err(Error::InvalidFormat(format!(
                    "section object id nested deeper than {MAX_SECTION_DEPTH} levels"
                )));
            }

            let mut parts = body.splitn(3, ',');
            let (start, length, base) = match (parts.next(), parts.next(), parts.next()) {
                (Some(start), Some(length), Some(base)) if !base.is_empty() => {
                    (start, length, base)
                }
                _ => return Err(malformed()),
            };

            let start = parse_u64(start)?;
            let length = parse_u64(length)?;
            if start.checked_add(length).is_none() {
                return Err(Error::InvalidFormat(format!(
                    "section object id '{s}' exceeds 64-bit range"
                )));
            }
            ranges.push((start, length));
            rest = base;
        }

        let mut oid = ObjectId::Root(rest.to_string());
        for (start, length) in ranges.into_iter().rev() {
            oid = ObjectId::Section(Section {
                start,
                length,
                base: Box::new(oid),
            });
        }
        Ok(oid)
    }
}

impl Serialize for ObjectId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<ObjectId, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_string_form() {
        let parent = ObjectId::root("Dabc123");
        let oid = ObjectId::section(10, 20, &parent);
        assert_eq!(oid.to_string(), "S10,20,Dabc123");
        assert_eq!("S10,20,Dabc123".parse::<ObjectId>().unwrap(), oid);
    }

    #[test]
    fn test_nested_section_parse() {
        let oid: ObjectId = "S5,1,S10,20,Dabc".parse().unwrap();
        let outer = oid.as_section().unwrap();
        assert_eq!(outer.byte_range(), 5..6);
        let inner = outer.base.as_section().unwrap();
        assert_eq!(inner.byte_range(), 10..30);
        assert_eq!(oid.storage_root(), "Dabc");
    }

    #[test]
    fn test_root_is_opaque() {
        let oid: ObjectId = "Ixyz,1,2".parse().unwrap();
        assert_eq!(oid, ObjectId::root("Ixyz,1,2"));
        assert!(oid.as_section().is_none());
    }

    #[test]
    fn test_malformed_sections() {
        for s in ["S", "S1,2", "S1,2,", "Sx,2,D1", "S1,-2,D1", "S18446744073709551615,1,D1"] {
            assert!(s.parse::<ObjectId>().is_err(), "{s} should not parse");
        }
    }

    #[test]
    fn test_section_depth_is_capped() {
        let at_cap = format!("{}R", "S0,1,".repeat(MAX_SECTION_DEPTH));
        let oid: ObjectId = at_cap.parse().unwrap();
        assert_eq!(oid.storage_root(), "R");
        assert_eq!(oid.to_string(), at_cap);

        let too_deep = format!("{}R", "S0,1,".repeat(MAX_SECTION_DEPTH + 1));
        assert!(matches!(
            too_deep.parse::<ObjectId>(),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_byte_range_saturates() {
        let section = Section {
            start: u64::MAX - 1,
            length: 10,
            base: Box::new(ObjectId::root("R")),
        };
        assert_eq!(section.byte_range(), u64::MAX - 1..u64::MAX);
    }

    #[test]
    fn test_json_form_is_string() {
        let oid = ObjectId::section(0, 10, &ObjectId::root("R"));
        assert_eq!(serde_json::to_string(&oid).unwrap(), "\"S0,10,R\"");
        let back: ObjectId = serde_json::from_str("\"S0,10,R\"").unwrap();
        assert_eq!(back, oid);
        assert!(serde_json::from_str::<ObjectId>("\"Sbad\"").is_err());
    }
}
