//! Bundle flattening
//! -----------------
//!
//! The write path may pack several small files into one stored block and record
//! them under a single bundle parent. Readers never see bundles: each bundled
//! child becomes a regular entry whose object id is a section of the parent's
//! block, and the listing is put back into name order.
//!
//! ```ascii
//!     pack0 (obj R, size 30)        a  -> S0,10,R
//!       a (size 10)          ==>    b  -> S10,10,R
//!       b (size 10)                 c  -> S20,10,R
//!       c (size 10)
//! ```
use tracing::{debug, trace};

use crate::entry::EntryMetadata;
use crate::error::{Error, Result};
use crate::merge::{merge_sorted_groups, verify_sorted};
use crate::object_id::ObjectId;
use crate::options::DecodeOptions;

/// Take the children out of a bundle parent and address each one as a section
/// of the parent's block, in listed order.
///
/// Fails if the children's sizes do not add up to the parent's size.
pub fn expand_bundle(parent: &mut EntryMetadata) -> Result<Vec<EntryMetadata>> {
    let mut children = std::mem::take(&mut parent.bundled_children);
    let base = parent
        .object_id
        .as_ref()
        .ok_or_else(|| Error::MissingObjectId(parent.name.clone()))?;

    let mut offset: u64 = 0;
    for child in children.iter_mut() {
        if child.is_bundle() {
            return Err(Error::NestedBundle {
                parent: parent.name.clone(),
                child: child.name.clone(),
            });
        }
        child.object_id = Some(ObjectId::section(offset, child.file_size, base));
        offset = offset
            .checked_add(child.file_size)
            .ok_or_else(|| Error::BundleSizeOverflow {
                name: parent.name.clone(),
            })?;
    }

    if offset != parent.file_size {
        debug!(
            bundle = %parent.name,
            expected = parent.file_size,
            actual = offset,
            "bundle size mismatch"
        );
        return Err(Error::InconsistentBundleSize {
            name: parent.name.clone(),
            expected: parent.file_size,
            actual: offset,
        });
    }

    trace!(
        bundle = %parent.name,
        children = children.len(),
        size = offset,
        "expanded bundle"
    );
    Ok(children)
}

/// Replace every bundle parent in `entries` by its children and return the
/// listing in name order.
pub fn flatten_bundles(entries: Vec<EntryMetadata>) -> Result<Vec<EntryMetadata>> {
    flatten_bundles_with_options(entries, &DecodeOptions::default())
}

pub fn flatten_bundles_with_options(
    entries: Vec<EntryMetadata>,
    options: &DecodeOptions,
) -> Result<Vec<EntryMetadata>> {
    let mut unbundled = Vec::new();
    let mut groups = Vec::new();

    for mut entry in entries {
        if entry.is_bundle() {
            groups.push(expand_bundle(&mut entry)?);
        } else {
            unbundled.push(entry);
        }
    }

    if groups.is_empty() {
        if options.verify_order {
            verify_sorted(&unbundled)?;
        }
        return Ok(unbundled);
    }

    let bundles = groups.len();
    if !unbundled.is_empty() {
        groups.push(unbundled);
    }

    if options.verify_order {
        for group in &groups {
            verify_sorted(group)?;
        }
    }

    let merged = merge_sorted_groups(groups);
    if options.verify_order {
        verify_sorted(&merged)?;
    }

    debug!(bundles, entries = merged.len(), "flattened bundles");
    Ok(merged)
}
