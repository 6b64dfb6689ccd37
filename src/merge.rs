//! Merging sorted runs
//!
//! A flattened directory is a handful of runs that are each sorted by name (one
//! per bundle, plus the entries that were never bundled). Rather than sorting
//! the whole listing again, the runs are merged pairwise along a balanced tree,
//! which costs O(n log k) comparisons for k runs holding n entries.
use crate::entry::EntryMetadata;
use crate::error::{Error, Result};

fn entry_name(entry: &EntryMetadata) -> &str {
    &entry.name
}

/// Merge runs of entries, each already sorted by name, into one sorted listing.
///
/// Runs that are not sorted produce a listing that is not sorted either; see
/// [`verify_sorted`] for a checked variant.
pub fn merge_sorted_groups(groups: Vec<Vec<EntryMetadata>>) -> Vec<EntryMetadata> {
    merge_sorted_by_key(groups, entry_name)
}

pub fn merge_sorted_by_key<T, K, F>(groups: Vec<Vec<T>>, key: F) -> Vec<T>
where
    F: Fn(&T) -> &K,
    K: Ord + ?Sized,
{
    merge_tree(groups, &key)
}

fn merge_tree<T, K, F>(mut groups: Vec<Vec<T>>, key: &F) -> Vec<T>
where
    F: Fn(&T) -> &K,
    K: Ord + ?Sized,
{
    match groups.len() {
        0 | 1 => groups.pop().unwrap_or_default(),
        n => {
            let right = groups.split_off(n / 2);
            merge_two_by_key(merge_tree(groups, key), merge_tree(right, key), key)
        }
    }
}

/// Linear merge of two sorted runs. On equal keys the element from `left`
/// comes first.
pub fn merge_two_by_key<T, K, F>(left: Vec<T>, right: Vec<T>, key: &F) -> Vec<T>
where
    F: Fn(&T) -> &K,
    K: Ord + ?Sized,
{
    if right.is_empty() {
        return left;
    }
    if left.is_empty() {
        return right;
    }

    let mut result = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();

    loop {
        let take_left = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => key(l) <= key(r),
            _ => break,
        };
        let next = if take_left { left.next() } else { right.next() };
        result.extend(next);
    }

    result.extend(left);
    result.extend(right);
    result
}

/// Fails unless names are strictly increasing.
pub fn verify_sorted(entries: &[EntryMetadata]) -> Result<()> {
    for pair in entries.windows(2) {
        if pair[0].name >= pair[1].name {
            return Err(Error::UnsortedEntries {
                previous: pair[0].name.clone(),
                current: pair[1].name.clone(),
            });
        }
    }
    Ok(())
}
