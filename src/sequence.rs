//! Ordered-sequence helpers shared by the decoder, flattener and aggregator.
//!
//! Merged header cells and barn sub-rows are both "carry the last real value
//! forward" problems, and header detection and main-row selection are both
//! "earliest element wins" problems. Each is implemented once here.

use std::collections::HashSet;
use std::hash::Hash;

/// Replace every empty element with the last non-empty element seen before it.
///
/// Elements before the first non-empty one resolve to `initial`.
pub fn forward_fill<T, I, F>(values: I, initial: T, is_empty: F) -> Vec<T>
where
    T: Clone,
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> bool,
{
    let mut current = initial;
    values
        .into_iter()
        .map(|value| {
            if !is_empty(&value) {
                current = value;
            }
            current.clone()
        })
        .collect()
}

/// Find the earliest element satisfying `predicate`, with its position.
pub fn first_satisfying<T, I, F>(items: I, mut predicate: F) -> Option<(usize, T)>
where
    I: IntoIterator<Item = T>,
    F: FnMut(&T) -> bool,
{
    items
        .into_iter()
        .enumerate()
        .find(|(_, item)| predicate(item))
}

/// Select, for every key, the earliest element satisfying `predicate`.
///
/// Output order is the order in which the selected elements appear.
pub fn first_per_key<T, K, I, KF, P>(items: I, key: KF, mut predicate: P) -> Vec<T>
where
    I: IntoIterator<Item = T>,
    K: Eq + Hash,
    KF: Fn(&T) -> K,
    P: FnMut(&T) -> bool,
{
    let mut seen = HashSet::new();
    let mut selected = Vec::new();
    let mut remaining = items.into_iter();

    while let Some((_, item)) =
        first_satisfying(&mut remaining, |item| predicate(item) && !seen.contains(&key(item)))
    {
        seen.insert(key(&item));
        selected.push(item);
    }

    selected
}
