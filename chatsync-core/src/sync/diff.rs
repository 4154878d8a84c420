//! Keyed list diffing
//!
//! Rows are matched by identity key; matched rows whose content differs are
//! reported as updates. Reordering is reported as the fewest moves that
//! restore order, found with a longest-increasing-subsequence pass over the
//! surviving rows.

use std::collections::HashMap;
use std::hash::Hash;

/// A row that can be diffed by identity and content.
pub trait ListItem {
    type Key: Eq + Hash + Clone;

    /// Stable identity across refreshes.
    fn key(&self) -> Self::Key;

    /// Whether two rows with the same key render identically.
    fn same_content(&self, other: &Self) -> bool;
}

/// One redraw instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowChange {
    /// Row at `index` of the old list is gone
    Removed { index: usize },
    /// Row at `index` of the new list is new
    Inserted { index: usize },
    /// Row moved from old `from` to new `to`
    Moved { from: usize, to: usize },
    /// Row at new `index` kept its identity but changed content
    Updated { index: usize },
}

/// Compute the changes that turn `old` into `new`.
///
/// Keys are expected to be unique within each list. Output is ordered:
/// removals, insertions, moves, updates.
pub fn diff_rows<T: ListItem>(old: &[T], new: &[T]) -> Vec<RowChange> {
    let old_index: HashMap<T::Key, usize> =
        old.iter().enumerate().map(|(i, item)| (item.key(), i)).collect();
    let new_index: HashMap<T::Key, usize> =
        new.iter().enumerate().map(|(i, item)| (item.key(), i)).collect();

    let mut changes = Vec::new();

    for (i, item) in old.iter().enumerate() {
        if !new_index.contains_key(&item.key()) {
            changes.push(RowChange::Removed { index: i });
        }
    }

    // (old position, new position) of rows present in both, in new order
    let mut survivors = Vec::new();
    for (j, item) in new.iter().enumerate() {
        match old_index.get(&item.key()) {
            Some(&i) => survivors.push((i, j)),
            None => changes.push(RowChange::Inserted { index: j }),
        }
    }

    let old_positions: Vec<usize> = survivors.iter().map(|&(i, _)| i).collect();
    let stable = longest_increasing(&old_positions);
    for (pos, &(i, j)) in survivors.iter().enumerate() {
        if !stable[pos] {
            changes.push(RowChange::Moved { from: i, to: j });
        }
    }

    for &(i, j) in &survivors {
        if !old[i].same_content(&new[j]) {
            changes.push(RowChange::Updated { index: j });
        }
    }

    changes
}

/// Mark the members of one longest strictly increasing subsequence.
fn longest_increasing(seq: &[usize]) -> Vec<bool> {
    // tails[k] = index into seq of the smallest tail of an increasing run of length k+1
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];

    for (idx, &value) in seq.iter().enumerate() {
        let slot = tails.partition_point(|&t| seq[t] < value);
        if slot > 0 {
            prev[idx] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(idx);
        } else {
            tails[slot] = idx;
        }
    }

    let mut marked = vec![false; seq.len()];
    let mut cursor = tails.last().copied();
    while let Some(idx) = cursor {
        marked[idx] = true;
        cursor = prev[idx];
    }
    marked
}

/// The rows currently drawn by a list view.
#[derive(Debug, Clone)]
pub struct ListView<T> {
    items: Vec<T>,
}

impl<T> Default for ListView<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: ListItem> ListView<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the drawn rows and return what must be redrawn.
    pub fn submit(&mut self, items: Vec<T>) -> Vec<RowChange> {
        let changes = diff_rows(&self.items, &items);
        self.items = items;
        changes
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn position(&self, key: &T::Key) -> Option<usize> {
        self.items.iter().position(|item| &item.key() == key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
