//! Downward and upward walks over the `parent_id` adjacency list.
//!
//! Both walks use an explicit work list and a visited set, so they terminate
//! on arbitrarily deep trees and on rows that already form a loop.

use std::collections::HashSet;

use super::store::{ItemFilter, ItemTx, StoreError};
use crate::models::Item;

/// Every item reachable below `root` through child links. `root` itself is
/// not included.
pub fn collect_descendants(tx: &dyn ItemTx, root: i64) -> Result<Vec<Item>, StoreError> {
    let mut found = Vec::new();
    let mut seen = HashSet::from([root]);
    let mut stack = vec![root];

    while let Some(current) = stack.pop() {
        for child in tx.scan(&ItemFilter::children_of(current))? {
            if seen.insert(child.id) {
                stack.push(child.id);
                found.push(child);
            }
        }
    }

    Ok(found)
}

/// Walks up from `start` (inclusive) and reports whether `target` is on the
/// path to the root.
///
/// A parent link pointing at a missing row ends the walk like a root does.
/// A walk that loops back on itself never reaches a root, so it is reported
/// as reaching `target`: attaching anything there would not be acyclic.
pub fn reaches_ancestor(tx: &dyn ItemTx, start: &Item, target: i64) -> Result<bool, StoreError> {
    let mut seen = HashSet::new();
    let mut current = start.id;
    let mut parent = start.parent_id;

    loop {
        if current == target {
            return Ok(true);
        }
        if !seen.insert(current) {
            tracing::warn!(item_id = current, "parent chain loops back on itself");
            return Ok(true);
        }
        let Some(next) = parent else {
            return Ok(false);
        };
        let Some(next_item) = tx.get(next)? else {
            return Ok(false);
        };
        current = next_item.id;
        parent = next_item.parent_id;
    }
}
