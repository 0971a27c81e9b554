//! In-process [`ItemStore`] backed by a `BTreeMap`.
//!
//! Transactions work on a copy of the map that replaces the shared state only
//! on commit. Useful for embedding the engine without SQLite and for tests.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::engine::store::{ItemFilter, ItemStore, ItemTx, StoreError};
use crate::engine::EngineError;
use crate::models::{Item, ItemType, NewItem};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    items: BTreeMap<i64, Item>,
    next_id: i64,
    writes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All committed items, ordered by id.
    pub fn snapshot(&self) -> Vec<Item> {
        self.state
            .lock()
            .map(|state| state.items.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of writes issued by committed transactions.
    pub fn write_count(&self) -> usize {
        self.state.lock().map(|state| state.writes).unwrap_or_default()
    }
}

impl ItemStore for MemoryStore {
    fn transaction<T, F>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&dyn ItemTx) -> Result<T, EngineError>,
    {
        let mut shared = self.state.lock().map_err(|_| StoreError::LockPoisoned)?;
        let tx = MemoryTx {
            state: RefCell::new(shared.clone()),
        };
        let out = f(&tx)?;
        *shared = tx.state.into_inner();
        Ok(out)
    }
}

struct MemoryTx {
    state: RefCell<MemoryState>,
}

impl ItemTx for MemoryTx {
    fn get(&self, id: i64) -> Result<Option<Item>, StoreError> {
        Ok(self.state.borrow().items.get(&id).cloned())
    }

    fn find_by_key(
        &self,
        project_id: i64,
        item_type: ItemType,
        title: &str,
    ) -> Result<Option<Item>, StoreError> {
        Ok(self
            .state
            .borrow()
            .items
            .values()
            .find(|i| i.project_id == project_id && i.item_type == item_type && i.title == title)
            .cloned())
    }

    fn scan(&self, filter: &ItemFilter) -> Result<Vec<Item>, StoreError> {
        let state = self.state.borrow();
        let matching = state
            .items
            .values()
            .filter(|item| filter.matches(item))
            .skip(filter.offset);
        Ok(match filter.limit {
            Some(limit) => matching.take(limit).cloned().collect(),
            None => matching.cloned().collect(),
        })
    }

    fn insert(&self, item: NewItem) -> Result<Item, StoreError> {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        state.writes += 1;
        let item = item.into_item(state.next_id);
        state.items.insert(item.id, item.clone());
        Ok(item)
    }

    fn set_parent(&self, id: i64, parent_id: Option<i64>) -> Result<bool, StoreError> {
        let mut state = self.state.borrow_mut();
        state.writes += 1;
        Ok(match state.items.get_mut(&id) {
            Some(item) => {
                item.parent_id = parent_id;
                true
            }
            None => false,
        })
    }

    fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let mut state = self.state.borrow_mut();
        state.writes += 1;
        Ok(state.items.remove(&id).is_some())
    }
}
