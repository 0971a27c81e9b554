//! Storage capability consumed by the hierarchy engine.
//!
//! The engine never holds a connection of its own. Each operation asks the
//! store for one transaction and does all of its reads and writes through
//! the [`ItemTx`] handed to it. Returning `Err` from the closure rolls the
//! whole transaction back.

use thiserror::Error;

use super::EngineError;
use crate::models::{Item, ItemType, NewItem};

/// Failures raised by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database lock poisoned")]
    LockPoisoned,
}

/// Equality and substring predicates for [`ItemTx::scan`].
///
/// Results come back ordered by id; `offset` and `limit` apply after every
/// predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFilter {
    pub project_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub item_type: Option<ItemType>,
    /// Case-sensitive containment on `title`.
    pub title_contains: Option<String>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl ItemFilter {
    pub fn project(project_id: i64) -> Self {
        Self {
            project_id: Some(project_id),
            ..Default::default()
        }
    }

    pub fn children_of(parent_id: i64) -> Self {
        Self {
            parent_id: Some(parent_id),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, item_type: ItemType) -> Self {
        self.item_type = Some(item_type);
        self
    }

    /// Whether `item` passes every predicate (pagination aside).
    pub fn matches(&self, item: &Item) -> bool {
        self.project_id.is_none_or(|p| item.project_id == p)
            && self.parent_id.is_none_or(|p| item.parent_id == Some(p))
            && self.item_type.is_none_or(|t| item.item_type == t)
            && self
                .title_contains
                .as_deref()
                .is_none_or(|q| item.title.contains(q))
    }
}

/// Reads and writes available inside one transaction.
pub trait ItemTx {
    fn get(&self, id: i64) -> Result<Option<Item>, StoreError>;

    /// Lookup by the `(project_id, type, title)` composite key. First match wins.
    fn find_by_key(
        &self,
        project_id: i64,
        item_type: ItemType,
        title: &str,
    ) -> Result<Option<Item>, StoreError>;

    fn scan(&self, filter: &ItemFilter) -> Result<Vec<Item>, StoreError>;

    fn insert(&self, item: NewItem) -> Result<Item, StoreError>;

    /// Returns false when no row has `id`.
    fn set_parent(&self, id: i64, parent_id: Option<i64>) -> Result<bool, StoreError>;

    /// Returns false when no row has `id`.
    fn delete(&self, id: i64) -> Result<bool, StoreError>;
}

/// A backend able to run a unit of work atomically.
pub trait ItemStore: Send + Sync {
    /// Runs `f` in a fresh transaction, committing on `Ok` and rolling back
    /// on `Err`.
    fn transaction<T, F>(&self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&dyn ItemTx) -> Result<T, EngineError>;
}
