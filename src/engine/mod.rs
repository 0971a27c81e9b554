//! The hierarchy engine: business rules over a project's item tree.
//!
//! Every operation runs inside a single [`ItemStore::transaction`], so
//! cascading deletes and bulk inserts are all-or-nothing. Nothing is cached
//! between calls; each call re-reads the rows it needs.

pub mod store;
pub mod summary;
pub mod traversal;

use std::collections::HashSet;

use thiserror::Error;

use crate::models::*;
use store::{ItemFilter, ItemStore, StoreError};

/// Business-rule failures and storage faults.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed or contradictory request.
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidParentType(String),

    #[error("cycle detected")]
    CycleDetected,

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl EngineError {
    /// Stable snake_case name of the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::InvalidParentType(_) => "invalid_parent_type",
            Self::CycleDetected => "cycle_detected",
            Self::Storage(_) => "storage",
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Operations over the item tree, backed by an injected store.
#[derive(Debug, Clone)]
pub struct HierarchyEngine<S> {
    store: S,
}

impl<S: ItemStore> HierarchyEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetch one item by id or by `(project_id, type, title)`.
    pub fn get_item(&self, lookup: &ItemLookup) -> EngineResult<Item> {
        self.store.transaction(|tx| {
            let item = match lookup {
                ItemLookup::Id(id) => tx.get(*id)?,
                ItemLookup::Key {
                    project_id,
                    item_type,
                    title,
                } => tx.find_by_key(*project_id, *item_type, title)?,
            };
            item.ok_or_else(|| EngineError::NotFound("item not found".to_string()))
        })
    }

    /// Filtered, paginated listing of a project's items.
    pub fn list_items(&self, input: &ListItemsInput) -> EngineResult<Vec<ItemSummary>> {
        let filter = ItemFilter {
            project_id: Some(input.project_id),
            item_type: input.item_type,
            title_contains: input.query.clone().filter(|q| !q.is_empty()),
            offset: input.offset,
            limit: Some(input.limit),
            ..Default::default()
        };

        self.store.transaction(|tx| {
            let items = tx.scan(&filter)?;
            Ok(items.into_iter().map(ItemSummary::from).collect())
        })
    }

    /// Re-parent `id` under `new_parent_id`.
    ///
    /// Moving an item to the parent it already has returns it untouched
    /// without re-checking the rules or writing anything.
    pub fn move_item(&self, id: i64, new_parent_id: i64) -> EngineResult<Item> {
        self.store.transaction(|tx| {
            let (Some(item), Some(new_parent)) = (tx.get(id)?, tx.get(new_parent_id)?) else {
                return Err(EngineError::NotFound(
                    "item or parent not found".to_string(),
                ));
            };

            if item.parent_id == Some(new_parent.id) {
                return Ok(item);
            }

            // Root-only types fail on type alone. For everything else a cycle
            // outranks a type mismatch.
            if item.item_type.allowed_parents().is_empty() {
                return Err(EngineError::InvalidParentType(parent_type_message(
                    item.item_type,
                    new_parent.item_type,
                )));
            }

            if traversal::reaches_ancestor(tx, &new_parent, item.id)? {
                tracing::debug!(item_id = id, new_parent_id, "move rejected: cycle");
                return Err(EngineError::CycleDetected);
            }

            if !item.item_type.accepts_parent(new_parent.item_type) {
                return Err(EngineError::InvalidParentType(parent_type_message(
                    item.item_type,
                    new_parent.item_type,
                )));
            }

            tx.set_parent(item.id, Some(new_parent.id))?;
            tracing::info!(item_id = id, new_parent_id, "moved item");

            Ok(Item {
                parent_id: Some(new_parent.id),
                ..item
            })
        })
    }

    /// Delete an item together with its whole subtree.
    pub fn delete_item(&self, id: i64) -> EngineResult<DeleteOutcome> {
        self.store.transaction(|tx| {
            let item = tx
                .get(id)?
                .ok_or_else(|| EngineError::NotFound("item not found".to_string()))?;

            let descendants = traversal::collect_descendants(tx, item.id)?;
            for child in &descendants {
                tx.delete(child.id)?;
            }
            tx.delete(item.id)?;

            let deleted = descendants.len() + 1;
            tracing::info!(item_id = id, deleted, "deleted item subtree");
            Ok(DeleteOutcome { deleted })
        })
    }

    /// Create Features under an Epic or Capability, skipping duplicate titles.
    ///
    /// A draft is skipped when its title matches a Feature already under the
    /// parent or an earlier draft in the same batch. Returns only the created
    /// items, in input order.
    pub fn bulk_create_features(
        &self,
        project_id: i64,
        parent_id: i64,
        drafts: &[FeatureDraft],
    ) -> EngineResult<Vec<Item>> {
        self.store.transaction(|tx| {
            let parent = tx
                .get(parent_id)?
                .ok_or_else(|| EngineError::NotFound("parent not found".to_string()))?;

            if !matches!(parent.item_type, ItemType::Epic | ItemType::Capability) {
                return Err(EngineError::InvalidParentType(
                    "features require epic or capability parent".to_string(),
                ));
            }

            let mut taken: HashSet<String> = tx
                .scan(&ItemFilter::children_of(parent.id).with_type(ItemType::Feature))?
                .into_iter()
                .map(|f| f.title)
                .collect();

            let mut created = Vec::new();
            for draft in drafts {
                if !taken.insert(draft.title.clone()) {
                    tracing::debug!(title = %draft.title, "skipping duplicate feature title");
                    continue;
                }
                created.push(tx.insert(NewItem {
                    project_id,
                    item_type: ItemType::Feature,
                    title: draft.title.clone(),
                    description: draft.description.clone(),
                    status: DEFAULT_STATUS.to_string(),
                    parent_id: Some(parent.id),
                })?);
            }

            tracing::info!(
                parent_id,
                requested = drafts.len(),
                created = created.len(),
                "bulk created features"
            );
            Ok(created)
        })
    }

    /// Indented outline of the project tree down to `depth` levels, plus
    /// per-type totals over the whole project.
    pub fn summarize_project(&self, project_id: i64, depth: usize) -> EngineResult<ProjectSummary> {
        let items = self
            .store
            .transaction(|tx| Ok(tx.scan(&ItemFilter::project(project_id))?))?;
        Ok(summary::summarize(&items, depth))
    }

    /// Insert a single item.
    ///
    /// A given `parent_id` must exist; its type is not checked here.
    pub fn create_item(&self, project_id: i64, input: CreateItemInput) -> EngineResult<Item> {
        self.store.transaction(|tx| {
            if let Some(parent_id) = input.parent_id {
                if tx.get(parent_id)?.is_none() {
                    return Err(EngineError::NotFound("parent not found".to_string()));
                }
            }

            let item = tx.insert(NewItem {
                project_id,
                item_type: input.item_type,
                title: input.title,
                description: input.description,
                status: input.status.unwrap_or_else(|| DEFAULT_STATUS.to_string()),
                parent_id: input.parent_id,
            })?;
            tracing::debug!(item_id = item.id, item_type = %item.item_type, "created item");
            Ok(item)
        })
    }
}

fn parent_type_message(child: ItemType, parent: ItemType) -> String {
    if child.allowed_parents().is_empty() {
        format!("invalid parent type: {} must be a root item", child)
    } else {
        format!("invalid parent type: {} cannot be placed under {}", child, parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn engine() -> HierarchyEngine<MemoryStore> {
        HierarchyEngine::new(MemoryStore::new())
    }

    fn add(
        engine: &HierarchyEngine<MemoryStore>,
        item_type: ItemType,
        title: &str,
        parent_id: Option<i64>,
    ) -> Item {
        engine
            .create_item(
                1,
                CreateItemInput {
                    item_type,
                    title: title.to_string(),
                    description: None,
                    status: None,
                    parent_id,
                },
            )
            .unwrap()
    }

    /// Epic > Capability > Feature > US > UC
    fn chain(engine: &HierarchyEngine<MemoryStore>) -> [Item; 5] {
        let epic = add(engine, ItemType::Epic, "Epic1", None);
        let cap = add(engine, ItemType::Capability, "Cap1", Some(epic.id));
        let feat = add(engine, ItemType::Feature, "Feat1", Some(cap.id));
        let story = add(engine, ItemType::UserStory, "Story1", Some(feat.id));
        let case = add(engine, ItemType::UseCase, "Case1", Some(story.id));
        [epic, cap, feat, story, case]
    }

    /// Follow parent links; panics if the walk outlasts the number of items.
    fn assert_acyclic(engine: &HierarchyEngine<MemoryStore>) {
        let all = engine.store().snapshot();
        for item in &all {
            let mut steps = 0;
            let mut parent = item.parent_id;
            while let Some(pid) = parent {
                steps += 1;
                assert!(steps <= all.len(), "item {} sits on a cycle", item.id);
                parent = all.iter().find(|i| i.id == pid).and_then(|i| i.parent_id);
            }
        }
    }

    #[test]
    fn get_item_by_id_and_key() {
        let engine = engine();
        let epic = add(&engine, ItemType::Epic, "Epic1", None);

        assert_eq!(engine.get_item(&ItemLookup::Id(epic.id)).unwrap(), epic);
        let by_key = engine
            .get_item(&ItemLookup::Key {
                project_id: 1,
                item_type: ItemType::Epic,
                title: "Epic1".to_string(),
            })
            .unwrap();
        assert_eq!(by_key.id, epic.id);
    }

    #[test]
    fn get_item_reports_missing() {
        let err = engine().get_item(&ItemLookup::Id(42)).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
        assert_eq!(err.to_string(), "item not found");
    }

    #[test]
    fn list_items_paginates_after_filtering() {
        let engine = engine();
        let epic = add(&engine, ItemType::Epic, "Epic1", None);
        for title in ["Alpha 1", "Beta", "Alpha 2", "Alpha 3"] {
            add(&engine, ItemType::Feature, title, Some(epic.id));
        }

        let mut input = ListItemsInput::new(1);
        input.query = Some("Alpha".to_string());
        input.offset = 1;
        input.limit = 1;

        let page = engine.list_items(&input).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "Alpha 2");
    }

    #[test]
    fn move_to_current_parent_is_a_no_op() {
        let engine = engine();
        let [_, cap, feat, _, _] = chain(&engine);
        let writes_before = engine.store().write_count();

        let moved = engine.move_item(feat.id, cap.id).unwrap();

        assert_eq!(moved, feat);
        assert_eq!(engine.store().write_count(), writes_before);
    }

    #[test]
    fn move_rejects_epic_under_its_own_feature_as_type_error() {
        let engine = engine();
        let [epic, _, feat, _, _] = chain(&engine);

        let err = engine.move_item(epic.id, feat.id).unwrap_err();
        assert!(matches!(err, EngineError::InvalidParentType(_)));
        assert_eq!(err.to_string(), "invalid parent type: Epic must be a root item");
        assert_eq!(engine.get_item(&ItemLookup::Id(epic.id)).unwrap().parent_id, None);
    }

    #[test]
    fn move_detects_cycle_through_descendant() {
        let engine = engine();
        let [_, cap, feat, _, _] = chain(&engine);

        let err = engine.move_item(cap.id, feat.id).unwrap_err();
        assert!(matches!(err, EngineError::CycleDetected));
        assert_acyclic(&engine);
    }

    #[test]
    fn move_rejects_incompatible_parent_outside_subtree() {
        let engine = engine();
        let [_, _, _, story, _] = chain(&engine);
        let other_epic = add(&engine, ItemType::Epic, "Epic2", None);

        let err = engine.move_item(story.id, other_epic.id).unwrap_err();
        assert!(matches!(err, EngineError::InvalidParentType(_)));
        assert_eq!(
            err.to_string(),
            "invalid parent type: US cannot be placed under Epic"
        );
    }

    #[test]
    fn move_onto_itself_is_a_cycle() {
        let engine = engine();
        let [_, cap, _, _, _] = chain(&engine);

        assert!(matches!(
            engine.move_item(cap.id, cap.id),
            Err(EngineError::CycleDetected)
        ));
    }

    #[test]
    fn move_rejects_feature_under_its_own_subtree() {
        let engine = engine();
        let epic = add(&engine, ItemType::Epic, "Epic1", None);
        let feat = add(&engine, ItemType::Feature, "Outer", Some(epic.id));
        // Creation does not enforce the rule table, so a Capability can end
        // up below a Feature.
        let cap = add(&engine, ItemType::Capability, "Inner", Some(feat.id));

        let err = engine.move_item(feat.id, cap.id).unwrap_err();
        assert!(matches!(err, EngineError::CycleDetected));
        assert_acyclic(&engine);
    }

    #[test]
    fn repeated_moves_keep_tree_acyclic() {
        let engine = engine();
        let [epic, cap, feat, _, _] = chain(&engine);
        let epic2 = add(&engine, ItemType::Epic, "Epic2", None);
        let cap2 = add(&engine, ItemType::Capability, "Cap2", Some(epic2.id));

        let moves = [
            (feat.id, epic.id),
            (cap.id, epic2.id),
            (feat.id, cap2.id),
            (cap2.id, epic.id),
            (feat.id, cap.id),
            (cap.id, feat.id),
        ];
        for (id, parent) in moves {
            let _ = engine.move_item(id, parent);
            assert_acyclic(&engine);
        }
    }

    #[test]
    fn move_updates_parent() {
        let engine = engine();
        let [epic, _, feat, _, _] = chain(&engine);

        let moved = engine.move_item(feat.id, epic.id).unwrap();
        assert_eq!(moved.parent_id, Some(epic.id));
        assert_eq!(
            engine.get_item(&ItemLookup::Id(feat.id)).unwrap().parent_id,
            Some(epic.id)
        );
    }

    #[test]
    fn move_reports_missing_endpoints() {
        let engine = engine();
        let epic = add(&engine, ItemType::Epic, "Epic1", None);

        assert!(matches!(
            engine.move_item(epic.id, 999),
            Err(EngineError::NotFound(_))
        ));
        assert!(matches!(
            engine.move_item(999, epic.id),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn delete_removes_whole_subtree() {
        let engine = engine();
        let [epic, cap, _, _, _] = chain(&engine);
        add(&engine, ItemType::Feature, "Sibling", Some(cap.id));
        let keep = add(&engine, ItemType::Epic, "Keep", None);

        let outcome = engine.delete_item(cap.id).unwrap();

        assert_eq!(outcome.deleted, 5);
        let remaining: Vec<i64> = engine.store().snapshot().iter().map(|i| i.id).collect();
        assert_eq!(remaining, vec![epic.id, keep.id]);
    }

    #[test]
    fn delete_missing_item_fails() {
        assert!(matches!(
            engine().delete_item(7),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn bulk_create_skips_existing_and_repeated_titles() {
        let engine = engine();
        let epic = add(&engine, ItemType::Epic, "Epic1", None);
        add(&engine, ItemType::Feature, "Existing", Some(epic.id));

        let drafts: Vec<FeatureDraft> = ["Existing", "New1", "New1", "New2"]
            .into_iter()
            .map(FeatureDraft::titled)
            .collect();
        let created = engine.bulk_create_features(1, epic.id, &drafts).unwrap();

        let titles: Vec<&str> = created.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(titles, vec!["New1", "New2"]);
        assert!(created
            .iter()
            .all(|f| f.item_type == ItemType::Feature && f.parent_id == Some(epic.id)));
    }

    #[test]
    fn bulk_create_requires_epic_or_capability() {
        let engine = engine();
        let [_, _, feat, _, _] = chain(&engine);

        let err = engine
            .bulk_create_features(1, feat.id, &[FeatureDraft::titled("X")])
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidParentType(_)));

        let err = engine
            .bulk_create_features(1, 999, &[FeatureDraft::titled("X")])
            .unwrap_err();
        assert_eq!(err.to_string(), "parent not found");
    }

    #[test]
    fn failed_transaction_leaves_store_untouched() {
        let engine = engine();
        let epic = add(&engine, ItemType::Epic, "Epic1", None);
        let before = engine.store().snapshot();

        let result: EngineResult<()> = engine.store().transaction(|tx| {
            tx.delete(epic.id)?;
            Err(EngineError::InvalidInput("abort".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(engine.store().snapshot(), before);
    }

    #[test]
    fn summarize_counts_every_type() {
        let engine = engine();
        chain(&engine);

        let summary = engine.summarize_project(1, 1).unwrap();
        assert_eq!(summary.text, "- Epic: Epic1");
        assert!(ItemType::ALL.iter().all(|t| summary.counts[t] == 1));

        let other = engine.summarize_project(2, 3).unwrap();
        assert_eq!(other.text, "");
        assert!(other.counts.values().all(|c| *c == 0));
    }
}
