//! Tool inputs.
//!
//! These are the payload shapes accepted by the tool layer, the MCP server
//! and the HTTP API. Field doc comments double as the MCP input schema
//! descriptions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ItemType;

/// How to address a single item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemLookup {
    Id(i64),
    Key {
        project_id: i64,
        item_type: ItemType,
        title: String,
    },
}

/// Raw `get_item` payload: either `id` alone or the full
/// `(type, title, project_id)` key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct GetItemInput {
    /// Item id. Cannot be combined with the other fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Item type, used together with title and project_id.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub item_type: Option<ItemType>,
    /// Exact item title, used together with type and project_id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Owning project, used together with type and title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
}

/// Returned when a [`GetItemInput`] mixes or omits addressing fields.
pub const LOOKUP_SHAPE_ERROR: &str = "provide either id or (type, title, project_id)";

impl GetItemInput {
    pub fn by_id(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn by_key(project_id: i64, item_type: ItemType, title: impl Into<String>) -> Self {
        Self {
            id: None,
            item_type: Some(item_type),
            title: Some(title.into()),
            project_id: Some(project_id),
        }
    }

    /// Resolve into exactly one addressing mode, or explain what is wrong.
    pub fn lookup(&self) -> Result<ItemLookup, String> {
        match (self.id, self.item_type, &self.title, self.project_id) {
            (Some(id), None, None, None) => Ok(ItemLookup::Id(id)),
            (Some(_), _, _, _) => Err("id cannot be combined with other fields".to_string()),
            (None, Some(item_type), Some(title), Some(project_id)) => Ok(ItemLookup::Key {
                project_id,
                item_type,
                title: title.clone(),
            }),
            _ => Err(LOOKUP_SHAPE_ERROR.to_string()),
        }
    }
}

fn default_limit() -> usize {
    100
}

/// `list_items` payload.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListItemsInput {
    /// Project to list items from.
    pub project_id: i64,
    /// Only return items of this type.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub item_type: Option<ItemType>,
    /// Case-sensitive substring the title must contain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Maximum number of items to return. Defaults to 100.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Number of matching items to skip. Defaults to 0.
    #[serde(default)]
    pub offset: usize,
}

impl ListItemsInput {
    pub fn new(project_id: i64) -> Self {
        Self {
            project_id,
            item_type: None,
            query: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

/// `delete_item` payload.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeleteItemInput {
    /// Item to delete together with its whole subtree.
    pub id: i64,
}

/// `move_item` payload.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MoveItemInput {
    /// Item to re-parent.
    pub id: i64,
    /// New parent item. Must be an allowed parent type and not a descendant of the item.
    pub new_parent_id: i64,
}

/// Outline depth used when a caller does not give one.
pub const DEFAULT_SUMMARY_DEPTH: usize = 3;

fn default_depth() -> usize {
    DEFAULT_SUMMARY_DEPTH
}

/// `summarize_project` payload.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SummarizeProjectInput {
    pub project_id: i64,
    /// Number of tree levels to render, roots included. Defaults to 3.
    #[serde(default = "default_depth")]
    pub depth: usize,
}

/// One feature proposed for bulk creation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct FeatureDraft {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FeatureDraft {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
        }
    }
}

/// `bulk_create_features` payload.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BulkCreateFeaturesInput {
    pub project_id: i64,
    /// Epic or Capability the features are created under.
    pub parent_id: i64,
    /// Features in creation order. Titles already present under the parent, or
    /// repeated earlier in this list, are skipped.
    pub items: Vec<FeatureDraft>,
}
