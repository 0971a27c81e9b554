use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A node in a project's planning hierarchy.
///
/// Items form a forest per project via `parent_id`. The allowed parent of an
/// item depends on its [`ItemType`]: epics are always roots, use cases hang
/// under user stories, and so on (see [`ItemType::allowed_parents`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: i64,
    pub project_id: i64,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub title: String,
    pub description: Option<String>,
    /// Free-text workflow marker. Not validated.
    pub status: String,
    pub parent_id: Option<i64>,
}

/// The closed set of item kinds.
///
/// Declaration order is the hierarchy order, which is also the order used
/// for per-type counts.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub enum ItemType {
    Epic,
    Capability,
    Feature,
    /// User story.
    #[serde(rename = "US")]
    UserStory,
    /// Use case.
    #[serde(rename = "UC")]
    UseCase,
}

impl ItemType {
    pub const ALL: [ItemType; 5] = [
        Self::Epic,
        Self::Capability,
        Self::Feature,
        Self::UserStory,
        Self::UseCase,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Epic => "Epic",
            Self::Capability => "Capability",
            Self::Feature => "Feature",
            Self::UserStory => "US",
            Self::UseCase => "UC",
        }
    }

    /// Parent types an item of this type may be attached to.
    ///
    /// An empty slice means the item must stay a root.
    pub fn allowed_parents(&self) -> &'static [ItemType] {
        match self {
            Self::Epic => &[],
            Self::Capability => &[Self::Epic],
            Self::Feature => &[Self::Capability, Self::Epic],
            Self::UserStory => &[Self::Feature],
            Self::UseCase => &[Self::UserStory],
        }
    }

    pub fn accepts_parent(&self, parent: ItemType) -> bool {
        self.allowed_parents().contains(&parent)
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown item type '{0}' (expected Epic, Capability, Feature, US or UC)")]
pub struct UnknownItemType(pub String);

impl FromStr for ItemType {
    type Err = UnknownItemType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Epic" => Ok(Self::Epic),
            "Capability" => Ok(Self::Capability),
            "Feature" => Ok(Self::Feature),
            "US" => Ok(Self::UserStory),
            "UC" => Ok(Self::UseCase),
            other => Err(UnknownItemType(other.to_string())),
        }
    }
}

/// Compact projection used by listings. Leaves out `description`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemSummary {
    pub id: i64,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub title: String,
    pub parent_id: Option<i64>,
    pub status: String,
}

impl From<Item> for ItemSummary {
    fn from(item: Item) -> Self {
        Self {
            id: item.id,
            item_type: item.item_type,
            title: item.title,
            parent_id: item.parent_id,
            status: item.status,
        }
    }
}

/// Default workflow status for new items.
pub const DEFAULT_STATUS: &str = "draft";

/// Input for creating a single item.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateItemInput {
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Defaults to "draft".
    #[serde(default)]
    pub status: Option<String>,
    /// Parent item. `None` creates a root.
    #[serde(default)]
    pub parent_id: Option<i64>,
}

/// A row about to be inserted. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub project_id: i64,
    pub item_type: ItemType,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub parent_id: Option<i64>,
}

impl NewItem {
    pub fn into_item(self, id: i64) -> Item {
        Item {
            id,
            project_id: self.project_id,
            item_type: self.item_type,
            title: self.title,
            description: self.description,
            status: self.status,
            parent_id: self.parent_id,
        }
    }
}

/// Result of a cascading delete.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Target plus every descendant.
    pub deleted: usize,
}

/// Indented outline of a project's tree plus per-type totals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectSummary {
    pub text: String,
    /// Always holds every [`ItemType`], zero when absent.
    pub counts: BTreeMap<ItemType, usize>,
}
