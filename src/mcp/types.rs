//! Request types for the MCP tools that are not part of the tool layer.

use rmcp::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::models::{CreateItemInput, CreateProjectInput, ItemType};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateProjectRequest {
    #[schemars(description = "Project name")]
    pub name: String,
    #[schemars(description = "Optional free-text description of the project")]
    pub description: Option<String>,
}

impl From<CreateProjectRequest> for CreateProjectInput {
    fn from(req: CreateProjectRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateItemRequest {
    #[schemars(description = "Project the item belongs to")]
    pub project_id: i64,
    #[serde(rename = "type")]
    #[schemars(description = "Item type: Epic, Capability, Feature, US or UC")]
    pub item_type: ItemType,
    #[schemars(description = "Item title, unique per (project, type) by convention")]
    pub title: String,
    #[schemars(description = "Optional description")]
    pub description: Option<String>,
    #[schemars(description = "Workflow status. Defaults to 'draft'")]
    pub status: Option<String>,
    #[schemars(
        description = "Parent item id. Epics are roots; Capability goes under Epic; Feature under Epic or Capability; US under Feature; UC under US"
    )]
    pub parent_id: Option<i64>,
}

impl CreateItemRequest {
    pub fn into_parts(self) -> (i64, CreateItemInput) {
        (
            self.project_id,
            CreateItemInput {
                item_type: self.item_type,
                title: self.title,
                description: self.description,
                status: self.status,
                parent_id: self.parent_id,
            },
        )
    }
}
