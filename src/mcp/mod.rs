//! MCP server exposing the item hierarchy to AI agents.

mod types;

pub use types::*;

use std::sync::Arc;

use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Serialize;

use crate::db::Database;
use crate::engine::HierarchyEngine;
use crate::models::*;
use crate::tools::{Tool, ToolResponse, Toolbox, DEFAULT_RUN_ID};

#[derive(Clone)]
pub struct McpServer {
    db: Database,
    tools: Toolbox<Database>,
    tool_router: ToolRouter<Self>,
}

impl McpServer {
    pub fn new(db: Database) -> Self {
        let tools = Toolbox::new(HierarchyEngine::new(db.clone()), Arc::new(db.clone()));
        Self {
            db,
            tools,
            tool_router: Self::tool_router(),
        }
    }

    fn dispatch<T: Serialize>(&self, tool: Tool, input: &T) -> Result<CallToolResult, McpError> {
        let payload = serde_json::to_value(input)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        envelope_result(self.tools.call(DEFAULT_RUN_ID, tool.name(), payload))
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

fn envelope_result(response: ToolResponse) -> Result<CallToolResult, McpError> {
    match response {
        ToolResponse {
            ok: true, result, ..
        } => json_result(&result.unwrap_or_default()),
        ToolResponse { error, .. } => Ok(CallToolResult::error(vec![Content::text(
            error.unwrap_or_default(),
        )])),
    }
}

#[tool_router]
impl McpServer {
    // ============================================================
    // Hierarchy tools (audited through the tool layer)
    // ============================================================

    #[tool(
        description = "Fetch one item. Pass either `id` alone, or `type`, `title` and `project_id` together. Returns the full item including parent_id and status."
    )]
    async fn get_item(
        &self,
        params: Parameters<GetItemInput>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(Tool::GetItem, &params.0)
    }

    #[tool(
        description = "List a project's items ordered by id. Optional filters: `type` and `query` (case-sensitive title substring). Pagination with `limit` (default 100) and `offset` is applied after filtering."
    )]
    async fn list_items(
        &self,
        params: Parameters<ListItemsInput>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(Tool::ListItems, &params.0)
    }

    #[tool(
        description = "Delete an item and its entire subtree. Returns the number of deleted items. Cannot be undone."
    )]
    async fn delete_item(
        &self,
        params: Parameters<DeleteItemInput>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(Tool::DeleteItem, &params.0)
    }

    #[tool(
        description = "Re-parent an item. Fails if the new parent's type is not allowed (Epic is root-only; Capability under Epic; Feature under Epic or Capability; US under Feature; UC under US) or if the new parent lies inside the item's own subtree."
    )]
    async fn move_item(
        &self,
        params: Parameters<MoveItemInput>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(Tool::MoveItem, &params.0)
    }

    #[tool(
        description = "Render the project's tree as an indented outline down to `depth` levels (default 3) and count items per type over the whole project."
    )]
    async fn summarize_project(
        &self,
        params: Parameters<SummarizeProjectInput>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(Tool::SummarizeProject, &params.0)
    }

    #[tool(
        description = "Create several Features under an Epic or Capability in one transaction. Titles already used by a Feature under that parent, or repeated in the batch, are skipped. Returns only the created features."
    )]
    async fn bulk_create_features(
        &self,
        params: Parameters<BulkCreateFeaturesInput>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(Tool::BulkCreateFeatures, &params.0)
    }

    // ============================================================
    // Setup tools
    // ============================================================

    #[tool(description = "Create a project to hold an item hierarchy. Returns the project with its id.")]
    async fn create_project(
        &self,
        params: Parameters<CreateProjectRequest>,
    ) -> Result<CallToolResult, McpError> {
        let input: CreateProjectInput = params.0.into();
        if input.name.trim().is_empty() {
            return Err(McpError::invalid_params("name must not be empty", None));
        }

        let project = self
            .db
            .create_project(input)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;

        json_result(&project)
    }

    #[tool(
        description = "Create a single item. Omit parent_id to create a root. The parent must exist; use move_item to enforce type rules on existing items."
    )]
    async fn create_item(
        &self,
        params: Parameters<CreateItemRequest>,
    ) -> Result<CallToolResult, McpError> {
        let (project_id, input) = params.0.into_parts();

        let project = self
            .db
            .get_project(project_id)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        if project.is_none() {
            return Err(McpError::invalid_params("Project not found", None));
        }

        match self.tools.engine().create_item(project_id, input) {
            Ok(item) => json_result(&item),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        }
    }
}

#[tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: rmcp::model::Implementation {
                name: "agent4ba".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            instructions: Some(
                r#"Agent4BA stores a project's planning hierarchy.

ITEM TYPES AND ALLOWED PARENTS:
- Epic: root only
- Capability: under Epic
- Feature: under Epic or Capability
- US (user story): under Feature
- UC (use case): under US

SETUP:
1. create_project
2. create_item for epics, then capabilities and features beneath them
3. bulk_create_features to add many features under one epic or capability

NAVIGATION:
- summarize_project for an outline and per-type counts
- list_items to search by type or title substring
- get_item by id, or by (type, title, project_id)

RESTRUCTURING:
- move_item re-parents an item; type rules and cycle checks apply
- delete_item removes an item with its whole subtree"#
                    .into(),
            ),
            ..Default::default()
        }
    }
}

pub async fn run_stdio_server(db: Database) -> anyhow::Result<()> {
    use tokio::io::{stdin, stdout};

    tracing::info!("Starting MCP server via stdio");

    let service = McpServer::new(db);
    let server = service.serve((stdin(), stdout())).await?;

    let quit_reason = server.waiting().await?;
    tracing::info!("MCP server stopped: {:?}", quit_reason);

    Ok(())
}
