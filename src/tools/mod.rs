//! Named tool dispatch with a uniform result envelope.
//!
//! Every call is audited first, with the raw payload, and then decoded and
//! run against the [`HierarchyEngine`]. Failures of any kind come back as
//! `{"ok": false, "error": "..."}`; nothing escapes as an `Err`.

mod audit;

pub use audit::{AuditSink, NoopAudit, TracingAudit};

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::store::{ItemStore, StoreError};
use crate::engine::{EngineError, EngineResult, HierarchyEngine};
use crate::models::*;

/// Run id for calls not tied to a planning run.
pub const DEFAULT_RUN_ID: i64 = 0;

/// The tools exposed to agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    GetItem,
    ListItems,
    DeleteItem,
    MoveItem,
    SummarizeProject,
    BulkCreateFeatures,
}

impl Tool {
    pub const ALL: [Tool; 6] = [
        Self::GetItem,
        Self::ListItems,
        Self::DeleteItem,
        Self::MoveItem,
        Self::SummarizeProject,
        Self::BulkCreateFeatures,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::GetItem => "get_item",
            Self::ListItems => "list_items",
            Self::DeleteItem => "delete_item",
            Self::MoveItem => "move_item",
            Self::SummarizeProject => "summarize_project",
            Self::BulkCreateFeatures => "bulk_create_features",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Audit action recorded for this tool.
    pub fn action(&self) -> String {
        audit_action(self.name())
    }
}

fn audit_action(name: &str) -> String {
    format!("tool:{}", name)
}

/// Result envelope returned by every tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResponse {
    pub fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(message.into()),
        }
    }
}

/// The engine plus its audit channel, addressed by tool name.
pub struct Toolbox<S> {
    engine: HierarchyEngine<S>,
    audit: Arc<dyn AuditSink>,
}

impl<S: Clone> Clone for Toolbox<S> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            audit: self.audit.clone(),
        }
    }
}

impl<S: ItemStore> Toolbox<S> {
    pub fn new(engine: HierarchyEngine<S>, audit: Arc<dyn AuditSink>) -> Self {
        Self { engine, audit }
    }

    pub fn engine(&self) -> &HierarchyEngine<S> {
        &self.engine
    }

    /// Run the tool `name` with a raw JSON payload.
    pub fn call(&self, run_id: i64, name: &str, payload: Value) -> ToolResponse {
        self.audit.record(run_id, &audit_action(name), &payload);

        let Some(tool) = Tool::from_name(name) else {
            tracing::warn!(tool = name, "Unknown tool requested");
            return ToolResponse::failure(format!("unknown tool '{}'", name));
        };

        match self.run(tool, payload) {
            Ok(result) => ToolResponse::success(result),
            Err(EngineError::Storage(e)) => {
                tracing::error!(tool = name, "Storage error: {}", e);
                ToolResponse::failure(EngineError::Storage(e).to_string())
            }
            Err(e) => {
                tracing::debug!(tool = name, kind = e.kind(), "Tool rejected: {}", e);
                ToolResponse::failure(e.to_string())
            }
        }
    }

    /// Typed entry point: audit `tool` with `input` as its payload, then run
    /// `op` against the engine. Used by surfaces that decode requests
    /// themselves and want engine errors back instead of an envelope.
    pub fn invoke<I, T, F>(&self, run_id: i64, tool: Tool, input: &I, op: F) -> EngineResult<T>
    where
        I: Serialize,
        F: FnOnce(&HierarchyEngine<S>) -> EngineResult<T>,
    {
        let payload = serde_json::to_value(input).map_err(StoreError::from)?;
        self.audit.record(run_id, &tool.action(), &payload);
        op(&self.engine)
    }

    fn run(&self, tool: Tool, payload: Value) -> EngineResult<Value> {
        match tool {
            Tool::GetItem => {
                let input: GetItemInput = decode(payload)?;
                let lookup = input.lookup().map_err(EngineError::InvalidInput)?;
                encode(&self.engine.get_item(&lookup)?)
            }
            Tool::ListItems => {
                let input: ListItemsInput = decode(payload)?;
                encode(&self.engine.list_items(&input)?)
            }
            Tool::DeleteItem => {
                let input: DeleteItemInput = decode(payload)?;
                encode(&self.engine.delete_item(input.id)?)
            }
            Tool::MoveItem => {
                let input: MoveItemInput = decode(payload)?;
                encode(&self.engine.move_item(input.id, input.new_parent_id)?)
            }
            Tool::SummarizeProject => {
                let input: SummarizeProjectInput = decode(payload)?;
                encode(&self.engine.summarize_project(input.project_id, input.depth)?)
            }
            Tool::BulkCreateFeatures => {
                let input: BulkCreateFeaturesInput = decode(payload)?;
                encode(&self.engine.bulk_create_features(
                    input.project_id,
                    input.parent_id,
                    &input.items,
                )?)
            }
        }
    }
}

fn decode<T: DeserializeOwned>(payload: Value) -> EngineResult<T> {
    serde_json::from_value(payload).map_err(|e| EngineError::InvalidInput(e.to_string()))
}

fn encode<T: Serialize>(value: &T) -> EngineResult<Value> {
    serde_json::to_value(value).map_err(|e| EngineError::Storage(StoreError::from(e)))
}
