use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::engine::EngineError;
use crate::models::*;
use crate::tools::{Tool, ToolResponse, DEFAULT_RUN_ID};

type ApiResult<T> = Result<T, (StatusCode, String)>;

// ============================================================
// Error Handling
// ============================================================

/// Log an internal error and return a sanitized response to the client.
fn internal_error(e: impl std::fmt::Display) -> (StatusCode, String) {
    tracing::error!("Internal error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

/// Business-rule failures carry their message; storage faults are sanitized.
fn engine_error(e: EngineError) -> (StatusCode, String) {
    let status = match &e {
        EngineError::InvalidInput(_) | EngineError::InvalidParentType(_) => {
            StatusCode::BAD_REQUEST
        }
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::CycleDetected => StatusCode::CONFLICT,
        EngineError::Storage(_) => return internal_error(e),
    };
    tracing::warn!("Validation error: {}", e);
    (status, e.to_string())
}

fn require_project(state: &AppState, id: i64) -> ApiResult<Project> {
    state
        .db
        .get_project(id)
        .map_err(internal_error)?
        .ok_or((StatusCode::NOT_FOUND, "Project not found".to_string()))
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Projects
// ============================================================

pub async fn list_projects(State(state): State<AppState>) -> ApiResult<Json<Vec<Project>>> {
    state.db.list_projects().map(Json).map_err(internal_error)
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Project>> {
    require_project(&state, id).map(Json)
}

pub async fn create_project(
    State(state): State<AppState>,
    Json(input): Json<CreateProjectInput>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    if input.name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "name must not be empty".to_string()));
    }
    state
        .db
        .create_project(input)
        .map(|p| (StatusCode::CREATED, Json(p)))
        .map_err(internal_error)
}

pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateProjectInput>,
) -> ApiResult<Json<Project>> {
    if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err((StatusCode::BAD_REQUEST, "name must not be empty".to_string()));
    }
    state
        .db
        .update_project(id, input)
        .map_err(internal_error)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Project not found".to_string()))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if state.db.delete_project(id).map_err(internal_error)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, "Project not found".to_string()))
    }
}

// ============================================================
// Items
// ============================================================

#[derive(Debug, Deserialize)]
pub struct ListItemsQuery {
    #[serde(rename = "type")]
    pub item_type: Option<ItemType>,
    pub query: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub async fn list_items(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Query(query): Query<ListItemsQuery>,
) -> ApiResult<Json<Vec<ItemSummary>>> {
    let mut input = ListItemsInput::new(project_id);
    input.item_type = query.item_type;
    input.query = query.query;
    if let Some(limit) = query.limit {
        input.limit = limit;
    }
    if let Some(offset) = query.offset {
        input.offset = offset;
    }

    state
        .tools
        .invoke(DEFAULT_RUN_ID, Tool::ListItems, &input, |engine| {
            engine.list_items(&input)
        })
        .map(Json)
        .map_err(engine_error)
}

pub async fn create_item(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Json(input): Json<CreateItemInput>,
) -> ApiResult<(StatusCode, Json<Item>)> {
    require_project(&state, project_id)?;
    state
        .tools
        .engine()
        .create_item(project_id, input)
        .map(|item| (StatusCode::CREATED, Json(item)))
        .map_err(engine_error)
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub title: String,
}

pub async fn lookup_item(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Query(query): Query<LookupQuery>,
) -> ApiResult<Json<Item>> {
    let input = GetItemInput::by_key(project_id, query.item_type, query.title);
    get_audited(&state, &input)
}

pub async fn get_item(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Item>> {
    get_audited(&state, &GetItemInput::by_id(id))
}

fn get_audited(state: &AppState, input: &GetItemInput) -> ApiResult<Json<Item>> {
    state
        .tools
        .invoke(DEFAULT_RUN_ID, Tool::GetItem, input, |engine| {
            let lookup = input.lookup().map_err(EngineError::InvalidInput)?;
            engine.get_item(&lookup)
        })
        .map(Json)
        .map_err(engine_error)
}

pub async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<DeleteOutcome>> {
    state
        .tools
        .invoke(DEFAULT_RUN_ID, Tool::DeleteItem, &DeleteItemInput { id }, |engine| {
            engine.delete_item(id)
        })
        .map(Json)
        .map_err(engine_error)
}

#[derive(Debug, Deserialize)]
pub struct MoveItemBody {
    pub new_parent_id: i64,
}

pub async fn move_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<MoveItemBody>,
) -> ApiResult<Json<Item>> {
    let input = MoveItemInput {
        id,
        new_parent_id: body.new_parent_id,
    };
    state
        .tools
        .invoke(DEFAULT_RUN_ID, Tool::MoveItem, &input, |engine| {
            engine.move_item(input.id, input.new_parent_id)
        })
        .map(Json)
        .map_err(engine_error)
}

#[derive(Debug, Deserialize)]
pub struct BulkFeaturesBody {
    pub items: Vec<FeatureDraft>,
}

/// Features land in the parent's project.
pub async fn bulk_create_features(
    State(state): State<AppState>,
    Path(parent_id): Path<i64>,
    Json(body): Json<BulkFeaturesBody>,
) -> ApiResult<(StatusCode, Json<Vec<Item>>)> {
    // The project id is not known until the parent is read.
    let payload = json!({ "parent_id": parent_id, "items": &body.items });
    state
        .tools
        .invoke(DEFAULT_RUN_ID, Tool::BulkCreateFeatures, &payload, |engine| {
            let parent = engine.get_item(&ItemLookup::Id(parent_id))?;
            engine.bulk_create_features(parent.project_id, parent.id, &body.items)
        })
        .map(|created| (StatusCode::CREATED, Json(created)))
        .map_err(|e| match e {
            EngineError::NotFound(_) => (StatusCode::NOT_FOUND, "parent not found".to_string()),
            e => engine_error(e),
        })
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub depth: Option<usize>,
}

pub async fn summarize_project(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<Json<ProjectSummary>> {
    let input = SummarizeProjectInput {
        project_id,
        depth: query.depth.unwrap_or(DEFAULT_SUMMARY_DEPTH),
    };
    state
        .tools
        .invoke(DEFAULT_RUN_ID, Tool::SummarizeProject, &input, |engine| {
            engine.summarize_project(input.project_id, input.depth)
        })
        .map(Json)
        .map_err(engine_error)
}

// ============================================================
// Tools
// ============================================================

#[derive(Debug, Deserialize)]
pub struct ToolQuery {
    #[serde(default)]
    pub run_id: i64,
}

/// Always 200: failures travel inside the envelope.
pub async fn call_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ToolQuery>,
    Json(payload): Json<Value>,
) -> Json<ToolResponse> {
    Json(state.tools.call(query.run_id, &name, payload))
}
