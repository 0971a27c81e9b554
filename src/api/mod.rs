mod handlers;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Settings;
use crate::db::Database;
use crate::engine::HierarchyEngine;
use crate::tools::Toolbox;

/// Shared handler state. Both fields wrap the same connection.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub tools: Toolbox<Database>,
}

impl AppState {
    /// Tool calls made over HTTP are persisted as run steps.
    pub fn new(db: Database) -> Self {
        let tools = Toolbox::new(HierarchyEngine::new(db.clone()), Arc::new(db.clone()));
        Self { db, tools }
    }
}

pub fn create_router(db: Database) -> Router {
    create_router_with_settings(db, &Settings::default())
}

pub fn create_router_with_settings(db: Database, settings: &Settings) -> Router {
    let api = Router::new()
        // Projects
        .route(
            "/projects",
            get(handlers::list_projects).post(handlers::create_project),
        )
        .route(
            "/projects/{id}",
            get(handlers::get_project)
                .put(handlers::update_project)
                .delete(handlers::delete_project),
        )
        .route(
            "/projects/{id}/items",
            get(handlers::list_items).post(handlers::create_item),
        )
        .route("/projects/{id}/items/lookup", get(handlers::lookup_item))
        .route("/projects/{id}/summary", get(handlers::summarize_project))
        // Items
        .route(
            "/items/{id}",
            get(handlers::get_item).delete(handlers::delete_item),
        )
        .route("/items/{id}/move", post(handlers::move_item))
        .route("/items/{id}/features", post(handlers::bulk_create_features))
        // Tool envelope
        .route("/tools/{name}", post(handlers::call_tool))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(settings.cors_origins.as_deref()))
        .with_state(AppState::new(db))
}

fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let Some(origins) = origins else {
        return CorsLayer::permissive();
    };

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
