mod handlers;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, State};
use axum::middleware;
use axum::response::Response;
use axum::routing::{get, post};
use farmgate_storage::{RelationshipStore, SchemaStore};

const MAX_REQUEST_BODY_SIZE: usize = 4 * 1024 * 1024; // 4 MB

use crate::metrics::{Metrics, metrics_handler};
use crate::service::AuthzService;

pub struct AppState<S: RelationshipStore + SchemaStore> {
    pub service: Arc<AuthzService<S>>,
    pub metrics: Arc<Metrics>,
}

impl<S: RelationshipStore + SchemaStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

async fn metrics_middleware<S: RelationshipStore + SchemaStore>(
    State(state): State<AppState<S>>,
    request: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> Response {
    state.metrics.record_request();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    if response.status().is_success() {
        state.metrics.record_success();
    } else {
        state.metrics.record_error();
    }
    tracing::debug!(
        %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "request handled"
    );

    response
}

pub fn create_router<S>(state: AppState<S>) -> Router
where
    S: RelationshipStore + SchemaStore + 'static,
{
    let metrics = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(Arc::clone(&state.metrics));

    Router::new()
        .route("/v1/permissions/check", post(handlers::check_permission))
        .route("/v1/permissions/authorize", post(handlers::authorize))
        .route(
            "/v1/permissions/resources",
            post(handlers::lookup_resources),
        )
        .route(
            "/v1/relationships/write",
            post(handlers::write_relationships),
        )
        .route("/v1/relationships/read", post(handlers::read_relationships))
        .route(
            "/v1/schema",
            post(handlers::write_schema).get(handlers::read_schema),
        )
        .route("/healthz", get(handlers::healthz))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_SIZE))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            metrics_middleware,
        ))
        .with_state(state)
        .merge(metrics)
}
