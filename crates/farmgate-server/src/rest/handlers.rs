use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use farmgate_core::tuple::{
    ObjectRef, RelationshipUpdate, SnapshotToken, SubjectRef, Tuple, TupleFilter,
};
use farmgate_storage::{RelationshipStore, SchemaStore};

use crate::consistency::Consistency;
use crate::error::ApiError;
use crate::service::{CheckPermissionInput, Decision, LookupResourcesInput};

use super::AppState;
use super::types::*;

fn resolve_consistency(
    requested: Option<&ConsistencyRequest>,
    default: Consistency,
) -> Result<Consistency, ApiError> {
    Ok(match requested {
        None => default,
        Some(ConsistencyRequest::Full) => Consistency::FullyConsistent,
        Some(ConsistencyRequest::BoundedStaleness) => Consistency::BoundedStaleness,
        Some(ConsistencyRequest::AtLeastAsFresh { token }) => {
            Consistency::AtLeastAsFresh(parse_token(token)?)
        }
        Some(ConsistencyRequest::AtExactSnapshot { token }) => {
            Consistency::AtExactSnapshot(parse_token(token)?)
        }
    })
}

fn parse_token(token: &str) -> Result<SnapshotToken, ApiError> {
    token
        .parse()
        .map(SnapshotToken::new)
        .map_err(|_| ApiError::InvalidRequest(format!("invalid snapshot token: '{token}'")))
}

pub async fn check_permission<S>(
    State(state): State<AppState<S>>,
    Json(req): Json<CheckPermissionRequest>,
) -> Result<Json<CheckPermissionResponse>, ApiError>
where
    S: RelationshipStore + SchemaStore + 'static,
{
    let input = CheckPermissionInput {
        resource: ObjectRef::new(req.resource_type, req.resource_id),
        permission: req.permission,
        subject: ObjectRef::new(req.subject_type, req.subject_id),
        consistency: resolve_consistency(
            req.consistency.as_ref(),
            Consistency::FullyConsistent,
        )?,
    };

    let output = state.service.check_permission(input).await?;
    Ok(Json(CheckPermissionResponse {
        allowed: output.allowed,
        checked_at: output.snapshot.to_string(),
    }))
}

pub async fn authorize<S>(
    State(state): State<AppState<S>>,
    Json(req): Json<AuthorizeRequest>,
) -> Response
where
    S: RelationshipStore + SchemaStore + 'static,
{
    let decision = state
        .service
        .authorize(
            &req.subject_id,
            &req.resource_type,
            &req.resource_id,
            &req.permission,
        )
        .await;

    match decision {
        Decision::Allow => StatusCode::NO_CONTENT.into_response(),
        Decision::Deny => (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({ "error": "forbidden" })),
        )
            .into_response(),
    }
}

pub async fn lookup_resources<S>(
    State(state): State<AppState<S>>,
    Json(req): Json<LookupResourcesRequest>,
) -> Result<Json<LookupResourcesResponse>, ApiError>
where
    S: RelationshipStore + SchemaStore + 'static,
{
    let input = LookupResourcesInput {
        resource_type: req.resource_type,
        permission: req.permission,
        subject: ObjectRef::new(req.subject_type, req.subject_id),
        consistency: resolve_consistency(
            req.consistency.as_ref(),
            Consistency::BoundedStaleness,
        )?,
        limit: req.limit,
    };

    let resource_ids = state.service.lookup_resources(input).await?;
    Ok(Json(LookupResourcesResponse { resource_ids }))
}

pub async fn write_relationships<S>(
    State(state): State<AppState<S>>,
    Json(req): Json<WriteRelationshipsRequest>,
) -> Result<Json<WriteRelationshipsResponse>, ApiError>
where
    S: RelationshipStore + SchemaStore + 'static,
{
    let updates = req
        .updates
        .into_iter()
        .map(to_update)
        .collect::<Result<Vec<_>, _>>()?;

    let token = state.service.write_relationships(&updates).await?;
    Ok(Json(WriteRelationshipsResponse {
        written_at: token.to_string(),
    }))
}

fn to_update(update: RelationshipUpdateRequest) -> Result<RelationshipUpdate, ApiError> {
    let subject = match update.subject_relation {
        Some(rel) => SubjectRef::userset(update.subject_type, update.subject_id, rel),
        None => SubjectRef::direct(update.subject_type, update.subject_id),
    };
    let tuple = Tuple::new(
        ObjectRef::new(update.resource_type, update.resource_id),
        update.relation,
        subject,
    );

    match update.operation.as_str() {
        "touch" => Ok(RelationshipUpdate::touch(tuple)),
        "delete" => Ok(RelationshipUpdate::delete(tuple)),
        other => Err(ApiError::InvalidRequest(format!(
            "unknown operation: {other}"
        ))),
    }
}

pub async fn read_relationships<S>(
    State(state): State<AppState<S>>,
    Json(req): Json<ReadRelationshipsRequest>,
) -> Result<Json<ReadRelationshipsResponse>, ApiError>
where
    S: RelationshipStore + SchemaStore + 'static,
{
    let filter = req
        .filter
        .map(|f| TupleFilter {
            object_type: f.resource_type,
            object_id: f.resource_id,
            relation: f.relation,
            subject_type: f.subject_type,
            subject_id: f.subject_id,
            subject_relation: None,
        })
        .unwrap_or_default();
    let consistency =
        resolve_consistency(req.consistency.as_ref(), Consistency::FullyConsistent)?;

    let tuples = state
        .service
        .read_relationships(&filter, consistency, req.limit)
        .await?;

    let relationships = tuples
        .into_iter()
        .map(|t| RelationshipResponse {
            resource_type: t.object.object_type,
            resource_id: t.object.object_id,
            relation: t.relation,
            subject_type: t.subject.subject_type,
            subject_id: t.subject.subject_id,
            subject_relation: t.subject.subject_relation,
        })
        .collect();
    Ok(Json(ReadRelationshipsResponse { relationships }))
}

pub async fn write_schema<S>(
    State(state): State<AppState<S>>,
    Json(req): Json<WriteSchemaRequest>,
) -> Result<Json<WriteSchemaResponse>, ApiError>
where
    S: RelationshipStore + SchemaStore + 'static,
{
    let output = state.service.write_schema(&req.schema, req.force).await?;
    Ok(Json(WriteSchemaResponse {
        breaking_changes_overridden: output.breaking_changes_overridden,
        orphans_removed: output.orphans_removed,
    }))
}

pub async fn read_schema<S>(State(state): State<AppState<S>>) -> Result<Response, ApiError>
where
    S: RelationshipStore + SchemaStore + 'static,
{
    Ok(match state.service.read_schema().await? {
        Some(schema) => Json(ReadSchemaResponse { schema }).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "no schema has been written" })),
        )
            .into_response(),
    })
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}
