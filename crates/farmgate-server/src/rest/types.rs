use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CheckPermissionRequest {
    pub resource_type: String,
    pub resource_id: String,
    pub permission: String,
    pub subject_type: String,
    pub subject_id: String,
    #[serde(default)]
    pub consistency: Option<ConsistencyRequest>,
}

#[derive(Debug, Serialize)]
pub struct CheckPermissionResponse {
    pub allowed: bool,
    pub checked_at: String,
}

/// Gate request. The subject is always a `user`.
#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    pub subject_id: String,
    pub resource_type: String,
    pub resource_id: String,
    pub permission: String,
}

#[derive(Debug, Deserialize)]
pub struct LookupResourcesRequest {
    pub resource_type: String,
    pub permission: String,
    pub subject_type: String,
    pub subject_id: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub consistency: Option<ConsistencyRequest>,
}

#[derive(Debug, Serialize)]
pub struct LookupResourcesResponse {
    pub resource_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct WriteRelationshipsRequest {
    pub updates: Vec<RelationshipUpdateRequest>,
}

#[derive(Debug, Deserialize)]
pub struct RelationshipUpdateRequest {
    pub operation: String,
    pub resource_type: String,
    pub resource_id: String,
    pub relation: String,
    pub subject_type: String,
    pub subject_id: String,
    #[serde(default)]
    pub subject_relation: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WriteRelationshipsResponse {
    pub written_at: String,
}

#[derive(Debug, Deserialize)]
pub struct ReadRelationshipsRequest {
    #[serde(default)]
    pub filter: Option<RelationshipFilterRequest>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub consistency: Option<ConsistencyRequest>,
}

#[derive(Debug, Deserialize)]
pub struct RelationshipFilterRequest {
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub relation: Option<String>,
    pub subject_type: Option<String>,
    pub subject_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReadRelationshipsResponse {
    pub relationships: Vec<RelationshipResponse>,
}

#[derive(Debug, Serialize)]
pub struct RelationshipResponse {
    pub resource_type: String,
    pub resource_id: String,
    pub relation: String,
    pub subject_type: String,
    pub subject_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_relation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WriteSchemaRequest {
    pub schema: String,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct WriteSchemaResponse {
    pub breaking_changes_overridden: bool,
    pub orphans_removed: usize,
}

#[derive(Debug, Serialize)]
pub struct ReadSchemaResponse {
    pub schema: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsistencyRequest {
    Full,
    BoundedStaleness,
    AtLeastAsFresh { token: String },
    AtExactSnapshot { token: String },
}
