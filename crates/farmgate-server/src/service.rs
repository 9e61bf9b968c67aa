use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use farmgate_core::engine::{CheckEngine, CheckRequest, EngineConfig, LookupEngine, LookupRequest};
use farmgate_core::schema::types::Schema;
use farmgate_core::schema::{SchemaLimits, compile, detect_breaking_changes, validate_schema_limits};
use farmgate_core::tuple::{
    ObjectRef, RelationshipOperation, RelationshipUpdate, SnapshotToken, SubjectRef, Tuple,
    TupleFilter,
};
use farmgate_storage::{RelationshipStore, SchemaStore, StorageError, run_gc_cycle};

use crate::adapter::StoreTupleReader;
use crate::audit;
use crate::consistency::{Consistency, ConsistencyController};
use crate::error::ApiError;
use crate::metrics::Metrics;

/// Subject type used by the authorization gate.
const GATE_SUBJECT_TYPE: &str = "user";

const DEFAULT_STALENESS_WINDOW: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct CheckPermissionInput {
    pub resource: ObjectRef,
    pub permission: String,
    pub subject: ObjectRef,
    pub consistency: Consistency,
}

#[derive(Debug)]
pub struct CheckPermissionOutput {
    pub allowed: bool,
    pub snapshot: SnapshotToken,
}

#[derive(Debug)]
pub struct LookupResourcesInput {
    pub resource_type: String,
    pub permission: String,
    pub subject: ObjectRef,
    pub consistency: Consistency,
    pub limit: Option<usize>,
}

#[derive(Debug)]
pub struct WriteSchemaOutput {
    pub breaking_changes_overridden: bool,
    pub orphans_removed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// Permission service bound to one store. Built once at start-up and shared
/// with the handlers behind an `Arc`.
pub struct AuthzService<S: RelationshipStore + SchemaStore> {
    store: Arc<S>,
    schema: RwLock<Arc<Schema>>,
    schema_writes: tokio::sync::Mutex<()>,
    engine_config: EngineConfig,
    schema_limits: SchemaLimits,
    consistency: ConsistencyController,
    metrics: Option<Arc<Metrics>>,
}

impl<S: RelationshipStore + SchemaStore> AuthzService<S> {
    pub fn new(
        store: Arc<S>,
        schema: Schema,
        engine_config: EngineConfig,
        schema_limits: SchemaLimits,
    ) -> Self {
        Self {
            store,
            schema: RwLock::new(Arc::new(schema)),
            schema_writes: tokio::sync::Mutex::new(()),
            engine_config,
            schema_limits,
            consistency: ConsistencyController::new(DEFAULT_STALENESS_WINDOW),
            metrics: None,
        }
    }

    pub fn with_staleness_window(mut self, window: Duration) -> Self {
        self.consistency = ConsistencyController::new(window);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Builds the service from the schema already in the store, or compiles
    /// and stores `default_schema` when the store holds none. Either schema
    /// must fit `schema_limits`.
    pub async fn bootstrap(
        store: Arc<S>,
        default_schema: &str,
        engine_config: EngineConfig,
        schema_limits: SchemaLimits,
    ) -> Result<Self, ApiError> {
        let (schema, already_stored) = match store.read_schema().await? {
            Some(text) => (compile(&text)?, true),
            None => (compile(default_schema)?, false),
        };
        validate_schema_limits(&schema, &schema_limits).map_err(ApiError::Limits)?;

        if !already_stored {
            store.write_schema(default_schema).await?;
            tracing::info!(types = schema.types.len(), "bootstrap schema stored");
        }

        Ok(Self::new(store, schema, engine_config, schema_limits))
    }

    pub fn schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub async fn write_schema(
        &self,
        definition: &str,
        force: bool,
    ) -> Result<WriteSchemaOutput, ApiError> {
        let new_schema = compile(definition)?;
        validate_schema_limits(&new_schema, &self.schema_limits).map_err(ApiError::Limits)?;

        let _serialized = self.schema_writes.lock().await;

        let breaking = detect_breaking_changes(&self.schema(), &new_schema);
        if !breaking.is_empty() && !force {
            tracing::info!(changes = breaking.len(), "breaking schema write refused");
            return Err(ApiError::BreakingChanges(breaking));
        }
        let breaking_changes_overridden = !breaking.is_empty();

        self.within("schema write", self.store.write_schema(definition))
            .await?;

        let new_schema = Arc::new(new_schema);
        *self.schema.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&new_schema);

        let orphans_removed = if breaking_changes_overridden {
            run_gc_cycle(self.store.as_ref(), &new_schema).await?
        } else {
            0
        };

        audit::audit_schema_write(force, breaking_changes_overridden, orphans_removed);

        Ok(WriteSchemaOutput {
            breaking_changes_overridden,
            orphans_removed,
        })
    }

    pub async fn read_schema(&self) -> Result<Option<String>, ApiError> {
        self.within("schema read", self.store.read_schema()).await
    }

    pub async fn write_relationships(
        &self,
        updates: &[RelationshipUpdate],
    ) -> Result<SnapshotToken, ApiError> {
        let schema = self.schema();
        for update in updates {
            validate_update(&schema, update)?;
        }

        let token = self.within("relationship write", self.store.write(updates)).await?;

        let touch_count = updates
            .iter()
            .filter(|u| u.operation == RelationshipOperation::Touch)
            .count();
        audit::audit_relationship_write(touch_count, updates.len() - touch_count, &token);

        Ok(token)
    }

    pub async fn write_relationship(
        &self,
        resource_type: &str,
        resource_id: &str,
        relation: &str,
        subject_type: &str,
        subject_id: &str,
        operation: RelationshipOperation,
    ) -> Result<SnapshotToken, ApiError> {
        let tuple = Tuple::new(
            ObjectRef::new(resource_type, resource_id),
            relation,
            SubjectRef::direct(subject_type, subject_id),
        );
        let update = match operation {
            RelationshipOperation::Touch => RelationshipUpdate::touch(tuple),
            RelationshipOperation::Delete => RelationshipUpdate::delete(tuple),
        };
        self.write_relationships(&[update]).await
    }

    pub async fn read_relationships(
        &self,
        filter: &TupleFilter,
        consistency: Consistency,
        limit: Option<usize>,
    ) -> Result<Vec<Tuple>, ApiError> {
        let snapshot = self.resolve(consistency).await?;
        self.within(
            "relationship read",
            self.store.read(filter, Some(snapshot), limit),
        )
        .await
    }

    pub async fn check_permission(
        &self,
        input: CheckPermissionInput,
    ) -> Result<CheckPermissionOutput, ApiError> {
        let snapshot = self.resolve(input.consistency).await?;
        let engine = CheckEngine::new(
            self.reader(),
            self.schema(),
            self.engine_config.clone(),
        );

        let result = engine
            .check(&CheckRequest {
                resource: input.resource,
                permission: input.permission,
                subject: input.subject,
                snapshot: Some(snapshot),
            })
            .await?;

        if let Some(metrics) = &self.metrics {
            metrics.record_check(result.allowed);
        }

        Ok(CheckPermissionOutput {
            allowed: result.allowed,
            snapshot,
        })
    }

    /// Authorization gate. Always fully consistent, and any failure denies.
    pub async fn authorize(
        &self,
        subject_id: &str,
        resource_type: &str,
        resource_id: &str,
        permission: &str,
    ) -> Decision {
        let subject = ObjectRef::new(GATE_SUBJECT_TYPE, subject_id);
        let resource = ObjectRef::new(resource_type, resource_id);
        let result = self
            .check_permission(CheckPermissionInput {
                resource: resource.clone(),
                permission: permission.to_string(),
                subject: subject.clone(),
                consistency: Consistency::FullyConsistent,
            })
            .await;

        match result {
            Ok(output) if output.allowed => Decision::Allow,
            Ok(_) => {
                audit::audit_access_denied(
                    &subject.to_string(),
                    &resource.to_string(),
                    permission,
                    None,
                );
                Decision::Deny
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    %subject,
                    %resource,
                    permission,
                    "authorization failed, denying"
                );
                audit::audit_access_denied(
                    &subject.to_string(),
                    &resource.to_string(),
                    permission,
                    Some(&e.to_string()),
                );
                Decision::Deny
            }
        }
    }

    pub async fn lookup_resources(
        &self,
        input: LookupResourcesInput,
    ) -> Result<Vec<String>, ApiError> {
        let snapshot = self.resolve(input.consistency).await?;
        let engine = LookupEngine::new(
            self.reader(),
            self.schema(),
            self.engine_config.clone(),
        );

        let resources = engine
            .lookup(&LookupRequest {
                resource_type: input.resource_type,
                permission: input.permission,
                subject: input.subject,
                snapshot: Some(snapshot),
            })
            .await?;

        if let Some(metrics) = &self.metrics {
            metrics.record_lookup();
        }

        let limit = input.limit.unwrap_or(usize::MAX);
        Ok(resources
            .into_iter()
            .take(limit)
            .map(|r| r.object_id)
            .collect())
    }

    fn reader(&self) -> Arc<StoreTupleReader<S>> {
        Arc::new(StoreTupleReader::new(Arc::clone(&self.store)))
    }

    async fn resolve(&self, consistency: Consistency) -> Result<SnapshotToken, ApiError> {
        self.within(
            "snapshot",
            self.consistency.resolve(self.store.as_ref(), consistency),
        )
        .await
    }

    async fn within<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, ApiError> {
        let timeout = self.engine_config.store_timeout;
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                tracing::warn!(
                    operation,
                    timeout_ms = timeout.as_millis() as u64,
                    "store operation timed out"
                );
                Err(ApiError::StoreUnavailable(format!(
                    "{operation} timed out after {}ms",
                    timeout.as_millis()
                )))
            }
        }
    }
}

fn validate_update(schema: &Schema, update: &RelationshipUpdate) -> Result<(), ApiError> {
    let tuple = &update.tuple;
    let invalid = |reason: String| ApiError::InvalidRelationship {
        tuple: tuple.to_string(),
        reason,
    };

    if tuple.object.object_id.is_empty() || tuple.subject.subject_id.is_empty() {
        return Err(invalid("object and subject ids must be non-empty".to_string()));
    }
    if update.operation == RelationshipOperation::Delete {
        return Ok(());
    }

    let type_def = schema
        .get_type(&tuple.object.object_type)
        .ok_or_else(|| invalid(format!("type '{}' is not declared", tuple.object.object_type)))?;

    let Some(relation) = type_def.get_relation(&tuple.relation) else {
        let reason = if type_def.get_permission(&tuple.relation).is_some() {
            format!("'{}' is a permission, not a relation", tuple.relation)
        } else {
            format!(
                "relation '{}' is not declared on '{}'",
                tuple.relation, type_def.name
            )
        };
        return Err(invalid(reason));
    };

    if !relation.allows(
        &tuple.subject.subject_type,
        tuple.subject.subject_relation.as_deref(),
    ) {
        let subject_type = match &tuple.subject.subject_relation {
            Some(rel) => format!("{}#{rel}", tuple.subject.subject_type),
            None => tuple.subject.subject_type.clone(),
        };
        return Err(invalid(format!(
            "subject type '{subject_type}' is not allowed on '{}#{}'",
            type_def.name, relation.name
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use farmgate_core::engine::CheckError;
    use farmgate_core::schema::HARVEST_SCHEMA;
    use farmgate_storage::InMemoryStore;

    async fn make_service() -> AuthzService<InMemoryStore> {
        AuthzService::bootstrap(
            Arc::new(InMemoryStore::new()),
            HARVEST_SCHEMA,
            EngineConfig::default(),
            SchemaLimits::default(),
        )
        .await
        .unwrap()
    }

    async fn touch(
        service: &AuthzService<InMemoryStore>,
        resource: &str,
        relation: &str,
        subject: &str,
    ) -> SnapshotToken {
        let (resource_type, resource_id) = resource.split_once(':').unwrap();
        let (subject_type, subject_id) = subject.split_once(':').unwrap();
        service
            .write_relationship(
                resource_type,
                resource_id,
                relation,
                subject_type,
                subject_id,
                RelationshipOperation::Touch,
            )
            .await
            .unwrap()
    }

    async fn check(
        service: &AuthzService<InMemoryStore>,
        user: &str,
        farm: &str,
        permission: &str,
    ) -> bool {
        service
            .check_permission(CheckPermissionInput {
                resource: ObjectRef::new("farm", farm),
                permission: permission.to_string(),
                subject: ObjectRef::new("user", user),
                consistency: Consistency::FullyConsistent,
            })
            .await
            .unwrap()
            .allowed
    }

    #[tokio::test]
    async fn bootstrap_stores_default_schema() {
        let service = make_service().await;

        let stored = service.read_schema().await.unwrap();

        assert_eq!(stored.as_deref(), Some(HARVEST_SCHEMA));
        assert!(service.schema().get_type("harvest_entry").is_some());
    }

    #[tokio::test]
    async fn bootstrap_prefers_stored_schema() {
        let store = Arc::new(InMemoryStore::new());
        store
            .write_schema("definition user {} definition barn { relation keeper: user }")
            .await
            .unwrap();

        let service = AuthzService::bootstrap(
            store,
            HARVEST_SCHEMA,
            EngineConfig::default(),
            SchemaLimits::default(),
        )
        .await
        .unwrap();

        assert!(service.schema().get_type("barn").is_some());
        assert!(service.schema().get_type("farm").is_none());
    }

    #[tokio::test]
    async fn bootstrap_enforces_limits_on_stored_schema() {
        let store = Arc::new(InMemoryStore::new());
        store
            .write_schema("definition user {} definition barn { relation keeper: user }")
            .await
            .unwrap();

        let result = AuthzService::bootstrap(
            store,
            "definition user {}",
            EngineConfig::default(),
            SchemaLimits {
                max_types: 1,
                ..SchemaLimits::default()
            },
        )
        .await;

        assert!(matches!(result, Err(ApiError::Limits(_))));
    }

    #[tokio::test]
    async fn bootstrap_rejects_oversized_default_schema_without_storing_it() {
        let store = Arc::new(InMemoryStore::new());

        let result = AuthzService::bootstrap(
            Arc::clone(&store),
            HARVEST_SCHEMA,
            EngineConfig::default(),
            SchemaLimits {
                max_types: 1,
                ..SchemaLimits::default()
            },
        )
        .await;

        assert!(matches!(result, Err(ApiError::Limits(_))));
        assert!(store.read_schema().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn check_permission_through_organization() {
        let service = make_service().await;
        touch(&service, "organization:org_1", "member", "user:alice").await;
        touch(&service, "farm:farm_1", "organization", "organization:org_1").await;

        assert!(check(&service, "alice", "farm_1", "view").await);
        assert!(!check(&service, "alice", "farm_1", "manage").await);
    }

    #[tokio::test]
    async fn check_permission_returns_resolved_snapshot() {
        let service = make_service().await;
        let token = touch(&service, "farm:farm_1", "viewer", "user:bob").await;

        let output = service
            .check_permission(CheckPermissionInput {
                resource: ObjectRef::new("farm", "farm_1"),
                permission: "view".to_string(),
                subject: ObjectRef::new("user", "bob"),
                consistency: Consistency::FullyConsistent,
            })
            .await
            .unwrap();

        assert!(output.allowed);
        assert_eq!(output.snapshot, token);
    }

    #[tokio::test]
    async fn check_permission_unknown_permission_is_an_error() {
        let service = make_service().await;

        let result = service
            .check_permission(CheckPermissionInput {
                resource: ObjectRef::new("farm", "farm_1"),
                permission: "harvest".to_string(),
                subject: ObjectRef::new("user", "bob"),
                consistency: Consistency::FullyConsistent,
            })
            .await;

        assert!(matches!(
            result,
            Err(ApiError::Check(CheckError::PermissionNotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn write_rejects_undeclared_type() {
        let service = make_service().await;

        let result = service
            .write_relationship(
                "barn",
                "b1",
                "owner",
                "user",
                "alice",
                RelationshipOperation::Touch,
            )
            .await;

        assert!(
            matches!(result, Err(ApiError::InvalidRelationship { ref reason, .. }) if reason.contains("barn"))
        );
    }

    #[tokio::test]
    async fn write_rejects_permission_as_relation() {
        let service = make_service().await;

        let result = service
            .write_relationship(
                "farm",
                "farm_1",
                "view",
                "user",
                "alice",
                RelationshipOperation::Touch,
            )
            .await;

        assert!(
            matches!(result, Err(ApiError::InvalidRelationship { ref reason, .. }) if reason.contains("permission"))
        );
    }

    #[tokio::test]
    async fn write_rejects_disallowed_subject_type() {
        let service = make_service().await;

        let result = service
            .write_relationship(
                "farm",
                "farm_1",
                "owner",
                "organization",
                "org_1",
                RelationshipOperation::Touch,
            )
            .await;

        assert!(
            matches!(result, Err(ApiError::InvalidRelationship { ref reason, .. }) if reason.contains("organization"))
        );
    }

    #[tokio::test]
    async fn write_rejects_empty_ids() {
        let service = make_service().await;

        let result = service
            .write_relationship("farm", "", "owner", "user", "alice", RelationshipOperation::Touch)
            .await;

        assert!(matches!(result, Err(ApiError::InvalidRelationship { .. })));
    }

    #[tokio::test]
    async fn invalid_update_rejects_whole_batch() {
        let service = make_service().await;
        let good = RelationshipUpdate::touch(Tuple::new(
            ObjectRef::new("farm", "farm_1"),
            "viewer",
            SubjectRef::direct("user", "alice"),
        ));
        let bad = RelationshipUpdate::touch(Tuple::new(
            ObjectRef::new("farm", "farm_1"),
            "gardener",
            SubjectRef::direct("user", "alice"),
        ));

        let result = service.write_relationships(&[good, bad]).await;

        assert!(result.is_err());
        assert!(!check(&service, "alice", "farm_1", "view").await);
    }

    #[tokio::test]
    async fn delete_revokes_access() {
        let service = make_service().await;
        touch(&service, "farm:farm_1", "editor", "user:carol").await;
        assert!(check(&service, "carol", "farm_1", "edit").await);

        service
            .write_relationship(
                "farm",
                "farm_1",
                "editor",
                "user",
                "carol",
                RelationshipOperation::Delete,
            )
            .await
            .unwrap();

        assert!(!check(&service, "carol", "farm_1", "edit").await);
    }

    #[tokio::test]
    async fn read_relationships_at_exact_snapshot() {
        let service = make_service().await;
        let first = touch(&service, "farm:farm_1", "viewer", "user:alice").await;
        touch(&service, "farm:farm_1", "viewer", "user:bob").await;

        let at_first = service
            .read_relationships(
                &TupleFilter::default(),
                Consistency::AtExactSnapshot(first),
                None,
            )
            .await
            .unwrap();
        let latest = service
            .read_relationships(&TupleFilter::default(), Consistency::FullyConsistent, None)
            .await
            .unwrap();

        assert_eq!(at_first.len(), 1);
        assert_eq!(latest.len(), 2);
    }

    #[tokio::test]
    async fn authorize_allows_and_denies() {
        let service = make_service().await;
        touch(&service, "farm:farm_1", "owner", "user:alice").await;

        assert_eq!(
            service.authorize("alice", "farm", "farm_1", "manage").await,
            Decision::Allow
        );
        assert_eq!(
            service.authorize("bob", "farm", "farm_1", "manage").await,
            Decision::Deny
        );
    }

    #[tokio::test]
    async fn authorize_fails_closed_on_errors() {
        let service = make_service().await;
        touch(&service, "farm:farm_1", "owner", "user:alice").await;

        assert_eq!(
            service.authorize("alice", "barn", "b1", "manage").await,
            Decision::Deny
        );
        assert_eq!(
            service.authorize("alice", "farm", "farm_1", "harvest").await,
            Decision::Deny
        );
    }

    #[tokio::test]
    async fn authorize_sees_write_immediately() {
        let service = make_service()
            .await
            .with_staleness_window(Duration::from_secs(3600));
        service
            .lookup_resources(LookupResourcesInput {
                resource_type: "farm".to_string(),
                permission: "view".to_string(),
                subject: ObjectRef::new("user", "dave"),
                consistency: Consistency::BoundedStaleness,
                limit: None,
            })
            .await
            .unwrap();

        touch(&service, "farm:farm_9", "viewer", "user:dave").await;

        assert_eq!(
            service.authorize("dave", "farm", "farm_9", "view").await,
            Decision::Allow
        );
    }

    #[tokio::test]
    async fn lookup_resources_honours_limit() {
        let service = make_service().await;
        for farm in ["farm_3", "farm_1", "farm_2"] {
            touch(&service, &format!("farm:{farm}"), "viewer", "user:erin").await;
        }

        let input = |limit| LookupResourcesInput {
            resource_type: "farm".to_string(),
            permission: "view".to_string(),
            subject: ObjectRef::new("user", "erin"),
            consistency: Consistency::FullyConsistent,
            limit,
        };

        let all = service.lookup_resources(input(None)).await.unwrap();
        let first_two = service.lookup_resources(input(Some(2))).await.unwrap();

        assert_eq!(all, vec!["farm_1", "farm_2", "farm_3"]);
        assert_eq!(first_two, vec!["farm_1", "farm_2"]);
    }

    #[tokio::test]
    async fn schema_write_refuses_breaking_change_without_force() {
        let service = make_service().await;

        let result = service
            .write_schema("definition user {} definition farm { relation owner: user }", false)
            .await;

        assert!(matches!(result, Err(ApiError::BreakingChanges(ref c)) if !c.is_empty()));
        assert!(service.schema().get_type("harvest_entry").is_some());
    }

    #[tokio::test]
    async fn forced_schema_write_collects_orphans() {
        let service = make_service().await;
        touch(&service, "farm:farm_1", "owner", "user:alice").await;
        touch(&service, "farm:farm_1", "viewer", "user:bob").await;

        let output = service
            .write_schema(
                "definition user {} definition farm { relation owner: user permission manage = owner }",
                true,
            )
            .await
            .unwrap();

        assert!(output.breaking_changes_overridden);
        assert_eq!(output.orphans_removed, 1);
        let left = service
            .read_relationships(&TupleFilter::default(), Consistency::FullyConsistent, None)
            .await
            .unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].relation, "owner");
    }

    #[tokio::test]
    async fn additive_schema_write_is_not_breaking() {
        let service = make_service().await;
        let extended = format!("{HARVEST_SCHEMA}\ndefinition barn {{ relation keeper: user }}");

        let output = service.write_schema(&extended, false).await.unwrap();

        assert!(!output.breaking_changes_overridden);
        assert!(service.schema().get_type("barn").is_some());
    }

    #[tokio::test]
    async fn schema_write_enforces_limits() {
        let service = AuthzService::new(
            Arc::new(InMemoryStore::new()),
            compile("definition user {}").unwrap(),
            EngineConfig::default(),
            SchemaLimits {
                max_types: 1,
                ..SchemaLimits::default()
            },
        );

        let result = service
            .write_schema("definition user {} definition barn {}", false)
            .await;

        assert!(matches!(result, Err(ApiError::Limits(_))));
    }

    #[tokio::test]
    async fn invalid_schema_text_is_rejected() {
        let service = make_service().await;

        let result = service
            .write_schema("definition farm { permission view = a - b }", false)
            .await;

        assert!(matches!(result, Err(ApiError::Schema(_))));
    }

    #[tokio::test]
    async fn metrics_record_checks_and_lookups() {
        let metrics = Arc::new(Metrics::new());
        let service = make_service().await.with_metrics(Arc::clone(&metrics));
        touch(&service, "farm:farm_1", "viewer", "user:alice").await;

        check(&service, "alice", "farm_1", "view").await;
        check(&service, "alice", "farm_1", "manage").await;
        service
            .lookup_resources(LookupResourcesInput {
                resource_type: "farm".to_string(),
                permission: "view".to_string(),
                subject: ObjectRef::new("user", "alice"),
                consistency: Consistency::BoundedStaleness,
                limit: None,
            })
            .await
            .unwrap();

        assert_eq!(metrics.checks_allowed(), 1);
        assert_eq!(metrics.checks_denied(), 1);
        assert_eq!(metrics.lookups(), 1);
    }
}
