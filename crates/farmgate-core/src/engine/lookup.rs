use std::collections::{BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::schema::types::{Member, RelationDef, RewriteRule, Schema};
use crate::tuple::{ObjectRef, SnapshotToken, SubjectRef, Tuple, TupleFilter};

use super::{
    CheckEngine, CheckError, CheckRequest, EngineConfig, TupleReader, read_within, require_member,
};

type Ids = BTreeSet<String>;
type LookupFuture<'a> = Pin<Box<dyn Future<Output = Result<Ids, CheckError>> + Send + 'a>>;

#[derive(Debug, Clone)]
pub struct LookupRequest {
    pub resource_type: String,
    pub permission: String,
    pub subject: ObjectRef,
    pub snapshot: Option<SnapshotToken>,
}

/// Per-lookup state. `assumed` holds the current approximation for every
/// (type, member) being computed on the stack; `recursed` marks the ones
/// whose approximation was read before it was final.
struct LookupContext<'a> {
    subject: &'a ObjectRef,
    snapshot: Option<SnapshotToken>,
    assumed: HashMap<(String, String), Ids>,
    recursed: HashSet<(String, String)>,
}

/// Finds every resource of a type on which a subject holds a permission by
/// walking the rewrite rules backwards from the subject. Candidates found by
/// the walk are confirmed by a check under the same depth budget, so a
/// resource is listed only when a check on it would allow.
pub struct LookupEngine<T: TupleReader> {
    reader: Arc<T>,
    schema: Arc<Schema>,
    config: EngineConfig,
    checker: CheckEngine<T>,
}

impl<T: TupleReader> LookupEngine<T> {
    pub fn new(reader: Arc<T>, schema: Arc<Schema>, config: EngineConfig) -> Self {
        let checker = CheckEngine::new(Arc::clone(&reader), Arc::clone(&schema), config.clone());
        Self {
            reader,
            schema,
            config,
            checker,
        }
    }

    /// Returns matching resources sorted by id, without duplicates.
    pub async fn lookup(&self, request: &LookupRequest) -> Result<Vec<ObjectRef>, CheckError> {
        require_member(&self.schema, &request.resource_type, &request.permission)?;

        let mut ctx = LookupContext {
            subject: &request.subject,
            snapshot: request.snapshot,
            assumed: HashMap::new(),
            recursed: HashSet::new(),
        };

        let candidates = self
            .lookup_member(&request.resource_type, &request.permission, &mut ctx)
            .await?;
        let considered = candidates.len();
        let found = self.confirm(request, candidates).await?;

        tracing::debug!(
            resource_type = %request.resource_type,
            permission = %request.permission,
            subject = %request.subject,
            considered,
            found = found.len(),
            "resources looked up"
        );

        Ok(found)
    }

    /// Keeps the candidates a check allows, preserving id order. Grants that
    /// lie beyond `max_depth` are dropped; store failures abort the lookup.
    async fn confirm(
        &self,
        request: &LookupRequest,
        candidates: Ids,
    ) -> Result<Vec<ObjectRef>, CheckError> {
        let checks = candidates.into_iter().map(|id| async move {
            let resource = ObjectRef::new(&request.resource_type, id);
            let outcome = self
                .checker
                .check(&CheckRequest {
                    resource: resource.clone(),
                    permission: request.permission.clone(),
                    subject: request.subject.clone(),
                    snapshot: request.snapshot,
                })
                .await;
            (resource, outcome)
        });
        let mut outcomes =
            stream::iter(checks).buffered(self.config.max_concurrent_branches.max(1));

        let mut confirmed = Vec::new();
        while let Some((resource, outcome)) = outcomes.next().await {
            match outcome {
                Ok(result) if result.allowed => confirmed.push(resource),
                Ok(_) => {}
                Err(CheckError::EvaluationTooDeep(max_depth)) => {
                    tracing::warn!(%resource, max_depth, "lookup candidate beyond max depth");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(confirmed)
    }

    /// Ids of `object_type` objects on which the subject holds `member`.
    /// Recursive members are solved by iterating from the empty set until
    /// the result stops growing. A pair already on the stack answers with its
    /// approximation, so the stack never exceeds the schema's member count.
    fn lookup_member<'a>(
        &'a self,
        object_type: &'a str,
        member: &'a str,
        ctx: &'a mut LookupContext<'_>,
    ) -> LookupFuture<'a> {
        Box::pin(async move {
            let key = (object_type.to_string(), member.to_string());
            if let Some(partial) = ctx.assumed.get(&key) {
                let partial = partial.clone();
                ctx.recursed.insert(key);
                return Ok(partial);
            }

            let Some(resolved) = self
                .schema
                .get_type(object_type)
                .and_then(|type_def| type_def.member(member))
            else {
                return Ok(Ids::new());
            };

            ctx.assumed.insert(key.clone(), Ids::new());
            let found = loop {
                ctx.recursed.remove(&key);
                let found = match resolved {
                    Member::Permission(perm) => {
                        self.lookup_rule(object_type, &perm.rule, ctx).await?
                    }
                    Member::Relation(rel) => self.lookup_relation(object_type, rel, ctx).await?,
                };
                if !ctx.recursed.contains(&key) || ctx.assumed.get(&key) == Some(&found) {
                    break found;
                }
                ctx.assumed.insert(key.clone(), found);
            };
            ctx.assumed.remove(&key);
            ctx.recursed.remove(&key);

            Ok(found)
        })
    }

    fn lookup_rule<'a>(
        &'a self,
        object_type: &'a str,
        rule: &'a RewriteRule,
        ctx: &'a mut LookupContext<'_>,
    ) -> LookupFuture<'a> {
        Box::pin(async move {
            match rule {
                RewriteRule::This(name) => self.lookup_member(object_type, name, ctx).await,
                RewriteRule::Union(children) => {
                    let mut found = Ids::new();
                    for child in children {
                        found.extend(self.lookup_rule(object_type, child, ctx).await?);
                    }
                    Ok(found)
                }
                RewriteRule::Intersection(children) => {
                    let mut children = children.iter();
                    let Some(first) = children.next() else {
                        return Ok(Ids::new());
                    };
                    let mut found = self.lookup_rule(object_type, first, ctx).await?;
                    for child in children {
                        if found.is_empty() {
                            break;
                        }
                        let other = self.lookup_rule(object_type, child, ctx).await?;
                        found.retain(|id| other.contains(id));
                    }
                    Ok(found)
                }
                RewriteRule::Arrow(tupleset_rel, computed) => {
                    self.lookup_arrow(object_type, tupleset_rel, computed, ctx)
                        .await
                }
            }
        })
    }

    /// Direct grants first, then grants through every subject-set type the
    /// relation accepts.
    async fn lookup_relation(
        &self,
        object_type: &str,
        relation: &RelationDef,
        ctx: &mut LookupContext<'_>,
    ) -> Result<Ids, CheckError> {
        let subject = SubjectRef::from(ctx.subject.clone());
        let mut found = self
            .resources_pointing_at(object_type, &relation.name, &subject, ctx.snapshot)
            .await?;

        for subject_type in &relation.subject_types {
            let Some(ref set_relation) = subject_type.relation else {
                continue;
            };
            let holders = self
                .lookup_member(&subject_type.type_name, set_relation, ctx)
                .await?;
            for holder in holders {
                let userset = SubjectRef::userset(&subject_type.type_name, holder, set_relation);
                found.extend(
                    self.resources_pointing_at(object_type, &relation.name, &userset, ctx.snapshot)
                        .await?,
                );
            }
        }

        Ok(found)
    }

    async fn lookup_arrow(
        &self,
        object_type: &str,
        tupleset_rel: &str,
        computed: &str,
        ctx: &mut LookupContext<'_>,
    ) -> Result<Ids, CheckError> {
        let Some(tupleset) = self
            .schema
            .get_type(object_type)
            .and_then(|type_def| type_def.get_relation(tupleset_rel))
        else {
            return Ok(Ids::new());
        };

        let mut found = Ids::new();
        for target_type in &tupleset.subject_types {
            if target_type.relation.is_some() {
                continue;
            }
            let targets = self
                .lookup_member(&target_type.type_name, computed, ctx)
                .await?;
            for target in targets {
                let subject = SubjectRef::direct(&target_type.type_name, target);
                found.extend(
                    self.resources_pointing_at(object_type, tupleset_rel, &subject, ctx.snapshot)
                        .await?,
                );
            }
        }

        Ok(found)
    }

    async fn resources_pointing_at(
        &self,
        object_type: &str,
        relation: &str,
        subject: &SubjectRef,
        snapshot: Option<SnapshotToken>,
    ) -> Result<Ids, CheckError> {
        let filter = TupleFilter::resources_of(object_type, relation, subject);
        let tuples: Vec<Tuple> =
            read_within(&*self.reader, &filter, snapshot, self.config.store_timeout).await?;
        Ok(tuples.into_iter().map(|t| t.object.object_id).collect())
    }
}
