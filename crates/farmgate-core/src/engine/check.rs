use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};

use crate::schema::types::{Member, RewriteRule, Schema};
use crate::tuple::{ObjectRef, SnapshotToken, Tuple, TupleFilter};

use super::{CheckError, EngineConfig, TupleReader, read_within, require_member};

type EvalFuture<'a> = Pin<Box<dyn Future<Output = Result<bool, CheckError>> + Send + 'a>>;

#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub resource: ObjectRef,
    pub permission: String,
    pub subject: ObjectRef,
    pub snapshot: Option<SnapshotToken>,
}

#[derive(Debug)]
pub struct CheckResult {
    pub allowed: bool,
}

#[derive(Clone)]
struct CheckContext<'a> {
    subject: &'a ObjectRef,
    snapshot: Option<SnapshotToken>,
    depth: usize,
    visited: HashSet<(ObjectRef, String)>,
}

impl CheckContext<'_> {
    fn descend(&self, object: &ObjectRef, member: &str) -> Self {
        let mut visited = self.visited.clone();
        visited.insert((object.clone(), member.to_string()));
        Self {
            subject: self.subject,
            snapshot: self.snapshot,
            depth: self.depth + 1,
            visited,
        }
    }
}

pub struct CheckEngine<T: TupleReader> {
    reader: Arc<T>,
    schema: Arc<Schema>,
    config: EngineConfig,
}

impl<T: TupleReader> CheckEngine<T> {
    pub fn new(reader: Arc<T>, schema: Arc<Schema>, config: EngineConfig) -> Self {
        Self {
            reader,
            schema,
            config,
        }
    }

    pub async fn check(&self, request: &CheckRequest) -> Result<CheckResult, CheckError> {
        require_member(
            &self.schema,
            &request.resource.object_type,
            &request.permission,
        )?;

        let ctx = CheckContext {
            subject: &request.subject,
            snapshot: request.snapshot,
            depth: 0,
            visited: HashSet::new(),
        };

        let allowed = self
            .check_member(&request.resource, &request.permission, &ctx)
            .await?;

        tracing::debug!(
            resource = %request.resource,
            permission = %request.permission,
            subject = %request.subject,
            allowed,
            "permission checked"
        );

        Ok(CheckResult { allowed })
    }

    /// Evaluates a relation or permission named `member` on `object`.
    fn check_member<'a>(
        &'a self,
        object: &'a ObjectRef,
        member: &'a str,
        ctx: &'a CheckContext<'a>,
    ) -> EvalFuture<'a> {
        Box::pin(async move {
            if ctx.visited.contains(&(object.clone(), member.to_string())) {
                tracing::debug!(%object, member, "cycle detected, treating as denied");
                return Ok(false);
            }
            if ctx.depth >= self.config.max_depth {
                tracing::warn!(
                    %object,
                    member,
                    max_depth = self.config.max_depth,
                    "evaluation too deep"
                );
                return Err(CheckError::EvaluationTooDeep(self.config.max_depth));
            }

            let Some(resolved) = self
                .schema
                .get_type(&object.object_type)
                .and_then(|type_def| type_def.member(member))
            else {
                tracing::debug!(%object, member, "member not declared, treating as denied");
                return Ok(false);
            };

            let child_ctx = ctx.descend(object, member);
            match resolved {
                Member::Permission(perm) => {
                    self.evaluate_rule(&perm.rule, object, &child_ctx).await
                }
                Member::Relation(_) => self.check_relation(object, member, &child_ctx).await,
            }
        })
    }

    fn evaluate_rule<'a>(
        &'a self,
        rule: &'a RewriteRule,
        object: &'a ObjectRef,
        ctx: &'a CheckContext<'a>,
    ) -> EvalFuture<'a> {
        Box::pin(async move {
            match rule {
                RewriteRule::This(name) => self.check_member(object, name, ctx).await,
                RewriteRule::Union(children) => {
                    self.short_circuit(
                        children
                            .iter()
                            .map(|child| self.evaluate_rule(child, object, ctx)),
                        true,
                    )
                    .await
                }
                RewriteRule::Intersection(children) => {
                    self.short_circuit(
                        children
                            .iter()
                            .map(|child| self.evaluate_rule(child, object, ctx)),
                        false,
                    )
                    .await
                }
                RewriteRule::Arrow(tupleset_rel, computed) => {
                    self.check_arrow(object, tupleset_rel, computed, ctx).await
                }
            }
        })
    }

    async fn check_relation(
        &self,
        object: &ObjectRef,
        relation: &str,
        ctx: &CheckContext<'_>,
    ) -> Result<bool, CheckError> {
        let tuples = self
            .read(&TupleFilter::subjects_of(object, relation), ctx.snapshot)
            .await?;

        if tuples.iter().any(|t| t.subject.is_object(ctx.subject)) {
            return Ok(true);
        }

        let usersets: Vec<(ObjectRef, String)> = tuples
            .into_iter()
            .filter_map(|t| {
                let rel = t.subject.subject_relation.clone()?;
                Some((t.subject.object(), rel))
            })
            .collect();

        self.short_circuit(
            usersets
                .iter()
                .map(|(set_object, set_relation)| self.check_member(set_object, set_relation, ctx)),
            true,
        )
        .await
    }

    /// OR over every object reached through `tupleset_rel`; no targets means
    /// nothing is inherited.
    async fn check_arrow(
        &self,
        object: &ObjectRef,
        tupleset_rel: &str,
        computed: &str,
        ctx: &CheckContext<'_>,
    ) -> Result<bool, CheckError> {
        let tuples = self
            .read(&TupleFilter::subjects_of(object, tupleset_rel), ctx.snapshot)
            .await?;

        let targets: Vec<ObjectRef> = tuples
            .iter()
            .filter(|t| t.subject.subject_relation.is_none())
            .map(|t| t.subject.object())
            .collect();

        self.short_circuit(
            targets
                .iter()
                .map(|target| self.check_member(target, computed, ctx)),
            true,
        )
        .await
    }

    /// Runs branches concurrently and stops at the first one yielding
    /// `decisive`. Remaining in-flight branches are dropped. A decisive
    /// result wins over errors from other branches, so the outcome does not
    /// depend on completion order.
    async fn short_circuit<'a>(
        &self,
        branches: impl Iterator<Item = EvalFuture<'a>> + Send,
        decisive: bool,
    ) -> Result<bool, CheckError> {
        let mut pending = branches;
        let mut running = FuturesUnordered::new();
        for branch in pending.by_ref().take(self.config.max_concurrent_branches.max(1)) {
            running.push(branch);
        }

        let mut first_error = None;
        while let Some(result) = running.next().await {
            match result {
                Ok(value) if value == decisive => return Ok(decisive),
                Ok(_) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
            if let Some(branch) = pending.next() {
                running.push(branch);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(!decisive),
        }
    }

    async fn read(
        &self,
        filter: &TupleFilter,
        snapshot: Option<SnapshotToken>,
    ) -> Result<Vec<Tuple>, CheckError> {
        read_within(&*self.reader, filter, snapshot, self.config.store_timeout).await
    }
}
