mod check;
mod lookup;

pub use check::{CheckEngine, CheckRequest, CheckResult};
pub use lookup::{LookupEngine, LookupRequest};

use std::future::Future;
use std::time::Duration;

use crate::schema::types::Schema;
use crate::tuple::{SnapshotToken, Tuple, TupleFilter};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckError {
    #[error("type not found: {0}")]
    TypeNotFound(String),

    #[error("permission '{permission}' not found on type '{type_name}'")]
    PermissionNotFound {
        type_name: String,
        permission: String,
    },

    #[error("evaluation exceeded max depth of {0}")]
    EvaluationTooDeep(usize),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_depth: usize,
    pub max_concurrent_branches: usize,
    pub store_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            max_concurrent_branches: 10,
            store_timeout: Duration::from_secs(5),
        }
    }
}

pub trait TupleReader: Send + Sync {
    fn read_tuples(
        &self,
        filter: &TupleFilter,
        snapshot: Option<SnapshotToken>,
    ) -> impl Future<Output = Result<Vec<Tuple>, CheckError>> + Send;
}

/// Validates the entry point of a check or lookup. Only the requested
/// type and member are strict; names reached while walking the graph are not.
fn require_member(schema: &Schema, object_type: &str, member: &str) -> Result<(), CheckError> {
    let type_def = schema
        .get_type(object_type)
        .ok_or_else(|| CheckError::TypeNotFound(object_type.to_string()))?;

    type_def
        .member(member)
        .map(|_| ())
        .ok_or_else(|| CheckError::PermissionNotFound {
            type_name: object_type.to_string(),
            permission: member.to_string(),
        })
}

async fn read_within<T: TupleReader>(
    reader: &T,
    filter: &TupleFilter,
    snapshot: Option<SnapshotToken>,
    timeout: Duration,
) -> Result<Vec<Tuple>, CheckError> {
    match tokio::time::timeout(timeout, reader.read_tuples(filter, snapshot)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                timeout_ms = timeout.as_millis() as u64,
                ?filter,
                "relationship read timed out"
            );
            Err(CheckError::StoreUnavailable(format!(
                "read timed out after {}ms",
                timeout.as_millis()
            )))
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::time::Duration;

    use super::{CheckError, TupleReader};
    use crate::tuple::{ObjectRef, SnapshotToken, SubjectRef, Tuple, TupleFilter};

    pub struct TestStore {
        tuples: Vec<Tuple>,
    }

    impl TestStore {
        pub fn new(tuples: Vec<Tuple>) -> Self {
            Self { tuples }
        }
    }

    impl TupleReader for TestStore {
        async fn read_tuples(
            &self,
            filter: &TupleFilter,
            _snapshot: Option<SnapshotToken>,
        ) -> Result<Vec<Tuple>, CheckError> {
            Ok(self
                .tuples
                .iter()
                .filter(|t| filter.matches(t))
                .cloned()
                .collect())
        }
    }

    pub struct FailingStore;

    impl TupleReader for FailingStore {
        async fn read_tuples(
            &self,
            _filter: &TupleFilter,
            _snapshot: Option<SnapshotToken>,
        ) -> Result<Vec<Tuple>, CheckError> {
            Err(CheckError::StoreUnavailable("connection refused".to_string()))
        }
    }

    pub struct SlowStore(pub Duration);

    impl TupleReader for SlowStore {
        async fn read_tuples(
            &self,
            _filter: &TupleFilter,
            _snapshot: Option<SnapshotToken>,
        ) -> Result<Vec<Tuple>, CheckError> {
            tokio::time::sleep(self.0).await;
            Ok(Vec::new())
        }
    }

    pub fn tuple(object: &str, relation: &str, subject: &str) -> Tuple {
        let (object_type, object_id) = object.split_once(':').unwrap();
        let (subject, subject_relation) = match subject.split_once('#') {
            Some((s, r)) => (s, Some(r)),
            None => (subject, None),
        };
        let (subject_type, subject_id) = subject.split_once(':').unwrap();
        let subject = match subject_relation {
            Some(rel) => SubjectRef::userset(subject_type, subject_id, rel),
            None => SubjectRef::direct(subject_type, subject_id),
        };
        Tuple::new(ObjectRef::new(object_type, object_id), relation, subject)
    }
}
