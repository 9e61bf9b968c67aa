use farmgate_core::tuple::{RelationshipUpdate, SnapshotToken, Tuple, TupleFilter};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("snapshot {requested} is ahead of current {current}")]
    SnapshotAhead { requested: u64, current: u64 },
    #[error("snapshot {requested} was compacted, oldest readable is {oldest}")]
    SnapshotCompacted { requested: u64, oldest: u64 },
    #[error("internal storage error: {0}")]
    Internal(String),
}

pub trait RelationshipStore: Send + Sync {
    /// Applies every update in one revision and returns it. Updates to the
    /// same tuple resolve in order, so the last one wins.
    fn write(
        &self,
        updates: &[RelationshipUpdate],
    ) -> impl Future<Output = Result<SnapshotToken, StorageError>> + Send;

    fn read(
        &self,
        filter: &TupleFilter,
        snapshot: Option<SnapshotToken>,
        limit: Option<usize>,
    ) -> impl Future<Output = Result<Vec<Tuple>, StorageError>> + Send;

    fn snapshot(&self) -> impl Future<Output = Result<SnapshotToken, StorageError>> + Send;

    /// Drops tuple versions deleted at or before `before`. Reads at older
    /// snapshots fail afterwards.
    fn compact(
        &self,
        before: SnapshotToken,
    ) -> impl Future<Output = Result<usize, StorageError>> + Send;
}

pub trait SchemaStore: Send + Sync {
    fn write_schema(
        &self,
        definition: &str,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn read_schema(&self) -> impl Future<Output = Result<Option<String>, StorageError>> + Send;
}
