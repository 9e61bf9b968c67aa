use std::sync::Arc;

use farmgate_core::engine::{CheckError, TupleReader};
use farmgate_core::tuple::{SnapshotToken, Tuple, TupleFilter};
use farmgate_storage::RelationshipStore;

/// Exposes a relationship store to the check and lookup engines.
pub struct StoreTupleReader<S: RelationshipStore> {
    store: Arc<S>,
}

impl<S: RelationshipStore> StoreTupleReader<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: RelationshipStore> TupleReader for StoreTupleReader<S> {
    async fn read_tuples(
        &self,
        filter: &TupleFilter,
        snapshot: Option<SnapshotToken>,
    ) -> Result<Vec<Tuple>, CheckError> {
        self.store
            .read(filter, snapshot, None)
            .await
            .map_err(|e| CheckError::StoreUnavailable(e.to_string()))
    }
}
