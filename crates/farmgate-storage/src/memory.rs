use std::sync::{Arc, Mutex, MutexGuard};

use farmgate_core::tuple::{
    RelationshipOperation, RelationshipUpdate, SnapshotToken, Tuple, TupleFilter,
};

use crate::traits::{RelationshipStore, SchemaStore, StorageError};

const ACTIVE_TX_ID: u64 = u64::MAX;

/// One version of a tuple, alive for revisions in `[created_tx_id, deleted_tx_id)`.
#[derive(Debug, Clone)]
struct StoredTuple {
    tuple: Tuple,
    created_tx_id: u64,
    deleted_tx_id: u64,
}

impl StoredTuple {
    fn is_active(&self) -> bool {
        self.deleted_tx_id == ACTIVE_TX_ID
    }

    fn visible_at(&self, snapshot: u64) -> bool {
        self.created_tx_id <= snapshot && self.deleted_tx_id > snapshot
    }
}

#[derive(Debug, Default)]
struct InnerState {
    current_tx: u64,
    oldest_readable: u64,
    tuples: Vec<StoredTuple>,
    schema: Option<String>,
}

impl InnerState {
    fn resolve_snapshot(&self, snapshot: Option<SnapshotToken>) -> Result<u64, StorageError> {
        let Some(token) = snapshot else {
            return Ok(self.current_tx);
        };
        let requested = token.value();
        if requested > self.current_tx {
            return Err(StorageError::SnapshotAhead {
                requested,
                current: self.current_tx,
            });
        }
        if requested < self.oldest_readable {
            return Err(StorageError::SnapshotCompacted {
                requested,
                oldest: self.oldest_readable,
            });
        }
        Ok(requested)
    }

    fn touch(&mut self, tuple: &Tuple, tx_id: u64) {
        if self
            .tuples
            .iter()
            .any(|stored| stored.is_active() && stored.tuple == *tuple)
        {
            return;
        }
        self.tuples.push(StoredTuple {
            tuple: tuple.clone(),
            created_tx_id: tx_id,
            deleted_tx_id: ACTIVE_TX_ID,
        });
    }

    fn delete(&mut self, tuple: &Tuple, tx_id: u64) {
        for stored in &mut self.tuples {
            if stored.is_active() && stored.tuple == *tuple {
                stored.deleted_tx_id = tx_id;
            }
        }
    }
}

/// MVCC relationship and schema store held in process memory.
///
/// Clones share state. Writers are serialized by a single mutex; every write
/// batch is one revision.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<InnerState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, InnerState>, StorageError> {
        self.state
            .lock()
            .map_err(|_| StorageError::Internal("store lock poisoned".to_string()))
    }
}

impl RelationshipStore for InMemoryStore {
    async fn write(&self, updates: &[RelationshipUpdate]) -> Result<SnapshotToken, StorageError> {
        let mut state = self.lock()?;

        if updates.is_empty() {
            return Ok(SnapshotToken::new(state.current_tx));
        }

        state.current_tx += 1;
        let tx_id = state.current_tx;

        for update in updates {
            match update.operation {
                RelationshipOperation::Touch => state.touch(&update.tuple, tx_id),
                RelationshipOperation::Delete => state.delete(&update.tuple, tx_id),
            }
        }

        tracing::debug!(revision = tx_id, updates = updates.len(), "relationships written");

        Ok(SnapshotToken::new(tx_id))
    }

    async fn read(
        &self,
        filter: &TupleFilter,
        snapshot: Option<SnapshotToken>,
        limit: Option<usize>,
    ) -> Result<Vec<Tuple>, StorageError> {
        let state = self.lock()?;
        let snap = state.resolve_snapshot(snapshot)?;

        let results = state
            .tuples
            .iter()
            .filter(|stored| stored.visible_at(snap) && filter.matches(&stored.tuple))
            .map(|stored| stored.tuple.clone())
            .take(limit.unwrap_or(usize::MAX))
            .collect();

        Ok(results)
    }

    async fn snapshot(&self) -> Result<SnapshotToken, StorageError> {
        let state = self.lock()?;
        Ok(SnapshotToken::new(state.current_tx))
    }

    async fn compact(&self, before: SnapshotToken) -> Result<usize, StorageError> {
        let mut state = self.lock()?;
        let cutoff = before.value();
        if cutoff > state.current_tx {
            return Err(StorageError::SnapshotAhead {
                requested: cutoff,
                current: state.current_tx,
            });
        }

        let before_len = state.tuples.len();
        state
            .tuples
            .retain(|stored| stored.is_active() || stored.deleted_tx_id > cutoff);
        state.oldest_readable = state.oldest_readable.max(cutoff);
        let removed = before_len - state.tuples.len();

        tracing::debug!(cutoff, removed, "store compacted");

        Ok(removed)
    }
}

impl SchemaStore for InMemoryStore {
    async fn write_schema(&self, definition: &str) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.schema = Some(definition.to_string());
        Ok(())
    }

    async fn read_schema(&self) -> Result<Option<String>, StorageError> {
        let state = self.lock()?;
        Ok(state.schema.clone())
    }
}
