use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use farmgate_core::tuple::SnapshotToken;
use farmgate_storage::{RelationshipStore, StorageError};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
    /// Reflects every write committed before the request started.
    FullyConsistent,
    /// Accepts a revision pinned within the staleness window.
    BoundedStaleness,
    AtLeastAsFresh(SnapshotToken),
    AtExactSnapshot(SnapshotToken),
}

/// Turns a consistency requirement into the revision a request reads at.
#[derive(Debug)]
pub struct ConsistencyController {
    staleness_window: Duration,
    pinned: Mutex<Option<(SnapshotToken, Instant)>>,
}

impl ConsistencyController {
    pub fn new(staleness_window: Duration) -> Self {
        Self {
            staleness_window,
            pinned: Mutex::new(None),
        }
    }

    pub async fn resolve<S: RelationshipStore>(
        &self,
        store: &S,
        consistency: Consistency,
    ) -> Result<SnapshotToken, StorageError> {
        match consistency {
            Consistency::FullyConsistent => self.pin_latest(store).await,
            Consistency::BoundedStaleness => match self.cached() {
                Some((token, pinned_at)) if pinned_at.elapsed() <= self.staleness_window => {
                    Ok(token)
                }
                _ => self.pin_latest(store).await,
            },
            Consistency::AtLeastAsFresh(min) => {
                if let Some((token, _)) = self.cached()
                    && token >= min
                {
                    return Ok(token);
                }
                let latest = self.pin_latest(store).await?;
                ensure_not_ahead(min, latest)?;
                Ok(latest)
            }
            Consistency::AtExactSnapshot(token) => {
                let latest = store.snapshot().await?;
                ensure_not_ahead(token, latest)?;
                Ok(token)
            }
        }
    }

    fn cached(&self) -> Option<(SnapshotToken, Instant)> {
        *self.pinned.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn pin_latest<S: RelationshipStore>(
        &self,
        store: &S,
    ) -> Result<SnapshotToken, StorageError> {
        let latest = store.snapshot().await?;
        let mut pinned = self.pinned.lock().unwrap_or_else(PoisonError::into_inner);
        match *pinned {
            Some((token, _)) if token > latest => {}
            _ => *pinned = Some((latest, Instant::now())),
        }
        Ok(latest)
    }
}

fn ensure_not_ahead(requested: SnapshotToken, latest: SnapshotToken) -> Result<(), StorageError> {
    if requested > latest {
        return Err(StorageError::SnapshotAhead {
            requested: requested.value(),
            current: latest.value(),
        });
    }
    Ok(())
}
