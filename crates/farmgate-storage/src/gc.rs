use farmgate_core::schema::types::Schema;
use farmgate_core::tuple::{RelationshipUpdate, TupleFilter};

use crate::traits::{RelationshipStore, StorageError};

/// Deletes tuples whose type or relation no longer exists in `schema`, which
/// happens after a forced breaking schema write. Returns how many were removed.
pub async fn run_gc_cycle<S: RelationshipStore>(
    store: &S,
    schema: &Schema,
) -> Result<usize, StorageError> {
    let all_tuples = store.read(&TupleFilter::default(), None, None).await?;

    let orphans: Vec<RelationshipUpdate> = all_tuples
        .into_iter()
        .filter(|tuple| {
            schema
                .get_type(&tuple.object.object_type)
                .and_then(|td| td.get_relation(&tuple.relation))
                .is_none()
        })
        .map(RelationshipUpdate::delete)
        .collect();

    let count = orphans.len();
    if count > 0 {
        let revision = store.write(&orphans).await?;
        tracing::info!(removed = count, %revision, "orphaned relationships collected");
    }

    Ok(count)
}
