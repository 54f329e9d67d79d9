// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batched cascading deletion of document collections.
use tracing::debug;

use crate::traits::{BatchOp, DocumentStore, FieldMutation, WriteBatch};
use crate::types::{Collection, SpaceId, UserId};

/// Delete every document in a collection, one bounded batch at a time.
///
/// Each iteration re-issues the same bounded query: the previous commit removed all
/// returned documents, so the next call surfaces the next slice. Iterations are strictly
/// sequential, the next one only starting once the current commit has resolved, so an
/// arbitrarily large collection is drained without unbounded call-stack growth and with
/// at most one batch in flight.
///
/// The first failed commit aborts the drain and the store error propagates unchanged;
/// batches committed before the failure stay deleted. Deletion is atomic within one batch
/// only, never across batches. Running against an already-empty collection performs zero
/// writes, so a retried cascade is a no-op for the slices it already drained.
pub async fn delete_collection<S>(store: &S, collection: &Collection) -> Result<(), S::Error>
where
    S: DocumentStore,
{
    let limit = store.batch_limit();

    loop {
        let ids = store.list_documents(collection, limit).await?;
        if ids.is_empty() {
            return Ok(());
        }

        let mut batch = store.batch();
        for id in ids {
            batch.stage(BatchOp::Delete {
                collection: collection.clone(),
                id,
            });
        }

        let staged = batch.staged();
        batch.commit().await?;

        debug!(collection = %collection, staged, "deleted batch");
    }
}

/// Remove a space back-reference from the given user profiles.
///
/// Updates are sliced into chunks of the store's batch limit, so any number of profiles
/// can be scrubbed without overrunning a single commit. A profile which no longer lists
/// the space is unaffected, so re-running a partially applied scrub converges.
pub async fn scrub_space_from_profiles<S>(
    store: &S,
    space: &SpaceId,
    profiles: &[UserId],
) -> Result<(), S::Error>
where
    S: DocumentStore,
{
    for chunk in profiles.chunks(store.batch_limit()) {
        let mut batch = store.batch();
        for user in chunk {
            batch.stage(BatchOp::Update {
                collection: Collection::Users,
                id: user.clone().into(),
                mutation: FieldMutation::RemoveSpaceId {
                    space: space.clone(),
                },
            });
        }
        batch.commit().await?;

        debug!(space = %space, scrubbed = chunk.len(), "removed space from profiles");
    }

    Ok(())
}
