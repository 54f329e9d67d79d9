// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reactive handlers cascading from document deletion events.
//!
//! The store invokes these after a delete has already happened; the event itself is
//! authoritative and is not re-validated. A handler that fails is eligible for store-level
//! retry, so both cascades are safe to re-run: draining an already-empty collection and
//! scrubbing an already-absent back-reference are no-ops.
use tracing::debug;

use crate::cascade::{delete_collection, scrub_space_from_profiles};
use crate::traits::{BatchOp, DocumentStore, WriteBatch};
use crate::types::{Collection, SpaceId, StorageBoxId};

/// Cascade fired when a space document has been deleted.
///
/// Drains the space's storage box and medication sub-collections, then removes the space
/// from every user profile still holding a back-reference to it. The two halves are
/// independent; no invariant depends on their relative order since the space itself is
/// already gone.
pub async fn on_space_deleted<S>(store: &S, space: &SpaceId) -> Result<(), S::Error>
where
    S: DocumentStore,
{
    debug!(%space, "space deleted, starting cascade");

    delete_collection(
        store,
        &Collection::StorageBoxes {
            space: space.clone(),
        },
    )
    .await?;
    delete_collection(
        store,
        &Collection::Medications {
            space: space.clone(),
        },
    )
    .await?;

    let profiles = store.profiles_containing_space(space).await?;
    debug!(%space, profiles = profiles.len(), "scrubbing membership back-references");
    scrub_space_from_profiles(store, space, &profiles).await?;

    debug!(%space, "space cascade complete");
    Ok(())
}

/// Cascade fired when a storage box document has been deleted.
///
/// Deletes all medications in the same space which still reference the deleted box.
/// Medications have no descendants, so no further recursion is required.
pub async fn on_storage_box_deleted<S>(
    store: &S,
    space: &SpaceId,
    storage_box: &StorageBoxId,
) -> Result<(), S::Error>
where
    S: DocumentStore,
{
    let orphaned = store.medications_in_storage_box(space, storage_box).await?;
    if orphaned.is_empty() {
        debug!(%space, %storage_box, "no orphaned medications");
        return Ok(());
    }

    debug!(%space, %storage_box, orphaned = orphaned.len(), "deleting orphaned medications");

    let collection = Collection::Medications {
        space: space.clone(),
    };
    for chunk in orphaned.chunks(store.batch_limit()) {
        let mut batch = store.batch();
        for id in chunk {
            batch.stage(BatchOp::Delete {
                collection: collection.clone(),
                id: id.clone().into(),
            });
        }
        batch.commit().await?;
    }

    Ok(())
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::types::{Medication, MedicationId, Role, StorageBox, UserId};

    fn medication(storage_box: Option<&str>) -> Medication {
        Medication {
            name: "aspirin".to_string(),
            storage_box_id: storage_box.map(Into::into),
        }
    }

    #[tokio::test]
    async fn space_cascade_drains_both_sub_collections() {
        let store = MemoryStore::with_batch_limit(100);
        let space = SpaceId::from("space_1");

        for i in 0..3 {
            store.insert_storage_box(
                &space,
                StorageBoxId::new(format!("box_{i}")),
                StorageBox::default(),
            );
        }
        // 150 medications at a cap of 100: exactly two commits against this collection.
        for i in 0..150 {
            store.insert_medication(
                &space,
                MedicationId::new(format!("med_{i:03}")),
                medication(None),
            );
        }

        on_space_deleted(&store, &space).await.unwrap();

        let medications = Collection::Medications {
            space: space.clone(),
        };
        let storage_boxes = Collection::StorageBoxes {
            space: space.clone(),
        };
        assert_eq!(store.collection_len(&medications), 0);
        assert_eq!(store.collection_len(&storage_boxes), 0);

        // One commit for the boxes, two for the medications, none for profiles.
        assert_eq!(store.commits(), 3);
    }

    #[tokio::test]
    async fn space_cascade_scrubs_profile_back_references() {
        let store = MemoryStore::with_batch_limit(100);
        let space = SpaceId::from("space_1");
        let other_space = SpaceId::from("space_2");

        let anna = UserId::from("anna");
        let bert = UserId::from("bert");
        store.insert_user(anna.clone(), "anna@example.org");
        store.insert_user(bert.clone(), "bert@example.org");
        store.insert_space(
            space.clone(),
            [(anna.clone(), Role::Owner), (bert.clone(), Role::Member)],
        );
        store.insert_space(other_space.clone(), [(anna.clone(), Role::Owner)]);

        on_space_deleted(&store, &space).await.unwrap();

        let anna_profile = store.user(&anna).unwrap();
        assert!(!anna_profile.space_ids.contains(&space));
        // Memberships in other spaces are untouched.
        assert!(anna_profile.space_ids.contains(&other_space));
        assert!(!store.user(&bert).unwrap().space_ids.contains(&space));
    }

    #[tokio::test]
    async fn space_cascade_is_idempotent() {
        let store = MemoryStore::with_batch_limit(10);
        let space = SpaceId::from("space_1");

        let anna = UserId::from("anna");
        store.insert_user(anna.clone(), "anna@example.org");
        store.insert_space(space.clone(), [(anna.clone(), Role::Owner)]);
        store.insert_medication(&space, MedicationId::from("med_1"), medication(None));

        on_space_deleted(&store, &space).await.unwrap();
        let commits_after_first_run = store.commits();

        // A store-level retry of the same event finds nothing left to do.
        on_space_deleted(&store, &space).await.unwrap();
        assert_eq!(store.commits(), commits_after_first_run);
    }

    #[tokio::test]
    async fn storage_box_cascade_deletes_only_referencing_medications() {
        let store = MemoryStore::with_batch_limit(100);
        let space = SpaceId::from("space_1");
        let deleted_box = StorageBoxId::from("box_1");

        store.insert_medication(&space, MedicationId::from("med_1"), medication(Some("box_1")));
        store.insert_medication(&space, MedicationId::from("med_2"), medication(Some("box_1")));
        store.insert_medication(&space, MedicationId::from("med_3"), medication(Some("box_2")));
        store.insert_medication(&space, MedicationId::from("med_4"), medication(None));

        on_storage_box_deleted(&store, &space, &deleted_box)
            .await
            .unwrap();

        let medications = Collection::Medications {
            space: space.clone(),
        };
        assert_eq!(store.collection_len(&medications), 2);
        assert_eq!(store.commits(), 1);

        // Re-running the cascade finds no matches and commits nothing.
        on_storage_box_deleted(&store, &space, &deleted_box)
            .await
            .unwrap();
        assert_eq!(store.commits(), 1);
    }

    #[tokio::test]
    async fn storage_box_cascade_slices_by_batch_cap() {
        let store = MemoryStore::with_batch_limit(10);
        let space = SpaceId::from("space_1");

        for i in 0..25 {
            store.insert_medication(
                &space,
                MedicationId::new(format!("med_{i:02}")),
                medication(Some("box_1")),
            );
        }

        on_storage_box_deleted(&store, &space, &StorageBoxId::from("box_1"))
            .await
            .unwrap();

        assert_eq!(store.commits(), 3);
        let medications = Collection::Medications {
            space: space.clone(),
        };
        assert_eq!(store.collection_len(&medications), 0);
    }
}
