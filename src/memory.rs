// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory document store.
//!
//! This does not persist data permanently, all state is lost when the process ends. Use
//! this in development and test contexts, or as a reference for what a concrete backend
//! has to provide.
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use crate::traits::{BatchOp, DocumentStore, FieldMutation, WriteBatch};
use crate::types::{
    Collection, DocumentId, Medication, MedicationId, Role, Space, SpaceId, StorageBox,
    StorageBoxId, UserId, UserProfile,
};

/// Default cap on operations per batch commit.
pub const DEFAULT_BATCH_LIMIT: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoryStoreError {
    /// More operations were staged than a single commit accepts.
    #[error("batch of {staged} operations exceeds the limit of {limit}")]
    BatchLimitExceeded { staged: usize, limit: usize },
}

/// Raw store state: the space tree with its nested sub-collections, plus the user profile
/// collection. Sub-collections are ordered so bounded queries return stable slices.
#[derive(Clone, Debug, Default)]
pub struct InnerMemoryStore {
    spaces: HashMap<SpaceId, Space>,
    users: BTreeMap<UserId, UserProfile>,
    storage_boxes: HashMap<SpaceId, BTreeMap<StorageBoxId, StorageBox>>,
    medications: HashMap<SpaceId, BTreeMap<MedicationId, Medication>>,
    commits: usize,
}

/// An in-memory store over the space hierarchy.
///
/// `MemoryStore` supports usage in asynchronous and multi-threaded contexts by wrapping an
/// `InnerMemoryStore` with an `RwLock` and `Arc`. Clones are handles onto the same state.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    inner: Arc<RwLock<InnerMemoryStore>>,
    batch_limit: usize,
}

impl MemoryStore {
    /// Create a new in-memory store with the default batch limit.
    pub fn new() -> Self {
        Self::with_batch_limit(DEFAULT_BATCH_LIMIT)
    }

    /// Create a store which accepts at most `limit` operations per batch commit.
    pub fn with_batch_limit(limit: usize) -> Self {
        assert!(limit > 0, "batch limit must be at least 1");
        Self {
            inner: Arc::default(),
            batch_limit: limit,
        }
    }

    /// Obtain a read-lock on the store.
    pub fn read_store(&self) -> RwLockReadGuard<'_, InnerMemoryStore> {
        self.inner
            .read()
            .expect("acquire shared read access on store")
    }

    /// Obtain a write-lock on the store.
    pub fn write_store(&self) -> RwLockWriteGuard<'_, InnerMemoryStore> {
        self.inner
            .write()
            .expect("acquire exclusive write access on store")
    }

    /// Number of batch commits applied so far.
    pub fn commits(&self) -> usize {
        self.read_store().commits
    }

    /// Insert a space with the given member map.
    ///
    /// Each member's profile back-reference is written as well, so seeded fixtures start
    /// out consistent with the member map.
    pub fn insert_space(&self, id: SpaceId, members: impl IntoIterator<Item = (UserId, Role)>) {
        let members: HashMap<_, _> = members.into_iter().collect();
        let mut store = self.write_store();
        for user in members.keys() {
            store
                .users
                .entry(user.clone())
                .or_default()
                .space_ids
                .insert(id.clone());
        }
        store.spaces.insert(id, Space { members });
    }

    /// Insert a user profile, or set the email on an existing one.
    pub fn insert_user(&self, id: UserId, email: &str) {
        self.write_store().users.entry(id).or_default().email = email.to_string();
    }

    pub fn insert_storage_box(&self, space: &SpaceId, id: StorageBoxId, storage_box: StorageBox) {
        self.write_store()
            .storage_boxes
            .entry(space.clone())
            .or_default()
            .insert(id, storage_box);
    }

    pub fn insert_medication(&self, space: &SpaceId, id: MedicationId, medication: Medication) {
        self.write_store()
            .medications
            .entry(space.clone())
            .or_default()
            .insert(id, medication);
    }

    /// Current state of a space document.
    pub fn space(&self, id: &SpaceId) -> Option<Space> {
        self.read_store().spaces.get(id).cloned()
    }

    /// Current state of a user profile document.
    pub fn user(&self, id: &UserId) -> Option<UserProfile> {
        self.read_store().users.get(id).cloned()
    }

    /// Number of documents currently held in a collection.
    pub fn collection_len(&self, collection: &Collection) -> usize {
        let store = self.read_store();
        match collection {
            Collection::Spaces => store.spaces.len(),
            Collection::Users => store.users.len(),
            Collection::StorageBoxes { space } => {
                store.storage_boxes.get(space).map_or(0, BTreeMap::len)
            }
            Collection::Medications { space } => {
                store.medications.get(space).map_or(0, BTreeMap::len)
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryStore {
    type Error = MemoryStoreError;
    type Batch = MemoryBatch;

    fn batch_limit(&self) -> usize {
        self.batch_limit
    }

    fn batch(&self) -> MemoryBatch {
        MemoryBatch {
            store: self.clone(),
            ops: Vec::new(),
        }
    }

    async fn list_documents(
        &self,
        collection: &Collection,
        limit: usize,
    ) -> Result<Vec<DocumentId>, Self::Error> {
        let store = self.read_store();
        let ids = match collection {
            Collection::Spaces => store
                .spaces
                .keys()
                .take(limit)
                .map(|id| id.clone().into())
                .collect(),
            Collection::Users => store
                .users
                .keys()
                .take(limit)
                .map(|id| id.clone().into())
                .collect(),
            Collection::StorageBoxes { space } => store
                .storage_boxes
                .get(space)
                .into_iter()
                .flat_map(BTreeMap::keys)
                .take(limit)
                .map(|id| id.clone().into())
                .collect(),
            Collection::Medications { space } => store
                .medications
                .get(space)
                .into_iter()
                .flat_map(BTreeMap::keys)
                .take(limit)
                .map(|id| id.clone().into())
                .collect(),
        };
        Ok(ids)
    }

    async fn get_space(&self, id: &SpaceId) -> Result<Option<Space>, Self::Error> {
        Ok(self.read_store().spaces.get(id).cloned())
    }

    async fn find_users_by_email(
        &self,
        email: &str,
        limit: usize,
    ) -> Result<Vec<UserId>, Self::Error> {
        Ok(self
            .read_store()
            .users
            .iter()
            .filter(|(_, profile)| profile.email == email)
            .take(limit)
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn profiles_containing_space(&self, space: &SpaceId) -> Result<Vec<UserId>, Self::Error> {
        Ok(self
            .read_store()
            .users
            .iter()
            .filter(|(_, profile)| profile.space_ids.contains(space))
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn medications_in_storage_box(
        &self,
        space: &SpaceId,
        storage_box: &StorageBoxId,
    ) -> Result<Vec<MedicationId>, Self::Error> {
        Ok(self
            .read_store()
            .medications
            .get(space)
            .into_iter()
            .flat_map(BTreeMap::iter)
            .filter(|(_, medication)| medication.storage_box_id.as_ref() == Some(storage_box))
            .map(|(id, _)| id.clone())
            .collect())
    }
}

/// Write batch over a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryBatch {
    store: MemoryStore,
    ops: Vec<BatchOp>,
}

impl WriteBatch for MemoryBatch {
    type Error = MemoryStoreError;

    fn stage(&mut self, op: BatchOp) {
        self.ops.push(op);
    }

    fn staged(&self) -> usize {
        self.ops.len()
    }

    async fn commit(self) -> Result<(), Self::Error> {
        if self.ops.len() > self.store.batch_limit {
            return Err(MemoryStoreError::BatchLimitExceeded {
                staged: self.ops.len(),
                limit: self.store.batch_limit,
            });
        }

        // All staged operations are applied under one write-lock, which stands in for the
        // backend's all-or-nothing commit.
        let mut store = self.store.write_store();
        for op in self.ops {
            apply(&mut store, op);
        }
        store.commits += 1;
        Ok(())
    }
}

fn apply(store: &mut InnerMemoryStore, op: BatchOp) {
    match op {
        BatchOp::Delete { collection, id } => match collection {
            Collection::Spaces => {
                store.spaces.remove(&SpaceId::new(id.as_str()));
            }
            Collection::Users => {
                store.users.remove(&UserId::new(id.as_str()));
            }
            Collection::StorageBoxes { space } => {
                if let Some(boxes) = store.storage_boxes.get_mut(&space) {
                    boxes.remove(&StorageBoxId::new(id.as_str()));
                }
            }
            Collection::Medications { space } => {
                if let Some(medications) = store.medications.get_mut(&space) {
                    medications.remove(&MedicationId::new(id.as_str()));
                }
            }
        },
        // Mutations against documents which no longer exist are no-ops, matching the
        // convergence behavior retried cascades rely on.
        BatchOp::Update {
            collection,
            id,
            mutation,
        } => match (collection, mutation) {
            (Collection::Spaces, FieldMutation::SetMemberRole { user, role }) => {
                if let Some(space) = store.spaces.get_mut(&SpaceId::new(id.as_str())) {
                    space.members.insert(user, role);
                }
            }
            (Collection::Spaces, FieldMutation::RemoveMemberKey { user }) => {
                if let Some(space) = store.spaces.get_mut(&SpaceId::new(id.as_str())) {
                    space.members.remove(&user);
                }
            }
            (Collection::Users, FieldMutation::AddSpaceId { space }) => {
                if let Some(profile) = store.users.get_mut(&UserId::new(id.as_str())) {
                    profile.space_ids.insert(space);
                }
            }
            (Collection::Users, FieldMutation::RemoveSpaceId { space }) => {
                if let Some(profile) = store.users.get_mut(&UserId::new(id.as_str())) {
                    profile.space_ids.remove(&space);
                }
            }
            (collection, mutation) => {
                unreachable!("unsupported mutation {mutation:?} against {collection}")
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_over_limit_batches() {
        let store = MemoryStore::with_batch_limit(2);
        let space = SpaceId::from("space_1");
        let collection = Collection::Medications {
            space: space.clone(),
        };

        let mut batch = store.batch();
        for i in 0..3 {
            batch.stage(BatchOp::Delete {
                collection: collection.clone(),
                id: DocumentId::new(format!("med_{i}")),
            });
        }
        assert_eq!(batch.staged(), 3);

        let err = batch.commit().await.unwrap_err();
        assert_eq!(
            err,
            MemoryStoreError::BatchLimitExceeded {
                staged: 3,
                limit: 2
            }
        );
        assert_eq!(store.commits(), 0);
    }

    #[tokio::test]
    async fn seeded_memberships_are_consistent() {
        let store = MemoryStore::new();
        let anna = UserId::from("anna");
        store.insert_user(anna.clone(), "anna@example.org");
        store.insert_space("space_1".into(), [(anna.clone(), Role::Owner)]);

        let profile = store.user(&anna).unwrap();
        assert_eq!(profile.email, "anna@example.org");
        assert!(profile.space_ids.contains(&"space_1".into()));
    }

    #[tokio::test]
    async fn bounded_listing_and_requeries() {
        let store = MemoryStore::new();
        let space = SpaceId::from("space_1");
        for i in 0..5 {
            store.insert_storage_box(
                &space,
                StorageBoxId::new(format!("box_{i}")),
                StorageBox::default(),
            );
        }
        let collection = Collection::StorageBoxes {
            space: space.clone(),
        };

        let first = store.list_documents(&collection, 3).await.unwrap();
        assert_eq!(first.len(), 3);

        // Deleting the returned slice makes the next query surface the remainder.
        let mut batch = store.batch();
        for id in first {
            batch.stage(BatchOp::Delete {
                collection: collection.clone(),
                id,
            });
        }
        batch.commit().await.unwrap();

        let second = store.list_documents(&collection, 3).await.unwrap();
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn email_lookup_is_bounded() {
        let store = MemoryStore::new();
        store.insert_user("anna".into(), "shared@example.org");
        store.insert_user("bert".into(), "shared@example.org");

        let matches = store
            .find_users_by_email("shared@example.org", 1)
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);

        let matches = store.find_users_by_email("shared@example.org", 5).await.unwrap();
        assert_eq!(matches.len(), 2);
    }
}
