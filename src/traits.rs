// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait interfaces for the document store backend.
//!
//! The store itself is an external collaborator; this crate only relies on the contract
//! specified here: bounded queries, batched multi-document writes with an upper limit on
//! operations per batch, atomic single-batch commit and field-level mutation primitives.
use std::fmt::{Debug, Display};

use crate::types::{
    Collection, DocumentId, MedicationId, Role, Space, SpaceId, StorageBoxId, UserId,
};

/// A single operation staged into a write batch.
#[derive(Clone, Debug, PartialEq)]
pub enum BatchOp {
    /// Remove a document outright.
    Delete {
        collection: Collection,
        id: DocumentId,
    },
    /// Apply a field-level mutation to a document.
    Update {
        collection: Collection,
        id: DocumentId,
        mutation: FieldMutation,
    },
}

/// Field-level mutation primitives offered by the store.
///
/// Typed counterparts of the backend's set-field, delete-field, array-union and
/// array-remove operations. Mutating a document which no longer exists is a no-op, which
/// keeps retried cascades convergent.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldMutation {
    /// Set `members.{user}` to the given role on a space document.
    SetMemberRole { user: UserId, role: Role },
    /// Delete the `members.{user}` key from a space document.
    RemoveMemberKey { user: UserId },
    /// Union a space id into a profile's `space_ids` set.
    AddSpaceId { space: SpaceId },
    /// Remove a space id from a profile's `space_ids` set.
    RemoveSpaceId { space: SpaceId },
}

/// A staged multi-document write, committed atomically.
///
/// Batches accept at most `DocumentStore::batch_limit` operations per commit; staging
/// beyond the limit surfaces as an error on commit, not on stage. There is no
/// transactional scope across batches.
pub trait WriteBatch {
    type Error: Display + Debug;

    /// Stage an operation into the batch.
    fn stage(&mut self, op: BatchOp);

    /// Number of operations currently staged.
    fn staged(&self) -> usize;

    /// Commit all staged operations as one atomic write.
    fn commit(self) -> impl Future<Output = Result<(), Self::Error>>;
}

/// Interface for querying and mutating the document store.
///
/// Implementations are handles onto shared backend state: cloning is cheap and all clones
/// address the same store. An instance is constructed explicitly and passed into each
/// component rather than held in global state, so tests can substitute an in-memory
/// implementation.
pub trait DocumentStore: Clone {
    type Error: Display + Debug;
    type Batch: WriteBatch<Error = Self::Error>;

    /// Maximum number of operations a single batch commit accepts. At least 1.
    fn batch_limit(&self) -> usize;

    /// Construct an empty write batch.
    fn batch(&self) -> Self::Batch;

    /// Fetch up to `limit` document ids from a collection.
    ///
    /// No ordering is guaranteed. Callers which delete the returned documents and query
    /// again naturally observe the next slice.
    fn list_documents(
        &self,
        collection: &Collection,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<DocumentId>, Self::Error>>;

    /// Fetch a space document.
    fn get_space(&self, id: &SpaceId) -> impl Future<Output = Result<Option<Space>, Self::Error>>;

    /// Equality query over user profiles by email address, bounded by `limit`.
    fn find_users_by_email(
        &self,
        email: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<UserId>, Self::Error>>;

    /// Array-membership query: all profiles whose `space_ids` contains the given space.
    fn profiles_containing_space(
        &self,
        space: &SpaceId,
    ) -> impl Future<Output = Result<Vec<UserId>, Self::Error>>;

    /// Equality query: medications within a space whose foreign key references the given
    /// storage box.
    fn medications_in_storage_box(
        &self,
        space: &SpaceId,
        storage_box: &StorageBoxId,
    ) -> impl Future<Output = Result<Vec<MedicationId>, Self::Error>>;
}
