// SPDX-License-Identifier: MIT OR Apache-2.0

#![cfg_attr(doctest, doc = include_str!("../README.md"))]

//! Referential consistency for a multi-tenant, hierarchical document store.
//!
//! Spaces own nested collections of storage boxes and medications and carry a member map
//! which is denormalized against the `space_ids` back-references on user profile
//! documents. The backing store offers no foreign keys, no cascading deletes and no
//! transaction spanning more than one bounded batch commit, so keeping these views
//! consistent is this crate's job:
//!
//! - The **cascading deletion engine** ([`cascade`]) drains unbounded collections through
//!   repeated bounded batch commits and underpins the two deletion triggers
//!   ([`triggers`]): when a space is deleted its storage boxes, medications and
//!   membership back-references go with it; when a storage box is deleted the
//!   medications referencing it are removed.
//! - The **membership operations** ([`membership`]) — invite, remove and leave — mutate
//!   both sides of the denormalized membership state in a single atomic batch, behind
//!   authorization gates and the invariant that a space never loses its last owner.
//!
//! The store backend is abstracted behind the [`traits::DocumentStore`] contract; an
//! in-memory implementation ([`memory::MemoryStore`], feature `memory`) is provided for
//! development and tests. Store handles are constructed explicitly and passed into each
//! operation, there is no global client state.
pub mod cascade;
#[cfg(feature = "memory")]
pub mod memory;
pub mod membership;
pub mod traits;
pub mod triggers;
pub mod types;

#[cfg(feature = "memory")]
pub use memory::{MemoryStore, MemoryStoreError};
pub use membership::{
    ErrorKind, InviteOutcome, InviteRequest, LeaveRequest, MembershipError, RemoveRequest,
    invite_member, leave_space, remove_member,
};
pub use traits::{BatchOp, DocumentStore, FieldMutation, WriteBatch};
pub use triggers::{on_space_deleted, on_storage_box_deleted};
pub use types::{
    Collection, DocumentId, Medication, MedicationId, Role, Space, SpaceId, StorageBox,
    StorageBoxId, UserId, UserProfile,
};
