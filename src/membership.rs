// SPDX-License-Identifier: MIT OR Apache-2.0

//! Membership mutation operations over the denormalized space / profile dual state.
//!
//! All three operations follow the same sequence: validate inputs, read the authoritative
//! member map, authorize the caller, check invariants, then stage exactly two mutations
//! (space side and profile side) into one batch and commit it atomically. No mutation is
//! staged before every check has passed, so a rejected operation leaves the store
//! untouched.
//!
//! There is no ordering guarantee between two concurrently invoked operations: both can
//! pass validation before either commits. The design accepts this read-modify-write race
//! rather than requiring optimistic-concurrency primitives from the store.
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::traits::{BatchOp, DocumentStore, FieldMutation, WriteBatch};
use crate::types::{Collection, Role, SpaceId, UserId};

/// Classification of a failed membership operation, suitable for a wire response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    PermissionDenied,
    AlreadyExists,
    FailedPrecondition,
    Internal,
}

/// Error returned by a membership operation, generic over the store error.
#[derive(Debug, Error)]
pub enum MembershipError<E> {
    /// A required request parameter or the caller identity was missing.
    #[error("missing required parameter: {0}")]
    InvalidArgument(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    PermissionDenied(&'static str),

    #[error("{0}")]
    AlreadyExists(&'static str),

    #[error("{0}")]
    FailedPrecondition(&'static str),

    /// Unexpected store failure.
    #[error("store error: {0}")]
    Internal(E),
}

impl<E> MembershipError<E> {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MembershipError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            MembershipError::NotFound(_) => ErrorKind::NotFound,
            MembershipError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            MembershipError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            MembershipError::FailedPrecondition(_) => ErrorKind::FailedPrecondition,
            MembershipError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Invite a user to a space, keyed by their registered email address.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InviteRequest {
    pub space_id: Option<SpaceId>,
    pub invited_email: Option<String>,
    pub role: Option<Role>,
}

/// Result of a successful invite.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InviteOutcome {
    /// Identity the invited email address resolved to.
    pub invited_user: UserId,
}

/// Remove a member from a space on behalf of an owner.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RemoveRequest {
    pub space_id: Option<SpaceId>,
    pub user_id: Option<UserId>,
}

/// Leave a space as the calling member.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub space_id: Option<SpaceId>,
}

/// Add a member to a space's member map and record the back-reference on their profile.
///
/// Only callers holding the owner role may invite. The invited email is assumed to
/// resolve uniquely; when the store returns several matches only the first is used.
pub async fn invite_member<S>(
    store: &S,
    caller: Option<&UserId>,
    request: InviteRequest,
) -> Result<InviteOutcome, MembershipError<S::Error>>
where
    S: DocumentStore,
{
    let caller = caller.ok_or(MembershipError::InvalidArgument("caller identity"))?;
    let space_id = request
        .space_id
        .ok_or(MembershipError::InvalidArgument("space_id"))?;
    let invited_email = request
        .invited_email
        .filter(|email| !email.is_empty())
        .ok_or(MembershipError::InvalidArgument("invited_email"))?;
    let role = request.role.ok_or(MembershipError::InvalidArgument("role"))?;

    // Resolve the invited identity first; the member map is keyed by user id, not email.
    let matches = store
        .find_users_by_email(&invited_email, 1)
        .await
        .map_err(MembershipError::Internal)?;
    let Some(invited_user) = matches.into_iter().next() else {
        return Err(MembershipError::NotFound("registered user with that email"));
    };

    let space = store
        .get_space(&space_id)
        .await
        .map_err(MembershipError::Internal)?
        .ok_or(MembershipError::NotFound("space"))?;

    if !space.is_owner(caller) {
        return Err(MembershipError::PermissionDenied(
            "only an owner can invite members",
        ));
    }
    if space.role(&invited_user).is_some() {
        return Err(MembershipError::AlreadyExists(
            "user is already a member of this space",
        ));
    }

    let mut batch = store.batch();
    batch.stage(BatchOp::Update {
        collection: Collection::Spaces,
        id: space_id.clone().into(),
        mutation: FieldMutation::SetMemberRole {
            user: invited_user.clone(),
            role,
        },
    });
    batch.stage(BatchOp::Update {
        collection: Collection::Users,
        id: invited_user.clone().into(),
        mutation: FieldMutation::AddSpaceId {
            space: space_id.clone(),
        },
    });
    batch.commit().await.map_err(MembershipError::Internal)?;

    debug!(space = %space_id, user = %invited_user, "member invited");
    Ok(InviteOutcome { invited_user })
}

/// Remove a member from a space on behalf of an owner.
///
/// Callers may remove themselves through this path; in all cases the removal is rejected
/// when it would strip the sole remaining owner from a space that still has members.
pub async fn remove_member<S>(
    store: &S,
    caller: Option<&UserId>,
    request: RemoveRequest,
) -> Result<(), MembershipError<S::Error>>
where
    S: DocumentStore,
{
    let caller = caller.ok_or(MembershipError::InvalidArgument("caller identity"))?;
    let space_id = request
        .space_id
        .ok_or(MembershipError::InvalidArgument("space_id"))?;
    let user_id = request
        .user_id
        .ok_or(MembershipError::InvalidArgument("user_id"))?;

    // An absent space document reads as an empty member map, so the caller simply is not
    // an owner of it.
    let space = store
        .get_space(&space_id)
        .await
        .map_err(MembershipError::Internal)?
        .unwrap_or_default();

    if !space.is_owner(caller) {
        return Err(MembershipError::PermissionDenied(
            "only an owner can remove members",
        ));
    }
    if space.is_owner(&user_id) && space.owner_count() == 1 {
        return Err(MembershipError::FailedPrecondition(
            "cannot remove the last remaining owner",
        ));
    }

    let mut batch = store.batch();
    batch.stage(BatchOp::Update {
        collection: Collection::Spaces,
        id: space_id.clone().into(),
        mutation: FieldMutation::RemoveMemberKey {
            user: user_id.clone(),
        },
    });
    batch.stage(BatchOp::Update {
        collection: Collection::Users,
        id: user_id.clone().into(),
        mutation: FieldMutation::RemoveSpaceId {
            space: space_id.clone(),
        },
    });
    batch.commit().await.map_err(MembershipError::Internal)?;

    debug!(space = %space_id, user = %user_id, "member removed");
    Ok(())
}

/// Leave a space as the calling member, self-service.
///
/// Rejected when the caller is the sole remaining owner. A caller who is not a member of
/// the space succeeds as a no-op scrub of their own back-reference.
pub async fn leave_space<S>(
    store: &S,
    caller: Option<&UserId>,
    request: LeaveRequest,
) -> Result<(), MembershipError<S::Error>>
where
    S: DocumentStore,
{
    let caller = caller.ok_or(MembershipError::InvalidArgument("caller identity"))?;
    let space_id = request
        .space_id
        .ok_or(MembershipError::InvalidArgument("space_id"))?;

    let space = store
        .get_space(&space_id)
        .await
        .map_err(MembershipError::Internal)?
        .unwrap_or_default();

    if space.is_owner(caller) && space.owner_count() == 1 {
        return Err(MembershipError::FailedPrecondition(
            "space must retain at least one owner",
        ));
    }

    let mut batch = store.batch();
    batch.stage(BatchOp::Update {
        collection: Collection::Spaces,
        id: space_id.clone().into(),
        mutation: FieldMutation::RemoveMemberKey {
            user: caller.clone(),
        },
    });
    batch.stage(BatchOp::Update {
        collection: Collection::Users,
        id: caller.clone().into(),
        mutation: FieldMutation::RemoveSpaceId {
            space: space_id.clone(),
        },
    });
    batch.commit().await.map_err(MembershipError::Internal)?;

    debug!(space = %space_id, user = %caller, "member left");
    Ok(())
}
