// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identifier and document types for the space hierarchy.
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a space document.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpaceId(String);

impl SpaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SpaceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identity of a user, shared between the auth subsystem and profile documents.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identity of a storage box document within a space.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageBoxId(String);

impl StorageBoxId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageBoxId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StorageBoxId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identity of a medication document within a space.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MedicationId(String);

impl MedicationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MedicationId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MedicationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Untyped document identity used at the collection and batch layer.
///
/// Typed identifiers convert into this when staged into a write batch or returned from a
/// bounded collection query.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<SpaceId> for DocumentId {
    fn from(id: SpaceId) -> Self {
        Self(id.0)
    }
}

impl From<UserId> for DocumentId {
    fn from(id: UserId) -> Self {
        Self(id.0)
    }
}

impl From<StorageBoxId> for DocumentId {
    fn from(id: StorageBoxId) -> Self {
        Self(id.0)
    }
}

impl From<MedicationId> for DocumentId {
    fn from(id: MedicationId) -> Self {
        Self(id.0)
    }
}

/// Role a user holds within a space's member map.
///
/// Serialized as the plain role string; unknown strings round-trip through `Custom` so
/// stores carrying application-defined roles stay readable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Owner,
    Member,
    Custom(String),
}

impl Role {
    pub fn is_owner(&self) -> bool {
        matches!(self, Role::Owner)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Owner => "owner",
            Role::Member => "member",
            Role::Custom(role) => role,
        }
    }
}

impl From<String> for Role {
    fn from(role: String) -> Self {
        match role.as_str() {
            "owner" => Role::Owner,
            "member" => Role::Member,
            _ => Role::Custom(role),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Custom(role) => role,
            role => role.as_str().to_owned(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A space document: the member map is the authoritative membership view, denormalized
/// against each member's profile back-references.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Space {
    pub members: HashMap<UserId, Role>,
}

impl Space {
    /// Role the given user holds in this space, if they are a member.
    pub fn role(&self, user: &UserId) -> Option<&Role> {
        self.members.get(user)
    }

    pub fn is_owner(&self, user: &UserId) -> bool {
        self.role(user).is_some_and(Role::is_owner)
    }

    /// Number of members holding the owner role.
    pub fn owner_count(&self) -> usize {
        self.members.values().filter(|role| role.is_owner()).count()
    }
}

/// A storage box document. Only the identity matters to the deletion cascade; the payload
/// is otherwise opaque here.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageBox {
    pub name: String,
}

/// A medication document. `storage_box_id` is a foreign key without store-enforced
/// referential integrity; orphans are removed after the fact by the deletion cascade.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    pub storage_box_id: Option<StorageBoxId>,
}

/// A user profile document. `space_ids` is the denormalized inverse of the member maps of
/// all spaces the user belongs to.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub email: String,
    pub space_ids: BTreeSet<SpaceId>,
}

/// Address of a document collection within the store hierarchy.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Top-level collection of space documents.
    Spaces,
    /// Storage boxes nested under one space.
    StorageBoxes { space: SpaceId },
    /// Medications nested under one space.
    Medications { space: SpaceId },
    /// Top-level collection of user profile documents.
    Users,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Collection::Spaces => write!(f, "spaces"),
            Collection::StorageBoxes { space } => write!(f, "spaces/{space}/storage_boxes"),
            Collection::Medications { space } => write!(f, "spaces/{space}/medications"),
            Collection::Users => write!(f, "users"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_from_string() {
        assert_eq!(Role::from("owner".to_string()), Role::Owner);
        assert_eq!(Role::from("member".to_string()), Role::Member);
        assert_eq!(
            Role::from("caretaker".to_string()),
            Role::Custom("caretaker".to_string())
        );

        assert_eq!(String::from(Role::Owner), "owner");
        assert_eq!(String::from(Role::Custom("caretaker".to_string())), "caretaker");
    }

    #[test]
    fn owner_count() {
        let mut space = Space::default();
        space.members.insert("anna".into(), Role::Owner);
        space.members.insert("bert".into(), Role::Member);
        space.members.insert("cleo".into(), Role::Owner);

        assert_eq!(space.owner_count(), 2);
        assert!(space.is_owner(&"anna".into()));
        assert!(!space.is_owner(&"bert".into()));
        assert!(!space.is_owner(&"dora".into()));
    }

    #[test]
    fn collection_paths() {
        assert_eq!(Collection::Spaces.to_string(), "spaces");
        assert_eq!(
            Collection::Medications {
                space: "space_1".into()
            }
            .to_string(),
            "spaces/space_1/medications"
        );
        assert_eq!(Collection::Users.to_string(), "users");
    }
}
