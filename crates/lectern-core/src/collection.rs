// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic per-user collection naming and the isolation guard.
//!
//! Every vector-store collection belongs to exactly one user and one purpose.
//! Names are always `{user_id}_documents` or `{user_id}_chat`; the owner is
//! carried structurally so a collection id can be checked against the acting
//! user before any backend call is issued.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::LecternError;
use crate::types::UserId;

/// Maximum accepted length for a user id.
const MAX_USER_ID_LEN: usize = 128;

/// Purpose of a per-user collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum CollectionKind {
    /// Uploaded document chunks.
    Documents,
    /// Conversation turns.
    Chat,
}

impl CollectionKind {
    /// Suffix appended to the user id.
    pub fn suffix(&self) -> &'static str {
        match self {
            CollectionKind::Documents => "_documents",
            CollectionKind::Chat => "_chat",
        }
    }
}

/// A collection name bound to its owning user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionId {
    owner: UserId,
    kind: CollectionKind,
    name: String,
}

impl CollectionId {
    /// Derive the collection of `kind` for `user_id`.
    pub fn new(user_id: &UserId, kind: CollectionKind) -> Result<Self, LecternError> {
        validate_user_id(user_id.as_str())?;
        Ok(Self {
            owner: user_id.clone(),
            kind,
            name: format!("{}{}", user_id.as_str(), kind.suffix()),
        })
    }

    /// Parse a raw collection name back into its owner and purpose.
    pub fn parse(name: &str) -> Result<Self, LecternError> {
        for kind in [CollectionKind::Documents, CollectionKind::Chat] {
            if let Some(owner) = name.strip_suffix(kind.suffix()) {
                return CollectionId::new(&UserId::new(owner), kind);
            }
        }
        Err(LecternError::InvalidInput(format!(
            "`{name}` is not a per-user collection name"
        )))
    }

    /// The full collection name as understood by the vector store.
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// The user that owns this collection.
    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// Reject any access to this collection on behalf of another user.
    pub fn ensure_owned_by(&self, user_id: &UserId) -> Result<(), LecternError> {
        if &self.owner == user_id {
            Ok(())
        } else {
            Err(LecternError::IsolationViolation {
                user_id: user_id.as_str().to_string(),
                collection: self.name.clone(),
            })
        }
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The two collections owned by a single user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCollectionPair {
    pub documents: CollectionId,
    pub chat: CollectionId,
}

impl UserCollectionPair {
    pub fn for_user(user_id: &UserId) -> Result<Self, LecternError> {
        Ok(Self {
            documents: CollectionId::new(user_id, CollectionKind::Documents)?,
            chat: CollectionId::new(user_id, CollectionKind::Chat)?,
        })
    }
}

/// User ids become part of collection names, so they are restricted to
/// characters every supported backend accepts in a collection name.
fn validate_user_id(user_id: &str) -> Result<(), LecternError> {
    if user_id.is_empty() {
        return Err(LecternError::InvalidInput("user id must not be empty".into()));
    }
    if user_id.len() > MAX_USER_ID_LEN {
        return Err(LecternError::InvalidInput(format!(
            "user id longer than {MAX_USER_ID_LEN} characters"
        )));
    }
    if !user_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '@'))
    {
        return Err(LecternError::InvalidInput(format!(
            "user id `{user_id}` contains characters not allowed in collection names"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn names_are_deterministic() {
        let pair = UserCollectionPair::for_user(&UserId::new("u1")).unwrap();
        assert_eq!(pair.documents.as_str(), "u1_documents");
        assert_eq!(pair.chat.as_str(), "u1_chat");
        assert_eq!(pair.chat.kind(), CollectionKind::Chat);
    }

    #[test]
    fn rejects_foreign_owner() {
        let pair = UserCollectionPair::for_user(&UserId::new("alice")).unwrap();
        let err = pair.chat.ensure_owned_by(&UserId::new("bob")).unwrap_err();
        assert!(matches!(err, LecternError::IsolationViolation { .. }));
        assert!(pair.chat.ensure_owned_by(&UserId::new("alice")).is_ok());
    }

    #[test]
    fn rejects_bad_user_ids() {
        assert!(CollectionId::new(&UserId::new(""), CollectionKind::Chat).is_err());
        assert!(CollectionId::new(&UserId::new("a/b"), CollectionKind::Chat).is_err());
        assert!(CollectionId::new(&UserId::new("a b"), CollectionKind::Chat).is_err());
        let long = "x".repeat(MAX_USER_ID_LEN + 1);
        assert!(CollectionId::new(&UserId::new(long), CollectionKind::Chat).is_err());
    }

    #[test]
    fn parse_recovers_owner() {
        let id = CollectionId::parse("user_with_underscores_chat").unwrap();
        assert_eq!(id.owner().as_str(), "user_with_underscores");
        assert_eq!(id.kind(), CollectionKind::Chat);
        assert!(CollectionId::parse("random").is_err());
    }

    proptest! {
        #[test]
        fn derivation_never_crosses_users(
            a in "[A-Za-z0-9_.@-]{1,40}",
            b in "[A-Za-z0-9_.@-]{1,40}",
        ) {
            let ua = UserId::new(a.clone());
            let ub = UserId::new(b.clone());
            let pa = UserCollectionPair::for_user(&ua).unwrap();
            let pb = UserCollectionPair::for_user(&ub).unwrap();

            prop_assert!(pa.documents.ensure_owned_by(&ua).is_ok());
            prop_assert!(pa.chat.ensure_owned_by(&ua).is_ok());
            // Chat and documents names can never collide, even across users.
            prop_assert_ne!(pa.chat.as_str(), pb.documents.as_str());
            if a != b {
                prop_assert_ne!(pa.documents.as_str(), pb.documents.as_str());
                prop_assert_ne!(pa.chat.as_str(), pb.chat.as_str());
                prop_assert!(pa.chat.ensure_owned_by(&ub).is_err());
                prop_assert!(pa.documents.ensure_owned_by(&ub).is_err());
            }
            let parsed = CollectionId::parse(pa.chat.as_str()).unwrap();
            prop_assert_eq!(parsed.owner(), &ua);
        }
    }
}
