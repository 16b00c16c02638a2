//! # Ownership
//!
//! Which connection may mutate which avatar. The server consults this before
//! accepting any client-originated transform.
//!
//! An owner is assigned once, when the avatar is created, and never
//! reassigned. Releasing happens only when the avatar is destroyed.

use std::collections::HashMap;

use tether_shared::{ConnectionId, RemoteAvatarId};
use thiserror::Error;

/// Why an ownership assignment was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OwnershipError {
    /// The avatar already has an owner.
    #[error("{avatar} is already owned by {owner}")]
    AlreadyOwned {
        /// Avatar in question.
        avatar: RemoteAvatarId,
        /// Its existing owner.
        owner: ConnectionId,
    },
    /// The connection already owns an avatar.
    #[error("{connection} already owns {avatar}")]
    ConnectionBusy {
        /// Connection in question.
        connection: ConnectionId,
        /// The avatar it owns.
        avatar: RemoteAvatarId,
    },
    /// Null ids cannot take part in ownership.
    #[error("null id in ownership assignment")]
    NullId,
}

/// Avatar ↔ connection ownership table.
#[derive(Debug, Default)]
pub struct OwnershipModel {
    owners: HashMap<RemoteAvatarId, ConnectionId>,
    owned: HashMap<ConnectionId, RemoteAvatarId>,
}

impl OwnershipModel {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `connection` as the owner of `avatar`.
    ///
    /// # Errors
    ///
    /// Refuses to reassign an owned avatar or to give a connection a second
    /// avatar.
    pub fn assign(&mut self, avatar: RemoteAvatarId, connection: ConnectionId) -> Result<(), OwnershipError> {
        if avatar.is_null() || connection.is_null() {
            return Err(OwnershipError::NullId);
        }
        if let Some(&owner) = self.owners.get(&avatar) {
            return Err(OwnershipError::AlreadyOwned { avatar, owner });
        }
        if let Some(&existing) = self.owned.get(&connection) {
            return Err(OwnershipError::ConnectionBusy {
                connection,
                avatar: existing,
            });
        }
        self.owners.insert(avatar, connection);
        self.owned.insert(connection, avatar);
        Ok(())
    }

    /// Forgets the owner of `avatar`, returning it.
    pub fn release(&mut self, avatar: RemoteAvatarId) -> Option<ConnectionId> {
        let owner = self.owners.remove(&avatar)?;
        self.owned.remove(&owner);
        Some(owner)
    }

    /// True iff `connection` owns `avatar`.
    #[inline]
    #[must_use]
    pub fn is_authorized(&self, avatar: RemoteAvatarId, connection: ConnectionId) -> bool {
        self.owners.get(&avatar) == Some(&connection)
    }

    /// Owner of `avatar`.
    #[must_use]
    pub fn owner_of(&self, avatar: RemoteAvatarId) -> Option<ConnectionId> {
        self.owners.get(&avatar).copied()
    }

    /// Avatar owned by `connection`.
    #[must_use]
    pub fn avatar_of(&self, connection: ConnectionId) -> Option<RemoteAvatarId> {
        self.owned.get(&connection).copied()
    }

    /// Number of owned avatars.
    #[must_use]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// True if nothing is owned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_assign_and_authorize() {
        let mut model = OwnershipModel::new();
        model.assign(RemoteAvatarId(1), ConnectionId(10)).unwrap();

        assert!(model.is_authorized(RemoteAvatarId(1), ConnectionId(10)));
        assert!(!model.is_authorized(RemoteAvatarId(1), ConnectionId(11)));
        assert!(!model.is_authorized(RemoteAvatarId(2), ConnectionId(10)));
        assert_eq!(model.avatar_of(ConnectionId(10)), Some(RemoteAvatarId(1)));
    }

    #[test]
    fn test_owner_is_never_reassigned() {
        let mut model = OwnershipModel::new();
        model.assign(RemoteAvatarId(1), ConnectionId(10)).unwrap();

        let err = model.assign(RemoteAvatarId(1), ConnectionId(11)).unwrap_err();
        assert_eq!(
            err,
            OwnershipError::AlreadyOwned {
                avatar: RemoteAvatarId(1),
                owner: ConnectionId(10)
            }
        );
        assert_eq!(model.owner_of(RemoteAvatarId(1)), Some(ConnectionId(10)));
    }

    #[test]
    fn test_one_avatar_per_connection() {
        let mut model = OwnershipModel::new();
        model.assign(RemoteAvatarId(1), ConnectionId(10)).unwrap();
        assert!(matches!(
            model.assign(RemoteAvatarId(2), ConnectionId(10)),
            Err(OwnershipError::ConnectionBusy { .. })
        ));
    }

    #[test]
    fn test_release() {
        let mut model = OwnershipModel::new();
        model.assign(RemoteAvatarId(1), ConnectionId(10)).unwrap();
        assert_eq!(model.release(RemoteAvatarId(1)), Some(ConnectionId(10)));
        assert!(model.is_empty());
        assert!(!model.is_authorized(RemoteAvatarId(1), ConnectionId(10)));
        assert_eq!(model.release(RemoteAvatarId(1)), None);
    }

    #[test]
    fn test_null_ids_refused() {
        let mut model = OwnershipModel::new();
        assert_eq!(
            model.assign(RemoteAvatarId::NULL, ConnectionId(1)),
            Err(OwnershipError::NullId)
        );
        assert_eq!(
            model.assign(RemoteAvatarId(1), ConnectionId::NULL),
            Err(OwnershipError::NullId)
        );
    }

    #[test]
    fn test_random_probes_only_owner_authorized() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let mut model = OwnershipModel::new();
        for i in 1..=32u32 {
            model.assign(RemoteAvatarId(u64::from(i)), ConnectionId(i + 100)).unwrap();
        }
        for _ in 0..1_000 {
            let avatar = rng.gen_range(1..=32u32);
            let connection = rng.gen_range(100..=140u32);
            let expected = connection == avatar + 100;
            assert_eq!(
                model.is_authorized(RemoteAvatarId(u64::from(avatar)), ConnectionId(connection)),
                expected
            );
        }
        assert_eq!(model.len(), 32);
    }
}
