//! # Avatar Records
//!
//! The server's authoritative copy of one player's avatar.

use std::collections::BTreeSet;

use tether_shared::{ConnectionId, RemoteAvatarId, Transform};

/// Authoritative avatar state. Exclusively owned by the server tick.
#[derive(Clone, Debug, PartialEq)]
pub struct AvatarRecord {
    /// Server-assigned id, never reused.
    pub id: RemoteAvatarId,
    /// Only connection allowed to move this avatar. Set once.
    pub owner_connection: ConnectionId,
    /// Model/appearance profile.
    pub spawn_profile: u64,
    /// Last accepted transform.
    pub transform: Transform,
    /// Changed since the last broadcast.
    pub dirty: bool,
    /// Connections that have been sent the spawn and not yet a despawn.
    pub visible_to: BTreeSet<ConnectionId>,
}

impl AvatarRecord {
    /// Creates a record nobody has been told about yet.
    #[must_use]
    pub fn new(id: RemoteAvatarId, owner_connection: ConnectionId, spawn_profile: u64) -> Self {
        Self {
            id,
            owner_connection,
            spawn_profile,
            transform: Transform::IDENTITY,
            dirty: false,
            visible_to: BTreeSet::new(),
        }
    }

    /// True if `connection` currently knows this avatar exists.
    #[inline]
    #[must_use]
    pub fn is_visible_to(&self, connection: ConnectionId) -> bool {
        self.visible_to.contains(&connection)
    }

    /// Observers that should receive transform broadcasts (everyone but the owner).
    pub fn broadcast_targets(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.visible_to
            .iter()
            .copied()
            .filter(move |&c| c != self.owner_connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_targets_skip_owner() {
        let mut record = AvatarRecord::new(RemoteAvatarId(1), ConnectionId(5), 1);
        record.visible_to.extend([ConnectionId(5), ConnectionId(6), ConnectionId(7)]);

        let targets: Vec<_> = record.broadcast_targets().collect();
        assert_eq!(targets, vec![ConnectionId(6), ConnectionId(7)]);
        assert!(record.is_visible_to(ConnectionId(5)));
    }
}
