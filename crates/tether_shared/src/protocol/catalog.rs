//! # Message Catalog
//!
//! One enumeration for every subsystem so ids never collide.
//! Ids are stable: never renumber, only append.

/// Message identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageId {
    /// Server -> Client: an avatar became relevant.
    AvatarSpawn = 1,
    /// Server -> Client: an avatar left or stopped being relevant.
    AvatarDespawn = 2,
    /// Bidirectional: transform sample.
    AvatarUpdate = 3,
    /// Server -> Client: non-transform metadata refresh.
    AvatarSelfUpdate = 4,
    /// Server -> Client (owner only): this avatar is yours.
    AvatarAssign = 5,
    /// Bidirectional: chat line.
    Chat = 6,
    /// Server -> Client: weather and time of day.
    WorldState = 7,
}

/// Delivery lane a message expects from the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Delivery {
    /// In send order, never lost.
    ReliableOrdered,
    /// May be dropped or reordered; only the newest sample matters.
    Unreliable,
}

impl MessageId {
    /// Every id in the catalog.
    pub const ALL: [Self; 7] = [
        Self::AvatarSpawn,
        Self::AvatarDespawn,
        Self::AvatarUpdate,
        Self::AvatarSelfUpdate,
        Self::AvatarAssign,
        Self::Chat,
        Self::WorldState,
    ];

    /// Converts from the wire byte.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::AvatarSpawn),
            2 => Some(Self::AvatarDespawn),
            3 => Some(Self::AvatarUpdate),
            4 => Some(Self::AvatarSelfUpdate),
            5 => Some(Self::AvatarAssign),
            6 => Some(Self::Chat),
            7 => Some(Self::WorldState),
            _ => None,
        }
    }

    /// True for kinds whose envelope carries a `ServerId`.
    #[must_use]
    pub const fn carries_avatar_id(self) -> bool {
        matches!(
            self,
            Self::AvatarSpawn
                | Self::AvatarDespawn
                | Self::AvatarUpdate
                | Self::AvatarSelfUpdate
                | Self::AvatarAssign
        )
    }

    /// Lane this kind is sent on.
    #[must_use]
    pub const fn delivery(self) -> Delivery {
        match self {
            Self::AvatarUpdate => Delivery::Unreliable,
            _ => Delivery::ReliableOrdered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_roundtrip_through_byte() {
        for id in MessageId::ALL {
            assert_eq!(MessageId::from_u8(id as u8), Some(id));
        }
        assert_eq!(MessageId::from_u8(0), None);
        assert_eq!(MessageId::from_u8(200), None);
    }

    #[test]
    fn test_only_updates_are_unreliable() {
        for id in MessageId::ALL {
            let expected = if id == MessageId::AvatarUpdate {
                Delivery::Unreliable
            } else {
                Delivery::ReliableOrdered
            };
            assert_eq!(id.delivery(), expected);
        }
    }
}
