//! # Identifiers
//!
//! Avatar ids are assigned by the server and referenced (never owned) by
//! clients. Connection ids are assigned by the transport.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned avatar identifier.
///
/// Unique and stable for the lifetime of one spawned avatar. Zero is reserved
/// and never allocated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct RemoteAvatarId(pub u64);

impl RemoteAvatarId {
    /// Null/invalid avatar id.
    pub const NULL: Self = Self(0);

    /// Returns true if this is the reserved null id.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for RemoteAvatarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "avatar#{}", self.0)
    }
}

/// Unique identifier for a client connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u32);

impl ConnectionId {
    /// Invalid/null connection ID.
    pub const NULL: Self = Self(u32::MAX);

    /// Returns true if this is a null/invalid ID.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u32::MAX
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}
