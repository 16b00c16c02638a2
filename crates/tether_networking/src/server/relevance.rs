//! # Relevance
//!
//! Decides which observers should know about which avatars. The server asks
//! the policy once per tick for every (subject, observer) pair and turns the
//! answer into spawns and despawns.
//!
//! The owner of an avatar always observes it; policies are never consulted
//! for that pair.

use super::avatar::AvatarRecord;

/// Streaming decision for one subject/observer pair.
pub trait RelevancePolicy: Send {
    /// True if `observer`'s owner should currently know `subject` exists.
    fn is_relevant(&self, subject: &AvatarRecord, observer: &AvatarRecord) -> bool;
}

/// Everyone sees everyone.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysRelevant;

impl RelevancePolicy for AlwaysRelevant {
    #[inline]
    fn is_relevant(&self, _subject: &AvatarRecord, _observer: &AvatarRecord) -> bool {
        true
    }
}

/// Avatars within `radius` of each other see each other.
#[derive(Clone, Copy, Debug)]
pub struct RadiusRelevance {
    radius_squared: f32,
}

impl RadiusRelevance {
    /// Creates a policy with the given radius in world units.
    #[must_use]
    pub fn new(radius: f32) -> Self {
        Self {
            radius_squared: radius * radius,
        }
    }
}

impl RelevancePolicy for RadiusRelevance {
    #[inline]
    fn is_relevant(&self, subject: &AvatarRecord, observer: &AvatarRecord) -> bool {
        subject
            .transform
            .position
            .distance_squared(observer.transform.position)
            <= self.radius_squared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_shared::{ConnectionId, RemoteAvatarId, Transform};

    fn record_at(id: u64, x: f32) -> AvatarRecord {
        let mut record = AvatarRecord::new(RemoteAvatarId(id), ConnectionId(id as u32), 1);
        record.transform = Transform::at(x, 0.0, 0.0);
        record
    }

    #[test]
    fn test_always_relevant() {
        assert!(AlwaysRelevant.is_relevant(&record_at(1, 0.0), &record_at(2, 1e6)));
    }

    #[test]
    fn test_radius_boundary() {
        let policy = RadiusRelevance::new(10.0);
        let observer = record_at(1, 0.0);
        assert!(policy.is_relevant(&record_at(2, 10.0), &observer));
        assert!(!policy.is_relevant(&record_at(3, 10.5), &observer));
    }
}
