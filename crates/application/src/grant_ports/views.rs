use chrono::{DateTime, Utc};
use geogrant_domain::{GrantStatus, RegionAccessGrant, RemainingTime};

/// Grant as returned to callers, with time-derived fields computed at the
/// read boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionGrantView {
    /// Stored grant.
    pub grant: RegionAccessGrant,
    /// Status observed at `observed_at`.
    pub status: GrantStatus,
    /// `max(0, expires_at - observed_at)` in seconds.
    pub seconds_remaining: i64,
    /// Breakdown of `seconds_remaining`.
    pub remaining: RemainingTime,
    /// Instant the derived fields were computed for.
    pub observed_at: DateTime<Utc>,
}

impl RegionGrantView {
    /// Derives the view of `grant` at `now`.
    #[must_use]
    pub fn at(grant: RegionAccessGrant, now: DateTime<Utc>) -> Self {
        Self {
            status: grant.status_at(now),
            seconds_remaining: grant.seconds_remaining_at(now),
            remaining: grant.remaining_at(now),
            observed_at: now,
            grant,
        }
    }
}
