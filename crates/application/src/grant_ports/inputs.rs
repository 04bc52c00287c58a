use chrono::{DateTime, Utc};
use geogrant_core::{AppError, AppResult, UserId};
use geogrant_domain::{GrantStatus, RegionAccessGrant, RegionId};

/// Input payload for issuing a temporary region grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRegionGrantInput {
    /// User receiving access.
    pub subject_user_id: UserId,
    /// Region code.
    pub region: String,
    /// Capability tier label.
    pub access_level: String,
    /// Requested expiry.
    pub expires_at: DateTime<Utc>,
    /// Justification for temporary access.
    pub reason: String,
}

/// Window of rows requested from a grant listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantPage {
    /// Maximum rows returned; clamped to [`RegionGrantQuery::MAX_LIMIT`].
    pub limit: usize,
    /// Number of rows skipped.
    pub offset: usize,
}

impl GrantPage {
    /// Limit used when the caller does not pick one.
    pub const DEFAULT_LIMIT: usize = 50;
}

impl Default for GrantPage {
    fn default() -> Self {
        Self {
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

/// Query parameters for grant listing.
///
/// `status` filters on the status derived at query time, never on a
/// stored column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionGrantQuery {
    /// Optional subject filter.
    pub subject_user_id: Option<UserId>,
    /// Optional region filter.
    pub region: Option<RegionId>,
    /// Optional derived-status filter.
    pub status: Option<GrantStatus>,
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for pagination.
    pub offset: usize,
}

impl RegionGrantQuery {
    /// Upper bound applied to `limit` by every adapter.
    pub const MAX_LIMIT: usize = 200;

    /// Largest accepted `offset`; deeper pages are rejected.
    pub const MAX_OFFSET: usize = 5_000;

    /// Returns a page of active grants held by one subject.
    #[must_use]
    pub fn active_for_user(subject_user_id: UserId, page: GrantPage) -> Self {
        Self {
            subject_user_id: Some(subject_user_id),
            region: None,
            status: Some(GrantStatus::Active),
            limit: page.limit,
            offset: page.offset,
        }
    }

    /// Returns a page of active grants on one region.
    #[must_use]
    pub fn active_for_region(region: RegionId, page: GrantPage) -> Self {
        Self {
            subject_user_id: None,
            region: Some(region),
            status: Some(GrantStatus::Active),
            limit: page.limit,
            offset: page.offset,
        }
    }

    /// Rejects offsets past [`Self::MAX_OFFSET`].
    pub fn ensure_offset_in_range(&self) -> AppResult<()> {
        if self.offset > Self::MAX_OFFSET {
            return Err(AppError::Validation(format!(
                "offset must be at most {}, got {}",
                Self::MAX_OFFSET,
                self.offset
            )));
        }

        Ok(())
    }

    /// Returns the limit clamped to the supported range.
    #[must_use]
    pub fn capped_limit(&self) -> usize {
        self.limit.clamp(1, Self::MAX_LIMIT)
    }

    /// Returns whether a grant matches every filter at `now`.
    #[must_use]
    pub fn matches(&self, grant: &RegionAccessGrant, now: DateTime<Utc>) -> bool {
        self.subject_user_id
            .is_none_or(|subject_user_id| grant.subject_user_id() == subject_user_id)
            && self
                .region
                .as_ref()
                .is_none_or(|region| grant.region() == region)
            && self
                .status
                .is_none_or(|status| grant.status_at(now) == status)
    }
}
