use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use geogrant_core::{AppError, AppResult, NonEmptyString, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::AccessJustification;

/// Unique identifier of a temporary region access grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GrantId(Uuid);

impl GrantId {
    /// Creates a random grant identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a grant identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Parses a transport value into a grant identifier.
    pub fn parse(value: &str) -> AppResult<Self> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|_| AppError::Validation(format!("invalid grant id '{value}'")))
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for GrantId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for GrantId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Identifier of a geographic region, owned by the region catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId(String);

impl RegionId {
    /// Creates a region identifier from a trimmed non-empty code.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "region must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the region code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for RegionId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Capability tier carried by a grant. Opaque to this subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessLevel(NonEmptyString);

impl AccessLevel {
    /// Creates an access level from a non-empty label.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        NonEmptyString::new(value.into().trim())
            .map(Self)
            .map_err(|_| AppError::Validation("access_level must not be empty".to_owned()))
    }

    /// Returns the access level label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Lifecycle status derived from grant timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    /// Not revoked and not yet past `expires_at`.
    Active,
    /// Reached `expires_at` without being revoked.
    Expired,
    /// Explicitly revoked before natural expiry.
    Revoked,
}

impl GrantStatus {
    /// Derives the status observed at `now`.
    ///
    /// Revocation wins over expiry; a grant is expired from `expires_at`
    /// onwards.
    #[must_use]
    pub fn derive(
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        revoked_at: Option<DateTime<Utc>>,
    ) -> Self {
        if revoked_at.is_some() {
            Self::Revoked
        } else if now >= expires_at {
            Self::Expired
        } else {
            Self::Active
        }
    }

    /// Returns a stable transport value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }

    /// Returns whether no further lifecycle transition is possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl FromStr for GrantStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "revoked" => Ok(Self::Revoked),
            _ => Err(AppError::Validation(format!(
                "unknown grant status '{value}'"
            ))),
        }
    }
}

impl Display for GrantStatus {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Human-readable breakdown of the time left on a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemainingTime {
    /// Whole days.
    pub days: u64,
    /// Hours within the last day.
    pub hours: u64,
    /// Minutes within the last hour.
    pub minutes: u64,
    /// Seconds within the last minute.
    pub seconds: u64,
}

impl RemainingTime {
    /// Splits a second count into days, hours, minutes and seconds.
    /// Negative input is treated as zero.
    #[must_use]
    pub fn from_seconds(total_seconds: i64) -> Self {
        let total = u64::try_from(total_seconds).unwrap_or(0);

        Self {
            days: total / 86_400,
            hours: (total % 86_400) / 3_600,
            minutes: (total % 3_600) / 60,
            seconds: total % 60,
        }
    }
}

/// Revocation details captured when a grant is ended early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRevocation {
    /// Revocation timestamp from the server clock.
    pub revoked_at: DateTime<Utc>,
    /// Actor that revoked the grant.
    pub revoked_by_user_id: UserId,
    /// Optional justification for revoking.
    pub reason: Option<String>,
}

/// Validated request to issue a new grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantIssue {
    /// User receiving access.
    pub subject_user_id: UserId,
    /// Region being delegated.
    pub region: RegionId,
    /// Capability tier.
    pub access_level: AccessLevel,
    /// Elevated actor issuing the grant.
    pub granted_by_user_id: UserId,
    /// Requested expiry.
    pub expires_at: DateTime<Utc>,
    /// Justification recorded for audit.
    pub reason: String,
}

/// Time-bounded delegation of one region to one subject.
///
/// Status is never stored; callers derive it with [`Self::status_at`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionAccessGrant {
    grant_id: GrantId,
    subject_user_id: UserId,
    region: RegionId,
    access_level: AccessLevel,
    granted_by_user_id: UserId,
    granted_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    reason: NonEmptyString,
    revocation: Option<GrantRevocation>,
}

/// Persisted grant columns used to restore a grant from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRegionAccessGrant {
    /// Stable grant id.
    pub grant_id: GrantId,
    /// User receiving access.
    pub subject_user_id: UserId,
    /// Delegated region.
    pub region: String,
    /// Capability tier.
    pub access_level: String,
    /// Grantor.
    pub granted_by_user_id: UserId,
    /// Creation timestamp.
    pub granted_at: DateTime<Utc>,
    /// Current expiry.
    pub expires_at: DateTime<Utc>,
    /// Grant justification.
    pub reason: String,
    /// Revocation details, when revoked.
    pub revocation: Option<GrantRevocation>,
}

impl RegionAccessGrant {
    /// Issues a new grant at `granted_at`.
    pub fn issue(input: GrantIssue, granted_at: DateTime<Utc>) -> AppResult<Self> {
        let reason = NonEmptyString::new(input.reason.trim())
            .map_err(|_| AppError::Validation("grant reason must not be empty".to_owned()))?;

        if input.expires_at <= granted_at {
            return Err(AppError::Validation(format!(
                "expires_at '{}' must be in the future",
                input.expires_at.to_rfc3339()
            )));
        }

        Ok(Self {
            grant_id: GrantId::new(),
            subject_user_id: input.subject_user_id,
            region: input.region,
            access_level: input.access_level,
            granted_by_user_id: input.granted_by_user_id,
            granted_at,
            expires_at: input.expires_at,
            reason,
            revocation: None,
        })
    }

    /// Restores a grant from persisted columns.
    pub fn restore(stored: StoredRegionAccessGrant) -> AppResult<Self> {
        Ok(Self {
            grant_id: stored.grant_id,
            subject_user_id: stored.subject_user_id,
            region: RegionId::new(stored.region)?,
            access_level: AccessLevel::new(stored.access_level)?,
            granted_by_user_id: stored.granted_by_user_id,
            granted_at: stored.granted_at,
            expires_at: stored.expires_at,
            reason: NonEmptyString::new(stored.reason)?,
            revocation: stored.revocation,
        })
    }

    /// Returns the grant id.
    #[must_use]
    pub fn grant_id(&self) -> GrantId {
        self.grant_id
    }

    /// Returns the subject receiving access.
    #[must_use]
    pub fn subject_user_id(&self) -> UserId {
        self.subject_user_id
    }

    /// Returns the delegated region.
    #[must_use]
    pub fn region(&self) -> &RegionId {
        &self.region
    }

    /// Returns the capability tier.
    #[must_use]
    pub fn access_level(&self) -> &AccessLevel {
        &self.access_level
    }

    /// Returns the grantor.
    #[must_use]
    pub fn granted_by_user_id(&self) -> UserId {
        self.granted_by_user_id
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn granted_at(&self) -> DateTime<Utc> {
        self.granted_at
    }

    /// Returns the current expiry.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns the grant justification.
    #[must_use]
    pub fn reason(&self) -> &str {
        self.reason.as_str()
    }

    /// Returns revocation details, when revoked.
    #[must_use]
    pub fn revocation(&self) -> Option<&GrantRevocation> {
        self.revocation.as_ref()
    }

    /// Derives the grant status at `now`.
    #[must_use]
    pub fn status_at(&self, now: DateTime<Utc>) -> GrantStatus {
        GrantStatus::derive(
            now,
            self.expires_at,
            self.revocation.as_ref().map(|revocation| revocation.revoked_at),
        )
    }

    /// Returns whether the grant is active at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status_at(now) == GrantStatus::Active
    }

    /// Returns `max(0, expires_at - now)` in whole seconds.
    ///
    /// Terminal grants always report zero.
    #[must_use]
    pub fn seconds_remaining_at(&self, now: DateTime<Utc>) -> i64 {
        if !self.is_active_at(now) {
            return 0;
        }

        (self.expires_at - now).num_seconds().max(0)
    }

    /// Returns the remaining-time breakdown at `now`.
    #[must_use]
    pub fn remaining_at(&self, now: DateTime<Utc>) -> RemainingTime {
        RemainingTime::from_seconds(self.seconds_remaining_at(now))
    }

    /// Returns the projection tag this grant contributes while active.
    #[must_use]
    pub fn justification(&self) -> AccessJustification {
        AccessJustification::Temporary(self.grant_id)
    }

    /// Moves the expiry of an active grant.
    ///
    /// Shortening is allowed as long as the new expiry stays in the future.
    pub fn change_expiry(
        &mut self,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        self.ensure_active(now)?;
        if new_expires_at <= now {
            return Err(AppError::Validation(format!(
                "new expires_at '{}' must be in the future",
                new_expires_at.to_rfc3339()
            )));
        }

        self.expires_at = new_expires_at;
        Ok(())
    }

    /// Revokes an active grant.
    pub fn revoke(&mut self, revocation: GrantRevocation) -> AppResult<()> {
        self.ensure_active(revocation.revoked_at)?;
        self.revocation = Some(revocation);
        Ok(())
    }

    fn ensure_active(&self, now: DateTime<Utc>) -> AppResult<()> {
        let status = self.status_at(now);
        if status.is_terminal() {
            return Err(AppError::AlreadyTerminal(format!(
                "grant '{}' is already {}",
                self.grant_id,
                status.as_str()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use geogrant_core::{AppError, UserId};
    use proptest::prelude::*;

    use super::{
        AccessLevel, GrantIssue, GrantRevocation, GrantStatus, RegionAccessGrant, RegionId,
        RemainingTime,
    };

    fn issue_at(granted_at: chrono::DateTime<Utc>, ttl_seconds: i64) -> RegionAccessGrant {
        let region = RegionId::new("north-basin").unwrap_or_else(|_| unreachable!());
        let access_level = AccessLevel::new("read_write").unwrap_or_else(|_| unreachable!());

        RegionAccessGrant::issue(
            GrantIssue {
                subject_user_id: UserId::new(),
                region,
                access_level,
                granted_by_user_id: UserId::new(),
                expires_at: granted_at + Duration::seconds(ttl_seconds),
                reason: "storm response".to_owned(),
            },
            granted_at,
        )
        .unwrap_or_else(|_| unreachable!())
    }

    fn epoch() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
            .single()
            .unwrap_or_default()
    }

    #[test]
    fn issue_rejects_blank_reason() {
        let now = epoch();
        let result = RegionAccessGrant::issue(
            GrantIssue {
                subject_user_id: UserId::new(),
                region: RegionId::new("delta").unwrap_or_else(|_| unreachable!()),
                access_level: AccessLevel::new("read").unwrap_or_else(|_| unreachable!()),
                granted_by_user_id: UserId::new(),
                expires_at: now + Duration::hours(1),
                reason: "   ".to_owned(),
            },
            now,
        );

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn issue_rejects_expiry_not_in_future() {
        let now = epoch();
        let result = RegionAccessGrant::issue(
            GrantIssue {
                subject_user_id: UserId::new(),
                region: RegionId::new("delta").unwrap_or_else(|_| unreachable!()),
                access_level: AccessLevel::new("read").unwrap_or_else(|_| unreachable!()),
                granted_by_user_id: UserId::new(),
                expires_at: now,
                reason: "audit".to_owned(),
            },
            now,
        );

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn clock_moving_past_expiry_flips_status_without_mutation() {
        let now = epoch();
        let grant = issue_at(now, 3_600);
        let before = grant.clone();

        assert_eq!(grant.status_at(now), GrantStatus::Active);
        assert_eq!(grant.seconds_remaining_at(now), 3_600);
        assert_eq!(
            grant.status_at(now + Duration::seconds(3_601)),
            GrantStatus::Expired
        );
        assert_eq!(grant.seconds_remaining_at(now + Duration::seconds(3_601)), 0);
        assert_eq!(grant, before);
    }

    #[test]
    fn revoke_after_elapsed_expiry_is_rejected() {
        let now = epoch();
        let mut grant = issue_at(now, 60);

        let result = grant.revoke(GrantRevocation {
            revoked_at: now + Duration::seconds(61),
            revoked_by_user_id: UserId::new(),
            reason: None,
        });

        assert!(matches!(result, Err(AppError::AlreadyTerminal(_))));
        assert!(grant.revocation().is_none());
    }

    #[test]
    fn change_expiry_allows_shortening_but_not_into_past() {
        let now = epoch();
        let mut grant = issue_at(now, 3_600);

        assert!(grant.change_expiry(now + Duration::seconds(60), now).is_ok());
        assert_eq!(grant.seconds_remaining_at(now), 60);

        let rejected = grant.change_expiry(now, now);
        assert!(matches!(rejected, Err(AppError::Validation(_))));
    }

    #[test]
    fn remaining_time_breaks_down_seconds() {
        let remaining = RemainingTime::from_seconds(90_061);
        assert_eq!(
            remaining,
            RemainingTime {
                days: 1,
                hours: 1,
                minutes: 1,
                seconds: 1,
            }
        );
        assert_eq!(RemainingTime::from_seconds(-5), RemainingTime::default());
    }

    #[test]
    fn region_id_is_trimmed() {
        let region = RegionId::new("  coastal-7 ");
        assert!(matches!(region, Ok(value) if value.as_str() == "coastal-7"));
    }

    proptest! {
        #[test]
        fn status_depends_only_on_timestamps(
            expires_offset in -100_000_i64..100_000,
            revoked_offset in proptest::option::of(-100_000_i64..100_000),
        ) {
            let now = epoch();
            let expires_at = now + Duration::seconds(expires_offset);
            let revoked_at = revoked_offset.map(|offset| now + Duration::seconds(offset));

            let status = GrantStatus::derive(now, expires_at, revoked_at);
            let expected = match (revoked_at, expires_offset > 0) {
                (Some(_), _) => GrantStatus::Revoked,
                (None, true) => GrantStatus::Active,
                (None, false) => GrantStatus::Expired,
            };

            prop_assert_eq!(status, expected);
            prop_assert_eq!(status, GrantStatus::derive(now, expires_at, revoked_at));
        }

        #[test]
        fn remaining_time_recomposes_to_total(total in 0_i64..10_000_000) {
            let remaining = RemainingTime::from_seconds(total);
            let recomposed = remaining.days * 86_400
                + remaining.hours * 3_600
                + remaining.minutes * 60
                + remaining.seconds;

            prop_assert_eq!(recomposed, u64::try_from(total).unwrap_or(0));
            prop_assert!(remaining.hours < 24 && remaining.minutes < 60 && remaining.seconds < 60);
        }
    }
}
