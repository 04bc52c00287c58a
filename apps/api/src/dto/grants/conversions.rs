use chrono::{DateTime, Utc};
use geogrant_application::RegionGrantView;
use geogrant_core::AppError;
use geogrant_domain::RemainingTime;

use super::{RegionGrantResponse, RemainingTimeResponse};

/// Parses an RFC 3339 timestamp from a request field.
pub(crate) fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|error| {
            AppError::Validation(format!(
                "{field} must be an RFC 3339 timestamp, got '{value}': {error}"
            ))
        })
}

impl From<RemainingTime> for RemainingTimeResponse {
    fn from(value: RemainingTime) -> Self {
        Self {
            days: value.days,
            hours: value.hours,
            minutes: value.minutes,
            seconds: value.seconds,
        }
    }
}

impl From<RegionGrantView> for RegionGrantResponse {
    fn from(value: RegionGrantView) -> Self {
        let grant = value.grant;
        let revocation = grant.revocation().cloned();

        Self {
            grant_id: grant.grant_id().to_string(),
            subject_user_id: grant.subject_user_id().to_string(),
            region: grant.region().as_str().to_owned(),
            access_level: grant.access_level().as_str().to_owned(),
            granted_by_user_id: grant.granted_by_user_id().to_string(),
            granted_at: grant.granted_at().to_rfc3339(),
            expires_at: grant.expires_at().to_rfc3339(),
            reason: grant.reason().to_owned(),
            status: value.status.as_str().to_owned(),
            seconds_remaining: value.seconds_remaining,
            remaining: value.remaining.into(),
            revoked_at: revocation
                .as_ref()
                .map(|revocation| revocation.revoked_at.to_rfc3339()),
            revoked_by_user_id: revocation
                .as_ref()
                .map(|revocation| revocation.revoked_by_user_id.to_string()),
            revoke_reason: revocation.and_then(|revocation| revocation.reason),
            observed_at: value.observed_at.to_rfc3339(),
        }
    }
}
