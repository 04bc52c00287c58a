use serde::{Deserialize, Serialize};
use ts_rs::TS;

mod conversions;

pub(crate) use conversions::parse_timestamp;

/// Incoming payload for issuing a temporary region grant.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/create-region-grant-request.ts"
)]
pub struct CreateRegionGrantRequest {
    pub subject_user_id: String,
    pub region: String,
    pub access_level: String,
    /// RFC 3339 timestamp.
    pub expires_at: String,
    pub reason: String,
}

/// Incoming payload for moving a grant's expiry.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/extend-region-grant-request.ts"
)]
pub struct ExtendRegionGrantRequest {
    /// RFC 3339 timestamp.
    pub expires_at: String,
}

/// Incoming payload for revoking a grant.
#[derive(Debug, Default, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/revoke-region-grant-request.ts"
)]
pub struct RevokeRegionGrantRequest {
    pub reason: Option<String>,
}

/// Breakdown of the time left on a grant.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/remaining-time-response.ts"
)]
pub struct RemainingTimeResponse {
    #[ts(type = "number")]
    pub days: u64,
    #[ts(type = "number")]
    pub hours: u64,
    #[ts(type = "number")]
    pub minutes: u64,
    #[ts(type = "number")]
    pub seconds: u64,
}

/// API representation of a temporary region grant.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/region-grant-response.ts"
)]
pub struct RegionGrantResponse {
    pub grant_id: String,
    pub subject_user_id: String,
    pub region: String,
    pub access_level: String,
    pub granted_by_user_id: String,
    pub granted_at: String,
    pub expires_at: String,
    pub reason: String,
    pub status: String,
    #[ts(type = "number")]
    pub seconds_remaining: i64,
    pub remaining: RemainingTimeResponse,
    pub revoked_at: Option<String>,
    pub revoked_by_user_id: Option<String>,
    pub revoke_reason: Option<String>,
    pub observed_at: String,
}
