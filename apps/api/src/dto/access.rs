use geogrant_domain::{EffectiveAccess, PermanentAssignment};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Incoming payload for permanent assignment changes.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/permanent-assignment-request.ts"
)]
pub struct PermanentAssignmentRequest {
    pub user_id: String,
    pub region: String,
}

/// API representation of a permanent region assignment.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/permanent-assignment-response.ts"
)]
pub struct PermanentAssignmentResponse {
    pub user_id: String,
    pub region: String,
    pub assigned_by_user_id: String,
    pub assigned_at: String,
}

/// Result of an effective-access check for one user and region.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/effective-access-response.ts"
)]
pub struct EffectiveAccessResponse {
    pub user_id: String,
    pub region: String,
    pub has_access: bool,
    /// `permanent` or `temporary:<grant id>` when access is held.
    pub justification: Option<String>,
}

impl From<PermanentAssignment> for PermanentAssignmentResponse {
    fn from(value: PermanentAssignment) -> Self {
        Self {
            user_id: value.user_id.to_string(),
            region: value.region.as_str().to_owned(),
            assigned_by_user_id: value.assigned_by_user_id.to_string(),
            assigned_at: value.assigned_at.to_rfc3339(),
        }
    }
}

impl From<EffectiveAccess> for EffectiveAccessResponse {
    fn from(value: EffectiveAccess) -> Self {
        Self {
            user_id: value.user_id.to_string(),
            region: value.region.as_str().to_owned(),
            has_access: true,
            justification: Some(value.justification.as_storage_value()),
        }
    }
}
