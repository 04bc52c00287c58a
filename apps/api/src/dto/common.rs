use geogrant_application::{SweepOutcome, SweepReport};
use serde::Serialize;
use ts_rs::TS;

/// Health response payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/health-response.ts"
)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ready: bool,
    pub postgres: HealthDependencyStatus,
}

/// One runtime dependency health status.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/health-dependency-status.ts"
)]
pub struct HealthDependencyStatus {
    pub status: &'static str,
    pub detail: Option<String>,
}

/// Result of an on-demand expiration sweep.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/reconcile-response.ts"
)]
pub struct ReconcileResponse {
    /// `completed` or `skipped`.
    pub status: &'static str,
    pub examined: u32,
    pub expired: u32,
}

impl From<SweepOutcome> for ReconcileResponse {
    fn from(value: SweepOutcome) -> Self {
        match value {
            SweepOutcome::Completed(SweepReport { examined, expired }) => Self {
                status: "completed",
                examined: u32::try_from(examined).unwrap_or(u32::MAX),
                expired: u32::try_from(expired).unwrap_or(u32::MAX),
            },
            SweepOutcome::Skipped => Self {
                status: "skipped",
                examined: 0,
                expired: 0,
            },
        }
    }
}

/// Result of replaying the effective-access projection.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/rebuild-access-response.ts"
)]
pub struct RebuildAccessResponse {
    #[ts(type = "number")]
    pub rows: u64,
}
