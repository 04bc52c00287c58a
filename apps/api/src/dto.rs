mod access;
mod common;
mod grants;

pub use access::{
    EffectiveAccessResponse, PermanentAssignmentRequest, PermanentAssignmentResponse,
};
pub use common::{
    HealthDependencyStatus, HealthResponse, RebuildAccessResponse, ReconcileResponse,
};
pub(crate) use grants::parse_timestamp;
pub use grants::{
    CreateRegionGrantRequest, ExtendRegionGrantRequest, RegionGrantResponse,
    RemainingTimeResponse, RevokeRegionGrantRequest,
};

#[cfg(test)]
mod tests {
    use super::{
        CreateRegionGrantRequest, EffectiveAccessResponse, ExtendRegionGrantRequest,
        HealthDependencyStatus, HealthResponse, PermanentAssignmentRequest,
        PermanentAssignmentResponse, RebuildAccessResponse, ReconcileResponse,
        RegionGrantResponse, RemainingTimeResponse, RevokeRegionGrantRequest,
    };

    use geogrant_application::{SweepOutcome, SweepReport};
    use serde_json::json;
    use ts_rs::Config;
    use ts_rs::TS;

    use crate::error::ErrorResponse;

    #[test]
    fn export_ts_bindings() -> Result<(), ts_rs::ExportError> {
        let config = Config::default();

        CreateRegionGrantRequest::export(&config)?;
        ExtendRegionGrantRequest::export(&config)?;
        RevokeRegionGrantRequest::export(&config)?;
        RemainingTimeResponse::export(&config)?;
        RegionGrantResponse::export(&config)?;
        PermanentAssignmentRequest::export(&config)?;
        PermanentAssignmentResponse::export(&config)?;
        EffectiveAccessResponse::export(&config)?;
        ReconcileResponse::export(&config)?;
        RebuildAccessResponse::export(&config)?;
        HealthDependencyStatus::export(&config)?;
        HealthResponse::export(&config)?;
        ErrorResponse::export(&config)?;

        Ok(())
    }

    #[test]
    fn revoke_request_accepts_missing_reason() {
        let request = serde_json::from_str::<RevokeRegionGrantRequest>("{}")
            .unwrap_or_else(|_| unreachable!());

        assert_eq!(request.reason, None);
    }

    #[test]
    fn create_request_requires_expiry() {
        let parsed = serde_json::from_value::<CreateRegionGrantRequest>(json!({
            "subject_user_id": "7b6f5a3e-1c1d-4c5e-9a55-0f3f4d8f2a11",
            "region": "eu-west",
            "access_level": "read_only",
            "reason": "on-call handover",
        }));

        assert!(parsed.is_err());
    }

    #[test]
    fn skipped_sweep_serializes_with_zero_counters() {
        let skipped = serde_json::to_value(ReconcileResponse::from(SweepOutcome::Skipped))
            .unwrap_or_default();
        let completed = serde_json::to_value(ReconcileResponse::from(SweepOutcome::Completed(
            SweepReport {
                examined: 3,
                expired: 2,
            },
        )))
        .unwrap_or_default();

        assert_eq!(
            skipped,
            json!({ "status": "skipped", "examined": 0, "expired": 0 })
        );
        assert_eq!(
            completed,
            json!({ "status": "completed", "examined": 3, "expired": 2 })
        );
    }
}
