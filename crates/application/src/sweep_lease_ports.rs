use async_trait::async_trait;
use geogrant_core::{AppError, AppResult};

/// Scope key shared by every expiration sweeper.
pub const EXPIRATION_SWEEP_SCOPE: &str = "expiration_sweep";

/// One held sweep lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepLease {
    /// Leased scope.
    pub scope_key: String,
    /// Process that holds the lease.
    pub holder_id: String,
    /// Ownership token checked on renew and release.
    pub token: String,
}

/// Cross-process coordination port so only one sweep runs at a time.
#[async_trait]
pub trait SweepLeaseCoordinator: Send + Sync {
    /// Attempts to acquire the lease for `scope_key`; `None` while another holder owns it.
    async fn try_acquire_sweep_lease(
        &self,
        scope_key: &str,
        holder_id: &str,
        lease_seconds: u32,
    ) -> AppResult<Option<SweepLease>>;

    /// Extends a held lease and returns false when token ownership changed.
    async fn renew_sweep_lease(&self, lease: &SweepLease, lease_seconds: u32) -> AppResult<bool>;

    /// Releases a lease using token compare-and-delete semantics.
    async fn release_sweep_lease(&self, lease: &SweepLease) -> AppResult<()>;
}

/// Rejects blank scope or holder ids and zero-length leases.
pub fn validate_sweep_lease_request(
    scope_key: &str,
    holder_id: &str,
    lease_seconds: u32,
) -> AppResult<()> {
    if scope_key.trim().is_empty() {
        return Err(AppError::Validation(
            "sweep lease scope_key must not be empty".to_owned(),
        ));
    }

    if holder_id.trim().is_empty() {
        return Err(AppError::Validation(
            "sweep lease holder_id must not be empty".to_owned(),
        ));
    }

    if lease_seconds == 0 {
        return Err(AppError::Validation(
            "sweep lease_seconds must be greater than zero".to_owned(),
        ));
    }

    Ok(())
}
