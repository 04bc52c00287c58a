use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use geogrant_core::{AppError, AppResult};
use geogrant_domain::AuditAction;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::audit_ports::{AuditEvent, AuditRepository, append_best_effort};
use crate::clock::Clock;
use crate::grant_ports::GrantRepository;
use crate::sweep_lease_ports::{EXPIRATION_SWEEP_SCOPE, SweepLease, SweepLeaseCoordinator};

const SWEEP_LEASE_SECONDS: u32 = 300;

/// Counters produced by one completed sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Elapsed grants examined.
    pub examined: usize,
    /// Grants newly folded into `expired`.
    pub expired: usize,
}

/// Result of a sweep request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// The sweep ran to completion.
    Completed(SweepReport),
    /// Another sweep was already running in this or another process; nothing was done.
    Skipped,
}

/// Folds elapsed grants into `expired` and prunes their projection rows.
#[derive(Clone)]
pub struct ExpirationReconciler {
    repository: Arc<dyn GrantRepository>,
    lease_coordinator: Arc<dyn SweepLeaseCoordinator>,
    audit_repository: Arc<dyn AuditRepository>,
    clock: Arc<dyn Clock>,
    holder_id: String,
    batch_size: usize,
    running: Arc<Mutex<()>>,
}

impl ExpirationReconciler {
    /// Creates a reconciler that folds at most `batch_size` grants per batch.
    ///
    /// `holder_id` names this process in the shared sweep lease.
    pub fn new(
        repository: Arc<dyn GrantRepository>,
        lease_coordinator: Arc<dyn SweepLeaseCoordinator>,
        audit_repository: Arc<dyn AuditRepository>,
        clock: Arc<dyn Clock>,
        holder_id: impl Into<String>,
        batch_size: usize,
    ) -> AppResult<Self> {
        let holder_id = holder_id.into();
        if holder_id.trim().is_empty() {
            return Err(AppError::Validation(
                "reconciler holder id must not be empty".to_owned(),
            ));
        }

        if batch_size == 0 {
            return Err(AppError::Validation(
                "reconciler batch size must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            repository,
            lease_coordinator,
            audit_repository,
            clock,
            holder_id,
            batch_size,
            running: Arc::new(Mutex::new(())),
        })
    }

    /// Runs one sweep unless another is in progress.
    ///
    /// Overlap within this process is caught by a local lock; overlap with other
    /// processes by the shared sweep lease.
    pub async fn sweep(&self) -> AppResult<SweepOutcome> {
        let Ok(_guard) = self.running.try_lock() else {
            return Ok(SweepOutcome::Skipped);
        };

        let Some(lease) = self
            .lease_coordinator
            .try_acquire_sweep_lease(
                EXPIRATION_SWEEP_SCOPE,
                self.holder_id.as_str(),
                SWEEP_LEASE_SECONDS,
            )
            .await?
        else {
            debug!(holder_id = %self.holder_id, "sweep lease held elsewhere");
            return Ok(SweepOutcome::Skipped);
        };

        let result = self.sweep_batches(&lease).await;

        if let Err(error) = self.lease_coordinator.release_sweep_lease(&lease).await {
            warn!(
                holder_id = %self.holder_id,
                error = %error,
                "failed to release sweep lease"
            );
        }

        let report = result?;
        if report.expired > 0 {
            info!(
                holder_id = %self.holder_id,
                examined = report.examined,
                expired = report.expired,
                "reconciled expired region grants"
            );
        }

        Ok(SweepOutcome::Completed(report))
    }

    async fn sweep_batches(&self, lease: &SweepLease) -> AppResult<SweepReport> {
        let mut report = SweepReport::default();
        loop {
            let now = self.clock.now();
            let batch = self
                .repository
                .list_unreconciled_expired_grants(now, self.batch_size)
                .await?;
            let batch_len = batch.len();
            let mut batch_expired = 0;

            for grant in batch {
                report.examined += 1;
                if !self
                    .repository
                    .mark_grant_expired(grant.grant_id(), now)
                    .await?
                {
                    continue;
                }

                batch_expired += 1;
                append_best_effort(
                    self.audit_repository.as_ref(),
                    AuditEvent {
                        action: AuditAction::Expire,
                        grant_id: Some(grant.grant_id()),
                        subject_user_id: grant.subject_user_id(),
                        region: grant.region().clone(),
                        actor_user_id: None,
                        occurred_at: now,
                        reason: None,
                        detail: Some(format!(
                            "expired at '{}'",
                            grant.expires_at().to_rfc3339()
                        )),
                    },
                )
                .await;
            }

            report.expired += batch_expired;
            if batch_len < self.batch_size || batch_expired == 0 {
                break;
            }

            if !self
                .lease_coordinator
                .renew_sweep_lease(lease, SWEEP_LEASE_SECONDS)
                .await?
            {
                warn!(holder_id = %self.holder_id, "sweep lease lost, stopping early");
                break;
            }
        }

        Ok(report)
    }

    /// Sweeps on a fixed interval until `shutdown` resolves.
    ///
    /// Sweep failures are logged and retried on the next tick.
    pub async fn run<F>(&self, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("expiration reconciler stopping");
                    return;
                }
                _ = ticker.tick() => {
                    match self.sweep().await {
                        Ok(SweepOutcome::Completed(_)) => {}
                        Ok(SweepOutcome::Skipped) => {
                            debug!(
                                holder_id = %self.holder_id,
                                "sweep already running, skipping tick"
                            );
                        }
                        Err(error) => {
                            error!(error = %error, "expiration sweep failed");
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests;
