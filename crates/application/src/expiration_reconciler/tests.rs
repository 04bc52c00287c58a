use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use geogrant_core::{AppError, AppResult, UserId};
use geogrant_domain::{
    AccessLevel, AuditAction, GrantId, GrantIssue, GrantRevocation, RegionAccessGrant, RegionId,
};
use tokio::sync::Mutex;

use super::{ExpirationReconciler, SweepOutcome, SweepReport};
use crate::clock::ManualClock;
use crate::grant_ports::{GrantRepository, RegionGrantQuery};
use crate::sweep_lease_ports::{SweepLease, SweepLeaseCoordinator};
use crate::{AuditEvent, AuditRepository};

#[derive(Default)]
struct SweepableGrants {
    grants: Mutex<Vec<RegionAccessGrant>>,
    reconciled: Mutex<HashSet<GrantId>>,
}

#[async_trait]
impl GrantRepository for SweepableGrants {
    async fn insert_grant(&self, grant: &RegionAccessGrant, _now: DateTime<Utc>) -> AppResult<()> {
        self.grants.lock().await.push(grant.clone());
        Ok(())
    }

    async fn find_grant(&self, grant_id: GrantId) -> AppResult<Option<RegionAccessGrant>> {
        Ok(self
            .grants
            .lock()
            .await
            .iter()
            .find(|grant| grant.grant_id() == grant_id)
            .cloned())
    }

    async fn update_grant_expiry(
        &self,
        _grant_id: GrantId,
        _new_expires_at: DateTime<Utc>,
        _now: DateTime<Utc>,
    ) -> AppResult<RegionAccessGrant> {
        Err(AppError::Internal("unsupported".to_owned()))
    }

    async fn revoke_grant(
        &self,
        grant_id: GrantId,
        revocation: GrantRevocation,
    ) -> AppResult<RegionAccessGrant> {
        let mut grants = self.grants.lock().await;
        let grant = grants
            .iter_mut()
            .find(|grant| grant.grant_id() == grant_id)
            .ok_or_else(|| AppError::NotFound("missing".to_owned()))?;
        grant.revoke(revocation)?;
        Ok(grant.clone())
    }

    async fn list_grants(
        &self,
        _query: &RegionGrantQuery,
        _now: DateTime<Utc>,
    ) -> AppResult<Vec<RegionAccessGrant>> {
        Ok(self.grants.lock().await.clone())
    }

    async fn list_active_grants_expiring_before(
        &self,
        _now: DateTime<Utc>,
        _deadline: DateTime<Utc>,
    ) -> AppResult<Vec<RegionAccessGrant>> {
        Ok(Vec::new())
    }

    async fn list_unreconciled_expired_grants(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<RegionAccessGrant>> {
        let reconciled = self.reconciled.lock().await;
        Ok(self
            .grants
            .lock()
            .await
            .iter()
            .filter(|grant| grant.revocation().is_none() && grant.expires_at() <= now)
            .filter(|grant| !reconciled.contains(&grant.grant_id()))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_grant_expired(&self, grant_id: GrantId, _now: DateTime<Utc>) -> AppResult<bool> {
        Ok(self.reconciled.lock().await.insert(grant_id))
    }
}

#[derive(Default)]
struct RecordingAuditRepository {
    events: Mutex<Vec<AuditEvent>>,
}

#[async_trait]
impl AuditRepository for RecordingAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

#[derive(Default)]
struct FakeSweepLease {
    held: Mutex<Option<SweepLease>>,
    renewable: bool,
}

impl FakeSweepLease {
    fn renewable() -> Self {
        Self {
            held: Mutex::new(None),
            renewable: true,
        }
    }
}

#[async_trait]
impl SweepLeaseCoordinator for FakeSweepLease {
    async fn try_acquire_sweep_lease(
        &self,
        scope_key: &str,
        holder_id: &str,
        _lease_seconds: u32,
    ) -> AppResult<Option<SweepLease>> {
        let mut held = self.held.lock().await;
        if held.is_some() {
            return Ok(None);
        }

        let lease = SweepLease {
            scope_key: scope_key.to_owned(),
            holder_id: holder_id.to_owned(),
            token: format!("{holder_id}:token"),
        };
        *held = Some(lease.clone());
        Ok(Some(lease))
    }

    async fn renew_sweep_lease(&self, lease: &SweepLease, _lease_seconds: u32) -> AppResult<bool> {
        Ok(self.renewable && self.held.lock().await.as_ref() == Some(lease))
    }

    async fn release_sweep_lease(&self, lease: &SweepLease) -> AppResult<()> {
        let mut held = self.held.lock().await;
        if held.as_ref() == Some(lease) {
            *held = None;
        }
        Ok(())
    }
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

fn grant(expires_in: Duration) -> RegionAccessGrant {
    RegionAccessGrant::issue(
        GrantIssue {
            subject_user_id: UserId::new(),
            region: RegionId::new("EMEA").unwrap_or_else(|_| unreachable!()),
            access_level: AccessLevel::new("read").unwrap_or_else(|_| unreachable!()),
            granted_by_user_id: UserId::new(),
            expires_at: start() + expires_in,
            reason: "on-call rotation".to_owned(),
        },
        start(),
    )
    .unwrap_or_else(|_| unreachable!())
}

struct Fixture {
    reconciler: ExpirationReconciler,
    repository: Arc<SweepableGrants>,
    lease: Arc<FakeSweepLease>,
    audit: Arc<RecordingAuditRepository>,
    clock: Arc<ManualClock>,
}

fn fixture_with_lease(batch_size: usize, lease: FakeSweepLease) -> Fixture {
    let repository = Arc::new(SweepableGrants::default());
    let lease = Arc::new(lease);
    let audit = Arc::new(RecordingAuditRepository::default());
    let clock = Arc::new(ManualClock::new(start()));
    let reconciler = ExpirationReconciler::new(
        repository.clone(),
        lease.clone(),
        audit.clone(),
        clock.clone(),
        "worker-a",
        batch_size,
    )
    .unwrap_or_else(|_| unreachable!());

    Fixture {
        reconciler,
        repository,
        lease,
        audit,
        clock,
    }
}

fn fixture(batch_size: usize) -> Fixture {
    fixture_with_lease(batch_size, FakeSweepLease::renewable())
}

async fn seed_elapsed(fixture: &Fixture, count: usize) {
    for _ in 0..count {
        fixture
            .repository
            .insert_grant(&grant(Duration::minutes(1)), start())
            .await
            .unwrap_or_else(|_| unreachable!());
    }
    fixture.clock.advance(Duration::minutes(2));
}

#[test]
fn zero_batch_size_is_rejected() {
    let result = ExpirationReconciler::new(
        Arc::new(SweepableGrants::default()),
        Arc::new(FakeSweepLease::renewable()),
        Arc::new(RecordingAuditRepository::default()),
        Arc::new(ManualClock::new(start())),
        "worker-a",
        0,
    );

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[test]
fn blank_holder_id_is_rejected() {
    let result = ExpirationReconciler::new(
        Arc::new(SweepableGrants::default()),
        Arc::new(FakeSweepLease::renewable()),
        Arc::new(RecordingAuditRepository::default()),
        Arc::new(ManualClock::new(start())),
        "  ",
        10,
    );

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn sweep_emits_one_expire_event_per_grant() {
    let fixture = fixture(2);
    for minutes in [1_i64, 2, 3, 120] {
        fixture
            .repository
            .insert_grant(&grant(Duration::minutes(minutes)), start())
            .await
            .unwrap_or_else(|_| unreachable!());
    }
    fixture.clock.advance(Duration::minutes(5));

    let first = fixture.reconciler.sweep().await;
    assert_eq!(
        first.ok(),
        Some(SweepOutcome::Completed(SweepReport {
            examined: 3,
            expired: 3,
        }))
    );

    let second = fixture.reconciler.sweep().await;
    assert_eq!(
        second.ok(),
        Some(SweepOutcome::Completed(SweepReport::default()))
    );

    let events = fixture.audit.events.lock().await;
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|event| event.action == AuditAction::Expire));
    assert!(events.iter().all(|event| event.actor_user_id.is_none()));
}

#[tokio::test]
async fn sweep_ignores_revoked_grants() {
    let fixture = fixture(10);
    let revoked = grant(Duration::minutes(1));
    fixture
        .repository
        .insert_grant(&revoked, start())
        .await
        .unwrap_or_else(|_| unreachable!());
    fixture
        .repository
        .revoke_grant(
            revoked.grant_id(),
            GrantRevocation {
                revoked_at: start(),
                revoked_by_user_id: UserId::new(),
                reason: None,
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    fixture.clock.advance(Duration::minutes(2));

    let outcome = fixture.reconciler.sweep().await;

    assert_eq!(
        outcome.ok(),
        Some(SweepOutcome::Completed(SweepReport::default()))
    );
    assert!(fixture.audit.events.lock().await.is_empty());
}

#[tokio::test]
async fn concurrent_sweep_is_skipped() {
    let fixture = fixture(10);
    let _running = fixture.reconciler.running.lock().await;

    let outcome = fixture.reconciler.sweep().await;

    assert_eq!(outcome.ok(), Some(SweepOutcome::Skipped));
}

#[tokio::test]
async fn sweep_is_skipped_while_another_process_holds_the_lease() {
    let fixture = fixture(10);
    seed_elapsed(&fixture, 1).await;
    let foreign = fixture
        .lease
        .try_acquire_sweep_lease("expiration_sweep", "worker-b", 60)
        .await
        .unwrap_or_else(|_| unreachable!())
        .unwrap_or_else(|| unreachable!());

    let skipped = fixture.reconciler.sweep().await;
    assert_eq!(skipped.ok(), Some(SweepOutcome::Skipped));
    assert!(fixture.audit.events.lock().await.is_empty());

    let released = fixture.lease.release_sweep_lease(&foreign).await;
    assert!(released.is_ok());

    let completed = fixture.reconciler.sweep().await;
    assert_eq!(
        completed.ok(),
        Some(SweepOutcome::Completed(SweepReport {
            examined: 1,
            expired: 1,
        }))
    );
}

#[tokio::test]
async fn sweep_releases_its_lease() {
    let fixture = fixture(10);
    seed_elapsed(&fixture, 2).await;

    let outcome = fixture.reconciler.sweep().await;

    assert!(matches!(outcome, Ok(SweepOutcome::Completed(_))));
    assert!(fixture.lease.held.lock().await.is_none());
}

#[tokio::test]
async fn lost_lease_stops_sweep_after_current_batch() {
    let fixture = fixture_with_lease(1, FakeSweepLease::default());
    seed_elapsed(&fixture, 3).await;

    let outcome = fixture.reconciler.sweep().await;

    assert_eq!(
        outcome.ok(),
        Some(SweepOutcome::Completed(SweepReport {
            examined: 1,
            expired: 1,
        }))
    );
    assert_eq!(fixture.audit.events.lock().await.len(), 1);
}

#[tokio::test]
async fn run_stops_when_shutdown_resolves() {
    let fixture = fixture(10);
    fixture
        .repository
        .insert_grant(&grant(Duration::seconds(1)), start())
        .await
        .unwrap_or_else(|_| unreachable!());
    fixture.clock.advance(Duration::seconds(2));

    fixture
        .reconciler
        .run(std::time::Duration::from_millis(5), async {
            tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        })
        .await;

    assert_eq!(fixture.audit.events.lock().await.len(), 1);
}
