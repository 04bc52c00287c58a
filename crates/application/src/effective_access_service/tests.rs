use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use geogrant_core::{AppError, AppResult, UserId, UserIdentity};
use geogrant_domain::{
    AccessJustification, AccessLevel, EffectiveAccess, GrantId, GrantIssue, GrantRevocation,
    Permission, RegionAccessGrant, RegionId,
};

use super::EffectiveAccessService;
use crate::access_ports::EffectiveAccessRepository;
use crate::clock::ManualClock;
use crate::grant_ports::{GrantRepository, RegionGrantQuery};
use crate::{AuthorizationRepository, AuthorizationService};

struct FakeAuthorizationRepository {
    permissions: HashMap<UserId, Vec<Permission>>,
}

#[async_trait]
impl AuthorizationRepository for FakeAuthorizationRepository {
    async fn list_permissions_for_user(&self, user_id: UserId) -> AppResult<Vec<Permission>> {
        Ok(self.permissions.get(&user_id).cloned().unwrap_or_default())
    }
}

struct FakeProjection {
    rows: Vec<EffectiveAccess>,
}

#[async_trait]
impl EffectiveAccessRepository for FakeProjection {
    async fn find_effective_access(
        &self,
        user_id: UserId,
        region: &RegionId,
    ) -> AppResult<Option<EffectiveAccess>> {
        Ok(self
            .rows
            .iter()
            .find(|row| row.user_id == user_id && &row.region == region)
            .cloned())
    }

    async fn list_effective_access_for_user(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<EffectiveAccess>> {
        Ok(self
            .rows
            .iter()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn rebuild_effective_access(&self, _now: DateTime<Utc>) -> AppResult<u64> {
        Ok(self.rows.len() as u64)
    }
}

struct FixedGrants {
    grants: Vec<RegionAccessGrant>,
}

#[async_trait]
impl GrantRepository for FixedGrants {
    async fn insert_grant(&self, _grant: &RegionAccessGrant, _now: DateTime<Utc>) -> AppResult<()> {
        Err(AppError::Internal("read-only fake".to_owned()))
    }

    async fn find_grant(&self, grant_id: GrantId) -> AppResult<Option<RegionAccessGrant>> {
        Ok(self
            .grants
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
        Err(AppError::Internal("read-only fake".to_owned()))
    }

    async fn revoke_grant(
        &self,
        _grant_id: GrantId,
        _revocation: GrantRevocation,
    ) -> AppResult<RegionAccessGrant> {
        Err(AppError::Internal("read-only fake".to_owned()))
    }

    async fn list_grants(
        &self,
        _query: &RegionGrantQuery,
        _now: DateTime<Utc>,
    ) -> AppResult<Vec<RegionAccessGrant>> {
        Ok(self.grants.clone())
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
        _now: DateTime<Utc>,
        _limit: usize,
    ) -> AppResult<Vec<RegionAccessGrant>> {
        Ok(Vec::new())
    }

    async fn mark_grant_expired(&self, _grant_id: GrantId, _now: DateTime<Utc>) -> AppResult<bool> {
        Ok(false)
    }
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

fn region(code: &str) -> RegionId {
    RegionId::new(code).unwrap_or_else(|_| unreachable!())
}

fn grant_for(user_id: UserId, code: &str, expires_in: Duration) -> RegionAccessGrant {
    RegionAccessGrant::issue(
        GrantIssue {
            subject_user_id: user_id,
            region: region(code),
            access_level: AccessLevel::new("read_write").unwrap_or_else(|_| unreachable!()),
            granted_by_user_id: UserId::new(),
            expires_at: start() + expires_in,
            reason: "incident response".to_owned(),
        },
        start(),
    )
    .unwrap_or_else(|_| unreachable!())
}

struct Fixture {
    service: EffectiveAccessService,
    clock: Arc<ManualClock>,
    user_id: UserId,
}

fn fixture(rows: Vec<EffectiveAccess>, grants: Vec<RegionAccessGrant>, user_id: UserId) -> Fixture {
    let clock = Arc::new(ManualClock::new(start()));
    let service = EffectiveAccessService::new(
        AuthorizationService::new(Arc::new(FakeAuthorizationRepository {
            permissions: HashMap::new(),
        })),
        Arc::new(FakeProjection { rows }),
        Arc::new(FixedGrants { grants }),
        clock.clone(),
    );

    Fixture {
        service,
        clock,
        user_id,
    }
}

#[tokio::test]
async fn permanent_row_always_grants_access() {
    let user_id = UserId::new();
    let fixture = fixture(
        vec![EffectiveAccess {
            user_id,
            region: region("APAC"),
            justification: AccessJustification::Permanent,
        }],
        Vec::new(),
        user_id,
    );

    let allowed = fixture.service.has_access(fixture.user_id, &region("APAC")).await;

    assert!(matches!(allowed, Ok(true)));
}

#[tokio::test]
async fn stale_temporary_row_is_ignored_after_expiry() {
    let user_id = UserId::new();
    let grant = grant_for(user_id, "APAC", Duration::minutes(30));
    let fixture = fixture(
        vec![EffectiveAccess {
            user_id,
            region: region("APAC"),
            justification: grant.justification(),
        }],
        vec![grant],
        user_id,
    );

    let before = fixture.service.has_access(user_id, &region("APAC")).await;
    assert!(matches!(before, Ok(true)));

    fixture.clock.advance(Duration::minutes(30));
    let after = fixture.service.has_access(user_id, &region("APAC")).await;
    assert!(matches!(after, Ok(false)));
}

#[tokio::test]
async fn missing_row_denies_access() {
    let user_id = UserId::new();
    let fixture = fixture(Vec::new(), Vec::new(), user_id);

    let allowed = fixture.service.has_access(user_id, &region("LATAM")).await;

    assert!(matches!(allowed, Ok(false)));
}

#[tokio::test]
async fn list_for_user_drops_rows_without_active_grant() {
    let user_id = UserId::new();
    let live = grant_for(user_id, "EMEA", Duration::hours(2));
    let fixture = fixture(
        vec![
            EffectiveAccess {
                user_id,
                region: region("EMEA"),
                justification: live.justification(),
            },
            EffectiveAccess {
                user_id,
                region: region("NA"),
                justification: AccessJustification::Temporary(GrantId::new()),
            },
        ],
        vec![live],
        user_id,
    );
    let actor = UserIdentity::new(user_id);

    let rows = fixture
        .service
        .list_for_user(&actor, user_id)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].region.as_str(), "EMEA");
}

#[tokio::test]
async fn reading_other_users_access_requires_permission() {
    let user_id = UserId::new();
    let fixture = fixture(Vec::new(), Vec::new(), user_id);
    let outsider = UserIdentity::new(UserId::new());

    let result = fixture
        .service
        .effective_access_for(&outsider, user_id, "EMEA")
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}
