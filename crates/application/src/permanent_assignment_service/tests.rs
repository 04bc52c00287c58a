use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use geogrant_core::{AppError, AppResult, UserId, UserIdentity};
use geogrant_domain::{AuditAction, Permission, PermanentAssignment, RegionId};
use tokio::sync::Mutex;

use super::PermanentAssignmentService;
use crate::access_ports::PermanentAssignmentRepository;
use crate::audit_ports::{AuditEvent, AuditRepository};
use crate::clock::ManualClock;
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

#[derive(Default)]
struct FakeAssignmentRepository {
    assignments: Mutex<Vec<PermanentAssignment>>,
}

#[async_trait]
impl PermanentAssignmentRepository for FakeAssignmentRepository {
    async fn insert_permanent_assignment(
        &self,
        assignment: &PermanentAssignment,
        _now: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut assignments = self.assignments.lock().await;
        if assignments.iter().any(|existing| {
            existing.user_id == assignment.user_id && existing.region == assignment.region
        }) {
            return Err(AppError::Conflict("already assigned".to_owned()));
        }

        assignments.push(assignment.clone());
        Ok(())
    }

    async fn delete_permanent_assignment(
        &self,
        user_id: UserId,
        region: &RegionId,
        _now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut assignments = self.assignments.lock().await;
        let before = assignments.len();
        assignments.retain(|existing| !(existing.user_id == user_id && &existing.region == region));
        Ok(assignments.len() != before)
    }

    async fn list_permanent_assignments_for_user(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<PermanentAssignment>> {
        Ok(self
            .assignments
            .lock()
            .await
            .iter()
            .filter(|assignment| assignment.user_id == user_id)
            .cloned()
            .collect())
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

struct FailingAuditRepository;

#[async_trait]
impl AuditRepository for FailingAuditRepository {
    async fn append_event(&self, _event: AuditEvent) -> AppResult<()> {
        Err(AppError::Storage("audit sink offline".to_owned()))
    }
}

struct Harness {
    service: PermanentAssignmentService,
    audit: Arc<RecordingAuditRepository>,
    admin: UserIdentity,
    viewer: UserIdentity,
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 20, 8, 30, 0)
        .single()
        .unwrap_or_default()
}

fn authorization(admin: UserId, viewer: UserId) -> AuthorizationService {
    AuthorizationService::new(Arc::new(FakeAuthorizationRepository {
        permissions: HashMap::from([
            (admin, vec![Permission::RegionAssignmentManage]),
            (viewer, vec![Permission::RegionGrantRead]),
        ]),
    }))
}

fn harness() -> Harness {
    let admin = UserIdentity::new(UserId::new());
    let viewer = UserIdentity::new(UserId::new());
    let audit = Arc::new(RecordingAuditRepository::default());
    let service = PermanentAssignmentService::new(
        authorization(admin.user_id(), viewer.user_id()),
        Arc::new(FakeAssignmentRepository::default()),
        audit.clone(),
        Arc::new(ManualClock::new(start())),
    );

    Harness {
        service,
        audit,
        admin,
        viewer,
    }
}

#[tokio::test]
async fn assign_records_actor_and_audits() {
    let harness = harness();
    let user_id = UserId::new();

    let assignment = harness
        .service
        .assign(&harness.admin, user_id, "  eu-central ")
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(assignment.region.as_str(), "eu-central");
    assert_eq!(assignment.assigned_by_user_id, harness.admin.user_id());
    assert_eq!(assignment.assigned_at, start());

    let events = harness.audit.events.lock().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, AuditAction::PermanentAssign);
    assert_eq!(events[0].subject_user_id, user_id);
    assert_eq!(events[0].grant_id, None);
}

#[tokio::test]
async fn assign_requires_assignment_permission() {
    let harness = harness();

    let result = harness
        .service
        .assign(&harness.viewer, UserId::new(), "eu-central")
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
    assert!(harness.audit.events.lock().await.is_empty());
}

#[tokio::test]
async fn assign_rejects_blank_region() {
    let harness = harness();

    let result = harness
        .service
        .assign(&harness.admin, UserId::new(), "   ")
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn unassign_missing_pair_is_not_found() {
    let harness = harness();
    let user_id = UserId::new();

    let assigned = harness
        .service
        .assign(&harness.admin, user_id, "ap-south")
        .await;
    assert!(assigned.is_ok());

    let first = harness
        .service
        .unassign(&harness.admin, user_id, "ap-south")
        .await;
    let second = harness
        .service
        .unassign(&harness.admin, user_id, "ap-south")
        .await;

    assert!(first.is_ok());
    assert!(matches!(second, Err(AppError::NotFound(_))));

    let actions = harness
        .audit
        .events
        .lock()
        .await
        .iter()
        .map(|event| event.action)
        .collect::<Vec<_>>();
    assert_eq!(
        actions,
        vec![AuditAction::PermanentAssign, AuditAction::PermanentUnassign]
    );
}

#[tokio::test]
async fn users_list_their_own_assignments_without_permission() {
    let harness = harness();
    let user = UserIdentity::new(UserId::new());

    let assigned = harness
        .service
        .assign(&harness.admin, user.user_id(), "us-east")
        .await;
    assert!(assigned.is_ok());

    let own = harness
        .service
        .list_for_user(&user, user.user_id())
        .await
        .unwrap_or_default();
    let by_viewer = harness
        .service
        .list_for_user(&harness.viewer, user.user_id())
        .await
        .unwrap_or_default();
    let by_outsider = harness
        .service
        .list_for_user(&UserIdentity::new(UserId::new()), user.user_id())
        .await;

    assert_eq!(own.len(), 1);
    assert_eq!(by_viewer, own);
    assert!(matches!(by_outsider, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn audit_failure_does_not_fail_assignment() {
    let admin = UserIdentity::new(UserId::new());
    let service = PermanentAssignmentService::new(
        authorization(admin.user_id(), UserId::new()),
        Arc::new(FakeAssignmentRepository::default()),
        Arc::new(FailingAuditRepository),
        Arc::new(ManualClock::new(start())),
    );

    let result = service.assign(&admin, UserId::new(), "eu-west").await;

    assert!(result.is_ok());
}
