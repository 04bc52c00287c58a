use std::sync::Arc;

use geogrant_core::{AppError, AppResult, UserId, UserIdentity};
use geogrant_domain::{AuditAction, Permission, PermanentAssignment, RegionId};
use tracing::info;

use crate::AuthorizationService;
use crate::access_ports::PermanentAssignmentRepository;
use crate::audit_ports::{AuditEvent, AuditRepository, append_best_effort};
use crate::clock::Clock;

/// Write side of the permanent region assignment path.
///
/// Shares the projection tagging discipline with temporary grants so neither
/// path removes a row the other still justifies.
#[derive(Clone)]
pub struct PermanentAssignmentService {
    authorization_service: AuthorizationService,
    repository: Arc<dyn PermanentAssignmentRepository>,
    audit_repository: Arc<dyn AuditRepository>,
    clock: Arc<dyn Clock>,
}

impl PermanentAssignmentService {
    /// Creates a new permanent assignment service.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        repository: Arc<dyn PermanentAssignmentRepository>,
        audit_repository: Arc<dyn AuditRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            authorization_service,
            repository,
            audit_repository,
            clock,
        }
    }

    /// Permanently assigns a region to a user.
    pub async fn assign(
        &self,
        actor: &UserIdentity,
        user_id: UserId,
        region: &str,
    ) -> AppResult<PermanentAssignment> {
        self.require_assignment_permission(actor).await?;

        let now = self.clock.now();
        let assignment = PermanentAssignment {
            user_id,
            region: RegionId::new(region)?,
            assigned_by_user_id: actor.user_id(),
            assigned_at: now,
        };

        self.repository
            .insert_permanent_assignment(&assignment, now)
            .await?;

        info!(
            user_id = %user_id,
            region = %assignment.region,
            "assigned region permanently"
        );

        append_best_effort(
            self.audit_repository.as_ref(),
            AuditEvent {
                action: AuditAction::PermanentAssign,
                grant_id: None,
                subject_user_id: user_id,
                region: assignment.region.clone(),
                actor_user_id: Some(actor.user_id()),
                occurred_at: now,
                reason: None,
                detail: None,
            },
        )
        .await;

        Ok(assignment)
    }

    /// Removes a permanent region assignment.
    pub async fn unassign(
        &self,
        actor: &UserIdentity,
        user_id: UserId,
        region: &str,
    ) -> AppResult<()> {
        self.require_assignment_permission(actor).await?;

        let now = self.clock.now();
        let region = RegionId::new(region)?;
        let removed = self
            .repository
            .delete_permanent_assignment(user_id, &region, now)
            .await?;

        if !removed {
            return Err(AppError::NotFound(format!(
                "user '{user_id}' has no permanent assignment for region '{region}'"
            )));
        }

        info!(user_id = %user_id, region = %region, "removed permanent region assignment");

        append_best_effort(
            self.audit_repository.as_ref(),
            AuditEvent {
                action: AuditAction::PermanentUnassign,
                grant_id: None,
                subject_user_id: user_id,
                region,
                actor_user_id: Some(actor.user_id()),
                occurred_at: now,
                reason: None,
                detail: None,
            },
        )
        .await;

        Ok(())
    }

    /// Lists permanent assignments of one user.
    pub async fn list_for_user(
        &self,
        actor: &UserIdentity,
        user_id: UserId,
    ) -> AppResult<Vec<PermanentAssignment>> {
        if actor.user_id() != user_id {
            self.authorization_service
                .require_any_permission(
                    actor.user_id(),
                    &[
                        Permission::RegionAssignmentManage,
                        Permission::RegionGrantRead,
                    ],
                )
                .await?;
        }

        self.repository
            .list_permanent_assignments_for_user(user_id)
            .await
    }

    async fn require_assignment_permission(&self, actor: &UserIdentity) -> AppResult<()> {
        self.authorization_service
            .require_permission(actor.user_id(), Permission::RegionAssignmentManage)
            .await
    }
}

#[cfg(test)]
mod tests;
