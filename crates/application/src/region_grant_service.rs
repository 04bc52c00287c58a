use std::sync::Arc;

use geogrant_core::{AppResult, UserId, UserIdentity};
use geogrant_domain::Permission;

use crate::AuthorizationService;
use crate::audit_ports::{AuditEvent, AuditRepository, append_best_effort};
use crate::clock::Clock;
use crate::grant_ports::GrantRepository;

mod lifecycle;
mod queries;

/// Application service for the temporary region grant lifecycle.
#[derive(Clone)]
pub struct RegionGrantService {
    authorization_service: AuthorizationService,
    repository: Arc<dyn GrantRepository>,
    audit_repository: Arc<dyn AuditRepository>,
    clock: Arc<dyn Clock>,
}

impl RegionGrantService {
    /// Creates a new region grant service.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        repository: Arc<dyn GrantRepository>,
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

    async fn require_manage_permission(&self, actor: &UserIdentity) -> AppResult<()> {
        self.authorization_service
            .require_permission(actor.user_id(), Permission::RegionGrantManage)
            .await
    }

    async fn require_read_permission(&self, actor: &UserIdentity) -> AppResult<()> {
        self.authorization_service
            .require_any_permission(
                actor.user_id(),
                &[Permission::RegionGrantRead, Permission::RegionGrantManage],
            )
            .await
    }

    async fn require_read_for_subject(
        &self,
        actor: &UserIdentity,
        subject_user_id: UserId,
    ) -> AppResult<()> {
        if actor.user_id() == subject_user_id {
            return Ok(());
        }

        self.require_read_permission(actor).await
    }

    async fn emit(&self, event: AuditEvent) {
        append_best_effort(self.audit_repository.as_ref(), event).await;
    }
}
