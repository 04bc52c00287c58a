use super::*;

use chrono::{DateTime, Utc};
use geogrant_domain::{
    AccessLevel, AuditAction, GrantId, GrantIssue, GrantRevocation, RegionAccessGrant, RegionId,
};
use tracing::info;

use crate::grant_ports::{CreateRegionGrantInput, RegionGrantView};

impl RegionGrantService {
    /// Issues a temporary region grant on behalf of `actor`.
    pub async fn create_grant(
        &self,
        actor: &UserIdentity,
        input: CreateRegionGrantInput,
    ) -> AppResult<RegionGrantView> {
        self.require_manage_permission(actor).await?;

        let now = self.clock.now();
        let grant = RegionAccessGrant::issue(
            GrantIssue {
                subject_user_id: input.subject_user_id,
                region: RegionId::new(input.region)?,
                access_level: AccessLevel::new(input.access_level)?,
                granted_by_user_id: actor.user_id(),
                expires_at: input.expires_at,
                reason: input.reason,
            },
            now,
        )?;

        self.repository.insert_grant(&grant, now).await?;

        info!(
            grant_id = %grant.grant_id(),
            subject_user_id = %grant.subject_user_id(),
            region = %grant.region(),
            "issued temporary region grant"
        );

        self.emit(AuditEvent {
            action: AuditAction::Grant,
            grant_id: Some(grant.grant_id()),
            subject_user_id: grant.subject_user_id(),
            region: grant.region().clone(),
            actor_user_id: Some(actor.user_id()),
            occurred_at: now,
            reason: Some(grant.reason().to_owned()),
            detail: Some(format!(
                "granted '{}' until '{}'",
                grant.access_level().as_str(),
                grant.expires_at().to_rfc3339()
            )),
        })
        .await;

        Ok(RegionGrantView::at(grant, now))
    }

    /// Moves the expiry of an active grant. Shortening is allowed.
    pub async fn extend_grant(
        &self,
        actor: &UserIdentity,
        grant_id: GrantId,
        new_expires_at: DateTime<Utc>,
    ) -> AppResult<RegionGrantView> {
        self.require_manage_permission(actor).await?;

        let now = self.clock.now();
        let grant = self
            .repository
            .update_grant_expiry(grant_id, new_expires_at, now)
            .await?;

        info!(
            grant_id = %grant_id,
            expires_at = %grant.expires_at().to_rfc3339(),
            "changed temporary region grant expiry"
        );

        self.emit(AuditEvent {
            action: AuditAction::Extend,
            grant_id: Some(grant_id),
            subject_user_id: grant.subject_user_id(),
            region: grant.region().clone(),
            actor_user_id: Some(actor.user_id()),
            occurred_at: now,
            reason: None,
            detail: Some(format!(
                "expires_at set to '{}'",
                grant.expires_at().to_rfc3339()
            )),
        })
        .await;

        Ok(RegionGrantView::at(grant, now))
    }

    /// Revokes an active grant before its natural expiry.
    pub async fn revoke_grant(
        &self,
        actor: &UserIdentity,
        grant_id: GrantId,
        reason: Option<String>,
    ) -> AppResult<RegionGrantView> {
        self.require_manage_permission(actor).await?;

        let now = self.clock.now();
        let reason = reason
            .map(|reason| reason.trim().to_owned())
            .filter(|reason| !reason.is_empty());
        let grant = self
            .repository
            .revoke_grant(
                grant_id,
                GrantRevocation {
                    revoked_at: now,
                    revoked_by_user_id: actor.user_id(),
                    reason: reason.clone(),
                },
            )
            .await?;

        info!(grant_id = %grant_id, "revoked temporary region grant");

        self.emit(AuditEvent {
            action: AuditAction::Revoke,
            grant_id: Some(grant_id),
            subject_user_id: grant.subject_user_id(),
            region: grant.region().clone(),
            actor_user_id: Some(actor.user_id()),
            occurred_at: now,
            reason,
            detail: None,
        })
        .await;

        Ok(RegionGrantView::at(grant, now))
    }
}
