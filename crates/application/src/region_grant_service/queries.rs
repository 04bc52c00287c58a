use super::*;

use chrono::Duration;
use geogrant_core::AppError;
use geogrant_domain::{GrantId, GrantStatus, RegionId};

use crate::grant_ports::{GrantPage, RegionGrantQuery, RegionGrantView};

impl RegionGrantService {
    /// Loads one grant with its time-derived fields.
    ///
    /// Subjects may always read their own grants.
    pub async fn find_grant(
        &self,
        actor: &UserIdentity,
        grant_id: GrantId,
    ) -> AppResult<RegionGrantView> {
        let grant = self
            .repository
            .find_grant(grant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("grant '{grant_id}' does not exist")))?;

        self.require_read_for_subject(actor, grant.subject_user_id())
            .await?;

        Ok(RegionGrantView::at(grant, self.clock.now()))
    }

    /// Lists grants with filters and pagination.
    pub async fn list_grants(
        &self,
        actor: &UserIdentity,
        query: RegionGrantQuery,
    ) -> AppResult<Vec<RegionGrantView>> {
        query.ensure_offset_in_range()?;

        match query.subject_user_id {
            Some(subject_user_id) => {
                self.require_read_for_subject(actor, subject_user_id)
                    .await?
            }
            None => self.require_read_permission(actor).await?,
        }

        let now = self.clock.now();
        let grants = self.repository.list_grants(&query, now).await?;

        Ok(grants
            .into_iter()
            .map(|grant| RegionGrantView::at(grant, now))
            .collect())
    }

    /// Lists one page of active grants held by one subject.
    pub async fn active_grants_for_user(
        &self,
        actor: &UserIdentity,
        subject_user_id: UserId,
        page: GrantPage,
    ) -> AppResult<Vec<RegionGrantView>> {
        self.list_grants(actor, RegionGrantQuery::active_for_user(subject_user_id, page))
            .await
    }

    /// Lists one page of active grants on one region.
    pub async fn active_grants_for_region(
        &self,
        actor: &UserIdentity,
        region: &str,
        page: GrantPage,
    ) -> AppResult<Vec<RegionGrantView>> {
        let region = RegionId::new(region)?;
        self.list_grants(actor, RegionGrantQuery::active_for_region(region, page))
            .await
    }

    /// Lists the caller's own active grants. Needs no grantor permission.
    pub async fn my_active_grants(
        &self,
        actor: &UserIdentity,
        page: GrantPage,
    ) -> AppResult<Vec<RegionGrantView>> {
        self.active_grants_for_user(actor, actor.user_id(), page)
            .await
    }

    /// Lists active grants with at most `window_seconds` remaining, soonest
    /// expiry first.
    pub async fn expiring_soon(
        &self,
        actor: &UserIdentity,
        window_seconds: i64,
    ) -> AppResult<Vec<RegionGrantView>> {
        self.require_read_permission(actor).await?;

        if window_seconds < 0 {
            return Err(AppError::Validation(format!(
                "window_seconds must not be negative, got {window_seconds}"
            )));
        }

        let now = self.clock.now();
        let deadline = window_seconds
            .checked_add(1)
            .and_then(Duration::try_seconds)
            .and_then(|window| now.checked_add_signed(window))
            .ok_or_else(|| {
                AppError::Validation(format!("window_seconds {window_seconds} is out of range"))
            })?;

        let grants = self
            .repository
            .list_active_grants_expiring_before(now, deadline)
            .await?;

        let mut views = grants
            .into_iter()
            .map(|grant| RegionGrantView::at(grant, now))
            .filter(|view| {
                view.status == GrantStatus::Active && view.seconds_remaining <= window_seconds
            })
            .collect::<Vec<_>>();
        views.sort_by_key(|view| view.grant.expires_at());

        Ok(views)
    }
}
