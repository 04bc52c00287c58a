use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use geogrant_application::{
    EffectiveAccessRepository, GrantRepository, PermanentAssignmentRepository, RegionGrantQuery,
    SweepLease, SweepLeaseCoordinator, validate_sweep_lease_request,
};
use geogrant_core::{AppError, AppResult, UserId};
use geogrant_domain::{
    AccessJustification, EffectiveAccess, GrantId, GrantRevocation, PermanentAssignment,
    RegionAccessGrant, RegionId,
};
use tokio::sync::Mutex;
use uuid::Uuid;

type Pair = (UserId, RegionId);

#[derive(Debug, Default)]
struct GrantState {
    grants: HashMap<GrantId, RegionAccessGrant>,
    permanent_assignments: HashMap<Pair, PermanentAssignment>,
    effective_access: HashMap<Pair, AccessJustification>,
    reconciled: HashSet<GrantId>,
}

impl GrantState {
    fn active_grant_for(&self, pair: &Pair, now: DateTime<Utc>) -> Option<&RegionAccessGrant> {
        self.grants
            .values()
            .filter(|grant| {
                grant.subject_user_id() == pair.0
                    && grant.region() == &pair.1
                    && grant.is_active_at(now)
            })
            .max_by_key(|grant| (grant.expires_at(), grant.grant_id()))
    }

    fn recompute_pair(&mut self, pair: Pair, now: DateTime<Utc>) {
        let justification = AccessJustification::resolve(
            self.permanent_assignments.contains_key(&pair),
            self.active_grant_for(&pair, now).map(RegionAccessGrant::grant_id),
        );

        match justification {
            Some(justification) => {
                self.effective_access.insert(pair, justification);
            }
            None => {
                self.effective_access.remove(&pair);
            }
        }
    }

    fn grant_mut(&mut self, grant_id: GrantId) -> AppResult<&mut RegionAccessGrant> {
        self.grants
            .get_mut(&grant_id)
            .ok_or_else(|| AppError::NotFound(format!("grant '{grant_id}' does not exist")))
    }
}

fn pair_of(grant: &RegionAccessGrant) -> Pair {
    (grant.subject_user_id(), grant.region().clone())
}

/// In-memory grant store for tests and local runs.
///
/// A single mutex guards grants, assignments and the projection together, so
/// every mutation and its projection recompute are atomic.
#[derive(Debug, Default)]
pub struct InMemoryGrantStore {
    state: Mutex<GrantState>,
    sweep_leases: Mutex<HashMap<String, (SweepLease, Instant)>>,
}

impl InMemoryGrantStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GrantRepository for InMemoryGrantStore {
    async fn insert_grant(&self, grant: &RegionAccessGrant, now: DateTime<Utc>) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let pair = pair_of(grant);

        if state.permanent_assignments.contains_key(&pair) {
            return Err(AppError::Conflict(format!(
                "user '{}' already holds a permanent assignment for region '{}'",
                pair.0, pair.1
            )));
        }

        if let Some(active) = state.active_grant_for(&pair, now) {
            return Err(AppError::Conflict(format!(
                "user '{}' already has an active temporary grant '{}' for region '{}'",
                pair.0,
                active.grant_id(),
                pair.1
            )));
        }

        state.grants.insert(grant.grant_id(), grant.clone());
        state.recompute_pair(pair, now);
        Ok(())
    }

    async fn find_grant(&self, grant_id: GrantId) -> AppResult<Option<RegionAccessGrant>> {
        Ok(self.state.lock().await.grants.get(&grant_id).cloned())
    }

    async fn update_grant_expiry(
        &self,
        grant_id: GrantId,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<RegionAccessGrant> {
        let mut state = self.state.lock().await;
        let grant = state.grant_mut(grant_id)?;
        grant.change_expiry(new_expires_at, now)?;
        let updated = grant.clone();

        state.recompute_pair(pair_of(&updated), now);
        Ok(updated)
    }

    async fn revoke_grant(
        &self,
        grant_id: GrantId,
        revocation: GrantRevocation,
    ) -> AppResult<RegionAccessGrant> {
        let now = revocation.revoked_at;
        let mut state = self.state.lock().await;
        let grant = state.grant_mut(grant_id)?;
        grant.revoke(revocation)?;
        let revoked = grant.clone();

        state.recompute_pair(pair_of(&revoked), now);
        Ok(revoked)
    }

    async fn list_grants(
        &self,
        query: &RegionGrantQuery,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<RegionAccessGrant>> {
        let state = self.state.lock().await;
        let mut grants = state
            .grants
            .values()
            .filter(|grant| query.matches(grant, now))
            .cloned()
            .collect::<Vec<_>>();
        grants.sort_by(|left, right| {
            right
                .granted_at()
                .cmp(&left.granted_at())
                .then_with(|| left.grant_id().cmp(&right.grant_id()))
        });

        Ok(grants
            .into_iter()
            .skip(query.offset)
            .take(query.capped_limit())
            .collect())
    }

    async fn list_active_grants_expiring_before(
        &self,
        now: DateTime<Utc>,
        deadline: DateTime<Utc>,
    ) -> AppResult<Vec<RegionAccessGrant>> {
        let state = self.state.lock().await;
        let mut grants = state
            .grants
            .values()
            .filter(|grant| grant.is_active_at(now) && grant.expires_at() < deadline)
            .cloned()
            .collect::<Vec<_>>();
        grants.sort_by_key(|grant| (grant.expires_at(), grant.grant_id()));

        Ok(grants)
    }

    async fn list_unreconciled_expired_grants(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<RegionAccessGrant>> {
        let state = self.state.lock().await;
        let mut grants = state
            .grants
            .values()
            .filter(|grant| {
                grant.revocation().is_none()
                    && grant.expires_at() <= now
                    && !state.reconciled.contains(&grant.grant_id())
            })
            .cloned()
            .collect::<Vec<_>>();
        grants.sort_by_key(|grant| (grant.expires_at(), grant.grant_id()));
        grants.truncate(limit);

        Ok(grants)
    }

    async fn mark_grant_expired(&self, grant_id: GrantId, now: DateTime<Utc>) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let Some(grant) = state.grants.get(&grant_id) else {
            return Ok(false);
        };
        if grant.revocation().is_some() || grant.expires_at() > now {
            return Ok(false);
        }
        let pair = pair_of(grant);

        if !state.reconciled.insert(grant_id) {
            return Ok(false);
        }

        state.recompute_pair(pair, now);
        Ok(true)
    }
}

#[async_trait]
impl EffectiveAccessRepository for InMemoryGrantStore {
    async fn find_effective_access(
        &self,
        user_id: UserId,
        region: &RegionId,
    ) -> AppResult<Option<EffectiveAccess>> {
        let state = self.state.lock().await;

        Ok(state
            .effective_access
            .get(&(user_id, region.clone()))
            .map(|justification| EffectiveAccess {
                user_id,
                region: region.clone(),
                justification: *justification,
            }))
    }

    async fn list_effective_access_for_user(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<EffectiveAccess>> {
        let state = self.state.lock().await;
        let mut rows = state
            .effective_access
            .iter()
            .filter(|((row_user_id, _), _)| *row_user_id == user_id)
            .map(|((row_user_id, region), justification)| EffectiveAccess {
                user_id: *row_user_id,
                region: region.clone(),
                justification: *justification,
            })
            .collect::<Vec<_>>();
        rows.sort_by(|left, right| left.region.cmp(&right.region));

        Ok(rows)
    }

    async fn rebuild_effective_access(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        state.effective_access.clear();

        let pairs = state
            .permanent_assignments
            .keys()
            .cloned()
            .chain(
                state
                    .grants
                    .values()
                    .filter(|grant| grant.is_active_at(now))
                    .map(pair_of),
            )
            .collect::<HashSet<_>>();
        for pair in pairs {
            state.recompute_pair(pair, now);
        }

        Ok(state.effective_access.len() as u64)
    }
}

#[async_trait]
impl PermanentAssignmentRepository for InMemoryGrantStore {
    async fn insert_permanent_assignment(
        &self,
        assignment: &PermanentAssignment,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let pair = (assignment.user_id, assignment.region.clone());

        if state.active_grant_for(&pair, now).is_some() {
            return Err(AppError::Conflict(format!(
                "user '{}' already has an active temporary grant for region '{}'",
                pair.0, pair.1
            )));
        }

        if state.permanent_assignments.contains_key(&pair) {
            return Err(AppError::Conflict(format!(
                "user '{}' is already permanently assigned to region '{}'",
                pair.0, pair.1
            )));
        }

        state
            .permanent_assignments
            .insert(pair.clone(), assignment.clone());
        state.recompute_pair(pair, now);
        Ok(())
    }

    async fn delete_permanent_assignment(
        &self,
        user_id: UserId,
        region: &RegionId,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let pair = (user_id, region.clone());

        if state.permanent_assignments.remove(&pair).is_none() {
            return Ok(false);
        }

        state.recompute_pair(pair, now);
        Ok(true)
    }

    async fn list_permanent_assignments_for_user(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<PermanentAssignment>> {
        let state = self.state.lock().await;
        let mut assignments = state
            .permanent_assignments
            .values()
            .filter(|assignment| assignment.user_id == user_id)
            .cloned()
            .collect::<Vec<_>>();
        assignments.sort_by(|left, right| left.region.cmp(&right.region));

        Ok(assignments)
    }
}

#[async_trait]
impl SweepLeaseCoordinator for InMemoryGrantStore {
    async fn try_acquire_sweep_lease(
        &self,
        scope_key: &str,
        holder_id: &str,
        lease_seconds: u32,
    ) -> AppResult<Option<SweepLease>> {
        validate_sweep_lease_request(scope_key, holder_id, lease_seconds)?;
        let mut leases = self.sweep_leases.lock().await;
        let now = Instant::now();

        if leases
            .get(scope_key)
            .is_some_and(|(_, expires_at)| *expires_at > now)
        {
            return Ok(None);
        }

        let lease = SweepLease {
            scope_key: scope_key.to_owned(),
            holder_id: holder_id.to_owned(),
            token: format!("{holder_id}:{}", Uuid::new_v4()),
        };
        let expires_at = now + Duration::from_secs(u64::from(lease_seconds));
        leases.insert(scope_key.to_owned(), (lease.clone(), expires_at));

        Ok(Some(lease))
    }

    async fn renew_sweep_lease(&self, lease: &SweepLease, lease_seconds: u32) -> AppResult<bool> {
        validate_sweep_lease_request(
            lease.scope_key.as_str(),
            lease.holder_id.as_str(),
            lease_seconds,
        )?;
        let mut leases = self.sweep_leases.lock().await;
        let now = Instant::now();

        match leases.get_mut(lease.scope_key.as_str()) {
            Some((held, expires_at)) if held.token == lease.token && *expires_at > now => {
                *expires_at = now + Duration::from_secs(u64::from(lease_seconds));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_sweep_lease(&self, lease: &SweepLease) -> AppResult<()> {
        let mut leases = self.sweep_leases.lock().await;
        if leases
            .get(lease.scope_key.as_str())
            .is_some_and(|(held, _)| held.token == lease.token)
        {
            leases.remove(lease.scope_key.as_str());
        }

        Ok(())
    }
}
