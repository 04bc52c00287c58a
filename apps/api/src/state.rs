use std::sync::Arc;

use geogrant_application::{
    AuthorizationService, EffectiveAccessService, ExpirationReconciler,
    PermanentAssignmentService, RegionGrantService,
};
use sqlx::PgPool;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub region_grant_service: RegionGrantService,
    pub permanent_assignment_service: PermanentAssignmentService,
    pub effective_access_service: EffectiveAccessService,
    pub expiration_reconciler: ExpirationReconciler,
    pub authorization_service: AuthorizationService,
    pub shared_secret: Arc<str>,
    pub postgres_pool: Option<PgPool>,
}
