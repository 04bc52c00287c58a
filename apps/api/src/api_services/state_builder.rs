use std::sync::Arc;

use geogrant_application::{
    AuthorizationService, Clock, EffectiveAccessService, ExpirationReconciler,
    PermanentAssignmentService, RegionGrantService, SystemClock,
};
use geogrant_core::AppError;
use geogrant_infrastructure::{
    PostgresAuditRepository, PostgresAuthorizationRepository, PostgresGrantStore,
};
use sqlx::PgPool;

use crate::api_config::ApiConfig;
use crate::state::AppState;

pub fn build_app_state(pool: PgPool, config: &ApiConfig) -> Result<AppState, AppError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let grant_store = Arc::new(PostgresGrantStore::new(pool.clone()));
    let audit_repository = Arc::new(PostgresAuditRepository::new(pool.clone()));
    let authorization_service =
        AuthorizationService::new(Arc::new(PostgresAuthorizationRepository::new(pool.clone())));

    let expiration_reconciler = ExpirationReconciler::new(
        grant_store.clone(),
        grant_store.clone(),
        audit_repository.clone(),
        clock.clone(),
        format!("api-{}", std::process::id()),
        config.reconciler_batch_size,
    )?;

    Ok(AppState {
        region_grant_service: RegionGrantService::new(
            authorization_service.clone(),
            grant_store.clone(),
            audit_repository.clone(),
            clock.clone(),
        ),
        permanent_assignment_service: PermanentAssignmentService::new(
            authorization_service.clone(),
            grant_store.clone(),
            audit_repository,
            clock.clone(),
        ),
        effective_access_service: EffectiveAccessService::new(
            authorization_service.clone(),
            grant_store.clone(),
            grant_store,
            clock,
        ),
        expiration_reconciler,
        authorization_service,
        shared_secret: Arc::from(config.shared_secret.as_str()),
        postgres_pool: Some(pool),
    })
}
