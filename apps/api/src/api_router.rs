use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

pub fn build_router(app_state: AppState) -> Router {
    let protected_routes = Router::new()
        .route(
            "/api/grants",
            get(handlers::grants::list_region_grants_handler)
                .post(handlers::grants::create_region_grant_handler),
        )
        .route(
            "/api/grants/mine",
            get(handlers::grants::my_region_grants_handler),
        )
        .route(
            "/api/grants/expiring",
            get(handlers::grants::expiring_region_grants_handler),
        )
        .route(
            "/api/grants/{grant_id}",
            get(handlers::grants::get_region_grant_handler),
        )
        .route(
            "/api/grants/{grant_id}/expiry",
            put(handlers::grants::extend_region_grant_handler),
        )
        .route(
            "/api/grants/{grant_id}/revoke",
            post(handlers::grants::revoke_region_grant_handler),
        )
        .route(
            "/api/regions/{region}/grants",
            get(handlers::grants::region_active_grants_handler),
        )
        .route(
            "/api/users/{user_id}/grants",
            get(handlers::grants::user_active_grants_handler),
        )
        .route(
            "/api/assignments",
            get(handlers::access::list_assignments_handler)
                .post(handlers::access::assign_region_handler)
                .delete(handlers::access::unassign_region_handler),
        )
        .route(
            "/api/access/{user_id}",
            get(handlers::access::list_user_access_handler),
        )
        .route(
            "/api/access/{user_id}/{region}",
            get(handlers::access::effective_access_handler),
        )
        .route(
            "/api/internal/reconcile",
            post(handlers::reconcile::reconcile_expired_grants_handler),
        )
        .route(
            "/api/internal/access/rebuild",
            post(handlers::reconcile::rebuild_effective_access_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_gateway_identity,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
