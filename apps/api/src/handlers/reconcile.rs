use axum::Json;
use axum::extract::{Extension, State};

use geogrant_core::UserIdentity;
use geogrant_domain::Permission;

use crate::dto::{RebuildAccessResponse, ReconcileResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn reconcile_expired_grants_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
) -> ApiResult<Json<ReconcileResponse>> {
    state
        .authorization_service
        .require_permission(user.user_id(), Permission::RegionGrantManage)
        .await?;

    let outcome = state.expiration_reconciler.sweep().await?;

    Ok(Json(ReconcileResponse::from(outcome)))
}

pub async fn rebuild_effective_access_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
) -> ApiResult<Json<RebuildAccessResponse>> {
    state
        .authorization_service
        .require_permission(user.user_id(), Permission::RegionAssignmentManage)
        .await?;

    let rows = state.effective_access_service.rebuild().await?;

    Ok(Json(RebuildAccessResponse { rows }))
}
