use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;

use geogrant_core::{UserId, UserIdentity};

use crate::dto::{EffectiveAccessResponse, PermanentAssignmentRequest, PermanentAssignmentResponse};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, serde::Deserialize)]
pub struct AssignmentListQuery {
    pub user_id: String,
}

pub async fn assign_region_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<PermanentAssignmentRequest>,
) -> ApiResult<(StatusCode, Json<PermanentAssignmentResponse>)> {
    let user_id = UserId::parse(payload.user_id.as_str())?;
    let assignment = state
        .permanent_assignment_service
        .assign(&user, user_id, payload.region.as_str())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PermanentAssignmentResponse::from(assignment)),
    ))
}

pub async fn unassign_region_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<PermanentAssignmentRequest>,
) -> ApiResult<StatusCode> {
    let user_id = UserId::parse(payload.user_id.as_str())?;
    state
        .permanent_assignment_service
        .unassign(&user, user_id, payload.region.as_str())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_assignments_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(query): Query<AssignmentListQuery>,
) -> ApiResult<Json<Vec<PermanentAssignmentResponse>>> {
    let user_id = UserId::parse(query.user_id.as_str())?;
    let assignments = state
        .permanent_assignment_service
        .list_for_user(&user, user_id)
        .await?
        .into_iter()
        .map(PermanentAssignmentResponse::from)
        .collect();

    Ok(Json(assignments))
}

pub async fn effective_access_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path((user_id, region)): Path<(String, String)>,
) -> ApiResult<Json<EffectiveAccessResponse>> {
    let user_id = UserId::parse(user_id.as_str())?;
    let access = state
        .effective_access_service
        .effective_access_for(&user, user_id, region.as_str())
        .await?;

    let response = match access {
        Some(access) => EffectiveAccessResponse::from(access),
        None => EffectiveAccessResponse {
            user_id: user_id.to_string(),
            region: region.trim().to_owned(),
            has_access: false,
            justification: None,
        },
    };

    Ok(Json(response))
}

pub async fn list_user_access_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<EffectiveAccessResponse>>> {
    let user_id = UserId::parse(user_id.as_str())?;
    let rows = state
        .effective_access_service
        .list_for_user(&user, user_id)
        .await?
        .into_iter()
        .map(EffectiveAccessResponse::from)
        .collect();

    Ok(Json(rows))
}
