use super::*;

pub async fn create_region_grant_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<CreateRegionGrantRequest>,
) -> ApiResult<(StatusCode, Json<RegionGrantResponse>)> {
    let subject_user_id = UserId::parse(payload.subject_user_id.as_str())?;
    let expires_at = parse_timestamp("expires_at", payload.expires_at.as_str())?;

    let grant = state
        .region_grant_service
        .create_grant(
            &user,
            CreateRegionGrantInput {
                subject_user_id,
                region: payload.region,
                access_level: payload.access_level,
                expires_at,
                reason: payload.reason,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(RegionGrantResponse::from(grant))))
}

pub async fn extend_region_grant_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(grant_id): Path<String>,
    Json(payload): Json<ExtendRegionGrantRequest>,
) -> ApiResult<Json<RegionGrantResponse>> {
    let grant_id = GrantId::parse(grant_id.as_str())?;
    let expires_at = parse_timestamp("expires_at", payload.expires_at.as_str())?;

    let grant = state
        .region_grant_service
        .extend_grant(&user, grant_id, expires_at)
        .await?;

    Ok(Json(RegionGrantResponse::from(grant)))
}

pub async fn revoke_region_grant_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(grant_id): Path<String>,
    payload: Option<Json<RevokeRegionGrantRequest>>,
) -> ApiResult<Json<RegionGrantResponse>> {
    let grant_id = GrantId::parse(grant_id.as_str())?;
    let payload = payload.map(|Json(payload)| payload).unwrap_or_default();

    let grant = state
        .region_grant_service
        .revoke_grant(&user, grant_id, payload.reason)
        .await?;

    Ok(Json(RegionGrantResponse::from(grant)))
}
