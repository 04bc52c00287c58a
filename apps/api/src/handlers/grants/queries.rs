use super::*;

const DEFAULT_EXPIRING_WINDOW_SECONDS: i64 = 3_600;

#[derive(Debug, Default, serde::Deserialize)]
pub struct RegionGrantListQuery {
    pub subject_user_id: Option<String>,
    pub region: Option<String>,
    pub status: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct GrantPageQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl GrantPageQuery {
    fn page(&self) -> GrantPage {
        GrantPage {
            limit: self.limit.unwrap_or(GrantPage::DEFAULT_LIMIT),
            offset: self.offset.unwrap_or(0),
        }
    }
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct ExpiringGrantsQuery {
    pub window_seconds: Option<i64>,
}

pub async fn list_region_grants_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(query): Query<RegionGrantListQuery>,
) -> ApiResult<Json<Vec<RegionGrantResponse>>> {
    let query = RegionGrantQuery {
        subject_user_id: query
            .subject_user_id
            .as_deref()
            .map(UserId::parse)
            .transpose()?,
        region: query.region.map(RegionId::new).transpose()?,
        status: query
            .status
            .as_deref()
            .map(GrantStatus::from_str)
            .transpose()?,
        limit: query.limit.unwrap_or(GrantPage::DEFAULT_LIMIT),
        offset: query.offset.unwrap_or(0),
    };

    let grants = state.region_grant_service.list_grants(&user, query).await?;

    Ok(grant_responses(grants))
}

pub async fn get_region_grant_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(grant_id): Path<String>,
) -> ApiResult<Json<RegionGrantResponse>> {
    let grant_id = GrantId::parse(grant_id.as_str())?;
    let grant = state.region_grant_service.find_grant(&user, grant_id).await?;

    Ok(Json(RegionGrantResponse::from(grant)))
}

pub async fn my_region_grants_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(page): Query<GrantPageQuery>,
) -> ApiResult<Json<Vec<RegionGrantResponse>>> {
    let grants = state
        .region_grant_service
        .my_active_grants(&user, page.page())
        .await?;

    Ok(grant_responses(grants))
}

pub async fn expiring_region_grants_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(query): Query<ExpiringGrantsQuery>,
) -> ApiResult<Json<Vec<RegionGrantResponse>>> {
    let grants = state
        .region_grant_service
        .expiring_soon(
            &user,
            query
                .window_seconds
                .unwrap_or(DEFAULT_EXPIRING_WINDOW_SECONDS),
        )
        .await?;

    Ok(grant_responses(grants))
}

pub async fn region_active_grants_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(region): Path<String>,
    Query(page): Query<GrantPageQuery>,
) -> ApiResult<Json<Vec<RegionGrantResponse>>> {
    let grants = state
        .region_grant_service
        .active_grants_for_region(&user, region.as_str(), page.page())
        .await?;

    Ok(grant_responses(grants))
}

pub async fn user_active_grants_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(user_id): Path<String>,
    Query(page): Query<GrantPageQuery>,
) -> ApiResult<Json<Vec<RegionGrantResponse>>> {
    let user_id = UserId::parse(user_id.as_str())?;
    let grants = state
        .region_grant_service
        .active_grants_for_user(&user, user_id, page.page())
        .await?;

    Ok(grant_responses(grants))
}
