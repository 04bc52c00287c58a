use std::str::FromStr;

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;

use geogrant_application::{CreateRegionGrantInput, GrantPage, RegionGrantQuery, RegionGrantView};
use geogrant_core::{UserId, UserIdentity};
use geogrant_domain::{GrantId, GrantStatus, RegionId};

use crate::dto::{
    CreateRegionGrantRequest, ExtendRegionGrantRequest, RegionGrantResponse,
    RevokeRegionGrantRequest, parse_timestamp,
};
use crate::error::ApiResult;
use crate::state::AppState;

mod lifecycle;
mod queries;

pub use lifecycle::{
    create_region_grant_handler, extend_region_grant_handler, revoke_region_grant_handler,
};
pub use queries::{
    ExpiringGrantsQuery, GrantPageQuery, RegionGrantListQuery, expiring_region_grants_handler,
    get_region_grant_handler, list_region_grants_handler, my_region_grants_handler,
    region_active_grants_handler, user_active_grants_handler,
};

fn grant_responses(views: Vec<RegionGrantView>) -> Json<Vec<RegionGrantResponse>> {
    Json(views.into_iter().map(RegionGrantResponse::from).collect())
}
