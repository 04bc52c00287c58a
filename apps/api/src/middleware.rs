use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use geogrant_core::{AppError, UserId, UserIdentity};

use crate::error::ApiResult;
use crate::state::AppState;

/// Header carrying the actor id asserted by the upstream gateway.
pub const USER_ID_HEADER: &str = "x-geogrant-user-id";

/// Resolves the caller from trusted gateway headers.
///
/// Requests must carry `Authorization: Bearer <shared secret>` and an actor
/// id header; the resolved [`UserIdentity`] is stored in request extensions.
pub async fn require_gateway_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let identity = gateway_identity(request.headers(), &state.shared_secret)?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

pub(crate) fn gateway_identity(
    headers: &HeaderMap,
    shared_secret: &str,
) -> Result<UserIdentity, AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("bearer credentials required".to_owned()))?;

    if !secrets_match(token.trim().as_bytes(), shared_secret.as_bytes()) {
        return Err(AppError::Unauthorized(
            "invalid gateway credentials".to_owned(),
        ));
    }

    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized(format!("{USER_ID_HEADER} header is required")))?;
    let user_id = UserId::parse(user_id)
        .map_err(|_| AppError::Unauthorized(format!("{USER_ID_HEADER} must be a UUID")))?;

    Ok(UserIdentity::new(user_id))
}

fn secrets_match(presented: &[u8], expected: &[u8]) -> bool {
    if presented.len() != expected.len() {
        return false;
    }

    presented
        .iter()
        .zip(expected)
        .fold(0_u8, |difference, (left, right)| difference | (left ^ right))
        == 0
}
