use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use tracing::debug;

use super::cookie::{get_cookie, ACCESS_COOKIE_NAME, ACCESS_TOKEN_HEADER};
use super::repo_types::PublicUser;
use crate::error::AppError;
use crate::state::AppState;

/// The `accesstoken` header wins over the `accessToken` cookie.
pub(crate) fn access_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(ACCESS_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .or_else(|| get_cookie(headers, ACCESS_COOKIE_NAME))
}

/// Session gate for protected routes.
///
/// No token is a 401, an unverifiable or expired token is a 401, and a
/// token whose user no longer exists is a 404. Otherwise the user's public
/// projection is handed to the handler.
pub struct CurrentUser(pub PublicUser);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = access_token(&parts.headers).ok_or(AppError::MissingToken)?;

        let claims = state.jwt.verify_access(token).map_err(|e| {
            debug!(error = %e, "access token rejected");
            AppError::InvalidOrExpiredToken
        })?;

        let user = state
            .users
            .find_public(claims.sub)
            .await
            .map_err(AppError::Persistence)?
            .ok_or(AppError::UserNotFound)?;

        Ok(CurrentUser(user))
    }
}
