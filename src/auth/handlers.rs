use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use tracing::instrument;

use super::cookie::{cleared_cookies, get_cookie, session_cookies, REFRESH_COOKIE_NAME};
use super::dto::{
    ChangePasswordRequest, LoginRequest, MessageResponse, RefreshRequest, RefreshResponse,
    UserResponse,
};
use super::extractors::CurrentUser;
use super::services::{self, Registration};
use crate::error::AppResult;
use crate::media::form::UploadForm;
use crate::state::AppState;

pub const JSON_BODY_LIMIT: usize = 16 * 1024;
pub const UPLOAD_BODY_LIMIT: usize = 10 * 1024 * 1024;

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/refresh-token", post(refresh_token))
        .route("/current-user", post(current_user))
        .route("/change-password", post(change_password))
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
}

pub fn register_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}

/// POST /users/register (multipart: fullName, email, username, password, avatar, coverImage?)
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    mp: Multipart,
) -> AppResult<(StatusCode, HeaderMap, Json<UserResponse>)> {
    let mut form = UploadForm::read(mp).await?;
    let reg = Registration {
        full_name: form.take_text("fullName"),
        email: form.take_text("email"),
        username: form.take_text("username"),
        password: form.take_text("password"),
    };
    let avatar = form.take_file("avatar");
    let cover = form.take_file("coverImage");

    let (user, pair) = services::register(&state, reg, avatar, cover).await?;
    let cookies = session_cookies(&pair.access_token, &pair.refresh_token, &state.config.cookies);
    Ok((
        StatusCode::CREATED,
        cookies,
        Json(UserResponse::new("User registered successfully", user)),
    ))
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(HeaderMap, Json<UserResponse>)> {
    let (user, pair) =
        services::login(&state, payload.username, payload.email, payload.password).await?;
    let cookies = session_cookies(&pair.access_token, &pair.refresh_token, &state.config.cookies);
    Ok((cookies, Json(UserResponse::new("User logged in successfully", user))))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn logout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<(HeaderMap, Json<MessageResponse>)> {
    services::logout(&state, user.id).await?;
    Ok((
        cleared_cookies(&state.config.cookies),
        Json(MessageResponse::ok("User logged out")),
    ))
}

#[instrument(skip_all)]
pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<RefreshRequest>>,
) -> AppResult<(HeaderMap, Json<RefreshResponse>)> {
    let presented = get_cookie(&headers, REFRESH_COOKIE_NAME)
        .map(str::to_string)
        .or_else(|| body.and_then(|Json(b)| b.refresh_token));

    let pair = services::refresh(&state, presented).await?;
    let cookies = session_cookies(&pair.access_token, &pair.refresh_token, &state.config.cookies);
    Ok((
        cookies,
        Json(RefreshResponse {
            success: true,
            message: "Access token refreshed",
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }),
    ))
}

pub async fn current_user(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::new("User fetched successfully", user))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    services::change_password(&state, user.id, payload.old_password, payload.new_password).await?;
    Ok(Json(MessageResponse::ok("Password changed successfully")))
}
