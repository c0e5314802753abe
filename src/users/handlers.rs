use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    routing::{get, patch},
    Json, Router,
};
use tracing::instrument;

use super::dto::ChangeInfoRequest;
use super::services;
use crate::auth::dto::UserResponse;
use crate::auth::extractors::CurrentUser;
use crate::auth::handlers::{JSON_BODY_LIMIT, UPLOAD_BODY_LIMIT};
use crate::error::AppResult;
use crate::media::form::UploadForm;
use crate::media::services::ImageKind;
use crate::state::AppState;

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/:user_id", get(get_user))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/change-info", patch(change_info))
        .route("/updateWatchHistory/:video_id", patch(update_watch_history))
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
}

pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/change-avatar", patch(change_avatar))
        .route("/change-cover-image", patch(change_cover_image))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}

/// GET /users/:user_id (public)
#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<UserResponse>> {
    let id = services::parse_id(&user_id, "user")?;
    let user = services::get_profile(&state, id).await?;
    Ok(Json(UserResponse::new("User fetched successfully", user)))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn change_info(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<ChangeInfoRequest>,
) -> AppResult<Json<UserResponse>> {
    let user = services::change_info(&state, user.id, &payload.full_name, &payload.email).await?;
    Ok(Json(UserResponse::new("Account details updated", user)))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn change_avatar(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mp: Multipart,
) -> AppResult<Json<UserResponse>> {
    let mut form = UploadForm::read(mp).await?;
    let updated =
        services::replace_image(&state, &user, ImageKind::Avatar, form.take_file("avatar")).await?;
    Ok(Json(UserResponse::new("Avatar changed", updated)))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn change_cover_image(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mp: Multipart,
) -> AppResult<Json<UserResponse>> {
    let mut form = UploadForm::read(mp).await?;
    let updated =
        services::replace_image(&state, &user, ImageKind::Cover, form.take_file("coverImage"))
            .await?;
    Ok(Json(UserResponse::new("Cover image changed", updated)))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_watch_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(video_id): Path<String>,
) -> AppResult<Json<UserResponse>> {
    let video_id = services::parse_id(&video_id, "video")?;
    let user = services::add_to_watch_history(&state, user.id, video_id).await?;
    Ok(Json(UserResponse::new("User watch history updated", user)))
}
