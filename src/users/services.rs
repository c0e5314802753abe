use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::repo_types::PublicUser;
use crate::auth::services::{conflict_or_persistence, is_valid_email};
use crate::error::{AppError, AppResult};
use crate::media::services::{delete_image, upload_image, ImageKind, UploadItem};
use crate::state::AppState;

pub(super) fn parse_id(raw: &str, what: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::Validation(format!("Invalid {what} id")))
}

#[instrument(skip(st))]
pub async fn get_profile(st: &AppState, user_id: Uuid) -> AppResult<PublicUser> {
    st.users
        .find_public(user_id)
        .await
        .map_err(AppError::Persistence)?
        .ok_or(AppError::UserNotFound)
}

#[instrument(skip(st, full_name, email))]
pub async fn change_info(
    st: &AppState,
    user_id: Uuid,
    full_name: &str,
    email: &str,
) -> AppResult<PublicUser> {
    let full_name = full_name.trim();
    let email = email.trim().to_lowercase();
    if full_name.is_empty() || email.is_empty() {
        return Err(AppError::Validation("All fields are required".into()));
    }
    if !is_valid_email(&email) {
        return Err(AppError::Validation("Invalid email".into()));
    }

    let owner = st
        .users
        .find_id_by_email(&email)
        .await
        .map_err(AppError::Persistence)?;
    if owner.is_some_and(|id| id != user_id) {
        warn!(%email, "email already in use");
        return Err(AppError::Conflict("Email already in use".into()));
    }

    let user = st
        .users
        .update_account(user_id, full_name, &email)
        .await
        .map_err(|e| conflict_or_persistence(e, "Email already in use"))?
        .ok_or(AppError::UserNotFound)?;
    info!(%user_id, "account details changed");
    Ok(user)
}

/// Uploads the new image first, then points the user at it and drops the old object.
/// The new object is deleted again when the user could not be updated.
#[instrument(skip(st, current, file))]
pub async fn replace_image(
    st: &AppState,
    current: &PublicUser,
    kind: ImageKind,
    file: Option<UploadItem>,
) -> AppResult<PublicUser> {
    let file = file.filter(|f| !f.body.is_empty()).ok_or_else(|| {
        AppError::Validation(match kind {
            ImageKind::Avatar => "Avatar file is missing".into(),
            ImageKind::Cover => "Cover image file is missing".into(),
        })
    })?;

    let url = upload_image(st, kind, file).await?;
    let (updated, old) = match kind {
        ImageKind::Avatar => (
            st.users.update_avatar(current.id, &url).await,
            Some(current.avatar.as_str()),
        ),
        ImageKind::Cover => (
            st.users.update_cover_image(current.id, &url).await,
            current.cover_image.as_deref(),
        ),
    };
    let updated = match updated
        .map_err(AppError::Persistence)
        .and_then(|u| u.ok_or(AppError::UserNotFound))
    {
        Ok(updated) => updated,
        Err(e) => {
            delete_image(st, &url).await;
            return Err(e);
        }
    };

    if let Some(old) = old.filter(|o| !o.is_empty()) {
        delete_image(st, old).await;
    }
    info!(user_id = %current.id, ?kind, "image replaced");
    Ok(updated)
}

#[instrument(skip(st))]
pub async fn add_to_watch_history(
    st: &AppState,
    user_id: Uuid,
    video_id: Uuid,
) -> AppResult<PublicUser> {
    let exists = st
        .users
        .video_exists(video_id)
        .await
        .map_err(AppError::Persistence)?;
    if !exists {
        return Err(AppError::NotFound("Video not found".into()));
    }
    st.users
        .append_watch_history(user_id, video_id)
        .await
        .map_err(AppError::Persistence)?
        .ok_or(AppError::UserNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::memory::InMemoryUserStore;
    use crate::auth::repo::UserStore;
    use crate::auth::repo_types::NewUser;
    use crate::storage::FakeStorage;
    use bytes::Bytes;

    fn png() -> UploadItem {
        UploadItem {
            body: Bytes::from_static(b"\x89PNG\r\n"),
            content_type: "image/png".into(),
        }
    }

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.into(),
            email: format!("{name}@example.com"),
            full_name: "Test User".into(),
            avatar: "https://fake.local/avatars/old.png".into(),
            cover_image: None,
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn replace_image_swaps_objects() {
        let store = InMemoryUserStore::new();
        let storage = FakeStorage::default();
        let st = AppState::fake_with(store.clone(), storage.clone());
        let user = store.create(new_user("gina")).await.unwrap();

        let updated = replace_image(&st, &user, ImageKind::Avatar, Some(png()))
            .await
            .unwrap();
        let key = updated.avatar.strip_prefix("https://fake.local/").unwrap();
        assert_eq!(storage.keys(), vec![key.to_string()]);
    }

    #[tokio::test]
    async fn replace_image_discards_upload_when_user_is_gone() {
        let store = InMemoryUserStore::new();
        let storage = FakeStorage::default();
        let st = AppState::fake_with(store.clone(), storage.clone());
        let user = store.create(new_user("hank")).await.unwrap();
        store.remove(user.id).await;

        let res = replace_image(&st, &user, ImageKind::Cover, Some(png())).await;
        assert!(matches!(res, Err(AppError::UserNotFound)));
        assert!(storage.keys().is_empty());
    }

    #[tokio::test]
    async fn change_info_rejects_email_of_another_user() {
        let store = InMemoryUserStore::new();
        let st = AppState::fake_with_store(store.clone());
        let ivy = store.create(new_user("ivy")).await.unwrap();
        store.create(new_user("jack")).await.unwrap();

        let res = change_info(&st, ivy.id, "Ivy", "JACK@example.com").await;
        assert!(matches!(res, Err(AppError::Conflict(_))));
    }

    #[test]
    fn parse_id_rejects_garbage() {
        assert!(matches!(parse_id("nope", "video"), Err(AppError::Validation(_))));
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string(), "video").unwrap(), id);
    }
}
