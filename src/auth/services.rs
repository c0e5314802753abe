use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::auth::password::{hash_password_blocking, verify_password_blocking};
use crate::auth::repo::WriteError;
use crate::auth::repo_types::{NewUser, PublicUser};
use crate::error::{AppError, AppResult};
use crate::media::services::{delete_image, upload_image, ImageKind, UploadItem};
use crate::state::AppState;

pub(crate) const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Turns a lost unique-constraint race into a 409 carrying `message`.
pub(crate) fn conflict_or_persistence(e: WriteError, message: &str) -> AppError {
    match e {
        WriteError::Duplicate => {
            warn!(reason = message, "unique constraint rejected write");
            AppError::Conflict(message.into())
        }
        WriteError::Other(e) => AppError::Persistence(e),
    }
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

fn sign_pair(st: &AppState, user: &PublicUser) -> AppResult<TokenPair> {
    let access_token = st
        .jwt
        .sign_access(user)
        .map_err(|e| AppError::Internal(format!("sign access token: {e}")))?;
    let refresh_token = st
        .jwt
        .sign_refresh(user.id)
        .map_err(|e| AppError::Internal(format!("sign refresh token: {e}")))?;
    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Mints a token pair and stores the refresh token, replacing whatever was stored.
#[instrument(skip(st, user), fields(user_id = %user.id))]
pub async fn issue_tokens(st: &AppState, user: &PublicUser) -> AppResult<TokenPair> {
    let pair = sign_pair(st, user)?;
    let stored = st
        .users
        .set_refresh_token(user.id, Some(&pair.refresh_token))
        .await
        .map_err(AppError::Persistence)?;
    if !stored {
        return Err(AppError::Persistence(anyhow::anyhow!(
            "user {} disappeared while issuing tokens",
            user.id
        )));
    }
    Ok(pair)
}

/// Mints a token pair and swaps it in only if `presented` is still the stored token.
#[instrument(skip(st, user, presented), fields(user_id = %user.id))]
pub async fn rotate_tokens(st: &AppState, user: &PublicUser, presented: &str) -> AppResult<TokenPair> {
    let pair = sign_pair(st, user)?;
    let swapped = st
        .users
        .rotate_refresh_token(user.id, presented, &pair.refresh_token)
        .await
        .map_err(AppError::Persistence)?;
    if !swapped {
        warn!("refresh token rotated concurrently");
        return Err(AppError::RefreshTokenMismatch);
    }
    Ok(pair)
}

#[derive(Debug, Default)]
pub struct Registration {
    pub full_name: String,
    pub email: String,
    pub username: String,
    pub password: String,
}

#[instrument(skip_all, fields(username = %reg.username))]
pub async fn register(
    st: &AppState,
    reg: Registration,
    avatar: Option<UploadItem>,
    cover_image: Option<UploadItem>,
) -> AppResult<(PublicUser, TokenPair)> {
    let full_name = reg.full_name.trim().to_string();
    let email = reg.email.trim().to_lowercase();
    let username = reg.username.trim().to_lowercase();

    if [&full_name, &email, &username].iter().any(|f| f.is_empty())
        || reg.password.trim().is_empty()
    {
        return Err(AppError::Validation("All fields are required".into()));
    }
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }
    if reg.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation("Password too short".into()));
    }

    let taken = st
        .users
        .username_or_email_taken(&username, &email)
        .await
        .map_err(AppError::Persistence)?;
    if taken {
        warn!(%username, %email, "username or email already registered");
        return Err(AppError::Conflict("User already exists".into()));
    }

    let avatar = avatar
        .filter(|a| !a.body.is_empty())
        .ok_or_else(|| AppError::Validation("Avatar is required".into()))?;

    let avatar_url = upload_image(st, ImageKind::Avatar, avatar).await?;
    let cover_url = match cover_image.filter(|c| !c.body.is_empty()) {
        Some(c) => match upload_image(st, ImageKind::Cover, c).await {
            Ok(url) => Some(url),
            Err(e) => {
                delete_image(st, &avatar_url).await;
                return Err(e);
            }
        },
        None => None,
    };

    let created: AppResult<PublicUser> = async {
        let password_hash = hash_password_blocking(reg.password).await?;
        st.users
            .create(NewUser {
                username,
                email,
                full_name,
                avatar: avatar_url.clone(),
                cover_image: cover_url.clone(),
                password_hash,
            })
            .await
            .map_err(|e| conflict_or_persistence(e, "User already exists"))
    }
    .await;
    let user = match created {
        Ok(user) => user,
        Err(e) => {
            delete_image(st, &avatar_url).await;
            if let Some(cover_url) = &cover_url {
                delete_image(st, cover_url).await;
            }
            return Err(e);
        }
    };

    let pair = issue_tokens(st, &user).await?;
    info!(user_id = %user.id, "user registered");
    Ok((user, pair))
}

#[instrument(skip(st, password))]
pub async fn login(
    st: &AppState,
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
) -> AppResult<(PublicUser, TokenPair)> {
    let username = username
        .map(|u| u.trim().to_lowercase())
        .filter(|u| !u.is_empty());
    let email = email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());
    if username.is_none() && email.is_none() {
        return Err(AppError::MissingCredentials);
    }
    let password = password
        .filter(|p| !p.is_empty())
        .ok_or(AppError::MissingCredentials)?;

    let Some(user) = st
        .users
        .find_by_login(username.as_deref(), email.as_deref())
        .await
        .map_err(AppError::Persistence)?
    else {
        warn!("login for unknown user");
        return Err(AppError::UserNotFound);
    };

    if !verify_password_blocking(password, user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let user: PublicUser = user.into();
    let pair = issue_tokens(st, &user).await?;
    info!(user_id = %user.id, "user logged in");
    Ok((user, pair))
}

/// Exchanges a stored refresh token for a new pair, invalidating the old one.
#[instrument(skip_all)]
pub async fn refresh(st: &AppState, presented: Option<String>) -> AppResult<TokenPair> {
    let presented = presented
        .filter(|t| !t.trim().is_empty())
        .ok_or(AppError::MissingRefreshToken)?;

    let claims = st.jwt.verify_refresh(&presented).map_err(|e| {
        debug!(error = %e, "refresh token rejected");
        AppError::InvalidRefreshToken
    })?;

    let user = st
        .users
        .find_by_id(claims.sub)
        .await
        .map_err(AppError::Persistence)?
        .ok_or(AppError::InvalidRefreshToken)?;

    if user.refresh_token.as_deref() != Some(presented.as_str()) {
        warn!(user_id = %user.id, "stale or revoked refresh token presented");
        return Err(AppError::RefreshTokenMismatch);
    }

    let user: PublicUser = user.into();
    let pair = rotate_tokens(st, &user, &presented).await?;
    info!(user_id = %user.id, "tokens rotated");
    Ok(pair)
}

#[instrument(skip(st))]
pub async fn logout(st: &AppState, user_id: Uuid) -> AppResult<()> {
    st.users
        .set_refresh_token(user_id, None)
        .await
        .map_err(AppError::Persistence)?;
    info!(%user_id, "user logged out");
    Ok(())
}

#[instrument(skip(st, old_password, new_password))]
pub async fn change_password(
    st: &AppState,
    user_id: Uuid,
    old_password: String,
    new_password: String,
) -> AppResult<()> {
    if old_password == new_password {
        return Err(AppError::Validation("New password must be different".into()));
    }
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation("Password too short".into()));
    }

    let user = st
        .users
        .find_by_id(user_id)
        .await
        .map_err(AppError::Persistence)?
        .ok_or(AppError::UserNotFound)?;

    if !verify_password_blocking(old_password, user.password_hash).await? {
        return Err(AppError::Validation("Invalid password".into()));
    }

    let hash = hash_password_blocking(new_password).await?;
    st.users
        .update_password(user_id, &hash)
        .await
        .map_err(AppError::Persistence)?;
    info!(%user_id, "password changed");
    Ok(())
}
