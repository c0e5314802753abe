use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, PublicUser, UserRecord};

/// Failure of a write guarded by the unique username and email constraints.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("username or email already taken")]
    Duplicate,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn classify_write(e: sqlx::Error, what: &'static str) -> WriteError {
    let duplicate = matches!(
        &e,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    );
    if duplicate {
        WriteError::Duplicate
    } else {
        WriteError::Other(anyhow::Error::new(e).context(what))
    }
}

/// Persistence for user records and their stored refresh token.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Public projection by id; used by the session extractor.
    async fn find_public(&self, id: Uuid) -> anyhow::Result<Option<PublicUser>>;

    /// Full record by id, secrets included.
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<UserRecord>>;

    /// Full record matching the username or the email, whichever is given.
    async fn find_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> anyhow::Result<Option<UserRecord>>;

    /// Id of the user owning `email`, if any.
    async fn find_id_by_email(&self, email: &str) -> anyhow::Result<Option<Uuid>>;

    async fn username_or_email_taken(&self, username: &str, email: &str) -> anyhow::Result<bool>;

    /// Fails with `WriteError::Duplicate` when the username or email is already stored.
    async fn create(&self, user: NewUser) -> Result<PublicUser, WriteError>;

    /// Overwrites the stored refresh token. `None` revokes it.
    /// Returns false when the user does not exist.
    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> anyhow::Result<bool>;

    /// Replaces the stored refresh token only if it still equals `expected`.
    /// Returns false when the swap did not happen.
    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        new_token: &str,
    ) -> anyhow::Result<bool>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()>;

    /// Fails with `WriteError::Duplicate` when another user owns `email`.
    async fn update_account(
        &self,
        id: Uuid,
        full_name: &str,
        email: &str,
    ) -> Result<Option<PublicUser>, WriteError>;

    async fn update_avatar(&self, id: Uuid, url: &str) -> anyhow::Result<Option<PublicUser>>;

    async fn update_cover_image(&self, id: Uuid, url: &str) -> anyhow::Result<Option<PublicUser>>;

    async fn append_watch_history(
        &self,
        id: Uuid,
        video_id: Uuid,
    ) -> anyhow::Result<Option<PublicUser>>;

    async fn video_exists(&self, video_id: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_public(&self, id: Uuid) -> anyhow::Result<Option<PublicUser>> {
        let user = sqlx::query_as::<_, PublicUser>(
            r#"
            SELECT id, username, email, full_name, avatar, cover_image,
                   watch_history, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find public user")?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, username, email, full_name, avatar, cover_image, watch_history,
                   password_hash, refresh_token, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn find_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> anyhow::Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, username, email, full_name, avatar, cover_image, watch_history,
                   password_hash, refresh_token, created_at, updated_at
            FROM users
            WHERE ($1::text IS NOT NULL AND username = $1)
               OR ($2::text IS NOT NULL AND email = $2)
            LIMIT 1
            "#,
        )
        .bind(username)
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by login")?;
        Ok(user)
    }

    async fn find_id_by_email(&self, email: &str) -> anyhow::Result<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>(r#"SELECT id FROM users WHERE email = $1"#)
            .bind(email)
            .fetch_optional(&self.db)
            .await
            .context("find user id by email")?;
        Ok(id)
    }

    async fn username_or_email_taken(&self, username: &str, email: &str) -> anyhow::Result<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 OR email = $2)"#,
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.db)
        .await
        .context("check username/email")?;
        Ok(taken)
    }

    async fn create(&self, user: NewUser) -> Result<PublicUser, WriteError> {
        let created = sqlx::query_as::<_, PublicUser>(
            r#"
            INSERT INTO users (id, username, email, full_name, avatar, cover_image, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, username, email, full_name, avatar, cover_image,
                      watch_history, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.avatar)
        .bind(&user.cover_image)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(|e| classify_write(e, "insert user"))?;
        Ok(created)
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"UPDATE users SET refresh_token = $2, updated_at = now() WHERE id = $1"#,
        )
        .bind(id)
        .bind(token)
        .execute(&self.db)
        .await
        .context("set refresh token")?;
        Ok(res.rows_affected() == 1)
    }

    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        new_token: &str,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET refresh_token = $3, updated_at = now()
             WHERE id = $1 AND refresh_token = $2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(new_token)
        .execute(&self.db)
        .await
        .context("rotate refresh token")?;
        Ok(res.rows_affected() == 1)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query(r#"UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1"#)
            .bind(id)
            .bind(password_hash)
            .execute(&self.db)
            .await
            .context("update password")?;
        Ok(())
    }

    async fn update_account(
        &self,
        id: Uuid,
        full_name: &str,
        email: &str,
    ) -> Result<Option<PublicUser>, WriteError> {
        let user = sqlx::query_as::<_, PublicUser>(
            r#"
            UPDATE users
               SET full_name = $2, email = $3, updated_at = now()
             WHERE id = $1
            RETURNING id, username, email, full_name, avatar, cover_image,
                      watch_history, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(full_name)
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| classify_write(e, "update account"))?;
        Ok(user)
    }

    async fn update_avatar(&self, id: Uuid, url: &str) -> anyhow::Result<Option<PublicUser>> {
        let user = sqlx::query_as::<_, PublicUser>(
            r#"
            UPDATE users SET avatar = $2, updated_at = now()
             WHERE id = $1
            RETURNING id, username, email, full_name, avatar, cover_image,
                      watch_history, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(url)
        .fetch_optional(&self.db)
        .await
        .context("update avatar")?;
        Ok(user)
    }

    async fn update_cover_image(&self, id: Uuid, url: &str) -> anyhow::Result<Option<PublicUser>> {
        let user = sqlx::query_as::<_, PublicUser>(
            r#"
            UPDATE users SET cover_image = $2, updated_at = now()
             WHERE id = $1
            RETURNING id, username, email, full_name, avatar, cover_image,
                      watch_history, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(url)
        .fetch_optional(&self.db)
        .await
        .context("update cover image")?;
        Ok(user)
    }

    async fn append_watch_history(
        &self,
        id: Uuid,
        video_id: Uuid,
    ) -> anyhow::Result<Option<PublicUser>> {
        let user = sqlx::query_as::<_, PublicUser>(
            r#"
            UPDATE users
               SET watch_history = array_append(watch_history, $2), updated_at = now()
             WHERE id = $1
            RETURNING id, username, email, full_name, avatar, cover_image,
                      watch_history, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(video_id)
        .fetch_optional(&self.db)
        .await
        .context("append watch history")?;
        Ok(user)
    }

    async fn video_exists(&self, video_id: Uuid) -> anyhow::Result<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>(r#"SELECT EXISTS(SELECT 1 FROM videos WHERE id = $1)"#)
                .bind(video_id)
                .fetch_one(&self.db)
                .await
                .context("check video")?;
        Ok(exists)
    }
}
