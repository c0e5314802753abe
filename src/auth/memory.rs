use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::repo::{UserStore, WriteError};
use crate::auth::repo_types::{NewUser, PublicUser, UserRecord};

/// In-memory `UserStore` used by tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, UserRecord>>>,
    videos: Arc<RwLock<HashSet<Uuid>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_video(&self, id: Uuid) {
        self.videos.write().await.insert(id);
    }

    pub async fn stored_refresh_token(&self, id: Uuid) -> Option<String> {
        self.users
            .read()
            .await
            .get(&id)
            .and_then(|u| u.refresh_token.clone())
    }

    pub async fn password_hash(&self, id: Uuid) -> Option<String> {
        self.users.read().await.get(&id).map(|u| u.password_hash.clone())
    }

    pub async fn remove(&self, id: Uuid) {
        self.users.write().await.remove(&id);
    }

    async fn update<F>(&self, id: Uuid, f: F) -> Option<PublicUser>
    where
        F: FnOnce(&mut UserRecord),
    {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id)?;
        f(user);
        user.updated_at = OffsetDateTime::now_utc();
        Some(user.clone().into())
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_public(&self, id: Uuid) -> anyhow::Result<Option<PublicUser>> {
        Ok(self.users.read().await.get(&id).cloned().map(Into::into))
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<UserRecord>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> anyhow::Result<Option<UserRecord>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| {
                username.is_some_and(|n| u.username == n) || email.is_some_and(|e| u.email == e)
            })
            .cloned())
    }

    async fn find_id_by_email(&self, email: &str) -> anyhow::Result<Option<Uuid>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).map(|u| u.id))
    }

    async fn username_or_email_taken(&self, username: &str, email: &str) -> anyhow::Result<bool> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .any(|u| u.username == username || u.email == email))
    }

    async fn create(&self, user: NewUser) -> Result<PublicUser, WriteError> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(WriteError::Duplicate);
        }
        let now = OffsetDateTime::now_utc();
        let record = UserRecord {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            avatar: user.avatar,
            cover_image: user.cover_image,
            watch_history: Vec::new(),
            password_hash: user.password_hash,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(record.id, record.clone());
        Ok(record.into())
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> anyhow::Result<bool> {
        let token = token.map(str::to_string);
        Ok(self.update(id, |u| u.refresh_token = token).await.is_some())
    }

    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        new_token: &str,
    ) -> anyhow::Result<bool> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&id) else {
            return Ok(false);
        };
        if user.refresh_token.as_deref() != Some(expected) {
            return Ok(false);
        }
        user.refresh_token = Some(new_token.to_string());
        user.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        let hash = password_hash.to_string();
        self.update(id, |u| u.password_hash = hash).await;
        Ok(())
    }

    async fn update_account(
        &self,
        id: Uuid,
        full_name: &str,
        email: &str,
    ) -> Result<Option<PublicUser>, WriteError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.id != id && u.email == email) {
            return Err(WriteError::Duplicate);
        }
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        user.full_name = full_name.to_string();
        user.email = email.to_string();
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone().into()))
    }

    async fn update_avatar(&self, id: Uuid, url: &str) -> anyhow::Result<Option<PublicUser>> {
        Ok(self.update(id, |u| u.avatar = url.to_string()).await)
    }

    async fn update_cover_image(&self, id: Uuid, url: &str) -> anyhow::Result<Option<PublicUser>> {
        Ok(self
            .update(id, |u| u.cover_image = Some(url.to_string()))
            .await)
    }

    async fn append_watch_history(
        &self,
        id: Uuid,
        video_id: Uuid,
    ) -> anyhow::Result<Option<PublicUser>> {
        Ok(self.update(id, |u| u.watch_history.push(video_id)).await)
    }

    async fn video_exists(&self, video_id: Uuid) -> anyhow::Result<bool> {
        Ok(self.videos.read().await.contains(&video_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.into(),
            email: format!("{name}@example.com"),
            full_name: "Test User".into(),
            avatar: "https://fake.local/avatars/a.png".into(),
            cover_image: None,
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn rotate_only_swaps_matching_token() {
        let store = InMemoryUserStore::new();
        let user = store.create(new_user("bob")).await.unwrap();
        assert!(store.set_refresh_token(user.id, Some("r1")).await.unwrap());

        assert!(!store.rotate_refresh_token(user.id, "stale", "r2").await.unwrap());
        assert_eq!(store.stored_refresh_token(user.id).await.as_deref(), Some("r1"));

        assert!(store.rotate_refresh_token(user.id, "r1", "r2").await.unwrap());
        assert!(!store.rotate_refresh_token(user.id, "r1", "r3").await.unwrap());
        assert_eq!(store.stored_refresh_token(user.id).await.as_deref(), Some("r2"));
    }

    #[tokio::test]
    async fn revoked_token_cannot_be_rotated() {
        let store = InMemoryUserStore::new();
        let user = store.create(new_user("carol")).await.unwrap();
        store.set_refresh_token(user.id, Some("r1")).await.unwrap();
        store.set_refresh_token(user.id, None).await.unwrap();
        assert!(!store.rotate_refresh_token(user.id, "r1", "r2").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let store = InMemoryUserStore::new();
        store.create(new_user("dave")).await.unwrap();
        assert!(matches!(
            store.create(new_user("dave")).await,
            Err(WriteError::Duplicate)
        ));
        assert!(store
            .username_or_email_taken("dave", "other@example.com")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn account_update_rejects_email_owned_by_someone_else() {
        let store = InMemoryUserStore::new();
        let erin = store.create(new_user("erin")).await.unwrap();
        store.create(new_user("frank")).await.unwrap();

        let taken = store
            .update_account(erin.id, "Erin", "frank@example.com")
            .await;
        assert!(matches!(taken, Err(WriteError::Duplicate)));

        let own = store
            .update_account(erin.id, "Erin E.", "erin@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(own.full_name, "Erin E.");
    }
}
