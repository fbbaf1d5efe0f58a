use std::sync::Arc;

use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::{ApiError, ApiResult};
use crate::models::{Follow, User};
use crate::store::Store;

/// What a follow request ended up doing. Callers redirect the same way in
/// every case; the distinction is for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    AlreadyFollowing,
    SelfFollowIgnored,
}

/// Creates and removes follow relationships between users.
#[derive(Clone)]
pub struct SubscriptionManager {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl SubscriptionManager {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        SubscriptionManager { store, clock }
    }

    /// Follow `author_username`. Idempotent; following yourself is silently ignored.
    pub async fn follow(&self, user: &User, author_username: &str) -> ApiResult<FollowOutcome> {
        let author = self
            .store
            .find_user_by_username(author_username)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("User '{}'", author_username)))?;

        if author.id == user.id {
            debug!("Ignoring self-follow attempt by {}", user.username);
            return Ok(FollowOutcome::SelfFollowIgnored);
        }

        let follow = Follow::new(user.id, author.id, self.clock.now());
        if self.store.insert_follow_if_absent(&follow).await? {
            info!("{} now follows {}", user.username, author.username);
            Ok(FollowOutcome::Created)
        } else {
            debug!("{} already follows {}", user.username, author.username);
            Ok(FollowOutcome::AlreadyFollowing)
        }
    }

    /// Stop following `author_username`. NotFound when no such relationship exists.
    pub async fn unfollow(&self, user: &User, author_username: &str) -> ApiResult<()> {
        let not_found = || ApiError::not_found(format!("Follow of '{}'", author_username));

        let author = self
            .store
            .find_user_by_username(author_username)
            .await?
            .ok_or_else(not_found)?;

        if !self.store.delete_follow(user.id, author.id).await? {
            return Err(not_found());
        }

        info!("{} unfollowed {}", user.username, author.username);
        Ok(())
    }

    /// Anonymous viewers and authors looking at themselves never "follow".
    pub async fn is_following(&self, viewer: Option<&User>, author: &User) -> ApiResult<bool> {
        match viewer {
            Some(viewer) if viewer.id != author.id => {
                self.store.follow_exists(viewer.id, author.id).await
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::store::MemoryStore;
    use chrono::Utc;

    async fn setup() -> (SubscriptionManager, Arc<MemoryStore>, User, User) {
        let store = Arc::new(MemoryStore::new());
        let leo = store.insert_user(&User::new("leo".to_string(), Utc::now())).await.unwrap();
        let anna = store.insert_user(&User::new("anna".to_string(), Utc::now())).await.unwrap();
        let manager = SubscriptionManager::new(store.clone(), Arc::new(SystemClock));
        (manager, store, leo, anna)
    }

    #[tokio::test]
    async fn test_follow_is_idempotent() {
        let (manager, store, leo, anna) = setup().await;

        assert_eq!(manager.follow(&anna, "leo").await.unwrap(), FollowOutcome::Created);
        assert_eq!(
            manager.follow(&anna, "leo").await.unwrap(),
            FollowOutcome::AlreadyFollowing
        );

        assert!(store.follow_exists(anna.id, leo.id).await.unwrap());
        assert!(store.delete_follow(anna.id, leo.id).await.unwrap());
        // Exactly one row existed
        assert!(!store.delete_follow(anna.id, leo.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_self_follow_is_ignored() {
        let (manager, store, leo, _anna) = setup().await;

        assert_eq!(
            manager.follow(&leo, "leo").await.unwrap(),
            FollowOutcome::SelfFollowIgnored
        );
        assert!(!store.follow_exists(leo.id, leo.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_follow_unknown_author() {
        let (manager, _store, _leo, anna) = setup().await;

        let result = manager.follow(&anna, "nobody").await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unfollow() {
        let (manager, store, leo, anna) = setup().await;
        manager.follow(&anna, "leo").await.unwrap();

        manager.unfollow(&anna, "leo").await.unwrap();
        assert!(!store.follow_exists(anna.id, leo.id).await.unwrap());

        assert!(matches!(manager.unfollow(&anna, "leo").await, Err(ApiError::NotFound(_))));
        assert!(matches!(manager.unfollow(&anna, "nobody").await, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_is_following() {
        let (manager, _store, leo, anna) = setup().await;
        manager.follow(&anna, "leo").await.unwrap();

        assert!(manager.is_following(Some(&anna), &leo).await.unwrap());
        assert!(!manager.is_following(Some(&leo), &anna).await.unwrap());
        assert!(!manager.is_following(Some(&leo), &leo).await.unwrap());
        assert!(!manager.is_following(None, &leo).await.unwrap());
    }
}
