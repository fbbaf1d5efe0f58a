use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::models::{Group, Post, User};
use crate::pagination::{Page, Paginator};
use crate::store::{PostFilter, Store};
use crate::subscriptions::SubscriptionManager;

#[derive(Debug, Serialize)]
pub struct GroupFeed {
    pub group: Group,
    pub page: Page<Post>,
}

#[derive(Debug, Serialize)]
pub struct ProfileFeed {
    pub author: User,
    /// Whether the viewer follows `author`.
    pub following: bool,
    pub page: Page<Post>,
}

/// Builds the paginated, newest-first post listings.
#[derive(Clone)]
pub struct FeedComposer {
    store: Arc<dyn Store>,
    subscriptions: SubscriptionManager,
    paginator: Paginator,
}

impl FeedComposer {
    pub fn new(store: Arc<dyn Store>, subscriptions: SubscriptionManager, page_size: usize) -> Self {
        FeedComposer {
            store,
            subscriptions,
            paginator: Paginator::new(page_size),
        }
    }

    pub fn page_size(&self) -> u64 {
        self.paginator.per_page()
    }

    async fn page(&self, filter: PostFilter, requested: Option<&str>) -> ApiResult<Page<Post>> {
        let total = self.store.count_posts(filter).await?;
        let window = self.paginator.window(total, requested);
        let items = self.store.list_posts(filter, window.offset, window.limit).await?;

        debug!(
            "Composed {:?} feed page {}/{} ({} of {} posts)",
            filter,
            window.number,
            window.num_pages,
            items.len(),
            total
        );
        Ok(Page::new(items, window, total))
    }

    pub async fn global_feed(&self, page: Option<&str>) -> ApiResult<Page<Post>> {
        self.page(PostFilter::All, page).await
    }

    pub async fn group_feed(&self, slug: &str, page: Option<&str>) -> ApiResult<GroupFeed> {
        let group = self
            .store
            .find_group_by_slug(slug)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Group '{}'", slug)))?;

        let page = self.page(PostFilter::Group(group.id), page).await?;
        Ok(GroupFeed { group, page })
    }

    pub async fn profile_feed(
        &self,
        username: &str,
        viewer: Option<&User>,
        page: Option<&str>,
    ) -> ApiResult<ProfileFeed> {
        let author = self
            .store
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("User '{}'", username)))?;

        let following = self.subscriptions.is_following(viewer, &author).await?;
        let page = self.page(PostFilter::Author(author.id), page).await?;
        Ok(ProfileFeed { author, following, page })
    }

    pub async fn following_feed(&self, user: &User, page: Option<&str>) -> ApiResult<Page<Post>> {
        self.page(PostFilter::FollowedBy(user.id), page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::store::MemoryStore;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    struct Fixture {
        store: Arc<MemoryStore>,
        feeds: FeedComposer,
        subscriptions: SubscriptionManager,
    }

    fn fixture(page_size: usize) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let subscriptions = SubscriptionManager::new(store.clone(), Arc::new(SystemClock));
        let feeds = FeedComposer::new(store.clone(), subscriptions.clone(), page_size);
        Fixture { store, feeds, subscriptions }
    }

    impl Fixture {
        async fn user(&self, username: &str) -> User {
            self.store
                .insert_user(&User::new(username.to_string(), Utc::now()))
                .await
                .unwrap()
        }

        async fn group(&self, slug: &str) -> Group {
            self.store
                .insert_group(&Group::new(slug.to_string(), slug.to_string(), "d".to_string()))
                .await
                .unwrap()
        }

        async fn post(&self, author: &User, text: &str, group: Option<&Group>) -> Post {
            let post = Post::new(author, text.to_string(), group.map(|g| g.id), None, Utc::now());
            self.store.insert_post(&post).await.unwrap()
        }
    }

    fn ids(page: &Page<Post>) -> Vec<Uuid> {
        page.items.iter().map(|p| p.id).collect()
    }

    #[tokio::test]
    async fn test_post_visible_only_in_its_own_group_and_profile() {
        let f = fixture(10);
        let leo = f.user("leo").await;
        let anna = f.user("anna").await;
        let poets = f.group("poets").await;
        let critics = f.group("critics").await;
        let post = f.post(&leo, "verse", Some(&poets)).await;

        assert_eq!(ids(&f.feeds.global_feed(None).await.unwrap()), vec![post.id]);
        assert_eq!(ids(&f.feeds.group_feed("poets", None).await.unwrap().page), vec![post.id]);
        assert!(f.feeds.group_feed("critics", None).await.unwrap().page.is_empty());
        assert_eq!(
            ids(&f.feeds.profile_feed("leo", None, None).await.unwrap().page),
            vec![post.id]
        );
        assert!(f.feeds.profile_feed("anna", None, None).await.unwrap().page.is_empty());

        let critics_feed = f.feeds.group_feed("critics", None).await.unwrap();
        assert_eq!(critics_feed.group, critics);
        let anna_feed = f.feeds.profile_feed("anna", Some(&leo), None).await.unwrap();
        assert_eq!(anna_feed.author, anna);
    }

    #[tokio::test]
    async fn test_unknown_group_and_profile_are_not_found() {
        let f = fixture(10);

        assert!(matches!(f.feeds.group_feed("missing", None).await, Err(ApiError::NotFound(_))));
        assert!(matches!(
            f.feeds.profile_feed("missing", None, None).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_following_feed_contains_only_followed_authors() {
        let f = fixture(10);
        let leo = f.user("leo").await;
        let anna = f.user("anna").await;
        let ivan = f.user("ivan").await;
        let leo_post = f.post(&leo, "novel", None).await;
        f.post(&ivan, "essay", None).await;
        f.post(&anna, "diary", None).await;

        f.subscriptions.follow(&anna, "leo").await.unwrap();

        assert_eq!(ids(&f.feeds.following_feed(&anna, None).await.unwrap()), vec![leo_post.id]);
        assert!(f.feeds.following_feed(&ivan, None).await.unwrap().is_empty());
        // An author never sees their own posts in the following feed
        assert!(f.feeds.following_feed(&leo, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pagination_splits_at_page_size() {
        let f = fixture(10);
        let leo = f.user("leo").await;
        let base = Utc::now();
        for i in 0..11 {
            let post = Post::new(&leo, format!("post {}", i), None, None, base + Duration::seconds(i));
            f.store.insert_post(&post).await.unwrap();
        }

        let first = f.feeds.global_feed(None).await.unwrap();
        assert_eq!(first.len(), 10);
        assert_eq!(first.total, 11);
        assert_eq!(first.items[0].text, "post 10");
        assert!(first.has_next);

        let second = f.feeds.global_feed(Some("2")).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second.items[0].text, "post 0");

        // Out of range clamps to the last page
        let clamped = f.feeds.profile_feed("leo", None, Some("7")).await.unwrap();
        assert_eq!(clamped.page.number, 2);
        assert_eq!(clamped.page.len(), 1);
    }

    #[tokio::test]
    async fn test_profile_following_flag() {
        let f = fixture(10);
        let leo = f.user("leo").await;
        let anna = f.user("anna").await;
        f.subscriptions.follow(&anna, "leo").await.unwrap();

        assert!(f.feeds.profile_feed("leo", Some(&anna), None).await.unwrap().following);
        assert!(!f.feeds.profile_feed("leo", Some(&leo), None).await.unwrap().following);
        assert!(!f.feeds.profile_feed("leo", None, None).await.unwrap().following);
        assert!(!f.feeds.profile_feed("anna", Some(&leo), None).await.unwrap().following);
    }
}
