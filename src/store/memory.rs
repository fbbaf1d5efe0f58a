use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{Comment, Follow, Group, Post, User};
use crate::store::{PostFilter, Store};

/// In-process store mirroring the constraints of the PostgreSQL schema.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    users: Vec<User>,
    groups: Vec<Group>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
    follows: Vec<Follow>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl State {
    fn user_exists(&self, user_id: Uuid) -> bool {
        self.users.iter().any(|u| u.id == user_id)
    }

    fn group_exists(&self, group_id: Uuid) -> bool {
        self.groups.iter().any(|g| g.id == group_id)
    }

    fn check_post_references(&self, post: &Post) -> ApiResult<()> {
        if !self.user_exists(post.author_id) {
            return Err(ApiError::validation("Referenced resource does not exist"));
        }
        if let Some(group_id) = post.group_id {
            if !self.group_exists(group_id) {
                return Err(ApiError::validation("Referenced resource does not exist"));
            }
        }
        Ok(())
    }

    fn matches(&self, filter: PostFilter, post: &Post) -> bool {
        match filter {
            PostFilter::All => true,
            PostFilter::Group(group_id) => post.group_id == Some(group_id),
            PostFilter::Author(author_id) => post.author_id == author_id,
            PostFilter::FollowedBy(user_id) => {
                post.author_id != user_id
                    && self
                        .follows
                        .iter()
                        .any(|f| f.user_id == user_id && f.author_id == post.author_id)
            }
        }
    }

    fn newest_first(&self, filter: PostFilter) -> Vec<&Post> {
        let mut posts: Vec<&Post> = self
            .posts
            .iter()
            .filter(|post| self.matches(filter, post))
            .collect();
        // Same total order as the SQL listing: created_at, then id, both descending
        posts.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        posts
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> ApiResult<()> {
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> ApiResult<User> {
        let mut state = self.state.write().await;
        if state.users.iter().any(|u| u.username == user.username) {
            return Err(ApiError::conflict("Username already exists"));
        }
        state.users.push(user.clone());
        Ok(user.clone())
    }

    async fn find_user_by_username(&self, username: &str) -> ApiResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.username == username).cloned())
    }

    async fn delete_user(&self, user_id: Uuid) -> ApiResult<bool> {
        let mut state = self.state.write().await;
        let before = state.users.len();
        state.users.retain(|u| u.id != user_id);
        if state.users.len() == before {
            return Ok(false);
        }

        let removed_posts: Vec<Uuid> = state
            .posts
            .iter()
            .filter(|p| p.author_id == user_id)
            .map(|p| p.id)
            .collect();
        state.posts.retain(|p| p.author_id != user_id);
        state
            .comments
            .retain(|c| c.author_id != user_id && !removed_posts.contains(&c.post_id));
        state
            .follows
            .retain(|f| f.user_id != user_id && f.author_id != user_id);
        Ok(true)
    }

    async fn insert_group(&self, group: &Group) -> ApiResult<Group> {
        let mut state = self.state.write().await;
        if state.groups.iter().any(|g| g.slug == group.slug) {
            return Err(ApiError::conflict("Group slug already exists"));
        }
        state.groups.push(group.clone());
        Ok(group.clone())
    }

    async fn find_group_by_slug(&self, slug: &str) -> ApiResult<Option<Group>> {
        let state = self.state.read().await;
        Ok(state.groups.iter().find(|g| g.slug == slug).cloned())
    }

    async fn find_group_by_id(&self, group_id: Uuid) -> ApiResult<Option<Group>> {
        let state = self.state.read().await;
        Ok(state.groups.iter().find(|g| g.id == group_id).cloned())
    }

    async fn list_groups(&self) -> ApiResult<Vec<Group>> {
        let state = self.state.read().await;
        let mut groups = state.groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }

    async fn delete_group(&self, group_id: Uuid) -> ApiResult<bool> {
        let mut state = self.state.write().await;
        let before = state.groups.len();
        state.groups.retain(|g| g.id != group_id);
        if state.groups.len() == before {
            return Ok(false);
        }
        for post in state.posts.iter_mut().filter(|p| p.group_id == Some(group_id)) {
            post.group_id = None;
        }
        Ok(true)
    }

    async fn insert_post(&self, post: &Post) -> ApiResult<Post> {
        let mut state = self.state.write().await;
        state.check_post_references(post)?;
        state.posts.push(post.clone());
        Ok(post.clone())
    }

    async fn update_post(&self, post: &Post) -> ApiResult<Post> {
        let mut state = self.state.write().await;
        state.check_post_references(post)?;
        let stored = state
            .posts
            .iter_mut()
            .find(|p| p.id == post.id)
            .ok_or_else(|| ApiError::not_found(format!("Post with id {}", post.id)))?;
        stored.text = post.text.clone();
        stored.group_id = post.group_id;
        stored.image = post.image.clone();
        Ok(stored.clone())
    }

    async fn find_post(&self, post_id: Uuid) -> ApiResult<Option<Post>> {
        let state = self.state.read().await;
        Ok(state.posts.iter().find(|p| p.id == post_id).cloned())
    }

    async fn count_posts(&self, filter: PostFilter) -> ApiResult<u64> {
        let state = self.state.read().await;
        Ok(state.posts.iter().filter(|p| state.matches(filter, p)).count() as u64)
    }

    async fn list_posts(&self, filter: PostFilter, offset: u64, limit: u64) -> ApiResult<Vec<Post>> {
        let state = self.state.read().await;
        Ok(state
            .newest_first(filter)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn insert_comment(&self, comment: &Comment) -> ApiResult<Comment> {
        let mut state = self.state.write().await;
        if !state.user_exists(comment.author_id) || !state.posts.iter().any(|p| p.id == comment.post_id) {
            return Err(ApiError::validation("Referenced resource does not exist"));
        }
        state.comments.push(comment.clone());
        Ok(comment.clone())
    }

    async fn list_comments(&self, post_id: Uuid) -> ApiResult<Vec<Comment>> {
        let state = self.state.read().await;
        let mut comments: Vec<Comment> = state
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(comments)
    }

    async fn follow_exists(&self, user_id: Uuid, author_id: Uuid) -> ApiResult<bool> {
        let state = self.state.read().await;
        Ok(state
            .follows
            .iter()
            .any(|f| f.user_id == user_id && f.author_id == author_id))
    }

    async fn insert_follow_if_absent(&self, follow: &Follow) -> ApiResult<bool> {
        if follow.is_self_follow() {
            return Err(ApiError::validation("Users cannot follow themselves"));
        }

        let mut state = self.state.write().await;
        if !state.user_exists(follow.user_id) || !state.user_exists(follow.author_id) {
            return Err(ApiError::validation("Referenced resource does not exist"));
        }
        if state
            .follows
            .iter()
            .any(|f| f.user_id == follow.user_id && f.author_id == follow.author_id)
        {
            return Ok(false);
        }
        state.follows.push(follow.clone());
        Ok(true)
    }

    async fn delete_follow(&self, user_id: Uuid, author_id: Uuid) -> ApiResult<bool> {
        let mut state = self.state.write().await;
        let before = state.follows.len();
        state
            .follows
            .retain(|f| !(f.user_id == user_id && f.author_id == author_id));
        Ok(state.follows.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tokio_test::{assert_err, assert_ok};

    async fn user(store: &MemoryStore, username: &str) -> User {
        store
            .insert_user(&User::new(username.to_string(), Utc::now()))
            .await
            .unwrap()
    }

    async fn group(store: &MemoryStore, slug: &str) -> Group {
        store
            .insert_group(&Group::new(slug.to_uppercase(), slug.to_string(), "about".to_string()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_unique_username_and_slug() {
        let store = MemoryStore::new();
        user(&store, "leo").await;
        group(&store, "poets").await;

        let dup_user = store.insert_user(&User::new("leo".to_string(), Utc::now())).await;
        assert!(matches!(dup_user, Err(ApiError::Conflict(_))));

        let dup_group = store
            .insert_group(&Group::new("P".to_string(), "poets".to_string(), "d".to_string()))
            .await;
        assert!(matches!(dup_group, Err(ApiError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_posts_ordered_newest_first() {
        let store = MemoryStore::new();
        let leo = user(&store, "leo").await;
        let base = Utc::now();

        let older = Post::new(&leo, "older".to_string(), None, None, base);
        let newer = Post::new(&leo, "newer".to_string(), None, None, base + Duration::seconds(5));
        // Inserted out of order on purpose
        store.insert_post(&newer).await.unwrap();
        store.insert_post(&older).await.unwrap();
        let same_instant = Post::new(&leo, "same".to_string(), None, None, base);
        store.insert_post(&same_instant).await.unwrap();

        let listed = store.list_posts(PostFilter::All, 0, 10).await.unwrap();
        assert_eq!(listed[0].text, "newer");
        // Equal timestamps fall back to id, descending
        let tied: Vec<Uuid> = listed[1..].iter().map(|p| p.id).collect();
        assert_eq!(tied, vec![older.id.max(same_instant.id), older.id.min(same_instant.id)]);
    }

    #[tokio::test]
    async fn test_tied_posts_page_without_overlap() {
        let store = MemoryStore::new();
        let leo = user(&store, "leo").await;
        let instant = Utc::now();
        for i in 0..5 {
            let post = Post::new(&leo, format!("tied {}", i), None, None, instant);
            store.insert_post(&post).await.unwrap();
        }

        let mut seen: Vec<Uuid> = Vec::new();
        for offset in [0, 2, 4] {
            let page = store.list_posts(PostFilter::All, offset, 2).await.unwrap();
            seen.extend(page.iter().map(|p| p.id));
        }
        let mut unique = seen.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(seen.len(), 5);
        assert_eq!(unique.len(), 5);
    }

    #[tokio::test]
    async fn test_post_requires_existing_group() {
        let store = MemoryStore::new();
        let leo = user(&store, "leo").await;

        let post = Post::new(&leo, "text".to_string(), Some(Uuid::new_v4()), None, Utc::now());
        assert!(matches!(store.insert_post(&post).await, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_follow_constraints() {
        let store = MemoryStore::new();
        let leo = user(&store, "leo").await;
        let anna = user(&store, "anna").await;

        let follow = Follow::new(anna.id, leo.id, Utc::now());
        assert!(assert_ok!(store.insert_follow_if_absent(&follow).await));
        let again = Follow::new(anna.id, leo.id, Utc::now());
        assert!(!assert_ok!(store.insert_follow_if_absent(&again).await));
        assert_err!(store.insert_follow_if_absent(&Follow::new(leo.id, leo.id, Utc::now())).await);

        assert!(store.follow_exists(anna.id, leo.id).await.unwrap());
        assert!(!store.follow_exists(leo.id, anna.id).await.unwrap());

        assert!(store.delete_follow(anna.id, leo.id).await.unwrap());
        assert!(!store.delete_follow(anna.id, leo.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_deleting_group_keeps_posts() {
        let store = MemoryStore::new();
        let leo = user(&store, "leo").await;
        let poets = group(&store, "poets").await;
        let post = Post::new(&leo, "verse".to_string(), Some(poets.id), None, Utc::now());
        store.insert_post(&post).await.unwrap();

        assert!(store.delete_group(poets.id).await.unwrap());

        let stored = store.find_post(post.id).await.unwrap().unwrap();
        assert_eq!(stored.group_id, None);
        assert_eq!(store.count_posts(PostFilter::Group(poets.id)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_deleting_user_cascades() {
        let store = MemoryStore::new();
        let leo = user(&store, "leo").await;
        let anna = user(&store, "anna").await;

        let post = Post::new(&leo, "novel".to_string(), None, None, Utc::now());
        store.insert_post(&post).await.unwrap();
        store
            .insert_comment(&Comment::new(post.id, &anna, "bravo".to_string(), Utc::now()))
            .await
            .unwrap();
        store
            .insert_follow_if_absent(&Follow::new(anna.id, leo.id, Utc::now()))
            .await
            .unwrap();

        assert!(store.delete_user(leo.id).await.unwrap());

        assert_eq!(store.count_posts(PostFilter::All).await.unwrap(), 0);
        assert!(store.list_comments(post.id).await.unwrap().is_empty());
        assert!(!store.follow_exists(anna.id, leo.id).await.unwrap());
        assert!(store.find_user_by_username("leo").await.unwrap().is_none());
    }
}
