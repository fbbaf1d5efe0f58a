//! Persistence collaborator.
//!
//! Feeds only need three capabilities from storage: filter posts, order them
//! newest first, and slice out a page. [`Store`] exposes exactly that plus the
//! plain CRUD the handlers need. `crate::db::Database` is the PostgreSQL
//! implementation; [`MemoryStore`] backs tests and the `memory` backend.

pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::{Comment, Follow, Group, Post, User};

pub use memory::MemoryStore;

/// Which posts a feed draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(Uuid),
    Author(Uuid),
    /// Posts by authors the given user follows, excluding the user's own.
    FollowedBy(Uuid),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn health_check(&self) -> ApiResult<()>;

    // Users
    async fn insert_user(&self, user: &User) -> ApiResult<User>;
    async fn find_user_by_username(&self, username: &str) -> ApiResult<Option<User>>;
    /// Removes the user together with their posts, comments and follows.
    async fn delete_user(&self, user_id: Uuid) -> ApiResult<bool>;

    // Groups
    async fn insert_group(&self, group: &Group) -> ApiResult<Group>;
    async fn find_group_by_slug(&self, slug: &str) -> ApiResult<Option<Group>>;
    async fn find_group_by_id(&self, group_id: Uuid) -> ApiResult<Option<Group>>;
    async fn list_groups(&self) -> ApiResult<Vec<Group>>;
    /// Removes the group; its posts survive with no group.
    async fn delete_group(&self, group_id: Uuid) -> ApiResult<bool>;

    // Posts, always ordered newest first
    async fn insert_post(&self, post: &Post) -> ApiResult<Post>;
    async fn update_post(&self, post: &Post) -> ApiResult<Post>;
    async fn find_post(&self, post_id: Uuid) -> ApiResult<Option<Post>>;
    async fn count_posts(&self, filter: PostFilter) -> ApiResult<u64>;
    async fn list_posts(&self, filter: PostFilter, offset: u64, limit: u64) -> ApiResult<Vec<Post>>;

    // Comments, newest first
    async fn insert_comment(&self, comment: &Comment) -> ApiResult<Comment>;
    async fn list_comments(&self, post_id: Uuid) -> ApiResult<Vec<Comment>>;

    // Follows
    async fn follow_exists(&self, user_id: Uuid, author_id: Uuid) -> ApiResult<bool>;
    /// Returns `false` when the pair already existed.
    async fn insert_follow_if_absent(&self, follow: &Follow) -> ApiResult<bool>;
    /// Returns `false` when there was nothing to delete.
    async fn delete_follow(&self, user_id: Uuid, author_id: Uuid) -> ApiResult<bool>;
}
