use axum::{
    routing::{get, post},
    Router,
};

use crate::{
    handlers::{
        groups::{create_group, group_posts, list_groups},
        health_check, not_found,
        posts::{add_comment, create_post, edit_post, index, post_detail},
        profiles::{follow_index, profile, profile_follow, profile_unfollow},
        users::signup,
    },
    state::AppState,
};

/// Create the Axum router with all endpoints. Middleware is layered on by the caller.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        // Feeds
        .route("/", get(index))
        .route("/group/:slug/", get(group_posts))
        .route("/profile/:username/", get(profile))
        .route("/follow/", get(follow_index))
        // Posts and comments
        .route("/create/", post(create_post))
        .route("/posts/:post_id/", get(post_detail))
        .route("/posts/:post_id/edit/", post(edit_post))
        .route("/posts/:post_id/comment/", post(add_comment))
        // Subscriptions
        .route("/profile/:username/follow/", get(profile_follow).post(profile_follow))
        .route("/profile/:username/unfollow/", get(profile_unfollow).post(profile_unfollow))
        // Groups and users
        .route("/groups/", get(list_groups).post(create_group))
        .route("/auth/signup/", post(signup))
        .fallback(not_found)
        .with_state(state)
}
