// Profile handlers
// Author pages, the following feed and follow/unfollow toggles

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

use crate::{
    auth::{CurrentUser, MaybeUser},
    error::ApiError,
    handlers::{found, profile_path},
    pagination::PageQuery,
    state::AppState,
};

/// Posts by one author
/// GET /profile/:username/?page=<n>
pub async fn profile(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(username): Path<String>,
    Query(params): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Fetching profile feed for: {}", username);

    let feed = state
        .feeds
        .profile_feed(&username, viewer.as_ref(), params.page.as_deref())
        .await?;

    Ok((StatusCode::OK, Json(feed)))
}

/// Posts by the authors the caller follows
/// GET /follow/?page=<n>
pub async fn follow_index(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .feeds
        .following_feed(&user, params.page.as_deref())
        .await?;

    info!("Retrieved {} followed posts for {}", page.len(), user.username);
    Ok((StatusCode::OK, Json(page)))
}

/// GET|POST /profile/:username/follow/
pub async fn profile_follow(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Result<Response, ApiError> {
    let outcome = state.subscriptions.follow(&user, &username).await?;

    info!("Follow {} -> {}: {:?}", user.username, username, outcome);
    Ok(found(profile_path(&username)))
}

/// GET|POST /profile/:username/unfollow/
pub async fn profile_unfollow(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Result<Response, ApiError> {
    state.subscriptions.unfollow(&user, &username).await?;

    Ok(found(profile_path(&username)))
}
