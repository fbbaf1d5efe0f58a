// Group handlers

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::info;

use crate::{
    auth::CurrentUser,
    error::ApiError,
    models::CreateGroupRequest,
    pagination::PageQuery,
    state::AppState,
};

/// Posts filed under a group
/// GET /group/:slug/?page=<n>
pub async fn group_posts(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Fetching feed for group: {}", slug);

    let feed = state.feeds.group_feed(&slug, params.page.as_deref()).await?;

    Ok((StatusCode::OK, Json(feed)))
}

/// GET /groups/
pub async fn list_groups(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let groups = state.store.list_groups().await?;

    info!("Retrieved {} groups", groups.len());
    Ok((StatusCode::OK, Json(groups)))
}

/// POST /groups/
pub async fn create_group(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<CreateGroupRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    info!("{} is creating group with slug: {}", user.username, request.slug.trim());

    request.validate().map_err(ApiError::Validation)?;
    let group = state.store.insert_group(&request.into_group()).await?;

    info!("Successfully created group with id: {}", group.id);
    Ok((StatusCode::CREATED, Json(group)))
}
