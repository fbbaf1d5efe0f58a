// Post handlers
// Global feed, post detail, publishing, editing and comments

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    auth::CurrentUser,
    error::{ApiError, ApiResult},
    handlers::{found, parse_post_id, post_detail_path, profile_path},
    models::{Comment, CommentForm, Group, Post, PostForm},
    pagination::PageQuery,
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct PostDetail {
    pub post: Post,
    pub group: Option<Group>,
    pub comments: Vec<Comment>,
}

/// Global feed
/// GET /?page=<n>
/// Served from the page cache while the entry for this URL is fresh.
pub async fn index(
    State(state): State<AppState>,
    uri: Uri,
    Query(params): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let key = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    if let Some(body) = state.index_cache.get(&key).await {
        debug!("Serving {} from page cache", key);
        return Ok(json_body(body));
    }

    let page = state.feeds.global_feed(params.page.as_deref()).await?;
    let body = Bytes::from(serde_json::to_vec(&page).map_err(anyhow::Error::from)?);
    state.index_cache.put(key, body.clone()).await;

    info!("Rendered global feed page {} ({} posts)", page.number, page.len());
    Ok(json_body(body))
}

fn json_body(body: Bytes) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}

/// Post detail with comments, newest first
/// GET /posts/:post_id/
pub async fn post_detail(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_post_id(&post_id)?;

    let post = state
        .store
        .find_post(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Post with id {}", id)))?;

    let group = match post.group_id {
        Some(group_id) => state.store.find_group_by_id(group_id).await?,
        None => None,
    };
    let comments = state.store.list_comments(id).await?;

    Ok((StatusCode::OK, Json(PostDetail { post, group, comments })))
}

/// Publish a post as the current user
/// POST /create/
pub async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<PostForm>, JsonRejection>,
) -> Result<Response, ApiError> {
    info!("Creating new post for {}", user.username);

    let Json(form) = payload?;
    form.validate().map_err(ApiError::Validation)?;
    ensure_group_exists(&state, &form).await?;

    let post = form.into_post(&user, state.clock.now());
    let post = state.store.insert_post(&post).await?;

    info!("Successfully created post with id: {}", post.id);
    Ok(found(profile_path(&user.username)))
}

/// Edit a post. Anyone but the author is sent back to the detail page,
/// whatever the body contains.
/// POST /posts/:post_id/edit/
pub async fn edit_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<String>,
    payload: Result<Json<PostForm>, JsonRejection>,
) -> Result<Response, ApiError> {
    let id = parse_post_id(&post_id)?;

    let mut post = state
        .store
        .find_post(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Post with id {}", id)))?;

    if !post.is_authored_by(&user) {
        info!("{} may not edit post {}, redirecting to detail", user.username, id);
        return Ok(found(post_detail_path(id)));
    }

    let Json(form) = payload?;
    form.validate().map_err(ApiError::Validation)?;
    ensure_group_exists(&state, &form).await?;

    form.apply_to(&mut post);
    state.store.update_post(&post).await?;

    info!("Successfully updated post with id: {}", id);
    Ok(found(post_detail_path(id)))
}

/// Comment on a post. An empty or unreadable comment is dropped without complaint.
/// POST /posts/:post_id/comment/
pub async fn add_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<String>,
    payload: Result<Json<CommentForm>, JsonRejection>,
) -> Result<Response, ApiError> {
    let id = parse_post_id(&post_id)?;

    let post = state
        .store
        .find_post(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Post with id {}", id)))?;

    let form = match payload {
        Ok(Json(form)) => form.validate().map(|()| form),
        Err(rejection) => Err(rejection.body_text()),
    };

    match form {
        Ok(form) => {
            let comment = form.into_comment(post.id, &user, state.clock.now());
            let comment = state.store.insert_comment(&comment).await?;
            info!("{} commented on post {} ({})", user.username, post.id, comment.id);
        }
        Err(reason) => debug!("Discarding invalid comment on post {}: {}", post.id, reason),
    }

    Ok(found(post_detail_path(post.id)))
}

async fn ensure_group_exists(state: &AppState, form: &PostForm) -> ApiResult<()> {
    if let Some(group_id) = form.group {
        if state.store.find_group_by_id(group_id).await?.is_none() {
            return Err(ApiError::validation("Selected group does not exist"));
        }
    }
    Ok(())
}
