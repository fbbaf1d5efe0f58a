// Handlers module
// HTTP handlers for the blog feed service

pub mod groups;
pub mod posts;
pub mod profiles;
pub mod users;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use url::form_urlencoded;
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

/// Health check handler
/// Returns "OK" with 200 status when the store answers
pub async fn health_check(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state.store.health_check().await?;
    Ok((StatusCode::OK, "OK"))
}

/// Fallback for unknown routes
pub async fn not_found() -> ApiError {
    ApiError::not_found("Page")
}

/// 302 Found to `location`.
pub(crate) fn found(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

pub(crate) fn profile_path(username: &str) -> String {
    format!("/profile/{}/", encode_segment(username))
}

pub(crate) fn post_detail_path(post_id: Uuid) -> String {
    format!("/posts/{}/", post_id)
}

fn encode_segment(segment: &str) -> String {
    form_urlencoded::byte_serialize(segment.as_bytes()).collect()
}

/// Malformed ids cannot name an existing post, so they are reported as 404.
pub(crate) fn parse_post_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::not_found(format!("Post with id {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(profile_path("leo"), "/profile/leo/");
        assert_eq!(profile_path("leo@home"), "/profile/leo%40home/");

        let id = Uuid::new_v4();
        assert_eq!(post_detail_path(id), format!("/posts/{}/", id));
    }

    #[test]
    fn test_parse_post_id() {
        assert!(parse_post_id(&Uuid::new_v4().to_string()).is_ok());
        assert!(matches!(parse_post_id("42"), Err(ApiError::NotFound(_))));
    }
}
