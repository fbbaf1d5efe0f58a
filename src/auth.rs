//! Caller identity.
//!
//! Authentication itself lives outside this service. An [`IdentityProvider`]
//! turns an incoming request into a known [`User`] or "anonymous"; handlers
//! ask for [`CurrentUser`] (login required) or [`MaybeUser`].

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderName, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::error::{ApiError, ApiResult};
use crate::models::User;
use crate::state::AppState;
use crate::store::Store;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn identify(&self, parts: &Parts) -> ApiResult<Option<User>>;
}

/// Trusts a username header injected by an authenticating reverse proxy.
pub struct HeaderIdentity {
    header: HeaderName,
    store: Arc<dyn Store>,
}

impl HeaderIdentity {
    pub fn new(header: &str, store: Arc<dyn Store>) -> anyhow::Result<Self> {
        let header = HeaderName::from_bytes(header.as_bytes())
            .with_context(|| format!("'{}' is not a valid header name", header))?;
        Ok(HeaderIdentity { header, store })
    }
}

#[async_trait]
impl IdentityProvider for HeaderIdentity {
    async fn identify(&self, parts: &Parts) -> ApiResult<Option<User>> {
        let username = match parts
            .headers
            .get(&self.header)
            .and_then(|value| std::str::from_utf8(value.as_bytes()).ok())
            .map(str::trim)
        {
            Some(username) if !username.is_empty() => username.to_string(),
            _ => return Ok(None),
        };

        let user = self.store.find_user_by_username(&username).await?;
        if user.is_none() {
            warn!("Identity header names unknown user '{}', treating as anonymous", username);
        }
        Ok(user)
    }
}

/// Authenticated caller. Anonymous requests are redirected to the login page.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Caller if authenticated.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match state.identity.identify(parts).await {
            Ok(Some(user)) => Ok(CurrentUser(user)),
            Ok(None) => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/");
                debug!("Anonymous request to {} redirected to login", next);
                Err(redirect_to_login(&state.login_url, next))
            }
            Err(err) => Err(err.into_response()),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(state.identity.identify(parts).await?))
    }
}

/// `login_url?next=<requested path and query>`
pub fn login_location(login_url: &str, next: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("next", next)
        .finish();
    format!("{}?{}", login_url, query)
}

pub fn redirect_to_login(login_url: &str, next: &str) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, login_location(login_url, next))],
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use axum::http::Request;
    use chrono::Utc;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/follow/");
        if let Some(value) = header {
            builder = builder.header("x-remote-user", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_login_location_preserves_next() {
        assert_eq!(
            login_location("/auth/login/", "/create/"),
            "/auth/login/?next=%2Fcreate%2F"
        );
        assert_eq!(
            login_location("/auth/login/", "/follow/?page=2"),
            "/auth/login/?next=%2Ffollow%2F%3Fpage%3D2"
        );
    }

    #[tokio::test]
    async fn test_header_identity() {
        let store = Arc::new(MemoryStore::new());
        let leo = store.insert_user(&User::new("leo".to_string(), Utc::now())).await.unwrap();
        let identity = HeaderIdentity::new("x-remote-user", store).unwrap();

        assert_eq!(identity.identify(&parts_with(Some("leo"))).await.unwrap(), Some(leo));
        assert_eq!(identity.identify(&parts_with(Some("ghost"))).await.unwrap(), None);
        assert_eq!(identity.identify(&parts_with(Some("  "))).await.unwrap(), None);
        assert_eq!(identity.identify(&parts_with(None)).await.unwrap(), None);
    }

    #[test]
    fn test_invalid_header_name_rejected() {
        let store = Arc::new(MemoryStore::new());
        assert!(HeaderIdentity::new("bad header", store).is_err());
    }
}
