// User handlers
// Registration stands in for the external identity provider's sign-up flow

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::info;

use crate::{error::ApiError, models::CreateUserRequest, state::AppState};

/// Register a new user
/// POST /auth/signup/
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    info!("Registering user: {}", request.username.trim());

    request.validate().map_err(ApiError::Validation)?;
    let user = request.into_user(state.clock.now());
    let user = state.store.insert_user(&user).await?;

    info!("Successfully created user with id: {}", user.id);
    Ok((StatusCode::CREATED, Json(user)))
}
