use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

pub const USERNAME_MAX_LEN: usize = 150;

/// A registered author or reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Payload for `POST /auth/signup/`.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
}

impl User {
    pub fn new(username: String, created_at: DateTime<Utc>) -> Self {
        User {
            id: Uuid::new_v4(),
            username,
            created_at,
        }
    }
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_username(self.username.trim())
    }

    /// Convert to a `User`; the username is trimmed but keeps its case.
    pub fn into_user(self, now: DateTime<Utc>) -> User {
        User::new(self.username.trim().to_string(), now)
    }
}

/// Usernames are 1..=150 characters of letters, digits and `@ . + - _`.
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username cannot be empty".to_string());
    }

    if username.chars().count() > USERNAME_MAX_LEN {
        return Err(format!("Username cannot exceed {} characters", USERNAME_MAX_LEN));
    }

    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        return Err("Username may contain only letters, digits and @/./+/-/_".to_string());
    }

    Ok(())
}
