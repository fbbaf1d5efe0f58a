use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::models::user::User;

pub const IMAGE_MAX_LEN: usize = 255;

/// Number of characters of text used as the display form of posts and comments.
pub const PREVIEW_LEN: usize = 15;

/// A post written by a user, optionally filed under a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub text: String,
    pub author_id: Uuid,
    /// Author's username, resolved by the store.
    pub author: String,
    pub group_id: Option<Uuid>,
    /// Reference to an uploaded image, e.g. `posts/cat.gif`.
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Form used both to create and to edit a post.
#[derive(Debug, Clone, Deserialize)]
pub struct PostForm {
    pub text: String,
    #[serde(default)]
    pub group: Option<Uuid>,
    #[serde(default)]
    pub image: Option<String>,
}

impl Post {
    pub fn new(
        author: &User,
        text: String,
        group_id: Option<Uuid>,
        image: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Post {
            id: Uuid::new_v4(),
            text,
            author_id: author.id,
            author: author.username.clone(),
            group_id,
            image,
            created_at,
        }
    }

    pub fn is_authored_by(&self, user: &User) -> bool {
        self.author_id == user.id
    }
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&preview(&self.text))
    }
}

impl PostForm {
    pub fn validate(&self) -> Result<(), String> {
        if self.text.trim().is_empty() {
            return Err("Text cannot be empty".to_string());
        }

        if let Some(image) = self.normalized_image() {
            if image.chars().count() > IMAGE_MAX_LEN {
                return Err(format!("Image reference cannot exceed {} characters", IMAGE_MAX_LEN));
            }
            if image.split('/').any(|segment| segment == "..") {
                return Err("Image reference cannot leave the upload directory".to_string());
            }
        }

        Ok(())
    }

    /// Trimmed image reference, `None` when blank.
    pub fn normalized_image(&self) -> Option<String> {
        self.image
            .as_ref()
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty())
    }

    pub fn into_post(self, author: &User, now: DateTime<Utc>) -> Post {
        let image = self.normalized_image();
        Post::new(author, self.text.trim().to_string(), self.group, image, now)
    }

    /// Overwrite the editable fields of `post`. Author and timestamp stay put.
    pub fn apply_to(self, post: &mut Post) {
        post.image = self.normalized_image();
        post.text = self.text.trim().to_string();
        post.group_id = self.group;
    }
}

pub(crate) fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author() -> User {
        User::new("leo".to_string(), Utc::now())
    }

    fn form(text: &str, image: Option<&str>) -> PostForm {
        PostForm {
            text: text.to_string(),
            group: None,
            image: image.map(str::to_string),
        }
    }

    #[test]
    fn test_post_creation() {
        let author = author();
        let group = Uuid::new_v4();
        let now = Utc::now();
        let post = Post::new(&author, "Hello".to_string(), Some(group), None, now);

        assert_eq!(post.author_id, author.id);
        assert_eq!(post.author, "leo");
        assert_eq!(post.group_id, Some(group));
        assert_eq!(post.created_at, now);
        assert!(post.is_authored_by(&author));
    }

    #[test]
    fn test_display_is_first_fifteen_chars() {
        let post = Post::new(&author(), "Тестовый пост длиннее".to_string(), None, None, Utc::now());
        assert_eq!(post.to_string(), "Тестовый пост д");

        let short = Post::new(&author(), "short".to_string(), None, None, Utc::now());
        assert_eq!(short.to_string(), "short");
    }

    #[test]
    fn test_post_form_validation() {
        assert!(form("Hello", None).validate().is_ok());
        assert!(form("Hello", Some("posts/cat.gif")).validate().is_ok());
        assert!(form("   ", None).validate().is_err());
        assert!(form("Hello", Some("../etc/passwd")).validate().is_err());
        assert!(form("Hello", Some(&"i".repeat(256))).validate().is_err());
    }

    #[test]
    fn test_post_form_normalization() {
        let post = form("  Hello  ", Some("   ")).into_post(&author(), Utc::now());

        assert_eq!(post.text, "Hello");
        assert_eq!(post.image, None);
    }

    #[test]
    fn test_apply_to_keeps_author_and_timestamp() {
        let author = author();
        let mut post = Post::new(&author, "Old".to_string(), Some(Uuid::new_v4()), None, Utc::now());
        let created_at = post.created_at;

        form("New", Some("posts/new.png")).apply_to(&mut post);

        assert_eq!(post.text, "New");
        assert_eq!(post.group_id, None);
        assert_eq!(post.image.as_deref(), Some("posts/new.png"));
        assert_eq!(post.author_id, author.id);
        assert_eq!(post.created_at, created_at);
    }

    #[test]
    fn test_post_form_deserialization() {
        let json = r#"{"text":"Hello"}"#;
        let form: PostForm = serde_json::from_str(json).expect("Failed to deserialize PostForm");

        assert_eq!(form.text, "Hello");
        assert_eq!(form.group, None);
        assert_eq!(form.image, None);
    }
}
