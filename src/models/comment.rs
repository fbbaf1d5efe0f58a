use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::models::post::preview;
use crate::models::user::User;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CommentForm {
    pub text: String,
}

impl Comment {
    pub fn new(post_id: Uuid, author: &User, text: String, created_at: DateTime<Utc>) -> Self {
        Comment {
            id: Uuid::new_v4(),
            post_id,
            author_id: author.id,
            author: author.username.clone(),
            text,
            created_at,
        }
    }
}

impl fmt::Display for Comment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&preview(&self.text))
    }
}

impl CommentForm {
    pub fn validate(&self) -> Result<(), String> {
        if self.text.trim().is_empty() {
            return Err("Comment text cannot be empty".to_string());
        }
        Ok(())
    }

    pub fn into_comment(self, post_id: Uuid, author: &User, now: DateTime<Utc>) -> Comment {
        Comment::new(post_id, author, self.text.trim().to_string(), now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_form() {
        let author = User::new("anna".to_string(), Utc::now());
        let post_id = Uuid::new_v4();

        assert!(CommentForm { text: " ".to_string() }.validate().is_err());

        let comment = CommentForm { text: "  Nice read, thank you  ".to_string() }
            .into_comment(post_id, &author, Utc::now());

        assert_eq!(comment.post_id, post_id);
        assert_eq!(comment.author, "anna");
        assert_eq!(comment.text, "Nice read, thank you");
        assert_eq!(comment.to_string(), "Nice read, than");
    }
}
