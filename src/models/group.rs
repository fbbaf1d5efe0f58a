use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TITLE_MAX_LEN: usize = 200;
pub const SLUG_MAX_LEN: usize = 50;

/// A community posts can be filed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl Group {
    pub fn new(title: String, slug: String, description: String) -> Self {
        Group {
            id: Uuid::new_v4(),
            title,
            slug,
            description,
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

impl CreateGroupRequest {
    pub fn validate(&self) -> Result<(), String> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err("Title cannot be empty".to_string());
        }

        if title.chars().count() > TITLE_MAX_LEN {
            return Err(format!("Title cannot exceed {} characters", TITLE_MAX_LEN));
        }

        validate_slug(self.slug.trim())?;

        if self.description.trim().is_empty() {
            return Err("Description cannot be empty".to_string());
        }

        Ok(())
    }

    pub fn into_group(self) -> Group {
        Group::new(
            self.title.trim().to_string(),
            self.slug.trim().to_string(),
            self.description.trim().to_string(),
        )
    }
}

/// Slugs are ASCII letters, digits, hyphens and underscores.
pub fn validate_slug(slug: &str) -> Result<(), String> {
    if slug.is_empty() {
        return Err("Slug cannot be empty".to_string());
    }

    if slug.len() > SLUG_MAX_LEN {
        return Err(format!("Slug cannot exceed {} characters", SLUG_MAX_LEN));
    }

    if !slug
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return Err("Slug may contain only letters, digits, hyphens and underscores".to_string());
    }

    Ok(())
}
