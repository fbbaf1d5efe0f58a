use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Directed subscription: `user` receives `author`'s posts in their feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Follow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Follow {
    pub fn new(user_id: Uuid, author_id: Uuid, created_at: DateTime<Utc>) -> Self {
        Follow {
            id: Uuid::new_v4(),
            user_id,
            author_id,
            created_at,
        }
    }

    pub fn is_self_follow(&self) -> bool {
        self.user_id == self.author_id
    }
}
