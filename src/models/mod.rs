// Models module

pub mod comment;
pub mod follow;
pub mod group;
pub mod post;
pub mod user;

// Re-export commonly used types
pub use comment::{Comment, CommentForm};
pub use follow::Follow;
pub use group::{CreateGroupRequest, Group};
pub use post::{Post, PostForm};
pub use user::{CreateUserRequest, User};
