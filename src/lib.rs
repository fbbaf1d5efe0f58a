// Library root for the blog feed service

pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod routes;
pub mod state;
pub mod store;
pub mod subscriptions;

// Re-export commonly used types
pub use db::Database;
pub use error::{ApiError, ApiResult};
pub use models::{Comment, Follow, Group, Post, User};
pub use routes::create_router;
pub use state::AppState;
pub use store::{MemoryStore, PostFilter, Store};
