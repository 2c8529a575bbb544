pub mod auth;
pub mod cache;
pub mod categories;
pub mod comments;
pub mod config;
pub mod cursor;
pub mod error;
pub mod feed;
pub mod leaderboard;
pub mod locations;
pub mod models;
pub mod notify;
pub mod openapi;
pub mod posts;
pub mod repo;
pub mod routes;
pub mod social;
pub mod users;

// Re-export commonly used items for tests / external users
pub use config::AppConfig;
pub use routes::{config, AppState};
