//! Persistence gateway: typed async access to users, locations, posts, edges,
//! comments, categories and notifications. No business rules live here beyond the
//! relational constraints (uniqueness, cascades, referential integrity).

use std::collections::HashSet;

use async_trait::async_trait;

use crate::auth::Role;
use crate::cursor::Cursor;
use crate::models::*;

#[cfg(feature = "inmem-store")]
pub mod inmem;
#[cfg(feature = "postgres-store")]
pub mod pg;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict: {0}")] Conflict(String),
    #[error("invalid: {0}")] Invalid(String),
    #[error("internal: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Existence-only join rows keyed by `(actor, target)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// follower -> followed user
    Follow,
    /// user -> post
    Like,
    /// user -> post
    Save,
}

/// Feed selection. Only public posts are ever eligible.
#[derive(Debug, Clone, Default)]
pub struct FeedFilter {
    pub user_id: Option<Id>,
    pub location_id: Option<Id>,
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn get_user(&self, id: Id) -> RepoResult<User>;
    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    /// Create on first sign-in, otherwise return the row with the same email.
    async fn upsert_oauth_user(&self, new: NewOAuthUser) -> RepoResult<User>;
    async fn user_profile(&self, id: Id) -> RepoResult<UserProfile>;
    async fn update_profile(&self, id: Id, upd: UpdateProfile) -> RepoResult<User>;
    async fn set_role(&self, id: Id, role: Role) -> RepoResult<User>;
    async fn delete_user(&self, id: Id) -> RepoResult<()>;
    async fn list_followers(&self, id: Id) -> RepoResult<Vec<UserSummary>>;
    async fn list_following(&self, id: Id) -> RepoResult<Vec<UserSummary>>;
}

#[async_trait]
pub trait LocationRepo: Send + Sync {
    async fn get_location(&self, id: Id) -> RepoResult<Location>;
    /// Case-insensitive substring match on name or address.
    async fn search_locations(&self, query: &str, limit: i64) -> RepoResult<Vec<Location>>;
    /// Match by place id when given, else by exact coordinates; insert when nothing matches.
    /// The flag is true when this call inserted the row.
    async fn find_or_create_location(&self, new: NewLocation) -> RepoResult<(Location, bool)>;
}

#[async_trait]
pub trait PostRepo: Send + Sync {
    /// Fails with `Invalid` when a category or the location does not exist.
    async fn create_post(&self, owner: Id, new: NewPost) -> RepoResult<Post>;
    async fn get_post(&self, id: Id) -> RepoResult<Post>;
    async fn get_post_detail(&self, id: Id) -> RepoResult<PostDetail>;
    async fn update_post(&self, id: Id, upd: UpdatePost) -> RepoResult<Post>;
    async fn delete_post(&self, id: Id) -> RepoResult<()>;
    /// Public posts ordered `created_at DESC, id DESC`, strictly after `after`, at most `take` rows.
    async fn feed_page(&self, filter: &FeedFilter, after: Option<Cursor>, take: i64) -> RepoResult<Vec<PostDetail>>;
}

#[async_trait]
pub trait EdgeRepo: Send + Sync {
    /// Single-statement insert that ignores a unique collision. Returns true if this call created the row.
    async fn insert_edge(&self, kind: EdgeKind, actor: Id, target: Id) -> RepoResult<bool>;
    /// Single-statement delete. Returns true if this call removed the row.
    async fn delete_edge(&self, kind: EdgeKind, actor: Id, target: Id) -> RepoResult<bool>;
    async fn edge_exists(&self, kind: EdgeKind, actor: Id, target: Id) -> RepoResult<bool>;
    /// Subset of `targets` that `actor` has an edge to.
    async fn edges_among(&self, kind: EdgeKind, actor: Id, targets: &[Id]) -> RepoResult<HashSet<Id>>;
}

#[async_trait]
pub trait CommentRepo: Send + Sync {
    async fn create_comment(&self, post_id: Id, user_id: Id, content: String, parent_comment_id: Option<Id>) -> RepoResult<Comment>;
    async fn get_comment(&self, id: Id) -> RepoResult<Comment>;
    /// All comments of a post, oldest first.
    async fn list_comments(&self, post_id: Id) -> RepoResult<Vec<Comment>>;
}

#[async_trait]
pub trait CategoryRepo: Send + Sync {
    async fn list_categories(&self) -> RepoResult<Vec<CategoryWithCount>>;
    async fn get_category(&self, id: Id) -> RepoResult<CategoryWithCount>;
    async fn create_category(&self, input: CategoryInput) -> RepoResult<Category>;
    async fn update_category(&self, id: Id, input: CategoryInput) -> RepoResult<Category>;
    /// Fails with `Conflict` while any post references the category.
    async fn delete_category(&self, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait NotificationRepo: Send + Sync {
    async fn create_notification(&self, new: NewNotification) -> RepoResult<Notification>;
    async fn get_notification(&self, id: Id) -> RepoResult<Notification>;
    async fn list_notifications(&self, user_id: Id, unread_only: bool, after: Option<Cursor>, take: i64) -> RepoResult<Vec<Notification>>;
    async fn mark_read(&self, id: Id) -> RepoResult<Notification>;
    async fn mark_all_read(&self, user_id: Id) -> RepoResult<u64>;
    async fn unread_count(&self, user_id: Id) -> RepoResult<i64>;
}

#[async_trait]
pub trait LeaderboardRepo: Send + Sync {
    /// Users with at least one post, by post count DESC then account age ASC.
    async fn top_posters(&self, limit: i64, offset: i64) -> RepoResult<Vec<PosterRow>>;
}

pub trait Repo: UserRepo + LocationRepo + PostRepo + EdgeRepo + CommentRepo + CategoryRepo + NotificationRepo + LeaderboardRepo {}

impl<T> Repo for T where T: UserRepo + LocationRepo + PostRepo + EdgeRepo + CommentRepo + CategoryRepo + NotificationRepo + LeaderboardRepo {}
