use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::models::LeaderboardEntry;
use crate::repo::Repo;

pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaderboardPage {
    pub data: Vec<LeaderboardEntry>,
    /// Number of entries in this page.
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Ranked users by post count. Offset pagination, so ranks may drift between
/// page requests if counts change in the meantime.
pub async fn get_top_users(repo: &dyn Repo, limit: Option<i64>, offset: Option<i64>) -> Result<LeaderboardPage, ApiError> {
    let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = offset.unwrap_or(0).max(0);

    let rows = repo.top_posters(limit, offset).await?;
    let data: Vec<LeaderboardEntry> = rows
        .into_iter()
        .enumerate()
        .map(|(i, r)| LeaderboardEntry {
            rank: offset + i as i64 + 1,
            user_id: r.user_id,
            username: r.username,
            name: r.name,
            avatar_url: r.image,
            post_count: r.post_count,
        })
        .collect();
    Ok(LeaderboardPage { total: data.len() as i64, data, limit, offset })
}
