//! Public feed assembly: compound-cursor pagination over public posts, with
//! per-viewer like/save flags layered on top of cacheable post details.

use std::time::Duration;

use crate::cache::{get_json, keys, set_json};
use crate::cursor::{self, Cursor};
use crate::error::ApiError;
use crate::models::{FeedItem, FeedPage, Id, PostDetail};
use crate::repo::{EdgeKind, FeedFilter};
use crate::routes::AppState;

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Default)]
pub struct FeedQuery {
    pub viewer_id: Option<Id>,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
    pub filter_user_id: Option<Id>,
    pub filter_location_id: Option<Id>,
}

/// The viewer-independent part of a page; this is what gets cached.
#[derive(serde::Serialize, serde::Deserialize)]
struct CachedPage {
    items: Vec<PostDetail>,
    next_cursor: Option<String>,
}

pub async fn get_feed(state: &AppState, q: FeedQuery) -> Result<FeedPage, ApiError> {
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let raw_cursor = q.cursor.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let after = cursor::parse_opt(raw_cursor).map_err(|e| ApiError::validation(e.to_string()))?;

    let cache_key = keys::public_feed(q.filter_user_id, q.filter_location_id, limit, raw_cursor);
    let cached = match q.viewer_id {
        None => get_json::<CachedPage>(state.cache.as_ref(), &cache_key).await,
        Some(_) => None,
    };

    let page = match cached {
        Some(page) => page,
        None => {
            let filter = FeedFilter { user_id: q.filter_user_id, location_id: q.filter_location_id };
            let page = load_page(state, &filter, after, limit).await?;
            if q.viewer_id.is_none() {
                let ttl = Duration::from_secs(state.config.cache_ttl.feed);
                set_json(state.cache.as_ref(), &cache_key, &page, ttl).await;
            }
            page
        }
    };

    let items = match q.viewer_id {
        Some(viewer) => with_viewer_flags(state, viewer, page.items).await?,
        None => page.items.into_iter().map(|detail| FeedItem { detail, is_liked: None, is_saved: None }).collect(),
    };
    Ok(FeedPage { items, next_cursor: page.next_cursor })
}

async fn load_page(state: &AppState, filter: &FeedFilter, after: Option<Cursor>, limit: i64) -> Result<CachedPage, ApiError> {
    // one extra row tells us whether another page exists
    let mut items = state.repo.feed_page(filter, after, limit + 1).await?;
    let next_cursor = if items.len() as i64 > limit {
        items.truncate(limit as usize);
        items.last().map(|d| Cursor::new(d.post.created_at, d.post.id).encode())
    } else {
        None
    };
    Ok(CachedPage { items, next_cursor })
}

/// Attach `isLiked` / `isSaved` for one viewer using two batched lookups per page.
pub async fn with_viewer_flags(state: &AppState, viewer: Id, details: Vec<PostDetail>) -> Result<Vec<FeedItem>, ApiError> {
    let ids: Vec<Id> = details.iter().map(|d| d.post.id).collect();
    let liked = state.repo.edges_among(EdgeKind::Like, viewer, &ids).await?;
    let saved = state.repo.edges_among(EdgeKind::Save, viewer, &ids).await?;
    Ok(details
        .into_iter()
        .map(|detail| {
            let id = detail.post.id;
            FeedItem { detail, is_liked: Some(liked.contains(&id)), is_saved: Some(saved.contains(&id)) }
        })
        .collect())
}
