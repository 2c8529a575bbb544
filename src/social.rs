//! Follow / like / save toggles.
//!
//! Each toggle is a delete-if-present followed, only when nothing was deleted, by an
//! insert-on-conflict-do-nothing. Both are single statements, so concurrent duplicate
//! requests settle on the unique constraint instead of erroring: a lost insert race
//! reads as "edge already exists", a lost delete race as "edge already absent".

use futures_util::future::join_all;
use serde::Serialize;
use utoipa::ToSchema;

use crate::cache::keys;
use crate::error::ApiError;
use crate::models::{Id, NotificationType};
use crate::notify::notify;
use crate::repo::EdgeKind;
use crate::routes::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct FollowState { pub following: bool }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct LikeState { pub liked: bool }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct SaveState { pub saved: bool }

/// Outcome of flipping one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flip {
    /// This call removed the edge.
    Removed,
    /// This call created the edge.
    Created,
    /// A concurrent request created it first; treated as present.
    AlreadyPresent,
}

impl Flip {
    fn present(self) -> bool {
        !matches!(self, Flip::Removed)
    }
}

async fn flip(state: &AppState, kind: EdgeKind, actor: Id, target: Id) -> Result<Flip, ApiError> {
    if state.repo.delete_edge(kind, actor, target).await? {
        return Ok(Flip::Removed);
    }
    if state.repo.insert_edge(kind, actor, target).await? {
        Ok(Flip::Created)
    } else {
        log::debug!("{kind:?} edge ({actor},{target}) raced with a concurrent insert");
        Ok(Flip::AlreadyPresent)
    }
}

async fn invalidate(state: &AppState, entries: &[String]) {
    join_all(entries.iter().map(|k| state.cache.delete(k))).await;
}

pub async fn toggle_follow(state: &AppState, actor: Id, target: Id) -> Result<FollowState, ApiError> {
    if actor == target {
        return Err(ApiError::validation("Cannot follow yourself"));
    }
    // existence check so an unknown target is a 404 rather than an FK failure
    state.repo.get_user(target).await?;

    let outcome = flip(state, EdgeKind::Follow, actor, target).await?;
    invalidate(state, &[keys::followers(target), keys::following(actor), keys::user(target), keys::user(actor)]).await;

    if outcome == Flip::Created {
        notify(state.outbox.as_ref(), target, NotificationType::Follow, actor, None).await;
    }
    Ok(FollowState { following: outcome.present() })
}

pub async fn toggle_like(state: &AppState, actor: Id, post_id: Id) -> Result<LikeState, ApiError> {
    let post = state.repo.get_post(post_id).await?;

    let outcome = flip(state, EdgeKind::Like, actor, post_id).await?;
    invalidate(state, &[keys::post(post_id)]).await;
    state.cache.delete_pattern(keys::PUBLIC_FEED_PATTERN).await;

    if outcome == Flip::Created {
        notify(state.outbox.as_ref(), post.user_id, NotificationType::Like, actor, Some(post_id)).await;
    }
    Ok(LikeState { liked: outcome.present() })
}

pub async fn toggle_save(state: &AppState, actor: Id, post_id: Id) -> Result<SaveState, ApiError> {
    state.repo.get_post(post_id).await?;

    let outcome = flip(state, EdgeKind::Save, actor, post_id).await?;
    invalidate(state, &[keys::post(post_id)]).await;
    state.cache.delete_pattern(keys::PUBLIC_FEED_PATTERN).await;

    Ok(SaveState { saved: outcome.present() })
}
