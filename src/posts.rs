use std::time::Duration;

use crate::auth::{has_role, Caller, Role};
use crate::cache::{get_json, keys, set_json};
use crate::error::ApiError;
use crate::feed::with_viewer_flags;
use crate::models::{FeedItem, Id, NewPost, PostDetail, UpdatePost};
use crate::routes::AppState;

fn validate_new(new: &NewPost) -> Result<(), ApiError> {
    if new.image_urls.is_empty() {
        return Err(ApiError::validation("At least one image is required"));
    }
    if new.image_urls.iter().any(|u| u.trim().is_empty()) {
        return Err(ApiError::validation("Image URLs must not be empty"));
    }
    Ok(())
}

async fn invalidate(state: &AppState, post_id: Option<Id>) {
    if let Some(id) = post_id {
        state.cache.delete(&keys::post(id)).await;
    }
    state.cache.delete_pattern(keys::PUBLIC_FEED_PATTERN).await;
}

pub async fn create_post(state: &AppState, caller: &Caller, mut new: NewPost) -> Result<PostDetail, ApiError> {
    validate_new(&new)?;
    new.category_ids.sort_unstable();
    new.category_ids.dedup();

    let post = state.repo.create_post(caller.id, new).await?;
    log::info!("user {} created post {}", caller.id, post.id);
    invalidate(state, None).await;
    state.cache.delete(&keys::user(caller.id)).await;
    Ok(state.repo.get_post_detail(post.id).await?)
}

/// Private posts are only visible to their owner and to moderators.
fn can_view(detail: &PostDetail, viewer: Option<&Caller>) -> bool {
    detail.post.is_public
        || viewer.is_some_and(|c| c.id == detail.post.user_id || has_role(c.role, Role::Moderator))
}

pub async fn get_post(state: &AppState, viewer: Option<&Caller>, id: Id) -> Result<FeedItem, ApiError> {
    let key = keys::post(id);
    let detail = match get_json::<PostDetail>(state.cache.as_ref(), &key).await {
        Some(d) => d,
        None => {
            let d = state.repo.get_post_detail(id).await?;
            let ttl = Duration::from_secs(state.config.cache_ttl.post_detail);
            set_json(state.cache.as_ref(), &key, &d, ttl).await;
            d
        }
    };
    if !can_view(&detail, viewer) {
        return Err(ApiError::NotFound);
    }
    match viewer {
        Some(c) => {
            let mut items = with_viewer_flags(state, c.id, vec![detail]).await?;
            items.pop().ok_or(ApiError::Internal)
        }
        None => Ok(FeedItem { detail, is_liked: None, is_saved: None }),
    }
}

pub async fn update_post(state: &AppState, caller: &Caller, id: Id, mut upd: UpdatePost) -> Result<PostDetail, ApiError> {
    let post = state.repo.get_post(id).await?;
    if post.user_id != caller.id {
        return Err(ApiError::Forbidden);
    }
    if let Some(cats) = upd.category_ids.as_mut() {
        cats.sort_unstable();
        cats.dedup();
    }
    state.repo.update_post(id, upd).await?;
    invalidate(state, Some(id)).await;
    Ok(state.repo.get_post_detail(id).await?)
}

/// Owner, or any moderator.
pub async fn delete_post(state: &AppState, caller: &Caller, id: Id) -> Result<(), ApiError> {
    let post = state.repo.get_post(id).await?;
    if post.user_id != caller.id && !has_role(caller.role, Role::Moderator) {
        return Err(ApiError::Forbidden);
    }
    state.repo.delete_post(id).await?;
    log::info!("post {id} deleted by user {}", caller.id);
    invalidate(state, Some(id)).await;
    state.cache.delete(&keys::user(post.user_id)).await;
    Ok(())
}

/// Moderation: hide or republish a post without touching its content.
pub async fn set_visibility(state: &AppState, id: Id, is_public: bool) -> Result<PostDetail, ApiError> {
    let upd = UpdatePost { is_public: Some(is_public), ..Default::default() };
    state.repo.update_post(id, upd).await?;
    invalidate(state, Some(id)).await;
    Ok(state.repo.get_post_detail(id).await?)
}
