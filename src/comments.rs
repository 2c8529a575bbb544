use std::collections::HashMap;

use crate::auth::Caller;
use crate::cache::keys;
use crate::error::ApiError;
use crate::models::{Comment, CommentThread, Id, NewComment, NotificationType};
use crate::notify::{extract_mentions, notify};
use crate::routes::AppState;

pub const MAX_COMMENT_LEN: usize = 2000;

pub async fn add_comment(state: &AppState, caller: &Caller, post_id: Id, input: NewComment) -> Result<Comment, ApiError> {
    let content = input.content.trim();
    if content.is_empty() {
        return Err(ApiError::validation("Comment cannot be empty"));
    }
    if content.chars().count() > MAX_COMMENT_LEN {
        return Err(ApiError::validation(format!("Comment must be at most {MAX_COMMENT_LEN} characters")));
    }

    let post = state.repo.get_post(post_id).await?;

    if let Some(parent_id) = input.parent_comment_id {
        let parent = match state.repo.get_comment(parent_id).await {
            Ok(p) => p,
            Err(crate::repo::RepoError::NotFound) => return Err(ApiError::validation("Parent comment not found")),
            Err(e) => return Err(e.into()),
        };
        if parent.post_id != post_id {
            return Err(ApiError::validation("Parent comment belongs to a different post"));
        }
        if parent.parent_comment_id.is_some() {
            return Err(ApiError::validation("Replies cannot be nested more than one level"));
        }
    }

    let comment = state
        .repo
        .create_comment(post_id, caller.id, content.to_string(), input.parent_comment_id)
        .await?;
    state.cache.delete(&keys::post(post_id)).await;
    state.cache.delete_pattern(keys::PUBLIC_FEED_PATTERN).await;

    notify(state.outbox.as_ref(), post.user_id, NotificationType::Comment, caller.id, Some(post_id)).await;
    fan_out_mentions(state, caller.id, post.user_id, post_id, &comment.content).await;
    Ok(comment)
}

/// MENTION notifications for every `@handle` that resolves to a user other than
/// the author and the post owner (who already received a COMMENT notification).
async fn fan_out_mentions(state: &AppState, actor: Id, post_owner: Id, post_id: Id, content: &str) {
    let mut notified = vec![actor, post_owner];
    for handle in extract_mentions(content) {
        let user = match state.repo.find_user_by_username(&handle).await {
            Ok(Some(u)) => u,
            Ok(None) => continue,
            Err(e) => {
                log::warn!("mention lookup for @{handle} failed: {e}");
                continue;
            }
        };
        if notified.contains(&user.id) {
            continue;
        }
        notified.push(user.id);
        notify(state.outbox.as_ref(), user.id, NotificationType::Mention, actor, Some(post_id)).await;
    }
}

/// Top-level comments newest first, each with its replies oldest first.
pub async fn list_comments(state: &AppState, post_id: Id) -> Result<Vec<CommentThread>, ApiError> {
    state.repo.get_post(post_id).await?;
    let all = state.repo.list_comments(post_id).await?;

    let mut replies: HashMap<Id, Vec<Comment>> = HashMap::new();
    let mut top = Vec::new();
    for c in all {
        match c.parent_comment_id {
            Some(parent) => replies.entry(parent).or_default().push(c),
            None => top.push(c),
        }
    }
    top.reverse();
    Ok(top
        .into_iter()
        .map(|comment| {
            let replies = replies.remove(&comment.id).unwrap_or_default();
            CommentThread { comment, replies }
        })
        .collect())
}
