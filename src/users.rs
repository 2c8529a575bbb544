use std::time::Duration;

use crate::auth::{create_jwt, Caller, Role};
use crate::cache::{get_json, keys, set_json};
use crate::error::ApiError;
use crate::models::{Id, NewOAuthUser, UpdateProfile, User, UserProfile, UserSummary};
use crate::routes::AppState;

/// Exchange an identity verified by the sign-in front end for a session token.
/// The first sign-in for an email creates the account with role USER; later ones
/// return the same account with its role untouched. Emails listed in
/// `bootstrap_admin_emails` are promoted from USER to ADMIN.
pub async fn sign_in(state: &AppState, mut identity: NewOAuthUser) -> Result<(User, String), ApiError> {
    identity.email = identity.email.trim().to_lowercase();
    let valid = identity.email.split_once('@').is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !valid {
        return Err(ApiError::validation("A valid email is required"));
    }
    let email = identity.email.clone();
    let mut user = state.repo.upsert_oauth_user(identity).await?;
    if user.role == Role::User && state.config.bootstrap_admin_emails.contains(&email) {
        user = state.repo.set_role(user.id, Role::Admin).await?;
        log::info!("user {} promoted to ADMIN by bootstrap list", user.id);
        state.cache.delete(&keys::user(user.id)).await;
    }
    let token = create_jwt(&state.config.jwt_secret, user.id, state.config.jwt_ttl_hours).map_err(|e| {
        log::error!("issuing token for user {} failed: {e}", user.id);
        ApiError::Internal
    })?;
    log::info!("user {} signed in", user.id);
    Ok((user, token))
}

pub async fn get_user(state: &AppState, id: Id) -> Result<UserProfile, ApiError> {
    let key = keys::user(id);
    if let Some(profile) = get_json::<UserProfile>(state.cache.as_ref(), &key).await {
        return Ok(profile);
    }
    let profile = state.repo.user_profile(id).await?;
    let ttl = Duration::from_secs(state.config.cache_ttl.user_profile);
    set_json(state.cache.as_ref(), &key, &profile, ttl).await;
    Ok(profile)
}

fn valid_username(name: &str) -> bool {
    !name.is_empty() && name.len() <= 32 && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '-')
}

pub async fn update_profile(state: &AppState, caller: &Caller, id: Id, mut upd: UpdateProfile) -> Result<User, ApiError> {
    if caller.id != id {
        return Err(ApiError::Forbidden);
    }
    if let Some(name) = upd.username.as_mut() {
        *name = name.trim().to_string();
        if !valid_username(name) {
            return Err(ApiError::validation("Username may only contain letters, digits, '_', '.' and '-'"));
        }
    }
    let user = state.repo.update_profile(id, upd).await?;
    state.cache.delete(&keys::user(id)).await;
    forget_summaries(state).await;
    Ok(user)
}

/// Drop every cached entry that embeds a `UserSummary` or a count derived from
/// another user's rows.
async fn forget_summaries(state: &AppState) {
    for pattern in [keys::POST_PATTERN, keys::FOLLOWERS_PATTERN, keys::FOLLOWING_PATTERN, keys::PUBLIC_FEED_PATTERN] {
        state.cache.delete_pattern(pattern).await;
    }
}

async fn cached_summaries(state: &AppState, key: String, load: impl std::future::Future<Output = Result<Vec<UserSummary>, crate::repo::RepoError>>) -> Result<Vec<UserSummary>, ApiError> {
    if let Some(list) = get_json::<Vec<UserSummary>>(state.cache.as_ref(), &key).await {
        return Ok(list);
    }
    let list = load.await?;
    let ttl = Duration::from_secs(state.config.cache_ttl.social_graph);
    set_json(state.cache.as_ref(), &key, &list, ttl).await;
    Ok(list)
}

pub async fn list_followers(state: &AppState, id: Id) -> Result<Vec<UserSummary>, ApiError> {
    cached_summaries(state, keys::followers(id), state.repo.list_followers(id)).await
}

pub async fn list_following(state: &AppState, id: Id) -> Result<Vec<UserSummary>, ApiError> {
    cached_summaries(state, keys::following(id), state.repo.list_following(id)).await
}

/// Admin only at the route. Takes effect on the user's next request.
pub async fn set_role(state: &AppState, id: Id, role: &str) -> Result<User, ApiError> {
    let role: Role = role.parse().map_err(|_| ApiError::validation(format!("Invalid role: {role}")))?;
    let user = state.repo.set_role(id, role).await?;
    log::info!("user {id} role set to {role}");
    state.cache.delete(&keys::user(id)).await;
    Ok(user)
}

pub async fn delete_user(state: &AppState, id: Id) -> Result<(), ApiError> {
    state.repo.delete_user(id).await?;
    log::info!("user {id} deleted");
    // the cascade touches other users' posts, profiles and follow lists
    state.cache.delete_pattern(keys::USER_PATTERN).await;
    forget_summaries(state).await;
    Ok(())
}
