#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use pinmap::auth::{create_jwt, Role};
use pinmap::cache::InMemoryCache;
use pinmap::models::{Id, Location, NewLocation, NewOAuthUser, NewPost, Post, UpdateProfile, User};
use pinmap::notify::InlineOutbox;
use pinmap::repo::inmem::InMemRepo;
use pinmap::repo::{LocationRepo, PostRepo, UserRepo};
use pinmap::{AppConfig, AppState};

pub const SECRET: &str = "test-secret-must-be-32-bytes-long!!";
pub const IDENTITY_SECRET: &str = "identity-front-end-secret";

/// App state over a fresh in-memory store with inline notification delivery, plus a
/// handle on the same store for direct assertions.
pub fn state() -> (AppState, InMemRepo) {
    state_with(config())
}

pub fn state_with(config: AppConfig) -> (AppState, InMemRepo) {
    let repo = InMemRepo::new();
    let shared: Arc<InMemRepo> = Arc::new(repo.clone());
    let state = AppState::new(
        shared.clone(),
        Arc::new(InMemoryCache::new()),
        Arc::new(InlineOutbox::new(shared)),
        config,
    );
    (state, repo)
}

pub fn config() -> AppConfig {
    let mut config = AppConfig::for_tests(SECRET);
    config.identity_secret = Some(IDENTITY_SECRET.to_string());
    config
}

static NEXT_SPOT: AtomicU32 = AtomicU32::new(1);

/// Location keyed by a place id derived from `name`; the same name returns the same row.
pub async fn location(repo: &InMemRepo, name: &str) -> Location {
    // distinct coordinates per new row so the coordinate match never aliases two names
    let spot = NEXT_SPOT.fetch_add(1, Ordering::Relaxed) as f64;
    let (location, _) = repo
        .find_or_create_location(NewLocation {
            name: Some(name.to_string()),
            latitude: (spot * 0.001) % 80.0,
            longitude: -((spot * 0.001) % 170.0),
            place_id: Some(format!("place-{name}")),
            ..Default::default()
        })
        .await
        .unwrap();
    location
}

pub async fn user(repo: &InMemRepo, username: &str) -> User {
    let u = repo
        .upsert_oauth_user(NewOAuthUser { email: format!("{username}@example.com"), name: Some(username.to_string()), image: None })
        .await
        .unwrap();
    repo.update_profile(u.id, UpdateProfile { username: Some(username.to_string()), ..Default::default() })
        .await
        .unwrap()
}

pub async fn user_with_role(repo: &InMemRepo, username: &str, role: Role) -> User {
    let u = user(repo, username).await;
    repo.set_role(u.id, role).await.unwrap()
}

pub fn new_post(location_id: Id, is_public: bool) -> NewPost {
    NewPost {
        title: Some("sunset".into()),
        description: None,
        location_id,
        image_urls: vec!["https://img.example.com/a.jpg".into()],
        is_public,
        category_ids: vec![],
    }
}

pub async fn post(repo: &InMemRepo, owner: &User, is_public: bool) -> Post {
    let spot = location(repo, "Trailhead").await;
    repo.create_post(owner.id, new_post(spot.id, is_public)).await.unwrap()
}

pub fn bearer(user: &User) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", create_jwt(SECRET, user.id, 1).unwrap()))
}
