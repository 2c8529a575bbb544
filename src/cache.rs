use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Advisory key/value cache. Every method is infallible from the caller's point of
/// view: a backend problem degrades to a miss and is logged.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get_raw(&self, key: &str) -> Option<String>;
    async fn set_raw(&self, key: &str, value: String, ttl: Duration);
    async fn delete(&self, key: &str);
    /// Delete every key matching a glob pattern where `*` matches any run of characters.
    async fn delete_pattern(&self, pattern: &str);
}

pub async fn get_json<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Option<T> {
    let raw = cache.get_raw(key).await?;
    match serde_json::from_str(&raw) {
        Ok(v) => Some(v),
        Err(e) => {
            log::warn!("cache entry {key} undecodable, dropping: {e}");
            cache.delete(key).await;
            None
        }
    }
}

pub async fn set_json<T: Serialize + ?Sized>(cache: &dyn Cache, key: &str, value: &T, ttl: Duration) {
    match serde_json::to_string(value) {
        Ok(raw) => cache.set_raw(key, raw, ttl).await,
        Err(e) => log::warn!("cache set {key} skipped: {e}"),
    }
}

/// Key builders shared by readers and invalidators.
pub mod keys {
    use crate::models::Id;

    pub fn user(id: Id) -> String { format!("user:{id}") }
    pub fn post(id: Id) -> String { format!("post:{id}") }
    pub fn followers(id: Id) -> String { format!("followers:{id}") }
    pub fn following(id: Id) -> String { format!("following:{id}") }

    pub const PUBLIC_FEED_PATTERN: &str = "feed:public:*";
    pub const POST_PATTERN: &str = "post:*";
    pub const USER_PATTERN: &str = "user:*";
    pub const FOLLOWERS_PATTERN: &str = "followers:*";
    pub const FOLLOWING_PATTERN: &str = "following:*";

    pub fn public_feed(user: Option<Id>, location: Option<Id>, limit: i64, cursor: Option<&str>) -> String {
        format!(
            "feed:public:{}:{}:{}:{}",
            user.map(|u| u.to_string()).unwrap_or_else(|| "all".into()),
            location.map(|l| l.to_string()).unwrap_or_else(|| "all".into()),
            limit,
            cursor.unwrap_or("start"),
        )
    }
}

/// Glob match supporting only `*`.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }
    let mut rest = key;
    let first = parts[0];
    if !rest.starts_with(first) {
        return false;
    }
    rest = &rest[first.len()..];
    let last = parts[parts.len() - 1];
    for mid in &parts[1..parts.len() - 1] {
        match rest.find(mid) {
            Some(pos) => rest = &rest[pos + mid.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

/// Writes between full sweeps of expired entries.
const SWEEP_EVERY: usize = 256;

/// Process-local TTL cache. Expired entries are dropped on read, on pattern
/// deletes, and by a sweep every `SWEEP_EVERY` writes.
#[derive(Clone, Default)]
pub struct InMemoryCache {
    store: Arc<DashMap<String, (Instant, String)>>,
    writes: Arc<AtomicUsize>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every expired entry. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let before = self.store.len();
        let now = Instant::now();
        self.store.retain(|_, (expires, _)| *expires > now);
        let dropped = before.saturating_sub(self.store.len());
        if dropped > 0 {
            log::debug!("cache sweep dropped {dropped} expired entries");
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get_raw(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let hit = self.store.get(key).and_then(|entry| {
            let (expires, value) = entry.value();
            (*expires > now).then(|| value.clone())
        });
        if hit.is_none() {
            // remove_if avoids racing a concurrent fresh set
            self.store.remove_if(key, |_, (expires, _)| *expires <= now);
            log::debug!("cache miss {key}");
        }
        hit
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) {
        if self.writes.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.purge_expired();
        }
        self.store.insert(key.to_string(), (Instant::now() + ttl, value));
    }

    async fn delete(&self, key: &str) {
        self.store.remove(key);
    }

    async fn delete_pattern(&self, pattern: &str) {
        let now = Instant::now();
        self.store.retain(|k, (expires, _)| *expires > now && !glob_match(pattern, k));
    }
}

/// Cache that never stores anything. Useful to verify behaviour does not depend on caching.
#[derive(Clone, Copy, Default)]
pub struct NoopCache;

#[async_trait]
impl Cache for NoopCache {
    async fn get_raw(&self, _key: &str) -> Option<String> { None }
    async fn set_raw(&self, _key: &str, _value: String, _ttl: Duration) {}
    async fn delete(&self, _key: &str) {}
    async fn delete_pattern(&self, _pattern: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_matching() {
        assert!(glob_match("feed:public:*", "feed:public:all:all:20:start"));
        assert!(!glob_match("feed:public:*", "post:1"));
        assert!(glob_match("post:1", "post:1"));
        assert!(!glob_match("post:1", "post:10"));
        assert!(glob_match("a*c*e", "abcde"));
        assert!(!glob_match("a*c*e", "abcd"));
    }

    #[tokio::test]
    async fn ttl_expiry_and_pattern_delete() {
        let c = InMemoryCache::new();
        c.set_raw("post:1", "x".into(), Duration::from_millis(20)).await;
        c.set_raw("feed:public:all", "y".into(), Duration::from_secs(60)).await;
        c.set_raw("feed:public:7", "z".into(), Duration::from_secs(60)).await;
        assert_eq!(c.get_raw("post:1").await.as_deref(), Some("x"));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(c.get_raw("post:1").await.is_none());

        c.delete_pattern(keys::PUBLIC_FEED_PATTERN).await;
        assert!(c.is_empty());
    }

    #[tokio::test]
    async fn expired_entries_are_swept_without_being_read() {
        let c = InMemoryCache::new();
        for i in 0..10 {
            c.set_raw(&format!("user:{i}"), "x".into(), Duration::from_millis(10)).await;
        }
        c.set_raw("post:1", "y".into(), Duration::from_secs(60)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(c.purge_expired(), 10);
        assert_eq!(c.len(), 1);

        // the write cadence triggers the same sweep
        for i in 0..SWEEP_EVERY {
            c.set_raw(&format!("followers:{i}"), "z".into(), Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;
        for i in 0..SWEEP_EVERY {
            c.set_raw(&format!("following:{i}"), "z".into(), Duration::from_secs(60)).await;
        }
        assert!(c.len() <= SWEEP_EVERY + 1, "stale followers:* entries survived: {}", c.len());
        assert_eq!(c.get_raw("post:1").await.as_deref(), Some("y"));
    }

    #[tokio::test]
    async fn json_helpers_roundtrip() {
        let c = InMemoryCache::new();
        set_json(&c, "k", &vec![1, 2, 3], Duration::from_secs(5)).await;
        let v: Option<Vec<i32>> = get_json(&c, "k").await;
        assert_eq!(v, Some(vec![1, 2, 3]));
        c.delete("k").await;
        assert_eq!(get_json::<Vec<i32>>(&c, "k").await, None);
    }
}
