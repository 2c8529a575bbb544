#![cfg(feature = "inmem-store")]

mod common;

use std::collections::HashSet;

use pinmap::error::ApiError;
use pinmap::feed::{get_feed, FeedQuery};
use pinmap::repo::PostRepo;
use pinmap::social;

#[tokio::test]
async fn chained_pages_cover_every_public_post_once() {
    let (state, repo) = common::state();
    let a = common::user(&repo, "alice").await;
    let b = common::user(&repo, "bob").await;
    let mut public = Vec::new();
    for i in 0..9 {
        let owner = if i % 2 == 0 { &a } else { &b };
        public.push(common::post(&repo, owner, true).await.id);
        if i % 3 == 0 {
            common::post(&repo, owner, false).await;
        }
    }

    let mut seen = Vec::new();
    let mut keys = Vec::new();
    let mut cursor = None;
    loop {
        let page = get_feed(&state, FeedQuery { cursor: cursor.take(), limit: Some(2), ..Default::default() })
            .await
            .unwrap();
        assert!(page.items.len() <= 2);
        for item in &page.items {
            assert!(item.detail.post.is_public);
            assert!(item.is_liked.is_none() && item.is_saved.is_none());
            seen.push(item.detail.post.id);
            keys.push((item.detail.post.created_at, item.detail.post.id));
        }
        match page.next_cursor {
            Some(c) => cursor = Some(c),
            None => break,
        }
    }

    let unique: HashSet<_> = seen.iter().copied().collect();
    assert_eq!(unique.len(), seen.len(), "duplicates across pages");
    assert_eq!(unique, public.iter().copied().collect::<HashSet<_>>());
    assert!(keys.windows(2).all(|w| w[0] > w[1]), "not strictly descending");
}

#[tokio::test]
async fn viewer_flags_are_per_viewer() {
    let (state, repo) = common::state();
    let a = common::user(&repo, "alice").await;
    let b = common::user(&repo, "bob").await;
    let p1 = common::post(&repo, &a, true).await;
    let p2 = common::post(&repo, &a, true).await;
    social::toggle_like(&state, b.id, p1.id).await.unwrap();
    social::toggle_save(&state, b.id, p2.id).await.unwrap();

    let page = get_feed(&state, FeedQuery { viewer_id: Some(b.id), ..Default::default() }).await.unwrap();
    let flags: Vec<_> = page.items.iter().map(|i| (i.detail.post.id, i.is_liked, i.is_saved)).collect();
    assert_eq!(flags, vec![(p2.id, Some(false), Some(true)), (p1.id, Some(true), Some(false))]);

    let liked = &page.items[1];
    assert_eq!(liked.detail.counts.likes_count, 1);
    assert_eq!(liked.detail.counts.saves_count, 0);

    let other = get_feed(&state, FeedQuery { viewer_id: Some(a.id), ..Default::default() }).await.unwrap();
    assert!(other.items.iter().all(|i| i.is_liked == Some(false) && i.is_saved == Some(false)));
}

#[tokio::test]
async fn anonymous_cache_is_invalidated_by_writes() {
    let (state, repo) = common::state();
    let a = common::user(&repo, "alice").await;
    let b = common::user(&repo, "bob").await;
    let p = common::post(&repo, &a, true).await;

    let first = get_feed(&state, FeedQuery::default()).await.unwrap();
    assert_eq!(first.items[0].detail.counts.likes_count, 0);

    social::toggle_like(&state, b.id, p.id).await.unwrap();
    let second = get_feed(&state, FeedQuery::default()).await.unwrap();
    assert_eq!(second.items[0].detail.counts.likes_count, 1);

    // a post written behind the service layer stays invisible until the entry is invalidated
    let spot = common::location(&repo, "Trailhead").await;
    repo.create_post(b.id, common::new_post(spot.id, true)).await.unwrap();
    assert_eq!(get_feed(&state, FeedQuery::default()).await.unwrap().items.len(), 1);
    social::toggle_save(&state, b.id, p.id).await.unwrap();
    assert_eq!(get_feed(&state, FeedQuery::default()).await.unwrap().items.len(), 2);
}

#[tokio::test]
async fn filters_limits_and_malformed_cursor() {
    let (state, repo) = common::state();
    let a = common::user(&repo, "alice").await;
    let b = common::user(&repo, "bob").await;
    let first = common::post(&repo, &a, true).await;
    let lake = common::location(&repo, "Lake").await;
    repo.create_post(b.id, common::new_post(lake.id, true)).await.unwrap();

    let by_user = get_feed(&state, FeedQuery { filter_user_id: Some(b.id), ..Default::default() }).await.unwrap();
    assert_eq!(by_user.items.len(), 1);
    assert_eq!(by_user.items[0].detail.user.id, b.id);

    let by_loc = get_feed(&state, FeedQuery { filter_location_id: Some(first.location_id), ..Default::default() }).await.unwrap();
    assert_eq!(by_loc.items.len(), 1);
    assert_eq!(by_loc.items[0].detail.post.id, first.id);
    assert_eq!(by_loc.items[0].detail.location.name, "Trailhead");

    // limit below 1 is clamped up
    let clamped = get_feed(&state, FeedQuery { limit: Some(0), ..Default::default() }).await.unwrap();
    assert_eq!(clamped.items.len(), 1);
    assert!(clamped.next_cursor.is_some());

    let err = get_feed(&state, FeedQuery { cursor: Some("not a cursor".into()), ..Default::default() }).await;
    assert!(matches!(err, Err(ApiError::Validation(_))));

    let empty = get_feed(&state, FeedQuery { filter_location_id: Some(999_999), ..Default::default() }).await.unwrap();
    assert!(empty.items.is_empty() && empty.next_cursor.is_none());
}
