#![cfg(feature = "inmem-store")]

mod common;

use pinmap::leaderboard::get_top_users;

#[tokio::test]
async fn zero_post_users_never_rank() {
    let (_state, repo) = common::state();
    let a = common::user(&repo, "alice").await;
    let _lurker = common::user(&repo, "lurker").await;
    common::post(&repo, &a, true).await;

    for (limit, offset) in [(None, None), (Some(1), Some(0)), (Some(100), Some(1)), (Some(5), Some(-3))] {
        let page = get_top_users(&repo, limit, offset).await.unwrap();
        assert!(page.data.iter().all(|e| e.username.as_deref() != Some("lurker")));
    }
}

#[tokio::test]
async fn ranks_are_continuous_across_offsets_and_ties_favor_older_accounts() {
    let (_state, repo) = common::state();
    let old = common::user(&repo, "old").await;
    let young = common::user(&repo, "young").await;
    let top = common::user(&repo, "top").await;
    for _ in 0..3 {
        common::post(&repo, &top, true).await;
    }
    for u in [&young, &old] {
        common::post(&repo, u, true).await;
        common::post(&repo, u, false).await;
    }

    let all = get_top_users(&repo, None, None).await.unwrap();
    let order: Vec<_> = all.data.iter().map(|e| (e.rank, e.user_id, e.post_count)).collect();
    assert_eq!(order, vec![(1, top.id, 3), (2, old.id, 2), (3, young.id, 2)]);
    assert_eq!((all.total, all.limit, all.offset), (3, 100, 0));

    let second = get_top_users(&repo, Some(1), Some(1)).await.unwrap();
    assert_eq!(second.data.len(), 1);
    assert_eq!(second.data[0].rank, 2);
    assert_eq!(second.data[0].user_id, old.id);

    let clamped = get_top_users(&repo, Some(1000), Some(-5)).await.unwrap();
    assert_eq!((clamped.limit, clamped.offset), (100, 0));
}
