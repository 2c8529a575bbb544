#![cfg(feature = "inmem-store")]

mod common;

use std::sync::Arc;
use std::time::Duration;

use pinmap::auth::{Caller, Role};
use pinmap::error::ApiError;
use pinmap::models::{NewComment, NotificationType};
use pinmap::notify::{self, ListOptions, NotificationOutbox, QueuedOutbox};
use pinmap::repo::inmem::InMemRepo;
use pinmap::repo::{NotificationRepo, Repo};
use pinmap::{comments, social};

fn caller(id: i64) -> Caller {
    Caller { id, role: Role::User }
}

#[tokio::test]
async fn mark_read_checks_existence_then_ownership() {
    let (state, repo) = common::state();
    let a = common::user(&repo, "alice").await;
    let b = common::user(&repo, "bob").await;
    social::toggle_follow(&state, a.id, b.id).await.unwrap();
    let n = repo.list_notifications(b.id, false, None, 10).await.unwrap().remove(0);

    assert!(matches!(notify::mark_read(&repo, 777_777, &caller(b.id)).await, Err(ApiError::NotFound)));
    assert!(matches!(notify::mark_read(&repo, n.id, &caller(a.id)).await, Err(ApiError::Forbidden)));

    let read = notify::mark_read(&repo, n.id, &caller(b.id)).await.unwrap();
    assert!(read.read);
    // already read stays read
    assert!(notify::mark_read(&repo, n.id, &caller(b.id)).await.unwrap().read);
    assert_eq!(notify::unread_count(&repo, b.id).await.unwrap(), 0);
}

#[tokio::test]
async fn mark_all_read_reports_affected_rows() {
    let (state, repo) = common::state();
    let b = common::user(&repo, "bob").await;
    for name in ["u1", "u2", "u3"] {
        let u = common::user(&repo, name).await;
        social::toggle_follow(&state, u.id, b.id).await.unwrap();
    }
    assert_eq!(notify::mark_all_read(&repo, b.id).await.unwrap(), 3);
    assert_eq!(notify::mark_all_read(&repo, b.id).await.unwrap(), 0);
    assert_eq!(notify::unread_count(&repo, b.id).await.unwrap(), 0);
}

#[tokio::test]
async fn listing_pages_newest_first_without_gaps() {
    let (state, repo) = common::state();
    let b = common::user(&repo, "bob").await;
    let mut followers = Vec::new();
    for i in 0..7 {
        let u = common::user(&repo, &format!("fan{i}")).await;
        social::toggle_follow(&state, u.id, b.id).await.unwrap();
        followers.push(u.id);
    }

    let mut seen = Vec::new();
    let mut cursor = None;
    loop {
        let page = notify::list_notifications(&repo, b.id, ListOptions { unread_only: false, limit: Some(3), cursor: cursor.take() })
            .await
            .unwrap();
        assert!(page.notifications.len() <= 3);
        seen.extend(page.notifications.iter().map(|n| n.related_user_id.unwrap()));
        match page.next_cursor {
            Some(c) => cursor = Some(c),
            None => break,
        }
    }
    followers.reverse();
    assert_eq!(seen, followers);
}

#[tokio::test]
async fn unread_only_filter_and_bad_cursor() {
    let (state, repo) = common::state();
    let a = common::user(&repo, "alice").await;
    let b = common::user(&repo, "bob").await;
    let c = common::user(&repo, "carol").await;
    social::toggle_follow(&state, a.id, b.id).await.unwrap();
    social::toggle_follow(&state, c.id, b.id).await.unwrap();
    let first = repo.list_notifications(b.id, false, None, 10).await.unwrap().pop().unwrap();
    notify::mark_read(&repo, first.id, &caller(b.id)).await.unwrap();

    let unread = notify::list_notifications(&repo, b.id, ListOptions { unread_only: true, ..Default::default() }).await.unwrap();
    assert_eq!(unread.notifications.len(), 1);
    assert!(unread.next_cursor.is_none());

    let bad = ListOptions { cursor: Some("%%%".into()), ..Default::default() };
    assert!(matches!(notify::list_notifications(&repo, b.id, bad).await, Err(ApiError::Validation(_))));
}

#[tokio::test]
async fn comment_fans_out_to_owner_and_mentions_once() {
    let (state, repo) = common::state();
    let owner = common::user(&repo, "owner").await;
    let actor = common::user(&repo, "actor").await;
    let carol = common::user(&repo, "carol").await;
    let p = common::post(&repo, &owner, true).await;

    let body = "nice one @carol @owner @actor @carol @nobody";
    comments::add_comment(&state, &caller(actor.id), p.id, NewComment { content: body.into(), parent_comment_id: None })
        .await
        .unwrap();

    let owner_inbox = repo.list_notifications(owner.id, false, None, 10).await.unwrap();
    assert_eq!(owner_inbox.len(), 1);
    assert_eq!(owner_inbox[0].kind, NotificationType::Comment);

    let carol_inbox = repo.list_notifications(carol.id, false, None, 10).await.unwrap();
    assert_eq!(carol_inbox.len(), 1);
    assert_eq!(carol_inbox[0].kind, NotificationType::Mention);
    assert_eq!(carol_inbox[0].related_post_id, Some(p.id));

    assert_eq!(repo.unread_count(actor.id).await.unwrap(), 0);
}

#[tokio::test]
async fn queued_outbox_delivers_in_background() {
    let repo = InMemRepo::new();
    let a = common::user(&repo, "alice").await;
    let b = common::user(&repo, "bob").await;
    let shared: Arc<dyn Repo> = Arc::new(repo.clone());
    let (outbox, worker) = QueuedOutbox::spawn(shared);

    notify::notify(&outbox, b.id, NotificationType::Follow, a.id, None).await;
    notify::notify(&outbox, a.id, NotificationType::Follow, a.id, None).await;
    drop(outbox);
    tokio::time::timeout(Duration::from_secs(5), worker).await.unwrap().unwrap();

    assert_eq!(repo.unread_count(b.id).await.unwrap(), 1);
    assert_eq!(repo.unread_count(a.id).await.unwrap(), 0);
}

#[tokio::test]
async fn delivery_failure_does_not_reach_the_emitter() {
    let repo = InMemRepo::new();
    let a = common::user(&repo, "alice").await;
    let outbox: Arc<dyn NotificationOutbox> = Arc::new(notify::InlineOutbox::new(Arc::new(repo.clone())));
    // recipient does not exist; delivery fails and is only logged
    notify::notify(outbox.as_ref(), 424_242, NotificationType::Like, a.id, None).await;
    assert_eq!(repo.unread_count(a.id).await.unwrap(), 0);
}
