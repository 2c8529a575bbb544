#![cfg(feature = "inmem-store")]

mod common;

use pinmap::auth::{Caller, Role};
use pinmap::error::ApiError;
use pinmap::models::{NewComment, UpdatePost, UpdateProfile};
use pinmap::{comments, posts, social, users};

fn caller(id: i64, role: Role) -> Caller {
    Caller { id, role }
}

fn comment(text: &str, parent: Option<i64>) -> NewComment {
    NewComment { content: text.to_string(), parent_comment_id: parent }
}

#[tokio::test]
async fn create_post_validates_and_orders_images() {
    let (state, repo) = common::state();
    let a = common::user(&repo, "alice").await;
    let me = caller(a.id, a.role);

    let tree = common::location(&repo, "Joshua Tree").await;
    let mut new = common::new_post(tree.id, true);
    new.image_urls = vec!["one".into(), "two".into(), "three".into()];
    let detail = posts::create_post(&state, &me, new).await.unwrap();
    assert_eq!(detail.post.location_id, tree.id);
    assert_eq!(detail.location, tree);
    let orders: Vec<_> = detail.images.iter().map(|i| (i.order, i.image_url.as_str())).collect();
    assert_eq!(orders, vec![(0, "one"), (1, "two"), (2, "three")]);

    let unknown_loc = common::new_post(999_999, true);
    assert!(matches!(posts::create_post(&state, &me, unknown_loc).await, Err(ApiError::Validation(_))));

    let mut no_images = common::new_post(tree.id, true);
    no_images.image_urls.clear();
    assert!(matches!(posts::create_post(&state, &me, no_images).await, Err(ApiError::Validation(_))));

    let mut bad_cat = common::new_post(tree.id, true);
    bad_cat.category_ids = vec![31337];
    assert!(matches!(posts::create_post(&state, &me, bad_cat).await, Err(ApiError::Validation(_))));
}

#[tokio::test]
async fn owner_updates_owner_or_moderator_deletes() {
    let (state, repo) = common::state();
    let a = common::user(&repo, "alice").await;
    let b = common::user(&repo, "bob").await;
    let m = common::user_with_role(&repo, "mod", Role::Moderator).await;
    let p = common::post(&repo, &a, true).await;
    let q = common::post(&repo, &a, true).await;

    let upd = UpdatePost { title: Some("golden hour".into()), ..Default::default() };
    assert!(matches!(posts::update_post(&state, &caller(b.id, b.role), p.id, upd.clone()).await, Err(ApiError::Forbidden)));
    let updated = posts::update_post(&state, &caller(a.id, a.role), p.id, upd).await.unwrap();
    assert_eq!(updated.post.title.as_deref(), Some("golden hour"));

    assert!(matches!(posts::delete_post(&state, &caller(b.id, b.role), p.id).await, Err(ApiError::Forbidden)));
    posts::delete_post(&state, &caller(m.id, m.role), p.id).await.unwrap();
    posts::delete_post(&state, &caller(a.id, a.role), q.id).await.unwrap();
    assert!(matches!(posts::get_post(&state, None, p.id).await, Err(ApiError::NotFound)));
}

#[tokio::test]
async fn get_post_hides_private_posts_from_strangers_and_refreshes_counts() {
    let (state, repo) = common::state();
    let a = common::user(&repo, "alice").await;
    let b = common::user(&repo, "bob").await;
    let private = common::post(&repo, &a, false).await;
    let public = common::post(&repo, &a, true).await;

    assert!(matches!(posts::get_post(&state, None, private.id).await, Err(ApiError::NotFound)));
    assert!(matches!(posts::get_post(&state, Some(&caller(b.id, b.role)), private.id).await, Err(ApiError::NotFound)));
    assert!(posts::get_post(&state, Some(&caller(a.id, a.role)), private.id).await.is_ok());

    let anon = posts::get_post(&state, None, public.id).await.unwrap();
    assert_eq!(anon.detail.counts.likes_count, 0);
    assert!(anon.is_liked.is_none());

    social::toggle_like(&state, b.id, public.id).await.unwrap();
    let viewed = posts::get_post(&state, Some(&caller(b.id, b.role)), public.id).await.unwrap();
    assert_eq!(viewed.detail.counts.likes_count, 1);
    assert_eq!(viewed.is_liked, Some(true));
    assert_eq!(viewed.is_saved, Some(false));
}

#[tokio::test]
async fn replies_are_one_level_deep_and_same_post() {
    let (state, repo) = common::state();
    let a = common::user(&repo, "alice").await;
    let me = caller(a.id, a.role);
    let p = common::post(&repo, &a, true).await;
    let other = common::post(&repo, &a, true).await;

    let top = comments::add_comment(&state, &me, p.id, comment("  first  ", None)).await.unwrap();
    assert_eq!(top.content, "first");
    let reply = comments::add_comment(&state, &me, p.id, comment("reply", Some(top.id))).await.unwrap();

    let nested = comments::add_comment(&state, &me, p.id, comment("deeper", Some(reply.id))).await;
    assert!(matches!(nested, Err(ApiError::Validation(_))));
    let cross = comments::add_comment(&state, &me, other.id, comment("elsewhere", Some(top.id))).await;
    assert!(matches!(cross, Err(ApiError::Validation(_))));
    let missing = comments::add_comment(&state, &me, p.id, comment("ghost", Some(999_999))).await;
    assert!(matches!(missing, Err(ApiError::Validation(_))));

    assert!(matches!(comments::add_comment(&state, &me, p.id, comment("   ", None)).await, Err(ApiError::Validation(_))));
    let long = "x".repeat(comments::MAX_COMMENT_LEN + 1);
    assert!(matches!(comments::add_comment(&state, &me, p.id, comment(&long, None)).await, Err(ApiError::Validation(_))));
    assert!(matches!(comments::add_comment(&state, &me, 999_999, comment("hi", None)).await, Err(ApiError::NotFound)));
}

#[tokio::test]
async fn comment_threads_newest_first_replies_oldest_first() {
    let (state, repo) = common::state();
    let a = common::user(&repo, "alice").await;
    let me = caller(a.id, a.role);
    let p = common::post(&repo, &a, true).await;

    let t1 = comments::add_comment(&state, &me, p.id, comment("t1", None)).await.unwrap();
    let t2 = comments::add_comment(&state, &me, p.id, comment("t2", None)).await.unwrap();
    let r1 = comments::add_comment(&state, &me, p.id, comment("r1", Some(t1.id))).await.unwrap();
    let r2 = comments::add_comment(&state, &me, p.id, comment("r2", Some(t1.id))).await.unwrap();

    let threads = comments::list_comments(&state, p.id).await.unwrap();
    let shape: Vec<_> = threads
        .iter()
        .map(|t| (t.comment.id, t.replies.iter().map(|r| r.id).collect::<Vec<_>>()))
        .collect();
    assert_eq!(shape, vec![(t2.id, vec![]), (t1.id, vec![r1.id, r2.id])]);

    let detail = posts::get_post(&state, None, p.id).await.unwrap();
    assert_eq!(detail.detail.counts.comments_count, 4);
}

#[tokio::test]
async fn profiles_counts_ownership_and_roles() {
    let (state, repo) = common::state();
    let a = common::user(&repo, "alice").await;
    let b = common::user(&repo, "bob").await;
    common::post(&repo, &a, true).await;
    social::toggle_follow(&state, b.id, a.id).await.unwrap();

    let profile = users::get_user(&state, a.id).await.unwrap();
    assert_eq!((profile.posts_count, profile.followers_count, profile.following_count), (1, 1, 0));
    assert_eq!(users::list_followers(&state, a.id).await.unwrap()[0].id, b.id);
    assert_eq!(users::list_following(&state, b.id).await.unwrap()[0].id, a.id);

    // unfollow invalidates the cached lists
    social::toggle_follow(&state, b.id, a.id).await.unwrap();
    assert!(users::list_followers(&state, a.id).await.unwrap().is_empty());
    assert_eq!(users::get_user(&state, a.id).await.unwrap().followers_count, 0);

    let rename = UpdateProfile { username: Some("bob".into()), ..Default::default() };
    assert!(matches!(users::update_profile(&state, &caller(b.id, b.role), a.id, rename.clone()).await, Err(ApiError::Forbidden)));
    assert!(matches!(users::update_profile(&state, &caller(a.id, a.role), a.id, rename).await, Err(ApiError::Conflict(_))));
    let bio = UpdateProfile { bio: Some("landscapes".into()), ..Default::default() };
    users::update_profile(&state, &caller(a.id, a.role), a.id, bio).await.unwrap();
    assert_eq!(users::get_user(&state, a.id).await.unwrap().user.bio.as_deref(), Some("landscapes"));

    assert!(matches!(users::set_role(&state, a.id, "SUPERUSER").await, Err(ApiError::Validation(_))));
    assert_eq!(users::set_role(&state, a.id, "MODERATOR").await.unwrap().role, Role::Moderator);

    users::delete_user(&state, a.id).await.unwrap();
    assert!(matches!(users::get_user(&state, a.id).await, Err(ApiError::NotFound)));
}

#[tokio::test]
async fn deleted_owner_takes_cached_posts_and_follow_lists_along() {
    let (state, repo) = common::state();
    let a = common::user(&repo, "alice").await;
    let b = common::user(&repo, "bob").await;
    let p = common::post(&repo, &a, true).await;
    social::toggle_follow(&state, a.id, b.id).await.unwrap();

    assert!(posts::get_post(&state, None, p.id).await.is_ok());
    assert_eq!(users::list_followers(&state, b.id).await.unwrap().len(), 1);
    assert_eq!(users::get_user(&state, b.id).await.unwrap().followers_count, 1);

    users::delete_user(&state, a.id).await.unwrap();

    assert!(matches!(posts::get_post(&state, None, p.id).await, Err(ApiError::NotFound)));
    assert!(users::list_followers(&state, b.id).await.unwrap().is_empty());
    assert_eq!(users::get_user(&state, b.id).await.unwrap().followers_count, 0);
}
