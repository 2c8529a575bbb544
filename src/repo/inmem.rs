use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};

use super::*;

/// Postgres `timestamptz` keeps microseconds; match it so cursors round-trip exactly.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[derive(Default)]
struct State {
    users: BTreeMap<Id, User>,
    locations: BTreeMap<Id, Location>,
    posts: BTreeMap<Id, Post>,
    images: BTreeMap<Id, Image>,
    categories: BTreeMap<Id, Category>,
    post_categories: BTreeSet<(Id, Id)>,
    follows: BTreeSet<(Id, Id)>,
    likes: BTreeSet<(Id, Id)>,
    saves: BTreeSet<(Id, Id)>,
    comments: BTreeMap<Id, Comment>,
    notifications: BTreeMap<Id, Notification>,
    next_id: Id,
}

impl State {
    fn next_id(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }

    fn edges(&self, kind: EdgeKind) -> &BTreeSet<(Id, Id)> {
        match kind {
            EdgeKind::Follow => &self.follows,
            EdgeKind::Like => &self.likes,
            EdgeKind::Save => &self.saves,
        }
    }

    fn edges_mut(&mut self, kind: EdgeKind) -> &mut BTreeSet<(Id, Id)> {
        match kind {
            EdgeKind::Follow => &mut self.follows,
            EdgeKind::Like => &mut self.likes,
            EdgeKind::Save => &mut self.saves,
        }
    }

    fn count_target(set: &BTreeSet<(Id, Id)>, target: Id) -> i64 {
        set.iter().filter(|(_, t)| *t == target).count() as i64
    }

    fn detail(&self, post: &Post) -> RepoResult<PostDetail> {
        let owner = self
            .users
            .get(&post.user_id)
            .ok_or_else(|| RepoError::Internal(format!("post {} has no owner row", post.id)))?;
        let location = self
            .locations
            .get(&post.location_id)
            .cloned()
            .ok_or_else(|| RepoError::Internal(format!("post {} has no location row", post.id)))?;
        let mut images: Vec<Image> = self.images.values().filter(|i| i.post_id == post.id).cloned().collect();
        images.sort_by_key(|i| i.order);
        let mut categories: Vec<Category> = self
            .post_categories
            .iter()
            .filter(|(p, _)| *p == post.id)
            .filter_map(|(_, c)| self.categories.get(c).cloned())
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        let counts = PostCounts {
            likes_count: Self::count_target(&self.likes, post.id),
            comments_count: self.comments.values().filter(|c| c.post_id == post.id).count() as i64,
            saves_count: Self::count_target(&self.saves, post.id),
        };
        Ok(PostDetail { post: post.clone(), user: UserSummary::from(owner), location, images, categories, counts })
    }

    fn ensure_categories(&self, ids: &[Id]) -> RepoResult<()> {
        if ids.iter().all(|id| self.categories.contains_key(id)) {
            Ok(())
        } else {
            Err(RepoError::Invalid("One or more categories not found".into()))
        }
    }

    fn ensure_location(&self, id: Id) -> RepoResult<()> {
        if self.locations.contains_key(&id) {
            Ok(())
        } else {
            Err(RepoError::Invalid("Location not found".into()))
        }
    }

    fn remove_post(&mut self, id: Id) {
        self.posts.remove(&id);
        self.images.retain(|_, i| i.post_id != id);
        self.post_categories.retain(|(p, _)| *p != id);
        self.likes.retain(|(_, p)| *p != id);
        self.saves.retain(|(_, p)| *p != id);
        self.comments.retain(|_, c| c.post_id != id);
        self.notifications.retain(|_, n| n.related_post_id != Some(id));
    }

    fn summaries(&self, ids: impl Iterator<Item = Id>) -> Vec<UserSummary> {
        ids.filter_map(|id| self.users.get(&id)).map(UserSummary::from).collect()
    }
}

/// Lock-guarded in-process store honouring the same constraints as the SQL schema.
#[derive(Clone, Default)]
pub struct InMemRepo {
    state: Arc<RwLock<State>>,
}

impl InMemRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| RepoError::Internal("state lock poisoned".into()))
    }

    fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| RepoError::Internal("state lock poisoned".into()))
    }
}

#[async_trait]
impl UserRepo for InMemRepo {
    async fn get_user(&self, id: Id) -> RepoResult<User> {
        self.read()?.users.get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let s = self.read()?;
        Ok(s.users.values().find(|u| u.username.as_deref() == Some(username)).cloned())
    }

    async fn upsert_oauth_user(&self, new: NewOAuthUser) -> RepoResult<User> {
        let mut s = self.write()?;
        if let Some(existing) = s.users.values().find(|u| u.email == new.email) {
            return Ok(existing.clone());
        }
        let id = s.next_id();
        let user = User {
            id,
            email: new.email,
            username: None,
            name: new.name,
            image: new.image,
            cover_image: None,
            bio: None,
            role: Role::User,
            created_at: now(),
        };
        s.users.insert(id, user.clone());
        Ok(user)
    }

    async fn user_profile(&self, id: Id) -> RepoResult<UserProfile> {
        let s = self.read()?;
        let user = s.users.get(&id).cloned().ok_or(RepoError::NotFound)?;
        Ok(UserProfile {
            posts_count: s.posts.values().filter(|p| p.user_id == id).count() as i64,
            followers_count: State::count_target(&s.follows, id),
            following_count: s.follows.iter().filter(|(f, _)| *f == id).count() as i64,
            user,
        })
    }

    async fn update_profile(&self, id: Id, upd: UpdateProfile) -> RepoResult<User> {
        let mut s = self.write()?;

        // uniqueness check before the mutable borrow
        if let Some(ref username) = upd.username {
            if s.users.values().any(|u| u.id != id && u.username.as_deref() == Some(username.as_str())) {
                return Err(RepoError::Conflict("Username is already taken".into()));
            }
        }

        let user = s.users.get_mut(&id).ok_or(RepoError::NotFound)?;
        if let Some(v) = upd.username { user.username = Some(v); }
        if let Some(v) = upd.name { user.name = Some(v); }
        if let Some(v) = upd.bio { user.bio = Some(v); }
        if let Some(v) = upd.image { user.image = Some(v); }
        if let Some(v) = upd.cover_image { user.cover_image = Some(v); }
        Ok(user.clone())
    }

    async fn set_role(&self, id: Id, role: Role) -> RepoResult<User> {
        let mut s = self.write()?;
        let user = s.users.get_mut(&id).ok_or(RepoError::NotFound)?;
        user.role = role;
        Ok(user.clone())
    }

    async fn delete_user(&self, id: Id) -> RepoResult<()> {
        let mut s = self.write()?;
        if s.users.remove(&id).is_none() {
            return Err(RepoError::NotFound);
        }
        let owned: Vec<Id> = s.posts.values().filter(|p| p.user_id == id).map(|p| p.id).collect();
        for post_id in owned {
            s.remove_post(post_id);
        }
        s.follows.retain(|(a, b)| *a != id && *b != id);
        s.likes.retain(|(u, _)| *u != id);
        s.saves.retain(|(u, _)| *u != id);
        let authored: HashSet<Id> = s.comments.values().filter(|c| c.user_id == id).map(|c| c.id).collect();
        s.comments.retain(|_, c| {
            c.user_id != id && !c.parent_comment_id.is_some_and(|p| authored.contains(&p))
        });
        s.notifications.retain(|_, n| n.user_id != id && n.related_user_id != Some(id));
        Ok(())
    }

    async fn list_followers(&self, id: Id) -> RepoResult<Vec<UserSummary>> {
        let s = self.read()?;
        if !s.users.contains_key(&id) {
            return Err(RepoError::NotFound);
        }
        Ok(s.summaries(s.follows.iter().filter(|(_, b)| *b == id).map(|(a, _)| *a)))
    }

    async fn list_following(&self, id: Id) -> RepoResult<Vec<UserSummary>> {
        let s = self.read()?;
        if !s.users.contains_key(&id) {
            return Err(RepoError::NotFound);
        }
        Ok(s.summaries(s.follows.iter().filter(|(a, _)| *a == id).map(|(_, b)| *b)))
    }
}

fn contains_ci(field: Option<&str>, needle: &str) -> bool {
    field.is_some_and(|f| f.to_lowercase().contains(needle))
}

#[async_trait]
impl LocationRepo for InMemRepo {
    async fn get_location(&self, id: Id) -> RepoResult<Location> {
        self.read()?.locations.get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn search_locations(&self, query: &str, limit: i64) -> RepoResult<Vec<Location>> {
        let s = self.read()?;
        let needle = query.to_lowercase();
        let mut found: Vec<Location> = s
            .locations
            .values()
            .filter(|l| contains_ci(Some(l.name.as_str()), &needle) || contains_ci(l.address.as_deref(), &needle))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        found.truncate(limit.max(0) as usize);
        Ok(found)
    }

    async fn find_or_create_location(&self, new: NewLocation) -> RepoResult<(Location, bool)> {
        let mut s = self.write()?;
        let by_place = new
            .place_id
            .as_deref()
            .and_then(|place| s.locations.values().find(|l| l.place_id.as_deref() == Some(place)));
        let existing = by_place
            .or_else(|| s.locations.values().find(|l| l.latitude == new.latitude && l.longitude == new.longitude));
        if let Some(found) = existing {
            return Ok((found.clone(), false));
        }
        let id = s.next_id();
        let location = Location {
            id,
            name: new.name.unwrap_or_default(),
            address: new.address,
            latitude: new.latitude,
            longitude: new.longitude,
            place_id: new.place_id,
            country: new.country,
            region: new.region,
            created_at: now(),
        };
        s.locations.insert(id, location.clone());
        Ok((location, true))
    }
}

#[async_trait]
impl PostRepo for InMemRepo {
    async fn create_post(&self, owner: Id, new: NewPost) -> RepoResult<Post> {
        let mut s = self.write()?;
        if !s.users.contains_key(&owner) {
            return Err(RepoError::NotFound);
        }
        s.ensure_location(new.location_id)?;
        s.ensure_categories(&new.category_ids)?;
        let id = s.next_id();
        let post = Post {
            id,
            user_id: owner,
            title: new.title,
            description: new.description,
            location_id: new.location_id,
            is_public: new.is_public,
            created_at: now(),
        };
        s.posts.insert(id, post.clone());
        for (order, url) in new.image_urls.into_iter().enumerate() {
            let img_id = s.next_id();
            s.images.insert(img_id, Image { id: img_id, post_id: id, image_url: url, width: None, height: None, order: order as i32 });
        }
        for cat in new.category_ids {
            s.post_categories.insert((id, cat));
        }
        Ok(post)
    }

    async fn get_post(&self, id: Id) -> RepoResult<Post> {
        self.read()?.posts.get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn get_post_detail(&self, id: Id) -> RepoResult<PostDetail> {
        let s = self.read()?;
        let post = s.posts.get(&id).ok_or(RepoError::NotFound)?;
        s.detail(post)
    }

    async fn update_post(&self, id: Id, upd: UpdatePost) -> RepoResult<Post> {
        let mut s = self.write()?;
        if !s.posts.contains_key(&id) {
            return Err(RepoError::NotFound);
        }
        if let Some(loc) = upd.location_id {
            s.ensure_location(loc)?;
        }
        if let Some(ref cats) = upd.category_ids {
            s.ensure_categories(cats)?;
            s.post_categories.retain(|(p, _)| *p != id);
            for cat in cats {
                s.post_categories.insert((id, *cat));
            }
        }
        let post = s.posts.get_mut(&id).ok_or(RepoError::NotFound)?;
        if let Some(v) = upd.title { post.title = Some(v); }
        if let Some(v) = upd.description { post.description = Some(v); }
        if let Some(v) = upd.location_id { post.location_id = v; }
        if let Some(v) = upd.is_public { post.is_public = v; }
        Ok(post.clone())
    }

    async fn delete_post(&self, id: Id) -> RepoResult<()> {
        let mut s = self.write()?;
        if !s.posts.contains_key(&id) {
            return Err(RepoError::NotFound);
        }
        s.remove_post(id);
        Ok(())
    }

    async fn feed_page(&self, filter: &FeedFilter, after: Option<Cursor>, take: i64) -> RepoResult<Vec<PostDetail>> {
        let s = self.read()?;
        let mut eligible: Vec<&Post> = s
            .posts
            .values()
            .filter(|p| p.is_public)
            .filter(|p| filter.user_id.map_or(true, |u| p.user_id == u))
            .filter(|p| filter.location_id.map_or(true, |l| p.location_id == l))
            .filter(|p| after.map_or(true, |c| c.precedes(p.created_at, p.id)))
            .collect();
        eligible.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        let page = eligible
            .into_iter()
            .take(take.max(0) as usize)
            .map(|p| s.detail(p))
            .collect::<RepoResult<Vec<_>>>()?;
        Ok(page)
    }
}

#[async_trait]
impl EdgeRepo for InMemRepo {
    async fn insert_edge(&self, kind: EdgeKind, actor: Id, target: Id) -> RepoResult<bool> {
        let mut s = self.write()?;
        if !s.users.contains_key(&actor) {
            return Err(RepoError::NotFound);
        }
        let target_exists = match kind {
            EdgeKind::Follow => s.users.contains_key(&target),
            EdgeKind::Like | EdgeKind::Save => s.posts.contains_key(&target),
        };
        if !target_exists {
            return Err(RepoError::NotFound);
        }
        Ok(s.edges_mut(kind).insert((actor, target)))
    }

    async fn delete_edge(&self, kind: EdgeKind, actor: Id, target: Id) -> RepoResult<bool> {
        Ok(self.write()?.edges_mut(kind).remove(&(actor, target)))
    }

    async fn edge_exists(&self, kind: EdgeKind, actor: Id, target: Id) -> RepoResult<bool> {
        Ok(self.read()?.edges(kind).contains(&(actor, target)))
    }

    async fn edges_among(&self, kind: EdgeKind, actor: Id, targets: &[Id]) -> RepoResult<HashSet<Id>> {
        let s = self.read()?;
        let set = s.edges(kind);
        Ok(targets.iter().copied().filter(|t| set.contains(&(actor, *t))).collect())
    }
}

#[async_trait]
impl CommentRepo for InMemRepo {
    async fn create_comment(&self, post_id: Id, user_id: Id, content: String, parent_comment_id: Option<Id>) -> RepoResult<Comment> {
        let mut s = self.write()?;
        if !s.posts.contains_key(&post_id) || !s.users.contains_key(&user_id) {
            return Err(RepoError::NotFound);
        }
        if let Some(parent) = parent_comment_id {
            if !s.comments.contains_key(&parent) {
                return Err(RepoError::NotFound);
            }
        }
        let id = s.next_id();
        let comment = Comment { id, post_id, user_id, content, parent_comment_id, created_at: now() };
        s.comments.insert(id, comment.clone());
        Ok(comment)
    }

    async fn get_comment(&self, id: Id) -> RepoResult<Comment> {
        self.read()?.comments.get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn list_comments(&self, post_id: Id) -> RepoResult<Vec<Comment>> {
        let s = self.read()?;
        let mut v: Vec<Comment> = s.comments.values().filter(|c| c.post_id == post_id).cloned().collect();
        v.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(v)
    }
}

#[async_trait]
impl CategoryRepo for InMemRepo {
    async fn list_categories(&self) -> RepoResult<Vec<CategoryWithCount>> {
        let s = self.read()?;
        let mut v: Vec<CategoryWithCount> = s
            .categories
            .values()
            .map(|c| CategoryWithCount {
                category: c.clone(),
                posts_count: s.post_categories.iter().filter(|(_, cat)| *cat == c.id).count() as i64,
            })
            .collect();
        v.sort_by(|a, b| a.category.name.cmp(&b.category.name));
        Ok(v)
    }

    async fn get_category(&self, id: Id) -> RepoResult<CategoryWithCount> {
        let s = self.read()?;
        let category = s.categories.get(&id).cloned().ok_or(RepoError::NotFound)?;
        let posts_count = s.post_categories.iter().filter(|(_, cat)| *cat == id).count() as i64;
        Ok(CategoryWithCount { category, posts_count })
    }

    async fn create_category(&self, input: CategoryInput) -> RepoResult<Category> {
        let mut s = self.write()?;
        if s.categories.values().any(|c| c.name == input.name) {
            return Err(RepoError::Conflict("Category with this name already exists".into()));
        }
        let id = s.next_id();
        let category = Category { id, name: input.name, description: input.description, icon: input.icon, color: input.color };
        s.categories.insert(id, category.clone());
        Ok(category)
    }

    async fn update_category(&self, id: Id, input: CategoryInput) -> RepoResult<Category> {
        let mut s = self.write()?;
        if !s.categories.contains_key(&id) {
            return Err(RepoError::NotFound);
        }
        if s.categories.values().any(|c| c.id != id && c.name == input.name) {
            return Err(RepoError::Conflict("Category with this name already exists".into()));
        }
        let category = Category { id, name: input.name, description: input.description, icon: input.icon, color: input.color };
        s.categories.insert(id, category.clone());
        Ok(category)
    }

    async fn delete_category(&self, id: Id) -> RepoResult<()> {
        let mut s = self.write()?;
        if !s.categories.contains_key(&id) {
            return Err(RepoError::NotFound);
        }
        if s.post_categories.iter().any(|(_, cat)| *cat == id) {
            return Err(RepoError::Conflict("Cannot delete category that is used by posts".into()));
        }
        s.categories.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl NotificationRepo for InMemRepo {
    async fn create_notification(&self, new: NewNotification) -> RepoResult<Notification> {
        let mut s = self.write()?;
        if !s.users.contains_key(&new.user_id) {
            return Err(RepoError::NotFound);
        }
        let id = s.next_id();
        let n = Notification {
            id,
            user_id: new.user_id,
            kind: new.kind,
            related_user_id: new.related_user_id,
            related_post_id: new.related_post_id,
            read: false,
            created_at: now(),
        };
        s.notifications.insert(id, n.clone());
        Ok(n)
    }

    async fn get_notification(&self, id: Id) -> RepoResult<Notification> {
        self.read()?.notifications.get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn list_notifications(&self, user_id: Id, unread_only: bool, after: Option<Cursor>, take: i64) -> RepoResult<Vec<Notification>> {
        let s = self.read()?;
        let mut v: Vec<Notification> = s
            .notifications
            .values()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.read))
            .filter(|n| after.map_or(true, |c| c.precedes(n.created_at, n.id)))
            .cloned()
            .collect();
        v.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        v.truncate(take.max(0) as usize);
        Ok(v)
    }

    async fn mark_read(&self, id: Id) -> RepoResult<Notification> {
        let mut s = self.write()?;
        let n = s.notifications.get_mut(&id).ok_or(RepoError::NotFound)?;
        n.read = true;
        Ok(n.clone())
    }

    async fn mark_all_read(&self, user_id: Id) -> RepoResult<u64> {
        let mut s = self.write()?;
        let mut count = 0;
        for n in s.notifications.values_mut().filter(|n| n.user_id == user_id && !n.read) {
            n.read = true;
            count += 1;
        }
        Ok(count)
    }

    async fn unread_count(&self, user_id: Id) -> RepoResult<i64> {
        let s = self.read()?;
        Ok(s.notifications.values().filter(|n| n.user_id == user_id && !n.read).count() as i64)
    }
}

#[async_trait]
impl LeaderboardRepo for InMemRepo {
    async fn top_posters(&self, limit: i64, offset: i64) -> RepoResult<Vec<PosterRow>> {
        let s = self.read()?;
        let mut counts: BTreeMap<Id, i64> = BTreeMap::new();
        for p in s.posts.values() {
            *counts.entry(p.user_id).or_default() += 1;
        }
        let mut rows: Vec<PosterRow> = counts
            .into_iter()
            .filter_map(|(uid, post_count)| {
                s.users.get(&uid).map(|u| PosterRow {
                    user_id: u.id,
                    username: u.username.clone(),
                    name: u.name.clone(),
                    image: u.image.clone(),
                    created_at: u.created_at,
                    post_count,
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            b.post_count
                .cmp(&a.post_count)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.user_id.cmp(&b.user_id))
        });
        Ok(rows.into_iter().skip(offset.max(0) as usize).take(limit.max(0) as usize).collect())
    }
}
