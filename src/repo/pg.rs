use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::*;

const USER_COLS: &str = "id, email, username, name, image, cover_image, bio, role, created_at";
const POST_COLS: &str = "id, user_id, title, description, location_id, is_public, created_at";
const LOCATION_COLS: &str = "id, name, address, latitude, longitude, place_id, country, region, created_at";
const NOTIFICATION_COLS: &str = r#"id, user_id, "type", related_user_id, related_post_id, read, created_at"#;

/// Map a driver error onto the repository taxonomy. Unique violations become
/// `Conflict(conflict_msg)`, foreign-key violations mean a referenced row is missing.
fn classify(e: sqlx::Error, conflict_msg: &str) -> RepoError {
    if let sqlx::Error::RowNotFound = e {
        return RepoError::NotFound;
    }
    if let Some(db) = e.as_database_error() {
        match db.code().as_deref() {
            Some("23505") => return RepoError::Conflict(conflict_msg.to_string()),
            Some("23503") => return RepoError::NotFound,
            Some("23514") => return RepoError::Invalid(db.message().to_string()),
            _ => {}
        }
    }
    RepoError::Internal(e.to_string())
}

fn internal(e: sqlx::Error) -> RepoError {
    classify(e, "duplicate key")
}

fn edge_table(kind: EdgeKind) -> (&'static str, &'static str, &'static str) {
    match kind {
        EdgeKind::Follow => ("follows", "follower_id", "following_id"),
        EdgeKind::Like => ("likes", "user_id", "post_id"),
        EdgeKind::Save => ("saves", "user_id", "post_id"),
    }
}

#[derive(sqlx::FromRow)]
struct PostCategoryRow {
    post_id: Id,
    #[sqlx(flatten)]
    category: Category,
}

#[derive(sqlx::FromRow)]
struct CountsRow {
    post_id: Id,
    #[sqlx(flatten)]
    counts: PostCounts,
}

#[derive(sqlx::FromRow)]
struct CategoryCountRow {
    #[sqlx(flatten)]
    category: Category,
    posts_count: i64,
}

#[derive(Clone)]
pub struct PgRepo { pool: Pool<Postgres> }

impl PgRepo {
    pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }

    pub fn pool(&self) -> &Pool<Postgres> { &self.pool }

    /// Join owners, ordered images, categories and aggregate counts onto `posts`,
    /// preserving the input order.
    async fn details(&self, posts: Vec<Post>) -> RepoResult<Vec<PostDetail>> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }
        let post_ids: Vec<Id> = posts.iter().map(|p| p.id).collect();
        let owner_ids: Vec<Id> = posts.iter().map(|p| p.user_id).collect();
        let location_ids: Vec<Id> = posts.iter().map(|p| p.location_id).collect();

        let owners: HashMap<Id, UserSummary> = sqlx::query_as::<_, UserSummary>(
            "SELECT id, username, name, image FROM users WHERE id = ANY($1)",
        )
        .bind(&owner_ids)
        .fetch_all(&self.pool).await.map_err(internal)?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

        let locations: HashMap<Id, Location> = sqlx::query_as::<_, Location>(&format!(
            "SELECT {LOCATION_COLS} FROM locations WHERE id = ANY($1)"
        ))
        .bind(&location_ids)
        .fetch_all(&self.pool).await.map_err(internal)?
        .into_iter()
        .map(|l| (l.id, l))
        .collect();

        let mut images: HashMap<Id, Vec<Image>> = HashMap::new();
        for img in sqlx::query_as::<_, Image>(
            r#"SELECT id, post_id, image_url, width, height, "order" FROM images WHERE post_id = ANY($1) ORDER BY post_id, "order""#,
        )
        .bind(&post_ids)
        .fetch_all(&self.pool).await.map_err(internal)?
        {
            images.entry(img.post_id).or_default().push(img);
        }

        let mut categories: HashMap<Id, Vec<Category>> = HashMap::new();
        for row in sqlx::query_as::<_, PostCategoryRow>(r#"
            SELECT pc.post_id, c.id, c.name, c.description, c.icon, c.color
            FROM post_categories pc JOIN categories c ON c.id = pc.category_id
            WHERE pc.post_id = ANY($1)
            ORDER BY c.name
        "#)
        .bind(&post_ids)
        .fetch_all(&self.pool).await.map_err(internal)?
        {
            categories.entry(row.post_id).or_default().push(row.category);
        }

        let counts: HashMap<Id, PostCounts> = sqlx::query_as::<_, CountsRow>(r#"
            SELECT p.id AS post_id,
                   (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS likes_count,
                   (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comments_count,
                   (SELECT COUNT(*) FROM saves s WHERE s.post_id = p.id) AS saves_count
            FROM posts p WHERE p.id = ANY($1)
        "#)
        .bind(&post_ids)
        .fetch_all(&self.pool).await.map_err(internal)?
        .into_iter()
        .map(|r| (r.post_id, r.counts))
        .collect();

        posts
            .into_iter()
            .map(|post| {
                let user = owners
                    .get(&post.user_id)
                    .cloned()
                    .ok_or_else(|| RepoError::Internal(format!("post {} has no owner row", post.id)))?;
                let location = locations
                    .get(&post.location_id)
                    .cloned()
                    .ok_or_else(|| RepoError::Internal(format!("post {} has no location row", post.id)))?;
                Ok(PostDetail {
                    user,
                    location,
                    images: images.remove(&post.id).unwrap_or_default(),
                    categories: categories.remove(&post.id).unwrap_or_default(),
                    counts: counts.get(&post.id).copied().unwrap_or_default(),
                    post,
                })
            })
            .collect()
    }

    async fn ensure_location(&self, id: Id) -> RepoResult<()> {
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM locations WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool).await.map_err(internal)?;
        if !exists {
            return Err(RepoError::Invalid("Location not found".into()));
        }
        Ok(())
    }

    async fn ensure_categories(&self, ids: &[Id]) -> RepoResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let distinct: HashSet<Id> = ids.iter().copied().collect();
        let (found,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM categories WHERE id = ANY($1)")
            .bind(ids)
            .fetch_one(&self.pool).await.map_err(internal)?;
        if found as usize != distinct.len() {
            return Err(RepoError::Invalid("One or more categories not found".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepo for PgRepo {
    async fn get_user(&self, id: Id) -> RepoResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool).await.map_err(internal)?
            .ok_or(RepoError::NotFound)
    }

    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLS} FROM users WHERE username = $1"))
            .bind(username)
            .fetch_optional(&self.pool).await.map_err(internal)
    }

    async fn upsert_oauth_user(&self, new: NewOAuthUser) -> RepoResult<User> {
        // no-op update so RETURNING yields the existing row on conflict
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, name, image) VALUES ($1, $2, $3)
             ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
             RETURNING {USER_COLS}"
        ))
        .bind(&new.email)
        .bind(&new.name)
        .bind(&new.image)
        .fetch_one(&self.pool).await.map_err(internal)
    }

    async fn user_profile(&self, id: Id) -> RepoResult<UserProfile> {
        let user = self.get_user(id).await?;
        let (posts_count, followers_count, following_count): (i64, i64, i64) = sqlx::query_as(r#"
            SELECT (SELECT COUNT(*) FROM posts WHERE user_id = $1),
                   (SELECT COUNT(*) FROM follows WHERE following_id = $1),
                   (SELECT COUNT(*) FROM follows WHERE follower_id = $1)
        "#)
        .bind(id)
        .fetch_one(&self.pool).await.map_err(internal)?;
        Ok(UserProfile { user, posts_count, followers_count, following_count })
    }

    async fn update_profile(&self, id: Id, upd: UpdateProfile) -> RepoResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET
                username = COALESCE($2, username),
                name = COALESCE($3, name),
                bio = COALESCE($4, bio),
                image = COALESCE($5, image),
                cover_image = COALESCE($6, cover_image)
             WHERE id = $1
             RETURNING {USER_COLS}"
        ))
        .bind(id)
        .bind(&upd.username)
        .bind(&upd.name)
        .bind(&upd.bio)
        .bind(&upd.image)
        .bind(&upd.cover_image)
        .fetch_optional(&self.pool).await
        .map_err(|e| classify(e, "Username is already taken"))?
        .ok_or(RepoError::NotFound)
    }

    async fn set_role(&self, id: Id, role: Role) -> RepoResult<User> {
        sqlx::query_as::<_, User>(&format!("UPDATE users SET role = $2 WHERE id = $1 RETURNING {USER_COLS}"))
            .bind(id)
            .bind(role.as_str())
            .fetch_optional(&self.pool).await.map_err(internal)?
            .ok_or(RepoError::NotFound)
    }

    async fn delete_user(&self, id: Id) -> RepoResult<()> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool).await.map_err(internal)?;
        if res.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn list_followers(&self, id: Id) -> RepoResult<Vec<UserSummary>> {
        self.get_user(id).await?;
        sqlx::query_as::<_, UserSummary>(r#"
            SELECT u.id, u.username, u.name, u.image
            FROM follows f JOIN users u ON u.id = f.follower_id
            WHERE f.following_id = $1
            ORDER BY f.created_at DESC, f.id DESC
        "#)
        .bind(id)
        .fetch_all(&self.pool).await.map_err(internal)
    }

    async fn list_following(&self, id: Id) -> RepoResult<Vec<UserSummary>> {
        self.get_user(id).await?;
        sqlx::query_as::<_, UserSummary>(r#"
            SELECT u.id, u.username, u.name, u.image
            FROM follows f JOIN users u ON u.id = f.following_id
            WHERE f.follower_id = $1
            ORDER BY f.created_at DESC, f.id DESC
        "#)
        .bind(id)
        .fetch_all(&self.pool).await.map_err(internal)
    }
}

#[async_trait]
impl LocationRepo for PgRepo {
    async fn get_location(&self, id: Id) -> RepoResult<Location> {
        sqlx::query_as::<_, Location>(&format!("SELECT {LOCATION_COLS} FROM locations WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool).await.map_err(internal)?
            .ok_or(RepoError::NotFound)
    }

    async fn search_locations(&self, query: &str, limit: i64) -> RepoResult<Vec<Location>> {
        // escape LIKE metacharacters so the query is matched literally
        let escaped = query.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        sqlx::query_as::<_, Location>(&format!(
            "SELECT {LOCATION_COLS} FROM locations
             WHERE name ILIKE '%' || $1 || '%' OR address ILIKE '%' || $1 || '%'
             ORDER BY name ASC, id ASC
             LIMIT $2"
        ))
        .bind(escaped)
        .bind(limit)
        .fetch_all(&self.pool).await.map_err(internal)
    }

    async fn find_or_create_location(&self, new: NewLocation) -> RepoResult<(Location, bool)> {
        let existing = sqlx::query_as::<_, Location>(&format!(
            "SELECT {LOCATION_COLS} FROM locations
             WHERE ($1::TEXT IS NOT NULL AND place_id = $1) OR (latitude = $2 AND longitude = $3)
             ORDER BY (place_id IS NOT DISTINCT FROM $1) DESC, id ASC
             LIMIT 1"
        ))
        .bind(&new.place_id)
        .bind(new.latitude)
        .bind(new.longitude)
        .fetch_optional(&self.pool).await.map_err(internal)?;
        if let Some(found) = existing {
            return Ok((found, false));
        }

        let inserted = sqlx::query_as::<_, Location>(&format!(
            "INSERT INTO locations (name, address, latitude, longitude, place_id, country, region)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (place_id) DO NOTHING
             RETURNING {LOCATION_COLS}"
        ))
        .bind(new.name.as_deref().unwrap_or_default())
        .bind(&new.address)
        .bind(new.latitude)
        .bind(new.longitude)
        .bind(&new.place_id)
        .bind(&new.country)
        .bind(&new.region)
        .fetch_optional(&self.pool).await.map_err(internal)?;
        match inserted {
            Some(location) => Ok((location, true)),
            // lost a race on the same place id
            None => {
                let location = sqlx::query_as::<_, Location>(&format!("SELECT {LOCATION_COLS} FROM locations WHERE place_id = $1"))
                    .bind(&new.place_id)
                    .fetch_one(&self.pool).await.map_err(internal)?;
                Ok((location, false))
            }
        }
    }
}

#[async_trait]
impl PostRepo for PgRepo {
    async fn create_post(&self, owner: Id, new: NewPost) -> RepoResult<Post> {
        self.ensure_location(new.location_id).await?;
        self.ensure_categories(&new.category_ids).await?;
        let mut tx = self.pool.begin().await.map_err(internal)?;
        let post = sqlx::query_as::<_, Post>(&format!(
            "INSERT INTO posts (user_id, title, description, location_id, is_public)
             VALUES ($1, $2, $3, $4, $5) RETURNING {POST_COLS}"
        ))
        .bind(owner)
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.location_id)
        .bind(new.is_public)
        .fetch_one(&mut *tx).await.map_err(internal)?;
        for (order, url) in new.image_urls.iter().enumerate() {
            sqlx::query(r#"INSERT INTO images (post_id, image_url, "order") VALUES ($1, $2, $3)"#)
                .bind(post.id)
                .bind(url)
                .bind(order as i32)
                .execute(&mut *tx).await.map_err(internal)?;
        }
        for cat in &new.category_ids {
            sqlx::query("INSERT INTO post_categories (post_id, category_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                .bind(post.id)
                .bind(cat)
                .execute(&mut *tx).await
                .map_err(|e| match classify(e, "duplicate category") {
                    RepoError::NotFound => RepoError::Invalid("One or more categories not found".into()),
                    other => other,
                })?;
        }
        tx.commit().await.map_err(internal)?;
        Ok(post)
    }

    async fn get_post(&self, id: Id) -> RepoResult<Post> {
        sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLS} FROM posts WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool).await.map_err(internal)?
            .ok_or(RepoError::NotFound)
    }

    async fn get_post_detail(&self, id: Id) -> RepoResult<PostDetail> {
        let post = self.get_post(id).await?;
        self.details(vec![post]).await?.pop().ok_or(RepoError::NotFound)
    }

    async fn update_post(&self, id: Id, upd: UpdatePost) -> RepoResult<Post> {
        if let Some(loc) = upd.location_id {
            self.ensure_location(loc).await?;
        }
        if let Some(ref cats) = upd.category_ids {
            self.ensure_categories(cats).await?;
        }
        let mut tx = self.pool.begin().await.map_err(internal)?;
        let post = sqlx::query_as::<_, Post>(&format!(
            "UPDATE posts SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                location_id = COALESCE($4, location_id),
                is_public = COALESCE($5, is_public)
             WHERE id = $1
             RETURNING {POST_COLS}"
        ))
        .bind(id)
        .bind(&upd.title)
        .bind(&upd.description)
        .bind(upd.location_id)
        .bind(upd.is_public)
        .fetch_optional(&mut *tx).await.map_err(internal)?
        .ok_or(RepoError::NotFound)?;
        if let Some(cats) = upd.category_ids {
            sqlx::query("DELETE FROM post_categories WHERE post_id = $1")
                .bind(id)
                .execute(&mut *tx).await.map_err(internal)?;
            for cat in cats {
                sqlx::query("INSERT INTO post_categories (post_id, category_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                    .bind(id)
                    .bind(cat)
                    .execute(&mut *tx).await.map_err(internal)?;
            }
        }
        tx.commit().await.map_err(internal)?;
        Ok(post)
    }

    async fn delete_post(&self, id: Id) -> RepoResult<()> {
        let res = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool).await.map_err(internal)?;
        if res.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn feed_page(&self, filter: &FeedFilter, after: Option<Cursor>, take: i64) -> RepoResult<Vec<PostDetail>> {
        let posts = sqlx::query_as::<_, Post>(&format!(r#"
            SELECT {POST_COLS} FROM posts
            WHERE is_public
              AND ($1::BIGINT IS NULL OR user_id = $1)
              AND ($2::BIGINT IS NULL OR location_id = $2)
              AND ($3::TIMESTAMPTZ IS NULL OR (created_at, id) < ($3::TIMESTAMPTZ, $4::BIGINT))
            ORDER BY created_at DESC, id DESC
            LIMIT $5
        "#))
        .bind(filter.user_id)
        .bind(filter.location_id)
        .bind(after.map(|c| c.created_at))
        .bind(after.map(|c| c.id))
        .bind(take)
        .fetch_all(&self.pool).await.map_err(internal)?;
        self.details(posts).await
    }
}

#[async_trait]
impl EdgeRepo for PgRepo {
    async fn insert_edge(&self, kind: EdgeKind, actor: Id, target: Id) -> RepoResult<bool> {
        let (table, a, b) = edge_table(kind);
        let res = sqlx::query(&format!(
            "INSERT INTO {table} ({a}, {b}) VALUES ($1, $2) ON CONFLICT ({a}, {b}) DO NOTHING"
        ))
        .bind(actor)
        .bind(target)
        .execute(&self.pool).await.map_err(internal)?;
        Ok(res.rows_affected() == 1)
    }

    async fn delete_edge(&self, kind: EdgeKind, actor: Id, target: Id) -> RepoResult<bool> {
        let (table, a, b) = edge_table(kind);
        let res = sqlx::query(&format!("DELETE FROM {table} WHERE {a} = $1 AND {b} = $2"))
            .bind(actor)
            .bind(target)
            .execute(&self.pool).await.map_err(internal)?;
        Ok(res.rows_affected() == 1)
    }

    async fn edge_exists(&self, kind: EdgeKind, actor: Id, target: Id) -> RepoResult<bool> {
        let (table, a, b) = edge_table(kind);
        let (exists,): (bool,) = sqlx::query_as(&format!(
            "SELECT EXISTS (SELECT 1 FROM {table} WHERE {a} = $1 AND {b} = $2)"
        ))
        .bind(actor)
        .bind(target)
        .fetch_one(&self.pool).await.map_err(internal)?;
        Ok(exists)
    }

    async fn edges_among(&self, kind: EdgeKind, actor: Id, targets: &[Id]) -> RepoResult<HashSet<Id>> {
        if targets.is_empty() {
            return Ok(HashSet::new());
        }
        let (table, a, b) = edge_table(kind);
        let rows: Vec<(Id,)> = sqlx::query_as(&format!("SELECT {b} FROM {table} WHERE {a} = $1 AND {b} = ANY($2)"))
            .bind(actor)
            .bind(targets)
            .fetch_all(&self.pool).await.map_err(internal)?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

#[async_trait]
impl CommentRepo for PgRepo {
    async fn create_comment(&self, post_id: Id, user_id: Id, content: String, parent_comment_id: Option<Id>) -> RepoResult<Comment> {
        sqlx::query_as::<_, Comment>(
            "INSERT INTO comments (post_id, user_id, content, parent_comment_id) VALUES ($1, $2, $3, $4)
             RETURNING id, post_id, user_id, content, parent_comment_id, created_at",
        )
        .bind(post_id)
        .bind(user_id)
        .bind(&content)
        .bind(parent_comment_id)
        .fetch_one(&self.pool).await.map_err(internal)
    }

    async fn get_comment(&self, id: Id) -> RepoResult<Comment> {
        sqlx::query_as::<_, Comment>(
            "SELECT id, post_id, user_id, content, parent_comment_id, created_at FROM comments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool).await.map_err(internal)?
        .ok_or(RepoError::NotFound)
    }

    async fn list_comments(&self, post_id: Id) -> RepoResult<Vec<Comment>> {
        sqlx::query_as::<_, Comment>(
            "SELECT id, post_id, user_id, content, parent_comment_id, created_at FROM comments
             WHERE post_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(post_id)
        .fetch_all(&self.pool).await.map_err(internal)
    }
}

const CATEGORY_CONFLICT: &str = "Category with this name already exists";

#[async_trait]
impl CategoryRepo for PgRepo {
    async fn list_categories(&self) -> RepoResult<Vec<CategoryWithCount>> {
        let rows = sqlx::query_as::<_, CategoryCountRow>(r#"
            SELECT c.id, c.name, c.description, c.icon, c.color, COUNT(pc.post_id) AS posts_count
            FROM categories c LEFT JOIN post_categories pc ON pc.category_id = c.id
            GROUP BY c.id
            ORDER BY c.name ASC
        "#)
        .fetch_all(&self.pool).await.map_err(internal)?;
        Ok(rows.into_iter().map(|r| CategoryWithCount { category: r.category, posts_count: r.posts_count }).collect())
    }

    async fn get_category(&self, id: Id) -> RepoResult<CategoryWithCount> {
        let row = sqlx::query_as::<_, CategoryCountRow>(r#"
            SELECT c.id, c.name, c.description, c.icon, c.color, COUNT(pc.post_id) AS posts_count
            FROM categories c LEFT JOIN post_categories pc ON pc.category_id = c.id
            WHERE c.id = $1
            GROUP BY c.id
        "#)
        .bind(id)
        .fetch_optional(&self.pool).await.map_err(internal)?
        .ok_or(RepoError::NotFound)?;
        Ok(CategoryWithCount { category: row.category, posts_count: row.posts_count })
    }

    async fn create_category(&self, input: CategoryInput) -> RepoResult<Category> {
        sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name, description, icon, color) VALUES ($1, $2, $3, $4)
             RETURNING id, name, description, icon, color",
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.icon)
        .bind(&input.color)
        .fetch_one(&self.pool).await
        .map_err(|e| classify(e, CATEGORY_CONFLICT))
    }

    async fn update_category(&self, id: Id, input: CategoryInput) -> RepoResult<Category> {
        sqlx::query_as::<_, Category>(
            "UPDATE categories SET name = $2, description = $3, icon = $4, color = $5 WHERE id = $1
             RETURNING id, name, description, icon, color",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.icon)
        .bind(&input.color)
        .fetch_optional(&self.pool).await
        .map_err(|e| classify(e, CATEGORY_CONFLICT))?
        .ok_or(RepoError::NotFound)
    }

    async fn delete_category(&self, id: Id) -> RepoResult<()> {
        let in_use = || RepoError::Conflict("Cannot delete category that is used by posts".into());
        let res = sqlx::query(
            "DELETE FROM categories WHERE id = $1
             AND NOT EXISTS (SELECT 1 FROM post_categories WHERE category_id = $1)",
        )
        .bind(id)
        .execute(&self.pool).await
        .map_err(|e| match classify(e, CATEGORY_CONFLICT) {
            // ON DELETE RESTRICT fired for a concurrently attached post
            RepoError::NotFound => in_use(),
            other => other,
        })?;
        if res.rows_affected() == 1 {
            return Ok(());
        }
        self.get_category(id).await?;
        Err(in_use())
    }
}

#[async_trait]
impl NotificationRepo for PgRepo {
    async fn create_notification(&self, new: NewNotification) -> RepoResult<Notification> {
        sqlx::query_as::<_, Notification>(&format!(
            r#"INSERT INTO notifications (user_id, "type", related_user_id, related_post_id)
               VALUES ($1, $2, $3, $4) RETURNING {NOTIFICATION_COLS}"#
        ))
        .bind(new.user_id)
        .bind(new.kind.as_str())
        .bind(new.related_user_id)
        .bind(new.related_post_id)
        .fetch_one(&self.pool).await.map_err(internal)
    }

    async fn get_notification(&self, id: Id) -> RepoResult<Notification> {
        sqlx::query_as::<_, Notification>(&format!("SELECT {NOTIFICATION_COLS} FROM notifications WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool).await.map_err(internal)?
            .ok_or(RepoError::NotFound)
    }

    async fn list_notifications(&self, user_id: Id, unread_only: bool, after: Option<Cursor>, take: i64) -> RepoResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(&format!(r#"
            SELECT {NOTIFICATION_COLS} FROM notifications
            WHERE user_id = $1
              AND (NOT $2 OR NOT read)
              AND ($3::TIMESTAMPTZ IS NULL OR (created_at, id) < ($3::TIMESTAMPTZ, $4::BIGINT))
            ORDER BY created_at DESC, id DESC
            LIMIT $5
        "#))
        .bind(user_id)
        .bind(unread_only)
        .bind(after.map(|c| c.created_at))
        .bind(after.map(|c| c.id))
        .bind(take)
        .fetch_all(&self.pool).await.map_err(internal)
    }

    async fn mark_read(&self, id: Id) -> RepoResult<Notification> {
        sqlx::query_as::<_, Notification>(&format!(
            "UPDATE notifications SET read = TRUE WHERE id = $1 RETURNING {NOTIFICATION_COLS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool).await.map_err(internal)?
        .ok_or(RepoError::NotFound)
    }

    async fn mark_all_read(&self, user_id: Id) -> RepoResult<u64> {
        let res = sqlx::query("UPDATE notifications SET read = TRUE WHERE user_id = $1 AND NOT read")
            .bind(user_id)
            .execute(&self.pool).await.map_err(internal)?;
        Ok(res.rows_affected())
    }

    async fn unread_count(&self, user_id: Id) -> RepoResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT read")
            .bind(user_id)
            .fetch_one(&self.pool).await.map_err(internal)?;
        Ok(count)
    }
}

#[async_trait]
impl LeaderboardRepo for PgRepo {
    async fn top_posters(&self, limit: i64, offset: i64) -> RepoResult<Vec<PosterRow>> {
        sqlx::query_as::<_, PosterRow>(r#"
            SELECT u.id AS user_id, u.username, u.name, u.image, u.created_at,
                   COUNT(p.id) AS post_count
            FROM users u
            INNER JOIN posts p ON p.user_id = u.id
            GROUP BY u.id, u.username, u.name, u.image, u.created_at
            ORDER BY post_count DESC, u.created_at ASC, u.id ASC
            LIMIT $1 OFFSET $2
        "#)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool).await.map_err(internal)
    }
}
