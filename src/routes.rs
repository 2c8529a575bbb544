use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::{create_jwt, require_auth, require_role, secrets_match, Auth, Caller, Role};
use crate::cache::Cache;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::feed::FeedQuery;
use crate::leaderboard::LeaderboardPage;
use crate::models::*;
use crate::notify::{ListOptions, NotificationOutbox};
use crate::repo::Repo;
use crate::social::{FollowState, LikeState, SaveState};
use crate::{categories, comments, feed, leaderboard, locations, notify, posts, social, users};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _| ApiError::validation(err.to_string()).into()))
        .app_data(web::QueryConfig::default().error_handler(|err, _| ApiError::validation(err.to_string()).into()))
        .service(
            web::scope("/api/v1")
                .service(web::resource("/auth/signin").route(web::post().to(sign_in)))
                .service(web::resource("/auth/me").route(web::get().to(auth_me)))
                .service(web::resource("/auth/refresh").route(web::post().to(refresh_token)))
                .service(
                    web::resource("/users/{id}")
                        .route(web::get().to(get_user))
                        .route(web::put().to(update_profile)),
                )
                .service(web::resource("/users/{id}/follow").route(web::post().to(toggle_follow)))
                .service(web::resource("/users/{id}/followers").route(web::get().to(list_followers)))
                .service(web::resource("/users/{id}/following").route(web::get().to(list_following)))
                .service(
                    web::resource("/locations")
                        .route(web::get().to(search_locations))
                        .route(web::post().to(find_or_create_location)),
                )
                .service(web::resource("/locations/{id}").route(web::get().to(get_location)))
                .service(
                    web::resource("/posts")
                        .route(web::get().to(get_feed))
                        .route(web::post().to(create_post)),
                )
                .service(
                    web::resource("/posts/{id}")
                        .route(web::get().to(get_post))
                        .route(web::put().to(update_post))
                        .route(web::delete().to(delete_post)),
                )
                .service(web::resource("/posts/{id}/like").route(web::post().to(toggle_like)))
                .service(web::resource("/posts/{id}/save").route(web::post().to(toggle_save)))
                .service(
                    web::resource("/posts/{id}/comments")
                        .route(web::get().to(list_comments))
                        .route(web::post().to(add_comment)),
                )
                .service(web::resource("/notifications").route(web::get().to(list_notifications)))
                .service(web::resource("/notifications/unread-count").route(web::get().to(unread_count)))
                .service(web::resource("/notifications/read-all").route(web::post().to(mark_all_read)))
                .service(web::resource("/notifications/{id}/read").route(web::post().to(mark_read)))
                .service(web::resource("/leaderboard/top-users").route(web::get().to(top_users)))
                .service(
                    web::resource("/categories")
                        .route(web::get().to(list_categories))
                        .route(web::post().to(create_category)),
                )
                .service(
                    web::resource("/categories/{id}")
                        .route(web::get().to(get_category))
                        .route(web::put().to(update_category))
                        .route(web::delete().to(delete_category)),
                )
                // Admin / moderation endpoints
                .service(
                    web::resource("/admin/users/{id}")
                        .route(web::put().to(admin_set_role))
                        .route(web::delete().to(admin_delete_user)),
                )
                .service(
                    web::resource("/admin/posts/{id}")
                        .route(web::patch().to(admin_set_visibility))
                        .route(web::delete().to(admin_delete_post)),
                ),
        );
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub cache: Arc<dyn Cache>,
    pub outbox: Arc<dyn NotificationOutbox>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(repo: Arc<dyn Repo>, cache: Arc<dyn Cache>, outbox: Arc<dyn NotificationOutbox>, config: AppConfig) -> Self {
        Self { repo, cache, outbox, config: Arc::new(config) }
    }
}

/// Resolve an optional session. A bad or stale token reads as anonymous.
async fn optional_caller(state: &AppState, auth: Option<Auth>) -> Result<Option<Caller>, ApiError> {
    let Some(auth) = auth else { return Ok(None) };
    match require_auth(state, &auth).await {
        Ok(caller) => Ok(Some(caller)),
        Err(ApiError::Unauthorized) => Ok(None),
        Err(e) => Err(e),
    }
}

// ---------------- Session -----------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

/// Header carrying the shared secret of the sign-in front end.
pub const IDENTITY_HEADER: &str = "X-Identity-Secret";

#[derive(Debug, Serialize, ToSchema)]
pub struct SignInResponse {
    pub token: String,
    pub user: User,
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/signin",
    request_body = NewOAuthUser,
    params(("X-Identity-Secret" = String, Header, description = "Shared secret of the sign-in front end")),
    responses(
        (status = 200, description = "Session issued; account created on first sign-in", body = SignInResponse),
        (status = 400, description = "Invalid email"),
        (status = 401, description = "Missing or wrong identity secret"),
        (status = 503, description = "Sign-in not configured")
    )
)]
pub async fn sign_in(req: HttpRequest, data: web::Data<AppState>, payload: web::Json<NewOAuthUser>) -> Result<HttpResponse, ApiError> {
    let Some(expected) = data.config.identity_secret.as_deref() else {
        return Ok(HttpResponse::ServiceUnavailable().json(serde_json::json!({ "error": "sign-in not configured" })));
    };
    let presented = req.headers().get(IDENTITY_HEADER).and_then(|v| v.to_str().ok()).unwrap_or_default();
    if !secrets_match(presented, expected) {
        log::warn!("sign-in rejected: bad identity secret");
        return Err(ApiError::Unauthorized);
    }
    let (user, token) = users::sign_in(&data, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(SignInResponse { token, user }))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn auth_me(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let caller = require_auth(&data, &auth).await?;
    let user = data.repo.get_user(caller.id).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    responses(
        (status = 200, description = "Fresh token", body = TokenResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn refresh_token(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let caller = require_auth(&data, &auth).await?;
    let token = create_jwt(&data.config.jwt_secret, caller.id, data.config.jwt_ttl_hours).map_err(|e| {
        log::error!("issuing token for user {} failed: {e}", caller.id);
        ApiError::Internal
    })?;
    Ok(HttpResponse::Ok().json(TokenResponse { token }))
}

// ---------------- Users -------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = Id, Path, description = "User id")),
    responses(
        (status = 200, description = "User profile with counts", body = UserProfile),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let profile = users::get_user(&data, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(profile))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    request_body = UpdateProfile,
    params(("id" = Id, Path, description = "User id")),
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 400, description = "Invalid or duplicate username"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the profile owner")
    )
)]
pub async fn update_profile(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdateProfile>,
) -> Result<HttpResponse, ApiError> {
    let caller = require_auth(&data, &auth).await?;
    let user = users::update_profile(&data, &caller, path.into_inner(), payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/{id}/follow",
    params(("id" = Id, Path, description = "User to follow or unfollow")),
    responses(
        (status = 200, description = "New follow state", body = FollowState),
        (status = 400, description = "Cannot follow yourself"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found")
    )
)]
pub async fn toggle_follow(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let caller = require_auth(&data, &auth).await?;
    let state = social::toggle_follow(&data, caller.id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(state))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/followers",
    params(("id" = Id, Path, description = "User id")),
    responses(
        (status = 200, description = "Followers", body = [UserSummary]),
        (status = 404, description = "User not found")
    )
)]
pub async fn list_followers(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(users::list_followers(&data, path.into_inner()).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/following",
    params(("id" = Id, Path, description = "User id")),
    responses(
        (status = 200, description = "Followed users", body = [UserSummary]),
        (status = 404, description = "User not found")
    )
)]
pub async fn list_following(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(users::list_following(&data, path.into_inner()).await?))
}

// ---------------- Locations ---------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LocationSearchParams {
    /// Matched against name and address, case-insensitively.
    pub q: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/locations",
    params(LocationSearchParams),
    responses((status = 200, description = "Up to 20 matching locations", body = [Location]))
)]
pub async fn search_locations(data: web::Data<AppState>, query: web::Query<LocationSearchParams>) -> Result<HttpResponse, ApiError> {
    let q = query.into_inner().q.unwrap_or_default();
    let found = locations::search_locations(data.repo.as_ref(), &q).await?;
    Ok(HttpResponse::Ok().json(found))
}

#[utoipa::path(
    post,
    path = "/api/v1/locations",
    request_body = NewLocation,
    responses(
        (status = 201, description = "Location created", body = Location),
        (status = 200, description = "Existing location with the same place id or coordinates", body = Location),
        (status = 400, description = "Coordinates out of range"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn find_or_create_location(auth: Auth, data: web::Data<AppState>, payload: web::Json<NewLocation>) -> Result<HttpResponse, ApiError> {
    require_auth(&data, &auth).await?;
    let (location, created) = locations::find_or_create_location(data.repo.as_ref(), payload.into_inner()).await?;
    if created {
        Ok(HttpResponse::Created().json(location))
    } else {
        Ok(HttpResponse::Ok().json(location))
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/locations/{id}",
    params(("id" = Id, Path, description = "Location id")),
    responses(
        (status = 200, description = "Location", body = Location),
        (status = 404, description = "Location not found")
    )
)]
pub async fn get_location(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let location = data.repo.get_location(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(location))
}

// ---------------- Posts & feed ------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct FeedParams {
    /// Opaque cursor from a previous page's `nextCursor`.
    pub cursor: Option<String>,
    /// Page size, 1..=100 (default 20).
    pub limit: Option<i64>,
    pub user_id: Option<Id>,
    pub location_id: Option<Id>,
}

#[utoipa::path(
    get,
    path = "/api/v1/posts",
    params(FeedParams),
    responses(
        (status = 200, description = "Feed page, newest first", body = FeedPage),
        (status = 400, description = "Malformed cursor")
    )
)]
pub async fn get_feed(auth: Option<Auth>, data: web::Data<AppState>, query: web::Query<FeedParams>) -> Result<HttpResponse, ApiError> {
    let viewer = optional_caller(&data, auth).await?;
    let q = query.into_inner();
    let page = feed::get_feed(
        &data,
        FeedQuery {
            viewer_id: viewer.map(|c| c.id),
            cursor: q.cursor,
            limit: q.limit,
            filter_user_id: q.user_id,
            filter_location_id: q.location_id,
        },
    )
    .await?;
    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    post,
    path = "/api/v1/posts",
    request_body = NewPost,
    responses(
        (status = 201, description = "Post created", body = PostDetail),
        (status = 400, description = "Missing images, or unknown location or category"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_post(auth: Auth, data: web::Data<AppState>, payload: web::Json<NewPost>) -> Result<HttpResponse, ApiError> {
    let caller = require_auth(&data, &auth).await?;
    let detail = posts::create_post(&data, &caller, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(detail))
}

#[utoipa::path(
    get,
    path = "/api/v1/posts/{id}",
    params(("id" = Id, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post detail", body = FeedItem),
        (status = 404, description = "Post not found")
    )
)]
pub async fn get_post(auth: Option<Auth>, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let viewer = optional_caller(&data, auth).await?;
    let item = posts::get_post(&data, viewer.as_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(item))
}

#[utoipa::path(
    put,
    path = "/api/v1/posts/{id}",
    request_body = UpdatePost,
    params(("id" = Id, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post updated", body = PostDetail),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the post owner"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn update_post(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdatePost>,
) -> Result<HttpResponse, ApiError> {
    let caller = require_auth(&data, &auth).await?;
    let detail = posts::update_post(&data, &caller, path.into_inner(), payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(detail))
}

#[utoipa::path(
    delete,
    path = "/api/v1/posts/{id}",
    params(("id" = Id, Path, description = "Post id")),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner or a moderator"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn delete_post(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let caller = require_auth(&data, &auth).await?;
    posts::delete_post(&data, &caller, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/api/v1/posts/{id}/like",
    params(("id" = Id, Path, description = "Post id")),
    responses(
        (status = 200, description = "New like state", body = LikeState),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn toggle_like(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let caller = require_auth(&data, &auth).await?;
    Ok(HttpResponse::Ok().json(social::toggle_like(&data, caller.id, path.into_inner()).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/posts/{id}/save",
    params(("id" = Id, Path, description = "Post id")),
    responses(
        (status = 200, description = "New save state", body = SaveState),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn toggle_save(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let caller = require_auth(&data, &auth).await?;
    Ok(HttpResponse::Ok().json(social::toggle_save(&data, caller.id, path.into_inner()).await?))
}

// ---------------- Comments ----------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/posts/{id}/comments",
    params(("id" = Id, Path, description = "Post id")),
    responses(
        (status = 200, description = "Comment threads", body = [CommentThread]),
        (status = 404, description = "Post not found")
    )
)]
pub async fn list_comments(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(comments::list_comments(&data, path.into_inner()).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/posts/{id}/comments",
    request_body = NewComment,
    params(("id" = Id, Path, description = "Post id")),
    responses(
        (status = 201, description = "Comment created", body = Comment),
        (status = 400, description = "Empty, too long, or invalid parent"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn add_comment(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<NewComment>,
) -> Result<HttpResponse, ApiError> {
    let caller = require_auth(&data, &auth).await?;
    let comment = comments::add_comment(&data, &caller, path.into_inner(), payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(comment))
}

// ---------------- Notifications -----------------------------------

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct NotificationParams {
    #[serde(default)]
    pub unread_only: bool,
    /// Page size, 1..=100 (default 50).
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CountResponse {
    pub count: i64,
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    params(NotificationParams),
    responses(
        (status = 200, description = "Caller's notifications, newest first", body = NotificationPage),
        (status = 400, description = "Malformed cursor"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_notifications(auth: Auth, data: web::Data<AppState>, query: web::Query<NotificationParams>) -> Result<HttpResponse, ApiError> {
    let caller = require_auth(&data, &auth).await?;
    let q = query.into_inner();
    let opts = ListOptions { unread_only: q.unread_only, limit: q.limit, cursor: q.cursor };
    let page = notify::list_notifications(data.repo.as_ref(), caller.id, opts).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications/unread-count",
    responses(
        (status = 200, description = "Unread notifications", body = CountResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn unread_count(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let caller = require_auth(&data, &auth).await?;
    let count = notify::unread_count(data.repo.as_ref(), caller.id).await?;
    Ok(HttpResponse::Ok().json(CountResponse { count }))
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications/{id}/read",
    params(("id" = Id, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Notification marked read", body = Notification),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the recipient"),
        (status = 404, description = "Notification not found")
    )
)]
pub async fn mark_read(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let caller = require_auth(&data, &auth).await?;
    let n = notify::mark_read(data.repo.as_ref(), path.into_inner(), &caller).await?;
    Ok(HttpResponse::Ok().json(n))
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications/read-all",
    responses(
        (status = 200, description = "Number of notifications marked read", body = CountResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn mark_all_read(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let caller = require_auth(&data, &auth).await?;
    let count = notify::mark_all_read(data.repo.as_ref(), caller.id).await?;
    Ok(HttpResponse::Ok().json(CountResponse { count: count as i64 }))
}

// ---------------- Leaderboard -------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaderboardParams {
    /// 1..=100 (default 100).
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/leaderboard/top-users",
    params(LeaderboardParams),
    responses((status = 200, description = "Users ranked by post count", body = LeaderboardPage))
)]
pub async fn top_users(data: web::Data<AppState>, query: web::Query<LeaderboardParams>) -> Result<HttpResponse, ApiError> {
    let q = query.into_inner();
    let page = leaderboard::get_top_users(data.repo.as_ref(), q.limit, q.offset).await?;
    Ok(HttpResponse::Ok().json(page))
}

// ---------------- Categories --------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/categories",
    responses((status = 200, description = "Categories by name with post counts", body = [CategoryWithCount]))
)]
pub async fn list_categories(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(categories::list_categories(data.repo.as_ref()).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}",
    params(("id" = Id, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category", body = CategoryWithCount),
        (status = 404, description = "Category not found")
    )
)]
pub async fn get_category(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(categories::get_category(data.repo.as_ref(), path.into_inner()).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/categories",
    request_body = CategoryInput,
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 400, description = "Empty or duplicate name"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Moderators only")
    )
)]
pub async fn create_category(auth: Auth, data: web::Data<AppState>, payload: web::Json<CategoryInput>) -> Result<HttpResponse, ApiError> {
    require_role(&data, &auth, Role::Moderator).await?;
    let category = categories::create_category(data.repo.as_ref(), payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(category))
}

#[utoipa::path(
    put,
    path = "/api/v1/categories/{id}",
    request_body = CategoryInput,
    params(("id" = Id, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category updated", body = Category),
        (status = 400, description = "Empty or duplicate name"),
        (status = 403, description = "Moderators only"),
        (status = 404, description = "Category not found")
    )
)]
pub async fn update_category(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<CategoryInput>,
) -> Result<HttpResponse, ApiError> {
    require_role(&data, &auth, Role::Moderator).await?;
    let category = categories::update_category(data.repo.as_ref(), path.into_inner(), payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(category))
}

#[utoipa::path(
    delete,
    path = "/api/v1/categories/{id}",
    params(("id" = Id, Path, description = "Category id")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 400, description = "Category is used by posts"),
        (status = 403, description = "Moderators only"),
        (status = 404, description = "Category not found")
    )
)]
pub async fn delete_category(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    require_role(&data, &auth, Role::Moderator).await?;
    categories::delete_category(data.repo.as_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

// ---------------- Admin moderation --------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetRoleRequest {
    /// One of `USER`, `MODERATOR`, `ADMIN`.
    pub role: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityRequest {
    pub is_public: bool,
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/users/{id}",
    request_body = SetRoleRequest,
    params(("id" = Id, Path, description = "User id")),
    responses(
        (status = 200, description = "Role updated", body = User),
        (status = 400, description = "Invalid role"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admins only"),
        (status = 404, description = "User not found")
    )
)]
pub async fn admin_set_role(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<SetRoleRequest>,
) -> Result<HttpResponse, ApiError> {
    require_role(&data, &auth, Role::Admin).await?;
    let user = users::set_role(&data, path.into_inner(), &payload.role).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/users/{id}",
    params(("id" = Id, Path, description = "User id")),
    responses(
        (status = 204, description = "User and all their content deleted"),
        (status = 403, description = "Admins only"),
        (status = 404, description = "User not found")
    )
)]
pub async fn admin_delete_user(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    require_role(&data, &auth, Role::Admin).await?;
    users::delete_user(&data, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    patch,
    path = "/api/v1/admin/posts/{id}",
    request_body = VisibilityRequest,
    params(("id" = Id, Path, description = "Post id")),
    responses(
        (status = 200, description = "Visibility changed", body = PostDetail),
        (status = 403, description = "Moderators only"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn admin_set_visibility(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<VisibilityRequest>,
) -> Result<HttpResponse, ApiError> {
    require_role(&data, &auth, Role::Moderator).await?;
    let detail = posts::set_visibility(&data, path.into_inner(), payload.is_public).await?;
    Ok(HttpResponse::Ok().json(detail))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/posts/{id}",
    params(("id" = Id, Path, description = "Post id")),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 403, description = "Moderators only"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn admin_delete_post(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let caller = require_role(&data, &auth, Role::Moderator).await?;
    posts::delete_post(&data, &caller, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
