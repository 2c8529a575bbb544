use crate::auth::Role;
use crate::leaderboard::LeaderboardPage;
use crate::models::{
    Category, CategoryInput, CategoryWithCount, Comment, CommentThread, FeedItem, FeedPage, Image, LeaderboardEntry,
    Location, NewComment, NewLocation, NewOAuthUser, NewPost, Notification, NotificationPage, NotificationType, Post, PostCounts, PostDetail, UpdatePost,
    UpdateProfile, User, UserProfile, UserSummary,
};
use crate::social::{FollowState, LikeState, SaveState};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::sign_in,
        crate::routes::auth_me,
        crate::routes::refresh_token,
        crate::routes::get_user,
        crate::routes::update_profile,
        crate::routes::toggle_follow,
        crate::routes::list_followers,
        crate::routes::list_following,
        crate::routes::search_locations,
        crate::routes::find_or_create_location,
        crate::routes::get_location,
        crate::routes::get_feed,
        crate::routes::create_post,
        crate::routes::get_post,
        crate::routes::update_post,
        crate::routes::delete_post,
        crate::routes::toggle_like,
        crate::routes::toggle_save,
        crate::routes::list_comments,
        crate::routes::add_comment,
        crate::routes::list_notifications,
        crate::routes::unread_count,
        crate::routes::mark_read,
        crate::routes::mark_all_read,
        crate::routes::top_users,
        crate::routes::list_categories,
        crate::routes::get_category,
        crate::routes::create_category,
        crate::routes::update_category,
        crate::routes::delete_category,
        crate::routes::admin_set_role,
        crate::routes::admin_delete_user,
        crate::routes::admin_set_visibility,
        crate::routes::admin_delete_post,
    ),
    components(schemas(
        Role, User, UserSummary, UserProfile, UpdateProfile, NewOAuthUser,
        Location, NewLocation,
        Post, NewPost, UpdatePost, PostCounts, PostDetail, Image, FeedItem, FeedPage,
        Category, CategoryInput, CategoryWithCount,
        Comment, NewComment, CommentThread,
        Notification, NotificationType, NotificationPage,
        LeaderboardEntry, LeaderboardPage,
        FollowState, LikeState, SaveState,
        crate::routes::TokenResponse, crate::routes::SignInResponse, crate::routes::CountResponse,
        crate::routes::SetRoleRequest, crate::routes::VisibilityRequest,
    )),
    tags(
        (name = "social", description = "Follow, like and save toggles"),
        (name = "feed", description = "Public post feed"),
        (name = "notifications", description = "Per-user notification inbox"),
        (name = "admin", description = "Moderation and role management"),
    )
)]
pub struct ApiDoc;
