use axum::{
    Extension, Json,
    extract::{Path, State},
};
use rusqlite::Connection;
use uuid::Uuid;

use mingle_db::models::{NewNotification, ProfileChanges};
use mingle_db::new_id;
use mingle_db::queries::{follows, friends, notifications, posts, users};
use mingle_types::api::{Claims, PostView, Profile, ProfileView, ToggleResponse, UpdateProfileRequest};
use mingle_types::interests;
use mingle_types::models::NotificationKind;

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, db_tx};
use crate::views;

const MAX_BIO_CHARS: usize = 500;

fn is_hex_color(s: &str) -> bool {
    s.len() == 7 && s.starts_with('#') && s[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Empty strings clear optional text fields.
fn changes_from(req: UpdateProfileRequest) -> ApiResult<ProfileChanges> {
    let anonymous_name = match req.anonymous_name {
        Some(name) if name.trim().is_empty() => {
            return Err(ApiError::bad_request("anonymous name cannot be empty"));
        }
        Some(name) => Some(name.trim().to_string()),
        None => None,
    };
    if let Some(ref color) = req.avatar_color {
        if !is_hex_color(color) {
            return Err(ApiError::bad_request("avatar color must look like #aabbcc"));
        }
    }
    if req.bio.as_ref().is_some_and(|b| b.chars().count() > MAX_BIO_CHARS) {
        return Err(ApiError::bad_request(format!("bio is limited to {MAX_BIO_CHARS} characters")));
    }
    let interests = req
        .interests
        .as_deref()
        .map(interests::normalize)
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    Ok(ProfileChanges {
        anonymous_name,
        avatar_color: req.avatar_color,
        avatar_url: req.avatar_url.map(|s| s.trim().to_string()),
        bio: req.bio.map(|s| s.trim().to_string()),
        banner_url: req.banner_url.map(|s| s.trim().to_string()),
        is_public: req.is_public,
        interests,
    })
}

/// Private profiles show their posts only to their owner and friends.
fn can_see_posts(conn: &Connection, viewer: &str, owner: &str, is_public: bool) -> ApiResult<bool> {
    Ok(is_public || viewer == owner || friends::are_friends(conn, viewer, owner)?)
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<ProfileView>> {
    let me = claims.sub.to_string();
    let view = db_tx(&state, move |conn| {
        let id = user_id.to_string();
        let row = users::profile_by_id(conn, &id)?.ok_or(ApiError::NotFound("profile"))?;
        Ok(ProfileView {
            post_count: posts::post_count(conn, &id)?,
            follower_count: follows::follower_count(conn, &id)?,
            following_count: follows::following_count(conn, &id)?,
            is_following: follows::is_following(conn, &me, &id)?,
            is_friend: friends::are_friends(conn, &me, &id)?,
            profile: views::profile(row, id == me)?,
        })
    })
    .await?;
    Ok(Json(view))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<Profile>> {
    let changes = changes_from(req)?;
    let me = claims.sub.to_string();
    let row = db_tx(&state, move |conn| {
        users::update_profile(conn, &me, &changes)?;
        users::profile_by_id(conn, &me)?.ok_or(ApiError::NotFound("profile"))
    })
    .await?;
    Ok(Json(views::profile(row, true)?))
}

pub async fn list_posts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<PostView>>> {
    let me = claims.sub.to_string();
    let list = db_tx(&state, move |conn| {
        let id = user_id.to_string();
        let owner = users::profile_by_id(conn, &id)?.ok_or(ApiError::NotFound("profile"))?;
        if !can_see_posts(conn, &me, &id, owner.is_public)? {
            return Err(ApiError::Forbidden("this profile is private"));
        }
        Ok(views::posts(posts::posts_by_user(conn, &me, &id)?)?)
    })
    .await?;
    Ok(Json(list))
}

pub async fn toggle_follow(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<ToggleResponse>> {
    if user_id == claims.sub {
        return Err(ApiError::bad_request("cannot follow yourself"));
    }

    let me = claims.sub.to_string();
    let active = db_tx(&state, move |conn| {
        let target = user_id.to_string();
        if !users::exists(conn, &target)? {
            return Err(ApiError::NotFound("profile"));
        }
        let following = follows::toggle_follow(conn, &new_id(), &me, &target)?;
        if following {
            let follower = users::author_by_id(conn, &me)?.ok_or(ApiError::NotFound("profile"))?;
            let message = format!("{} started following you!", follower.username);
            let link = format!("/profile/{me}");
            notifications::insert_notification(
                conn,
                &NewNotification {
                    user_id: &target,
                    kind: NotificationKind::Follow.as_str(),
                    title: "New Follower",
                    message: &message,
                    link: Some(&link),
                },
            )?;
        }
        Ok(following)
    })
    .await?;
    Ok(Json(ToggleResponse { active }))
}
