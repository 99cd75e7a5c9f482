use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use mingle_db::models::NewCommunity;
use mingle_db::new_id;
use mingle_db::queries::{communities, posts};
use mingle_types::api::{Claims, CommunityView, CreateCommunityRequest, CreatePostRequest, PostView, ToggleResponse};
use mingle_types::models::{CommunityFilter, MemberRole};

use crate::error::{ApiError, ApiResult};
use crate::posts::{clean_tags, create_in};
use crate::state::{AppState, db_tx};
use crate::views;

const MAX_NAME_CHARS: usize = 100;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub filter: CommunityFilter,
    pub q: Option<String>,
}

fn community_by_id(conn: &Connection, viewer: &str, id: &str) -> ApiResult<CommunityView> {
    let row = communities::community_by_id(conn, viewer, id)?.ok_or(ApiError::NotFound("community"))?;
    Ok(views::community(row)?)
}

pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<CommunityView>>> {
    let me = claims.sub.to_string();
    let needle = query.q.map(|q| q.trim().to_string()).filter(|q| !q.is_empty());
    let public_only = query.filter == CommunityFilter::Public;
    let member_only = query.filter == CommunityFilter::Mine;

    let list = db_tx(&state, move |conn| {
        Ok(communities::list_communities(conn, &me, public_only, member_only, needle.as_deref())?
            .into_iter()
            .map(views::community)
            .collect::<anyhow::Result<Vec<_>>>()?)
    })
    .await?;
    Ok(Json(list))
}

/// Create a community; the creator joins it as its first admin.
pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateCommunityRequest>,
) -> ApiResult<(StatusCode, Json<CommunityView>)> {
    let name = req.name.trim().to_string();
    if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
        return Err(ApiError::bad_request(format!(
            "community name must be 1-{MAX_NAME_CHARS} characters"
        )));
    }
    let tags = clean_tags(&req.tags)?;

    let me = claims.sub.to_string();
    let view = db_tx(&state, move |conn| {
        if communities::name_taken(conn, &name)? {
            return Err(ApiError::conflict("community name already taken"));
        }
        let id = new_id();
        communities::insert_community(
            conn,
            &NewCommunity {
                id: &id,
                name: &name,
                description: req.description.as_deref().map(str::trim).filter(|d| !d.is_empty()),
                avatar_url: req.avatar_url.as_deref(),
                banner_url: req.banner_url.as_deref(),
                is_private: req.is_private,
                created_by: &me,
                tags: &tags,
            },
        )?;
        communities::add_member(conn, &new_id(), &id, &me, MemberRole::Admin.as_str())?;
        community_by_id(conn, &me, &id)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(community_id): Path<Uuid>,
) -> ApiResult<Json<CommunityView>> {
    let me = claims.sub.to_string();
    let view = db_tx(&state, move |conn| community_by_id(conn, &me, &community_id.to_string())).await?;
    Ok(Json(view))
}

/// Join or leave. A community never loses its last admin.
pub(crate) fn toggle(conn: &Connection, community_id: &str, user_id: &str) -> ApiResult<bool> {
    if communities::community_by_id(conn, user_id, community_id)?.is_none() {
        return Err(ApiError::NotFound("community"));
    }

    match communities::member_role(conn, community_id, user_id)? {
        Some(role) => {
            if role == MemberRole::Admin.as_str() && communities::admin_count(conn, community_id)? <= 1 {
                return Err(ApiError::conflict("the last admin cannot leave the community"));
            }
            communities::remove_member(conn, community_id, user_id)?;
            Ok(false)
        }
        None => {
            communities::add_member(conn, &new_id(), community_id, user_id, MemberRole::Member.as_str())?;
            Ok(true)
        }
    }
}

pub async fn toggle_membership(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(community_id): Path<Uuid>,
) -> ApiResult<Json<ToggleResponse>> {
    let me = claims.sub.to_string();
    let active = db_tx(&state, move |conn| toggle(conn, &community_id.to_string(), &me)).await?;
    Ok(Json(ToggleResponse { active }))
}

pub async fn list_posts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(community_id): Path<Uuid>,
) -> ApiResult<Json<Vec<PostView>>> {
    let me = claims.sub.to_string();
    let list = db_tx(&state, move |conn| {
        let id = community_id.to_string();
        community_by_id(conn, &me, &id)?;
        Ok(views::posts(posts::posts_in_community(conn, &me, &id)?)?)
    })
    .await?;
    Ok(Json(list))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(community_id): Path<Uuid>,
    Json(req): Json<CreatePostRequest>,
) -> ApiResult<(StatusCode, Json<PostView>)> {
    let me = claims.sub.to_string();
    let post = db_tx(&state, move |conn| {
        community_by_id(conn, &me, &community_id.to_string())?;
        create_in(conn, &me, &req, Some(community_id))
    })
    .await?;
    Ok((StatusCode::CREATED, Json(post)))
}
