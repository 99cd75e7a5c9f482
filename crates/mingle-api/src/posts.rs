use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use mingle_db::models::NewPost;
use mingle_db::new_id;
use mingle_db::queries::{communities, posts};
use mingle_types::api::{
    Claims, CommentView, CreateCommentRequest, CreatePostRequest, PostView, ToggleResponse, TrendingTag,
};

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, db_tx};
use crate::views;

const MAX_POST_CHARS: usize = 5000;
const MAX_COMMENT_CHARS: usize = 2000;
const MAX_TAGS: usize = 10;
const FEED_LIMIT: u32 = 50;
const TRENDING_LIMIT: u32 = 10;

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub tag: Option<String>,
}

/// Trim, drop blanks and duplicates.
pub(crate) fn clean_tags(raw: &[String]) -> ApiResult<Vec<String>> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    if tags.len() > MAX_TAGS {
        return Err(ApiError::bad_request(format!("at most {MAX_TAGS} tags")));
    }
    Ok(tags)
}

fn post_by_id(conn: &Connection, viewer: &str, id: &str) -> ApiResult<PostView> {
    let row = posts::post_by_id(conn, viewer, id)?.ok_or(ApiError::NotFound("post"))?;
    Ok(views::post(row)?)
}

/// Validate and store a post. `community_id` from the path wins over the body.
pub(crate) fn create_in(
    conn: &Connection,
    author: &str,
    req: &CreatePostRequest,
    community_id: Option<Uuid>,
) -> ApiResult<PostView> {
    let content = req.content.trim();
    if content.is_empty() || content.chars().count() > MAX_POST_CHARS {
        return Err(ApiError::bad_request(format!("post must be 1-{MAX_POST_CHARS} characters")));
    }
    let tags = clean_tags(&req.tags)?;

    let community = community_id.or(req.community_id).map(|id| id.to_string());
    if let Some(ref cid) = community {
        if communities::member_role(conn, cid, author)?.is_none() {
            return Err(ApiError::Forbidden("join the community to post in it"));
        }
    }

    let id = new_id();
    posts::insert_post(
        conn,
        &NewPost {
            id: &id,
            user_id: author,
            content,
            image_url: req.image_url.as_deref().filter(|u| !u.trim().is_empty()),
            tags: &tags,
            community_id: community.as_deref(),
        },
    )?;
    post_by_id(conn, author, &id)
}

pub async fn feed(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<FeedQuery>,
) -> ApiResult<Json<Vec<PostView>>> {
    let me = claims.sub.to_string();
    let tag = query.tag.filter(|t| !t.trim().is_empty());
    let list = db_tx(&state, move |conn| {
        Ok(views::posts(posts::feed(conn, &me, tag.as_deref(), FEED_LIMIT)?)?)
    })
    .await?;
    Ok(Json(list))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> ApiResult<(StatusCode, Json<PostView>)> {
    let me = claims.sub.to_string();
    let post = db_tx(&state, move |conn| create_in(conn, &me, &req, None)).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn trending_tags(State(state): State<AppState>) -> ApiResult<Json<Vec<TrendingTag>>> {
    let tags = db_tx(&state, |conn| Ok(posts::trending_tags(conn, TRENDING_LIMIT)?)).await?;
    Ok(Json(
        tags.into_iter().map(|(tag, count)| TrendingTag { tag, count }).collect(),
    ))
}

pub async fn get_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<Uuid>,
) -> ApiResult<Json<PostView>> {
    let me = claims.sub.to_string();
    let post = db_tx(&state, move |conn| post_by_id(conn, &me, &post_id.to_string())).await?;
    Ok(Json(post))
}

/// Authors delete their own posts; comments, likes and saves go with them.
pub async fn delete_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let me = claims.sub.to_string();
    db_tx(&state, move |conn| {
        let id = post_id.to_string();
        let owner = posts::post_owner(conn, &id)?.ok_or(ApiError::NotFound("post"))?;
        if owner != me {
            return Err(ApiError::Forbidden("only the author can delete a post"));
        }
        posts::delete_post(conn, &id)?;
        Ok(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_comments(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<Uuid>,
) -> ApiResult<Json<Vec<CommentView>>> {
    let me = claims.sub.to_string();
    let comments = db_tx(&state, move |conn| {
        let id = post_id.to_string();
        if !posts::is_visible(conn, &me, &id)? {
            return Err(ApiError::NotFound("post"));
        }
        Ok(posts::comments_for_post(conn, &id)?
            .into_iter()
            .map(views::comment)
            .collect::<anyhow::Result<Vec<_>>>()?)
    })
    .await?;
    Ok(Json(comments))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<Uuid>,
    Json(req): Json<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<CommentView>)> {
    let content = req.content.trim().to_string();
    if content.is_empty() || content.chars().count() > MAX_COMMENT_CHARS {
        return Err(ApiError::bad_request(format!(
            "comment must be 1-{MAX_COMMENT_CHARS} characters"
        )));
    }

    let me = claims.sub.to_string();
    let comment = db_tx(&state, move |conn| {
        let post = post_id.to_string();
        if !posts::is_visible(conn, &me, &post)? {
            return Err(ApiError::NotFound("post"));
        }
        let id = new_id();
        posts::insert_comment(conn, &id, &post, &me, &content)?;
        let row = posts::comment_by_id(conn, &id)?.ok_or(ApiError::NotFound("comment"))?;
        Ok(views::comment(row)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<Uuid>,
) -> ApiResult<Json<ToggleResponse>> {
    let me = claims.sub.to_string();
    let active = db_tx(&state, move |conn| {
        let post = post_id.to_string();
        if !posts::is_visible(conn, &me, &post)? {
            return Err(ApiError::NotFound("post"));
        }
        Ok(posts::toggle_like(conn, &new_id(), &post, &me)?)
    })
    .await?;
    Ok(Json(ToggleResponse { active }))
}

pub async fn toggle_save(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<Uuid>,
) -> ApiResult<Json<ToggleResponse>> {
    let me = claims.sub.to_string();
    let active = db_tx(&state, move |conn| {
        let post = post_id.to_string();
        if !posts::is_visible(conn, &me, &post)? {
            return Err(ApiError::NotFound("post"));
        }
        Ok(posts::toggle_saved(conn, &new_id(), &post, &me)?)
    })
    .await?;
    Ok(Json(ToggleResponse { active }))
}

/// The caller's saved posts, most recently saved first.
pub async fn saved(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<PostView>>> {
    let me = claims.sub.to_string();
    let list = db_tx(&state, move |conn| Ok(views::posts(posts::saved_posts(conn, &me)?)?)).await?;
    Ok(Json(list))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_trimmed_and_deduped() {
        let raw = vec![" rust ".to_string(), "".to_string(), "rust".to_string(), "axum".to_string()];
        assert_eq!(clean_tags(&raw).unwrap(), vec!["rust", "axum"]);
    }

    #[test]
    fn too_many_tags_are_refused() {
        let raw: Vec<String> = (0..11).map(|i| format!("t{i}")).collect();
        assert!(clean_tags(&raw).is_err());
        assert_eq!(clean_tags(&raw[..10]).unwrap().len(), 10);
    }
}
