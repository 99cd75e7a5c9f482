use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use rusqlite::Connection;
use uuid::Uuid;

use mingle_db::models::NewNotification;
use mingle_db::new_id;
use mingle_db::queries::{direct, friends, notifications, users};
use mingle_types::api::{Claims, DirectMessageView, SendDirectMessageRequest};
use mingle_types::models::NotificationKind;

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, db_tx};
use crate::views;

const MAX_DM_CHARS: usize = 2000;

fn require_friend(conn: &Connection, me: &str, other: &str) -> ApiResult<()> {
    if !friends::are_friends(conn, me, other)? {
        return Err(ApiError::Forbidden("direct messages are only open between friends"));
    }
    Ok(())
}

/// One poll of a conversation, oldest first. The friend's unread messages to
/// the caller are marked read on the way.
pub async fn conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(friend_id): Path<Uuid>,
) -> ApiResult<Json<Vec<DirectMessageView>>> {
    let me = claims.sub.to_string();
    let friend = friend_id.to_string();
    let messages = db_tx(&state, move |conn| {
        require_friend(conn, &me, &friend)?;
        direct::mark_read(conn, &friend, &me)?;
        Ok(direct::conversation(conn, &me, &friend)?
            .into_iter()
            .map(views::direct_message)
            .collect::<anyhow::Result<Vec<_>>>()?)
    })
    .await?;
    Ok(Json(messages))
}

pub async fn send(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(friend_id): Path<Uuid>,
    Json(req): Json<SendDirectMessageRequest>,
) -> ApiResult<(StatusCode, Json<DirectMessageView>)> {
    let content = req.content.trim().to_string();
    if content.is_empty() || content.chars().count() > MAX_DM_CHARS {
        return Err(ApiError::bad_request(format!("message must be 1-{MAX_DM_CHARS} characters")));
    }

    let me = claims.sub.to_string();
    let friend = friend_id.to_string();
    let message = db_tx(&state, move |conn| {
        require_friend(conn, &me, &friend)?;
        let row = direct::insert_direct_message(conn, &new_id(), &me, &friend, &content)?;

        let sender = users::author_by_id(conn, &me)?.ok_or(ApiError::NotFound("profile"))?;
        let text = format!("{} sent you a message", sender.username);
        notifications::insert_notification(
            conn,
            &NewNotification {
                user_id: &friend,
                kind: NotificationKind::Dm.as_str(),
                title: "New Message",
                message: &text,
                link: Some("/messages"),
            },
        )?;
        Ok(views::direct_message(row)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(message)))
}
