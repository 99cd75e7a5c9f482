use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use rusqlite::Connection;
use tracing::info;
use uuid::Uuid;

use mingle_db::models::ChatSessionRow;
use mingle_db::new_id;
use mingle_db::queries::{chat, friends, users};
use mingle_types::api::{
    ChatPoll, ChatSessionView, Claims, HistoryEntry, MessageView, SendMessageRequest, SessionDetail,
};
use mingle_types::models::{MessageType, SessionStatus};

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, db_tx};
use crate::views;

pub const CHAT_ENDED: &str = "Chat ended";

const MAX_MESSAGE_CHARS: usize = 2000;

/// Load a session the caller takes part in.
pub(crate) fn participant_session(conn: &Connection, session_id: &str, user_id: &str) -> ApiResult<ChatSessionRow> {
    let session = chat::session_by_id(conn, session_id)?.ok_or(ApiError::NotFound("chat session"))?;
    if !session.involves(user_id) {
        return Err(ApiError::Forbidden("not a participant of this chat"));
    }
    Ok(session)
}

pub async fn get_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionDetail>> {
    let me = claims.sub.to_string();
    let detail = db_tx(&state, move |conn| {
        let session = participant_session(conn, &session_id.to_string(), &me)?;
        let other = session.other(&me).to_string();
        let stranger = users::author_by_id(conn, &other)?.ok_or(ApiError::NotFound("profile"))?;
        Ok(SessionDetail {
            session: views::session(&session)?,
            stranger: views::summary(&stranger)?,
            is_friend: friends::are_friends(conn, &me, &other)?,
            request_pending: friends::pending_between(conn, &me, &other)?,
        })
    })
    .await?;
    Ok(Json(detail))
}

/// One poll: the session status and its full message list, oldest first.
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<ChatPoll>> {
    let me = claims.sub.to_string();
    let poll = db_tx(&state, move |conn| {
        let session = participant_session(conn, &session_id.to_string(), &me)?;
        let messages = chat::messages_for_session(conn, &session.id)?
            .into_iter()
            .map(views::message)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(ChatPoll {
            status: views::session(&session)?.status,
            messages,
        })
    })
    .await?;
    Ok(Json(poll))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<(StatusCode, Json<MessageView>)> {
    let kind = req.message_type.unwrap_or(MessageType::Text);
    if kind == MessageType::System {
        return Err(ApiError::bad_request("system messages cannot be sent"));
    }
    let content = req.content.trim().to_string();
    if content.is_empty() || content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::bad_request(format!(
            "message must be 1-{MAX_MESSAGE_CHARS} characters"
        )));
    }

    let me = claims.sub.to_string();
    let message = db_tx(&state, move |conn| {
        let session = participant_session(conn, &session_id.to_string(), &me)?;
        if session.status != SessionStatus::Active.as_str() {
            return Err(ApiError::conflict("chat has ended"));
        }
        let id = new_id();
        chat::insert_message(conn, &id, &session.id, &me, &content, kind.as_str())?;
        let row = chat::message_by_id(conn, &id)?.ok_or(ApiError::NotFound("message"))?;
        Ok(views::message(row)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// End a chat for both sides. Ending an ended chat returns it unchanged.
pub async fn end_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<ChatSessionView>> {
    let me = claims.sub.to_string();
    let session = db_tx(&state, move |conn| {
        let session = participant_session(conn, &session_id.to_string(), &me)?;
        if chat::end_session(conn, &session.id)? {
            chat::insert_message(
                conn,
                &new_id(),
                &session.id,
                &me,
                CHAT_ENDED,
                MessageType::System.as_str(),
            )?;
            info!("Chat {} ended by {}", session.id, me);
        }
        Ok(chat::session_by_id(conn, &session.id)?.ok_or(ApiError::NotFound("chat session"))?)
    })
    .await?;
    Ok(Json(views::session(&session)?))
}

/// Every chat the caller took part in, newest first.
pub async fn history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<HistoryEntry>>> {
    let me = claims.sub.to_string();
    let entries = db_tx(&state, move |conn| {
        let mut entries = Vec::new();
        for session in chat::sessions_for_user(conn, &me)? {
            let stranger = users::author_by_id(conn, session.other(&me))?
                .as_ref()
                .map(views::summary)
                .transpose()?;
            let last_message = chat::last_text_message(conn, &session.id)?
                .map(views::message)
                .transpose()?;
            entries.push(HistoryEntry {
                session: views::session(&session)?,
                stranger,
                last_message,
            });
        }
        Ok(entries)
    })
    .await?;
    Ok(Json(entries))
}

/// Open a chat with a friend, reusing an active one between the two.
pub async fn start_with_friend(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(friend_id): Path<Uuid>,
) -> ApiResult<Json<ChatSessionView>> {
    let me = claims.sub.to_string();
    let friend = friend_id.to_string();
    let session = db_tx(&state, move |conn| {
        if !friends::are_friends(conn, &me, &friend)? {
            return Err(ApiError::Forbidden("you can only chat with friends"));
        }
        if let Some(existing) = chat::active_session_between(conn, &me, &friend)? {
            return Ok(existing);
        }
        Ok(chat::insert_session(conn, &new_id(), &me, &friend)?)
    })
    .await?;
    Ok(Json(views::session(&session)?))
}
