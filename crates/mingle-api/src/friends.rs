use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use rusqlite::Connection;
use tracing::{debug, info};
use uuid::Uuid;

use mingle_db::models::NewNotification;
use mingle_db::new_id;
use mingle_db::queries::{friends, notifications, users};
use mingle_types::api::{Claims, FriendRequestView, FriendRequests, FriendView, Friendship, SendFriendRequest};
use mingle_types::models::{NotificationKind, RequestAction, RequestStatus};

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, db_tx};
use crate::views;

pub async fn list_friends(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<FriendView>>> {
    let me = claims.sub.to_string();
    let list = db_tx(&state, move |conn| {
        Ok(friends::friends_of(conn, &me)?
            .into_iter()
            .map(views::friend)
            .collect::<anyhow::Result<Vec<_>>>()?)
    })
    .await?;
    Ok(Json(list))
}

/// Pending requests the caller received and sent.
pub async fn list_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<FriendRequests>> {
    let me = claims.sub.to_string();
    let requests = db_tx(&state, move |conn| {
        let received = friends::received_pending(conn, &me)?
            .into_iter()
            .map(views::friend_request)
            .collect::<anyhow::Result<Vec<_>>>()?;
        let sent = friends::sent_pending(conn, &me)?
            .into_iter()
            .map(views::friend_request)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(FriendRequests { received, sent })
    })
    .await?;
    Ok(Json(requests))
}

pub async fn send_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendFriendRequest>,
) -> ApiResult<(StatusCode, Json<FriendRequestView>)> {
    if req.receiver_id == claims.sub {
        return Err(ApiError::conflict("cannot send a friend request to yourself"));
    }

    let me = claims.sub.to_string();
    let receiver = req.receiver_id.to_string();
    let view = db_tx(&state, move |conn| send(conn, &me, &receiver)).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

fn send(conn: &Connection, sender: &str, receiver: &str) -> ApiResult<FriendRequestView> {
    if !users::exists(conn, receiver)? {
        return Err(ApiError::NotFound("user"));
    }
    if friends::are_friends(conn, sender, receiver)? {
        return Err(ApiError::conflict("already friends"));
    }
    if friends::pending_between(conn, sender, receiver)? {
        return Err(ApiError::conflict("a friend request is already pending"));
    }

    let id = new_id();
    friends::insert_request(conn, &id, sender, receiver)?;
    let row = friends::request_by_id(conn, &id)?.ok_or(ApiError::NotFound("friend request"))?;

    let message = format!("{} wants to be your friend!", row.sender.username);
    notifications::insert_notification(
        conn,
        &NewNotification {
            user_id: receiver,
            kind: NotificationKind::FriendRequest.as_str(),
            title: "New Friend Request",
            message: &message,
            link: Some("/friends"),
        },
    )?;
    Ok(views::friend_request(row)?)
}

/// Apply `action` to a request the caller received. Accepting writes the
/// status and the friendship together.
fn respond(conn: &Connection, request_id: &str, me: &str, action: RequestAction) -> ApiResult<FriendRequestView> {
    let row = friends::request_by_id(conn, request_id)?.ok_or(ApiError::NotFound("friend request"))?;
    if row.receiver.id != me {
        return Err(ApiError::Forbidden("only the receiver can answer a friend request"));
    }

    let current: RequestStatus = row.status.parse().map_err(anyhow::Error::from)?;
    let Some(next) = current.apply(action) else {
        debug!("Rejected {:?} on request {} in state {}", action, request_id, current);
        return Err(ApiError::InvalidTransition(current));
    };

    friends::set_request_status(conn, request_id, next.as_str())?;
    if next == RequestStatus::Accepted {
        friends::insert_friendship(conn, &new_id(), &row.sender.id, &row.receiver.id)?;
    }

    let row = friends::request_by_id(conn, request_id)?.ok_or(ApiError::NotFound("friend request"))?;
    Ok(views::friend_request(row)?)
}

pub async fn accept_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(request_id): Path<Uuid>,
) -> ApiResult<Json<Friendship>> {
    let me = claims.sub.to_string();
    let friendship = db_tx(&state, move |conn| {
        let request = respond(conn, &request_id.to_string(), &me, RequestAction::Accept)?;
        let sender = request.sender.id.to_string();
        let row = friends::friendship_between(conn, &sender, &me)?.ok_or(ApiError::NotFound("friendship"))?;
        Ok(views::friendship(&row)?)
    })
    .await?;
    info!("{} and {} are now friends", friendship.user1_id, friendship.user2_id);
    Ok(Json(friendship))
}

pub async fn reject_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(request_id): Path<Uuid>,
) -> ApiResult<Json<FriendRequestView>> {
    let me = claims.sub.to_string();
    let request = db_tx(&state, move |conn| {
        respond(conn, &request_id.to_string(), &me, RequestAction::Reject)
    })
    .await?;
    Ok(Json(request))
}
