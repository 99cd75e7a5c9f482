use axum::{Extension, Json, extract::State, http::StatusCode};

use mingle_db::queries::notifications;
use mingle_types::api::{Claims, NotificationView, UnreadCount};

use crate::error::ApiResult;
use crate::state::{AppState, db_tx};
use crate::views;

const LIST_LIMIT: u32 = 50;

pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<NotificationView>>> {
    let me = claims.sub.to_string();
    let list = db_tx(&state, move |conn| {
        Ok(notifications::notifications_for(conn, &me, LIST_LIMIT)?
            .into_iter()
            .map(views::notification)
            .collect::<anyhow::Result<Vec<_>>>()?)
    })
    .await?;
    Ok(Json(list))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<UnreadCount>> {
    let me = claims.sub.to_string();
    let count = db_tx(&state, move |conn| Ok(notifications::unread_count(conn, &me)?)).await?;
    Ok(Json(UnreadCount { count }))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    let me = claims.sub.to_string();
    db_tx(&state, move |conn| Ok(notifications::mark_all_read(conn, &me)?)).await?;
    Ok(StatusCode::NO_CONTENT)
}
