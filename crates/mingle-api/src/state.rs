use std::sync::Arc;

use rusqlite::Connection;
use tracing::error;

use mingle_db::Database;

use crate::auth::OtpDelivery;
use crate::error::{ApiError, ApiResult};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub otp_ttl: chrono::Duration,
    pub otp_delivery: Arc<dyn OtpDelivery>,
}

/// Run `f` in one database transaction on the blocking pool. Everything a
/// handler reads and writes inside `f` commits together or not at all.
pub async fn db_tx<F, T>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Connection) -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || state.db.with_tx(|tx| f(tx)))
        .await
        .map_err(|e| {
            error!("DB task failed: {}", e);
            ApiError::Internal(anyhow::anyhow!("db task join error: {e}"))
        })?
}
