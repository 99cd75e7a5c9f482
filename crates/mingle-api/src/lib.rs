pub mod auth;
pub mod chat;
pub mod communities;
pub mod direct;
pub mod error;
pub mod friends;
pub mod matching;
pub mod middleware;
pub mod notifications;
pub mod posts;
pub mod profiles;
pub mod search;
pub mod state;
pub mod views;

use axum::{
    Json, Router,
    middleware as axum_middleware,
    routing::{get, patch, post},
};

pub use error::{ApiError, ApiResult};
pub use state::{AppState, AppStateInner};

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// The full HTTP surface. Everything except sign-up, sign-in and health
/// needs a bearer token.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/otp", post(auth::request_otp))
        .route("/auth/verify", post(auth::verify_otp))
        .route("/auth/login", post(auth::login))
        .route("/health", get(health));

    let protected_routes = Router::new()
        // Auth
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        // Profiles
        .route("/profiles/me", patch(profiles::update_me))
        .route("/profiles/{id}", get(profiles::get_profile))
        .route("/profiles/{id}/posts", get(profiles::list_posts))
        .route("/profiles/{id}/follow", post(profiles::toggle_follow))
        // Posts
        .route("/posts", get(posts::feed).post(posts::create_post))
        .route("/posts/trending-tags", get(posts::trending_tags))
        .route("/posts/{id}", get(posts::get_post).delete(posts::delete_post))
        .route("/posts/{id}/comments", get(posts::list_comments).post(posts::add_comment))
        .route("/posts/{id}/like", post(posts::toggle_like))
        .route("/posts/{id}/save", post(posts::toggle_save))
        .route("/saved", get(posts::saved))
        // Communities
        .route("/communities", get(communities::list).post(communities::create))
        .route("/communities/{id}", get(communities::get))
        .route("/communities/{id}/membership", post(communities::toggle_membership))
        .route(
            "/communities/{id}/posts",
            get(communities::list_posts).post(communities::create_post),
        )
        // Stranger chat
        .route("/chat/match", post(matching::find_match))
        .route("/chat/history", get(chat::history))
        .route("/chat/sessions/{id}", get(chat::get_session))
        .route(
            "/chat/sessions/{id}/messages",
            get(chat::get_messages).post(chat::send_message),
        )
        .route("/chat/sessions/{id}/end", post(chat::end_session))
        // Friends
        .route("/friends", get(friends::list_friends))
        .route("/friends/requests", get(friends::list_requests).post(friends::send_request))
        .route("/friends/requests/{id}/accept", post(friends::accept_request))
        .route("/friends/requests/{id}/reject", post(friends::reject_request))
        .route("/friends/{id}/chat", post(chat::start_with_friend))
        // Direct messages
        .route("/dm/{friend_id}", get(direct::conversation).post(direct::send))
        // Notifications
        .route("/notifications", get(notifications::list))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read", post(notifications::mark_all_read))
        .route("/search", get(search::search))
        .layer(axum_middleware::from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
