use std::sync::{Arc, RwLock};

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use mingle_types::api::{
    AuthResponse, ChatPoll, ChatSessionView, CreatePostRequest, DirectMessageView, ErrorBody, FriendRequestView,
    FriendRequests, FriendView, Friendship, HistoryEntry, LoginRequest, MatchRequest, MessageView,
    NotificationView, PostView, Profile, RequestOtpRequest, SearchResults, SendDirectMessageRequest,
    SendFriendRequest, SendMessageRequest, SessionDetail, UnreadCount, VerifyOtpRequest,
};

use crate::config::ClientConfig;
use crate::error::ClientError;

/// Typed HTTP client for the mingle server. Cheap to clone; clones share the
/// bearer token.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn set_token(&self, token: Option<String>) {
        if let Ok(mut slot) = self.token.write() {
            *slot = token;
        }
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|t| t.clone())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.http.request(method, format!("{}{}", self.base_url, path));
        match self.token() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn check(res: Response) -> Result<Response, ClientError> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let bytes = res.bytes().await?;
        let message = serde_json::from_slice::<ErrorBody>(&bytes)
            .map(|b| b.error)
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("request failed").to_string());
        Err(ClientError::Api { status, message })
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let res = Self::check(req.send().await?).await?;
        let bytes = res.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn send_empty(&self, req: RequestBuilder) -> Result<(), ClientError> {
        Self::check(req.send().await?).await?;
        Ok(())
    }

    // -- Auth --

    pub async fn request_otp(&self, email: &str) -> Result<(), ClientError> {
        let body = RequestOtpRequest { email: email.to_string() };
        self.send_empty(self.request(Method::POST, "/auth/otp").json(&body)).await
    }

    /// Finish sign-up. The returned token is stored on the client.
    pub async fn verify_otp(&self, req: &VerifyOtpRequest) -> Result<AuthResponse, ClientError> {
        let auth: AuthResponse = self.send(self.request(Method::POST, "/auth/verify").json(req)).await?;
        self.set_token(Some(auth.token.clone()));
        Ok(auth)
    }

    /// Sign in. The returned token is stored on the client.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let auth: AuthResponse = self.send(self.request(Method::POST, "/auth/login").json(&body)).await?;
        self.set_token(Some(auth.token.clone()));
        Ok(auth)
    }

    pub async fn me(&self) -> Result<Profile, ClientError> {
        self.send(self.request(Method::GET, "/auth/me")).await
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        self.send_empty(self.request(Method::POST, "/auth/logout")).await
    }

    // -- Stranger chat --

    pub async fn find_match(&self, interests: &[String]) -> Result<ChatSessionView, ClientError> {
        let body = MatchRequest {
            interests: interests.to_vec(),
        };
        self.send(self.request(Method::POST, "/chat/match").json(&body)).await
    }

    pub async fn session(&self, session_id: Uuid) -> Result<SessionDetail, ClientError> {
        self.send(self.request(Method::GET, &format!("/chat/sessions/{session_id}")))
            .await
    }

    pub async fn messages(&self, session_id: Uuid) -> Result<ChatPoll, ClientError> {
        self.send(self.request(Method::GET, &format!("/chat/sessions/{session_id}/messages")))
            .await
    }

    pub async fn send_message(&self, session_id: Uuid, content: &str) -> Result<MessageView, ClientError> {
        let body = SendMessageRequest {
            content: content.to_string(),
            message_type: None,
        };
        self.send(
            self.request(Method::POST, &format!("/chat/sessions/{session_id}/messages"))
                .json(&body),
        )
        .await
    }

    pub async fn end_session(&self, session_id: Uuid) -> Result<ChatSessionView, ClientError> {
        self.send(self.request(Method::POST, &format!("/chat/sessions/{session_id}/end")))
            .await
    }

    pub async fn history(&self) -> Result<Vec<HistoryEntry>, ClientError> {
        self.send(self.request(Method::GET, "/chat/history")).await
    }

    // -- Friends --

    pub async fn friends(&self) -> Result<Vec<FriendView>, ClientError> {
        self.send(self.request(Method::GET, "/friends")).await
    }

    pub async fn friend_requests(&self) -> Result<FriendRequests, ClientError> {
        self.send(self.request(Method::GET, "/friends/requests")).await
    }

    pub async fn send_friend_request(&self, receiver_id: Uuid) -> Result<FriendRequestView, ClientError> {
        let body = SendFriendRequest { receiver_id };
        self.send(self.request(Method::POST, "/friends/requests").json(&body))
            .await
    }

    pub async fn accept_request(&self, request_id: Uuid) -> Result<Friendship, ClientError> {
        self.send(self.request(Method::POST, &format!("/friends/requests/{request_id}/accept")))
            .await
    }

    pub async fn reject_request(&self, request_id: Uuid) -> Result<FriendRequestView, ClientError> {
        self.send(self.request(Method::POST, &format!("/friends/requests/{request_id}/reject")))
            .await
    }

    pub async fn chat_with_friend(&self, friend_id: Uuid) -> Result<ChatSessionView, ClientError> {
        self.send(self.request(Method::POST, &format!("/friends/{friend_id}/chat")))
            .await
    }

    // -- Direct messages --

    pub async fn conversation(&self, friend_id: Uuid) -> Result<Vec<DirectMessageView>, ClientError> {
        self.send(self.request(Method::GET, &format!("/dm/{friend_id}"))).await
    }

    pub async fn send_direct(&self, friend_id: Uuid, content: &str) -> Result<DirectMessageView, ClientError> {
        let body = SendDirectMessageRequest {
            content: content.to_string(),
        };
        self.send(self.request(Method::POST, &format!("/dm/{friend_id}")).json(&body))
            .await
    }

    // -- Notifications --

    pub async fn notifications(&self) -> Result<Vec<NotificationView>, ClientError> {
        self.send(self.request(Method::GET, "/notifications")).await
    }

    pub async fn unread_count(&self) -> Result<u64, ClientError> {
        let count: UnreadCount = self
            .send(self.request(Method::GET, "/notifications/unread-count"))
            .await?;
        Ok(count.count)
    }

    pub async fn mark_notifications_read(&self) -> Result<(), ClientError> {
        self.send_empty(self.request(Method::POST, "/notifications/read"))
            .await
    }

    // -- Posts and search --

    pub async fn feed(&self, tag: Option<&str>) -> Result<Vec<PostView>, ClientError> {
        let mut req = self.request(Method::GET, "/posts");
        if let Some(tag) = tag {
            req = req.query(&[("tag", tag)]);
        }
        self.send(req).await
    }

    pub async fn create_post(&self, post: &CreatePostRequest) -> Result<PostView, ClientError> {
        self.send(self.request(Method::POST, "/posts").json(post)).await
    }

    pub async fn search(&self, q: &str) -> Result<SearchResults, ClientError> {
        self.send(self.request(Method::GET, "/search").query(&[("q", q)]))
            .await
    }
}
