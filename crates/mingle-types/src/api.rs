use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    MemberRole, MessageType, NotificationKind, RequestStatus, SessionStatus,
};

// -- JWT Claims --

/// JWT claims shared by the API middleware and the client. Canonical
/// definition lives here so both sides agree on the token shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

// -- Auth --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestOtpRequest {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub code: String,
    pub password: String,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: Profile,
}

// -- Profiles --

/// Full profile. `email` is only present when the caller views their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub username: String,
    pub anonymous_name: String,
    pub avatar_color: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub banner_url: Option<String>,
    pub is_public: bool,
    pub interests: Vec<String>,
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The slice of a profile embedded in posts, requests and chat views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub anonymous_name: String,
    pub avatar_color: String,
    pub avatar_url: Option<String>,
    pub is_online: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileView {
    pub profile: Profile,
    pub post_count: u64,
    pub follower_count: u64,
    pub following_count: u64,
    pub is_following: bool,
    pub is_friend: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub anonymous_name: Option<String>,
    pub avatar_color: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub banner_url: Option<String>,
    pub is_public: Option<bool>,
    pub interests: Option<Vec<String>>,
}

/// Result of a toggle endpoint (like, save, follow, membership).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleResponse {
    pub active: bool,
}

// -- Posts --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    pub community_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    pub id: Uuid,
    pub author: UserSummary,
    pub content: String,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
    pub community_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub like_count: u64,
    pub comment_count: u64,
    pub liked: bool,
    pub saved: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCommentRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentView {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author: UserSummary,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendingTag {
    pub tag: String,
    pub count: u64,
}

// -- Communities --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCommunityRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    pub avatar_url: Option<String>,
    pub banner_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityView {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub banner_url: Option<String>,
    pub is_private: bool,
    pub tags: Vec<String>,
    pub creator: UserSummary,
    pub created_at: DateTime<Utc>,
    pub member_count: u64,
    pub is_member: bool,
    pub role: Option<MemberRole>,
}

// -- Stranger chat --

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchRequest {
    #[serde(default)]
    pub interests: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSessionView {
    pub id: Uuid,
    pub user1_id: Uuid,
    pub user2_id: Uuid,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// What the chat view shows around the message list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDetail {
    pub session: ChatSessionView,
    pub stranger: UserSummary,
    pub is_friend: bool,
    pub request_pending: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageView {
    pub id: Uuid,
    pub session_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub sender_color: String,
    pub content: String,
    pub message_type: MessageType,
    pub sent_at: DateTime<Utc>,
}

/// One poll of a chat session: its current status and the full message list,
/// oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatPoll {
    pub status: SessionStatus,
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default)]
    pub message_type: Option<MessageType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub session: ChatSessionView,
    pub stranger: Option<UserSummary>,
    pub last_message: Option<MessageView>,
}

// -- Friends --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friendship {
    pub id: Uuid,
    pub user1_id: Uuid,
    pub user2_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendView {
    pub friendship_id: Uuid,
    pub since: DateTime<Utc>,
    pub friend: UserSummary,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendFriendRequest {
    pub receiver_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRequestView {
    pub id: Uuid,
    pub sender: UserSummary,
    pub receiver: UserSummary,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRequests {
    pub received: Vec<FriendRequestView>,
    pub sent: Vec<FriendRequestView>,
}

// -- Direct messages --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectMessageView {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendDirectMessageRequest {
    pub content: String,
}

// -- Notifications --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationView {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UnreadCount {
    pub count: u64,
}

// -- Search --

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResults {
    pub users: Vec<UserSummary>,
    pub posts: Vec<PostView>,
    pub communities: Vec<CommunityView>,
}
