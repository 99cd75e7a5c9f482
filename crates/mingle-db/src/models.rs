/// Database row types. These map directly to SQLite rows (and the joins
/// built on them) and stay distinct from mingle-types API models to keep the
/// DB layer independent. Timestamps and enum columns are raw text here.

pub struct ProfileRow {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub anonymous_name: String,
    pub avatar_color: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub banner_url: Option<String>,
    pub is_public: bool,
    pub interests: Vec<String>,
    pub is_online: bool,
    pub last_seen: Option<String>,
    pub created_at: String,
}

/// Profile columns embedded in joined rows.
#[derive(Debug, Clone)]
pub struct AuthorRow {
    pub id: String,
    pub username: String,
    pub anonymous_name: String,
    pub avatar_color: String,
    pub avatar_url: Option<String>,
    pub is_online: bool,
}

pub struct NewProfile<'a> {
    pub id: &'a str,
    pub email: &'a str,
    pub username: &'a str,
    pub password_hash: &'a str,
    pub anonymous_name: &'a str,
    pub avatar_color: &'a str,
}

/// Partial update; `None` leaves a column unchanged.
#[derive(Default)]
pub struct ProfileChanges {
    pub anonymous_name: Option<String>,
    pub avatar_color: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub banner_url: Option<String>,
    pub is_public: Option<bool>,
    pub interests: Option<Vec<String>>,
}

pub struct OtpRow {
    pub email: String,
    pub code_hash: String,
    pub expires_at: String,
    pub attempts: u32,
}

pub struct PostRow {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
    pub community_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub author: AuthorRow,
    pub like_count: i64,
    pub comment_count: i64,
    pub liked: bool,
    pub saved: bool,
}

pub struct NewPost<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub content: &'a str,
    pub image_url: Option<&'a str>,
    pub tags: &'a [String],
    pub community_id: Option<&'a str>,
}

pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub content: String,
    pub created_at: String,
    pub author: AuthorRow,
}

pub struct CommunityRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub banner_url: Option<String>,
    pub is_private: bool,
    pub tags: Vec<String>,
    pub created_at: String,
    pub creator: AuthorRow,
    pub member_count: i64,
    /// Role of the viewing user, `None` when not a member.
    pub viewer_role: Option<String>,
}

pub struct NewCommunity<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub avatar_url: Option<&'a str>,
    pub banner_url: Option<&'a str>,
    pub is_private: bool,
    pub created_by: &'a str,
    pub tags: &'a [String],
}

#[derive(Debug, Clone)]
pub struct ChatSessionRow {
    pub id: String,
    pub user1_id: String,
    pub user2_id: String,
    pub status: String,
    pub created_at: String,
    pub ended_at: Option<String>,
}

impl ChatSessionRow {
    pub fn involves(&self, user_id: &str) -> bool {
        self.user1_id == user_id || self.user2_id == user_id
    }

    /// The participant that is not `user_id`.
    pub fn other(&self, user_id: &str) -> &str {
        if self.user1_id == user_id { &self.user2_id } else { &self.user1_id }
    }
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub session_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_color: String,
    pub content: String,
    pub message_type: String,
    pub sent_at: String,
}

/// An online profile considered by stranger matching.
#[derive(Debug, Clone)]
pub struct CandidateRow {
    pub id: String,
    pub interests: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FriendRow {
    pub id: String,
    pub user1_id: String,
    pub user2_id: String,
    pub created_at: String,
}

pub struct FriendWithProfileRow {
    pub friendship: FriendRow,
    pub friend: AuthorRow,
}

pub struct FriendRequestRow {
    pub id: String,
    pub sender: AuthorRow,
    pub receiver: AuthorRow,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct DirectMessageRow {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub is_read: bool,
    pub created_at: String,
}

pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: String,
}

pub struct NewNotification<'a> {
    pub user_id: &'a str,
    pub kind: &'a str,
    pub title: &'a str,
    pub message: &'a str,
    pub link: Option<&'a str>,
}
