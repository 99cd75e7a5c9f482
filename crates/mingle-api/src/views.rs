//! Row to API model conversions. Rows keep ids, timestamps and enum columns as
//! text; a value that fails to parse here means the database holds something
//! this build never wrote, so every conversion is fallible.

use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use mingle_db::models::{
    AuthorRow, ChatSessionRow, CommentRow, CommunityRow, DirectMessageRow, FriendRequestRow, FriendRow,
    FriendWithProfileRow, MessageRow, NotificationRow, PostRow, ProfileRow,
};
use mingle_types::api::{
    ChatSessionView, CommentView, CommunityView, DirectMessageView, FriendRequestView, FriendView, Friendship,
    MessageView, NotificationView, PostView, Profile, UserSummary,
};

pub fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse().with_context(|| format!("bad stored id '{raw}'"))
}

pub fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse().with_context(|| format!("bad stored timestamp '{raw}'"))
}

fn parse_opt_ts(raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    raw.map(parse_ts).transpose()
}

fn parse_enum<T>(raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(raw.parse()?)
}

fn parse_opt_id(raw: Option<&str>) -> Result<Option<Uuid>> {
    raw.map(parse_id).transpose()
}

pub fn summary(row: &AuthorRow) -> Result<UserSummary> {
    Ok(UserSummary {
        id: parse_id(&row.id)?,
        username: row.username.clone(),
        anonymous_name: row.anonymous_name.clone(),
        avatar_color: row.avatar_color.clone(),
        avatar_url: row.avatar_url.clone(),
        is_online: row.is_online,
    })
}

/// `include_email` is set only when the caller is looking at their own profile.
pub fn profile(row: ProfileRow, include_email: bool) -> Result<Profile> {
    Ok(Profile {
        id: parse_id(&row.id)?,
        email: include_email.then_some(row.email),
        username: row.username,
        anonymous_name: row.anonymous_name,
        avatar_color: row.avatar_color,
        avatar_url: row.avatar_url,
        bio: row.bio,
        banner_url: row.banner_url,
        is_public: row.is_public,
        interests: row.interests,
        is_online: row.is_online,
        last_seen: parse_opt_ts(row.last_seen.as_deref())?,
        created_at: parse_ts(&row.created_at)?,
    })
}

pub fn post(row: PostRow) -> Result<PostView> {
    Ok(PostView {
        id: parse_id(&row.id)?,
        author: summary(&row.author)?,
        content: row.content,
        image_url: row.image_url,
        tags: row.tags,
        community_id: parse_opt_id(row.community_id.as_deref())?,
        created_at: parse_ts(&row.created_at)?,
        updated_at: parse_ts(&row.updated_at)?,
        like_count: row.like_count as u64,
        comment_count: row.comment_count as u64,
        liked: row.liked,
        saved: row.saved,
    })
}

pub fn posts(rows: Vec<PostRow>) -> Result<Vec<PostView>> {
    rows.into_iter().map(post).collect()
}

pub fn comment(row: CommentRow) -> Result<CommentView> {
    Ok(CommentView {
        id: parse_id(&row.id)?,
        post_id: parse_id(&row.post_id)?,
        author: summary(&row.author)?,
        content: row.content,
        created_at: parse_ts(&row.created_at)?,
    })
}

pub fn community(row: CommunityRow) -> Result<CommunityView> {
    let role = row.viewer_role.as_deref().map(parse_enum).transpose()?;
    Ok(CommunityView {
        id: parse_id(&row.id)?,
        name: row.name,
        description: row.description,
        avatar_url: row.avatar_url,
        banner_url: row.banner_url,
        is_private: row.is_private,
        tags: row.tags,
        creator: summary(&row.creator)?,
        created_at: parse_ts(&row.created_at)?,
        member_count: row.member_count as u64,
        is_member: role.is_some(),
        role,
    })
}

pub fn session(row: &ChatSessionRow) -> Result<ChatSessionView> {
    Ok(ChatSessionView {
        id: parse_id(&row.id)?,
        user1_id: parse_id(&row.user1_id)?,
        user2_id: parse_id(&row.user2_id)?,
        status: parse_enum(&row.status)?,
        created_at: parse_ts(&row.created_at)?,
        ended_at: parse_opt_ts(row.ended_at.as_deref())?,
    })
}

pub fn message(row: MessageRow) -> Result<MessageView> {
    Ok(MessageView {
        id: parse_id(&row.id)?,
        session_id: parse_id(&row.session_id)?,
        sender_id: parse_id(&row.sender_id)?,
        sender_name: row.sender_name,
        sender_color: row.sender_color,
        content: row.content,
        message_type: parse_enum(&row.message_type)?,
        sent_at: parse_ts(&row.sent_at)?,
    })
}

pub fn friendship(row: &FriendRow) -> Result<Friendship> {
    Ok(Friendship {
        id: parse_id(&row.id)?,
        user1_id: parse_id(&row.user1_id)?,
        user2_id: parse_id(&row.user2_id)?,
        created_at: parse_ts(&row.created_at)?,
    })
}

pub fn friend(row: FriendWithProfileRow) -> Result<FriendView> {
    Ok(FriendView {
        friendship_id: parse_id(&row.friendship.id)?,
        since: parse_ts(&row.friendship.created_at)?,
        friend: summary(&row.friend)?,
    })
}

pub fn friend_request(row: FriendRequestRow) -> Result<FriendRequestView> {
    Ok(FriendRequestView {
        id: parse_id(&row.id)?,
        sender: summary(&row.sender)?,
        receiver: summary(&row.receiver)?,
        status: parse_enum(&row.status)?,
        created_at: parse_ts(&row.created_at)?,
        updated_at: parse_ts(&row.updated_at)?,
    })
}

pub fn direct_message(row: DirectMessageRow) -> Result<DirectMessageView> {
    Ok(DirectMessageView {
        id: parse_id(&row.id)?,
        sender_id: parse_id(&row.sender_id)?,
        receiver_id: parse_id(&row.receiver_id)?,
        content: row.content,
        is_read: row.is_read,
        created_at: parse_ts(&row.created_at)?,
    })
}

pub fn notification(row: NotificationRow) -> Result<NotificationView> {
    Ok(NotificationView {
        id: parse_id(&row.id)?,
        kind: parse_enum(&row.kind)?,
        title: row.title,
        message: row.message,
        link: row.link,
        is_read: row.is_read,
        created_at: parse_ts(&row.created_at)?,
    })
}
