use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE user_profiles (
                id              TEXT PRIMARY KEY,
                email           TEXT NOT NULL UNIQUE,
                username        TEXT NOT NULL UNIQUE,
                password        TEXT NOT NULL,
                anonymous_name  TEXT NOT NULL,
                avatar_color    TEXT NOT NULL,
                avatar_url      TEXT,
                bio             TEXT,
                banner_url      TEXT,
                is_public       INTEGER NOT NULL DEFAULT 1,
                interests       TEXT NOT NULL DEFAULT '[]',
                is_online       INTEGER NOT NULL DEFAULT 0,
                last_seen       TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_profiles_online ON user_profiles(is_online, last_seen);

            CREATE TABLE otp_codes (
                email       TEXT PRIMARY KEY,
                code_hash   TEXT NOT NULL,
                expires_at  TEXT NOT NULL,
                attempts    INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE communities (
                id           TEXT PRIMARY KEY,
                name         TEXT NOT NULL UNIQUE,
                description  TEXT,
                avatar_url   TEXT,
                banner_url   TEXT,
                is_private   INTEGER NOT NULL DEFAULT 0,
                created_by   TEXT NOT NULL REFERENCES user_profiles(id),
                tags         TEXT NOT NULL DEFAULT '[]',
                created_at   TEXT NOT NULL
            );

            CREATE TABLE community_members (
                id            TEXT PRIMARY KEY,
                community_id  TEXT NOT NULL REFERENCES communities(id) ON DELETE CASCADE,
                user_id       TEXT NOT NULL REFERENCES user_profiles(id),
                role          TEXT NOT NULL CHECK (role IN ('admin', 'moderator', 'member')),
                joined_at     TEXT NOT NULL,
                UNIQUE(community_id, user_id)
            );

            CREATE TABLE posts (
                id            TEXT PRIMARY KEY,
                user_id       TEXT NOT NULL REFERENCES user_profiles(id),
                content       TEXT NOT NULL,
                image_url     TEXT,
                tags          TEXT NOT NULL DEFAULT '[]',
                community_id  TEXT REFERENCES communities(id) ON DELETE CASCADE,
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            );

            CREATE INDEX idx_posts_created ON posts(created_at);
            CREATE INDEX idx_posts_user ON posts(user_id, created_at);
            CREATE INDEX idx_posts_community ON posts(community_id, created_at);

            CREATE TABLE comments (
                id          TEXT PRIMARY KEY,
                post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES user_profiles(id),
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_comments_post ON comments(post_id, created_at);

            CREATE TABLE likes (
                id          TEXT PRIMARY KEY,
                post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES user_profiles(id),
                created_at  TEXT NOT NULL,
                UNIQUE(post_id, user_id)
            );

            CREATE TABLE saved_posts (
                id        TEXT PRIMARY KEY,
                post_id   TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                user_id   TEXT NOT NULL REFERENCES user_profiles(id),
                saved_at  TEXT NOT NULL,
                UNIQUE(post_id, user_id)
            );

            CREATE TABLE follows (
                id            TEXT PRIMARY KEY,
                follower_id   TEXT NOT NULL REFERENCES user_profiles(id),
                following_id  TEXT NOT NULL REFERENCES user_profiles(id),
                created_at    TEXT NOT NULL,
                UNIQUE(follower_id, following_id),
                CHECK (follower_id <> following_id)
            );

            CREATE TABLE chat_sessions (
                id          TEXT PRIMARY KEY,
                user1_id    TEXT NOT NULL REFERENCES user_profiles(id),
                user2_id    TEXT NOT NULL REFERENCES user_profiles(id),
                status      TEXT NOT NULL CHECK (status IN ('active', 'ended')),
                created_at  TEXT NOT NULL,
                ended_at    TEXT
            );

            CREATE INDEX idx_sessions_status ON chat_sessions(status);

            CREATE TABLE messages (
                id            TEXT PRIMARY KEY,
                session_id    TEXT NOT NULL REFERENCES chat_sessions(id) ON DELETE CASCADE,
                sender_id     TEXT NOT NULL REFERENCES user_profiles(id),
                content       TEXT NOT NULL,
                message_type  TEXT NOT NULL CHECK (message_type IN ('text', 'image', 'system')),
                sent_at       TEXT NOT NULL
            );

            CREATE INDEX idx_messages_session ON messages(session_id, sent_at);

            CREATE TABLE friends (
                id          TEXT PRIMARY KEY,
                user1_id    TEXT NOT NULL REFERENCES user_profiles(id),
                user2_id    TEXT NOT NULL REFERENCES user_profiles(id),
                created_at  TEXT NOT NULL,
                UNIQUE(user1_id, user2_id),
                CHECK (user1_id < user2_id)
            );

            CREATE TABLE friend_requests (
                id           TEXT PRIMARY KEY,
                sender_id    TEXT NOT NULL REFERENCES user_profiles(id),
                receiver_id  TEXT NOT NULL REFERENCES user_profiles(id),
                status       TEXT NOT NULL CHECK (status IN ('pending', 'accepted', 'rejected')),
                created_at   TEXT NOT NULL,
                updated_at   TEXT NOT NULL
            );

            CREATE INDEX idx_requests_receiver ON friend_requests(receiver_id, status);
            CREATE INDEX idx_requests_sender ON friend_requests(sender_id, status);

            CREATE TABLE notifications (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES user_profiles(id),
                kind        TEXT NOT NULL,
                title       TEXT NOT NULL,
                message     TEXT NOT NULL,
                link        TEXT,
                is_read     INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_user ON notifications(user_id, is_read);

            CREATE TABLE direct_messages (
                id           TEXT PRIMARY KEY,
                sender_id    TEXT NOT NULL REFERENCES user_profiles(id),
                receiver_id  TEXT NOT NULL REFERENCES user_profiles(id),
                content      TEXT NOT NULL,
                is_read      INTEGER NOT NULL DEFAULT 0,
                created_at   TEXT NOT NULL
            );

            CREATE INDEX idx_dm_pair ON direct_messages(sender_id, receiver_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
