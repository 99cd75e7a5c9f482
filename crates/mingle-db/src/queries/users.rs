use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::models::{AuthorRow, CandidateRow, NewProfile, OtpRow, ProfileChanges, ProfileRow};
use crate::now;
use crate::queries::{author_at, author_cols, encode_list, like_pattern, list_at};

const PROFILE_COLS: &str = "id, email, username, password, anonymous_name, avatar_color, avatar_url, \
     bio, banner_url, is_public, interests, is_online, last_seen, created_at";

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<ProfileRow> {
    Ok(ProfileRow {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        password: row.get(3)?,
        anonymous_name: row.get(4)?,
        avatar_color: row.get(5)?,
        avatar_url: row.get(6)?,
        bio: row.get(7)?,
        banner_url: row.get(8)?,
        is_public: row.get(9)?,
        interests: list_at(row, 10)?,
        is_online: row.get(11)?,
        last_seen: row.get(12)?,
        created_at: row.get(13)?,
    })
}

// -- Profiles --

pub fn insert_profile(conn: &Connection, p: &NewProfile<'_>) -> Result<()> {
    conn.execute(
        "INSERT INTO user_profiles (id, email, username, password, anonymous_name, avatar_color, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![p.id, p.email, p.username, p.password_hash, p.anonymous_name, p.avatar_color, now()],
    )?;
    Ok(())
}

pub fn profile_by_id(conn: &Connection, id: &str) -> Result<Option<ProfileRow>> {
    let sql = format!("SELECT {PROFILE_COLS} FROM user_profiles WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], profile_from_row).optional()?)
}

pub fn profile_by_email(conn: &Connection, email: &str) -> Result<Option<ProfileRow>> {
    let sql = format!("SELECT {PROFILE_COLS} FROM user_profiles WHERE email = ?1 COLLATE NOCASE");
    Ok(conn.query_row(&sql, [email], profile_from_row).optional()?)
}

pub fn author_by_id(conn: &Connection, id: &str) -> Result<Option<AuthorRow>> {
    let sql = format!("SELECT {} FROM user_profiles u WHERE u.id = ?1", author_cols("u"));
    Ok(conn.query_row(&sql, [id], |row| author_at(row, 0)).optional()?)
}

pub fn exists(conn: &Connection, id: &str) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM user_profiles WHERE id = ?1)",
        [id],
        |r| r.get(0),
    )?)
}

pub fn username_taken(conn: &Connection, username: &str) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM user_profiles WHERE username = ?1 COLLATE NOCASE)",
        [username],
        |r| r.get(0),
    )?)
}

pub fn email_taken(conn: &Connection, email: &str) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM user_profiles WHERE email = ?1 COLLATE NOCASE)",
        [email],
        |r| r.get(0),
    )?)
}

/// Apply the non-`None` fields of `changes`.
pub fn update_profile(conn: &Connection, id: &str, changes: &ProfileChanges) -> Result<()> {
    let interests = changes.interests.as_deref().map(encode_list).transpose()?;
    conn.execute(
        "UPDATE user_profiles SET
            anonymous_name = COALESCE(?2, anonymous_name),
            avatar_color   = COALESCE(?3, avatar_color),
            avatar_url     = COALESCE(?4, avatar_url),
            bio            = COALESCE(?5, bio),
            banner_url     = COALESCE(?6, banner_url),
            is_public      = COALESCE(?7, is_public),
            interests      = COALESCE(?8, interests)
         WHERE id = ?1",
        params![
            id,
            changes.anonymous_name,
            changes.avatar_color,
            changes.avatar_url,
            changes.bio,
            changes.banner_url,
            changes.is_public,
            interests,
        ],
    )?;
    Ok(())
}

pub fn set_interests(conn: &Connection, id: &str, interests: &[String]) -> Result<()> {
    conn.execute(
        "UPDATE user_profiles SET interests = ?2 WHERE id = ?1",
        params![id, encode_list(interests)?],
    )?;
    Ok(())
}

/// Flip the presence flag. `last_seen` is refreshed either way.
pub fn set_online(conn: &Connection, id: &str, online: bool) -> Result<()> {
    conn.execute(
        "UPDATE user_profiles SET is_online = ?2, last_seen = ?3 WHERE id = ?1",
        params![id, online, now()],
    )?;
    Ok(())
}

/// Online profiles other than `exclude_id`, longest-waiting first. The
/// `id` tiebreak keeps the order total.
pub fn online_candidates(conn: &Connection, exclude_id: &str) -> Result<Vec<CandidateRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, interests FROM user_profiles
         WHERE is_online = 1 AND id <> ?1
         ORDER BY last_seen ASC, id ASC",
    )?;
    let rows = stmt
        .query_map([exclude_id], |row| {
            Ok(CandidateRow {
                id: row.get(0)?,
                interests: list_at(row, 1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn search_profiles(conn: &Connection, needle: &str, limit: u32) -> Result<Vec<AuthorRow>> {
    let sql = format!(
        "SELECT {} FROM user_profiles u
         WHERE u.username LIKE ?1 ESCAPE '\\' OR u.email LIKE ?1 ESCAPE '\\'
         ORDER BY u.username ASC
         LIMIT ?2",
        author_cols("u")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![like_pattern(needle), limit], |row| author_at(row, 0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// -- One-time codes --

/// Store a fresh code for `email`, replacing any earlier one.
pub fn upsert_otp(conn: &Connection, email: &str, code_hash: &str, expires_at: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO otp_codes (email, code_hash, expires_at, attempts) VALUES (?1, ?2, ?3, 0)
         ON CONFLICT(email) DO UPDATE SET code_hash = excluded.code_hash,
                                          expires_at = excluded.expires_at,
                                          attempts = 0",
        params![email, code_hash, expires_at],
    )?;
    Ok(())
}

pub fn otp_for(conn: &Connection, email: &str) -> Result<Option<OtpRow>> {
    Ok(conn
        .query_row(
            "SELECT email, code_hash, expires_at, attempts FROM otp_codes WHERE email = ?1",
            [email],
            |row| {
                Ok(OtpRow {
                    email: row.get(0)?,
                    code_hash: row.get(1)?,
                    expires_at: row.get(2)?,
                    attempts: row.get(3)?,
                })
            },
        )
        .optional()?)
}

pub fn bump_otp_attempts(conn: &Connection, email: &str) -> Result<()> {
    conn.execute("UPDATE otp_codes SET attempts = attempts + 1 WHERE email = ?1", [email])?;
    Ok(())
}

pub fn delete_otp(conn: &Connection, email: &str) -> Result<()> {
    conn.execute("DELETE FROM otp_codes WHERE email = ?1", [email])?;
    Ok(())
}
