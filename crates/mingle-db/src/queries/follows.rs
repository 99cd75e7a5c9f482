use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

use crate::now;

/// Toggle a follow: removes if it exists, inserts if not.
/// Returns true when `follower_id` now follows `following_id`.
pub fn toggle_follow(conn: &Connection, id: &str, follower_id: &str, following_id: &str) -> Result<bool> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM follows WHERE follower_id = ?1 AND following_id = ?2",
            params![follower_id, following_id],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(existing_id) = existing {
        conn.execute("DELETE FROM follows WHERE id = ?1", [&existing_id])?;
        Ok(false)
    } else {
        conn.execute(
            "INSERT INTO follows (id, follower_id, following_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, follower_id, following_id, now()],
        )?;
        Ok(true)
    }
}

pub fn is_following(conn: &Connection, follower_id: &str, following_id: &str) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ?1 AND following_id = ?2)",
        params![follower_id, following_id],
        |r| r.get(0),
    )?)
}

pub fn follower_count(conn: &Connection, user_id: &str) -> Result<u64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM follows WHERE following_id = ?1", [user_id], |r| r.get(0))?)
}

pub fn following_count(conn: &Connection, user_id: &str) -> Result<u64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM follows WHERE follower_id = ?1", [user_id], |r| r.get(0))?)
}
