use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

use mingle_types::models::canonical_pair;

use crate::models::{FriendRequestRow, FriendRow, FriendWithProfileRow};
use crate::now;
use crate::queries::{AUTHOR_COL_COUNT, author_at, author_cols};

fn friend_from_row(row: &Row<'_>) -> rusqlite::Result<FriendRow> {
    Ok(FriendRow {
        id: row.get(0)?,
        user1_id: row.get(1)?,
        user2_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

// -- Friendships --

/// Insert a friendship between `a` and `b`, stored lower id first.
pub fn insert_friendship(conn: &Connection, id: &str, a: &str, b: &str) -> Result<FriendRow> {
    let (user1, user2) = canonical_pair(a, b);
    let ts = now();
    conn.execute(
        "INSERT INTO friends (id, user1_id, user2_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![id, user1, user2, ts],
    )?;
    Ok(FriendRow {
        id: id.to_string(),
        user1_id: user1.to_string(),
        user2_id: user2.to_string(),
        created_at: ts,
    })
}

/// Symmetric lookup: `(a, b)` and `(b, a)` return the same row.
pub fn friendship_between(conn: &Connection, a: &str, b: &str) -> Result<Option<FriendRow>> {
    let (user1, user2) = canonical_pair(a, b);
    Ok(conn
        .query_row(
            "SELECT id, user1_id, user2_id, created_at FROM friends WHERE user1_id = ?1 AND user2_id = ?2",
            params![user1, user2],
            friend_from_row,
        )
        .optional()?)
}

pub fn are_friends(conn: &Connection, a: &str, b: &str) -> Result<bool> {
    Ok(friendship_between(conn, a, b)?.is_some())
}

/// Friends of `user_id` with the other side's profile, newest first.
pub fn friends_of(conn: &Connection, user_id: &str) -> Result<Vec<FriendWithProfileRow>> {
    let sql = format!(
        "SELECT f.id, f.user1_id, f.user2_id, f.created_at, {}
         FROM friends f
         JOIN user_profiles u
           ON u.id = CASE WHEN f.user1_id = ?1 THEN f.user2_id ELSE f.user1_id END
         WHERE f.user1_id = ?1 OR f.user2_id = ?1
         ORDER BY f.created_at DESC",
        author_cols("u")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([user_id], |row| {
            Ok(FriendWithProfileRow {
                friendship: friend_from_row(row)?,
                friend: author_at(row, 4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// -- Requests --

fn request_select() -> String {
    format!(
        "SELECT r.id, r.status, r.created_at, r.updated_at, {}, {}
         FROM friend_requests r
         JOIN user_profiles s ON s.id = r.sender_id
         JOIN user_profiles v ON v.id = r.receiver_id",
        author_cols("s"),
        author_cols("v")
    )
}

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<FriendRequestRow> {
    Ok(FriendRequestRow {
        id: row.get(0)?,
        status: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
        sender: author_at(row, 4)?,
        receiver: author_at(row, 4 + AUTHOR_COL_COUNT)?,
    })
}

pub fn insert_request(conn: &Connection, id: &str, sender_id: &str, receiver_id: &str) -> Result<()> {
    let ts = now();
    conn.execute(
        "INSERT INTO friend_requests (id, sender_id, receiver_id, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'pending', ?4, ?4)",
        params![id, sender_id, receiver_id, ts],
    )?;
    Ok(())
}

pub fn request_by_id(conn: &Connection, id: &str) -> Result<Option<FriendRequestRow>> {
    let sql = format!("{} WHERE r.id = ?1", request_select());
    Ok(conn.query_row(&sql, [id], request_from_row).optional()?)
}

pub fn set_request_status(conn: &Connection, id: &str, status: &str) -> Result<()> {
    conn.execute(
        "UPDATE friend_requests SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, status, now()],
    )?;
    Ok(())
}

/// A pending request from `sender_id` to `receiver_id` (one direction only).
pub fn pending_from(conn: &Connection, sender_id: &str, receiver_id: &str) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM friend_requests
                       WHERE sender_id = ?1 AND receiver_id = ?2 AND status = 'pending')",
        params![sender_id, receiver_id],
        |r| r.get(0),
    )?)
}

/// A pending request between the two users in either direction.
pub fn pending_between(conn: &Connection, a: &str, b: &str) -> Result<bool> {
    Ok(pending_from(conn, a, b)? || pending_from(conn, b, a)?)
}

pub fn received_pending(conn: &Connection, user_id: &str) -> Result<Vec<FriendRequestRow>> {
    let sql = format!(
        "{} WHERE r.receiver_id = ?1 AND r.status = 'pending' ORDER BY r.created_at DESC",
        request_select()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([user_id], request_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn sent_pending(conn: &Connection, user_id: &str) -> Result<Vec<FriendRequestRow>> {
    let sql = format!(
        "{} WHERE r.sender_id = ?1 AND r.status = 'pending' ORDER BY r.created_at DESC",
        request_select()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([user_id], request_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::queries::testutil::profile;

    #[test]
    fn friendship_is_canonical_and_symmetric() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn_mut(|conn| {
            profile(conn, "a", "ana");
            profile(conn, "b", "ben");
            let row = insert_friendship(conn, "f1", "b", "a")?;
            assert_eq!((row.user1_id.as_str(), row.user2_id.as_str()), ("a", "b"));

            let ab = friendship_between(conn, "a", "b")?.unwrap();
            let ba = friendship_between(conn, "b", "a")?.unwrap();
            assert_eq!(ab.id, "f1");
            assert_eq!(ba.id, "f1");

            // Reversed insert hits the same unique pair.
            assert!(insert_friendship(conn, "f2", "a", "b").is_err());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn friends_of_returns_the_other_side() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn_mut(|conn| {
            profile(conn, "a", "ana");
            profile(conn, "b", "ben");
            profile(conn, "c", "cy");
            insert_friendship(conn, "f1", "a", "b")?;
            insert_friendship(conn, "f2", "c", "b")?;

            let mut names: Vec<String> = friends_of(conn, "b")?.into_iter().map(|f| f.friend.username).collect();
            names.sort();
            assert_eq!(names, vec!["ana", "cy"]);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn pending_lists_split_by_direction() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn_mut(|conn| {
            profile(conn, "a", "ana");
            profile(conn, "b", "ben");
            insert_request(conn, "r1", "a", "b")?;

            assert!(pending_from(conn, "a", "b")?);
            assert!(!pending_from(conn, "b", "a")?);
            assert!(pending_between(conn, "b", "a")?);

            assert_eq!(received_pending(conn, "b")?.len(), 1);
            assert_eq!(sent_pending(conn, "a")?.len(), 1);
            assert!(received_pending(conn, "a")?.is_empty());

            set_request_status(conn, "r1", "rejected")?;
            assert!(received_pending(conn, "b")?.is_empty());
            let row = request_by_id(conn, "r1")?.unwrap();
            assert_eq!(row.status, "rejected");
            assert_eq!(row.sender.username, "ana");
            assert_eq!(row.receiver.username, "ben");
            Ok(())
        })
        .unwrap();
    }
}
