use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::models::{ChatSessionRow, MessageRow};
use crate::now;

const SESSION_COLS: &str = "id, user1_id, user2_id, status, created_at, ended_at";

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<ChatSessionRow> {
    Ok(ChatSessionRow {
        id: row.get(0)?,
        user1_id: row.get(1)?,
        user2_id: row.get(2)?,
        status: row.get(3)?,
        created_at: row.get(4)?,
        ended_at: row.get(5)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        session_id: row.get(1)?,
        sender_id: row.get(2)?,
        sender_name: row.get::<_, Option<String>>(3)?.unwrap_or_else(|| "unknown".to_string()),
        sender_color: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        content: row.get(5)?,
        message_type: row.get(6)?,
        sent_at: row.get(7)?,
    })
}

// -- Sessions --

pub fn insert_session(conn: &Connection, id: &str, user1_id: &str, user2_id: &str) -> Result<ChatSessionRow> {
    let ts = now();
    conn.execute(
        "INSERT INTO chat_sessions (id, user1_id, user2_id, status, created_at) VALUES (?1, ?2, ?3, 'active', ?4)",
        params![id, user1_id, user2_id, ts],
    )?;
    Ok(ChatSessionRow {
        id: id.to_string(),
        user1_id: user1_id.to_string(),
        user2_id: user2_id.to_string(),
        status: "active".to_string(),
        created_at: ts,
        ended_at: None,
    })
}

pub fn session_by_id(conn: &Connection, id: &str) -> Result<Option<ChatSessionRow>> {
    let sql = format!("SELECT {SESSION_COLS} FROM chat_sessions WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], session_from_row).optional()?)
}

pub fn active_sessions(conn: &Connection) -> Result<Vec<ChatSessionRow>> {
    let sql = format!("SELECT {SESSION_COLS} FROM chat_sessions WHERE status = 'active'");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], session_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// An active session between the two users, in either seat order.
pub fn active_session_between(conn: &Connection, a: &str, b: &str) -> Result<Option<ChatSessionRow>> {
    let sql = format!(
        "SELECT {SESSION_COLS} FROM chat_sessions
         WHERE status = 'active'
           AND ((user1_id = ?1 AND user2_id = ?2) OR (user1_id = ?2 AND user2_id = ?1))
         ORDER BY created_at ASC
         LIMIT 1"
    );
    Ok(conn.query_row(&sql, params![a, b], session_from_row).optional()?)
}

/// Mark a session ended. Returns false when it was not active.
pub fn end_session(conn: &Connection, id: &str) -> Result<bool> {
    Ok(conn.execute(
        "UPDATE chat_sessions SET status = 'ended', ended_at = ?2 WHERE id = ?1 AND status = 'active'",
        params![id, now()],
    )? > 0)
}

/// Every session the user took part in, newest first.
pub fn sessions_for_user(conn: &Connection, user_id: &str) -> Result<Vec<ChatSessionRow>> {
    let sql = format!(
        "SELECT {SESSION_COLS} FROM chat_sessions
         WHERE user1_id = ?1 OR user2_id = ?1
         ORDER BY created_at DESC, rowid DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([user_id], session_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// -- Messages --

pub fn insert_message(
    conn: &Connection,
    id: &str,
    session_id: &str,
    sender_id: &str,
    content: &str,
    message_type: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO messages (id, session_id, sender_id, content, message_type, sent_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id, session_id, sender_id, content, message_type, now()],
    )?;
    Ok(())
}

const MESSAGE_SELECT: &str = "SELECT m.id, m.session_id, m.sender_id, u.anonymous_name, u.avatar_color,
        m.content, m.message_type, m.sent_at
     FROM messages m
     LEFT JOIN user_profiles u ON u.id = m.sender_id";

/// Full message list of a session, oldest first.
pub fn messages_for_session(conn: &Connection, session_id: &str) -> Result<Vec<MessageRow>> {
    let sql = format!("{MESSAGE_SELECT} WHERE m.session_id = ?1 ORDER BY m.sent_at ASC, m.rowid ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([session_id], message_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn message_by_id(conn: &Connection, id: &str) -> Result<Option<MessageRow>> {
    let sql = format!("{MESSAGE_SELECT} WHERE m.id = ?1");
    Ok(conn.query_row(&sql, [id], message_from_row).optional()?)
}

/// Latest user-written text message, skipping system notices.
pub fn last_text_message(conn: &Connection, session_id: &str) -> Result<Option<MessageRow>> {
    let sql = format!(
        "{MESSAGE_SELECT} WHERE m.session_id = ?1 AND m.message_type = 'text'
         ORDER BY m.sent_at DESC, m.rowid DESC
         LIMIT 1"
    );
    Ok(conn.query_row(&sql, [session_id], message_from_row).optional()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::queries::testutil::profile;

    #[test]
    fn end_session_only_once() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn_mut(|conn| {
            profile(conn, "a", "ana");
            profile(conn, "b", "ben");
            insert_session(conn, "s1", "a", "b")?;

            assert_eq!(active_sessions(conn)?.len(), 1);
            assert!(end_session(conn, "s1")?);
            assert!(!end_session(conn, "s1")?);

            let row = session_by_id(conn, "s1")?.unwrap();
            assert_eq!(row.status, "ended");
            assert!(row.ended_at.is_some());
            assert!(active_sessions(conn)?.is_empty());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn active_session_between_ignores_seat_order() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn_mut(|conn| {
            profile(conn, "a", "ana");
            profile(conn, "b", "ben");
            profile(conn, "c", "cy");
            insert_session(conn, "s1", "b", "a")?;

            assert_eq!(active_session_between(conn, "a", "b")?.unwrap().id, "s1");
            assert!(active_session_between(conn, "a", "c")?.is_none());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn messages_come_back_in_send_order_with_sender_name() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn_mut(|conn| {
            profile(conn, "a", "ana");
            profile(conn, "b", "ben");
            insert_session(conn, "s1", "a", "b")?;
            insert_message(conn, "m1", "s1", "a", "Chat started.", "system")?;
            insert_message(conn, "m2", "s1", "b", "hi", "text")?;
            insert_message(conn, "m3", "s1", "a", "hey", "text")?;

            let msgs = messages_for_session(conn, "s1")?;
            let ids: Vec<&str> = msgs.iter().map(|m| m.id.as_str()).collect();
            assert_eq!(ids, vec!["m1", "m2", "m3"]);
            assert_eq!(msgs[1].sender_name, "Stranger-ben");

            assert_eq!(last_text_message(conn, "s1")?.unwrap().id, "m3");
            Ok(())
        })
        .unwrap();
    }
}
