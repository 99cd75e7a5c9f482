use anyhow::Result;
use rusqlite::{Connection, params};

use crate::models::DirectMessageRow;
use crate::now;

pub fn insert_direct_message(
    conn: &Connection,
    id: &str,
    sender_id: &str,
    receiver_id: &str,
    content: &str,
) -> Result<DirectMessageRow> {
    let ts = now();
    conn.execute(
        "INSERT INTO direct_messages (id, sender_id, receiver_id, content, is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        params![id, sender_id, receiver_id, content, ts],
    )?;
    Ok(DirectMessageRow {
        id: id.to_string(),
        sender_id: sender_id.to_string(),
        receiver_id: receiver_id.to_string(),
        content: content.to_string(),
        is_read: false,
        created_at: ts,
    })
}

/// Both directions of the conversation between `a` and `b`, oldest first.
pub fn conversation(conn: &Connection, a: &str, b: &str) -> Result<Vec<DirectMessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, sender_id, receiver_id, content, is_read, created_at
         FROM direct_messages
         WHERE (sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1)
         ORDER BY created_at ASC, rowid ASC",
    )?;
    let rows = stmt
        .query_map(params![a, b], |row| {
            Ok(DirectMessageRow {
                id: row.get(0)?,
                sender_id: row.get(1)?,
                receiver_id: row.get(2)?,
                content: row.get(3)?,
                is_read: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Mark everything `sender_id` sent to `receiver_id` as read. Returns the
/// number of messages that changed.
pub fn mark_read(conn: &Connection, sender_id: &str, receiver_id: &str) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE direct_messages SET is_read = 1
         WHERE sender_id = ?1 AND receiver_id = ?2 AND is_read = 0",
        params![sender_id, receiver_id],
    )?)
}
