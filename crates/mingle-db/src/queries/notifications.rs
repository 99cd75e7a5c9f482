use anyhow::Result;
use rusqlite::{Connection, params};

use crate::models::{NewNotification, NotificationRow};
use crate::{new_id, now};

pub fn insert_notification(conn: &Connection, n: &NewNotification<'_>) -> Result<()> {
    conn.execute(
        "INSERT INTO notifications (id, user_id, kind, title, message, link, is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
        params![new_id(), n.user_id, n.kind, n.title, n.message, n.link, now()],
    )?;
    Ok(())
}

/// Newest first.
pub fn notifications_for(conn: &Connection, user_id: &str, limit: u32) -> Result<Vec<NotificationRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, kind, title, message, link, is_read, created_at
         FROM notifications
         WHERE user_id = ?1
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![user_id, limit], |row| {
            Ok(NotificationRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                kind: row.get(2)?,
                title: row.get(3)?,
                message: row.get(4)?,
                link: row.get(5)?,
                is_read: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn unread_count(conn: &Connection, user_id: &str) -> Result<u64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
        [user_id],
        |r| r.get(0),
    )?)
}

pub fn mark_all_read(conn: &Connection, user_id: &str) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
        [user_id],
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::queries::testutil::profile;

    #[test]
    fn unread_badge_tracks_mark_all_read() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn_mut(|conn| {
            profile(conn, "a", "ana");
            for title in ["one", "two"] {
                insert_notification(
                    conn,
                    &NewNotification {
                        user_id: "a",
                        kind: "follow",
                        title,
                        message: "m",
                        link: None,
                    },
                )?;
            }
            assert_eq!(unread_count(conn, "a")?, 2);
            assert_eq!(notifications_for(conn, "a", 50)?[0].title, "two");

            assert_eq!(mark_all_read(conn, "a")?, 2);
            assert_eq!(unread_count(conn, "a")?, 0);
            Ok(())
        })
        .unwrap();
    }
}
