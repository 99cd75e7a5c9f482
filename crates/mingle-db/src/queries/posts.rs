use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params};

use crate::models::{CommentRow, NewPost, PostRow};
use crate::now;
use crate::queries::{AUTHOR_COL_COUNT, author_at, author_cols, encode_list, like_pattern, list_at};

/// Post columns, author, counts and the viewer's like/saved flags. `?1` is
/// always the viewing user.
fn post_select() -> String {
    format!(
        "SELECT p.id, p.user_id, p.content, p.image_url, p.tags, p.community_id, p.created_at, p.updated_at,
                {author},
                (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id),
                (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id),
                EXISTS(SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = ?1),
                EXISTS(SELECT 1 FROM saved_posts s WHERE s.post_id = p.id AND s.user_id = ?1)
         FROM posts p
         JOIN user_profiles u ON u.id = p.user_id",
        author = author_cols("u")
    )
}

/// Posts of private profiles are shown only to their author and the author's
/// friends. Expects `u` to be the author and `?1` the viewer.
const VISIBLE: &str = "(u.is_public = 1 OR u.id = ?1 OR EXISTS(
        SELECT 1 FROM friends f
        WHERE (f.user1_id = u.id AND f.user2_id = ?1) OR (f.user1_id = ?1 AND f.user2_id = u.id)))";

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    let n = 8 + AUTHOR_COL_COUNT;
    Ok(PostRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content: row.get(2)?,
        image_url: row.get(3)?,
        tags: list_at(row, 4)?,
        community_id: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        author: author_at(row, 8)?,
        like_count: row.get(n)?,
        comment_count: row.get(n + 1)?,
        liked: row.get(n + 2)?,
        saved: row.get(n + 3)?,
    })
}

fn query_posts(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<PostRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, post_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// -- Posts --

pub fn insert_post(conn: &Connection, p: &NewPost<'_>) -> Result<()> {
    let ts = now();
    conn.execute(
        "INSERT INTO posts (id, user_id, content, image_url, tags, community_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![p.id, p.user_id, p.content, p.image_url, encode_list(p.tags)?, p.community_id, ts],
    )?;
    Ok(())
}

pub fn post_by_id(conn: &Connection, viewer: &str, id: &str) -> Result<Option<PostRow>> {
    let sql = format!("{} WHERE p.id = ?2 AND {VISIBLE}", post_select());
    Ok(conn.query_row(&sql, params![viewer, id], post_from_row).optional()?)
}

/// Whether `id` exists and `viewer` may see it.
pub fn is_visible(conn: &Connection, viewer: &str, id: &str) -> Result<bool> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM posts p JOIN user_profiles u ON u.id = p.user_id
                       WHERE p.id = ?2 AND {VISIBLE})"
    );
    Ok(conn.query_row(&sql, params![viewer, id], |r| r.get(0))?)
}

/// Author of a post, if it exists.
pub fn post_owner(conn: &Connection, id: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row("SELECT user_id FROM posts WHERE id = ?1", [id], |r| r.get(0))
        .optional()?)
}

pub fn delete_post(conn: &Connection, id: &str) -> Result<bool> {
    Ok(conn.execute("DELETE FROM posts WHERE id = ?1", [id])? > 0)
}

/// All posts, newest first, optionally only those carrying `tag`.
pub fn feed(conn: &Connection, viewer: &str, tag: Option<&str>, limit: u32) -> Result<Vec<PostRow>> {
    let sql = format!(
        "{} WHERE (?2 IS NULL OR EXISTS(SELECT 1 FROM json_each(p.tags) t WHERE t.value = ?2))
           AND {VISIBLE}
         ORDER BY p.created_at DESC, p.rowid DESC
         LIMIT ?3",
        post_select()
    );
    query_posts(conn, &sql, params![viewer, tag, limit])
}

pub fn posts_by_user(conn: &Connection, viewer: &str, user_id: &str) -> Result<Vec<PostRow>> {
    let sql = format!(
        "{} WHERE p.user_id = ?2 ORDER BY p.created_at DESC, p.rowid DESC",
        post_select()
    );
    query_posts(conn, &sql, params![viewer, user_id])
}

pub fn posts_in_community(conn: &Connection, viewer: &str, community_id: &str) -> Result<Vec<PostRow>> {
    let sql = format!(
        "{} WHERE p.community_id = ?2 AND {VISIBLE} ORDER BY p.created_at DESC, p.rowid DESC",
        post_select()
    );
    query_posts(conn, &sql, params![viewer, community_id])
}

/// The viewer's saved posts, most recently saved first.
pub fn saved_posts(conn: &Connection, viewer: &str) -> Result<Vec<PostRow>> {
    let sql = format!(
        "{} JOIN saved_posts sp ON sp.post_id = p.id AND sp.user_id = ?1
         WHERE {VISIBLE}
         ORDER BY sp.saved_at DESC, sp.rowid DESC",
        post_select()
    );
    query_posts(conn, &sql, params![viewer])
}

/// Posts whose content contains `needle` or that carry it as an exact tag.
pub fn search_posts(conn: &Connection, viewer: &str, needle: &str, limit: u32) -> Result<Vec<PostRow>> {
    let sql = format!(
        "{} WHERE (p.content LIKE ?2 ESCAPE '\\'
               OR EXISTS(SELECT 1 FROM json_each(p.tags) t WHERE t.value = ?3))
           AND {VISIBLE}
         ORDER BY p.created_at DESC, p.rowid DESC
         LIMIT ?4",
        post_select()
    );
    query_posts(conn, &sql, params![viewer, like_pattern(needle), needle, limit])
}

pub fn post_count(conn: &Connection, user_id: &str) -> Result<u64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM posts WHERE user_id = ?1", [user_id], |r| r.get(0))?)
}

/// Tag usage across all posts, most used first, ties by name.
pub fn trending_tags(conn: &Connection, limit: u32) -> Result<Vec<(String, u64)>> {
    let mut stmt = conn.prepare(
        "SELECT t.value, COUNT(*) AS uses
         FROM posts p, json_each(p.tags) t
         GROUP BY t.value
         ORDER BY uses DESC, t.value ASC
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// -- Comments --

pub fn insert_comment(conn: &Connection, id: &str, post_id: &str, user_id: &str, content: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO comments (id, post_id, user_id, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, post_id, user_id, content, now()],
    )?;
    Ok(())
}

const COMMENT_SELECT_COLS: &str = "c.id, c.post_id, c.content, c.created_at";

fn comment_select() -> String {
    format!(
        "SELECT {COMMENT_SELECT_COLS}, {}
         FROM comments c
         JOIN user_profiles u ON u.id = c.user_id",
        author_cols("u")
    )
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        post_id: row.get(1)?,
        content: row.get(2)?,
        created_at: row.get(3)?,
        author: author_at(row, 4)?,
    })
}

pub fn comment_by_id(conn: &Connection, id: &str) -> Result<Option<CommentRow>> {
    let sql = format!("{} WHERE c.id = ?1", comment_select());
    Ok(conn.query_row(&sql, [id], comment_from_row).optional()?)
}

/// Comments on a post, oldest first.
pub fn comments_for_post(conn: &Connection, post_id: &str) -> Result<Vec<CommentRow>> {
    let sql = format!(
        "{} WHERE c.post_id = ?1 ORDER BY c.created_at ASC, c.rowid ASC",
        comment_select()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([post_id], comment_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// -- Likes and saves --

/// Toggle a like: removes if it exists, inserts if not.
/// Returns true when the like now exists.
pub fn toggle_like(conn: &Connection, id: &str, post_id: &str, user_id: &str) -> Result<bool> {
    toggle_pair(conn, "likes", "created_at", id, post_id, user_id)
}

/// Toggle a saved post. Returns true when the post is now saved.
pub fn toggle_saved(conn: &Connection, id: &str, post_id: &str, user_id: &str) -> Result<bool> {
    toggle_pair(conn, "saved_posts", "saved_at", id, post_id, user_id)
}

fn toggle_pair(
    conn: &Connection,
    table: &str,
    ts_col: &str,
    id: &str,
    post_id: &str,
    user_id: &str,
) -> Result<bool> {
    let existing: Option<String> = conn
        .query_row(
            &format!("SELECT id FROM {table} WHERE post_id = ?1 AND user_id = ?2"),
            params![post_id, user_id],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(existing_id) = existing {
        conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), [&existing_id])?;
        Ok(false)
    } else {
        conn.execute(
            &format!("INSERT INTO {table} (id, post_id, user_id, {ts_col}) VALUES (?1, ?2, ?3, ?4)"),
            params![id, post_id, user_id, now()],
        )?;
        Ok(true)
    }
}
