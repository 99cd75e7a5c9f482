use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::models::{CommunityRow, NewCommunity};
use crate::now;
use crate::queries::{AUTHOR_COL_COUNT, author_at, author_cols, encode_list, like_pattern, list_at};

/// `?1` is the viewing user, used for the role column.
fn community_select() -> String {
    format!(
        "SELECT c.id, c.name, c.description, c.avatar_url, c.banner_url, c.is_private, c.tags, c.created_at,
                {author},
                (SELECT COUNT(*) FROM community_members m WHERE m.community_id = c.id),
                (SELECT m.role FROM community_members m WHERE m.community_id = c.id AND m.user_id = ?1)
         FROM communities c
         JOIN user_profiles u ON u.id = c.created_by",
        author = author_cols("u")
    )
}

fn community_from_row(row: &Row<'_>) -> rusqlite::Result<CommunityRow> {
    let n = 8 + AUTHOR_COL_COUNT;
    Ok(CommunityRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        avatar_url: row.get(3)?,
        banner_url: row.get(4)?,
        is_private: row.get(5)?,
        tags: list_at(row, 6)?,
        created_at: row.get(7)?,
        creator: author_at(row, 8)?,
        member_count: row.get(n)?,
        viewer_role: row.get(n + 1)?,
    })
}

pub fn insert_community(conn: &Connection, c: &NewCommunity<'_>) -> Result<()> {
    conn.execute(
        "INSERT INTO communities (id, name, description, avatar_url, banner_url, is_private, created_by, tags, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            c.id,
            c.name,
            c.description,
            c.avatar_url,
            c.banner_url,
            c.is_private,
            c.created_by,
            encode_list(c.tags)?,
            now(),
        ],
    )?;
    Ok(())
}

pub fn name_taken(conn: &Connection, name: &str) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM communities WHERE name = ?1 COLLATE NOCASE)",
        [name],
        |r| r.get(0),
    )?)
}

pub fn community_by_id(conn: &Connection, viewer: &str, id: &str) -> Result<Option<CommunityRow>> {
    let sql = format!("{} WHERE c.id = ?2", community_select());
    Ok(conn.query_row(&sql, params![viewer, id], community_from_row).optional()?)
}

/// Listing with the three filters of the communities page. `needle` matches
/// name or description case-insensitively.
pub fn list_communities(
    conn: &Connection,
    viewer: &str,
    public_only: bool,
    member_only: bool,
    needle: Option<&str>,
) -> Result<Vec<CommunityRow>> {
    let sql = format!(
        "{} WHERE (?2 = 0 OR c.is_private = 0)
            AND (?3 = 0 OR EXISTS(SELECT 1 FROM community_members m WHERE m.community_id = c.id AND m.user_id = ?1))
            AND (?4 IS NULL OR c.name LIKE ?4 ESCAPE '\\' OR c.description LIKE ?4 ESCAPE '\\')
         ORDER BY c.created_at DESC, c.rowid DESC",
        community_select()
    );
    let pattern = needle.map(like_pattern);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![viewer, public_only, member_only, pattern], community_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn search_communities(conn: &Connection, viewer: &str, needle: &str, limit: u32) -> Result<Vec<CommunityRow>> {
    let sql = format!(
        "{} WHERE c.name LIKE ?2 ESCAPE '\\' OR c.description LIKE ?2 ESCAPE '\\'
         ORDER BY c.name ASC
         LIMIT ?3",
        community_select()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![viewer, like_pattern(needle), limit], community_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// -- Membership --

pub fn add_member(conn: &Connection, id: &str, community_id: &str, user_id: &str, role: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO community_members (id, community_id, user_id, role, joined_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, community_id, user_id, role, now()],
    )?;
    Ok(())
}

pub fn remove_member(conn: &Connection, community_id: &str, user_id: &str) -> Result<bool> {
    Ok(conn.execute(
        "DELETE FROM community_members WHERE community_id = ?1 AND user_id = ?2",
        params![community_id, user_id],
    )? > 0)
}

pub fn member_role(conn: &Connection, community_id: &str, user_id: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT role FROM community_members WHERE community_id = ?1 AND user_id = ?2",
            params![community_id, user_id],
            |r| r.get(0),
        )
        .optional()?)
}

pub fn admin_count(conn: &Connection, community_id: &str) -> Result<u64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM community_members WHERE community_id = ?1 AND role = 'admin'",
        [community_id],
        |r| r.get(0),
    )?)
}
