//! Query functions grouped by table. Each takes a plain `&Connection` so the
//! API layer can compose several of them inside one `Database::with_tx`.

pub mod chat;
pub mod communities;
pub mod direct;
pub mod follows;
pub mod friends;
pub mod notifications;
pub mod posts;
pub mod users;

use rusqlite::Row;
use rusqlite::types::Type;

use crate::models::AuthorRow;

/// Profile columns for an embedded author, selected from table alias `alias`.
/// Read back with [`author_at`].
pub(crate) fn author_cols(alias: &str) -> String {
    format!(
        "{a}.id, {a}.username, {a}.anonymous_name, {a}.avatar_color, {a}.avatar_url, {a}.is_online",
        a = alias
    )
}

/// Number of columns produced by [`author_cols`].
pub(crate) const AUTHOR_COL_COUNT: usize = 6;

pub(crate) fn author_at(row: &Row<'_>, start: usize) -> rusqlite::Result<AuthorRow> {
    Ok(AuthorRow {
        id: row.get(start)?,
        username: row.get(start + 1)?,
        anonymous_name: row.get(start + 2)?,
        avatar_color: row.get(start + 3)?,
        avatar_url: row.get(start + 4)?,
        is_online: row.get(start + 5)?,
    })
}

/// Tag and interest lists are stored as JSON arrays of strings.
pub(crate) fn encode_list(items: &[String]) -> anyhow::Result<String> {
    Ok(serde_json::to_string(items)?)
}

pub(crate) fn list_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// `%needle%` for a case-insensitive `LIKE ... ESCAPE '\'`.
pub(crate) fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

#[cfg(test)]
pub(crate) mod testutil {
    use rusqlite::Connection;

    use crate::models::NewProfile;
    use crate::queries::users;

    /// Insert a bare profile whose username, email and anonymous name derive
    /// from `name`. Returns the id.
    pub fn profile(conn: &Connection, id: &str, name: &str) -> String {
        let email = format!("{name}@example.com");
        let anon = format!("Stranger-{name}");
        users::insert_profile(
            conn,
            &NewProfile {
                id,
                email: &email,
                username: name,
                password_hash: "x",
                anonymous_name: &anon,
                avatar_color: "#6366f1",
            },
        )
        .unwrap();
        id.to_string()
    }
}
