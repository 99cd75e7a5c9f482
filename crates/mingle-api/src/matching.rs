//! Stranger matching: pair the requester with an online user who is not
//! already in an active chat, preferring shared interests.

use std::collections::HashSet;

use axum::{Extension, Json, extract::State, http::StatusCode};
use rusqlite::Connection;
use tracing::{debug, info};

use mingle_db::models::{CandidateRow, ChatSessionRow};
use mingle_db::queries::{chat, users};
use mingle_db::new_id;
use mingle_types::api::{ChatSessionView, Claims, MatchRequest};
use mingle_types::interests;
use mingle_types::models::MessageType;

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, db_tx};
use crate::views;

pub const CHAT_STARTED: &str = "Chat started.";

/// Number of tags present in both lists.
pub fn overlap(a: &[String], b: &[String]) -> usize {
    a.iter().filter(|tag| b.contains(tag)).count()
}

/// Pick a partner from `candidates`, which must already be in
/// longest-waiting-first order. Occupied users are skipped. With no
/// `interests` the first free candidate wins; otherwise the highest overlap
/// wins and ties keep the earlier candidate.
pub fn select_candidate<'a>(
    interests: &[String],
    candidates: &'a [CandidateRow],
    occupied: &HashSet<String>,
) -> Option<&'a CandidateRow> {
    let mut pool = candidates.iter().filter(|c| !occupied.contains(&c.id));

    if interests.is_empty() {
        return pool.next();
    }

    let mut best: Option<(&CandidateRow, usize)> = None;
    for candidate in pool {
        let score = overlap(&candidate.interests, interests);
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((candidate, score));
        }
    }
    best.map(|(c, _)| c)
}

/// Run a full match for `requester` on an open transaction. The requester's
/// interests and presence are written first; `None` means nobody was free
/// and no session was created.
pub fn find_stranger(conn: &Connection, requester: &str, tags: &[String]) -> ApiResult<Option<ChatSessionRow>> {
    users::set_interests(conn, requester, tags)?;
    users::set_online(conn, requester, true)?;

    let occupied: HashSet<String> = chat::active_sessions(conn)?
        .into_iter()
        .flat_map(|s| [s.user1_id, s.user2_id])
        .collect();
    let candidates = users::online_candidates(conn, requester)?;

    let Some(chosen) = select_candidate(tags, &candidates, &occupied) else {
        debug!(
            "No match for {}: {} online, {} occupied",
            requester,
            candidates.len(),
            occupied.len()
        );
        return Ok(None);
    };

    let session = chat::insert_session(conn, &new_id(), requester, &chosen.id)?;
    chat::insert_message(
        conn,
        &new_id(),
        &session.id,
        requester,
        CHAT_STARTED,
        MessageType::System.as_str(),
    )?;
    Ok(Some(session))
}

pub async fn find_match(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<MatchRequest>,
) -> ApiResult<(StatusCode, Json<ChatSessionView>)> {
    let tags = interests::normalize(&req.interests).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let requester = claims.sub.to_string();

    let session = db_tx(&state, move |conn| find_stranger(conn, &requester, &tags))
        .await?
        .ok_or(ApiError::NoCandidates)?;

    info!(
        "Matched {} with {} in session {}",
        session.user1_id, session.user2_id, session.id
    );
    Ok((StatusCode::CREATED, Json(views::session(&session)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mingle_db::Database;
    use mingle_db::models::NewProfile;

    fn candidate(id: &str, tags: &[&str]) -> CandidateRow {
        CandidateRow {
            id: id.to_string(),
            interests: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn strings(tags: &[&str]) -> Vec<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn best_overlap_wins() {
        let pool = vec![candidate("x", &["Gaming"]), candidate("y", &["Music", "Gaming", "Art"])];
        let chosen = select_candidate(&strings(&["Music", "Gaming"]), &pool, &HashSet::new());
        assert_eq!(chosen.map(|c| c.id.as_str()), Some("y"));
    }

    #[test]
    fn ties_keep_queue_order() {
        let pool = vec![
            candidate("a", &["Art"]),
            candidate("b", &["Music"]),
            candidate("c", &["Music"]),
        ];
        let chosen = select_candidate(&strings(&["Music"]), &pool, &HashSet::new());
        assert_eq!(chosen.map(|c| c.id.as_str()), Some("b"));

        // Nobody shares anything: still the longest waiting.
        let chosen = select_candidate(&strings(&["Food"]), &pool, &HashSet::new());
        assert_eq!(chosen.map(|c| c.id.as_str()), Some("a"));
    }

    #[test]
    fn no_interests_takes_first_free() {
        let pool = vec![candidate("a", &["Music"]), candidate("b", &[])];
        let occupied: HashSet<String> = ["a".to_string()].into();
        let chosen = select_candidate(&[], &pool, &occupied);
        assert_eq!(chosen.map(|c| c.id.as_str()), Some("b"));
    }

    #[test]
    fn occupied_candidates_are_never_chosen() {
        let pool = vec![candidate("a", &["Music", "Art"]), candidate("b", &[])];
        let occupied: HashSet<String> = ["a".to_string()].into();
        let chosen = select_candidate(&strings(&["Music", "Art"]), &pool, &occupied);
        assert_eq!(chosen.map(|c| c.id.as_str()), Some("b"));

        let occupied: HashSet<String> = ["a".to_string(), "b".to_string()].into();
        assert!(select_candidate(&strings(&["Music"]), &pool, &occupied).is_none());
    }

    // -- Against the store --

    fn profile(conn: &Connection, id: &str, name: &str) {
        users::insert_profile(
            conn,
            &NewProfile {
                id,
                email: &format!("{name}@example.com"),
                username: name,
                password_hash: "x",
                anonymous_name: "Stranger-0000",
                avatar_color: "#3b82f6",
            },
        )
        .unwrap();
    }

    fn online_at(conn: &Connection, id: &str, last_seen: &str, tags: &[&str]) {
        users::set_interests(conn, id, &strings(tags)).unwrap();
        conn.execute(
            "UPDATE user_profiles SET is_online = 1, last_seen = ?2 WHERE id = ?1",
            [id, last_seen],
        )
        .unwrap();
    }

    #[test]
    fn match_creates_session_with_start_message() {
        let db = Database::open_in_memory().unwrap();
        let session = db
            .with_tx(|tx| {
                profile(tx, "me", "me");
                profile(tx, "x", "xena");
                profile(tx, "y", "yuri");
                online_at(tx, "x", "2026-01-01T00:00:01.000000Z", &["Gaming"]);
                online_at(tx, "y", "2026-01-01T00:00:02.000000Z", &["Music", "Gaming", "Art"]);
                find_stranger(tx, "me", &strings(&["Music", "Gaming"]))
            })
            .unwrap()
            .unwrap();

        assert_eq!(session.user1_id, "me");
        assert_eq!(session.user2_id, "y");

        db.with_conn(|conn| {
            let msgs = chat::messages_for_session(conn, &session.id)?;
            assert_eq!(msgs.len(), 1);
            assert_eq!(msgs[0].content, CHAT_STARTED);
            assert_eq!(msgs[0].message_type, "system");
            assert_eq!(msgs[0].sender_id, "me");

            let me = users::profile_by_id(conn, "me")?.unwrap();
            assert!(me.is_online);
            assert_eq!(me.interests, vec!["Music", "Gaming"]);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn empty_pool_creates_nothing() {
        let db = Database::open_in_memory().unwrap();
        let found = db
            .with_tx(|tx| {
                profile(tx, "me", "me");
                profile(tx, "a", "ana");
                profile(tx, "b", "ben");
                online_at(tx, "a", "2026-01-01T00:00:01.000000Z", &[]);
                online_at(tx, "b", "2026-01-01T00:00:02.000000Z", &[]);
                chat::insert_session(tx, "s0", "a", "b")?;
                find_stranger(tx, "me", &[])
            })
            .unwrap();

        assert!(found.is_none());
        let active = db.with_conn(|conn| chat::active_sessions(conn)).unwrap();
        assert_eq!(active.len(), 1);
    }

    #[test]
    fn second_requester_cannot_take_the_same_partner() {
        let db = Database::open_in_memory().unwrap();
        db.with_tx(|tx| -> ApiResult<()> {
            profile(tx, "r1", "rey");
            profile(tx, "r2", "rio");
            profile(tx, "c", "cal");
            online_at(tx, "c", "2026-01-01T00:00:01.000000Z", &[]);
            Ok(())
        })
        .unwrap();

        let first = db.with_tx(|tx| find_stranger(tx, "r1", &[])).unwrap().unwrap();
        assert_eq!(first.user2_id, "c");

        // r1 and c are now both occupied; r2 finds nobody.
        let second = db.with_tx(|tx| find_stranger(tx, "r2", &[])).unwrap();
        assert!(second.is_none());
    }
}
