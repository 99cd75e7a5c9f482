use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::Deserialize;

use mingle_db::queries::{communities, posts, users};
use mingle_types::api::{Claims, SearchResults};

use crate::error::ApiResult;
use crate::state::{AppState, db_tx};
use crate::views;

const USER_LIMIT: u32 = 10;
const POST_LIMIT: u32 = 20;
const COMMUNITY_LIMIT: u32 = 10;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Case-insensitive search over users, posts and communities. A blank query
/// matches nothing.
pub async fn search(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<SearchResults>> {
    let needle = query.q.trim().to_string();
    if needle.is_empty() {
        return Ok(Json(SearchResults::default()));
    }

    let me = claims.sub.to_string();
    let results = db_tx(&state, move |conn| {
        let users = users::search_profiles(conn, &needle, USER_LIMIT)?
            .iter()
            .map(views::summary)
            .collect::<anyhow::Result<Vec<_>>>()?;
        let posts = views::posts(posts::search_posts(conn, &me, &needle, POST_LIMIT)?)?;
        let communities = communities::search_communities(conn, &me, &needle, COMMUNITY_LIMIT)?
            .into_iter()
            .map(views::community)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(SearchResults {
            users,
            posts,
            communities,
        })
    })
    .await?;
    Ok(Json(results))
}
