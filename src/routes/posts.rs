use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::blog::{Post, PostNeighbors};
use crate::error::AppResult;
use crate::state::AppState;

// --- Queries ---

#[derive(Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts", get(list_posts))
        .route("/api/categories", get(list_categories))
        .route("/api/posts/{slug}", get(show_post))
        .route("/api/posts/{slug}/related", get(related_posts))
        .route("/api/posts/{slug}/neighbors", get(post_neighbors))
}

// --- Handlers ---

async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Post>>> {
    let posts = match query.category.as_deref() {
        Some(category) => state.blog.get_posts_in_category(category).await?,
        None => state.blog.get_all_posts().await?,
    };
    Ok(Json(posts))
}

async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    Ok(Json(state.blog.get_categories().await?))
}

async fn show_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<Post>> {
    Ok(Json(state.blog.get_post_by_slug(&slug).await?))
}

/// Related posts share the post's category; the post itself is excluded.
async fn related_posts(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<Vec<Post>>> {
    let post = state.blog.get_post_by_slug(&slug).await?;
    let related = state
        .blog
        .get_related_posts(&post.category, &post.slug)
        .await?;
    Ok(Json(related))
}

async fn post_neighbors(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<PostNeighbors>> {
    Ok(Json(state.blog.get_post_neighbors(&slug).await?))
}
