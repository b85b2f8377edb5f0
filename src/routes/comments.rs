use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::blog::{Comment, CommentId, CommentThread, NewComment, PostId};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

const MAX_NAME_LEN: usize = 100;
const MAX_CONTENT_LEN: usize = 2000;

// --- Bodies ---

#[derive(Deserialize)]
pub struct CreateCommentBody {
    pub user_name: String,
    pub content: String,
    pub parent_id: Option<i64>,
}

#[derive(Serialize)]
pub struct CommentCount {
    pub count: i64,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/comments/{post_id}",
            get(list_comments).post(create_comment),
        )
        .route("/api/comments/{post_id}/count", get(comment_count))
}

// --- Handlers ---

async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> AppResult<Json<Vec<CommentThread>>> {
    Ok(Json(state.blog.get_comments(PostId(post_id)).await?))
}

async fn create_comment(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Json(body): Json<CreateCommentBody>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    let user_name = body.user_name.trim().to_string();
    let content = body.content.trim().to_string();

    if user_name.is_empty() || content.is_empty() {
        return Err(AppError::BadRequest(
            "Name and comment cannot be empty".into(),
        ));
    }
    if user_name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::BadRequest(format!(
            "Name must be {} characters or less",
            MAX_NAME_LEN
        )));
    }
    if content.chars().count() > MAX_CONTENT_LEN {
        return Err(AppError::BadRequest(format!(
            "Comment must be {} characters or less",
            MAX_CONTENT_LEN
        )));
    }

    let created = state
        .blog
        .add_comment(NewComment {
            post_id: PostId(post_id),
            user_name,
            content,
            parent_id: body.parent_id.map(CommentId),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

async fn comment_count(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> AppResult<Json<CommentCount>> {
    let count = state.blog.get_comment_count(PostId(post_id)).await?;
    Ok(Json(CommentCount { count }))
}
