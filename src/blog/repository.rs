// Repository pattern - isolates all data store side effects
use async_trait::async_trait;
use rusqlite::{ffi, params, Row};
use std::collections::HashMap;

use crate::blog::domain::*;
use crate::blog::error::{BlogError, BlogResult};
use crate::state::DbPool;

/// Operations the blog service needs from a data store.
///
/// Implementations must enforce one like per (post, client) and report a
/// repeat as [`BlogError::Duplicate`].
#[async_trait]
pub trait BlogRepository: Send + Sync {
    /// Published posts, newest first
    async fn latest_posts(&self, limit: usize) -> BlogResult<Vec<Post>>;

    /// The single published post with this slug
    async fn published_post_by_slug(&self, slug: &str) -> BlogResult<Post>;

    /// Published posts in `category` other than `exclude_slug`, newest first
    async fn posts_in_category(
        &self,
        category: &str,
        exclude_slug: &str,
        limit: usize,
    ) -> BlogResult<Vec<Post>>;

    /// Atomically insert the like row and bump `like_count`; returns the new count
    async fn record_like(&self, post_id: PostId, client: &ClientIp) -> BlogResult<i64>;

    async fn like_exists(&self, post_id: PostId, client: &ClientIp) -> BlogResult<bool>;

    /// Top-level comments, newest first, each with its direct replies
    async fn comment_threads(&self, post_id: PostId) -> BlogResult<Vec<CommentThread>>;

    async fn insert_comment(&self, comment: &NewComment) -> BlogResult<Comment>;

    async fn count_comments(&self, post_id: PostId) -> BlogResult<i64>;
}

/// Reduce a lookup that must match exactly one row.
pub(crate) fn exactly_one<T>(mut rows: Vec<T>, what: &str) -> BlogResult<T> {
    match rows.len() {
        0 => Err(BlogError::NotFound(what.to_string())),
        1 => Ok(rows.remove(0)),
        n => Err(BlogError::Ambiguous(format!("{} matched {} rows", what, n))),
    }
}

const POST_COLUMNS: &str =
    "id, slug, title, content, excerpt, category, published, created_at, like_count, comment_count";

const COMMENT_COLUMNS: &str = "id, post_id, parent_id, user_name, content, created_at";

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: PostId(row.get(0)?),
        slug: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        excerpt: row.get(4)?,
        category: row.get(5)?,
        published: row.get(6)?,
        created_at: row.get(7)?,
        like_count: row.get(8)?,
        comment_count: row.get(9)?,
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: CommentId(row.get(0)?),
        post_id: PostId(row.get(1)?),
        parent_id: row.get::<_, Option<i64>>(2)?.map(CommentId),
        user_name: row.get(3)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Map SQLite constraint failures onto the store error taxonomy.
fn classify(err: rusqlite::Error, what: &str) -> BlogError {
    if let rusqlite::Error::SqliteFailure(ref failure, _) = err {
        match failure.extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                return BlogError::Duplicate(what.to_string());
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                return BlogError::NotFound(format!("{} references a missing row", what));
            }
            _ => {}
        }
    }
    err.into()
}

/// SQLite implementation
pub struct SqliteBlogRepository {
    pool: DbPool,
}

impl SqliteBlogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BlogRepository for SqliteBlogRepository {
    async fn latest_posts(&self, limit: usize) -> BlogResult<Vec<Post>> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM posts WHERE published = 1
             ORDER BY created_at DESC, id DESC LIMIT ?1",
            POST_COLUMNS
        ))?;
        let posts = stmt
            .query_map(params![limit as i64], post_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(posts)
    }

    async fn published_post_by_slug(&self, slug: &str) -> BlogResult<Post> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM posts WHERE slug = ?1 AND published = 1 LIMIT 2",
            POST_COLUMNS
        ))?;
        let posts = stmt
            .query_map(params![slug], post_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        exactly_one(posts, &format!("post '{}'", slug))
    }

    async fn posts_in_category(
        &self,
        category: &str,
        exclude_slug: &str,
        limit: usize,
    ) -> BlogResult<Vec<Post>> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM posts
             WHERE category = ?1 AND published = 1 AND slug != ?2
             ORDER BY created_at DESC, id DESC LIMIT ?3",
            POST_COLUMNS
        ))?;
        let posts = stmt
            .query_map(params![category, exclude_slug, limit as i64], post_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(posts)
    }

    async fn record_like(&self, post_id: PostId, client: &ClientIp) -> BlogResult<i64> {
        let mut conn = self.pool.get()?;
        let what = format!("like of post {} by {}", post_id, client);

        // Insert and increment commit together or not at all
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO post_likes (post_id, user_ip) VALUES (?1, ?2)",
            params![post_id.get(), client.as_str()],
        )
        .map_err(|e| classify(e, &what))?;

        let new_count: i64 = tx.query_row(
            "UPDATE posts SET like_count = like_count + 1 WHERE id = ?1 RETURNING like_count",
            params![post_id.get()],
            |row| row.get(0),
        )?;

        tx.commit()?;
        Ok(new_count)
    }

    async fn like_exists(&self, post_id: PostId, client: &ClientIp) -> BlogResult<bool> {
        let conn = self.pool.get()?;

        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM post_likes WHERE post_id = ?1 AND user_ip = ?2)",
            params![post_id.get(), client.as_str()],
            |row| row.get(0),
        )?;

        Ok(exists)
    }

    async fn comment_threads(&self, post_id: PostId) -> BlogResult<Vec<CommentThread>> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM post_comments
             WHERE post_id = ?1 AND parent_id IS NULL
             ORDER BY created_at DESC, id DESC",
            COMMENT_COLUMNS
        ))?;
        let top_level = stmt
            .query_map(params![post_id.get()], comment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM post_comments
             WHERE parent_id IN (
                 SELECT id FROM post_comments WHERE post_id = ?1 AND parent_id IS NULL
             )
             ORDER BY created_at, id",
            COMMENT_COLUMNS
        ))?;
        let replies = stmt
            .query_map(params![post_id.get()], comment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut by_parent: HashMap<CommentId, Vec<Comment>> = HashMap::new();
        for reply in replies {
            if let Some(parent) = reply.parent_id {
                by_parent.entry(parent).or_default().push(reply);
            }
        }

        let threads = top_level
            .into_iter()
            .map(|comment| CommentThread {
                replies: by_parent.remove(&comment.id).unwrap_or_default(),
                comment,
            })
            .collect();

        Ok(threads)
    }

    async fn insert_comment(&self, comment: &NewComment) -> BlogResult<Comment> {
        let conn = self.pool.get()?;

        let created = conn
            .query_row(
                &format!(
                    "INSERT INTO post_comments (post_id, user_name, content, parent_id)
                     VALUES (?1, ?2, ?3, ?4)
                     RETURNING {}",
                    COMMENT_COLUMNS
                ),
                params![
                    comment.post_id.get(),
                    comment.user_name,
                    comment.content,
                    comment.parent_id.map(CommentId::get),
                ],
                comment_from_row,
            )
            .map_err(|e| classify(e, &format!("comment on post {}", comment.post_id)))?;

        Ok(created)
    }

    async fn count_comments(&self, post_id: PostId) -> BlogResult<i64> {
        let conn = self.pool.get()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM post_comments WHERE post_id = ?1",
            params![post_id.get()],
            |row| row.get(0),
        )?;

        Ok(count)
    }
}
