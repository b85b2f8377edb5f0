use std::sync::Arc;

use crate::blog::domain::*;
use crate::blog::error::{BlogError, BlogResult};
use crate::blog::ip::IpResolver;
use crate::blog::repository::BlogRepository;

/// Maximum number of posts in the main listing.
pub const LATEST_POSTS_LIMIT: usize = 10;

/// Maximum number of related posts shown under a post.
pub const RELATED_POSTS_LIMIT: usize = 2;

/// Category name that selects every post.
pub const ALL_CATEGORIES: &str = "all";

/// Posts, likes and comments over a data store.
///
/// Holds no state between calls: every operation is a fresh round trip to
/// the repository.
#[derive(Clone)]
pub struct BlogService {
    repo: Arc<dyn BlogRepository>,
    resolver: Arc<dyn IpResolver>,
}

/// Log a store failure where it is detected, then hand it back.
fn logged<T>(operation: &str, result: BlogResult<T>) -> BlogResult<T> {
    if let Err(ref e) = result {
        if e.is_store_error() {
            tracing::error!("Error {}: {}", operation, e);
        }
    }
    result
}

impl BlogService {
    pub fn new(repo: Arc<dyn BlogRepository>, resolver: Arc<dyn IpResolver>) -> Self {
        Self { repo, resolver }
    }

    /// Newest published posts, at most [`LATEST_POSTS_LIMIT`].
    pub async fn get_all_posts(&self) -> BlogResult<Vec<Post>> {
        logged(
            "fetching posts",
            self.repo.latest_posts(LATEST_POSTS_LIMIT).await,
        )
    }

    pub async fn get_post_by_slug(&self, slug: &str) -> BlogResult<Post> {
        logged(
            "fetching post",
            self.repo.published_post_by_slug(slug).await,
        )
    }

    pub async fn get_related_posts(
        &self,
        category: &str,
        exclude_slug: &str,
    ) -> BlogResult<Vec<Post>> {
        logged(
            "fetching related posts",
            self.repo
                .posts_in_category(category, exclude_slug, RELATED_POSTS_LIMIT)
                .await,
        )
    }

    /// Like a post as the client reported by the IP resolver.
    pub async fn like_post(&self, post_id: PostId) -> BlogResult<LikeOutcome> {
        let client = self.resolver.resolve().await;
        self.like_post_as(post_id, &client).await
    }

    /// Like a post as an explicitly identified client.
    ///
    /// A repeat like from the same client is reported as
    /// [`LikeOutcome::AlreadyLiked`], not as an error.
    pub async fn like_post_as(&self, post_id: PostId, client: &ClientIp) -> BlogResult<LikeOutcome> {
        match self.repo.record_like(post_id, client).await {
            Ok(new_count) => {
                tracing::info!(%post_id, %client, new_count, "Post liked");
                Ok(LikeOutcome::Liked { new_count })
            }
            Err(BlogError::Duplicate(_)) => {
                tracing::debug!(%post_id, %client, "Post already liked");
                Ok(LikeOutcome::AlreadyLiked)
            }
            Err(e) => logged("liking post", Err(e)),
        }
    }

    /// Whether the resolved client has liked the post. Never fails.
    pub async fn has_user_liked_post(&self, post_id: PostId) -> bool {
        let client = self.resolver.resolve().await;
        self.has_client_liked_post(post_id, &client).await
    }

    /// Best-effort read: lookup errors are logged and reported as `false`.
    pub async fn has_client_liked_post(&self, post_id: PostId, client: &ClientIp) -> bool {
        match self.repo.like_exists(post_id, client).await {
            Ok(liked) => liked,
            Err(e) if e.is_not_found() => false,
            Err(e) => {
                tracing::warn!("Error checking like status: {}", e);
                false
            }
        }
    }

    /// Top-level comments, newest first, each with its replies.
    pub async fn get_comments(&self, post_id: PostId) -> BlogResult<Vec<CommentThread>> {
        logged(
            "fetching comments",
            self.repo.comment_threads(post_id).await,
        )
    }

    /// Stores the comment as given; content is not validated here.
    pub async fn add_comment(&self, comment: NewComment) -> BlogResult<Comment> {
        let created = logged("adding comment", self.repo.insert_comment(&comment).await)?;
        tracing::info!(
            post_id = %created.post_id,
            comment_id = %created.id,
            reply = created.parent_id.is_some(),
            "Comment added"
        );
        Ok(created)
    }

    /// Every comment on the post, replies included.
    pub async fn get_comment_count(&self, post_id: PostId) -> BlogResult<i64> {
        logged(
            "counting comments",
            self.repo.count_comments(post_id).await,
        )
    }

    /// Distinct categories of the listed posts, in listing order.
    pub async fn get_categories(&self) -> BlogResult<Vec<String>> {
        let posts = self.get_all_posts().await?;
        let mut categories: Vec<String> = Vec::new();
        for post in posts {
            if !categories.contains(&post.category) {
                categories.push(post.category);
            }
        }
        Ok(categories)
    }

    /// The listing narrowed to one category; [`ALL_CATEGORIES`] keeps everything.
    pub async fn get_posts_in_category(&self, category: &str) -> BlogResult<Vec<Post>> {
        let posts = self.get_all_posts().await?;
        if category == ALL_CATEGORIES {
            return Ok(posts);
        }
        Ok(posts
            .into_iter()
            .filter(|post| post.category == category)
            .collect())
    }

    /// Newer and older neighbors of `slug` within the listing.
    pub async fn get_post_neighbors(&self, slug: &str) -> BlogResult<PostNeighbors> {
        let posts = self.get_all_posts().await?;
        let index = posts
            .iter()
            .position(|post| post.slug == slug)
            .ok_or_else(|| BlogError::NotFound(format!("post '{}'", slug)))?;

        Ok(PostNeighbors {
            previous: index
                .checked_sub(1)
                .and_then(|i| posts.get(i))
                .map(Post::summary),
            next: posts.get(index + 1).map(Post::summary),
        })
    }
}
