// Domain types - plain data, no side effects
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel client identifier used when the public IP cannot be resolved.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Message returned when a client likes the same post twice.
pub const ALREADY_LIKED: &str = "Already liked";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PostId(pub i64);

impl PostId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommentId(pub i64);

impl CommentId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Best-effort client identifier (public IP string, or the sentinel).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientIp(pub String);

impl ClientIp {
    pub fn new(ip: impl Into<String>) -> Self {
        Self(ip.into())
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN_CLIENT.to_string())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_CLIENT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub slug: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    pub category: String,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub like_count: i64,
    #[serde(default)]
    pub comment_count: i64,
}

impl Post {
    pub fn summary(&self) -> PostSummary {
        PostSummary {
            id: self.id,
            slug: self.slug.clone(),
            title: self.title.clone(),
        }
    }
}

/// Just enough of a post to link to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: PostId,
    pub slug: String,
    pub title: String,
}

/// Posts adjacent to a given one in the newest-first listing.
/// `previous` is the newer post, `next` the older one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostNeighbors {
    pub previous: Option<PostSummary>,
    pub next: Option<PostSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    #[serde(default)]
    pub parent_id: Option<CommentId>,
    pub user_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A top-level comment with its direct replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: Comment,
    #[serde(default)]
    pub replies: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub post_id: PostId,
    pub user_name: String,
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<CommentId>,
}

/// Result of a like attempt. A repeat like is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "LikeOutcomeBody")]
pub enum LikeOutcome {
    Liked { new_count: i64 },
    AlreadyLiked,
}

impl LikeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LikeOutcome::Liked { .. })
    }
}

/// Wire shape: `{success, newCount}` or `{success, message}`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LikeOutcomeBody {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

impl From<LikeOutcome> for LikeOutcomeBody {
    fn from(outcome: LikeOutcome) -> Self {
        match outcome {
            LikeOutcome::Liked { new_count } => Self {
                success: true,
                new_count: Some(new_count),
                message: None,
            },
            LikeOutcome::AlreadyLiked => Self {
                success: false,
                new_count: None,
                message: Some(ALREADY_LIKED),
            },
        }
    }
}
