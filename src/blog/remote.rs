//! Blog repository backed by a hosted PostgREST API.
//!
//! Tables are addressed as `{base}/rest/v1/{table}` with PostgREST filter
//! syntax (`column=eq.value`), and likes go through the `record_post_like`
//! procedure so the insert and the counter bump happen in one transaction.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_RANGE};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::blog::domain::*;
use crate::blog::error::{BlogError, BlogResult};
use crate::blog::repository::{exactly_one, BlogRepository};

/// Name of the server-side like procedure.
pub const LIKE_PROCEDURE: &str = "record_post_like";

/// PostgREST error body.
#[derive(Debug, Deserialize)]
struct StoreErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

#[derive(Serialize)]
struct LikeArgs<'a> {
    p_post_id: i64,
    p_user_ip: &'a str,
}

#[derive(Deserialize)]
struct IdRow {
    #[allow(dead_code)]
    id: i64,
}

pub struct RestBlogRepository {
    client: Client,
    rest_url: Url,
    api_key: String,
    schema: Option<String>,
}

impl RestBlogRepository {
    pub fn new(
        client: Client,
        base_url: &str,
        api_key: impl Into<String>,
    ) -> Result<Self, url::ParseError> {
        let rest_url = Url::parse(&format!("{}/rest/v1/", base_url.trim_end_matches('/')))?;
        Ok(Self {
            client,
            rest_url,
            api_key: api_key.into(),
            schema: None,
        })
    }

    /// Target a schema other than the API default.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn rest_url(&self) -> &Url {
        &self.rest_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.rest_url, path);
        let mut headers = HeaderMap::new();
        if let Ok(key) = HeaderValue::from_str(&self.api_key) {
            headers.insert("apikey", key);
        }
        if let Some(schema) = self.schema.as_deref().and_then(|s| HeaderValue::from_str(s).ok()) {
            headers.insert("accept-profile", schema.clone());
            headers.insert("content-profile", schema);
        }

        self.client
            .request(method, url)
            .headers(headers)
            .bearer_auth(&self.api_key)
    }

    async fn send(&self, request: RequestBuilder) -> BlogResult<Response> {
        let response = request.send().await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(rejection(response).await)
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> BlogResult<T> {
        let response = self.send(request).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Turn a non-2xx response into a classified error.
async fn rejection(response: Response) -> BlogError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    match serde_json::from_str::<StoreErrorBody>(&body) {
        Ok(err) => {
            let message = match (err.message, err.details) {
                (Some(m), Some(d)) => format!("{} ({})", m, d),
                (Some(m), None) => m,
                (None, Some(d)) => d,
                (None, None) => body,
            };
            BlogError::from_remote(status, err.code, message)
        }
        Err(_) => BlogError::from_remote(status, None, body),
    }
}

/// Total from a `Content-Range` header such as `0-9/42` or `*/0`.
fn parse_content_range_total(value: &str) -> Option<i64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

#[async_trait]
impl BlogRepository for RestBlogRepository {
    async fn latest_posts(&self, limit: usize) -> BlogResult<Vec<Post>> {
        let request = self.request(Method::GET, "posts").query(&[
            ("select", "*".to_string()),
            ("published", eq(true)),
            ("order", "created_at.desc".to_string()),
            ("limit", limit.to_string()),
        ]);
        let posts: Vec<Post> = self.fetch(request).await?;
        tracing::debug!(count = posts.len(), "Fetched posts");
        Ok(posts)
    }

    async fn published_post_by_slug(&self, slug: &str) -> BlogResult<Post> {
        // Ask for two rows so an ambiguous slug is distinguishable from a hit
        let request = self.request(Method::GET, "posts").query(&[
            ("select", "*".to_string()),
            ("slug", eq(slug)),
            ("published", eq(true)),
            ("limit", "2".to_string()),
        ]);
        let posts: Vec<Post> = self.fetch(request).await?;
        exactly_one(posts, &format!("post '{}'", slug))
    }

    async fn posts_in_category(
        &self,
        category: &str,
        exclude_slug: &str,
        limit: usize,
    ) -> BlogResult<Vec<Post>> {
        let request = self.request(Method::GET, "posts").query(&[
            ("select", "*".to_string()),
            ("category", eq(category)),
            ("published", eq(true)),
            ("slug", format!("neq.{}", exclude_slug)),
            ("order", "created_at.desc".to_string()),
            ("limit", limit.to_string()),
        ]);
        self.fetch(request).await
    }

    async fn record_like(&self, post_id: PostId, client: &ClientIp) -> BlogResult<i64> {
        let request = self
            .request(Method::POST, &format!("rpc/{}", LIKE_PROCEDURE))
            .json(&LikeArgs {
                p_post_id: post_id.get(),
                p_user_ip: client.as_str(),
            });
        let new_count: Option<i64> = self.fetch(request).await?;
        new_count.ok_or_else(|| BlogError::NotFound(format!("post {}", post_id)))
    }

    async fn like_exists(&self, post_id: PostId, client: &ClientIp) -> BlogResult<bool> {
        let request = self.request(Method::GET, "post_likes").query(&[
            ("select", "id".to_string()),
            ("post_id", eq(post_id)),
            ("user_ip", eq(client)),
            ("limit", "1".to_string()),
        ]);
        let rows: Vec<IdRow> = self.fetch(request).await?;
        Ok(!rows.is_empty())
    }

    async fn comment_threads(&self, post_id: PostId) -> BlogResult<Vec<CommentThread>> {
        let request = self.request(Method::GET, "post_comments").query(&[
            ("select", "*,replies:post_comments(*)".to_string()),
            ("post_id", eq(post_id)),
            ("parent_id", "is.null".to_string()),
            ("order", "created_at.desc".to_string()),
        ]);
        let threads: Option<Vec<CommentThread>> = self.fetch(request).await?;
        Ok(threads.unwrap_or_default())
    }

    async fn insert_comment(&self, comment: &NewComment) -> BlogResult<Comment> {
        let request = self
            .request(Method::POST, "post_comments")
            .header("Prefer", "return=representation")
            .json(comment);
        let rows: Vec<Comment> = self.fetch(request).await?;
        exactly_one(rows, "inserted comment")
    }

    async fn count_comments(&self, post_id: PostId) -> BlogResult<i64> {
        let request = self
            .request(Method::HEAD, "post_comments")
            .header("Prefer", "count=exact")
            .query(&[("select", "id".to_string()), ("post_id", eq(post_id))]);
        let response = self.send(request).await?;

        let total = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total);

        Ok(total.unwrap_or(0))
    }
}
