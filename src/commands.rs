use serde::Serialize;
use serde_json::{json, Value};

use crate::blog::{BlogService, ClientIp, CommentId, NewComment, PostId};
use crate::config::Command;

fn to_value<T: Serialize>(value: T) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Run one service operation and return its result as JSON.
///
/// `serve` and `migrate` are handled by the binary and rejected here.
pub async fn run(blog: &BlogService, command: Command) -> anyhow::Result<Value> {
    match command {
        Command::Posts { category } => match category {
            Some(category) => to_value(blog.get_posts_in_category(&category).await?),
            None => to_value(blog.get_all_posts().await?),
        },
        Command::Categories => to_value(blog.get_categories().await?),
        Command::Post { slug } => to_value(blog.get_post_by_slug(&slug).await?),
        Command::Related { slug } => {
            let post = blog.get_post_by_slug(&slug).await?;
            to_value(blog.get_related_posts(&post.category, &post.slug).await?)
        }
        Command::Neighbors { slug } => to_value(blog.get_post_neighbors(&slug).await?),
        Command::Like { post_id, client_ip } => {
            let post_id = PostId(post_id);
            let outcome = match client_ip {
                Some(ip) => blog.like_post_as(post_id, &ClientIp::new(ip)).await?,
                None => blog.like_post(post_id).await?,
            };
            to_value(outcome)
        }
        Command::Liked { post_id, client_ip } => {
            let post_id = PostId(post_id);
            let liked = match client_ip {
                Some(ip) => blog.has_client_liked_post(post_id, &ClientIp::new(ip)).await,
                None => blog.has_user_liked_post(post_id).await,
            };
            Ok(json!({ "liked": liked }))
        }
        Command::Comments { post_id } => to_value(blog.get_comments(PostId(post_id)).await?),
        Command::Comment {
            post_id,
            name,
            content,
            parent,
        } => to_value(
            blog.add_comment(NewComment {
                post_id: PostId(post_id),
                user_name: name,
                content,
                parent_id: parent.map(CommentId),
            })
            .await?,
        ),
        Command::Count { post_id } => {
            let count = blog.get_comment_count(PostId(post_id)).await?;
            Ok(json!({ "count": count }))
        }
        Command::Serve | Command::Migrate => {
            anyhow::bail!("serve and migrate are not query commands")
        }
    }
}
