//! JSON API tests driving the router in-process.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{Request, StatusCode};
use axum::Router;
use quill::blog::{BlogService, FixedResolver, SqliteBlogRepository};
use quill::config::Config;
use quill::db;
use quill::routes;
use quill::state::{AppState, DbPool};
use rusqlite::params;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const PEER: ([u8; 4], u16) = ([203, 0, 113, 7], 51000);

fn setup(config: Config) -> (TempDir, DbPool, Router) {
    let temp_dir = TempDir::new().unwrap();
    let pool = db::create_pool(&temp_dir.path().join("api.db")).unwrap();
    db::run_migrations(&pool).unwrap();

    // The resolver is unused by the API, which identifies clients by peer address
    let blog = BlogService::new(
        Arc::new(SqliteBlogRepository::new(pool.clone())),
        Arc::new(FixedResolver::new("server-side")),
    );
    let app = routes::app(AppState::new(blog, config))
        .layer(MockConnectInfo(SocketAddr::from(PEER)));

    (temp_dir, pool, app)
}

fn seed_posts(pool: &DbPool) {
    let conn = pool.get().unwrap();
    for (slug, category, day) in [("alpha", "rust", 1), ("beta", "rust", 2), ("gamma", "travel", 3)] {
        conn.execute(
            "INSERT INTO posts (slug, title, content, category, published, created_at)
             VALUES (?1, ?1, 'Body', ?2, 1, ?3)",
            params![slug, category, format!("2024-03-{:02}T10:00:00.000Z", day)],
        )
        .unwrap();
    }
}

fn post_id(pool: &DbPool, slug: &str) -> i64 {
    let conn = pool.get().unwrap();
    conn.query_row("SELECT id FROM posts WHERE slug = ?1", params![slug], |r| {
        r.get(0)
    })
    .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn lists_posts_and_categories() {
    let (_tmp, pool, app) = setup(Config::default());
    seed_posts(&pool);

    let (status, body) = send(&app, get("/api/posts")).await;
    assert_eq!(status, StatusCode::OK);
    let slugs: Vec<_> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["slug"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(slugs, vec!["gamma", "beta", "alpha"]);

    let (_, body) = send(&app, get("/api/posts?category=rust")).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, body) = send(&app, get("/api/categories")).await;
    assert_eq!(body, json!(["travel", "rust"]));
}

#[tokio::test]
async fn shows_post_related_and_neighbors() {
    let (_tmp, pool, app) = setup(Config::default());
    seed_posts(&pool);

    let (status, body) = send(&app, get("/api/posts/beta")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["category"], "rust");

    let (_, body) = send(&app, get("/api/posts/beta/related")).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["slug"], "alpha");

    let (_, body) = send(&app, get("/api/posts/beta/neighbors")).await;
    assert_eq!(body["previous"]["slug"], "gamma");
    assert_eq!(body["next"]["slug"], "alpha");
}

#[tokio::test]
async fn unknown_slug_is_404() {
    let (_tmp, _pool, app) = setup(Config::default());

    let (status, body) = send(&app, get("/api/posts/nothing-here")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nothing-here"));
}

#[tokio::test]
async fn like_is_tracked_per_peer_address() {
    let (_tmp, pool, app) = setup(Config::default());
    seed_posts(&pool);
    let id = post_id(&pool, "alpha");
    let uri = format!("/api/likes/{}", id);

    let (_, body) = send(&app, get(&uri)).await;
    assert_eq!(body, json!({ "liked": false }));

    let (status, body) = send(&app, post_json(&uri, json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "newCount": 1 }));

    let (status, body) = send(&app, post_json(&uri, json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": false, "message": "Already liked" }));

    let (_, body) = send(&app, get(&uri)).await;
    assert_eq!(body, json!({ "liked": true }));

    // Recorded under the peer address, not the service's resolver
    let conn = pool.get().unwrap();
    let ip: String = conn
        .query_row(
            "SELECT user_ip FROM post_likes WHERE post_id = ?1",
            params![id],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(ip, "203.0.113.7");
}

#[tokio::test]
async fn forwarded_for_identifies_clients_when_trusted() {
    let mut config = Config::default();
    config.server.trust_forwarded_for = true;
    let (_tmp, pool, app) = setup(config);
    seed_posts(&pool);
    let uri = format!("/api/likes/{}", post_id(&pool, "alpha"));

    let forwarded = |ip: &str| {
        Request::builder()
            .method("POST")
            .uri(&uri)
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    };

    let (_, first) = send(&app, forwarded("198.51.100.1")).await;
    let (_, second) = send(&app, forwarded("198.51.100.2, 10.0.0.1")).await;
    assert_eq!(first["newCount"], 1);
    assert_eq!(second["newCount"], 2);
}

#[tokio::test]
async fn like_of_missing_post_is_404() {
    let (_tmp, _pool, app) = setup(Config::default());

    let (status, _) = send(&app, post_json("/api/likes/4242", json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comments_round_trip_through_api() {
    let (_tmp, pool, app) = setup(Config::default());
    seed_posts(&pool);
    let id = post_id(&pool, "gamma");
    let uri = format!("/api/comments/{}", id);

    let (status, parent) = send(
        &app,
        post_json(&uri, json!({ "user_name": "ada", "content": "Nice trip" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(parent["user_name"], "ada");

    let (status, reply) = send(
        &app,
        post_json(
            &uri,
            json!({ "user_name": " bob ", "content": "Agreed", "parent_id": parent["id"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reply["user_name"], "bob");
    assert_eq!(reply["parent_id"], parent["id"]);

    let (_, threads) = send(&app, get(&uri)).await;
    let threads = threads.as_array().unwrap();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0]["replies"].as_array().unwrap().len(), 1);

    let (_, count) = send(&app, get(&format!("{}/count", uri))).await;
    assert_eq!(count, json!({ "count": 2 }));
}

#[tokio::test]
async fn blank_comment_is_rejected() {
    let (_tmp, pool, app) = setup(Config::default());
    seed_posts(&pool);
    let uri = format!("/api/comments/{}", post_id(&pool, "alpha"));

    let (status, _) = send(
        &app,
        post_json(&uri, json!({ "user_name": "ada", "content": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, count) = send(&app, get(&format!("{}/count", uri))).await;
    assert_eq!(count["count"], 0);
}

#[tokio::test]
async fn health_answers_ok() {
    let (_tmp, _pool, app) = setup(Config::default());

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
