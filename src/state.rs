use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::blog::{
    BlogRepository, BlogService, IpResolver, LookupResolver, RestBlogRepository,
    SqliteBlogRepository,
};
use crate::config::{Config, StoreBackend};
use crate::db;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub blog: BlogService,
    pub config: Config,
}

impl AppState {
    pub fn new(blog: BlogService, config: Config) -> Self {
        Self { blog, config }
    }
}

fn http_client() -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("quill/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Wire the configured store and IP resolver into a service.
pub fn build_blog_service(config: &Config) -> anyhow::Result<BlogService> {
    let client = http_client()?;

    let repo: Arc<dyn BlogRepository> = match config.store.backend {
        StoreBackend::Local => {
            let path = config.db_path();
            tracing::info!("Using local store at {}", path.display());
            let pool = db::create_pool(&path)?;
            db::run_migrations(&pool)?;
            Arc::new(SqliteBlogRepository::new(pool))
        }
        StoreBackend::Remote => {
            let url = config
                .remote
                .url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("remote.url is not set"))?;
            let mut repo = RestBlogRepository::new(client.clone(), url, &config.remote.api_key)?;
            if let Some(ref schema) = config.remote.schema {
                repo = repo.with_schema(schema);
            }
            tracing::info!("Using remote store at {}", repo.rest_url());
            Arc::new(repo)
        }
    };

    let resolver: Arc<dyn IpResolver> = Arc::new(LookupResolver::new(
        client,
        &config.ip.lookup_url,
        config.ip.timeout(),
    ));

    Ok(BlogService::new(repo, resolver))
}
