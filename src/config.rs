use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::blog::ip::DEFAULT_LOOKUP_URL;

#[derive(Parser, Debug)]
#[command(name = "quill", about = "Blog posts, likes and comments")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Data store to use
    #[arg(long, value_enum)]
    pub backend: Option<StoreBackend>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the JSON API server (default)
    Serve,
    /// Apply local database migrations and exit
    Migrate,
    /// List the newest published posts
    Posts {
        #[arg(long)]
        category: Option<String>,
    },
    /// List the categories of the newest posts
    Categories,
    /// Show one post
    Post { slug: String },
    /// Posts related to a post
    Related { slug: String },
    /// Previous and next post around a post
    Neighbors { slug: String },
    /// Like a post
    Like {
        post_id: i64,
        /// Skip the IP lookup and like as this client
        #[arg(long)]
        client_ip: Option<String>,
    },
    /// Check whether this client liked a post
    Liked {
        post_id: i64,
        #[arg(long)]
        client_ip: Option<String>,
    },
    /// Show the comments on a post
    Comments { post_id: i64 },
    /// Comment on a post, or reply to a comment
    Comment {
        post_id: i64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        content: String,
        #[arg(long)]
        parent: Option<i64>,
    },
    /// Count the comments on a post
    Count { post_id: i64 },
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Embedded SQLite database
    #[default]
    Local,
    /// Hosted PostgREST API
    Remote,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub database: DatabaseConfig,
    pub remote: RemoteConfig,
    pub ip: IpConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Identify clients by the first `X-Forwarded-For` entry
    pub trust_forwarded_for: bool,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct RemoteConfig {
    pub url: Option<String>,
    pub api_key: String,
    pub schema: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct IpConfig {
    pub lookup_url: String,
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            trust_forwarded_for: false,
        }
    }
}

impl Default for IpConfig {
    fn default() -> Self {
        Self {
            lookup_url: DEFAULT_LOOKUP_URL.to_string(),
            timeout_secs: 5,
        }
    }
}

impl IpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if let Some(backend) = cli.backend {
            config.store.backend = backend;
        }

        // Resolve paths relative to data dir
        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("quill.db"));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.store.backend == StoreBackend::Remote {
            match self.remote.url.as_deref() {
                Some(url) if !url.trim().is_empty() => {}
                _ => anyhow::bail!("store.backend = \"remote\" requires remote.url"),
            }
        }
        Ok(())
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".quill")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("quill.db"))
    }
}
