//! Best-effort client identification.
//!
//! The identifier is the caller's public IP as reported by a lookup
//! service. Lookup failures never reach the caller: they collapse to the
//! `"unknown"` sentinel, so every client whose lookup fails shares one
//! identity and only one of them can like a given post.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::blog::domain::ClientIp;

pub const DEFAULT_LOOKUP_URL: &str = "https://api.ipify.org?format=json";

#[derive(Debug, Error)]
pub enum IpLookupError {
    #[error("IP lookup request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("IP lookup returned status {0}")]
    Status(u16),

    #[error("IP lookup response had no address")]
    Empty,
}

#[async_trait]
pub trait IpResolver: Send + Sync {
    /// Never fails; returns [`ClientIp::unknown`] when no address is available.
    async fn resolve(&self) -> ClientIp;
}

#[derive(Deserialize)]
struct LookupBody {
    ip: Option<String>,
}

/// Asks a public "what is my IP" endpoint returning `{"ip": "..."}`.
pub struct LookupResolver {
    client: Client,
    url: String,
    timeout: Duration,
}

impl LookupResolver {
    pub fn new(client: Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    pub async fn lookup(&self) -> Result<ClientIp, IpLookupError> {
        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IpLookupError::Status(response.status().as_u16()));
        }

        let body: LookupBody = response.json().await?;
        match body.ip.map(|ip| ip.trim().to_string()) {
            Some(ip) if !ip.is_empty() => Ok(ClientIp::new(ip)),
            _ => Err(IpLookupError::Empty),
        }
    }
}

#[async_trait]
impl IpResolver for LookupResolver {
    async fn resolve(&self) -> ClientIp {
        match self.lookup().await {
            Ok(ip) => ip,
            Err(e) => {
                tracing::warn!("Error getting IP: {}", e);
                ClientIp::unknown()
            }
        }
    }
}

/// Always answers with the same identifier.
pub struct FixedResolver(pub ClientIp);

impl FixedResolver {
    pub fn new(ip: impl Into<String>) -> Self {
        Self(ClientIp::new(ip))
    }
}

#[async_trait]
impl IpResolver for FixedResolver {
    async fn resolve(&self) -> ClientIp {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resolver_for(server: &MockServer) -> LookupResolver {
        LookupResolver::new(
            Client::new(),
            format!("{}/lookup", server.uri()),
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn resolves_ip_from_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lookup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ip": "203.0.113.9" })))
            .mount(&server)
            .await;

        let ip = resolver_for(&server).resolve().await;
        assert_eq!(ip, ClientIp::new("203.0.113.9"));
    }

    #[tokio::test]
    async fn server_error_falls_back_to_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let resolver = resolver_for(&server);
        assert!(matches!(
            resolver.lookup().await,
            Err(IpLookupError::Status(503))
        ));
        assert!(resolver.resolve().await.is_unknown());
    }

    #[tokio::test]
    async fn malformed_body_falls_back_to_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        assert!(resolver_for(&server).resolve().await.is_unknown());
    }

    #[tokio::test]
    async fn empty_ip_falls_back_to_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ip": "" })))
            .mount(&server)
            .await;

        let resolver = resolver_for(&server);
        assert!(matches!(resolver.lookup().await, Err(IpLookupError::Empty)));
        assert!(resolver.resolve().await.is_unknown());
    }

    #[tokio::test]
    async fn unreachable_service_falls_back_to_unknown() {
        // Nothing listens on port 9 (discard) in the test environment
        let resolver = LookupResolver::new(
            Client::new(),
            "http://127.0.0.1:9/lookup",
            Duration::from_millis(500),
        );
        assert!(resolver.resolve().await.is_unknown());
    }

    #[tokio::test]
    async fn fixed_resolver_returns_preset() {
        let resolver = FixedResolver::new("192.0.2.1");
        assert_eq!(resolver.resolve().await.as_str(), "192.0.2.1");
    }
}
