use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

use crate::blog::ClientIp;
use crate::error::AppError;
use crate::state::AppState;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Identifier of the client making the request, used for like tracking.
///
/// The peer socket address is used unless `server.trust_forwarded_for` is
/// set and the request carries a parsable `X-Forwarded-For` header.
#[derive(Debug, Clone)]
pub struct RequestClient(pub ClientIp);

impl FromRequestParts<AppState> for RequestClient {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if state.config.server.trust_forwarded_for {
            if let Some(ip) = forwarded_client(&parts.headers) {
                return Ok(RequestClient(client_ip(ip)));
            }
        }

        let ConnectInfo(addr) = ConnectInfo::<SocketAddr>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::Internal(format!("No peer address: {}", e)))?;

        Ok(RequestClient(client_ip(addr.ip())))
    }
}

/// First (client-most) address of `X-Forwarded-For`.
fn forwarded_client(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get(FORWARDED_FOR)?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

/// IPv6-mapped IPv4 addresses are reported in dotted form so one client
/// has one identity across socket families.
fn client_ip(ip: IpAddr) -> ClientIp {
    let ip = match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    };
    ClientIp::new(ip.to_string())
}
