//! HTTP request handlers.

pub mod auth;
pub mod health;

use std::net::SocketAddr;

use axum::http::HeaderMap;

/// Resolve the caller address for throttling purposes.
///
/// Honors the proxy chain the way the deployment sets it up:
/// `X-Forwarded-For` (first entry) → `X-Real-IP` → socket peer address.
pub(crate) fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok())
        && let Some(first) = forwarded.split(',').next()
    {
        let first = first.trim();
        if !first.is_empty() {
            return first.to_string();
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok())
        && !real_ip.is_empty()
    {
        return real_ip.to_string();
    }
    peer.ip().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> SocketAddr {
        "192.0.2.1:4000".parse().unwrap()
    }

    #[test]
    fn forwarded_for_wins_and_takes_the_first_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("5.6.7.8"));
        assert_eq!(client_ip(&headers, peer()), "1.2.3.4");
    }

    #[test]
    fn real_ip_is_the_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("5.6.7.8"));
        assert_eq!(client_ip(&headers, peer()), "5.6.7.8");
    }

    #[test]
    fn peer_address_when_no_proxy_headers() {
        assert_eq!(client_ip(&HeaderMap::new(), peer()), "192.0.2.1");
    }
}
