//! Cache key derivation and client identity resolution.

use axum::http::HeaderMap;
use std::net::SocketAddr;

use crate::models::SearchParams;

const DELIMITER: &str = "|";
const NONE: &str = "-";

/// Builds cache keys that cover every parameter affecting an upstream result.
///
/// Free-text components are escaped so that no two distinct parameter tuples
/// can produce the same key.
pub struct KeyGenerator;

impl KeyGenerator {
    pub fn search_key(params: &SearchParams) -> String {
        let year = params.year.map(|y| y.to_string());
        Self::join(&[
            "search",
            &Self::escape(&params.title),
            &params.page.to_string(),
            &Self::optional(params.kind.as_deref()),
            year.as_deref().unwrap_or(NONE),
        ])
    }

    pub fn details_key(imdb_id: &str) -> String {
        Self::join(&["id", &Self::escape(imdb_id)])
    }

    pub fn title_key(title: &str, year: Option<u16>) -> String {
        let year = year.map(|y| y.to_string());
        Self::join(&["title", &Self::escape(title), year.as_deref().unwrap_or(NONE)])
    }

    fn optional(component: Option<&str>) -> String {
        component
            .map(Self::escape)
            .unwrap_or_else(|| NONE.to_string())
    }

    fn join(parts: &[&str]) -> String {
        parts.join(DELIMITER)
    }

    fn escape(component: &str) -> String {
        let mut escaped = String::with_capacity(component.len());
        for c in component.chars() {
            if c == '\\' || DELIMITER.starts_with(c) || (component == NONE && c == '-') {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        escaped
    }

    /// Resolve the identity a request is rate limited under: the first
    /// `X-Forwarded-For` entry, then `X-Real-IP`, then the peer address.
    pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());

        match forwarded.or(real_ip) {
            Some(ip) => ip.to_string(),
            None => peer
                .map(|addr| addr.ip().to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        }
    }
}
