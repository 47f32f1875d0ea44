//! HTTP API handlers

pub mod analyze;
pub mod certifications;
pub mod health;
pub mod lookup;
pub mod search;

pub use analyze::analyze_routes;
pub use certifications::certification_routes;
pub use health::health_routes;
pub use lookup::lookup_routes;
pub use search::search_routes;

use axum::http::HeaderMap;

/// Best-effort client identity for admission control
///
/// Prefers proxy-provided headers (Cloudflare, nginx) and falls back to
/// the first hop of `x-forwarded-for`; `unknown` pools unidentifiable
/// clients into one shared bucket.
pub fn client_ip(headers: &HeaderMap) -> String {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    if let Some(ip) = header_value("cf-connecting-ip") {
        return ip;
    }
    if let Some(ip) = header_value("x-real-ip") {
        return ip;
    }
    if let Some(forwarded) = header_value("x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_header_priority() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("9.9.9.9, 8.8.8.8"));
        headers.insert("x-real-ip", HeaderValue::from_static("2.2.2.2"));
        headers.insert("cf-connecting-ip", HeaderValue::from_static("1.1.1.1"));
        assert_eq!(client_ip(&headers), "1.1.1.1");

        headers.remove("cf-connecting-ip");
        assert_eq!(client_ip(&headers), "2.2.2.2");

        headers.remove("x-real-ip");
        assert_eq!(client_ip(&headers), "9.9.9.9");
    }

    #[test]
    fn test_client_ip_unknown_fallback() {
        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }
}
