//! Credential extraction from request headers
//!
//! The credential travels in `authorization` (optionally as
//! `Bearer <key>`) or in `x-api-key`. The first non-empty header wins.

use http::HeaderMap;

/// Standard authorization header
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Custom API key header
pub const API_KEY_HEADER: &str = "x-api-key";

/// What the request presented as its credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentedCredential<'a> {
    /// Neither header carries a value
    Missing,
    /// Credential text, scheme prefix removed
    Value(&'a str),
    /// A header is set but is not valid visible ASCII/UTF-8
    Unreadable,
}

/// Find the credential in a request's headers
pub fn extract_credential(headers: &HeaderMap) -> PresentedCredential<'_> {
    for name in [AUTHORIZATION_HEADER, API_KEY_HEADER] {
        let Some(value) = headers.get(name) else {
            continue;
        };
        let Ok(text) = value.to_str() else {
            return PresentedCredential::Unreadable;
        };

        let text = text.trim();
        let text = text.strip_prefix("Bearer ").map(str::trim).unwrap_or(text);
        if !text.is_empty() {
            return PresentedCredential::Value(text);
        }
    }
    PresentedCredential::Missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_no_headers() {
        assert_eq!(extract_credential(&HeaderMap::new()), PresentedCredential::Missing);
    }

    #[test]
    fn test_empty_headers_are_missing() {
        let map = headers(&[("authorization", ""), ("x-api-key", "  ")]);
        assert_eq!(extract_credential(&map), PresentedCredential::Missing);
    }

    #[test]
    fn test_authorization_raw_key() {
        let map = headers(&[("authorization", "abc123")]);
        assert_eq!(extract_credential(&map), PresentedCredential::Value("abc123"));
    }

    #[test]
    fn test_authorization_bearer() {
        let map = headers(&[("authorization", "Bearer abc123")]);
        assert_eq!(extract_credential(&map), PresentedCredential::Value("abc123"));
    }

    #[test]
    fn test_api_key_header() {
        let map = headers(&[("x-api-key", "k-1")]);
        assert_eq!(extract_credential(&map), PresentedCredential::Value("k-1"));
    }

    #[test]
    fn test_authorization_takes_precedence() {
        let map = headers(&[("authorization", "first"), ("x-api-key", "second")]);
        assert_eq!(extract_credential(&map), PresentedCredential::Value("first"));
    }

    #[test]
    fn test_empty_authorization_falls_back() {
        let map = headers(&[("authorization", ""), ("x-api-key", "second")]);
        assert_eq!(extract_credential(&map), PresentedCredential::Value("second"));
    }

    #[test]
    fn test_unreadable_value() {
        let mut map = HeaderMap::new();
        map.insert("x-api-key", HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap());
        assert_eq!(extract_credential(&map), PresentedCredential::Unreadable);
    }
}
