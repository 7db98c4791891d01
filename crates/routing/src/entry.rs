//! Route and cluster entries
//!
//! A route matches `/{tenant}{prefix}/...` and forwards to one cluster.
//! Validation is per entry so one bad tenant never blocks the others.

use std::time::Duration;

use serde::Serialize;

use crate::error::{Result, RoutingError};

/// Trailing path template that matches any remainder
pub const CATCH_ALL: &str = "{**catchall}";

/// Methods every generated route accepts
pub const ROUTE_METHODS: [&str; 4] = ["GET", "POST", "PUT", "DELETE"];

/// Request matching and transform rules for one entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    /// Unique route id
    pub route_id: String,
    /// Cluster that serves matched requests
    pub cluster_id: String,
    /// Path template, literal prefix followed by `{**catchall}`
    pub match_path: String,
    /// Accepted HTTP methods
    pub methods: Vec<String>,
    /// Prefix removed from the path before forwarding
    pub path_prefix_to_strip: String,
    /// CORS policy name
    pub cors_policy: String,
    /// Authorization policy name
    pub auth_policy: String,
}

impl RouteEntry {
    /// Literal part of the match path
    pub fn literal_prefix(&self) -> &str {
        self.match_path
            .strip_suffix(CATCH_ALL)
            .unwrap_or(&self.match_path)
    }

    /// Whether a request path falls under this route
    ///
    /// `/acme/ocr/{**catchall}` matches `/acme/ocr`, `/acme/ocr/` and
    /// anything below it.
    pub fn matches_path(&self, path: &str) -> bool {
        let prefix = self.literal_prefix();
        path.starts_with(prefix) || path == prefix.trim_end_matches('/')
    }

    /// Whether the route accepts a method
    pub fn accepts_method(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }

    /// Check the entry is structurally sound
    pub fn validate(&self) -> Result<()> {
        if self.route_id.trim().is_empty() {
            return Err(RoutingError::empty_id("route"));
        }
        if self.cluster_id.trim().is_empty() {
            return Err(RoutingError::empty_id("cluster"));
        }

        let invalid = |reason| RoutingError::invalid_path(&self.route_id, &self.match_path, reason);

        if !self.match_path.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }
        if !self.match_path.ends_with(CATCH_ALL) {
            return Err(invalid("must end with the catch-all segment"));
        }

        let literal = self.literal_prefix();
        if !literal.ends_with('/') {
            return Err(invalid("prefix must end with '/'"));
        }
        if literal.contains("//") {
            return Err(invalid("contains an empty segment"));
        }
        if !literal.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(invalid("must be printable ASCII without whitespace"));
        }
        if literal.contains(['{', '}']) {
            return Err(invalid("prefix must not contain templates"));
        }
        if self.methods.is_empty() {
            return Err(invalid("no methods"));
        }
        Ok(())
    }
}

/// Backend destination for one or more routes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterEntry {
    /// Unique cluster id
    pub cluster_id: String,
    /// Backend base address
    pub backend_address: String,
    /// Upstream request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl ClusterEntry {
    /// Check the entry is structurally sound
    pub fn validate(&self) -> Result<()> {
        if self.cluster_id.trim().is_empty() {
            return Err(RoutingError::empty_id("cluster"));
        }

        let invalid =
            |reason| RoutingError::invalid_address(&self.cluster_id, &self.backend_address, reason);

        let rest = self
            .backend_address
            .strip_prefix("http://")
            .or_else(|| self.backend_address.strip_prefix("https://"))
            .ok_or_else(|| invalid("scheme must be http or https"))?;

        let host = rest.split(['/', ':']).next().unwrap_or_default();
        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        if host.starts_with(['.', '-']) || host.ends_with(['.', '-']) || host.contains("..") {
            return Err(invalid("malformed host"));
        }
        if !host
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'.' || b == b'-')
        {
            return Err(invalid("host must be lowercase letters, digits, '.' or '-'"));
        }
        if self.request_timeout.is_zero() {
            return Err(invalid("request timeout must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(path: &str) -> RouteEntry {
        RouteEntry {
            route_id: "acme-1".into(),
            cluster_id: "acme-1".into(),
            match_path: path.into(),
            methods: ROUTE_METHODS.iter().map(|m| m.to_string()).collect(),
            path_prefix_to_strip: "/acme".into(),
            cors_policy: "default".into(),
            auth_policy: "OnlyThirdParties".into(),
        }
    }

    fn cluster(address: &str) -> ClusterEntry {
        ClusterEntry {
            cluster_id: "acme-1".into(),
            backend_address: address.into(),
            request_timeout: Duration::from_secs(600),
        }
    }

    #[test]
    fn test_valid_route() {
        assert!(route("/acme/{**catchall}").validate().is_ok());
        assert!(route("/acme/ocr/{**catchall}").validate().is_ok());
    }

    #[test]
    fn test_invalid_routes() {
        for path in [
            "acme/{**catchall}",
            "/acme/",
            "/acme{**catchall}",
            "//{**catchall}",
            "/ac me/{**catchall}",
            "/acme/{id}/{**catchall}",
        ] {
            assert!(route(path).validate().is_err(), "{path} should be invalid");
        }
    }

    #[test]
    fn test_empty_route_id() {
        let mut r = route("/acme/{**catchall}");
        r.route_id = " ".into();
        assert!(matches!(r.validate(), Err(RoutingError::EmptyId { kind: "route" })));
    }

    #[test]
    fn test_matches_path() {
        let r = route("/acme/ocr/{**catchall}");
        assert!(r.matches_path("/acme/ocr"));
        assert!(r.matches_path("/acme/ocr/"));
        assert!(r.matches_path("/acme/ocr/v1/jobs"));
        assert!(!r.matches_path("/acme/ocrx"));
        assert!(!r.matches_path("/acme/"));
    }

    #[test]
    fn test_accepts_method() {
        let r = route("/acme/{**catchall}");
        assert!(r.accepts_method("get"));
        assert!(r.accepts_method("DELETE"));
        assert!(!r.accepts_method("PATCH"));
    }

    #[test]
    fn test_valid_clusters() {
        assert!(cluster("http://api.acme").validate().is_ok());
        assert!(cluster("https://ocr.prod-acme:8080/base").validate().is_ok());
    }

    #[test]
    fn test_invalid_clusters() {
        for address in [
            "api.acme",
            "ftp://api.acme",
            "http://",
            "http://Api.Acme",
            "http://api..acme",
            "http://api.acme-",
            "http://api acme",
        ] {
            assert!(cluster(address).validate().is_err(), "{address} should be invalid");
        }
    }

    #[test]
    fn test_zero_timeout() {
        let mut c = cluster("http://api.acme");
        c.request_timeout = Duration::ZERO;
        assert!(c.validate().is_err());
    }
}
