//! SSRF guard for externally supplied URLs.
//!
//! Every request the [`Fetcher`](crate::fetcher::Fetcher) issues passes
//! through [`UrlGuard::check`] first. The check is purely lexical (no DNS
//! lookup) so it never suspends:
//!
//! - scheme must be `http` or `https`
//! - IP literals in loopback, link-local, private (RFC 1918), unique-local,
//!   CGNAT or unspecified ranges are rejected
//! - `localhost`, `*.localhost`, `*.internal` and known cloud metadata
//!   hostnames are rejected
//!
//! ```rust
//! use docsynth_core::url_guard::validate_public_url;
//!
//! assert!(validate_public_url("https://example.com").is_ok());
//! assert!(validate_public_url("http://169.254.169.254/latest/meta-data").is_err());
//! assert!(validate_public_url("ftp://example.com").is_err());
//! ```

use crate::{Error, Result};
use std::net::{Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

/// Hostnames that resolve to cloud instance metadata services.
const METADATA_HOSTS: &[&str] = &[
    "metadata",
    "metadata.google.internal",
    "metadata.azure.com",
    "instance-data",
    "instance-data.ec2.internal",
];

/// Whether private and loopback hosts are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UrlGuard {
    /// Only public hosts are reachable.
    #[default]
    PublicOnly,
    /// Scheme is still checked, but any host is allowed.
    AllowPrivate,
}

impl UrlGuard {
    /// Build the guard from the `allow_private_hosts` config flag.
    #[must_use]
    pub const fn from_flag(allow_private_hosts: bool) -> Self {
        if allow_private_hosts {
            Self::AllowPrivate
        } else {
            Self::PublicOnly
        }
    }

    /// Parse and validate a URL under this policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] for unparseable URLs and
    /// [`Error::BlockedUrl`] for disallowed schemes or hosts.
    pub fn check(self, raw: &str) -> Result<Url> {
        let url = Url::parse(raw.trim())
            .map_err(|e| Error::InvalidUrl(format!("{raw}: {e}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(blocked(raw, format!("scheme '{}' is not allowed", url.scheme())));
        }

        let Some(host) = url.host() else {
            return Err(blocked(raw, "URL has no host".to_string()));
        };

        if self == Self::PublicOnly {
            if let Some(reason) = host_rejection(&host) {
                return Err(blocked(raw, reason.to_string()));
            }
        }

        Ok(url)
    }
}

/// Validate a URL against the strict public-only policy.
///
/// # Errors
///
/// See [`UrlGuard::check`].
pub fn validate_public_url(raw: &str) -> Result<Url> {
    UrlGuard::PublicOnly.check(raw)
}

fn blocked(url: &str, reason: String) -> Error {
    Error::BlockedUrl {
        url: url.to_string(),
        reason,
    }
}

fn host_rejection(host: &Host<&str>) -> Option<&'static str> {
    match host {
        Host::Domain(domain) => domain_rejection(domain),
        Host::Ipv4(ip) => ipv4_rejection(*ip),
        Host::Ipv6(ip) => ipv6_rejection(*ip),
    }
}

fn domain_rejection(domain: &str) -> Option<&'static str> {
    let domain = domain.trim_end_matches('.').to_ascii_lowercase();

    if domain == "localhost" || domain.ends_with(".localhost") {
        return Some("loopback hostname");
    }
    if METADATA_HOSTS.contains(&domain.as_str()) {
        return Some("cloud metadata hostname");
    }
    if domain.ends_with(".internal") || domain.ends_with(".local") {
        return Some("internal hostname");
    }
    None
}

fn ipv4_rejection(ip: Ipv4Addr) -> Option<&'static str> {
    let octets = ip.octets();
    if ip.is_loopback() {
        Some("loopback address")
    } else if ip.is_link_local() {
        Some("link-local address")
    } else if ip.is_private() {
        Some("private network address")
    } else if ip.is_unspecified() || ip.is_broadcast() {
        Some("non-routable address")
    } else if octets[0] == 100 && (64..128).contains(&octets[1]) {
        Some("shared address space")
    } else {
        None
    }
}

fn ipv6_rejection(ip: Ipv6Addr) -> Option<&'static str> {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return ipv4_rejection(v4);
    }
    let first = ip.segments()[0];
    if ip.is_loopback() {
        Some("loopback address")
    } else if ip.is_unspecified() {
        Some("non-routable address")
    } else if (first & 0xffc0) == 0xfe80 {
        Some("link-local address")
    } else if (first & 0xfe00) == 0xfc00 {
        Some("private network address")
    } else {
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;

    fn assert_blocked(url: &str) {
        match validate_public_url(url) {
            Err(Error::BlockedUrl { .. }) => {},
            other => panic!("expected {url} to be blocked, got {other:?}"),
        }
    }

    #[test]
    fn test_accepts_public_https() {
        let url = validate_public_url("https://example.com").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
        assert!(validate_public_url("http://docs.example.com/guide?x=1").is_ok());
    }

    #[test]
    fn test_rejects_required_hosts() {
        assert_blocked("http://127.0.0.1/");
        assert_blocked("http://169.254.169.254/latest/meta-data/");
        assert_blocked("http://10.0.0.5:8080/admin");
        assert_blocked("http://metadata.google.internal/computeMetadata/v1/");
    }

    #[test]
    fn test_rejects_private_ranges() {
        assert_blocked("http://192.168.1.1/");
        assert_blocked("http://172.16.0.1/");
        assert_blocked("http://172.31.255.255/");
        assert_blocked("http://0.0.0.0/");
        assert_blocked("http://100.64.0.1/");
        assert!(validate_public_url("http://172.32.0.1/").is_ok());
    }

    #[test]
    fn test_rejects_loopback_names_and_ipv6() {
        assert_blocked("http://localhost:3000/");
        assert_blocked("http://LOCALHOST/");
        assert_blocked("http://app.localhost/");
        assert_blocked("http://[::1]/");
        assert_blocked("http://[fe80::1]/");
        assert_blocked("http://[fd00::1]/");
        assert_blocked("http://[::ffff:127.0.0.1]/");
    }

    #[test]
    fn test_rejects_numeric_ip_encodings() {
        // The URL parser normalizes these to 127.0.0.1
        assert_blocked("http://2130706433/");
        assert_blocked("http://0x7f.0.0.1/");
    }

    #[test]
    fn test_rejects_non_http_schemes() {
        assert_blocked("ftp://example.com/file");
        assert_blocked("file:///etc/passwd");
        assert_blocked("gopher://example.com/");
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            validate_public_url("not a url"),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_allow_private_policy() {
        let guard = UrlGuard::from_flag(true);
        assert!(guard.check("http://127.0.0.1:8080/").is_ok());
        assert!(guard.check("file:///etc/passwd").is_err());
    }
}
