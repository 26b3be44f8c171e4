//! Facilitator URL validation
//!
//! The facilitator URL comes from user-controlled spec fields and the
//! gateway will POST payment payloads to it, so it must never point at
//! internal or private network resources (SSRF prevention).

use std::net::IpAddr;

use url::Url;

use crate::{Error, Result};

/// Validate that a facilitator URL is safe to call from inside the cluster.
///
/// Rules:
/// - scheme must be http or https, hostname must be present;
/// - `localhost` and `*.internal` hostnames are rejected outright;
/// - literal IPs in private, loopback, or link-local ranges are rejected;
///   other literal IPs must use HTTPS;
/// - DNS names that look in-cluster (no dot, `*.svc`, `*.svc.cluster.local`)
///   may use HTTP; every other DNS name must use HTTPS.
pub fn validate_facilitator_url(raw_url: &str) -> Result<()> {
    let url = Url::parse(raw_url).map_err(|e| Error::validation(format!("malformed URL: {e}")))?;

    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::validation(format!(
            "scheme {scheme:?} not allowed, must be http or https"
        )));
    }

    let hostname = url
        .host_str()
        .ok_or_else(|| Error::validation("missing hostname"))?;

    let lower = hostname.to_lowercase();
    if lower == "localhost" {
        return Err(Error::validation(format!(
            "hostname {hostname:?} is not allowed"
        )));
    }
    if lower.ends_with(".internal") {
        return Err(Error::validation(format!(
            "hostname {hostname:?} is not allowed (*.internal)"
        )));
    }

    // Literal IP? url keeps IPv6 hosts bracketed.
    let bare = lower.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = bare.parse::<IpAddr>() {
        if is_private_ip(ip) {
            return Err(Error::validation(format!(
                "IP address {bare} is in a private/reserved range"
            )));
        }
        if scheme != "https" {
            return Err(Error::validation(format!(
                "HTTP not allowed for IP address {bare}, use HTTPS"
            )));
        }
        return Ok(());
    }

    if is_in_cluster_hostname(&lower) {
        return Ok(());
    }

    if scheme != "https" {
        return Err(Error::validation(format!(
            "HTTP not allowed for external hostname {hostname:?}, use HTTPS"
        )));
    }

    Ok(())
}

/// Private, loopback, link-local, and unique-local ranges
fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            o[0] == 127 // 127.0.0.0/8
                || o[0] == 10 // 10.0.0.0/8
                || (o[0] == 172 && (16..=31).contains(&o[1])) // 172.16.0.0/12
                || (o[0] == 192 && o[1] == 168) // 192.168.0.0/16
                || (o[0] == 169 && o[1] == 254) // 169.254.0.0/16
        }
        IpAddr::V6(v6) => {
            let s = v6.segments();
            v6.is_loopback() // ::1/128
                || s[0] & 0xff00 == 0xfd00 // fd00::/8
                || s[0] & 0xffc0 == 0xfe80 // fe80::/10
        }
    }
}

/// Hostnames that look like in-cluster Kubernetes service names: a bare name
/// without dots, or cluster-local DNS suffixes.
fn is_in_cluster_hostname(hostname: &str) -> bool {
    !hostname.contains('.')
        || hostname.ends_with(".svc.cluster.local")
        || hostname.ends_with(".svc")
}
