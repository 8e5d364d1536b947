//! Host-key normalization for duplicate detection.
//!
//! Two registrations point at the same PIM when their URLs share a host,
//! regardless of scheme, port, path, or letter case:
//!
//! ```text
//! tcp://PIM.local:2101      → pim.local
//! tcp://pim.local           → pim.local
//! serial://COM3             → com3
//! tcp://[2001:db8::5]:2101  → 2001:db8::5
//! tcp://pim box:2101        → pim box
//! serial:///dev/ttyUSB0     → (none)
//! ```
//!
//! A URL without a host has no key, and "no key" is itself a key: a hostless
//! URL matches every other hostless registration.  Only one path-style serial
//! PIM can therefore be added through the host check.

use url::Url;

use super::record::RegistrationRecord;

/// Extracts the lowercase host of `url`, or `None` when it has none.
///
/// Addresses that [`Url`] rejects (a host with a space, say) still yield the
/// text between `://` and the first `/`, `?`, `#`, or port separator.
pub fn host_key(url: &str) -> Option<String> {
    let url = url.trim();
    let host = match Url::parse(url) {
        Ok(parsed) => parsed.host_str().map(str::to_string),
        Err(_) => authority_host(url).map(str::to_string),
    }?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return None;
    }
    Some(host.to_ascii_lowercase())
}

/// Host part of `scheme://[user@]host[:port]/...`, without URL validation.
fn authority_host(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority.rsplit('@').next().unwrap_or_default();
    let host = match host_port.strip_prefix('[') {
        Some(v6) => v6.split(']').next().unwrap_or_default(),
        None => host_port.split(':').next().unwrap_or_default(),
    };
    Some(host)
}

/// Returns `true` when `url` shares its host key with any existing record.
pub fn url_already_configured(url: &str, existing: &[RegistrationRecord]) -> bool {
    let key = host_key(url);
    existing.iter().any(|record| host_key(&record.host) == key)
}
