// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Hostname normalization and zone matching helpers.
//!
//! All hostname and record-name comparisons in the controller go through
//! [`normalize_host`], which makes them case-insensitive and
//! trailing-dot-insensitive.

/// Normalize a hostname: trim whitespace, strip one trailing dot, lowercase.
///
/// # Example
///
/// ```rust
/// use tunnel_manager::hostname::normalize_host;
///
/// assert_eq!(normalize_host(" API.Example.com. "), "api.example.com");
/// ```
#[must_use]
pub fn normalize_host(host: &str) -> String {
    let trimmed = host.trim();
    trimmed
        .strip_suffix('.')
        .unwrap_or(trimmed)
        .to_ascii_lowercase()
}

/// Compare two DNS names ignoring case and trailing dot.
#[must_use]
pub fn equal_dns_host(a: &str, b: &str) -> bool {
    normalize_host(a) == normalize_host(b)
}

/// Returns `true` if `zone` owns `host`, i.e. the names are equal or `zone`
/// is a dot-separated suffix of `host`.
///
/// Both arguments must already be normalized.
#[must_use]
pub fn zone_contains(zone: &str, host: &str) -> bool {
    if zone.is_empty() {
        return false;
    }
    host == zone
        || host
            .strip_suffix(zone)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Pick the zone whose name is the longest suffix match for `host`.
///
/// Returns the index into `zone_names` of the best match, or `None` when no
/// zone owns the hostname. Zone names are normalized before comparison.
///
/// # Example
///
/// ```rust
/// use tunnel_manager::hostname::best_matching_zone;
///
/// let zones = ["example.com", "sub.example.com"];
/// assert_eq!(best_matching_zone("api.sub.example.com", &zones), Some(1));
/// assert_eq!(best_matching_zone("other.org", &zones), None);
/// ```
#[must_use]
pub fn best_matching_zone<S: AsRef<str>>(host: &str, zone_names: &[S]) -> Option<usize> {
    let host = normalize_host(host);
    let mut best: Option<(usize, usize)> = None;

    for (idx, zone) in zone_names.iter().enumerate() {
        let zone = normalize_host(zone.as_ref());
        if !zone_contains(&zone, &host) {
            continue;
        }
        if best.is_none_or(|(_, len)| zone.len() > len) {
            best = Some((idx, zone.len()));
        }
    }

    best.map(|(idx, _)| idx)
}

#[cfg(test)]
#[path = "hostname_tests.rs"]
mod hostname_tests;
