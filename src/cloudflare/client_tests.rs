// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `client.rs`

#[cfg(test)]
mod tests {
    use super::super::CloudflareClient;
    use crate::constants::DEFAULT_CLOUDFLARE_API_URL;

    #[test]
    fn test_endpoint_appends_segments_to_base_path() {
        let client = CloudflareClient::new(DEFAULT_CLOUDFLARE_API_URL, "token").unwrap();

        let url = client
            .endpoint(&["zones", "zone-1", "dns_records", "rec-1"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.cloudflare.com/client/v4/zones/zone-1/dns_records/rec-1"
        );
    }

    #[test]
    fn test_endpoint_handles_trailing_slash_and_bare_host() {
        let client = CloudflareClient::new("http://127.0.0.1:8787/", "token").unwrap();
        let url = client.endpoint(&["zones"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8787/zones");
    }

    #[test]
    fn test_endpoint_percent_encodes_identifiers() {
        let client = CloudflareClient::new("http://cf.test/v4", "token").unwrap();
        let url = client.endpoint(&["zones", "a/b"]).unwrap();
        assert_eq!(url.as_str(), "http://cf.test/v4/zones/a%2Fb");
    }

    #[test]
    fn test_new_rejects_non_http_urls() {
        assert!(CloudflareClient::new("not a url", "token").is_err());
        assert!(CloudflareClient::new("mailto:ops@example.com", "token").is_err());
        assert!(CloudflareClient::new("ftp://cf.test", "token").is_err());
    }

    #[test]
    fn test_debug_output_hides_token() {
        let client = CloudflareClient::new("http://cf.test", "super-secret").unwrap();
        let rendered = format!("{client:?}");
        assert!(rendered.contains("cf.test"));
        assert!(!rendered.contains("super-secret"));
    }
}
