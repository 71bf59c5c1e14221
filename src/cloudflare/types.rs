// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cloudflare v4 wire types.
//!
//! Only the fields the reconcilers read or write are modelled; unknown response
//! fields are ignored on deserialization.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::{CATCH_ALL_SERVICE, CLOUDFLARE_AUTO_TTL, RECORD_TYPE_CNAME};

// ============================================================
// Response envelope
// ============================================================

/// Standard `{success, errors, result, result_info}` response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<ApiMessage>,
    pub result: Option<T>,
    pub result_info: Option<ResultInfo>,
}

/// One entry of the envelope `errors` array.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiMessage {
    #[serde(default)]
    pub code: i64,
    pub message: String,
}

/// Pagination metadata of list responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ResultInfo {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
}

impl<T> ApiResponse<T> {
    /// Error messages formatted as `message (code N)`, joined with `, `.
    pub(crate) fn error_messages(&self) -> String {
        if self.errors.is_empty() {
            return "no error details returned".to_string();
        }
        self.errors
            .iter()
            .map(|e| format!("{} (code {})", e.message, e.code))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// ============================================================
// DNS
// ============================================================

/// A DNS zone of the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Zone identifier
    pub id: String,
    /// Zone apex name, e.g. `example.com`
    pub name: String,
}

/// An existing DNS record as returned by the list call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Record identifier
    pub id: String,
    /// Record type (`A`, `AAAA`, `CNAME`, ...)
    #[serde(rename = "type")]
    pub record_type: String,
    /// Fully-qualified record name
    pub name: String,
    /// Record content; the target hostname for a CNAME
    pub content: String,
    /// Free-form comment; `null` on the wire becomes `None`
    #[serde(default)]
    pub comment: Option<String>,
}

impl DnsRecord {
    /// Returns `true` if the record comment contains `marker`.
    #[must_use]
    pub fn is_managed(&self, marker: &str) -> bool {
        self.comment
            .as_deref()
            .is_some_and(|comment| comment.contains(marker))
    }
}

/// Body of the record create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewDnsRecord {
    /// Always `CNAME` for records created by the reconciler
    #[serde(rename = "type")]
    pub record_type: String,
    /// Record name
    pub name: String,
    /// Record content
    pub content: String,
    /// TTL in seconds, `1` meaning automatic
    pub ttl: u32,
    /// Whether traffic is proxied through Cloudflare
    pub proxied: bool,
    /// Ownership marker
    pub comment: String,
}

impl NewDnsRecord {
    /// A proxied, auto-TTL CNAME carrying the ownership marker.
    #[must_use]
    pub fn managed_cname(name: &str, target: &str, marker: &str) -> Self {
        Self {
            record_type: RECORD_TYPE_CNAME.to_string(),
            name: name.to_string(),
            content: target.to_string(),
            ttl: CLOUDFLARE_AUTO_TTL,
            proxied: true,
            comment: marker.to_string(),
        }
    }
}

/// Body of the record patch call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsRecordPatch {
    /// New record content
    pub content: String,
    /// Ownership marker, rewritten on every update
    pub comment: String,
}

// ============================================================
// Tunnel
// ============================================================

/// Per-rule origin options of a tunnel ingress rule.
///
/// The commonly used options are typed; anything else the API accepts is kept
/// in `extra` and sent back verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginRequest {
    /// Timeout for establishing a connection to the origin, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<u64>,
    /// Disable TLS verification of the origin certificate
    #[serde(rename = "noTLSVerify", skip_serializing_if = "Option::is_none")]
    pub no_tls_verify: Option<bool>,
    /// Host header sent to the origin
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_host_header: Option<String>,
    /// Hostname expected on the origin certificate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_server_name: Option<String>,
    /// Remaining options, passed through untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One rule of the tunnel ingress list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngressRule {
    /// Public hostname; absent on the catch-all rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Upstream service URL or a built-in service such as `http_status:404`
    pub service: String,
    /// Optional origin options
    #[serde(
        rename = "originRequest",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub origin_request: Option<OriginRequest>,
}

impl IngressRule {
    /// Rule routing `hostname` to `service`.
    #[must_use]
    pub fn route(hostname: &str, service: &str) -> Self {
        Self {
            hostname: Some(hostname.to_string()),
            service: service.to_string(),
            origin_request: None,
        }
    }

    /// The terminal rule answering 404 to anything unmatched.
    #[must_use]
    pub fn catch_all() -> Self {
        Self {
            hostname: None,
            service: CATCH_ALL_SERVICE.to_string(),
            origin_request: None,
        }
    }

    /// Returns `true` for a rule without a hostname.
    #[must_use]
    pub fn is_catch_all(&self) -> bool {
        self.hostname.is_none()
    }
}

/// Full tunnel configuration, replaced as a whole on every publish.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TunnelConfig {
    /// Ordered ingress rules; the last one must be a catch-all
    pub ingress: Vec<IngressRule>,
}

/// Request body of the configuration replace call.
#[derive(Debug, Serialize)]
pub(crate) struct TunnelConfigurationRequest<'a> {
    pub config: &'a TunnelConfig,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;
