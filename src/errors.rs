// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the tunnel manager.
//!
//! This module provides specialized error types for:
//! - Desired-state construction (duplicate or empty hostnames)
//! - Cloudflare API operations (HTTP status, API envelope errors, transport)
//! - Reconciliation stages (cluster listing, tunnel publish, per-zone DNS sync)
//!
//! Data errors are absorbed by the caller with a warning, while API errors abort
//! only the pipeline stage (or the zone) they occurred in.

use std::fmt;
use thiserror::Error;

/// Errors returned by [`crate::sync_state::SyncState`] mutations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncStateError {
    /// The hostname is already mapped to a service target
    ///
    /// The first mapping wins; the state is left unchanged.
    #[error("hostname '{hostname}' is already mapped to service '{existing}'")]
    DuplicateHostname {
        /// The normalized hostname that was already present
        hostname: String,
        /// The target the hostname is currently mapped to
        existing: String,
    },

    /// The hostname is blank after normalization
    #[error("hostname is empty after normalization")]
    EmptyHostname,
}

/// Errors that can occur when calling the Cloudflare v4 API.
#[derive(Error, Debug)]
pub enum CloudflareError {
    /// Non-success HTTP status from the API
    #[error("HTTP {status} from {url}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Request URL (without credentials)
        url: String,
        /// Response body or error message
        message: String,
    },

    /// The response envelope reported `success: false`
    #[error("Cloudflare API reported failure: {messages}")]
    Api {
        /// Error messages joined with `, `
        messages: String,
    },

    /// The request could not be sent or the connection failed
    #[error("request to {url} failed: {reason}")]
    Transport {
        /// Request URL
        url: String,
        /// Underlying transport error
        reason: String,
    },

    /// The response body could not be decoded
    #[error("failed to decode response from {url}: {reason}")]
    Decode {
        /// Request URL
        url: String,
        /// Decoder error
        reason: String,
    },

    /// A successful envelope did not carry the expected `result`
    #[error("Cloudflare API response for {operation} has no result")]
    MissingResult {
        /// The operation that expected a result
        operation: String,
    },
}

impl CloudflareError {
    /// Returns true if this error is transient and the request should be retried.
    ///
    /// Rate limiting (429), server errors (5xx) and transport failures are transient.
    /// Other HTTP errors, API envelope failures and decode errors are permanent.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Transport { .. } => true,
            Self::Api { .. } | Self::Decode { .. } | Self::MissingResult { .. } => false,
        }
    }
}

/// Kind of DNS record mutation issued by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordAction {
    /// A new managed CNAME was created
    Create,
    /// A managed CNAME was repointed at the tunnel
    Update,
    /// An orphaned managed CNAME was removed
    Delete,
}

impl RecordAction {
    /// Lowercase label, used in logs and metrics
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for RecordAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that abort a reconciliation stage or a single zone.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Listing namespaces failed; the whole derivation is aborted
    #[error("failed to list namespaces: {reason}")]
    NamespaceListing {
        /// Underlying cluster API error
        reason: String,
    },

    /// The tunnel configuration replace call failed
    #[error("failed to update configuration of tunnel '{tunnel_id}'")]
    TunnelPublish {
        /// Tunnel whose configuration could not be replaced
        tunnel_id: String,
        /// Underlying API error
        #[source]
        source: CloudflareError,
    },

    /// Listing the zones of the account failed
    #[error("failed to list zones for account '{account_id}'")]
    ZoneListing {
        /// Account whose zones could not be listed
        account_id: String,
        /// Underlying API error
        #[source]
        source: CloudflareError,
    },

    /// Listing the records of a zone failed
    #[error("failed to list DNS records of zone '{zone}' ({zone_id})")]
    RecordListing {
        /// Zone name
        zone: String,
        /// Zone identifier
        zone_id: String,
        /// Underlying API error
        #[source]
        source: CloudflareError,
    },

    /// A create, update or delete call failed; the zone is aborted
    #[error("failed to {action} CNAME '{hostname}' in zone '{zone}' ({zone_id}){}", record_suffix(.record_id.as_deref()))]
    RecordMutation {
        /// Mutation that failed
        action: RecordAction,
        /// Zone name
        zone: String,
        /// Zone identifier
        zone_id: String,
        /// Hostname of the record
        hostname: String,
        /// Record identifier, absent for creations
        record_id: Option<String>,
        /// Underlying API error
        #[source]
        source: CloudflareError,
    },

    /// One or more zones failed; other zones were still reconciled
    #[error("DNS sync failed for {} zone(s): {}", .failed_zones.len(), .failed_zones.join(", "))]
    ZonesFailed {
        /// Names of the zones that failed
        failed_zones: Vec<String>,
        /// The first zone failure
        #[source]
        first: Box<ReconcileError>,
    },
}

fn record_suffix(record_id: Option<&str>) -> String {
    record_id.map(|id| format!(" record {id}")).unwrap_or_default()
}

/// Render an error and its `source()` chain as `outer: inner: root`.
#[must_use]
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    std::iter::successors(Some(err), |e| e.source())
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ")
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
