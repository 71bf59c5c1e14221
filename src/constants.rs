// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the tunnel manager.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Service Annotation Constants
// ============================================================================

/// Default annotation holding the public hostnames of a `Service`
pub const DEFAULT_HOSTNAMES_ANNOTATION: &str = "cloudflare-tunnel-hostnames";

/// Default annotation overriding the upstream port of a `Service`
pub const DEFAULT_UPSTREAM_PORT_ANNOTATION: &str = "cloudflare-tunnel-upstream-port";

/// In-cluster DNS suffix used to build upstream service targets
pub const CLUSTER_SERVICE_DOMAIN: &str = "svc.cluster.local";

/// Scheme used for upstream service targets
pub const UPSTREAM_SCHEME: &str = "http";

// ============================================================================
// Cloudflare Tunnel Constants
// ============================================================================

/// Default suffix appended to the tunnel ID to form the public CNAME target
pub const DEFAULT_TUNNEL_TARGET_SUFFIX: &str = "cfargotunnel.com";

/// Service of the terminal catch-all ingress rule
pub const CATCH_ALL_SERVICE: &str = "http_status:404";

// ============================================================================
// Cloudflare DNS Constants
// ============================================================================

/// Default comment marker identifying CNAME records owned by this controller
pub const DEFAULT_MANAGED_RECORD_MARKER: &str = "managed by tunnel-manager";

/// Record type managed by the controller
pub const RECORD_TYPE_CNAME: &str = "CNAME";

/// IPv4 address record type (conflict signal only)
pub const RECORD_TYPE_A: &str = "A";

/// IPv6 address record type (conflict signal only)
pub const RECORD_TYPE_AAAA: &str = "AAAA";

/// TTL value meaning "automatic" in the Cloudflare API
pub const CLOUDFLARE_AUTO_TTL: u32 = 1;

/// Zone status filter used when listing zones
pub const ZONE_STATUS_ACTIVE: &str = "active";

/// Default Cloudflare v4 API base URL
pub const DEFAULT_CLOUDFLARE_API_URL: &str = "https://api.cloudflare.com/client/v4";

/// Page size for paginated Cloudflare list calls
pub const CLOUDFLARE_LIST_PAGE_SIZE: u32 = 100;

/// Timeout for a single Cloudflare HTTP request
pub const CLOUDFLARE_REQUEST_TIMEOUT_SECS: u64 = 30;

/// User agent sent with Cloudflare API requests
pub const USER_AGENT: &str = concat!("tunnel-manager/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Kubernetes API Constants
// ============================================================================

/// Page size for Kubernetes list operations
pub const KUBE_LIST_PAGE_SIZE: u32 = 100;

// ============================================================================
// Controller Constants
// ============================================================================

/// Default interval between reconciliation cycles
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 15;

/// Default bind address of the metrics and health server
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Stage label for the cluster state derivation
pub const STAGE_DERIVE: &str = "derive";

/// Stage label for the tunnel configuration publish
pub const STAGE_TUNNEL: &str = "tunnel";

/// Stage label for the DNS reconciliation
pub const STAGE_DNS: &str = "dns";
