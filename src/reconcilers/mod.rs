// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation stages of a sync cycle.
//!
//! Every cycle builds the desired state from the cluster and pushes it to both
//! Cloudflare surfaces:
//!
//! 1. **Derive** - [`derive_sync_state`] reads annotated Services into a [`SyncState`]
//! 2. **Tunnel** - [`publish_tunnel`] replaces the tunnel ingress rules
//! 3. **DNS** - [`DnsReconciler`] creates, repoints and deletes managed CNAMEs
//!
//! The stages share nothing but the read-only [`SyncState`], and a failing
//! tunnel publish does not prevent the DNS stage from running.
//!
//! [`SyncState`]: crate::sync_state::SyncState
//!
//! # Example
//!
//! ```rust,no_run
//! use tunnel_manager::cloudflare::CloudflareClient;
//! use tunnel_manager::kube_discovery::KubeServiceDiscovery;
//! use tunnel_manager::reconcilers::{
//!     derive_sync_state, publish_tunnel, tunnel_target, DnsReconciler, ServiceConventions,
//! };
//!
//! async fn sync_once(
//!     discovery: &KubeServiceDiscovery,
//!     cloudflare: &CloudflareClient,
//! ) -> anyhow::Result<()> {
//!     let state = derive_sync_state(discovery, &ServiceConventions::default()).await?;
//!     publish_tunnel(cloudflare, "account", "tunnel", &state).await?;
//!
//!     let target = tunnel_target("tunnel", "cfargotunnel.com");
//!     DnsReconciler::new(cloudflare, "account", &target, "managed by tunnel-manager")
//!         .reconcile(&state)
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod dns;
pub mod state;
pub mod tunnel;


pub use dns::{assign_zones, tunnel_target, DnsReconciler, DnsSyncSummary};
pub use state::{
    derive_sync_state, parse_hostnames, resolve_upstream_port, service_target,
    ServiceConventions,
};
pub use tunnel::{build_ingress_rules, publish_tunnel};
