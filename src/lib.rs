// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # Tunnel Manager - Cloudflare Tunnel sync for Kubernetes Services
//!
//! Tunnel Manager publishes Kubernetes Services through a single Cloudflare
//! Tunnel. Services opt in with an annotation listing public hostnames; the
//! controller keeps the tunnel ingress rules and the matching DNS CNAMEs in
//! line with the cluster.
//!
//! ## Overview
//!
//! Each sync cycle:
//!
//! - Lists every Service in every namespace and collects annotated hostnames
//! - Replaces the tunnel ingress configuration with one rule per hostname
//! - Creates, repoints and deletes CNAMEs carrying the managed-record marker
//!
//! ## Modules
//!
//! - [`config`] - Flags and environment variables
//! - [`driver`] - Interval loop running the sync stages
//! - [`reconcilers`] - Derive, tunnel and DNS stages
//! - [`cloudflare`] - Cloudflare v4 API client and wire types
//! - [`kube_discovery`] - Namespace and Service listing
//! - [`sync_state`] - Desired hostname to upstream mapping
//! - [`hostname`] - DNS name normalization and zone matching
//! - [`metrics`] - Prometheus metrics
//!
//! ## Annotating a Service
//!
//! ```yaml
//! apiVersion: v1
//! kind: Service
//! metadata:
//!   name: web
//!   annotations:
//!     cloudflare-tunnel-hostnames: app.example.com,www.example.com
//!     cloudflare-tunnel-upstream-port: "8080"
//! ```
//!
//! The Service above is reachable at both hostnames through
//! `http://web.<namespace>.svc.cluster.local:8080`.

pub mod cloudflare;
pub mod config;
pub mod constants;
pub mod driver;
pub mod errors;
pub mod hostname;
pub mod kube_discovery;
pub mod metrics;
pub mod pagination;
pub mod reconcilers;
pub mod retry;
pub mod sync_state;

#[cfg(test)]
pub(crate) mod testing;
