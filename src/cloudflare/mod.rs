// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cloudflare DNS and Tunnel API access.
//!
//! The reconcilers depend only on the [`DnsApi`] and [`TunnelApi`] traits.
//! [`CloudflareClient`] implements both against the v4 REST API; tests supply
//! in-memory implementations.
//!
//! # Example
//!
//! ```rust,no_run
//! use tunnel_manager::cloudflare::{CloudflareClient, DnsApi};
//! use tunnel_manager::constants::DEFAULT_CLOUDFLARE_API_URL;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = CloudflareClient::new(DEFAULT_CLOUDFLARE_API_URL, "api-token")?;
//! let zones = client.list_zones("account-id", 1, 100).await?;
//! for zone in zones.items {
//!     println!("{} {}", zone.id, zone.name);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
pub mod types;

use async_trait::async_trait;

use crate::errors::CloudflareError;
use crate::pagination::Page;

pub use client::CloudflareClient;
pub use types::{
    DnsRecord, DnsRecordPatch, IngressRule, NewDnsRecord, OriginRequest, TunnelConfig, Zone,
};

/// Zone and DNS record operations.
#[async_trait]
pub trait DnsApi: Send + Sync {
    /// List one page of the account's active zones.
    async fn list_zones(
        &self,
        account_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<Zone>, CloudflareError>;

    /// List one page of a zone's DNS records.
    async fn list_records(
        &self,
        zone_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<DnsRecord>, CloudflareError>;

    /// Create a record in the zone.
    async fn create_record(
        &self,
        zone_id: &str,
        record: &NewDnsRecord,
    ) -> Result<DnsRecord, CloudflareError>;

    /// Patch the content and comment of an existing record.
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        patch: &DnsRecordPatch,
    ) -> Result<DnsRecord, CloudflareError>;

    /// Delete a record.
    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<(), CloudflareError>;
}

/// Tunnel configuration operations.
#[async_trait]
pub trait TunnelApi: Send + Sync {
    /// Replace the full remotely-managed configuration of a tunnel.
    async fn put_configuration(
        &self,
        account_id: &str,
        tunnel_id: &str,
        config: &TunnelConfig,
    ) -> Result<(), CloudflareError>;
}
