// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS reconciliation of tunnel CNAMEs.
//!
//! Each desired hostname should resolve through a proxied CNAME pointing at
//! `<tunnel_id>.cfargotunnel.com`. The reconciler only ever touches CNAMEs whose
//! comment carries the ownership marker:
//!
//! | CNAME exists | Desired | Managed | Action                          |
//! |--------------|---------|---------|---------------------------------|
//! | yes          | no      | yes     | delete                          |
//! | yes          | no      | no      | leave untouched, warn           |
//! | yes          | yes     | yes     | repoint if content differs      |
//! | yes          | yes     | no      | leave untouched, warn           |
//! | no           | yes     | -       | create, unless an A/AAAA exists |
//!
//! Every active zone of the account is visited, including zones without desired
//! hostnames, so managed CNAMEs are cleaned up once their last hostname is gone.
//! A failing zone is abandoned and reported after the remaining zones ran.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, info, warn};

use crate::cloudflare::{DnsApi, DnsRecord, DnsRecordPatch, NewDnsRecord, Zone};
use crate::constants::{
    CLOUDFLARE_LIST_PAGE_SIZE, RECORD_TYPE_A, RECORD_TYPE_AAAA, RECORD_TYPE_CNAME,
};
use crate::errors::{CloudflareError, ReconcileError, RecordAction};
use crate::hostname::{best_matching_zone, equal_dns_host, normalize_host};
use crate::metrics::{record_dns_mutation, record_dns_skipped};
use crate::pagination::collect_pages;
use crate::sync_state::SyncState;

/// Skip reason label for CNAMEs without the ownership marker
const SKIP_UNMANAGED: &str = "unmanaged_record";

/// Skip reason label for hostnames that already have an A/AAAA record
const SKIP_ADDRESS_RECORD: &str = "address_record";

/// Skip reason label for hostnames outside every zone of the account
const SKIP_NO_ZONE: &str = "no_zone";

/// Hostname every managed CNAME points at.
///
/// # Example
///
/// ```rust
/// use tunnel_manager::reconcilers::dns::tunnel_target;
///
/// assert_eq!(tunnel_target("abc123", "cfargotunnel.com"), "abc123.cfargotunnel.com");
/// ```
#[must_use]
pub fn tunnel_target(tunnel_id: &str, suffix: &str) -> String {
    format!("{tunnel_id}.{suffix}")
}

/// Counters describing one DNS reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsSyncSummary {
    /// Zones whose records were loaded
    pub zones_visited: usize,
    /// Zones abandoned after an API error
    pub zones_failed: usize,
    /// CNAMEs created
    pub created: usize,
    /// CNAMEs repointed at the tunnel
    pub updated: usize,
    /// Orphaned managed CNAMEs removed
    pub deleted: usize,
    /// Managed CNAMEs already pointing at the tunnel
    pub unchanged: usize,
    /// CNAMEs left alone because they lack the ownership marker
    pub skipped_unmanaged: usize,
    /// Hostnames not created because an A/AAAA record exists
    pub skipped_address_conflict: usize,
    /// Hostnames outside every zone of the account
    pub skipped_no_zone: usize,
}

impl DnsSyncSummary {
    /// Total number of create, update and delete calls that succeeded.
    #[must_use]
    pub fn mutations(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

/// Hostnames grouped by the zone that owns them.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ZoneAssignment {
    /// Zone index (into the zone list) -> normalized hostnames
    pub by_zone: BTreeMap<usize, BTreeSet<String>>,
    /// Hostnames no zone matched
    pub unmatched: Vec<String>,
}

/// Assign each hostname of `state` to the zone with the longest matching name.
#[must_use]
pub fn assign_zones(state: &SyncState, zones: &[Zone]) -> ZoneAssignment {
    let zone_names: Vec<&str> = zones.iter().map(|zone| zone.name.as_str()).collect();
    let mut assignment = ZoneAssignment::default();

    for hostname in state.hostnames() {
        let hostname = normalize_host(hostname);
        match best_matching_zone(&hostname, &zone_names) {
            Some(index) => {
                assignment
                    .by_zone
                    .entry(index)
                    .or_default()
                    .insert(hostname);
            }
            None => assignment.unmatched.push(hostname),
        }
    }

    assignment
}

/// The records of one zone the diff looks at, keyed by normalized name.
#[derive(Debug, Default)]
struct ZoneRecords {
    cname_by_name: BTreeMap<String, DnsRecord>,
    address_names: BTreeSet<String>,
}

impl ZoneRecords {
    fn index(records: Vec<DnsRecord>) -> Self {
        let mut indexed = Self::default();
        for record in records {
            let name = normalize_host(&record.name);
            match record.record_type.as_str() {
                RECORD_TYPE_A | RECORD_TYPE_AAAA => {
                    indexed.address_names.insert(name);
                }
                RECORD_TYPE_CNAME => {
                    indexed.cname_by_name.insert(name, record);
                }
                _ => {}
            }
        }
        indexed
    }
}

/// Reconciles managed CNAMEs of every active zone of one account.
pub struct DnsReconciler<'a> {
    api: &'a dyn DnsApi,
    account_id: &'a str,
    target: &'a str,
    marker: &'a str,
}

impl<'a> DnsReconciler<'a> {
    /// # Arguments
    ///
    /// * `api` - DNS API implementation
    /// * `account_id` - Account whose zones are reconciled
    /// * `target` - CNAME content, see [`tunnel_target`]
    /// * `marker` - Comment substring marking a CNAME as managed
    #[must_use]
    pub fn new(api: &'a dyn DnsApi, account_id: &'a str, target: &'a str, marker: &'a str) -> Self {
        Self {
            api,
            account_id,
            target,
            marker,
        }
    }

    /// Bring the account's CNAMEs in line with `state`.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::ZoneListing`] if the zones cannot be listed, or
    /// [`ReconcileError::ZonesFailed`] naming every zone that could not be fully
    /// reconciled. Changes made before a failure are kept.
    pub async fn reconcile(&self, state: &SyncState) -> Result<DnsSyncSummary, ReconcileError> {
        info!(
            account_id = self.account_id,
            target = self.target,
            hostnames = state.len(),
            "Starting DNS sync"
        );

        let mut summary = DnsSyncSummary::default();

        let zones = self.load_zones().await?;
        if zones.is_empty() {
            warn!(
                account_id = self.account_id,
                "No active zones found for account; nothing to sync"
            );
            return Ok(summary);
        }

        let assignment = assign_zones(state, &zones);
        for hostname in &assignment.unmatched {
            warn!(
                hostname = %hostname,
                account_id = self.account_id,
                "No matching zone found for hostname; skipping"
            );
            record_dns_skipped(SKIP_NO_ZONE);
        }
        summary.skipped_no_zone = assignment.unmatched.len();

        let no_hosts = BTreeSet::new();
        let mut failures: Vec<(String, ReconcileError)> = Vec::new();

        for (index, zone) in zones.iter().enumerate() {
            let hosts = assignment.by_zone.get(&index).unwrap_or(&no_hosts);
            if let Err(e) = self.sync_zone(zone, hosts, state, &mut summary).await {
                error!(
                    zone = %zone.name,
                    zone_id = %zone.id,
                    error = %e,
                    "DNS sync failed for zone; continuing with remaining zones"
                );
                failures.push((zone.name.clone(), e));
            }
        }

        summary.zones_failed = failures.len();

        let mut failures = failures.into_iter();
        if let Some((first_zone, first)) = failures.next() {
            let mut failed_zones = vec![first_zone];
            failed_zones.extend(failures.map(|(zone, _)| zone));
            return Err(ReconcileError::ZonesFailed {
                failed_zones,
                first: Box::new(first),
            });
        }

        info!(
            zones = summary.zones_visited,
            created = summary.created,
            updated = summary.updated,
            deleted = summary.deleted,
            unchanged = summary.unchanged,
            "DNS sync finished"
        );
        Ok(summary)
    }

    async fn load_zones(&self) -> Result<Vec<Zone>, ReconcileError> {
        let zones = collect_pages(move |page| async move {
            debug!(account_id = self.account_id, page = page, "Requesting zones page");
            self.api
                .list_zones(self.account_id, page, CLOUDFLARE_LIST_PAGE_SIZE)
                .await
        })
        .await
        .map_err(|source| ReconcileError::ZoneListing {
            account_id: self.account_id.to_string(),
            source,
        })?;

        debug!(account_id = self.account_id, zones = zones.len(), "Loaded zones");
        Ok(zones)
    }

    async fn load_records(&self, zone: &Zone) -> Result<Vec<DnsRecord>, ReconcileError> {
        let records = collect_pages(move |page| async move {
            debug!(zone = %zone.name, page = page, "Requesting DNS records page");
            self.api
                .list_records(&zone.id, page, CLOUDFLARE_LIST_PAGE_SIZE)
                .await
        })
        .await
        .map_err(|source| ReconcileError::RecordListing {
            zone: zone.name.clone(),
            zone_id: zone.id.clone(),
            source,
        })?;

        Ok(records
            .into_iter()
            .filter(|record| {
                matches!(
                    record.record_type.as_str(),
                    RECORD_TYPE_A | RECORD_TYPE_AAAA | RECORD_TYPE_CNAME
                )
            })
            .collect())
    }

    async fn sync_zone(
        &self,
        zone: &Zone,
        hosts: &BTreeSet<String>,
        state: &SyncState,
        summary: &mut DnsSyncSummary,
    ) -> Result<(), ReconcileError> {
        let records = ZoneRecords::index(self.load_records(zone).await?);
        summary.zones_visited += 1;

        debug!(
            zone = %zone.name,
            desired = hosts.len(),
            cnames = records.cname_by_name.len(),
            "Syncing zone records"
        );

        for (name, record) in &records.cname_by_name {
            let desired = hosts.contains(name);
            let managed = record.is_managed(self.marker);

            match (desired, managed) {
                (false, true) => {
                    info!(
                        zone = %zone.name,
                        hostname = %name,
                        record_id = %record.id,
                        content = %record.content,
                        "Deleting managed CNAME for hostname no longer desired"
                    );
                    let result = self.api.delete_record(&zone.id, &record.id).await;
                    self.check_mutation(
                        RecordAction::Delete,
                        zone,
                        name,
                        Some(record.id.as_str()),
                        result,
                    )?;
                    summary.deleted += 1;
                }
                (false, false) => {
                    warn!(
                        zone = %zone.name,
                        hostname = %name,
                        record_id = %record.id,
                        content = %record.content,
                        "Unmanaged CNAME for hostname not in desired state; leaving untouched"
                    );
                    record_dns_skipped(SKIP_UNMANAGED);
                    summary.skipped_unmanaged += 1;
                }
                (true, true) if equal_dns_host(&record.content, self.target) => {
                    debug!(
                        zone = %zone.name,
                        hostname = %name,
                        record_id = %record.id,
                        "Managed CNAME already points at tunnel; no change"
                    );
                    summary.unchanged += 1;
                }
                (true, true) => {
                    info!(
                        zone = %zone.name,
                        hostname = %name,
                        record_id = %record.id,
                        old_content = %record.content,
                        new_content = self.target,
                        "Updating managed CNAME to tunnel target"
                    );
                    let patch = DnsRecordPatch {
                        content: self.target.to_string(),
                        comment: self.marker.to_string(),
                    };
                    let result = self
                        .api
                        .update_record(&zone.id, &record.id, &patch)
                        .await
                        .map(|_| ());
                    self.check_mutation(
                        RecordAction::Update,
                        zone,
                        name,
                        Some(record.id.as_str()),
                        result,
                    )?;
                    summary.updated += 1;
                }
                (true, false) => {
                    warn!(
                        zone = %zone.name,
                        hostname = %name,
                        record_id = %record.id,
                        content = %record.content,
                        comment = record.comment.as_deref().unwrap_or_default(),
                        "Desired hostname has a CNAME without the ownership marker; leaving untouched"
                    );
                    record_dns_skipped(SKIP_UNMANAGED);
                    summary.skipped_unmanaged += 1;
                }
            }
        }

        for host in hosts {
            if records.cname_by_name.contains_key(host) {
                continue;
            }

            if records.address_names.contains(host) {
                warn!(
                    zone = %zone.name,
                    hostname = %host,
                    "A/AAAA records exist for hostname; skipping CNAME creation"
                );
                record_dns_skipped(SKIP_ADDRESS_RECORD);
                summary.skipped_address_conflict += 1;
                continue;
            }

            info!(
                zone = %zone.name,
                hostname = %host,
                target = self.target,
                service = state.get(host).unwrap_or_default(),
                "Creating managed CNAME"
            );
            let record = NewDnsRecord::managed_cname(host, self.target, self.marker);
            let result = self.api.create_record(&zone.id, &record).await.map(|_| ());
            self.check_mutation(RecordAction::Create, zone, host, None, result)?;
            summary.created += 1;
        }

        Ok(())
    }

    /// Record the outcome of a mutation and wrap a failure with its context.
    fn check_mutation(
        &self,
        action: RecordAction,
        zone: &Zone,
        hostname: &str,
        record_id: Option<&str>,
        result: Result<(), CloudflareError>,
    ) -> Result<(), ReconcileError> {
        record_dns_mutation(action.as_str(), result.is_ok());
        result.map_err(|source| ReconcileError::RecordMutation {
            action,
            zone: zone.name.clone(),
            zone_id: zone.id.clone(),
            hostname: hostname.to_string(),
            record_id: record_id.map(str::to_string),
            source,
        })
    }
}
