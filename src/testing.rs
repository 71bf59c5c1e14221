// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory test doubles shared by unit tests.
//!
//! - [`FakeDiscovery`] - canned namespaces and services
//! - [`FakeCloudflare`] - zones and records held in memory, with injectable failures
//! - [`EventCapture`] - a tracing layer recording every emitted event

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::{Dispatch, Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use crate::cloudflare::{
    DnsApi, DnsRecord, DnsRecordPatch, NewDnsRecord, TunnelApi, TunnelConfig, Zone,
};
use crate::errors::CloudflareError;
use crate::kube_discovery::{ServiceDiscovery, ServiceInfo};
use crate::pagination::Page;

// ============================================================
// Cluster
// ============================================================

#[derive(Default)]
pub(crate) struct FakeDiscovery {
    namespaces: Vec<String>,
    services: BTreeMap<String, Vec<ServiceInfo>>,
    failing_namespaces: BTreeSet<String>,
    fail_namespace_listing: bool,
}

impl FakeDiscovery {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a service; its namespace is registered on first use.
    pub(crate) fn with_service(
        mut self,
        namespace: &str,
        name: &str,
        annotations: &[(&str, &str)],
        ports: &[i32],
    ) -> Self {
        self.with_namespace(namespace);
        self.services
            .entry(namespace.to_string())
            .or_default()
            .push(ServiceInfo {
                name: name.to_string(),
                namespace: namespace.to_string(),
                annotations: annotations
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
                ports: ports.to_vec(),
            });
        self
    }

    pub(crate) fn with_failing_namespace(mut self, namespace: &str) -> Self {
        self.with_namespace(namespace);
        self.failing_namespaces.insert(namespace.to_string());
        self
    }

    pub(crate) fn failing_namespace_listing(mut self) -> Self {
        self.fail_namespace_listing = true;
        self
    }

    fn with_namespace(&mut self, namespace: &str) {
        if !self.namespaces.iter().any(|ns| ns == namespace) {
            self.namespaces.push(namespace.to_string());
        }
    }
}

#[async_trait]
impl ServiceDiscovery for FakeDiscovery {
    async fn list_namespaces(&self) -> anyhow::Result<Vec<String>> {
        if self.fail_namespace_listing {
            anyhow::bail!("namespaces is forbidden");
        }
        Ok(self.namespaces.clone())
    }

    async fn list_services(&self, namespace: &str) -> anyhow::Result<Vec<ServiceInfo>> {
        if self.failing_namespaces.contains(namespace) {
            anyhow::bail!("services is forbidden in {namespace}");
        }
        Ok(self.services.get(namespace).cloned().unwrap_or_default())
    }
}

// ============================================================
// Cloudflare
// ============================================================

/// One call received by [`FakeCloudflare`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ApiCall {
    ListZones { page: u32 },
    ListRecords { zone_id: String, page: u32 },
    Create { zone_id: String, name: String },
    Update { zone_id: String, record_id: String, content: String },
    Delete { zone_id: String, record_id: String },
    PutConfiguration { tunnel_id: String },
}

impl ApiCall {
    pub(crate) fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Create { .. } | Self::Update { .. } | Self::Delete { .. }
        )
    }
}

#[derive(Default)]
struct FakeCloudflareState {
    zones: Vec<Zone>,
    records: BTreeMap<String, Vec<DnsRecord>>,
    calls: Vec<ApiCall>,
    published: Vec<TunnelConfig>,
    next_record_id: u32,
    fail_zone_listing: bool,
    fail_tunnel: bool,
    failing_record_zones: BTreeSet<String>,
    failing_mutation_names: BTreeSet<String>,
}

/// In-memory Cloudflare account. List calls are paged with `page_size`.
pub(crate) struct FakeCloudflare {
    state: Mutex<FakeCloudflareState>,
    page_size: usize,
}

impl Default for FakeCloudflare {
    fn default() -> Self {
        Self {
            state: Mutex::new(FakeCloudflareState::default()),
            page_size: 100,
        }
    }
}

fn api_failure(what: &str) -> CloudflareError {
    CloudflareError::Api {
        messages: format!("injected failure: {what}"),
    }
}

fn paginate<T: Clone>(items: &[T], page: u32, page_size: usize) -> Page<T> {
    let total_pages = u32::try_from(items.len().div_ceil(page_size)).unwrap();
    let start = (page as usize - 1) * page_size;
    Page {
        items: items.iter().skip(start).take(page_size).cloned().collect(),
        page,
        total_pages,
    }
}

impl FakeCloudflare {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub(crate) fn with_zone(self, id: &str, name: &str) -> Self {
        self.lock().zones.push(Zone {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    /// Add an existing record; `comment` of `None` models an uncommented record.
    pub(crate) fn with_record(
        self,
        zone_id: &str,
        record_type: &str,
        name: &str,
        content: &str,
        comment: Option<&str>,
    ) -> Self {
        {
            let mut state = self.lock();
            state.next_record_id += 1;
            let id = format!("seed-{}", state.next_record_id);
            state
                .records
                .entry(zone_id.to_string())
                .or_default()
                .push(DnsRecord {
                    id,
                    record_type: record_type.to_string(),
                    name: name.to_string(),
                    content: content.to_string(),
                    comment: comment.map(str::to_string),
                });
        }
        self
    }

    pub(crate) fn failing_zone_listing(self) -> Self {
        self.lock().fail_zone_listing = true;
        self
    }

    pub(crate) fn failing_tunnel(self) -> Self {
        self.lock().fail_tunnel = true;
        self
    }

    pub(crate) fn failing_records_for(self, zone_id: &str) -> Self {
        self.lock().failing_record_zones.insert(zone_id.to_string());
        self
    }

    /// Make every create, update or delete of `name` fail.
    pub(crate) fn failing_mutations_for(self, name: &str) -> Self {
        self.lock().failing_mutation_names.insert(name.to_string());
        self
    }

    pub(crate) fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    pub(crate) fn mutations(&self) -> Vec<ApiCall> {
        self.calls().into_iter().filter(ApiCall::is_mutation).collect()
    }

    pub(crate) fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub(crate) fn records(&self, zone_id: &str) -> Vec<DnsRecord> {
        self.lock().records.get(zone_id).cloned().unwrap_or_default()
    }

    pub(crate) fn published(&self) -> Vec<TunnelConfig> {
        self.lock().published.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeCloudflareState> {
        self.state.lock().unwrap()
    }

    fn record_name(state: &FakeCloudflareState, zone_id: &str, record_id: &str) -> String {
        state
            .records
            .get(zone_id)
            .and_then(|records| records.iter().find(|r| r.id == record_id))
            .map(|r| r.name.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DnsApi for FakeCloudflare {
    async fn list_zones(
        &self,
        _account_id: &str,
        page: u32,
        _per_page: u32,
    ) -> Result<Page<Zone>, CloudflareError> {
        let mut state = self.lock();
        state.calls.push(ApiCall::ListZones { page });
        if state.fail_zone_listing {
            return Err(api_failure("list zones"));
        }
        Ok(paginate(&state.zones, page, self.page_size))
    }

    async fn list_records(
        &self,
        zone_id: &str,
        page: u32,
        _per_page: u32,
    ) -> Result<Page<DnsRecord>, CloudflareError> {
        let mut state = self.lock();
        state.calls.push(ApiCall::ListRecords {
            zone_id: zone_id.to_string(),
            page,
        });
        if state.failing_record_zones.contains(zone_id) {
            return Err(api_failure("list records"));
        }
        let records = state.records.get(zone_id).cloned().unwrap_or_default();
        Ok(paginate(&records, page, self.page_size))
    }

    async fn create_record(
        &self,
        zone_id: &str,
        record: &NewDnsRecord,
    ) -> Result<DnsRecord, CloudflareError> {
        let mut state = self.lock();
        state.calls.push(ApiCall::Create {
            zone_id: zone_id.to_string(),
            name: record.name.clone(),
        });
        if state.failing_mutation_names.contains(&record.name) {
            return Err(api_failure("create record"));
        }
        state.next_record_id += 1;
        let created = DnsRecord {
            id: format!("rec-{}", state.next_record_id),
            record_type: record.record_type.clone(),
            name: record.name.clone(),
            content: record.content.clone(),
            comment: Some(record.comment.clone()),
        };
        state
            .records
            .entry(zone_id.to_string())
            .or_default()
            .push(created.clone());
        Ok(created)
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        patch: &DnsRecordPatch,
    ) -> Result<DnsRecord, CloudflareError> {
        let mut state = self.lock();
        state.calls.push(ApiCall::Update {
            zone_id: zone_id.to_string(),
            record_id: record_id.to_string(),
            content: patch.content.clone(),
        });
        let name = Self::record_name(&state, zone_id, record_id);
        if state.failing_mutation_names.contains(&name) {
            return Err(api_failure("update record"));
        }
        let record = state
            .records
            .get_mut(zone_id)
            .and_then(|records| records.iter_mut().find(|r| r.id == record_id))
            .ok_or_else(|| api_failure("record not found"))?;
        record.content = patch.content.clone();
        record.comment = Some(patch.comment.clone());
        Ok(record.clone())
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<(), CloudflareError> {
        let mut state = self.lock();
        state.calls.push(ApiCall::Delete {
            zone_id: zone_id.to_string(),
            record_id: record_id.to_string(),
        });
        let name = Self::record_name(&state, zone_id, record_id);
        if state.failing_mutation_names.contains(&name) {
            return Err(api_failure("delete record"));
        }
        if let Some(records) = state.records.get_mut(zone_id) {
            records.retain(|r| r.id != record_id);
        }
        Ok(())
    }
}

#[async_trait]
impl TunnelApi for FakeCloudflare {
    async fn put_configuration(
        &self,
        _account_id: &str,
        tunnel_id: &str,
        config: &TunnelConfig,
    ) -> Result<(), CloudflareError> {
        let mut state = self.lock();
        state.calls.push(ApiCall::PutConfiguration {
            tunnel_id: tunnel_id.to_string(),
        });
        if state.fail_tunnel {
            return Err(CloudflareError::Http {
                status: 403,
                url: "http://fake/configurations".to_string(),
                message: "Authentication error".to_string(),
            });
        }
        state.published.push(config.clone());
        Ok(())
    }
}

// ============================================================
// Logging
// ============================================================

/// One captured tracing event.
#[derive(Debug, Clone)]
pub(crate) struct CapturedEvent {
    pub level: Level,
    pub message: String,
    pub fields: BTreeMap<String, String>,
}

/// Tracing layer collecting every event into a shared buffer.
#[derive(Clone, Default)]
pub(crate) struct EventCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl EventCapture {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A dispatcher routing events into this capture.
    pub(crate) fn dispatch(&self) -> Dispatch {
        Dispatch::new(tracing_subscriber::registry().with(self.clone()))
    }

    pub(crate) fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Events at `level` whose message contains `needle`.
    pub(crate) fn find(&self, level: Level, needle: &str) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.level == level && e.message.contains(needle))
            .collect()
    }
}

#[derive(Default)]
struct FieldCollector {
    message: String,
    fields: BTreeMap<String, String>,
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields
                .insert(field.name().to_string(), value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields
                .insert(field.name().to_string(), format!("{value:?}"));
        }
    }
}

impl<S: Subscriber> Layer<S> for EventCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut collector = FieldCollector::default();
        event.record(&mut collector);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message: collector.message,
            fields: collector.fields,
        });
    }
}
