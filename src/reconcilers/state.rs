// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired-state derivation from annotated Kubernetes Services.
//!
//! A Service opts in by carrying the hostnames annotation. Its upstream port is
//! taken from the port annotation when that holds a valid port, otherwise from
//! the first declared service port. Every hostname listed on the Service is
//! routed to `http://<service>.<namespace>.svc.cluster.local:<port>`.
//!
//! Namespaces are visited in lexicographic order, so when two Services claim
//! the same hostname the outcome is stable across cycles.

use tracing::{debug, info, warn};

use crate::constants::{
    CLUSTER_SERVICE_DOMAIN, DEFAULT_HOSTNAMES_ANNOTATION, DEFAULT_UPSTREAM_PORT_ANNOTATION,
    UPSTREAM_SCHEME,
};
use crate::errors::ReconcileError;
use crate::kube_discovery::{ServiceDiscovery, ServiceInfo};
use crate::sync_state::SyncState;

/// Annotation keys a Service uses to opt in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConventions {
    /// Annotation listing the public hostnames of the Service
    pub hostnames_annotation: String,
    /// Annotation overriding the upstream port
    pub upstream_port_annotation: String,
}

impl Default for ServiceConventions {
    fn default() -> Self {
        Self {
            hostnames_annotation: DEFAULT_HOSTNAMES_ANNOTATION.to_string(),
            upstream_port_annotation: DEFAULT_UPSTREAM_PORT_ANNOTATION.to_string(),
        }
    }
}

/// Split a hostnames annotation value on commas and whitespace.
///
/// Consecutive separators collapse and empty tokens are dropped.
///
/// # Example
///
/// ```rust
/// use tunnel_manager::reconcilers::state::parse_hostnames;
///
/// assert_eq!(
///     parse_hostnames(" a.example.com,b.example.com  c.example.com ,"),
///     vec!["a.example.com", "b.example.com", "c.example.com"]
/// );
/// ```
#[must_use]
pub fn parse_hostnames(raw: &str) -> Vec<&str> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Choose the upstream port of a Service.
///
/// Priority:
/// 1. The port annotation, if it parses as an integer in `1..=65535`
///    (an invalid value is logged and ignored)
/// 2. The first declared service port
///
/// Returns `None` when neither yields a port.
#[must_use]
pub fn resolve_upstream_port(service: &ServiceInfo, port_annotation: &str) -> Option<u16> {
    if let Some(raw) = service
        .annotations
        .get(port_annotation)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
    {
        match raw.parse::<u16>() {
            Ok(port) if port != 0 => {
                debug!(
                    namespace = %service.namespace,
                    service = %service.name,
                    annotation = port_annotation,
                    port = port,
                    "Using port annotation as upstream port"
                );
                return Some(port);
            }
            _ => warn!(
                namespace = %service.namespace,
                service = %service.name,
                annotation = port_annotation,
                invalid_value = raw,
                "Service has invalid port annotation; falling back to first declared port"
            ),
        }
    }

    let port = service
        .ports
        .first()
        .and_then(|port| u16::try_from(*port).ok())
        .filter(|port| *port != 0)?;

    debug!(
        namespace = %service.namespace,
        service = %service.name,
        port = port,
        "Using first declared port as upstream port"
    );
    Some(port)
}

/// In-cluster URL of a Service port.
#[must_use]
pub fn service_target(name: &str, namespace: &str, port: u16) -> String {
    format!("{UPSTREAM_SCHEME}://{name}.{namespace}.{CLUSTER_SERVICE_DOMAIN}:{port}")
}

/// Build the desired state from every annotated Service in the cluster.
///
/// Only the namespace listing is fatal. A namespace whose services cannot be
/// listed is skipped with a warning, as are Services without a usable port and
/// hostnames already claimed by an earlier Service.
///
/// # Errors
///
/// Returns [`ReconcileError::NamespaceListing`] if namespaces cannot be listed.
pub async fn derive_sync_state(
    discovery: &dyn ServiceDiscovery,
    conventions: &ServiceConventions,
) -> Result<SyncState, ReconcileError> {
    info!("Reading cluster state");

    let mut namespaces =
        discovery
            .list_namespaces()
            .await
            .map_err(|e| ReconcileError::NamespaceListing {
                reason: format!("{e:#}"),
            })?;
    namespaces.sort();
    debug!(namespaces = %namespaces.join(", "), "Listed namespaces");

    let mut state = SyncState::new();

    for namespace in &namespaces {
        let services = match discovery.list_services(namespace).await {
            Ok(services) => services,
            Err(e) => {
                warn!(
                    namespace = %namespace,
                    error = %format!("{e:#}"),
                    "Failed to list services in namespace; skipping"
                );
                continue;
            }
        };

        for service in &services {
            add_service(&mut state, service, conventions);
        }
    }

    info!(hostnames = state.len(), "Finished reading cluster state");
    Ok(state)
}

fn add_service(state: &mut SyncState, service: &ServiceInfo, conventions: &ServiceConventions) {
    let Some(raw_hostnames) = service
        .annotations
        .get(&conventions.hostnames_annotation)
        .filter(|value| !value.trim().is_empty())
    else {
        debug!(
            namespace = %service.namespace,
            service = %service.name,
            "Service has no hostnames annotation; skipping"
        );
        return;
    };

    let Some(port) = resolve_upstream_port(service, &conventions.upstream_port_annotation) else {
        info!(
            namespace = %service.namespace,
            service = %service.name,
            "Service has no usable port; skipping"
        );
        return;
    };

    let target = service_target(&service.name, &service.namespace, port);

    for hostname in parse_hostnames(raw_hostnames) {
        match state.append(hostname, &target) {
            Ok(()) => info!(
                namespace = %service.namespace,
                service = %service.name,
                hostname = hostname,
                target = %target,
                "Mapped hostname to service"
            ),
            Err(e) => warn!(
                namespace = %service.namespace,
                service = %service.name,
                hostname = hostname,
                target = %target,
                error = %e,
                "Failed to map hostname to service; skipping"
            ),
        }
    }
}
