// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Service discovery against the Kubernetes API.
//!
//! The state deriver only needs namespace names and, per namespace, each
//! service's name, annotations and declared ports. [`ServiceDiscovery`] captures
//! exactly that; [`KubeServiceDiscovery`] implements it with `kube` list calls,
//! following continue tokens and retrying transient API errors.

use anyhow::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Service};
use kube::{api::ListParams, Api, Client, ResourceExt};
use std::collections::BTreeMap;

use crate::pagination::list_all_paginated;
use crate::retry::retry_api_call;

/// The parts of a Kubernetes Service the state deriver reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceInfo {
    /// Service name
    pub name: String,
    /// Namespace the service lives in
    pub namespace: String,
    /// Service annotations
    pub annotations: BTreeMap<String, String>,
    /// Declared service ports, in declaration order
    pub ports: Vec<i32>,
}

impl ServiceInfo {
    /// Extract the fields the deriver needs from a Kubernetes `Service`.
    #[must_use]
    pub fn from_service(service: &Service, namespace: &str) -> Self {
        let ports = service
            .spec
            .as_ref()
            .and_then(|spec| spec.ports.as_ref())
            .map(|ports| ports.iter().map(|p| p.port).collect())
            .unwrap_or_default();

        Self {
            name: service.name_any(),
            namespace: service
                .namespace()
                .unwrap_or_else(|| namespace.to_string()),
            annotations: service.annotations().clone(),
            ports,
        }
    }
}

/// Read-only view of the cluster's namespaces and services.
#[async_trait]
pub trait ServiceDiscovery: Send + Sync {
    /// Names of all namespaces.
    ///
    /// # Errors
    ///
    /// Returns an error if namespaces cannot be listed.
    async fn list_namespaces(&self) -> Result<Vec<String>>;

    /// Services of one namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if services cannot be listed.
    async fn list_services(&self, namespace: &str) -> Result<Vec<ServiceInfo>>;
}

/// [`ServiceDiscovery`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeServiceDiscovery {
    client: Client,
}

impl KubeServiceDiscovery {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ServiceDiscovery for KubeServiceDiscovery {
    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let namespaces = retry_api_call(
            || list_all_paginated(&api, ListParams::default()),
            "list namespaces",
        )
        .await?;

        Ok(namespaces.iter().map(ResourceExt::name_any).collect())
    }

    async fn list_services(&self, namespace: &str) -> Result<Vec<ServiceInfo>> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let services = retry_api_call(
            || list_all_paginated(&api, ListParams::default()),
            &format!("list services in {namespace}"),
        )
        .await?;

        Ok(services
            .iter()
            .map(|service| ServiceInfo::from_service(service, namespace))
            .collect())
    }
}

#[cfg(test)]
#[path = "kube_discovery_tests.rs"]
mod kube_discovery_tests;
