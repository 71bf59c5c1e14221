// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Polling driver running sync cycles on a fixed interval.
//!
//! A cycle runs three stages in order:
//!
//! 1. derive the desired state from the cluster
//! 2. publish the tunnel ingress configuration
//! 3. reconcile DNS records
//!
//! A derive failure skips the rest of the cycle, since there is no state to
//! push. Tunnel and DNS failures are logged and counted, and never stop the
//! loop. Cycles never overlap: the next wait starts only after the previous
//! cycle returned.
//!
//! All events of a cycle go to the [`Dispatch`] handed to the [`Controller`],
//! not to whatever subscriber happens to be the global default.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument::WithSubscriber;
use tracing::{info, warn, Dispatch};

use crate::cloudflare::{DnsApi, TunnelApi};
use crate::constants::{STAGE_DERIVE, STAGE_DNS, STAGE_TUNNEL};
use crate::errors::error_chain;
use crate::kube_discovery::ServiceDiscovery;
use crate::metrics::{record_stage_error, record_stage_success, set_desired_hostnames};
use crate::reconcilers::{
    derive_sync_state, publish_tunnel, DnsReconciler, DnsSyncSummary, ServiceConventions,
};

/// Values the sync stages need from the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Cloudflare account identifier
    pub account_id: String,
    /// Cloudflare tunnel identifier
    pub tunnel_id: String,
    /// CNAME content of managed records, `<tunnel_id>.<suffix>`
    pub tunnel_target: String,
    /// Comment substring marking a record as managed
    pub managed_marker: String,
    /// Annotation keys read from Services
    pub conventions: ServiceConventions,
    /// Pause between the end of one cycle and the start of the next
    pub interval: Duration,
}

/// What one cycle achieved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Number of desired hostnames, `None` if derivation failed
    pub hostnames: Option<usize>,
    /// Whether the tunnel configuration was replaced
    pub tunnel_published: bool,
    /// DNS summary, `None` if the DNS stage failed or did not run
    pub dns: Option<DnsSyncSummary>,
}

/// Owns the collaborators of the sync loop.
pub struct Controller {
    discovery: Arc<dyn ServiceDiscovery>,
    tunnel_api: Arc<dyn TunnelApi>,
    dns_api: Arc<dyn DnsApi>,
    settings: ControllerSettings,
    dispatch: Dispatch,
}

impl Controller {
    /// # Arguments
    ///
    /// * `discovery` - Source of namespaces and services
    /// * `tunnel_api` - Tunnel configuration endpoint
    /// * `dns_api` - Zone and record endpoint
    /// * `settings` - Identifiers, conventions and interval
    /// * `dispatch` - Receiver of every event emitted by a cycle
    #[must_use]
    pub fn new(
        discovery: Arc<dyn ServiceDiscovery>,
        tunnel_api: Arc<dyn TunnelApi>,
        dns_api: Arc<dyn DnsApi>,
        settings: ControllerSettings,
        dispatch: Dispatch,
    ) -> Self {
        Self {
            discovery,
            tunnel_api,
            dns_api,
            settings,
            dispatch,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Run one derive, publish and reconcile pass. Never fails.
    pub async fn run_cycle(&self) -> CycleOutcome {
        self.cycle().with_subscriber(self.dispatch.clone()).await
    }

    /// Run cycles until `shutdown` resolves.
    ///
    /// The first cycle starts immediately. `shutdown` is only observed between
    /// cycles; a running cycle is allowed to finish.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!(
            interval_secs = self.settings.interval.as_secs(),
            tunnel_id = %self.settings.tunnel_id,
            "Starting sync loop"
        );

        loop {
            self.run_cycle().await;

            tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown requested; stopping sync loop");
                    break;
                }
                () = tokio::time::sleep(self.settings.interval) => {}
            }
        }
    }

    async fn cycle(&self) -> CycleOutcome {
        let cycle_start = Instant::now();
        let mut outcome = CycleOutcome::default();
        info!("Starting sync cycle");

        let stage_start = Instant::now();
        let state =
            match derive_sync_state(self.discovery.as_ref(), &self.settings.conventions).await {
                Ok(state) => {
                    record_stage_success(STAGE_DERIVE, stage_start.elapsed());
                    set_desired_hostnames(state.len());
                    state
                }
                Err(e) => {
                    record_stage_error(STAGE_DERIVE, stage_start.elapsed());
                    warn!(error = %error_chain(&e), "Failed to read cluster state; skipping cycle");
                    return outcome;
                }
            };
        outcome.hostnames = Some(state.len());
        state.log_mappings();

        let stage_start = Instant::now();
        match publish_tunnel(
            self.tunnel_api.as_ref(),
            &self.settings.account_id,
            &self.settings.tunnel_id,
            &state,
        )
        .await
        {
            Ok(()) => {
                record_stage_success(STAGE_TUNNEL, stage_start.elapsed());
                outcome.tunnel_published = true;
            }
            Err(e) => {
                record_stage_error(STAGE_TUNNEL, stage_start.elapsed());
                warn!(error = %error_chain(&e), "Failed to sync tunnel configuration");
            }
        }

        let stage_start = Instant::now();
        let reconciler = DnsReconciler::new(
            self.dns_api.as_ref(),
            &self.settings.account_id,
            &self.settings.tunnel_target,
            &self.settings.managed_marker,
        );
        match reconciler.reconcile(&state).await {
            Ok(summary) => {
                record_stage_success(STAGE_DNS, stage_start.elapsed());
                outcome.dns = Some(summary);
            }
            Err(e) => {
                record_stage_error(STAGE_DNS, stage_start.elapsed());
                warn!(error = %error_chain(&e), "Failed to sync DNS records");
            }
        }

        info!(
            elapsed_ms = u64::try_from(cycle_start.elapsed().as_millis()).unwrap_or(u64::MAX),
            hostnames = state.len(),
            tunnel_published = outcome.tunnel_published,
            dns_synced = outcome.dns.is_some(),
            "Sync cycle finished"
        );
        outcome
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod driver_tests;
