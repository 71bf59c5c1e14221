// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tunnel ingress publishing.
//!
//! The whole ingress list is rebuilt from the desired state and replaced in one
//! call on every cycle; there is no diffing against the remote configuration.

use tracing::info;

use crate::cloudflare::{IngressRule, TunnelApi, TunnelConfig};
use crate::errors::ReconcileError;
use crate::sync_state::SyncState;

/// One rule per mapping, sorted by hostname, followed by the catch-all rule.
#[must_use]
pub fn build_ingress_rules(state: &SyncState) -> Vec<IngressRule> {
    state
        .iter()
        .map(|(hostname, target)| IngressRule::route(hostname, target))
        .chain(std::iter::once(IngressRule::catch_all()))
        .collect()
}

/// Replace the tunnel's ingress configuration with the rules for `state`.
///
/// # Errors
///
/// Returns [`ReconcileError::TunnelPublish`] if the configuration call fails.
pub async fn publish_tunnel(
    api: &dyn TunnelApi,
    account_id: &str,
    tunnel_id: &str,
    state: &SyncState,
) -> Result<(), ReconcileError> {
    let config = TunnelConfig {
        ingress: build_ingress_rules(state),
    };

    info!(
        tunnel_id = tunnel_id,
        rules = config.ingress.len(),
        "Publishing tunnel ingress configuration"
    );

    api.put_configuration(account_id, tunnel_id, &config)
        .await
        .map_err(|source| ReconcileError::TunnelPublish {
            tunnel_id: tunnel_id.to_string(),
            source,
        })?;

    info!(tunnel_id = tunnel_id, "Tunnel ingress configuration updated");
    Ok(())
}
