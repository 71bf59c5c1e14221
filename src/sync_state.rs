// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired routing state for one reconciliation cycle.
//!
//! A [`SyncState`] maps each public hostname to exactly one upstream service
//! target. It is built fresh by the state deriver on every cycle and then handed
//! read-only to both the tunnel publisher and the DNS reconciler.
//!
//! # Example
//!
//! ```rust
//! use tunnel_manager::sync_state::SyncState;
//!
//! let mut state = SyncState::new();
//! state.append("api.example.com", "http://api.default.svc.cluster.local:80").unwrap();
//!
//! // Hostnames are normalized, so this is a duplicate
//! assert!(state.append("API.example.com.", "http://other.default.svc.cluster.local:80").is_err());
//! assert_eq!(state.len(), 1);
//! ```

use std::collections::btree_map::{self, BTreeMap, Entry};

use tracing::info;

use crate::errors::SyncStateError;
use crate::hostname::normalize_host;

/// Injective mapping from normalized hostname to upstream service target.
///
/// Iteration order is ascending by hostname.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    host_to_service: BTreeMap<String, String>,
}

impl SyncState {
    /// Create an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `hostname` to `target`.
    ///
    /// The hostname is normalized (trimmed, trailing dot removed, lowercased)
    /// before insertion.
    ///
    /// # Errors
    ///
    /// Returns [`SyncStateError::DuplicateHostname`] if the hostname is already
    /// mapped, and [`SyncStateError::EmptyHostname`] if it is blank. The state is
    /// not modified on error.
    pub fn append(&mut self, hostname: &str, target: &str) -> Result<(), SyncStateError> {
        let hostname = normalize_host(hostname);
        if hostname.is_empty() {
            return Err(SyncStateError::EmptyHostname);
        }

        match self.host_to_service.entry(hostname) {
            Entry::Occupied(entry) => Err(SyncStateError::DuplicateHostname {
                hostname: entry.key().clone(),
                existing: entry.get().clone(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(target.to_string());
                Ok(())
            }
        }
    }

    /// Number of hostname mappings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.host_to_service.len()
    }

    /// Returns `true` when no hostname is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.host_to_service.is_empty()
    }

    /// Look up the target of a hostname (normalized before lookup).
    #[must_use]
    pub fn get(&self, hostname: &str) -> Option<&str> {
        self.host_to_service
            .get(&normalize_host(hostname))
            .map(String::as_str)
    }

    /// Iterate over `(hostname, target)` pairs in ascending hostname order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.host_to_service.iter()
    }

    /// Iterate over the normalized hostnames in ascending order.
    pub fn hostnames(&self) -> impl Iterator<Item = &str> {
        self.host_to_service.keys().map(String::as_str)
    }

    /// Emit one info event per mapping.
    pub fn log_mappings(&self) {
        for (hostname, service) in &self.host_to_service {
            info!(hostname = %hostname, service = %service, "hostname -> service");
        }
    }
}

impl<'a> IntoIterator for &'a SyncState {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
#[path = "sync_state_tests.rs"]
mod sync_state_tests;
