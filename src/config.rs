// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Process configuration.
//!
//! Every setting can be given as a command-line flag or through the
//! environment variable named next to it. Only the three Cloudflare
//! identifiers are required.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `CLOUDFLARE_ACCOUNT_ID` | required |
//! | `CLOUDFLARE_TUNNEL_ID` | required |
//! | `CLOUDFLARE_API_TOKEN` | required |
//! | `SERVICE_HOSTNAMES_ANNOTATION` | `cloudflare-tunnel-hostnames` |
//! | `SERVICE_UPSTREAM_PORT_ANNOTATION` | `cloudflare-tunnel-upstream-port` |
//! | `SYNC_INTERVAL` | `15` (seconds) |
//! | `LOG_LEVEL` | `info` |
//! | `TUNNEL_TARGET_SUFFIX` | `cfargotunnel.com` |
//! | `MANAGED_RECORD_MARKER` | `managed by tunnel-manager` |
//! | `CLOUDFLARE_API_URL` | `https://api.cloudflare.com/client/v4` |
//! | `METRICS_BIND_ADDRESS` | `0.0.0.0:8080` |

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

use crate::constants::{
    DEFAULT_CLOUDFLARE_API_URL, DEFAULT_HOSTNAMES_ANNOTATION, DEFAULT_MANAGED_RECORD_MARKER,
    DEFAULT_METRICS_BIND_ADDRESS, DEFAULT_SYNC_INTERVAL_SECS, DEFAULT_TUNNEL_TARGET_SUFFIX,
    DEFAULT_UPSTREAM_PORT_ANNOTATION,
};
use crate::driver::ControllerSettings;
use crate::reconcilers::{tunnel_target, ServiceConventions};

/// Minimum severity of emitted log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    #[must_use]
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_filter())
    }
}

/// Syncs annotated Kubernetes Services into Cloudflare Tunnel ingress and DNS.
#[derive(Parser, Clone)]
#[command(name = "tunnel-manager", version, about, long_about = None)]
pub struct Config {
    /// Cloudflare account identifier
    #[arg(long, env = "CLOUDFLARE_ACCOUNT_ID")]
    pub account_id: String,

    /// Cloudflare tunnel identifier
    #[arg(long, env = "CLOUDFLARE_TUNNEL_ID")]
    pub tunnel_id: String,

    /// Cloudflare API token with DNS edit and tunnel edit permissions
    #[arg(long, env = "CLOUDFLARE_API_TOKEN", hide_env_values = true)]
    pub api_token: String,

    /// Service annotation listing public hostnames
    #[arg(long, env = "SERVICE_HOSTNAMES_ANNOTATION", default_value = DEFAULT_HOSTNAMES_ANNOTATION)]
    pub hostnames_annotation: String,

    /// Service annotation overriding the upstream port
    #[arg(long, env = "SERVICE_UPSTREAM_PORT_ANNOTATION", default_value = DEFAULT_UPSTREAM_PORT_ANNOTATION)]
    pub upstream_port_annotation: String,

    /// Seconds between sync cycles
    #[arg(
        long,
        env = "SYNC_INTERVAL",
        default_value_t = DEFAULT_SYNC_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub sync_interval: u64,

    /// Log level, overridden by `RUST_LOG` when set
    #[arg(long, env = "LOG_LEVEL", value_enum, default_value_t = LogLevel::Info, ignore_case = true)]
    pub log_level: LogLevel,

    /// Domain appended to the tunnel id to form the CNAME target
    #[arg(long, env = "TUNNEL_TARGET_SUFFIX", default_value = DEFAULT_TUNNEL_TARGET_SUFFIX)]
    pub tunnel_target_suffix: String,

    /// Comment substring marking a DNS record as owned by this controller
    #[arg(long, env = "MANAGED_RECORD_MARKER", default_value = DEFAULT_MANAGED_RECORD_MARKER)]
    pub managed_record_marker: String,

    /// Cloudflare API base URL
    #[arg(long, env = "CLOUDFLARE_API_URL", default_value = DEFAULT_CLOUDFLARE_API_URL)]
    pub cloudflare_api_url: String,

    /// Listen address of the metrics and health endpoints
    #[arg(long, env = "METRICS_BIND_ADDRESS", default_value = DEFAULT_METRICS_BIND_ADDRESS)]
    pub metrics_bind_address: SocketAddr,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("account_id", &self.account_id)
            .field("tunnel_id", &self.tunnel_id)
            .field("api_token", &"<redacted>")
            .field("hostnames_annotation", &self.hostnames_annotation)
            .field("upstream_port_annotation", &self.upstream_port_annotation)
            .field("sync_interval", &self.sync_interval)
            .field("log_level", &self.log_level)
            .field("tunnel_target_suffix", &self.tunnel_target_suffix)
            .field("managed_record_marker", &self.managed_record_marker)
            .field("cloudflare_api_url", &self.cloudflare_api_url)
            .field("metrics_bind_address", &self.metrics_bind_address)
            .finish()
    }
}

impl Config {
    /// Reject values clap accepts but the controller cannot work with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first blank setting.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("CLOUDFLARE_ACCOUNT_ID", &self.account_id),
            ("CLOUDFLARE_TUNNEL_ID", &self.tunnel_id),
            ("CLOUDFLARE_API_TOKEN", &self.api_token),
            ("SERVICE_HOSTNAMES_ANNOTATION", &self.hostnames_annotation),
            ("SERVICE_UPSTREAM_PORT_ANNOTATION", &self.upstream_port_annotation),
            ("TUNNEL_TARGET_SUFFIX", &self.tunnel_target_suffix),
            // An empty marker would claim every CNAME in the account
            ("MANAGED_RECORD_MARKER", &self.managed_record_marker),
            ("CLOUDFLARE_API_URL", &self.cloudflare_api_url),
        ];

        for (name, value) in required {
            if value.trim().is_empty() {
                bail!("{name} must not be empty");
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval)
    }

    /// Settings consumed by the sync loop.
    #[must_use]
    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            account_id: self.account_id.trim().to_string(),
            tunnel_id: self.tunnel_id.trim().to_string(),
            tunnel_target: tunnel_target(self.tunnel_id.trim(), self.tunnel_target_suffix.trim()),
            managed_marker: self.managed_record_marker.clone(),
            conventions: ServiceConventions {
                hostnames_annotation: self.hostnames_annotation.trim().to_string(),
                upstream_port_annotation: self.upstream_port_annotation.trim().to_string(),
            },
            interval: self.sync_interval(),
        }
    }

    /// Log the effective configuration; the API token is never printed.
    pub fn log_summary(&self) {
        info!(
            account_id = %self.account_id,
            tunnel_id = %self.tunnel_id,
            hostnames_annotation = %self.hostnames_annotation,
            upstream_port_annotation = %self.upstream_port_annotation,
            sync_interval_secs = self.sync_interval,
            log_level = %self.log_level,
            tunnel_target_suffix = %self.tunnel_target_suffix,
            managed_record_marker = %self.managed_record_marker,
            cloudflare_api_url = %self.cloudflare_api_url,
            metrics_bind_address = %self.metrics_bind_address,
            "Loaded configuration"
        );
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
