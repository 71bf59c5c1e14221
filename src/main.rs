// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use axum::{http::StatusCode, routing::get, Router};
use clap::Parser;
use kube::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, Dispatch};
use tracing_subscriber::EnvFilter;
use tunnel_manager::{
    cloudflare::{CloudflareClient, DnsApi, TunnelApi},
    config::Config,
    driver::Controller,
    kube_discovery::{KubeServiceDiscovery, ServiceDiscovery},
    metrics::gather_metrics,
};

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("tunnel-manager")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let config = Config::parse();

    let dispatch = build_dispatch(&config);
    tracing::dispatcher::set_global_default(dispatch.clone())
        .context("failed to install global tracing subscriber")?;

    config.validate()?;

    info!("Starting Cloudflare tunnel manager");
    config.log_summary();

    // Select ring before any TLS client is built
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }

    debug!("Initializing Kubernetes client");
    let client = Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;
    debug!("Kubernetes client initialized successfully");

    let cloudflare = Arc::new(CloudflareClient::new(
        &config.cloudflare_api_url,
        &config.api_token,
    )?);

    let controller = Controller::new(
        Arc::new(KubeServiceDiscovery::new(client)) as Arc<dyn ServiceDiscovery>,
        Arc::clone(&cloudflare) as Arc<dyn TunnelApi>,
        cloudflare as Arc<dyn DnsApi>,
        config.controller_settings(),
        dispatch,
    );

    let metrics_addr = config.metrics_bind_address;
    tokio::spawn(async move {
        if let Err(e) = serve_metrics(metrics_addr).await {
            error!(error = %e, address = %metrics_addr, "Metrics server stopped");
        }
    });

    controller.run(shutdown_signal()).await;

    info!("Cloudflare tunnel manager stopped");
    Ok(())
}

/// Build the process subscriber.
///
/// `RUST_LOG` wins over the configured level when set. `RUST_LOG_FORMAT=json`
/// switches to JSON lines, anything else gives compact text.
fn build_dispatch(config: &Config) -> Dispatch {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_filter()));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => Dispatch::new(
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .finish(),
        ),
        _ => Dispatch::new(
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .finish(),
        ),
    }
}

async fn metrics_handler() -> (StatusCode, String) {
    match gather_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to encode metrics: {e}"),
        ),
    }
}

async fn serve_metrics(addr: SocketAddr) -> Result<()> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(|| async { "ok" }));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind metrics server to {addr}"))?;
    info!(address = %addr, "Metrics server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, initiating graceful shutdown"),
        () = terminate => info!("Received SIGTERM (pod termination), initiating graceful shutdown"),
    }
}
