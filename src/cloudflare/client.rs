// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! reqwest-based client for the Cloudflare v4 REST API.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client as HttpClient, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::types::{
    ApiResponse, DnsRecord, DnsRecordPatch, NewDnsRecord, TunnelConfig,
    TunnelConfigurationRequest, Zone,
};
use super::{DnsApi, TunnelApi};
use crate::constants::{CLOUDFLARE_REQUEST_TIMEOUT_SECS, USER_AGENT, ZONE_STATUS_ACTIVE};
use crate::errors::CloudflareError;
use crate::metrics::record_cloudflare_request;
use crate::pagination::Page;
use crate::retry::{http_backoff, retry_cloudflare_call, ExponentialBackoff};

/// Cloudflare API client authenticating with a bearer token.
///
/// Every call is retried with [`http_backoff`] on transient failures (429, 5xx,
/// connection errors). The token is never logged.
#[derive(Clone)]
pub struct CloudflareClient {
    http: HttpClient,
    base_url: Url,
    api_token: String,
    backoff: ExponentialBackoff,
}

impl std::fmt::Debug for CloudflareClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl CloudflareClient {
    /// Create a client for the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an absolute http(s) URL or the
    /// HTTP client cannot be built.
    pub fn new(base_url: &str, api_token: &str) -> Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .with_context(|| format!("invalid Cloudflare API URL '{base_url}'"))?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            bail!("Cloudflare API URL must be an absolute http(s) URL, got '{base_url}'");
        }

        let http = HttpClient::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(CLOUDFLARE_REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url,
            api_token: api_token.to_string(),
            backoff: http_backoff(),
        })
    }

    /// Replace the retry policy used for every call.
    #[must_use]
    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Build `<base>/<segments...>`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, CloudflareError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| CloudflareError::Transport {
                url: self.base_url.to_string(),
                reason: "base URL cannot carry path segments".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Issue one request, with retries, and unwrap the response envelope.
    async fn call<T, B>(
        &self,
        operation: &str,
        method: Method,
        url: &Url,
        body: Option<&B>,
    ) -> Result<ApiResponse<T>, CloudflareError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        let method = &method;
        retry_cloudflare_call(
            self.backoff.restarted(),
            move || {
                let method = method.clone();
                async move {
                    let result = self.send_once(method, url, body).await;
                    record_cloudflare_request(operation, result.is_ok());
                    result
                }
            },
            operation,
        )
        .await
    }

    async fn send_once<T, B>(
        &self,
        method: Method,
        url: &Url,
        body: Option<&B>,
    ) -> Result<ApiResponse<T>, CloudflareError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        debug!(method = %method, url = %url, "Sending Cloudflare API request");

        let mut request = self
            .http
            .request(method, url.clone())
            .bearer_auth(&self.api_token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CloudflareError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CloudflareError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !status.is_success() {
            // Prefer the envelope's error list over the raw body when present.
            let message = serde_json::from_str::<ApiResponse<serde_json::Value>>(&text)
                .map_or(text, |envelope| envelope.error_messages());
            return Err(CloudflareError::Http {
                status: status.as_u16(),
                url: url.to_string(),
                message,
            });
        }

        let envelope: ApiResponse<T> =
            serde_json::from_str(&text).map_err(|e| CloudflareError::Decode {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !envelope.success {
            return Err(CloudflareError::Api {
                messages: envelope.error_messages(),
            });
        }

        Ok(envelope)
    }

    async fn list_page<T: DeserializeOwned>(
        &self,
        operation: &str,
        url: Url,
        page: u32,
    ) -> Result<Page<T>, CloudflareError> {
        let envelope: ApiResponse<Vec<T>> =
            self.call(operation, Method::GET, &url, None::<&()>).await?;

        let (reported_page, total_pages) = envelope
            .result_info
            .as_ref()
            .map_or((page, 0), |info| (info.page, info.total_pages));

        Ok(Page {
            items: envelope.result.unwrap_or_default(),
            page: reported_page,
            total_pages,
        })
    }
}

fn require_result<T>(envelope: ApiResponse<T>, operation: &str) -> Result<T, CloudflareError> {
    envelope
        .result
        .ok_or_else(|| CloudflareError::MissingResult {
            operation: operation.to_string(),
        })
}

#[async_trait]
impl DnsApi for CloudflareClient {
    async fn list_zones(
        &self,
        account_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<Zone>, CloudflareError> {
        let mut url = self.endpoint(&["zones"])?;
        url.query_pairs_mut()
            .append_pair("account.id", account_id)
            .append_pair("status", ZONE_STATUS_ACTIVE)
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &per_page.to_string());

        self.list_page("list_zones", url, page).await
    }

    async fn list_records(
        &self,
        zone_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<DnsRecord>, CloudflareError> {
        let mut url = self.endpoint(&["zones", zone_id, "dns_records"])?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &per_page.to_string());

        self.list_page("list_records", url, page).await
    }

    async fn create_record(
        &self,
        zone_id: &str,
        record: &NewDnsRecord,
    ) -> Result<DnsRecord, CloudflareError> {
        let url = self.endpoint(&["zones", zone_id, "dns_records"])?;
        let envelope = self
            .call("create_record", Method::POST, &url, Some(record))
            .await?;
        require_result(envelope, "create_record")
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        patch: &DnsRecordPatch,
    ) -> Result<DnsRecord, CloudflareError> {
        let url = self.endpoint(&["zones", zone_id, "dns_records", record_id])?;
        let envelope = self
            .call("update_record", Method::PATCH, &url, Some(patch))
            .await?;
        require_result(envelope, "update_record")
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<(), CloudflareError> {
        let url = self.endpoint(&["zones", zone_id, "dns_records", record_id])?;
        let _: ApiResponse<serde_json::Value> = self
            .call("delete_record", Method::DELETE, &url, None::<&()>)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TunnelApi for CloudflareClient {
    async fn put_configuration(
        &self,
        account_id: &str,
        tunnel_id: &str,
        config: &TunnelConfig,
    ) -> Result<(), CloudflareError> {
        let url = self.endpoint(&[
            "accounts",
            account_id,
            "cfd_tunnel",
            tunnel_id,
            "configurations",
        ])?;
        let body = TunnelConfigurationRequest { config };
        let _: ApiResponse<serde_json::Value> = self
            .call("put_tunnel_configuration", Method::PUT, &url, Some(&body))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod client_tests;
