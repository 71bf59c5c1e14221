// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pagination helpers for Kubernetes and Cloudflare list operations.
//!
//! Kubernetes lists are walked with continue tokens ([`list_all_paginated`]);
//! Cloudflare lists are walked by page number ([`collect_pages`]). Both fetch
//! one page at a time, sequentially.

use crate::constants::KUBE_LIST_PAGE_SIZE;
use kube::{api::ListParams, Api, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::future::Future;
use tracing::debug;

/// One page of a page-numbered list response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// 1-based page number reported by the server
    pub page: u32,
    /// Total number of pages reported by the server (0 for an empty listing)
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// Returns `true` if no page follows `requested`.
    ///
    /// The larger of the requested and reported page numbers is used, so a
    /// server echoing a stale page number cannot make the walk loop forever.
    #[must_use]
    pub fn is_last(&self, requested: u32) -> bool {
        self.total_pages == 0 || self.page.max(requested) >= self.total_pages
    }
}

/// Collect every item of a page-numbered listing.
///
/// `fetch_page` is called with page numbers 1, 2, ... until the returned page
/// reports it is the last one.
///
/// # Example
///
/// ```rust
/// use tunnel_manager::pagination::{collect_pages, Page};
///
/// # async fn example() -> Result<(), std::convert::Infallible> {
/// let items = collect_pages(|page| async move {
///     Ok::<_, std::convert::Infallible>(Page { items: vec![page], page, total_pages: 3 })
/// })
/// .await?;
/// assert_eq!(items, vec![1, 2, 3]);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns the first error produced by `fetch_page`; items already fetched are
/// discarded.
pub async fn collect_pages<T, E, F, Fut>(mut fetch_page: F) -> Result<Vec<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    let mut all_items = Vec::new();
    let mut page_number = 1;

    loop {
        let page = fetch_page(page_number).await?;
        let is_last = page.is_last(page_number);
        let item_count = page.items.len();
        all_items.extend(page.items);

        debug!(
            page = page_number,
            total_pages = page.total_pages,
            items_in_page = item_count,
            total_items = all_items.len(),
            "Fetched page"
        );

        if is_last {
            break;
        }
        page_number += 1;
    }

    Ok(all_items)
}

/// List all Kubernetes resources with automatic pagination.
///
/// Fetches resources in pages of [`KUBE_LIST_PAGE_SIZE`] to reduce memory usage
/// and API server load, following continue tokens until exhausted.
///
/// # Errors
///
/// Returns the `kube::Error` of the first failing page request, so callers can
/// classify it for retries.
pub async fn list_all_paginated<K>(
    api: &Api<K>,
    mut list_params: ListParams,
) -> Result<Vec<K>, kube::Error>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug,
    K::DynamicType: Default,
{
    list_params.limit = Some(KUBE_LIST_PAGE_SIZE);

    let mut all_items = Vec::new();
    let mut page_count = 0;

    loop {
        page_count += 1;
        let result = api.list(&list_params).await?;

        let item_count = result.items.len();
        all_items.extend(result.items);

        debug!(
            page = page_count,
            items_in_page = item_count,
            total_items = all_items.len(),
            "Fetched page from Kubernetes API"
        );

        match result.metadata.continue_ {
            Some(token) if !token.is_empty() => list_params.continue_token = Some(token),
            _ => break,
        }
    }

    Ok(all_items)
}

#[cfg(test)]
#[path = "pagination_tests.rs"]
mod pagination_tests;
