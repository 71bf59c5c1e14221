// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP-level tests of the Cloudflare client against a mock API server.

use serde_json::json;
use std::time::Duration;
use tunnel_manager::cloudflare::{CloudflareClient, DnsApi, DnsRecordPatch, NewDnsRecord};
use tunnel_manager::errors::CloudflareError;
use tunnel_manager::reconcilers::{publish_tunnel, DnsReconciler};
use tunnel_manager::retry::ExponentialBackoff;
use tunnel_manager::sync_state::SyncState;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "token-1";
const MARKER: &str = "managed by tunnel-manager";
const TARGET: &str = "tunnel-1.cfargotunnel.com";

fn fast_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(1),
        Duration::from_millis(5),
        Some(Duration::from_secs(5)),
        2.0,
        0.0,
    )
}

fn client(server: &MockServer) -> CloudflareClient {
    CloudflareClient::new(&format!("{}/client/v4", server.uri()), TOKEN)
        .unwrap()
        .with_backoff(fast_backoff())
}

fn envelope(result: serde_json::Value) -> serde_json::Value {
    json!({ "success": true, "errors": [], "messages": [], "result": result })
}

fn record_json(id: &str, name: &str, content: &str, comment: Option<&str>) -> serde_json::Value {
    json!({
        "id": id,
        "type": "CNAME",
        "name": name,
        "content": content,
        "proxied": true,
        "ttl": 1,
        "comment": comment,
    })
}

#[tokio::test]
async fn test_list_zones_sends_filters_and_reads_pagination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/client/v4/zones"))
        .and(query_param("account.id", "acct-1"))
        .and(query_param("status", "active"))
        .and(query_param("page", "2"))
        .and(query_param("per_page", "50"))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "errors": [],
            "result": [{ "id": "z2", "name": "example.org", "status": "active" }],
            "result_info": { "page": 2, "per_page": 50, "count": 1, "total_count": 51, "total_pages": 2 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = client(&server).list_zones("acct-1", 2, 50).await.unwrap();

    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].name, "example.org");
    assert_eq!(page.page, 2);
    assert_eq!(page.total_pages, 2);
    assert!(page.is_last(2));
}

#[tokio::test]
async fn test_create_record_posts_managed_cname() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/client/v4/zones/z1/dns_records"))
        .and(body_json(json!({
            "type": "CNAME",
            "name": "app.example.com",
            "content": TARGET,
            "ttl": 1,
            "proxied": true,
            "comment": MARKER,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(record_json(
            "r1",
            "app.example.com",
            TARGET,
            Some(MARKER),
        ))))
        .expect(1)
        .mount(&server)
        .await;

    let created = client(&server)
        .create_record(
            "z1",
            &NewDnsRecord::managed_cname("app.example.com", TARGET, MARKER),
        )
        .await
        .unwrap();

    assert_eq!(created.id, "r1");
    assert!(created.is_managed(MARKER));
}

#[tokio::test]
async fn test_update_and_delete_target_record_path() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/client/v4/zones/z1/dns_records/r1"))
        .and(body_json(json!({ "content": TARGET, "comment": MARKER })))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(record_json(
            "r1",
            "app.example.com",
            TARGET,
            Some(MARKER),
        ))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/client/v4/zones/z1/dns_records/r2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({ "id": "r2" }))))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server);
    let updated = api
        .update_record(
            "z1",
            "r1",
            &DnsRecordPatch {
                content: TARGET.to_string(),
                comment: MARKER.to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.content, TARGET);

    api.delete_record("z1", "r2").await.unwrap();
}

#[tokio::test]
async fn test_publish_tunnel_puts_full_ingress_list() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(
            "/client/v4/accounts/acct-1/cfd_tunnel/tunnel-1/configurations",
        ))
        .and(header("authorization", "Bearer token-1"))
        .and(body_json(json!({
            "config": {
                "ingress": [
                    { "hostname": "api.example.com", "service": "http://api.prod.svc.cluster.local:8080" },
                    { "hostname": "app.example.com", "service": "http://web.default.svc.cluster.local:80" },
                    { "service": "http_status:404" }
                ]
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "tunnel_id": "tunnel-1",
            "version": 7
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let mut state = SyncState::new();
    state
        .append("app.example.com", "http://web.default.svc.cluster.local:80")
        .unwrap();
    state
        .append("api.example.com", "http://api.prod.svc.cluster.local:8080")
        .unwrap();

    publish_tunnel(&client(&server), "acct-1", "tunnel-1", &state)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_envelope_failure_is_an_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/client/v4/zones/z1/dns_records"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "errors": [{ "code": 7003, "message": "Could not route to /zones/z1/dns_records" }],
            "result": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).list_records("z1", 1, 100).await.unwrap_err();

    match err {
        CloudflareError::Api { messages } => {
            assert_eq!(messages, "Could not route to /zones/z1/dns_records (code 7003)");
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

/// Client errors fail on the first attempt
#[tokio::test]
async fn test_forbidden_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/client/v4/zones/z1/dns_records/r1"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "success": false,
            "errors": [{ "code": 10000, "message": "Authentication error" }],
            "result": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).delete_record("z1", "r1").await.unwrap_err();

    match err {
        CloudflareError::Http {
            status, message, ..
        } => {
            assert_eq!(status, 403);
            assert_eq!(message, "Authentication error (code 10000)");
        }
        other => panic!("expected HTTP error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/client/v4/zones/z1/dns_records"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/client/v4/zones/z1/dns_records"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "errors": [],
            "result": [],
            "result_info": { "page": 1, "total_pages": 0 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = client(&server).list_records("z1", 1, 100).await.unwrap();

    assert!(page.items.is_empty());
    assert!(page.is_last(1));
}

/// A full DNS pass over HTTP: one orphan removed, one host created
#[tokio::test]
async fn test_dns_reconcile_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/client/v4/zones"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "errors": [],
            "result": [{ "id": "z1", "name": "example.com" }],
            "result_info": { "page": 1, "total_pages": 1 }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/client/v4/zones/z1/dns_records"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "errors": [],
            "result": [
                record_json("r-old", "old.example.com", TARGET, Some(MARKER)),
                record_json("r-manual", "blog.example.com", "blog.host.net", None),
            ],
            "result_info": { "page": 1, "total_pages": 1 }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/client/v4/zones/z1/dns_records"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(record_json(
            "r-new",
            "app.example.com",
            TARGET,
            Some(MARKER),
        ))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/client/v4/zones/z1/dns_records/r-old"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({ "id": "r-old" }))))
        .expect(1)
        .mount(&server)
        .await;

    let mut state = SyncState::new();
    state
        .append("app.example.com", "http://web.default.svc.cluster.local:80")
        .unwrap();

    let api = client(&server);
    let summary = DnsReconciler::new(&api, "acct-1", TARGET, MARKER)
        .reconcile(&state)
        .await
        .unwrap();

    assert_eq!(summary.created, 1);
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.zones_visited, 1);
}
