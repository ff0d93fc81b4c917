//! Admin API client tests against a local mock server

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shopfetch_core::api::client::{AdminClient, ACCESS_TOKEN_HEADER};
use shopfetch_core::api::types::{BulkJobRef, BulkJobStatus, BulkSubmission};
use shopfetch_core::api::Transport;
use shopfetch_core::PullConfig;

fn config() -> PullConfig {
    PullConfig {
        download_attempts: 2,
        ..Default::default()
    }
}

fn client(server: &MockServer) -> AdminClient {
    AdminClient::with_base_url(server.uri(), "test-token", &config()).unwrap()
}

const GRAPHQL_PATH: &str = "/admin/api/2024-07/graphql.json";

#[tokio::test]
async fn test_submit_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(header(ACCESS_TOKEN_HEADER, "test-token"))
        .and(body_string_contains("bulkOperationRunQuery"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "bulkOperationRunQuery": {
                    "bulkOperation": {"id": "gid://shopify/BulkOperation/1", "status": "CREATED"},
                    "userErrors": []
                }
            }
        })))
        .mount(&server)
        .await;

    let submission = client(&server)
        .submit_bulk_query("{ products { edges { node { id } } } }")
        .await
        .unwrap();

    assert_eq!(
        submission,
        BulkSubmission::Accepted(BulkJobRef {
            id: "gid://shopify/BulkOperation/1".to_string()
        })
    );
}

#[tokio::test]
async fn test_submit_rejected_carries_user_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "bulkOperationRunQuery": {
                    "bulkOperation": null,
                    "userErrors": [
                        {"field": null, "message": "A bulk query operation is already in progress"}
                    ]
                }
            }
        })))
        .mount(&server)
        .await;

    let submission = client(&server).submit_bulk_query("{ x }").await.unwrap();
    match submission {
        BulkSubmission::Rejected(errors) => {
            assert_eq!(errors.len(), 1);
            assert!(errors[0].message.contains("already in progress"));
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_poll_completed_with_url_and_count() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_string_contains("node(id:"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "node": {
                    "id": "gid://shopify/BulkOperation/1",
                    "status": "COMPLETED",
                    "errorCode": null,
                    "objectCount": "42",
                    "url": "https://cdn.example/result.jsonl"
                }
            }
        })))
        .mount(&server)
        .await;

    let status = client(&server)
        .poll_bulk_job(&BulkJobRef {
            id: "gid://shopify/BulkOperation/1".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(
        status,
        BulkJobStatus::Completed {
            url: Some("https://cdn.example/result.jsonl".to_string()),
            object_count: Some(42)
        }
    );
}

#[tokio::test]
async fn test_download_retries_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/result.jsonl"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/result.jsonl"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"id\":1}\n"))
        .mount(&server)
        .await;

    let body = client(&server)
        .download_bulk_result(&format!("{}/result.jsonl", server.uri()))
        .await
        .unwrap();
    assert_eq!(body, b"{\"id\":1}\n");
}

#[tokio::test]
async fn test_rest_request_extracts_next_page_cursor() {
    let server = MockServer::start().await;
    let link = format!(
        "<{}/admin/api/2024-07/variants.json?limit=250&page_info=next-cursor>; rel=\"next\"",
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/admin/api/2024-07/variants.json"))
        .and(header(ACCESS_TOKEN_HEADER, "test-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Link", link.as_str())
                .set_body_json(json!({"variants": [{"id": 101}]})),
        )
        .mount(&server)
        .await;

    let page = client(&server)
        .request("GET", "variants", &[("limit".to_string(), "250".to_string())])
        .await
        .unwrap();

    assert_eq!(page.next_page, Some("next-cursor".to_string()));
    assert_eq!(page.body["variants"][0]["id"], json!(101));
}

#[tokio::test]
async fn test_rest_error_status_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/api/2024-07/variants.json"))
        .respond_with(
            ResponseTemplate::new(429).set_body_json(json!({"errors": "Too many requests"})),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .request("GET", "variants", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, shopfetch_common::PullError::Api { .. }));
}
