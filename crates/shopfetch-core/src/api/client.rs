//! Reqwest-backed Admin API client
//!
//! Implements [`Transport`] against a Shopify-compatible Admin API: GraphQL
//! bulk operations plus cursor-paginated REST. Authentication is a static
//! access token header; anything fancier (OAuth refresh, multi-store
//! routing) belongs to the caller that constructs the client.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use crate::api::types::{ApiUserError, BulkJobRef, BulkJobStatus, BulkSubmission, Page};
use crate::api::Transport;
use crate::config::PullConfig;
use crate::session::Session;
use shopfetch_common::{PullError, Result};

/// Header carrying the Admin API access token.
pub const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("shopfetch/", env!("CARGO_PKG_VERSION"));

/// Admin API client for one shop.
pub struct AdminClient {
    client: Client,
    base_url: String,
    access_token: String,
    api_version: String,
    download_attempts: u32,
}

impl AdminClient {
    /// Create a client for the shop named by the session.
    pub fn new(session: &Session, config: &PullConfig) -> Result<Self> {
        Self::with_base_url(
            format!("https://{}", session.shop_domain()),
            session.access_token(),
            config,
        )
    }

    /// Create a client against an explicit base URL. Used by tests and
    /// proxied deployments.
    pub fn with_base_url(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        config: &PullConfig,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PullError::Infrastructure(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            api_version: config.api_version.clone(),
            download_attempts: config.download_attempts,
        })
    }

    fn graphql_url(&self) -> String {
        format!(
            "{}/admin/api/{}/graphql.json",
            self.base_url, self.api_version
        )
    }

    fn rest_url(&self, path: &str) -> String {
        format!(
            "{}/admin/api/{}/{}.json",
            self.base_url,
            self.api_version,
            path.trim_matches('/')
        )
    }

    /// Execute one GraphQL document and return the `data` object.
    async fn graphql(&self, document: &str) -> Result<Value> {
        let response = self
            .client
            .post(self.graphql_url())
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
            .json(&json!({ "query": document }))
            .send()
            .await
            .map_err(|e| PullError::Network(format!("GraphQL request failed: {}", e)))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| PullError::Network(format!("Failed to decode GraphQL response: {}", e)))?;

        if !status.is_success() {
            return Err(PullError::Api {
                message: format!("GraphQL endpoint returned HTTP {}", status),
                response: Some(body),
            });
        }

        // Top-level errors mean the document itself was rejected.
        if let Some(errors) = body.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                return Err(PullError::Api {
                    message: "GraphQL document rejected".to_string(),
                    response: Some(body.clone()),
                });
            }
        }

        body.get("data").cloned().ok_or_else(|| PullError::UnexpectedResponse {
            message: "GraphQL response missing data object".to_string(),
            errors: vec![body.to_string()],
        })
    }
}

#[async_trait]
impl Transport for AdminClient {
    async fn submit_bulk_query(&self, query: &str) -> Result<BulkSubmission> {
        // The inner query is embedded as a GraphQL string literal; JSON
        // string encoding produces exactly the escaping GraphQL needs.
        let document = format!(
            r#"mutation {{
  bulkOperationRunQuery(query: {}) {{
    bulkOperation {{ id status }}
    userErrors {{ field message }}
  }}
}}"#,
            Value::String(query.to_string())
        );

        let data = self.graphql(&document).await?;
        let payload = data
            .get("bulkOperationRunQuery")
            .ok_or_else(|| PullError::UnexpectedResponse {
                message: "Response missing bulkOperationRunQuery".to_string(),
                errors: vec![data.to_string()],
            })?;

        let user_errors: Vec<ApiUserError> = payload
            .get("userErrors")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| PullError::UnexpectedResponse {
                message: format!("Malformed userErrors list: {}", e),
                errors: vec![payload.to_string()],
            })?
            .unwrap_or_default();

        if !user_errors.is_empty() {
            return Ok(BulkSubmission::Rejected(user_errors));
        }

        let id = payload
            .pointer("/bulkOperation/id")
            .and_then(Value::as_str)
            .ok_or_else(|| PullError::UnexpectedResponse {
                message: "Accepted submission carried no bulk operation id".to_string(),
                errors: vec![payload.to_string()],
            })?;

        Ok(BulkSubmission::Accepted(BulkJobRef { id: id.to_string() }))
    }

    async fn poll_bulk_job(&self, job: &BulkJobRef) -> Result<BulkJobStatus> {
        let document = format!(
            r#"query {{
  node(id: {}) {{
    ... on BulkOperation {{ id status errorCode objectCount url }}
  }}
}}"#,
            Value::String(job.id.clone())
        );

        let data = self.graphql(&document).await?;
        let node = data.get("node").filter(|n| !n.is_null()).ok_or_else(|| {
            PullError::UnexpectedResponse {
                message: format!("Bulk operation {} not found while polling", job.id),
                errors: vec![data.to_string()],
            }
        })?;

        let status = node
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let url = node
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_string);
        let error_code = node
            .get("errorCode")
            .and_then(Value::as_str)
            .map(str::to_string);
        let object_count = node
            .get("objectCount")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok());

        BulkJobStatus::from_parts(status, url, error_code, object_count).ok_or_else(|| {
            PullError::UnexpectedResponse {
                message: format!("Unknown bulk operation status: {:?}", status),
                errors: vec![node.to_string()],
            }
        })
    }

    async fn download_bulk_result(&self, url: &str) -> Result<Vec<u8>> {
        let mut last_error = String::new();

        for attempt in 1..=self.download_attempts {
            match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => {
                    return response
                        .bytes()
                        .await
                        .map(|b| b.to_vec())
                        .map_err(|e| PullError::Network(format!("Result download failed: {}", e)));
                }
                Ok(response) => {
                    last_error = format!("HTTP {}", response.status());
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }
            tracing::warn!(
                attempt,
                max_attempts = self.download_attempts,
                error = %last_error,
                "Bulk result download attempt failed"
            );
        }

        Err(PullError::Network(format!(
            "Bulk result download failed after {} attempts: {}",
            self.download_attempts, last_error
        )))
    }

    async fn request(&self, method: &str, path: &str, params: &[(String, String)]) -> Result<Page> {
        let method: reqwest::Method = method
            .parse()
            .map_err(|_| PullError::Validation(format!("Invalid HTTP method: {}", method)))?;

        let response = self
            .client
            .request(method, self.rest_url(path))
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
            .query(params)
            .send()
            .await
            .map_err(|e| PullError::Network(format!("REST request failed: {}", e)))?;

        let status = response.status();
        let next_page = response
            .headers()
            .get(reqwest::header::LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_next_page_info);

        let body: Value = response
            .json()
            .await
            .map_err(|e| PullError::Network(format!("Failed to decode REST response: {}", e)))?;

        if !status.is_success() {
            return Err(PullError::Api {
                message: format!("REST endpoint {} returned HTTP {}", path, status),
                response: Some(body),
            });
        }

        Ok(Page { body, next_page })
    }
}

/// Extract the `page_info` cursor from a `Link` header's `rel="next"` entry.
fn parse_next_page_info(header: &str) -> Option<String> {
    for segment in header.split(',') {
        if !segment.contains(r#"rel="next""#) {
            continue;
        }
        let url = segment.trim().strip_prefix('<')?.split('>').next()?;
        for param in url.split('?').nth(1)?.split('&') {
            if let Some(value) = param.strip_prefix("page_info=") {
                return Some(value.to_string());
            }
        }
    }
    None
}
