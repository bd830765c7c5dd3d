//! RabbitMQ admin API client and condition evaluation
//!
//! The management plugin exposes every queue as a JSON document under
//! `/api/queues/{vhost}/{queue}`. A pass fetches that document and compares one
//! of its fields with the expected value from the WorkloadAction.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

#[cfg(test)]
use mockall::automock;

use crate::credentials::Credentials;
use crate::crd::{ConditionSpec, RabbitConnection};
use crate::field_path::{canonical_string, get_path};
use crate::Error;

/// One queue lookup against the admin API
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueRequest {
    /// Base URL of the management plugin
    pub base_url: String,
    /// Virtual host of the queue
    pub vhost: String,
    /// Queue name
    pub queue: String,
    /// Basic auth credentials, `None` for anonymous access
    pub credentials: Option<Credentials>,
}

impl QueueRequest {
    /// Build a request for the queue named by `connection`
    pub fn new(connection: &RabbitConnection, credentials: Option<Credentials>) -> Self {
        Self {
            base_url: connection.url.clone(),
            vhost: connection.vhost.clone(),
            queue: connection.queue.clone(),
            credentials,
        }
    }
}

/// Trait abstracting the admin API transport
///
/// Returns the raw response body; validating and inspecting it is left to
/// [`evaluate_condition`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AdminApiClient: Send + Sync {
    /// Fetch the queue document
    async fn fetch_queue(&self, request: &QueueRequest) -> Result<String, Error>;
}

/// Build `{base}/api/queues/{vhost}/{queue}` with every segment percent-encoded
///
/// A path prefix on the base URL is kept, so a broker served under
/// `https://ops.example.com/rabbitmq/` works.
pub fn queue_url(base_url: &str, vhost: &str, queue: &str) -> Result<Url, Error> {
    let mut url = Url::parse(base_url).map_err(|e| Error::http_request(base_url, e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| Error::http_request(base_url, "URL cannot be used as a base"))?
        .pop_if_empty()
        .extend(["api", "queues", vhost, queue]);
    Ok(url)
}

/// Admin API client backed by reqwest
#[derive(Clone)]
pub struct HttpAdminApiClient {
    http: reqwest::Client,
}

impl HttpAdminApiClient {
    /// Create a client with the given per-request timeout
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http_request("", format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl AdminApiClient for HttpAdminApiClient {
    async fn fetch_queue(&self, request: &QueueRequest) -> Result<String, Error> {
        let url = queue_url(&request.base_url, &request.vhost, &request.queue)?;

        let mut builder = self
            .http
            .get(url.clone())
            .header(ACCEPT, "application/json");
        if let Some(credentials) = &request.credentials {
            builder = builder.basic_auth(&credentials.username, Some(&credentials.password));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::http_request(url.as_str(), e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::CredentialsNotValid);
        }
        if !status.is_success() {
            warn!(url = %url, status = %status, "admin API answered with a non-success status");
        }

        response
            .text()
            .await
            .map_err(|e| Error::http_request(url.as_str(), format!("failed to read body: {e}")))
    }
}

/// Compare the field named by `condition.key` with `condition.value`
///
/// The body must be valid JSON. A missing field compares as the empty string.
pub fn evaluate_condition(body: &str, condition: &ConditionSpec) -> Result<bool, Error> {
    let doc: Value =
        serde_json::from_str(body).map_err(|e| Error::HttpResponseNotValid(e.to_string()))?;

    let observed = canonical_string(get_path(&doc, &condition.key).as_ref());
    let met = observed == condition.value;
    debug!(
        key = %condition.key,
        expected = %condition.value,
        observed = %observed,
        met,
        "evaluated queue condition"
    );
    Ok(met)
}

/// Fetch the queue document and evaluate the condition against it
pub async fn check_condition(
    client: &dyn AdminApiClient,
    request: &QueueRequest,
    condition: &ConditionSpec,
) -> Result<bool, Error> {
    let body = client.fetch_queue(request).await?;
    evaluate_condition(&body, condition)
}
