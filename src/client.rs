use std::time::Instant;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use serde_json::Value;

use crate::chat::ChatConfig;
use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_MODEL_LISTINGS, CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS,
};
use crate::types::{ChatCompletionRequest, ModelListResponse};

/// The body of a chat completion response, as the transport delivered it.
pub enum ResponseBody {
    /// The body arrives incrementally as byte chunks.
    Streaming(BoxStream<'static, Result<Bytes>>),

    /// The whole body is already available.
    Complete(Bytes),
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseBody::Streaming(_) => f.write_str("ResponseBody::Streaming(..)"),
            ResponseBody::Complete(bytes) => {
                write!(f, "ResponseBody::Complete({} bytes)", bytes.len())
            }
        }
    }
}

/// Issues requests against an OpenAI-compatible endpoint.
///
/// The session engine talks to the network only through this trait.  Dropping a returned
/// future or body stream aborts the underlying request.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// `POST {base_url}/chat/completions` with the given payload.
    ///
    /// Non-success statuses are errors.
    async fn chat_completion(
        &self,
        config: &ChatConfig,
        request: &ChatCompletionRequest,
    ) -> Result<ResponseBody>;

    /// `GET {base_url}/models`, returning model identifiers.
    async fn list_models(&self, config: &ChatConfig) -> Result<Vec<String>>;
}

/// [`Transport`] backed by reqwest.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: ReqwestClient,
}

impl OpenAiClient {
    /// Create a new client.
    ///
    /// No request timeout is configured; turns end on completion or cancellation.
    pub fn new() -> Result<Self> {
        let client = ReqwestClient::builder().build().map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {e}"),
                Some(Box::new(e)),
            )
        })?;
        Ok(Self { client })
    }

    /// Create a client around an existing reqwest client.
    pub fn with_client(client: ReqwestClient) -> Self {
        Self { client }
    }

    /// Headers for every request; the bearer credential is omitted when empty.
    fn default_headers(config: &ChatConfig) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        if !config.api_key.is_empty() {
            let value = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|_| {
                    Error::validation(
                        "API key contains characters not allowed in a header",
                        Some("api_key".to_string()),
                    )
                })?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    fn map_send_error(e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(format!("Request timed out: {e}"))
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    /// Process API response errors and convert to our Error type.
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        // OpenAI nests the detail under `error`; some servers put a bare string there.
        let parsed = serde_json::from_str::<Value>(&error_body).ok();
        let detail = parsed.as_ref().and_then(|v| v.get("error"));
        let field = |name: &str| {
            detail
                .and_then(|d| d.get(name))
                .and_then(Value::as_str)
                .map(String::from)
        };
        let message = field("message")
            .or_else(|| detail.and_then(Value::as_str).map(String::from))
            .unwrap_or_else(|| {
                if error_body.trim().is_empty() {
                    format!("HTTP status {status_code}")
                } else {
                    error_body.clone()
                }
            });

        Error::from_status(
            status_code,
            field("type"),
            message,
            field("param"),
            retry_after,
        )
    }

    /// Whether the response holds one JSON document rather than an incremental body.
    fn is_complete_json(response: &Response) -> bool {
        let is_json = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|val| val.to_str().ok())
            .is_some_and(|val| val.trim_start().starts_with("application/json"));
        is_json && response.content_length().is_some()
    }
}

#[async_trait::async_trait]
impl Transport for OpenAiClient {
    async fn chat_completion(
        &self,
        config: &ChatConfig,
        request: &ChatCompletionRequest,
    ) -> Result<ResponseBody> {
        let url = config.endpoint("chat/completions");
        let start = Instant::now();
        CLIENT_REQUESTS.click();

        let response = self
            .client
            .post(&url)
            .headers(Self::default_headers(config)?)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                Self::map_send_error(e)
            })?;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            let err = Self::process_error_response(response).await;
            tracing::warn!(url = %url, error = %err, "chat completion rejected");
            return Err(err);
        }

        if Self::is_complete_json(&response) {
            let body = response.bytes().await.map_err(|e| {
                Error::streaming(
                    format!("Failed to read response body: {e}"),
                    Some(Box::new(e)),
                )
            })?;
            return Ok(ResponseBody::Complete(body));
        }

        let stream = response.bytes_stream().map(|result| {
            result.map_err(|e| {
                Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e)))
            })
        });
        Ok(ResponseBody::Streaming(stream.boxed()))
    }

    async fn list_models(&self, config: &ChatConfig) -> Result<Vec<String>> {
        let url = config.endpoint("models");
        CLIENT_MODEL_LISTINGS.click();

        let response = self
            .client
            .get(&url)
            .headers(Self::default_headers(config)?)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        let listing = response.json::<ModelListResponse>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse model listing: {e}"),
                Some(Box::new(e)),
            )
        })?;
        Ok(listing.model_ids())
    }
}
