//! HTTP transport: authenticated JSON POSTs with retry on 429/5xx.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::pin::Pin;
use tracing::{debug, warn};

use crate::client::ClientError;
use crate::options::{Config, RetryPolicy};
use crate::response::{self, RawResponse};

/// Incremental body of a streaming response.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send>>;

/// Moves request bodies to the remote API.
///
/// `post` returns whatever status the server settled on after the retry
/// policy ran; classifying non-2xx bodies is the response parser's job.
/// `post_stream` only hands back a body for a successful status.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, path: &str, body: &Value) -> Result<RawResponse, ClientError>;

    async fn post_stream(&self, path: &str, body: &Value) -> Result<ByteStream, ClientError>;
}

/// Build a configured HTTP client from the configuration.
///
/// This applies the connect timeout and proxy. Unary requests get the read
/// timeout as a whole-request limit; streams apply it to the header wait and
/// to every body read instead, so long-lived streams are not cut off.
pub fn build_http_client(config: &Config) -> Result<reqwest::Client, ClientError> {
    let mut builder = reqwest::Client::builder().connect_timeout(config.connect_timeout);

    if let Some(proxy_url) = &config.proxy {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| ClientError::config(format!("invalid proxy '{}': {}", proxy_url, e)))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| ClientError::config(format!("failed to build HTTP client: {}", e)))
}

/// Add extra headers to a request.
pub fn add_extra_headers(
    mut request: RequestBuilder,
    extra_headers: &HashMap<String, String>,
) -> RequestBuilder {
    for (key, value) in extra_headers {
        request = request.header(key, value);
    }
    request
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn request_id(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// reqwest-backed [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    config: Config,
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpTransport {
    pub fn new(config: Config) -> Result<Self, ClientError> {
        let http = build_http_client(&config)?;
        let retry = config.retry_policy();
        Ok(Self {
            config,
            http,
            retry,
        })
    }

    fn request(&self, path: &str, body: &Value, streaming: bool) -> RequestBuilder {
        let url = self.config.endpoint(path);
        let mut req = self
            .http
            .post(&url)
            .header(
                AUTHORIZATION,
                format!("Bearer {}", self.config.api_key.expose_secret()),
            )
            .header(CONTENT_TYPE, "application/json");

        req = if streaming {
            req.header(ACCEPT, "text/event-stream")
        } else {
            req.header(ACCEPT, "application/json")
                .timeout(self.config.timeout)
        };

        add_extra_headers(req, &self.config.extra_headers).json(body)
    }

    /// Send with the retry policy; returns the last response received.
    async fn send(
        &self,
        path: &str,
        body: &Value,
        streaming: bool,
    ) -> Result<reqwest::Response, ClientError> {
        if self.config.debug {
            debug!(path, body = %body, "request body");
        }

        let mut attempt = 1;
        loop {
            let request = self.request(path, body, streaming).send();
            // Streams carry no whole-request timeout, so bound the wait for headers here.
            let response = if streaming {
                tokio::time::timeout(self.config.timeout, request)
                    .await
                    .map_err(|_| {
                        ClientError::transport(
                            format!("no response within {:?}", self.config.timeout),
                            None,
                        )
                    })??
            } else {
                request.await?
            };
            let status = response.status();
            debug!(path, status = status.as_u16(), attempt, "response received");

            if is_retryable_status(status) && attempt < self.retry.max_attempts {
                let delay = self.retry.delay_for(attempt);
                warn!(
                    path,
                    status = status.as_u16(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retryable status, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            return Ok(response);
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, path: &str, body: &Value) -> Result<RawResponse, ClientError> {
        let response = self.send(path, body, false).await?;
        let status = response.status().as_u16();
        let request_id = request_id(&response);
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::from(e).with_request_id(request_id.clone()))?;

        if self.config.debug {
            debug!(path, status, body = %String::from_utf8_lossy(&body), "response body");
        }

        Ok(RawResponse {
            status,
            body,
            request_id,
        })
    }

    async fn post_stream(&self, path: &str, body: &Value) -> Result<ByteStream, ClientError> {
        let response = self.send(path, body, true).await?;
        let status = response.status();

        if !status.is_success() {
            let request_id = request_id(&response);
            let body = response
                .bytes()
                .await
                .map_err(|e| ClientError::from(e).with_request_id(request_id.clone()))?;
            let raw = RawResponse {
                status: status.as_u16(),
                body,
                request_id,
            };
            return Err(response::error_from(&raw));
        }

        Ok(Box::pin(
            response.bytes_stream().map(|chunk| chunk.map_err(ClientError::from)),
        ))
    }
}
