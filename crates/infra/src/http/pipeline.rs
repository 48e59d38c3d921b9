//! Send pipeline
//!
//! Unified dispatch for every request the engine makes: one credential
//! refresh on 401, bounded linear-backoff resends for 409/503, immediate
//! return on a stale-etag conflict, and a tagged [`SendError`] for anything
//! that is not a 2xx.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use erpsync_core::{CredentialProvider, EventSink};
use erpsync_domain::{EngineConfig, RetryConfig};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, Request, StatusCode};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use super::client::HttpClient;
use super::clone::clone_request;
use super::errors::{classify_status, SendError, SendErrorCategory};
use crate::auth::TokenCache;
use crate::observability::TracingEventSink;

/// Per-call labels and switches.
#[derive(Debug, Clone)]
pub struct SendOptions {
    /// Component or entity the request belongs to, forwarded to the event sink.
    pub source: String,
    /// Logged on failure, prefixed to the error text.
    pub error_message: String,
    /// Logged with the elapsed time on success. `None` keeps success quiet.
    pub success_message: Option<String>,
    /// Whether a 401 may trigger a token refresh.
    pub refresh_credentials: bool,
}

impl SendOptions {
    pub fn new(source: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            error_message: error_message.into(),
            success_message: None,
            refresh_credentials: true,
        }
    }

    pub fn with_success_message(mut self, message: impl Into<String>) -> Self {
        self.success_message = Some(message.into());
        self
    }

    pub fn without_refresh(mut self) -> Self {
        self.refresh_credentials = false;
        self
    }
}

/// Successful (2xx) reply with its body already read.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
    pub elapsed: Duration,
}

impl HttpReply {
    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Decode`] if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, SendError> {
        serde_json::from_str(&self.body).map_err(|err| SendError::Decode(err.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.body.trim().is_empty()
    }
}

/// Delay before transient resend number `attempt` (1-based).
pub fn backoff_delay(unit: Duration, attempt: u32) -> Duration {
    unit.saturating_mul(attempt)
}

/// Dispatch routine shared by the pagination reader and the orchestrator.
#[derive(Clone)]
pub struct SendPipeline {
    client: HttpClient,
    tokens: Arc<TokenCache>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    events: Arc<dyn EventSink>,
    retry: RetryConfig,
    stale_marker: String,
}

impl fmt::Debug for SendPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendPipeline")
            .field("client", &self.client)
            .field("has_credentials", &self.credentials.is_some())
            .field("retry", &self.retry)
            .field("stale_marker", &self.stale_marker)
            .finish_non_exhaustive()
    }
}

impl SendPipeline {
    pub fn new(client: HttpClient, config: &EngineConfig) -> Self {
        Self {
            client,
            tokens: Arc::new(TokenCache::new()),
            credentials: None,
            events: Arc::new(TracingEventSink),
            retry: config.retry.clone(),
            stale_marker: config.concurrency.stale_conflict_marker.clone(),
        }
    }

    /// Provider consulted after a 401.
    pub fn with_credentials(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(provider);
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Share a token cache with other pipelines talking to the same backend.
    pub fn with_token_cache(mut self, tokens: Arc<TokenCache>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    pub fn tokens(&self) -> &Arc<TokenCache> {
        &self.tokens
    }

    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Send `request` and return its 2xx reply.
    ///
    /// `request` is never executed directly; every attempt runs on a fresh
    /// clone so it can be resent after a refresh or a transient failure.
    ///
    /// # Errors
    ///
    /// Every non-2xx outcome is returned as a [`SendError`]. Cancellation is
    /// reported as [`SendError::Cancelled`], never as a failure status.
    pub async fn send(
        &self,
        request: Request,
        options: &SendOptions,
        cancel: &CancellationToken,
    ) -> Result<HttpReply, SendError> {
        let context = format!("{} {}", request.method(), request.url());
        let span = info_span!(
            "send",
            request_id = %Uuid::new_v4(),
            method = %request.method(),
            url = %request.url(),
            source = %options.source,
        );

        let started = Instant::now();
        let result = self.dispatch(&request, options, cancel).instrument(span).await;

        match &result {
            Ok(_) => {
                if let Some(message) = &options.success_message {
                    let duration_ms = started.elapsed().as_millis();
                    self.events.info(
                        &options.source,
                        &context,
                        &format!("{message} ({duration_ms} ms)"),
                    );
                }
            }
            Err(SendError::Cancelled) => {
                self.events.warning(&options.source, &context, "request cancelled");
            }
            Err(err @ SendError::StaleConcurrency { .. }) => {
                let message = format!("{}: {err}", options.error_message);
                self.events.warning(&options.source, &context, &message);
            }
            Err(err) => {
                let message = format!("{}: {err}", options.error_message);
                self.events.error(&options.source, &context, &message);
            }
        }

        result
    }

    async fn dispatch(
        &self,
        original: &Request,
        options: &SendOptions,
        cancel: &CancellationToken,
    ) -> Result<HttpReply, SendError> {
        let method = original.method().clone();
        let mut transient_retries: u32 = 0;
        let mut refreshed = false;
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(SendError::Cancelled);
            }
            attempt += 1;

            let mut request = clone_request(original)?;
            let token = self.tokens.current().await;
            if let Some(token) = token.as_deref() {
                let value = HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|err| SendError::Credential(err.to_string()))?;
                request.headers_mut().insert(AUTHORIZATION, value);
            }

            let started = Instant::now();
            let (status, headers, body) = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(SendError::Cancelled),
                read = self.execute(request) => read?,
            };
            debug!(attempt, %method, status = status.as_u16(), "attempt finished");

            if status.is_success() {
                return Ok(HttpReply { status, headers, body, elapsed: started.elapsed() });
            }

            match classify_status(status, &method, &body, &self.stale_marker) {
                SendErrorCategory::AuthExpired => {
                    let provider = match &self.credentials {
                        Some(provider) if options.refresh_credentials && !refreshed => provider,
                        _ => return Err(SendError::Status { status: status.as_u16(), body }),
                    };
                    refreshed = true;
                    warn!(attempt, "bearer token rejected, refreshing once");
                    self.tokens
                        .refresh(token.as_deref(), provider.as_ref(), cancel)
                        .await
                        .map_err(|err| {
                            if cancel.is_cancelled() {
                                SendError::Cancelled
                            } else {
                                SendError::Credential(err.to_string())
                            }
                        })?;
                }
                SendErrorCategory::StaleConcurrency => {
                    return Err(SendError::StaleConcurrency { body });
                }
                SendErrorCategory::TransientRetryable => {
                    transient_retries += 1;
                    if transient_retries > self.retry.max_transient_retries {
                        return Err(SendError::RetriesExhausted {
                            status: status.as_u16(),
                            retries: transient_retries - 1,
                            body,
                        });
                    }

                    let delay = backoff_delay(self.retry.backoff_unit(), transient_retries);
                    warn!(
                        retry = transient_retries,
                        status = status.as_u16(),
                        delay_ms = delay.as_millis(),
                        "transient failure, backing off"
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(SendError::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                SendErrorCategory::Permanent | SendErrorCategory::Cancelled => {
                    return Err(SendError::Status { status: status.as_u16(), body });
                }
            }
        }
    }

    async fn execute(
        &self,
        request: Request,
    ) -> Result<(StatusCode, HeaderMap, String), SendError> {
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|err| SendError::Transport(err.to_string()))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(|err| SendError::Transport(err.to_string()))?;
        Ok((status, headers, body))
    }

    /// Build a request against this pipeline's transport.
    pub fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.client.request(method, url)
    }
}
