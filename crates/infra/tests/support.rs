//! Shared helpers for the wiremock-backed integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use erpsync_core::CredentialProvider;
use erpsync_domain::{EngineConfig, Result};
use erpsync_infra::{HttpClient, SendPipeline, Upserter};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use wiremock::{MockServer, Request, ResponseTemplate};

pub const STALE_BODY: &str =
    r#"{"error":{"code":"Request_EntityChanged","message":"Another user changed it."}}"#;

/// Engine configuration pointed at `server` with a tiny backoff unit.
pub fn engine_config(server: &MockServer) -> EngineConfig {
    let mut config = EngineConfig::new(server.uri());
    config.retry.backoff_unit_ms = 5;
    config
}

pub fn pipeline(config: &EngineConfig) -> SendPipeline {
    SendPipeline::new(HttpClient::from_config(config).expect("http client"), config)
}

pub fn upserter(server: &MockServer) -> Upserter {
    let config = engine_config(server);
    Upserter::new(pipeline(&config), config)
}

/// Received requests with the given method.
pub async fn requests(server: &MockServer, method: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .expect("request recording enabled")
        .into_iter()
        .filter(|request| request.method.as_str() == method)
        .collect()
}

/// A collection page with an optional next link.
pub fn page(rows: Value, next_link: Option<String>) -> ResponseTemplate {
    let mut body = serde_json::json!({ "value": rows });
    if let Some(link) = next_link {
        body["@odata.nextLink"] = Value::String(link);
    }
    ResponseTemplate::new(200).set_body_json(body)
}

/// Responder returning `first` for the first `times` calls, then `rest`.
pub fn first_then(
    times: usize,
    first: ResponseTemplate,
    rest: ResponseTemplate,
) -> impl Fn(&Request) -> ResponseTemplate + Send + Sync + 'static {
    let hits = AtomicUsize::new(0);
    move |_: &Request| {
        if hits.fetch_add(1, Ordering::SeqCst) < times {
            first.clone()
        } else {
            rest.clone()
        }
    }
}

/// Credential provider that counts calls and hands out `fresh`.
#[derive(Default)]
pub struct CountingProvider {
    pub calls: AtomicUsize,
    pub delay: Duration,
}

impl CountingProvider {
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self { calls: AtomicUsize::new(0), delay })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for CountingProvider {
    async fn access_token(&self, _cancel: &CancellationToken) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok("fresh".to_string())
    }
}
