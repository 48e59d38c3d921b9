//! Example: reading and upserting items against a live collection API
//!
//! Loads the engine configuration from `ERPSYNC_*` environment variables (or
//! a `config.toml`/`erpsync.toml` file), reads the whole `items` collection
//! and optionally upserts one item given as a JSON argument.
//!
//! ```bash
//! export ERPSYNC_BASE_URL=https://erp.example.com/api/v2.0
//! export ERPSYNC_COMPANY=cronus
//! export ERPSYNC_TOKEN=...
//! cargo run -p erpsync-infra --example sync_items -- '{"number":"1000","displayName":"Desk"}'
//! ```
//!
//! Ctrl-C cancels the run cooperatively.

use std::sync::Arc;

use async_trait::async_trait;
use erpsync_core::CredentialProvider;
use erpsync_domain::{EntityDescriptor, ErpSyncError, Result};
use erpsync_infra::{
    config, init_tracing, HttpClient, LogFormat, SendPipeline, TokenCache, Upserter,
};
use tokio_util::sync::CancellationToken;

/// Re-reads `ERPSYNC_TOKEN`, so a token rotated outside the process is
/// picked up on the next 401.
struct EnvTokenProvider;

#[async_trait]
impl CredentialProvider for EnvTokenProvider {
    async fn access_token(&self, _cancel: &CancellationToken) -> Result<String> {
        std::env::var("ERPSYNC_TOKEN")
            .map_err(|_| ErpSyncError::Auth("ERPSYNC_TOKEN is not set".into()))
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_tracing("info,erpsync_infra=debug", LogFormat::Text);

    let config = config::load()?;
    let tokens = Arc::new(match std::env::var("ERPSYNC_TOKEN") {
        Ok(token) => TokenCache::with_token(token),
        Err(_) => TokenCache::new(),
    });
    let pipeline = SendPipeline::new(HttpClient::from_config(&config)?, &config)
        .with_token_cache(tokens)
        .with_credentials(Arc::new(EnvTokenProvider));
    let upserter = Upserter::new(pipeline, config);

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let items = EntityDescriptor::items();
    let existing = upserter.fetch_all(&items, &cancel).await?;
    tracing::info!(count = existing.len(), "items read");

    if let Some(raw) = std::env::args().nth(1) {
        let desired: serde_json::Value = serde_json::from_str(&raw)?;
        let outcome = upserter.upsert(&items, &desired, &cancel).await;
        tracing::info!(action = %outcome.action(), "upsert finished");
        if let Some(err) = outcome.error() {
            return Err(err.clone().into());
        }
    }

    Ok(())
}
