//! Port interfaces for the synchronization engine's collaborators

use async_trait::async_trait;
use erpsync_domain::Result;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Mints bearer tokens for the remote API.
///
/// Called only after the backend rejected the current token; how the token is
/// obtained (client credentials, keychain, ...) is up to the implementation.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Return a fresh access token.
    async fn access_token(&self, cancel: &CancellationToken) -> Result<String>;
}

/// Receives human-readable engine events.
///
/// `source` names the component or entity, `context` the record or request
/// the event is about.
pub trait EventSink: Send + Sync {
    fn info(&self, source: &str, context: &str, message: &str);

    fn warning(&self, source: &str, context: &str, message: &str);

    fn error(&self, source: &str, context: &str, message: &str);
}

/// Turns source documents into desired payloads for one entity type.
pub trait PayloadProducer: Send + Sync {
    /// Source record type (parsed CSV row, XML document, ...)
    type Source: Send + Sync;

    /// Build the JSON object the remote record should converge to.
    fn produce(&self, source: &Self::Source) -> Result<Value>;
}
