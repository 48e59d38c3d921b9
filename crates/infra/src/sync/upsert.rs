//! Upsert orchestrator
//!
//! Create-if-absent, else patch-if-changed, else no-op, for one record of one
//! entity type. A PATCH rejected for a stale etag is resolved here by
//! re-reading the record and resubmitting with the fresh etag.

use erpsync_core::sync::odata::{entity_url, key_filter};
use erpsync_core::{is_patch_required, patch_body};
use erpsync_domain::constants::{IF_MATCH_ANY, PREFER_REPRESENTATION};
use erpsync_domain::{EngineConfig, EntityDescriptor, Record, RecordCollection, SyncAction};
use reqwest::header::{HeaderValue, IF_MATCH};
use reqwest::{Method, Request, RequestBuilder};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn, Span};

use super::pagination::PaginationReader;
use crate::http::{HttpReply, SendError, SendOptions, SendPipeline};

const PREFER: &str = "prefer";

/// Why an upsert, lookup or delete did not reach its goal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpsertError {
    #[error("desired payload has no value for key field `{field}`")]
    MissingKey { field: String },

    #[error("invalid desired payload: {0}")]
    InvalidPayload(String),

    #[error("record `{key}` has no systemId")]
    MissingSystemId { key: String },

    #[error("remote record carries an etag unusable as If-Match: {0}")]
    InvalidEtag(String),

    #[error("record `{key}` disappeared while refreshing its etag")]
    NotFound { key: String },

    #[error("stale etag persisted after {attempts} refresh attempts: {last}")]
    StaleRetriesExhausted { attempts: u32, last: SendError },

    #[error(transparent)]
    Send(#[from] SendError),
}

impl UpsertError {
    /// HTTP status of the underlying response, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Send(err) | Self::StaleRetriesExhausted { last: err, .. } => err.status(),
            _ => None,
        }
    }
}

/// Terminal state of one orchestrated record.
///
/// Written records carry the server representation when the reply had one.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    Created(Option<Record>),
    Patched(Option<Record>),
    Unchanged(Record),
    Deleted,
    Failed(UpsertError),
    Cancelled,
}

impl UpsertOutcome {
    pub fn action(&self) -> SyncAction {
        match self {
            Self::Created(_) => SyncAction::Created,
            Self::Patched(_) => SyncAction::Patched,
            Self::Unchanged(_) => SyncAction::Unchanged,
            Self::Deleted => SyncAction::Deleted,
            Self::Failed(_) => SyncAction::Failed,
            Self::Cancelled => SyncAction::Cancelled,
        }
    }

    /// Record state after the operation, when known.
    pub fn record(&self) -> Option<&Record> {
        match self {
            Self::Created(record) | Self::Patched(record) => record.as_ref(),
            Self::Unchanged(record) => Some(record),
            Self::Deleted | Self::Failed(_) | Self::Cancelled => None,
        }
    }

    pub fn error(&self) -> Option<&UpsertError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }

    fn from_result(result: Result<Self, UpsertError>) -> Self {
        match result {
            Ok(outcome) => outcome,
            Err(UpsertError::Send(SendError::Cancelled)) => Self::Cancelled,
            Err(err) => Self::Failed(err),
        }
    }
}

/// Per-entity create/patch/delete orchestration over a [`SendPipeline`].
#[derive(Debug, Clone)]
pub struct Upserter {
    pipeline: SendPipeline,
    reader: PaginationReader,
    config: EngineConfig,
}

impl Upserter {
    pub fn new(pipeline: SendPipeline, config: EngineConfig) -> Self {
        let reader = PaginationReader::new(pipeline.clone());
        Self { pipeline, reader, config }
    }

    pub fn pipeline(&self) -> &SendPipeline {
        &self.pipeline
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read the whole collection of `entity`, keyed by its natural key.
    ///
    /// # Errors
    ///
    /// Only [`SendError::Cancelled`]; other failures yield a partial
    /// collection.
    #[instrument(skip_all, fields(entity = %entity.name))]
    pub async fn fetch_all(
        &self,
        entity: &EntityDescriptor,
        cancel: &CancellationToken,
    ) -> Result<RecordCollection, SendError> {
        let url = self.config.collection_url(entity);
        self.reader.fetch_all(&url, &entity.key_field, cancel).await
    }

    /// Look a record up by natural key.
    ///
    /// `Ok(None)` means the backend answered and has no such record; a failed
    /// lookup is an error, never "absent".
    ///
    /// # Errors
    ///
    /// Any [`SendError`] from the single-page read.
    pub async fn find_by_key(
        &self,
        entity: &EntityDescriptor,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Record>, SendError> {
        let filter = key_filter(&entity.key_field, key);
        let url = format!(
            "{}?$filter={}",
            self.config.collection_url(entity),
            urlencoding::encode(&filter)
        );

        let page = self.reader.fetch_page(&url, cancel).await?;
        if page.rows.len() > 1 {
            warn!(
                entity = %entity.name,
                %key,
                rows = page.rows.len(),
                "key lookup matched several records"
            );
        }
        Ok(page.rows.iter().find_map(Record::from_json))
    }

    /// Converge the remote record identified by `desired`'s natural key to
    /// `desired`.
    #[instrument(skip_all, fields(entity = %entity.name, key))]
    pub async fn upsert(
        &self,
        entity: &EntityDescriptor,
        desired: &Value,
        cancel: &CancellationToken,
    ) -> UpsertOutcome {
        if cancel.is_cancelled() {
            return UpsertOutcome::Cancelled;
        }

        let outcome = UpsertOutcome::from_result(self.try_upsert(entity, desired, cancel).await);
        match &outcome {
            UpsertOutcome::Failed(err) => warn!(error = %err, "upsert failed"),
            other => info!(action = %other.action(), "upsert finished"),
        }
        outcome
    }

    /// Delete `record` using its `systemId` and etag.
    #[instrument(skip_all, fields(entity = %entity.name))]
    pub async fn delete(
        &self,
        entity: &EntityDescriptor,
        record: &Record,
        cancel: &CancellationToken,
    ) -> UpsertOutcome {
        if cancel.is_cancelled() {
            return UpsertOutcome::Cancelled;
        }
        UpsertOutcome::from_result(self.try_delete(entity, record, cancel).await)
    }

    async fn try_upsert(
        &self,
        entity: &EntityDescriptor,
        desired: &Value,
        cancel: &CancellationToken,
    ) -> Result<UpsertOutcome, UpsertError> {
        let Value::Object(payload) = desired else {
            let message = "desired payload must be a JSON object".to_string();
            return Err(UpsertError::InvalidPayload(message));
        };

        let desired_record = Record::from_json_object(payload);
        let key = desired_record
            .key(&entity.key_field)
            .map(|key| key.into_owned())
            .ok_or_else(|| UpsertError::MissingKey { field: entity.key_field.clone() })?;
        Span::current().record("key", key.as_str());

        let Some(existing) = self.find_by_key(entity, &key, cancel).await? else {
            debug!("record absent, creating");
            let record = self.create(entity, payload, cancel).await?;
            return Ok(UpsertOutcome::Created(record));
        };

        let Some(field) = is_patch_required(&existing, &desired_record, &entity.diff_policy)
        else {
            debug!("record up to date");
            return Ok(UpsertOutcome::Unchanged(existing));
        };
        debug!(%field, "record differs, patching");

        self.patch_with_refresh(entity, &key, existing, payload, cancel).await
    }

    /// PATCH `payload`, re-reading the record after each stale etag. The body
    /// is rebuilt from every fresh read since exemptions depend on the
    /// existing values.
    async fn patch_with_refresh(
        &self,
        entity: &EntityDescriptor,
        key: &str,
        mut existing: Record,
        payload: &Map<String, Value>,
        cancel: &CancellationToken,
    ) -> Result<UpsertOutcome, UpsertError> {
        let max_rounds = self.config.retry.max_stale_retries;
        let mut rounds = 0;

        loop {
            let body = patch_body(
                payload,
                &existing,
                &entity.diff_policy,
                &entity.update_excluded_fields,
            );
            match self.patch(entity, key, &existing, &body, cancel).await {
                Ok(record) => return Ok(UpsertOutcome::Patched(record)),
                Err(UpsertError::Send(stale @ SendError::StaleConcurrency { .. })) => {
                    if rounds >= max_rounds {
                        return Err(UpsertError::StaleRetriesExhausted {
                            attempts: rounds,
                            last: stale,
                        });
                    }
                    rounds += 1;
                    warn!(round = rounds, "stale etag, re-reading record");

                    existing = self
                        .find_by_key(entity, key, cancel)
                        .await?
                        .ok_or_else(|| UpsertError::NotFound { key: key.to_string() })?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn create(
        &self,
        entity: &EntityDescriptor,
        payload: &Map<String, Value>,
        cancel: &CancellationToken,
    ) -> Result<Option<Record>, UpsertError> {
        let url = self.config.collection_url(entity);
        let request = build(self.pipeline.request(Method::POST, &url).json(payload))?;

        let options = write_options(entity, "create", "created");
        let reply = self.pipeline.send(request, &options, cancel).await?;
        Ok(representation(&reply))
    }

    async fn patch(
        &self,
        entity: &EntityDescriptor,
        key: &str,
        existing: &Record,
        body: &Map<String, Value>,
        cancel: &CancellationToken,
    ) -> Result<Option<Record>, UpsertError> {
        let url = self.record_url(entity, key, existing)?;
        let builder = self.pipeline.request(Method::PATCH, &url).json(body);
        let request = build(with_concurrency_headers(builder, existing)?)?;

        let options = write_options(entity, "update", "updated");
        let reply = self.pipeline.send(request, &options, cancel).await?;
        Ok(representation(&reply))
    }

    async fn try_delete(
        &self,
        entity: &EntityDescriptor,
        record: &Record,
        cancel: &CancellationToken,
    ) -> Result<UpsertOutcome, UpsertError> {
        let key = record.key(&entity.key_field).map(|key| key.into_owned()).unwrap_or_default();
        let url = self.record_url(entity, &key, record)?;
        let builder = self.pipeline.request(Method::DELETE, &url);
        let request = build(with_concurrency_headers(builder, record)?)?;

        let options = write_options(entity, "delete", "deleted");
        self.pipeline.send(request, &options, cancel).await?;
        Ok(UpsertOutcome::Deleted)
    }

    fn record_url(
        &self,
        entity: &EntityDescriptor,
        key: &str,
        record: &Record,
    ) -> Result<String, UpsertError> {
        let system_id = record
            .system_id()
            .ok_or_else(|| UpsertError::MissingSystemId { key: key.to_string() })?;
        Ok(entity_url(&self.config.collection_url(entity), system_id))
    }
}

/// `If-Match` with the record's etag (or `*`) and `Prefer: return=representation`.
fn with_concurrency_headers(
    builder: RequestBuilder,
    record: &Record,
) -> Result<RequestBuilder, UpsertError> {
    let etag = record.etag().unwrap_or(IF_MATCH_ANY);
    let if_match = HeaderValue::from_str(etag)
        .map_err(|err| UpsertError::InvalidEtag(format!("{etag:?}: {err}")))?;

    Ok(builder
        .header(IF_MATCH, if_match)
        .header(PREFER, HeaderValue::from_static(PREFER_REPRESENTATION)))
}

fn write_options(entity: &EntityDescriptor, verb: &str, past: &str) -> SendOptions {
    SendOptions::new(entity.name.as_str(), format!("Failed to {verb} {}", entity.name))
        .with_success_message(format!("{} {past}", entity.name))
}

fn build(builder: RequestBuilder) -> Result<Request, SendError> {
    builder.build().map_err(|err| SendError::Transport(format!("invalid request: {err}")))
}

/// Record returned in a write reply body, if it carried one.
fn representation(reply: &HttpReply) -> Option<Record> {
    if reply.is_empty() {
        return None;
    }
    reply.json::<Value>().ok().as_ref().and_then(Record::from_json)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> Record {
        Record::from_json(&value).unwrap()
    }

    #[test]
    fn outcome_maps_to_action_and_record() {
        let existing = record(json!({"number": "A"}));

        assert_eq!(UpsertOutcome::Unchanged(existing.clone()).action(), SyncAction::Unchanged);
        assert_eq!(UpsertOutcome::Unchanged(existing.clone()).record(), Some(&existing));
        assert_eq!(UpsertOutcome::Created(None).record(), None);
        assert_eq!(UpsertOutcome::Cancelled.action(), SyncAction::Cancelled);
    }

    #[test]
    fn cancelled_send_becomes_cancelled_outcome() {
        let outcome = UpsertOutcome::from_result(Err(SendError::Cancelled.into()));
        assert_eq!(outcome, UpsertOutcome::Cancelled);

        let outcome = UpsertOutcome::from_result(Err(UpsertError::MissingKey {
            field: "number".into(),
        }));
        assert_eq!(outcome.action(), SyncAction::Failed);
        assert_eq!(outcome.error().and_then(UpsertError::status), None);
    }

    #[test]
    fn stale_exhaustion_keeps_last_status() {
        let err = UpsertError::StaleRetriesExhausted {
            attempts: 5,
            last: SendError::StaleConcurrency { body: "Request_EntityChanged".into() },
        };
        assert_eq!(err.status(), Some(409));
        assert!(err.to_string().starts_with("stale etag persisted after 5"));
    }

    #[test]
    fn concurrency_headers_fall_back_to_wildcard() {
        let builder = reqwest::Client::new().patch("https://erp.test/api/items(1)");
        let untagged = record(json!({"systemId": "1"}));
        let request = with_concurrency_headers(builder, &untagged).unwrap().build().unwrap();

        assert_eq!(request.headers()[IF_MATCH], "*");
        assert_eq!(request.headers()["prefer"], "return=representation");

        let builder = reqwest::Client::new().patch("https://erp.test/api/items(1)");
        let tagged = record(json!({"systemId": "1", "@odata.etag": "W/\"JzQ0OzE7\""}));
        let request = with_concurrency_headers(builder, &tagged).unwrap().build().unwrap();
        assert_eq!(request.headers()[IF_MATCH], "W/\"JzQ0OzE7\"");
    }

    #[test]
    fn unusable_etag_is_reported_as_such() {
        let builder = reqwest::Client::new().patch("https://erp.test/api/items(1)");
        let broken = record(json!({"systemId": "1", "@odata.etag": "W/\"a\nb\""}));

        let err = with_concurrency_headers(builder, &broken).unwrap_err();

        assert!(matches!(err, UpsertError::InvalidEtag(_)));
        assert!(err.to_string().contains("unusable as If-Match"));
    }
}
