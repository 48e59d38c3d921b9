//! Pagination reader
//!
//! Follows `@odata.nextLink` through a collection and flattens every row into
//! a [`RecordCollection`]. The read is best effort: a failed page or a body
//! that is not JSON ends the walk and whatever was gathered is returned.

use erpsync_core::sync::odata::{parse_page, Page};
use erpsync_domain::{Record, RecordCollection};
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::Method;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::http::{SendError, SendOptions, SendPipeline};

const SOURCE: &str = "pagination";

/// Reads whole collections, or single pages, through a [`SendPipeline`].
#[derive(Debug, Clone)]
pub struct PaginationReader {
    pipeline: SendPipeline,
}

impl PaginationReader {
    pub fn new(pipeline: SendPipeline) -> Self {
        Self { pipeline }
    }

    /// Fetch every page starting at `url`, keyed by `key_field`.
    ///
    /// Rows without a non-empty key are skipped. When two rows share a key
    /// (case-insensitive) the one read last wins.
    ///
    /// # Errors
    ///
    /// Only [`SendError::Cancelled`]. Every other failure stops the walk and
    /// returns the partial collection.
    pub async fn fetch_all(
        &self,
        url: &str,
        key_field: &str,
        cancel: &CancellationToken,
    ) -> Result<RecordCollection, SendError> {
        let mut records = RecordCollection::new();
        let mut current = match Url::parse(url) {
            Ok(url) => url,
            Err(err) => {
                warn!(%url, error = %err, "invalid collection URL, nothing fetched");
                return Ok(records);
            }
        };
        let mut pages = 0usize;

        loop {
            let page = match self.fetch_page(current.as_str(), cancel).await {
                Ok(page) => page,
                Err(SendError::Cancelled) => return Err(SendError::Cancelled),
                Err(err) => {
                    warn!(
                        url = %current,
                        pages,
                        records = records.len(),
                        error = %err,
                        "page fetch failed, returning partial collection"
                    );
                    break;
                }
            };
            pages += 1;

            let skipped = flatten_into(&mut records, &page.rows, key_field);
            debug!(url = %current, rows = page.rows.len(), skipped, "page read");

            let Some(link) = page.next_link else { break };
            match current.join(&link) {
                Ok(next) if next == current => {
                    warn!(url = %current, "next link points at the current page, stopping");
                    break;
                }
                Ok(next) => current = next,
                Err(err) => {
                    warn!(%link, error = %err, "unusable next link, stopping");
                    break;
                }
            }
        }

        debug!(pages, records = records.len(), "collection read finished");
        Ok(records)
    }

    /// Fetch and parse exactly one page.
    ///
    /// # Errors
    ///
    /// Any pipeline failure, or [`SendError::Decode`] when the body is not
    /// JSON.
    pub async fn fetch_page(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Page, SendError> {
        let request = self
            .pipeline
            .request(Method::GET, url)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .build()
            .map_err(|err| SendError::Transport(format!("invalid request: {err}")))?;

        let options = SendOptions::new(SOURCE, format!("Failed to fetch {url}"));
        let reply = self.pipeline.send(request, &options, cancel).await?;

        parse_page(&reply.body).map_err(|err| SendError::Decode(err.to_string()))
    }
}

/// Insert keyed rows, returning how many were skipped.
fn flatten_into(records: &mut RecordCollection, rows: &[Value], key_field: &str) -> usize {
    let mut skipped = 0;
    for row in rows {
        let Some(record) = Record::from_json(row) else {
            skipped += 1;
            continue;
        };
        let Some(key) = record.key(key_field).map(|key| key.into_owned()) else {
            skipped += 1;
            continue;
        };
        records.insert(key, record);
    }
    skipped
}
