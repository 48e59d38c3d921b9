//! Batch runner
//!
//! Upserts a run of source records one at a time. A failing record is counted
//! and reported, never allowed to abort the rest of the run; cancellation
//! stops the run and marks every record not yet settled as cancelled.

use erpsync_core::PayloadProducer;
use erpsync_domain::{EntityDescriptor, Record};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::upsert::{UpsertError, UpsertOutcome, Upserter};

/// One record that did not converge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    /// Position of the source record in the input
    pub index: usize,
    /// Natural key, when the payload got far enough to have one
    pub key: Option<String>,
    pub error: UpsertError,
}

/// Tally of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub created: usize,
    pub patched: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.created + self.patched + self.unchanged + self.deleted + self.failed + self.cancelled
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }

    fn record(&mut self, index: usize, key: Option<String>, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created(_) => self.created += 1,
            UpsertOutcome::Patched(_) => self.patched += 1,
            UpsertOutcome::Unchanged(_) => self.unchanged += 1,
            UpsertOutcome::Deleted => self.deleted += 1,
            UpsertOutcome::Cancelled => self.cancelled += 1,
            UpsertOutcome::Failed(error) => {
                self.failed += 1;
                self.failures.push(BatchFailure { index, key, error });
            }
        }
    }
}

/// Produce a desired payload for every source and upsert it.
#[instrument(skip_all, fields(entity = %entity.name, sources = sources.len()))]
pub async fn run_batch<P>(
    upserter: &Upserter,
    entity: &EntityDescriptor,
    producer: &P,
    sources: &[P::Source],
    cancel: &CancellationToken,
) -> BatchReport
where
    P: PayloadProducer,
{
    let mut report = BatchReport::default();

    for (index, source) in sources.iter().enumerate() {
        if cancel.is_cancelled() {
            report.cancelled += sources.len() - index;
            warn!(remaining = sources.len() - index, "batch cancelled");
            break;
        }

        let desired = match producer.produce(source) {
            Ok(desired) => desired,
            Err(err) => {
                let error = UpsertError::InvalidPayload(err.to_string());
                report.record(index, None, UpsertOutcome::Failed(error));
                continue;
            }
        };

        let key = Record::from_json(&desired)
            .and_then(|record| record.key(&entity.key_field).map(|key| key.into_owned()));

        let outcome = upserter.upsert(entity, &desired, cancel).await;
        report.record(index, key, outcome);
    }

    info!(
        created = report.created,
        patched = report.patched,
        unchanged = report.unchanged,
        failed = report.failed,
        cancelled = report.cancelled,
        "batch finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::http::SendError;

    #[test]
    fn report_tallies_outcomes() {
        let mut report = BatchReport::default();
        let record = Record::from_json(&json!({"number": "A"})).unwrap();

        report.record(0, Some("A".into()), UpsertOutcome::Unchanged(record));
        report.record(1, Some("B".into()), UpsertOutcome::Created(None));
        report.record(
            2,
            Some("C".into()),
            UpsertOutcome::Failed(SendError::Status { status: 400, body: "bad".into() }.into()),
        );
        report.record(3, None, UpsertOutcome::Cancelled);

        assert_eq!(report.total(), 4);
        assert_eq!((report.created, report.unchanged, report.failed), (1, 1, 1));
        assert_eq!(report.failures[0].index, 2);
        assert_eq!(report.failures[0].key.as_deref(), Some("C"));
        assert!(!report.is_clean());
    }
}
