//! Replay of fallback-queued envelopes
//!
//! Walks the local fallback store and re-delivers each record through the
//! dispatcher's sink chain. A per-record failure is logged and never aborts
//! the pass. Records that fail again are retained via filter-and-rewrite;
//! only delivered records leave the store.

use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::store::FallbackRecord;

/// Outcome of one replay pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    /// Records read from the store
    pub attempted: usize,
    /// Records a sink accepted this pass
    pub delivered: usize,
    /// Records that failed again and stay queued
    pub retained: usize,
}

/// Re-submits persisted envelopes through the dispatcher.
///
/// Replay re-delivers without appending, so a failed re-delivery cannot
/// duplicate a record. The final rewrite replaces the whole file with this
/// pass's survivors: a record appended by a concurrent failing capture
/// between the read and the rewrite is lost. The store is a single-process
/// fallback, so that window is accepted rather than locked against.
pub struct ReplayCoordinator<'a> {
    dispatcher: &'a Dispatcher,
}

impl<'a> ReplayCoordinator<'a> {
    pub fn new(dispatcher: &'a Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Replay every pending record once.
    pub async fn retry_all(&self) -> Result<ReplayReport> {
        let records = self.dispatcher.store().list()?;
        if records.is_empty() {
            return Ok(ReplayReport::default());
        }

        let mut report = ReplayReport {
            attempted: records.len(),
            ..Default::default()
        };
        let mut survivors: Vec<FallbackRecord> = Vec::new();

        for record in records {
            match self.dispatcher.deliver(&record.envelope).await {
                Ok(_) => {
                    report.delivered += 1;
                    tracing::debug!(
                        kind = %record.envelope.payload.kind(),
                        "Replayed fallback envelope"
                    );
                }
                Err(e) => {
                    report.retained += 1;
                    tracing::warn!(
                        kind = %record.envelope.payload.kind(),
                        error = %e,
                        "Replay failed, record retained"
                    );
                    survivors.push(record);
                }
            }
        }

        self.dispatcher.store().rewrite(&survivors)?;

        tracing::info!(
            attempted = report.attempted,
            delivered = report.delivered,
            retained = report.retained,
            "Replay pass complete"
        );
        Ok(report)
    }
}
