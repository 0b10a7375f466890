//! Bounded-concurrency batch execution.
//!
//! Fans a list of requests out over the single-request path. The
//! concurrency primitive is local to the batch; global throughput is still
//! governed by the resilience layer's per-operation state, and the cache's
//! single-flight prevents duplicate upstream work on identical items.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::{
    TextProcessor,
    types::{BatchRequest, BatchResponse, PerItemResult, ProcessingRequest},
};
use crate::error::ServiceError;

pub struct BatchExecutor {
    processor: Arc<TextProcessor>,
    concurrency_limit: usize,
    max_items: usize,
}

impl BatchExecutor {
    pub fn new(processor: Arc<TextProcessor>, concurrency_limit: usize, max_items: usize) -> Self {
        Self {
            processor,
            concurrency_limit: concurrency_limit.clamp(1, 50),
            max_items,
        }
    }

    /// Process a batch.
    ///
    /// - Per-item failures are captured; they never abort the batch.
    /// - Results come back in input order regardless of completion order.
    /// - On cancellation, no new items start. Batch cancellation is
    ///   consulted exactly once per item, before its work begins; an item
    ///   that has started runs under a detached token and completes on its
    ///   own per-attempt timeouts.
    pub async fn process_batch(
        &self,
        request: BatchRequest,
        cancel: &CancellationToken,
    ) -> Result<BatchResponse, ServiceError> {
        if request.batch_id.trim().is_empty() {
            return Err(ServiceError::Validation("batch_id must not be empty".into()));
        }
        if request.items.is_empty() {
            return Err(ServiceError::Validation("batch contains no items".into()));
        }
        if request.items.len() > self.max_items {
            return Err(ServiceError::Validation(format!(
                "batch exceeds the maximum of {} items (got {})",
                self.max_items,
                request.items.len()
            )));
        }

        let batch_id = request.batch_id.clone();
        let total = request.items.len();
        tracing::info!(
            batch_id = %batch_id,
            total,
            concurrency = self.concurrency_limit,
            "batch started"
        );

        // One semaphore per batch; permits are released when an item
        // finishes. Cancellation is checked after a permit is acquired and
        // before the item starts, never while it is running.
        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));

        let handles: Vec<_> = request
            .items
            .into_iter()
            .enumerate()
            .map(|(index, mut item)| {
                if item.trace_id.is_none() {
                    item.trace_id = Some(format!("{batch_id}-{index}"));
                }
                let processor = self.processor.clone();
                let semaphore = semaphore.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .expect("batch semaphore never closes");
                    if cancel.is_cancelled() {
                        return PerItemResult::Err {
                            error_code: ServiceError::Cancelled.kind().as_str().to_string(),
                            error_message: "batch cancelled before item started".to_string(),
                        };
                    }
                    // Once past the gate the item is in flight: it runs
                    // under its own token so a later batch cancellation
                    // cannot abort a mid-attempt model call. Per-attempt
                    // timeouts still bound it.
                    let item_cancel = CancellationToken::new();
                    run_item(&processor, item, &item_cancel).await
                })
            })
            .collect();

        let items: Vec<PerItemResult> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| {
                joined.unwrap_or_else(|join_error| PerItemResult::Err {
                    error_code: "internal_error".to_string(),
                    error_message: format!("item task failed: {join_error}"),
                })
            })
            .collect();

        let completed = items.iter().filter(|item| item.is_ok()).count();
        let failed = total - completed;
        tracing::info!(batch_id = %batch_id, completed, failed, "batch finished");

        Ok(BatchResponse {
            batch_id,
            total,
            completed,
            failed,
            items,
        })
    }
}

async fn run_item(
    processor: &TextProcessor,
    item: ProcessingRequest,
    cancel: &CancellationToken,
) -> PerItemResult {
    match processor.process(item, cancel).await {
        Ok(response) => PerItemResult::Ok { response },
        Err(error) => PerItemResult::Err {
            error_code: error.kind().as_str().to_string(),
            error_message: error.to_string(),
        },
    }
}
