//! Batched submission to a bulk-create endpoint.
//!
//! Records are sent in consecutive chunks of at most `batch_size`, one request
//! at a time. The next chunk is only sent once the previous response arrived,
//! so at most one batch is ever in flight.

use std::future::Future;

use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::ApiClient;
use crate::error::{Error, Result};

/// Trait for sending one batch of records to a backend
pub trait BatchSink<T>: Send + Sync {
    /// URL batches are sent to, for logs
    fn url(&self) -> &str;

    /// Send a batch and report the response status
    fn send_batch(&self, batch: &[T]) -> impl Future<Output = Result<StatusCode>> + Send;
}

/// Bulk-create endpoint reached over HTTP
pub struct HttpBatchSink {
    client: ApiClient,
    url: String,
}

impl HttpBatchSink {
    pub fn new(client: ApiClient, url: String) -> Self {
        Self { client, url }
    }
}

impl<T> BatchSink<T> for HttpBatchSink
where
    T: Serialize + Sync,
{
    fn url(&self) -> &str {
        &self.url
    }

    async fn send_batch(&self, batch: &[T]) -> Result<StatusCode> {
        let response = self
            .client
            .http()
            .post(&self.url)
            .json(batch)
            .send()
            .await
            .map_err(|e| Error::http(&self.url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!("Response body: {}", body);
        }
        Ok(status)
    }
}

/// Outcome of a submission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitSummary {
    /// Requests sent
    pub batches: usize,

    /// Records sent across all batches
    pub records: usize,

    /// Batches answered with a non-2xx status
    pub rejected_batches: usize,
}

/// Send `records` in order, `batch_size` at a time.
///
/// Response statuses are logged and counted but never acted upon; only a
/// transport failure stops the submission.
pub async fn submit<T, S>(sink: &S, records: &[T], batch_size: usize) -> Result<SubmitSummary>
where
    S: BatchSink<T>,
{
    let mut summary = SubmitSummary::default();

    for batch in records.chunks(batch_size.max(1)) {
        let status = sink.send_batch(batch).await?;

        summary.batches += 1;
        summary.records += batch.len();

        if status.is_success() {
            info!("{} {} ({} records)", status.as_u16(), sink.url(), batch.len());
        } else {
            warn!("{} {} ({} records)", status.as_u16(), sink.url(), batch.len());
            summary.rejected_batches += 1;
        }
    }

    Ok(summary)
}
