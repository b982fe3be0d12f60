use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::error::{RemoteError, Result, SweepError};
use crate::journal::{self, Pool};
use crate::model::DeletionBatch;
use crate::remote::TelegramApi;

/// What a finished [`BulkDeleter::delete`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub chunks: usize,
    pub deleted: usize,
    pub rate_limited_waits: usize,
    pub waited: Duration,
}

/// Journal destination for successfully deleted chunks.
#[derive(Clone)]
struct JournalSink {
    pool: Pool,
    run_id: i64,
}

/// Deletes ids chunk by chunk, sleeping through rate limits.
///
/// A rate-limited chunk is retried after the mandated wait with no retry
/// ceiling. Any other failure stops the run for this chat; chunks that already
/// went through stay deleted.
#[derive(Clone)]
pub struct BulkDeleter {
    api: Arc<dyn TelegramApi>,
    chunk_size: usize,
    journal: Option<JournalSink>,
}

impl BulkDeleter {
    pub fn new(api: Arc<dyn TelegramApi>, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(SweepError::Configuration(
                "delete chunk size must be > 0".into(),
            ));
        }
        Ok(Self {
            api,
            chunk_size,
            journal: None,
        })
    }

    pub fn with_journal(mut self, pool: Pool, run_id: i64) -> Self {
        self.journal = Some(JournalSink { pool, run_id });
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[instrument(skip_all, fields(chat_id = chat_id, total = batch.len()))]
    pub async fn delete(&self, chat_id: i64, batch: DeletionBatch) -> Result<DeleteReport> {
        let ids = batch.into_ids();
        let mut report = DeleteReport::default();

        for chunk in ids.chunks(self.chunk_size) {
            let mut attempts: i64 = 0;
            loop {
                attempts += 1;
                match self.api.delete_messages(chat_id, chunk).await {
                    Ok(()) => break,
                    Err(RemoteError::RateLimited(wait)) => {
                        warn!(
                            chunk = report.chunks,
                            wait_secs = wait.as_secs(),
                            attempts,
                            "rate limited; waiting before retrying chunk"
                        );
                        report.rate_limited_waits += 1;
                        report.waited += wait;
                        tokio::time::sleep(wait).await;
                    }
                    Err(err) => return Err(err.into()),
                }
            }

            report.chunks += 1;
            report.deleted += chunk.len();
            info!(chunk = report.chunks, size = chunk.len(), "deleted chunk");

            if let Some(sink) = &self.journal {
                journal::record_chunk(&sink.pool, sink.run_id, chat_id, chunk, attempts).await?;
            }
        }

        Ok(report)
    }
}
