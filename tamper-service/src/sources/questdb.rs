use futures::Stream;
use meter_client::{db::monthly_reads, domain::Reading};
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::pipeline::{Envelope, PipelineError, Source};

/// Monthly reads aggregated from the QuestDB `meter_usage` table for
/// `[start, end)`.
pub struct QuestDbReadingSource {
    pool: PgPool,
    start: OffsetDateTime,
    end: OffsetDateTime,
}

impl QuestDbReadingSource {
    pub fn new(pool: PgPool, start: OffsetDateTime, end: OffsetDateTime) -> Self {
        Self { pool, start, end }
    }
}

#[async_trait::async_trait]
impl Source<Reading> for QuestDbReadingSource {
    async fn stream(
        &self,
    ) -> std::pin::Pin<Box<dyn Stream<Item = Result<Envelope<Reading>, PipelineError>> + Send>> {
        let pool = self.pool.clone();
        let (start, end) = (self.start, self.end);
        let s = async_stream::try_stream! {
            let reads = monthly_reads(&pool, start, end)
                .await
                .map_err(|e| PipelineError::Source(format!("questdb monthly read query failed: {e}")))?;
            tracing::info!(rows = reads.len(), "monthly reads fetched from questdb");

            for (i, reading) in reads.into_iter().enumerate() {
                yield Envelope {
                    payload: reading,
                    row: i + 1,
                };
            }
        };

        Box::pin(s)
    }
}
