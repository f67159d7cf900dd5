use std::{pin::Pin, sync::Arc};

use futures::{Stream, StreamExt};
use meter_client::domain::Reading;

use crate::{
    analysis::{classify_sharded, ClassificationOutput, ClassifyError, Thresholds},
    report::RunSummary,
    schema::SchemaError,
};

#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    /// Position of the record in its source (file line, array index), for
    /// error reporting.
    pub row: usize,
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error("sink error: {0}")]
    Sink(String),
}

#[async_trait::async_trait]
pub trait Source<T>: Send + Sync {
    async fn stream(
        &self,
    ) -> Pin<Box<dyn Stream<Item = Result<Envelope<T>, PipelineError>> + Send>>;
}

#[async_trait::async_trait]
pub trait Transform<I, O>: Send + Sync {
    async fn apply(&self, input: Envelope<I>) -> Result<Envelope<O>, PipelineError>;
}

/// Destination for a finished classification run.
#[async_trait::async_trait]
pub trait ReportSink: Send + Sync {
    async fn write(&self, output: &ClassificationOutput) -> Result<(), PipelineError>;
}

/// Drains a reading source, classifies the whole batch, hands the result to
/// a sink.
///
/// Schema problems from the source and the transforms are accumulated; if
/// there are any, the run fails with a single `SchemaError` and nothing is
/// classified or written.
pub struct BatchPipeline<S, K> {
    pub source: S,
    pub transforms: Vec<Arc<dyn Transform<Reading, Reading> + Send + Sync>>,
    pub thresholds: Thresholds,
    pub workers: usize,
    pub sink: K,
}

impl<S, K> BatchPipeline<S, K>
where
    S: Source<Reading> + Send + Sync + 'static,
    K: ReportSink + 'static,
{
    pub async fn run(self) -> Result<RunSummary, PipelineError> {
        let mut stream = self.source.stream().await;

        for t in self.transforms {
            let t_arc = t.clone();
            stream = Box::pin(stream.then(move |item| {
                let t_inner = t_arc.clone();
                async move {
                    match item {
                        Ok(env) => t_inner.apply(env).await,
                        Err(e) => Err(e),
                    }
                }
            }));
        }

        let mut readings = Vec::new();
        let mut rejected = SchemaError::default();
        while let Some(item) = stream.next().await {
            match item {
                Ok(env) => readings.push(env.payload),
                Err(PipelineError::Schema(e)) => rejected.merge(e),
                Err(e) => return Err(e),
            }
        }

        if !rejected.is_empty() {
            metrics::counter!("tamper_schema_rejections_total").increment(1);
            tracing::error!(
                missing_columns = rejected.missing_columns.len(),
                invalid_fields = rejected.invalid.len(),
                "input rejected before classification"
            );
            return Err(rejected.into());
        }
        tracing::info!(readings = readings.len(), "input loaded");

        let output = classify_sharded(readings, self.thresholds, self.workers).await?;
        self.sink.write(&output).await?;

        let summary = RunSummary::from_output(&output);
        tracing::info!(
            meters = summary.meters,
            suspicious = summary.suspicious,
            digest = %summary.digest,
            "run complete"
        );
        Ok(summary)
    }
}
