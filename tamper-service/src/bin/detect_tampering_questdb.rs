use anyhow::{bail, Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::{env, sync::Arc};
use tamper_service::{
    config::AppConfig,
    observability,
    pipeline::BatchPipeline,
    sinks::CsvReportSink,
    sources::QuestDbReadingSource,
    transform,
};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Flag suspicious meters using monthly reads aggregated from QuestDB.
///
/// Usage:
///   detect_tampering_questdb <start_rfc3339> <end_rfc3339>
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        bail!("usage: detect_tampering_questdb <start_rfc3339> <end_rfc3339>");
    }
    let start = OffsetDateTime::parse(&args[1], &Rfc3339).with_context(|| format!("invalid start '{}'", args[1]))?;
    let end = OffsetDateTime::parse(&args[2], &Rfc3339).with_context(|| format!("invalid end '{}'", args[2]))?;
    if start >= end {
        bail!("start must be before end");
    }

    let cfg = AppConfig::load()?;
    let Some(questdb) = &cfg.questdb else {
        bail!("[questdb] section missing from configuration");
    };

    let pool = PgPoolOptions::new()
        .max_connections(questdb.max_connections)
        .connect(&questdb.uri)
        .await?;

    let pipeline = BatchPipeline {
        source: QuestDbReadingSource::new(pool, start, end),
        transforms: vec![Arc::new(transform::ReadingValidation::default())],
        thresholds: cfg.thresholds,
        workers: cfg.engine.workers,
        sink: CsvReportSink::new(&cfg.export.output_dir, cfg.export.profile_limit),
    };

    let summary = pipeline.run().await?;
    tracing::info!(
        readings = summary.readings,
        meters = summary.meters,
        suspicious = summary.suspicious,
        digest = %summary.digest,
        output_dir = %cfg.export.output_dir.display(),
        "questdb tamper scan finished"
    );

    Ok(())
}
