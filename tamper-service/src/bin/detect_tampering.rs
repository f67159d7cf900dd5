use anyhow::{bail, Result};
use std::{env, path::{Path, PathBuf}, sync::Arc};
use tamper_service::{
    config::AppConfig,
    observability,
    pipeline::BatchPipeline,
    sinks::CsvReportSink,
    sources::FileSource,
    transform,
};

/// Flag suspicious meters in a file of monthly reads.
///
/// Usage:
///   detect_tampering <input_file> [output_dir]
///
/// The input may be CSV, pipe-delimited `.dat`, TSV or NDJSON. Column names
/// and thresholds come from the config file (`TAMPER_CONFIG`).
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: detect_tampering <input_file> [output_dir]");
    }
    let input = Path::new(&args[1]);

    let cfg = AppConfig::load()?;
    let output_dir = args
        .get(2)
        .map(PathBuf::from)
        .unwrap_or_else(|| cfg.export.output_dir.clone());

    let source = FileSource::from_path(input, cfg.columns.clone())?;
    let sink = CsvReportSink::new(&output_dir, cfg.export.profile_limit);

    let pipeline = BatchPipeline {
        source,
        transforms: vec![Arc::new(transform::ReadingValidation::default())],
        thresholds: cfg.thresholds,
        workers: cfg.engine.workers,
        sink,
    };

    let summary = pipeline.run().await?;
    println!(
        "{} readings, {} meters, {} suspicious; report in {} (digest {})",
        summary.readings,
        summary.meters,
        summary.suspicious,
        output_dir.display(),
        summary.digest
    );

    Ok(())
}
