use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::{
    analysis::{profile::suspicious_profiles, ClassificationOutput},
    pipeline::{PipelineError, ReportSink},
};

pub const ANNOTATED_FILE: &str = "annotated_readings.csv";
pub const SUSPICIOUS_FILE: &str = "suspicious_meters.csv";
pub const PROFILE_DIR: &str = "profiles";

/// Writes a classification run as CSV files under one directory:
/// the annotated readings, the suspicious-meter list, and one chart profile
/// per suspicious meter (up to `profile_limit`).
pub struct CsvReportSink {
    output_dir: PathBuf,
    profile_limit: usize,
}

impl CsvReportSink {
    pub fn new<P: Into<PathBuf>>(output_dir: P, profile_limit: usize) -> Self {
        Self {
            output_dir: output_dir.into(),
            profile_limit,
        }
    }

    fn write_all(&self, output: &ClassificationOutput) -> Result<(), PipelineError> {
        fs::create_dir_all(&self.output_dir).map_err(|e| sink_error(&self.output_dir, e))?;

        let annotated = self.output_dir.join(ANNOTATED_FILE);
        write_csv_file(&annotated, &output.annotated)?;
        tracing::info!(path = %annotated.display(), rows = output.annotated.len(), "annotated readings written");

        let suspicious = self.output_dir.join(SUSPICIOUS_FILE);
        write_csv_file(&suspicious, &output.suspicious)?;
        tracing::info!(path = %suspicious.display(), rows = output.suspicious.len(), "suspicious meters written");

        let profiles = suspicious_profiles(output, self.profile_limit);
        if !profiles.is_empty() {
            let dir = self.output_dir.join(PROFILE_DIR);
            fs::create_dir_all(&dir).map_err(|e| sink_error(&dir, e))?;
            for profile in &profiles {
                let path = dir.join(format!("{}.csv", file_stem(&profile.meter_id)));
                write_csv_file(&path, &profile.points)?;
            }
            tracing::info!(count = profiles.len(), "meter profiles written");
        }

        Ok(())
    }
}

fn sink_error(path: &Path, e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Sink(format!("failed to write {}: {e}", path.display()))
}

/// Meter ids are free text; keep them usable as file names.
fn file_stem(meter_id: &str) -> String {
    meter_id
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

pub fn write_csv<W: Write, T: Serialize>(writer: W, rows: &[T]) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_csv_file<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), PipelineError> {
    let file = File::create(path).map_err(|e| sink_error(path, e))?;
    write_csv(file, rows).map_err(|e| sink_error(path, e))
}

#[async_trait::async_trait]
impl ReportSink for CsvReportSink {
    async fn write(&self, output: &ClassificationOutput) -> Result<(), PipelineError> {
        match self.write_all(output) {
            Ok(()) => Ok(()),
            Err(e) => {
                metrics::counter!("report_sink_errors_total").increment(1);
                tracing::error!(error = %e, "report export failed");
                Err(e)
            }
        }
    }
}
