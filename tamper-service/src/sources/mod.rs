pub mod delimited_file;
pub mod incoming;
pub mod ndjson_file;
pub mod questdb;

use std::path::Path;

use futures::Stream;
use meter_client::domain::Reading;

pub use delimited_file::DelimitedFileSource;
pub use incoming::{IncomingReading, Scalar};
pub use ndjson_file::NdjsonFileSource;
pub use questdb::QuestDbReadingSource;

use crate::{
    pipeline::{Envelope, PipelineError, Source},
    schema::ColumnMapping,
};

/// File-backed reading source chosen by extension.
pub enum FileSource {
    Delimited(DelimitedFileSource),
    Ndjson(NdjsonFileSource),
}

impl FileSource {
    pub fn from_path(path: &Path, columns: ColumnMapping) -> Result<Self, PipelineError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => Ok(Self::Delimited(DelimitedFileSource::csv(path, columns))),
            "dat" => Ok(Self::Delimited(DelimitedFileSource::dat(path, columns))),
            "tsv" => Ok(Self::Delimited(DelimitedFileSource::new(path, b'\t', columns))),
            "ndjson" | "jsonl" => Ok(Self::Ndjson(NdjsonFileSource::new(path))),
            other => Err(PipelineError::Source(format!(
                "unsupported input file extension '{other}' (expected csv, dat, tsv, ndjson or jsonl)"
            ))),
        }
    }
}

#[async_trait::async_trait]
impl Source<Reading> for FileSource {
    async fn stream(
        &self,
    ) -> std::pin::Pin<Box<dyn Stream<Item = Result<Envelope<Reading>, PipelineError>> + Send>> {
        match self {
            Self::Delimited(s) => s.stream().await,
            Self::Ndjson(s) => s.stream().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_is_chosen_by_extension() {
        let columns = ColumnMapping::default();
        assert!(matches!(
            FileSource::from_path(Path::new("reads.CSV"), columns.clone()),
            Ok(FileSource::Delimited(_))
        ));
        assert!(matches!(
            FileSource::from_path(Path::new("reads.dat"), columns.clone()),
            Ok(FileSource::Delimited(_))
        ));
        assert!(matches!(
            FileSource::from_path(Path::new("reads.jsonl"), columns.clone()),
            Ok(FileSource::Ndjson(_))
        ));
        assert!(matches!(
            FileSource::from_path(Path::new("reads.xlsx"), columns),
            Err(PipelineError::Source(_))
        ));
    }
}
