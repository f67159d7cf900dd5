use std::path::PathBuf;

use async_stream::stream;
use futures::Stream;
use meter_client::domain::Reading;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
};

use super::incoming::{record_issue, IncomingReading};
use crate::pipeline::{Envelope, PipelineError, Source};

/// NDJSON source: one reading object per line, same shape as the HTTP
/// `/classify` payload entries. Blank lines are skipped.
pub struct NdjsonFileSource {
    path: PathBuf,
}

impl NdjsonFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

fn parse_line(line: &str, row: usize) -> Result<Reading, PipelineError> {
    let incoming: IncomingReading =
        serde_json::from_str(line).map_err(|e| PipelineError::Schema(record_issue(row, &e)))?;
    Ok(incoming.into_raw(row).parse()?)
}

#[async_trait::async_trait]
impl Source<Reading> for NdjsonFileSource {
    async fn stream(
        &self,
    ) -> std::pin::Pin<Box<dyn Stream<Item = Result<Envelope<Reading>, PipelineError>> + Send>> {
        let path = self.path.clone();
        let s = stream! {
            match File::open(&path).await {
                Err(e) => {
                    yield Err(PipelineError::Source(format!("failed to open {}: {e}", path.display())));
                }
                Ok(file) => {
                    let mut lines = BufReader::new(file).lines();
                    let mut row = 0usize;

                    loop {
                        let line = match lines.next_line().await {
                            Ok(Some(line)) => line,
                            Ok(None) => break,
                            Err(e) => {
                                yield Err(PipelineError::Source(format!("failed to read line {}: {e}", row + 1)));
                                break;
                            }
                        };
                        row += 1;
                        if line.trim().is_empty() {
                            continue;
                        }

                        match parse_line(&line, row) {
                            Ok(reading) => yield Ok(Envelope { payload: reading, row }),
                            Err(e) => {
                                metrics::counter!("reading_file_parse_errors_total").increment(1);
                                yield Err(e);
                            }
                        }
                    }
                }
            }
        };

        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_line() {
        let reading = parse_line(
            r#"{"meter_id":"m-1","building_id":"b-1","date":"2022-10-01","consumption":"7.5"}"#,
            3,
        )
        .unwrap();
        assert_eq!(reading.meter_id, "m-1");
        assert_eq!(reading.consumption, 7.5);
    }

    #[test]
    fn malformed_json_is_a_schema_issue_with_its_line() {
        match parse_line("{not json", 9) {
            Err(PipelineError::Schema(e)) => {
                assert_eq!(e.invalid[0].row, 9);
                assert!(e.invalid[0].reason.starts_with("invalid JSON"));
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }
}
