use std::{
    fs::File,
    io::{BufRead, BufReader, Cursor, Read},
    path::PathBuf,
};

use futures::Stream;
use meter_client::domain::Reading;

use crate::{
    pipeline::{Envelope, PipelineError, Source},
    schema::ColumnMapping,
};

/// Delimited-text source for monthly reads (CSV, semicolon CSV,
/// pipe-delimited `.dat`, TSV).
///
/// The file must have a header row; the required columns are located by the
/// names in `ColumnMapping`, and any extra columns are ignored. All missing
/// columns are reported before a single row is read.
pub struct DelimitedFileSource {
    path: PathBuf,
    /// `None` picks `,` or `;` from the header line.
    delimiter: Option<u8>,
    columns: ColumnMapping,
}

impl DelimitedFileSource {
    pub fn new<P: Into<PathBuf>>(path: P, delimiter: u8, columns: ColumnMapping) -> Self {
        Self {
            path: path.into(),
            delimiter: Some(delimiter),
            columns,
        }
    }

    /// Comma or semicolon separated, whichever the header line uses.
    pub fn csv<P: Into<PathBuf>>(path: P, columns: ColumnMapping) -> Self {
        Self {
            path: path.into(),
            delimiter: None,
            columns,
        }
    }

    pub fn dat<P: Into<PathBuf>>(path: P, columns: ColumnMapping) -> Self {
        Self::new(path, b'|', columns)
    }
}

/// Spreadsheet exports in decimal-comma locales separate fields with `;`.
fn sniff_delimiter(header_line: &str) -> u8 {
    let semicolons = header_line.matches(';').count();
    let commas = header_line.matches(',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

fn read_records<R: Read>(
    reader: R,
    delimiter: Option<u8>,
    columns: &ColumnMapping,
) -> Vec<Result<Envelope<Reading>, PipelineError>> {
    let mut reader = BufReader::new(reader);
    let mut header_line = String::new();
    if let Err(e) = reader.read_line(&mut header_line) {
        return vec![Err(PipelineError::Source(format!("failed to read headers: {e}")))];
    }
    let delimiter = delimiter.unwrap_or_else(|| sniff_delimiter(&header_line));

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(Cursor::new(header_line.into_bytes()).chain(reader));

    let headers = match rdr.headers() {
        Ok(h) => h.clone(),
        Err(e) => return vec![Err(PipelineError::Source(format!("failed to read headers: {e}")))],
    };
    let index = match columns.resolve(&headers) {
        Ok(index) => index,
        Err(e) => return vec![Err(e.into())],
    };

    let mut out = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                out.push(Err(PipelineError::Source(format!("failed to read record: {e}"))));
                break;
            }
        };
        let row = record.position().map(|p| p.line() as usize).unwrap_or(i + 2);

        match index.raw(row, &record).parse() {
            Ok(reading) => out.push(Ok(Envelope { payload: reading, row })),
            Err(e) => {
                metrics::counter!("reading_file_parse_errors_total").increment(1);
                out.push(Err(e.into()));
            }
        }
    }
    out
}

#[async_trait::async_trait]
impl Source<Reading> for DelimitedFileSource {
    async fn stream(
        &self,
    ) -> std::pin::Pin<Box<dyn Stream<Item = Result<Envelope<Reading>, PipelineError>> + Send>> {
        let path = self.path.clone();
        let delimiter = self.delimiter;
        let columns = self.columns.clone();

        // The csv reader is blocking; parse on the blocking pool and replay.
        let s = async_stream::stream! {
            let parsed = tokio::task::spawn_blocking(move || {
                File::open(&path)
                    .map(|file| read_records(file, delimiter, &columns))
                    .map_err(|e| PipelineError::Source(format!("failed to open {}: {e}", path.display())))
            })
            .await;

            match parsed {
                Ok(Ok(items)) => {
                    for item in items {
                        yield item;
                    }
                }
                Ok(Err(e)) => yield Err(e),
                Err(e) => yield Err(PipelineError::Source(format!("reader task failed: {e}"))),
            }
        };

        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn parse(input: &str, delimiter: Option<u8>, columns: &ColumnMapping) -> Vec<Result<Envelope<Reading>, PipelineError>> {
        read_records(input.as_bytes(), delimiter, columns)
    }

    #[test]
    fn reads_csv_with_extra_columns() {
        let items = parse(
            "meter_id,building_id,date,consumption,note\nm-1,b-1,2021-01,10.5,x\nm-1,b-1,2021-02,11,\n",
            Some(b','),
            &ColumnMapping::default(),
        );
        assert_eq!(items.len(), 2);
        let first = items[0].as_ref().unwrap();
        assert_eq!(first.row, 2);
        assert_eq!(first.payload.date, date!(2021 - 01 - 01));
        assert_eq!(first.payload.consumption, 10.5);
        assert_eq!(items[1].as_ref().unwrap().row, 3);
    }

    #[test]
    fn reads_pipe_delimited_with_mapped_columns() {
        let columns = ColumnMapping {
            meter_id: "TesisatNo".to_string(),
            building_id: "BinaNo".to_string(),
            date: "Tarih".to_string(),
            consumption: "Tüketim".to_string(),
        };
        let items = parse("Tarih|TesisatNo|BinaNo|Tüketim\n2020-12-01|4711|88|3,25\n", Some(b'|'), &columns);
        let reading = &items[0].as_ref().unwrap().payload;
        assert_eq!(reading.meter_id, "4711");
        assert_eq!(reading.building_id, "88");
        assert_eq!(reading.consumption, 3.25);
    }

    #[test]
    fn missing_columns_stop_before_rows() {
        let items = parse("meter_id,date\nm-1,2021-01\n", Some(b','), &ColumnMapping::default());
        assert_eq!(items.len(), 1);
        match &items[0] {
            Err(PipelineError::Schema(e)) => assert_eq!(e.missing_columns, vec!["building_id", "consumption"]),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn bad_rows_are_reported_and_good_rows_kept() {
        let items = parse(
            "meter_id,building_id,date,consumption\nm-1,b-1,2021-01,1\nm-1,b-1,someday,2\nm-1,b-1,2021-03\n",
            Some(b','),
            &ColumnMapping::default(),
        );
        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok());
        match &items[1] {
            Err(PipelineError::Schema(e)) => {
                assert_eq!(e.invalid[0].row, 3);
                assert_eq!(e.invalid[0].column, "date");
            }
            other => panic!("expected schema error, got {other:?}"),
        }
        match &items[2] {
            Err(PipelineError::Schema(e)) => assert_eq!(e.invalid[0].column, "consumption"),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn semicolon_file_with_decimal_commas_is_detected() {
        let items = parse(
            "meter_id;building_id;date;consumption\nm-1;b-1;2021-01;12,5\nm-1;b-1;2021-02;7\n",
            None,
            &ColumnMapping::default(),
        );
        assert_eq!(items.len(), 2);
        let first = items[0].as_ref().unwrap();
        assert_eq!(first.row, 2);
        assert_eq!(first.payload.meter_id, "m-1");
        assert_eq!(first.payload.consumption, 12.5);
        assert_eq!(items[1].as_ref().unwrap().payload.consumption, 7.0);
    }

    #[test]
    fn comma_file_is_detected() {
        let items = parse(
            "meter_id,building_id,date,consumption\nm-1,b-1,2021-01,3.5\n",
            None,
            &ColumnMapping::default(),
        );
        assert_eq!(items[0].as_ref().unwrap().payload.consumption, 3.5);
        assert_eq!(sniff_delimiter("a;b;c\n"), b';');
        assert_eq!(sniff_delimiter("a,b;c,d\n"), b',');
        assert_eq!(sniff_delimiter("single\n"), b',');
    }
}
