use meter_client::domain::{date_format::format_date, Reading};
use time::macros::date;

use crate::{
    pipeline::{Envelope, PipelineError, Transform},
    schema::{check_reading, FieldIssue, SchemaError},
};

/// Pure validation of a typed `Reading`.
///
/// Rules:
/// - identifiers must be non-empty.
/// - consumption must be finite and non-negative.
/// - date must be within a broad sanity window [1990-01-01, 2100-01-01).
pub fn validate_reading(env: Envelope<Reading>) -> Result<Envelope<Reading>, PipelineError> {
    let r = &env.payload;
    let mut issues = check_reading(env.row, r);

    let min_date = date!(1990 - 01 - 01);
    let max_date = date!(2100 - 01 - 01);
    if r.date < min_date || r.date >= max_date {
        issues.push(FieldIssue::new(
            env.row,
            "date",
            format_date(r.date),
            "date out of allowed range",
        ));
    }

    SchemaError::from_issues(issues)?;
    Ok(env)
}

#[derive(Clone, Default)]
pub struct ReadingValidation;

#[async_trait::async_trait]
impl Transform<Reading, Reading> for ReadingValidation {
    async fn apply(&self, input: Envelope<Reading>) -> Result<Envelope<Reading>, PipelineError> {
        match validate_reading(input) {
            Ok(env) => Ok(env),
            Err(e) => {
                metrics::counter!("validation_reading_rejected_total").increment(1);
                Err(e)
            }
        }
    }
}
