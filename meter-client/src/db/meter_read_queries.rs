use anyhow::Result;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::domain::Reading;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MonthlyMeterRead {
    pub meter_id: String,
    pub building_id: String,
    pub month_start: OffsetDateTime,
    pub consumption: f64,
}

impl From<MonthlyMeterRead> for Reading {
    fn from(r: MonthlyMeterRead) -> Self {
        Reading {
            meter_id: r.meter_id,
            building_id: r.building_id,
            date: r.month_start.date(),
            consumption: r.consumption,
        }
    }
}

/// Fetch monthly consumption for every meter with a known building.
///
/// Raw `meter_usage` intervals are summed per calendar month; meters without
/// a `meters.building_id` have no peer group and are left out.
pub async fn monthly_reads(
    pool: &PgPool,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> Result<Vec<Reading>> {
    let rows = sqlx::query_as::<_, MonthlyMeterRead>(
        r#"
        SELECT
            mu.meter_id,
            m.building_id,
            timestamp_floor('M', mu.ts) AS month_start,
            SUM(mu.kwh)                 AS consumption
        FROM meter_usage mu
        JOIN meters m ON mu.meter_id = m.meter_id
        WHERE mu.ts >= $1
          AND mu.ts <  $2
          AND m.building_id IS NOT NULL
        GROUP BY mu.meter_id, m.building_id, month_start
        ORDER BY mu.meter_id, month_start
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Reading::from).collect())
}
