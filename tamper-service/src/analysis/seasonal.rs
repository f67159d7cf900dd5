//! Per-meter, per-year seasonal normalization.
//!
//! Each reading's consumption is divided by the mean consumption of the same
//! meter in the same calendar year, so a meter-year's indices average 1.0.

use std::collections::HashMap;

use meter_client::domain::Reading;

/// Returns one seasonal index per reading, aligned with `readings`.
///
/// The index is `None` when the meter's yearly mean is zero; such readings are
/// kept in the dataset but masked out of every aggregation that needs an index.
pub fn seasonal_indices(readings: &[Reading]) -> Vec<Option<f64>> {
    let mut totals: HashMap<(&str, i32), (f64, usize)> = HashMap::new();
    for r in readings {
        let entry = totals.entry((r.meter_id.as_str(), r.year())).or_insert((0.0, 0));
        entry.0 += r.consumption;
        entry.1 += 1;
    }

    readings
        .iter()
        .map(|r| {
            let (sum, count) = totals[&(r.meter_id.as_str(), r.year())];
            let yearly_mean = sum / count as f64;
            if yearly_mean > 0.0 {
                Some(r.consumption / yearly_mean)
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{macros::date, Date, Month};

    fn reading(meter: &str, date: Date, consumption: f64) -> Reading {
        Reading::new(meter, "b-1", date, consumption)
    }

    #[test]
    fn meter_year_indices_average_to_one() {
        let mut readings = Vec::new();
        for (year, scale) in [(2020, 1.0), (2021, 3.5)] {
            for m in 1..=12u8 {
                let month = Month::try_from(m).unwrap();
                let date = Date::from_calendar_date(year, month, 1).unwrap();
                readings.push(reading("m-1", date, scale * (10.0 + f64::from(m) * 7.3)));
                readings.push(reading("m-2", date, 100.0 - f64::from(m)));
            }
        }
        // Partial year: only three reads in 2022.
        readings.push(reading("m-1", date!(2022 - 01 - 01), 40.0));
        readings.push(reading("m-1", date!(2022 - 02 - 01), 10.0));
        readings.push(reading("m-1", date!(2022 - 05 - 01), 25.0));

        let indices = seasonal_indices(&readings);

        let mut groups: HashMap<(String, i32), Vec<f64>> = HashMap::new();
        for (r, idx) in readings.iter().zip(&indices) {
            groups
                .entry((r.meter_id.clone(), r.year()))
                .or_default()
                .push(idx.expect("nonzero yearly mean"));
        }
        assert_eq!(groups.len(), 5);
        for values in groups.values() {
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            assert!((mean - 1.0).abs() < 1e-9, "mean was {mean}");
        }
    }

    #[test]
    fn single_reading_year_is_exactly_one() {
        let readings = vec![reading("m-1", date!(2020 - 06 - 01), 42.0)];
        assert_eq!(seasonal_indices(&readings), vec![Some(1.0)]);
    }

    #[test]
    fn zero_yearly_mean_is_masked_without_touching_other_years() {
        let readings = vec![
            reading("m-1", date!(2020 - 01 - 01), 0.0),
            reading("m-1", date!(2020 - 02 - 01), 0.0),
            reading("m-1", date!(2021 - 01 - 01), 0.0),
            reading("m-1", date!(2021 - 02 - 01), 8.0),
        ];
        let indices = seasonal_indices(&readings);
        assert_eq!(indices[0], None);
        assert_eq!(indices[1], None);
        assert_eq!(indices[2], Some(0.0));
        assert_eq!(indices[3], Some(2.0));
    }

    #[test]
    fn meters_are_normalized_independently() {
        let readings = vec![
            reading("m-1", date!(2020 - 01 - 01), 10.0),
            reading("m-1", date!(2020 - 02 - 01), 30.0),
            reading("m-2", date!(2020 - 01 - 01), 1000.0),
        ];
        let indices = seasonal_indices(&readings);
        assert_eq!(indices, vec![Some(0.5), Some(1.5), Some(1.0)]);
    }
}
