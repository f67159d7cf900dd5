use time::Date;

use super::MeterObservation;

/// Date of the meter's peak consumption.
///
/// Ties go to the earliest date, independent of input order. `None` when the
/// meter has no observations.
pub fn record_date(observations: &[MeterObservation]) -> Option<Date> {
    let mut best: Option<&MeterObservation> = None;
    for o in observations {
        best = match best {
            Some(b) if b.consumption > o.consumption => Some(b),
            Some(b) if b.consumption == o.consumption && b.date <= o.date => Some(b),
            _ => Some(o),
        };
    }
    best.map(|o| o.date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn obs(date: Date, consumption: f64) -> MeterObservation {
        MeterObservation {
            date,
            consumption,
            seasonal_index: None,
            building_deviation: None,
        }
    }

    #[test]
    fn picks_peak_consumption() {
        let series = [
            obs(date!(2020 - 01 - 01), 10.0),
            obs(date!(2020 - 02 - 01), 55.5),
            obs(date!(2020 - 03 - 01), 12.0),
        ];
        assert_eq!(record_date(&series), Some(date!(2020 - 02 - 01)));
    }

    #[test]
    fn tie_goes_to_earliest_date_regardless_of_order() {
        let series = [
            obs(date!(2021 - 05 - 01), 80.0),
            obs(date!(2020 - 01 - 01), 10.0),
            obs(date!(2020 - 11 - 01), 80.0),
            obs(date!(2022 - 02 - 01), 80.0),
        ];
        assert_eq!(record_date(&series), Some(date!(2020 - 11 - 01)));
    }

    #[test]
    fn no_observations_no_record() {
        assert_eq!(record_date(&[]), None);
    }
}
