//! Building peer baselines.
//!
//! The baseline for a (building, calendar month) slot is the mean seasonal
//! index over every valid reading in that slot, across all meters and years
//! of the building, including the meter being evaluated.

use std::collections::HashMap;

use meter_client::domain::Reading;
use time::Month;

#[derive(Debug, Clone, Default)]
pub struct BuildingBaselines {
    slots: HashMap<(String, Month), f64>,
}

/// Baseline and deviation attached to one reading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PeerComparison {
    pub baseline: Option<f64>,
    pub deviation: Option<f64>,
}

impl BuildingBaselines {
    /// Builds baselines from readings and their aligned seasonal indices.
    ///
    /// Readings with an undefined index do not contribute.
    pub fn compute(readings: &[Reading], indices: &[Option<f64>]) -> Self {
        let mut sums: HashMap<(String, Month), (f64, usize)> = HashMap::new();
        for (r, idx) in readings.iter().zip(indices) {
            let Some(idx) = idx else { continue };
            let entry = sums
                .entry((r.building_id.clone(), r.month()))
                .or_insert((0.0, 0));
            entry.0 += idx;
            entry.1 += 1;
        }

        let slots = sums
            .into_iter()
            .map(|(key, (sum, count))| (key, sum / count as f64))
            .collect();

        Self { slots }
    }

    pub fn get(&self, building_id: &str, month: Month) -> Option<f64> {
        self.slots.get(&(building_id.to_string(), month)).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Compares every reading with its building/month baseline.
    ///
    /// The deviation is masked when either the reading's index or the slot's
    /// baseline is undefined.
    pub fn compare(&self, readings: &[Reading], indices: &[Option<f64>]) -> Vec<PeerComparison> {
        readings
            .iter()
            .zip(indices)
            .map(|(r, idx)| {
                let baseline = self.get(&r.building_id, r.month());
                let deviation = match (idx, baseline) {
                    (Some(idx), Some(b)) => Some(idx - b),
                    _ => None,
                };
                PeerComparison { baseline, deviation }
            })
            .collect()
    }
}
