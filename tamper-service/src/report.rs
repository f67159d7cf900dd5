//! Run fingerprinting.
//!
//! The digest covers the suspicious list only; two runs over the same input
//! and thresholds must produce the same digest.

use meter_client::domain::SuspiciousMeter;
use serde::Serialize;

use crate::analysis::ClassificationOutput;

fn hash_str(hasher: &mut blake3::Hasher, s: &str) {
    let len = s.len() as u32;
    hasher.update(&len.to_le_bytes());
    hasher.update(s.as_bytes());
}

pub fn digest(suspicious: &[SuspiciousMeter]) -> String {
    let mut h = blake3::Hasher::new();
    h.update(&(suspicious.len() as u64).to_le_bytes());
    for m in suspicious {
        hash_str(&mut h, &m.meter_id);
        hash_str(&mut h, &m.building_id);
        h.update(&m.record_date.to_julian_day().to_le_bytes());
        hash_str(&mut h, &m.explanation);
    }
    h.finalize().to_hex().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub readings: usize,
    pub meters: usize,
    pub suspicious: usize,
    pub digest: String,
}

impl RunSummary {
    pub fn from_output(output: &ClassificationOutput) -> Self {
        Self {
            readings: output.annotated.len(),
            meters: output.meter_count(),
            suspicious: output.suspicious.len(),
            digest: digest(&output.suspicious),
        }
    }
}
