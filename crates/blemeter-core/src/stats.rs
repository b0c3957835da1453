//! Descriptive statistics over a flushed batch.

use std::collections::BTreeMap;

use serde::Serialize;
use time::OffsetDateTime;

use blemeter_types::base_unit;

use crate::stream::Batch;

/// Summary of one device's samples in one unit over a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    /// End of the batch window.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Length of the batch window in seconds.
    pub duration: f64,
    pub address: String,
    /// Unit without display modifiers such as `(hold)`.
    pub unit: String,
    pub samples: usize,
    pub mean: f64,
    /// Population standard deviation.
    pub deviation: f64,
    pub minimum: f64,
    pub quartile1: f64,
    pub median: f64,
    pub quartile3: f64,
    pub maximum: f64,
}

/// Compute statistics per (address, base unit), skipping absent readings.
///
/// Percentiles use nearest rank on the sorted samples: the 25th and 75th
/// at `round(n * p)` (ties to even, the 75th clamped to the last sample)
/// and the median at `n / 2`.
pub fn aggregate(batch: &Batch) -> Vec<Statistics> {
    let mut groups: BTreeMap<(&str, &str), Vec<f64>> = BTreeMap::new();
    for reading in &batch.readings {
        if let Some(m) = &reading.measurement {
            groups
                .entry((reading.address.as_str(), base_unit(&m.unit)))
                .or_default()
                .push(m.value);
        }
    }

    let duration = batch.duration().as_secs_f64();
    groups
        .into_iter()
        .map(|((address, unit), mut values)| {
            values.sort_by(f64::total_cmp);
            let n = values.len();
            let mean = values.iter().sum::<f64>() / n as f64;
            let (minimum, maximum) = (values[0], values[n - 1]);
            let deviation = if minimum == maximum {
                0.0
            } else {
                (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64).sqrt()
            };
            let rank = |p: f64| ((n as f64 * p).round_ties_even() as usize).min(n - 1);
            Statistics {
                timestamp: batch.stopped,
                duration,
                address: address.to_string(),
                unit: unit.to_string(),
                samples: n,
                mean,
                deviation,
                minimum,
                quartile1: values[rank(0.25)],
                median: values[n / 2],
                quartile3: values[rank(0.75)],
                maximum,
            }
        })
        .collect()
}
