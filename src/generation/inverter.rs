//! Cumulative inverter counter de-accumulation.
//!
//! Inverter exports report "day generation so far", a counter that resets
//! every morning. Interval energy is the difference between consecutive
//! readings of the same source on the same day.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::error::{Result, SettlementError};
use crate::types::GenerationReading;
use crate::validate;

const CONTEXT: &str = "generation";

/// Converts per-source cumulative day counters into interval energy.
///
/// Readings are grouped by `(source, date)` and ordered by timestamp. The
/// first reading of each group is kept as is; every later reading becomes
/// its difference from the previous one. Output is ordered by timestamp.
///
/// # Errors
///
/// Returns [`SettlementError::DataQuality`] on missing or negative counter
/// values, or when a counter decreases within a day.
pub fn deaccumulate(readings: &[GenerationReading]) -> Result<Vec<GenerationReading>> {
    validate::finite_non_negative(
        CONTEXT,
        "generation_kwh",
        readings.iter().map(|r| r.generation_kwh),
    )?;

    let mut groups: BTreeMap<(Option<&str>, NaiveDate), Vec<&GenerationReading>> = BTreeMap::new();
    for r in readings {
        groups
            .entry((r.source.as_deref(), r.timestamp.date()))
            .or_default()
            .push(r);
    }

    let mut out = Vec::with_capacity(readings.len());
    let mut decreases = Vec::new();
    for ((source, date), mut group) in groups {
        group.sort_by_key(|r| r.timestamp);
        let mut previous = 0.0;
        for r in group {
            let delta = r.generation_kwh - previous;
            if delta < 0.0 {
                decreases.push(format!(
                    "{} at {}: {} -> {}",
                    source.unwrap_or("<unnamed>"),
                    r.timestamp,
                    previous,
                    r.generation_kwh
                ));
            }
            previous = r.generation_kwh;
            out.push(GenerationReading {
                timestamp: r.timestamp,
                generation_kwh: delta,
                source: r.source.clone(),
            });
        }
        debug!(source = source.unwrap_or("<unnamed>"), %date, "de-accumulated day counter");
    }

    if !decreases.is_empty() {
        return Err(SettlementError::data_quality(
            CONTEXT,
            format!("{} cumulative counter decreases within a day", decreases.len()),
            decreases,
        ));
    }

    out.sort_by_key(|r| r.timestamp);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(day: u32, hour: u32, minute: u32, kwh: f64, source: &str) -> GenerationReading {
        GenerationReading {
            timestamp: NaiveDate::from_ymd_opt(2025, 8, day)
                .and_then(|d| d.and_hms_opt(hour, minute, 0))
                .expect("timestamp"),
            generation_kwh: kwh,
            source: Some(source.to_string()),
        }
    }

    #[test]
    fn differences_consecutive_readings() {
        let input = vec![
            reading(1, 6, 15, 0.5, "INV_1"),
            reading(1, 6, 0, 0.2, "INV_1"),
            reading(1, 6, 30, 1.5, "INV_1"),
        ];
        let out = deaccumulate(&input).expect("deaccumulate");
        let values: Vec<f64> = out.iter().map(|r| r.generation_kwh).collect();
        assert_eq!(values.len(), 3);
        assert!((values[0] - 0.2).abs() < 1e-12);
        assert!((values[1] - 0.3).abs() < 1e-12);
        assert!((values[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn counters_reset_per_day_and_source() {
        let input = vec![
            reading(1, 18, 0, 40.0, "INV_1"),
            reading(2, 6, 0, 0.4, "INV_1"),
            reading(1, 18, 0, 25.0, "INV_2"),
        ];
        let out = deaccumulate(&input).expect("deaccumulate");
        let total: f64 = out.iter().map(|r| r.generation_kwh).sum();
        assert!((total - 65.4).abs() < 1e-9);
    }

    #[test]
    fn decreasing_counter_rejected() {
        let input = vec![reading(1, 6, 0, 5.0, "INV_1"), reading(1, 6, 15, 4.0, "INV_1")];
        let err = deaccumulate(&input);
        assert!(matches!(err, Err(SettlementError::DataQuality { .. })));
    }

    #[test]
    fn total_equals_sum_of_day_maxima() {
        let input: Vec<_> = (0..8)
            .map(|i| reading(3, 8 + i / 4, (i % 4) * 15, f64::from(i) * 1.25, "INV_7"))
            .collect();
        let out = deaccumulate(&input).expect("deaccumulate");
        let total: f64 = out.iter().map(|r| r.generation_kwh).sum();
        assert!((total - 7.0 * 1.25).abs() < 1e-9);
    }
}
