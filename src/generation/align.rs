//! Resampling raw generation onto the 15-minute settlement grid.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};
use tracing::info;

use crate::error::Result;
use crate::types::{GenerationReading, GenerationRecord};
use crate::validate;

const CONTEXT: &str = "generation";

/// Width of one settlement slot in minutes.
pub const SLOT_MINUTES: u32 = 15;

/// Truncates a timestamp to the start of its 15-minute slot.
pub fn floor_to_slot(ts: NaiveDateTime) -> NaiveDateTime {
    let minute = ts.minute() - ts.minute() % SLOT_MINUTES;
    ts.date()
        .and_time(NaiveTime::from_hms_opt(ts.hour(), minute, 0).unwrap_or(NaiveTime::MIN))
}

/// Sums readings into contiguous 15-minute buckets.
///
/// Every slot between the first and last occupied slot is emitted; slots
/// without readings carry zero generation.
///
/// # Errors
///
/// Returns [`crate::error::SettlementError::DataQuality`] when there are no
/// readings or a value is missing or negative.
pub fn resample_15min(readings: &[GenerationReading]) -> Result<Vec<GenerationRecord>> {
    validate::non_empty(readings, CONTEXT)?;
    validate::finite_non_negative(
        CONTEXT,
        "generation_kwh",
        readings.iter().map(|r| r.generation_kwh),
    )?;

    let mut buckets: BTreeMap<NaiveDateTime, f64> = BTreeMap::new();
    for r in readings {
        *buckets.entry(floor_to_slot(r.timestamp)).or_insert(0.0) += r.generation_kwh;
    }

    let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back()) else {
        return Ok(Vec::new());
    };

    let step = Duration::minutes(i64::from(SLOT_MINUTES));
    let mut out = Vec::new();
    let mut slot = first;
    while slot <= last {
        out.push(GenerationRecord {
            date: slot.date(),
            time: slot.time(),
            generation_kwh: buckets.get(&slot).copied().unwrap_or(0.0),
        });
        slot += step;
    }

    validate::quarter_hour_spacing(
        "generation_15min",
        out.iter().map(|g| g.date.and_time(g.time)),
    )?;
    info!(
        readings = readings.len(),
        slots = out.len(),
        "resampled generation to 15-minute slots"
    );
    Ok(out)
}
