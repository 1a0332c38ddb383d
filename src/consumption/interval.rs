//! Hourly to 15-minute interval expansion.

use chrono::Duration;

use crate::types::{QuarterHourConsumption, TaggedHourlyConsumption};

/// Sub-intervals per hour.
pub const QUARTERS_PER_HOUR: u32 = 4;

/// Expands each hourly row into four 15-minute rows at +0/15/30/45 minutes,
/// each carrying a quarter of the hourly value and the parent's ToD slot.
pub fn expand_to_quarter_hours(rows: &[TaggedHourlyConsumption]) -> Vec<QuarterHourConsumption> {
    let mut out = Vec::with_capacity(rows.len() * QUARTERS_PER_HOUR as usize);
    for r in rows {
        let start = r.date.and_time(r.time);
        let value = r.consumption_kwh / f64::from(QUARTERS_PER_HOUR);
        for q in 0..QUARTERS_PER_HOUR {
            let ts = start + Duration::minutes(15 * i64::from(q));
            out.push(QuarterHourConsumption {
                date: ts.date(),
                time: ts.time(),
                site: r.site.clone(),
                consumption_kwh: value,
                tod_slot: r.tod_slot,
            });
        }
    }
    out
}
