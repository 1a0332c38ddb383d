//! Hourly roll-up of the 15-minute allocation.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};

use crate::consumption::hourly::floor_to_hour;
use crate::types::{AllocationRecord, HourlyAllocation, TodSlot};

/// Sums 15-minute allocation rows into hours per site and slot.
///
/// Surplus generation is folded into the hourly generation figure, so an
/// hour's generation across sites equals the generation that was available.
pub fn to_hourly(records: &[AllocationRecord]) -> Vec<HourlyAllocation> {
    let mut hours: BTreeMap<(NaiveDate, NaiveTime, &str, TodSlot), (f64, f64)> = BTreeMap::new();
    for r in records {
        let hour = floor_to_hour(r.date.and_time(r.time));
        let entry = hours
            .entry((hour.date(), hour.time(), r.site.as_str(), r.tod_slot))
            .or_insert((0.0, 0.0));
        entry.0 += r.consumption_kwh;
        entry.1 += r.generation_kwh + r.surplus_generation_kwh;
    }
    hours
        .into_iter()
        .map(
            |((date, time, site, tod_slot), (consumption_kwh, generation_kwh))| HourlyAllocation {
                date,
                time,
                site: site.to_string(),
                tod_slot,
                consumption_kwh,
                generation_kwh,
            },
        )
        .collect()
}
