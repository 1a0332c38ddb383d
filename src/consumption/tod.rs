//! Time-of-day slot classification and daily ToD totals.
//!
//! Two boundary schemes are in use and every call site names the one it
//! applies: [`TodBoundaries::TAGGING`] for per-row slot tagging (which the
//! 15-minute rows inherit) and [`TodBoundaries::MERGE`] for the daily ToD
//! roll-up. Both are overridable from configuration.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate, Timelike};
use serde::{Deserialize, Serialize};

use crate::types::{SiteHourlyConsumption, TaggedHourlyConsumption, TodAggregate, TodSlot};

/// Hour-of-day boundaries partitioning `[0, 24)` into the four ToD slots.
///
/// Night off-peak wraps midnight: `[night_start, 24) ∪ [0, morning_start)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TodBoundaries {
    pub morning_start: u32,
    pub day_start: u32,
    pub evening_start: u32,
    pub night_start: u32,
}

impl TodBoundaries {
    /// Morning 06–09, day 09–18, evening 18–22.
    pub const TAGGING: Self = Self {
        morning_start: 6,
        day_start: 9,
        evening_start: 18,
        night_start: 22,
    };

    /// Morning 06–10, day 10–18, evening 18–22.
    pub const MERGE: Self = Self {
        morning_start: 6,
        day_start: 10,
        evening_start: 18,
        night_start: 22,
    };

    /// Whether the boundaries are strictly increasing within `[0, 24]`.
    pub fn is_ordered(&self) -> bool {
        self.morning_start < self.day_start
            && self.day_start < self.evening_start
            && self.evening_start < self.night_start
            && self.night_start <= 24
    }

    /// Maps an hour of day (0–23) to its slot.
    pub fn classify(&self, hour: u32) -> TodSlot {
        if hour >= self.night_start || hour < self.morning_start {
            TodSlot::NightOffPeak
        } else if hour < self.day_start {
            TodSlot::MorningPeak
        } else if hour < self.evening_start {
            TodSlot::DayNormal
        } else {
            TodSlot::EveningPeak
        }
    }

    /// Hours that belong to the following day in the daily ToD roll-up.
    pub fn is_late_night(&self, hour: u32) -> bool {
        hour >= self.night_start
    }

    /// Slot window label such as `"22:00 - 06:00"`.
    pub fn time_range(&self, slot: TodSlot) -> String {
        let (start, end) = match slot {
            TodSlot::NightOffPeak => (self.night_start, self.morning_start),
            TodSlot::MorningPeak => (self.morning_start, self.day_start),
            TodSlot::DayNormal => (self.day_start, self.evening_start),
            TodSlot::EveningPeak => (self.evening_start, self.night_start),
        };
        format!("{:02}:00 - {:02}:00", start % 24, end % 24)
    }
}

impl Default for TodBoundaries {
    fn default() -> Self {
        Self::TAGGING
    }
}

/// Tags each hourly row with the slot of its hour under `scheme`.
pub fn tag_hourly(
    rows: &[SiteHourlyConsumption],
    scheme: &TodBoundaries,
) -> Vec<TaggedHourlyConsumption> {
    rows.iter()
        .map(|r| TaggedHourlyConsumption {
            date: r.date,
            time: r.time,
            site: r.site.clone(),
            consumption_kwh: r.consumption_kwh,
            tod_slot: scheme.classify(r.time.hour()),
        })
        .collect()
}

/// Sums hourly consumption into per-day, per-site ToD totals.
///
/// Late-night hours are credited to the next calendar day; those of the
/// dataset's last day wrap around to its first day so that the roll-up
/// covers exactly the input's date range.
pub fn merge_to_tod(rows: &[SiteHourlyConsumption], scheme: &TodBoundaries) -> Vec<TodAggregate> {
    let Some(first_date) = rows.iter().map(|r| r.date).min() else {
        return Vec::new();
    };
    let last_date = rows.iter().map(|r| r.date).max().unwrap_or(first_date);

    let mut totals: BTreeMap<(NaiveDate, &str, TodSlot), f64> = BTreeMap::new();
    for r in rows {
        let hour = r.time.hour();
        let date = if !scheme.is_late_night(hour) {
            r.date
        } else if r.date == last_date {
            first_date
        } else {
            r.date.checked_add_days(Days::new(1)).unwrap_or(first_date)
        };
        *totals
            .entry((date, r.site.as_str(), scheme.classify(hour)))
            .or_insert(0.0) += r.consumption_kwh;
    }

    totals
        .into_iter()
        .map(|((date, site, slot), consumption_kwh)| TodAggregate {
            date,
            site: site.to_string(),
            tod_slot: slot,
            time_range: scheme.time_range(slot),
            consumption_kwh,
        })
        .collect()
}
