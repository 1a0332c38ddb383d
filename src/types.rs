//! Typed table rows exchanged between pipeline stages.
//!
//! Every stage consumes one of these row types and materialises a `Vec` of
//! another. Rows are plain data keyed by their `(date, time, site)` tuple;
//! the `site` field always carries the composite `"NAME (CODE)"` key
//! produced by [`crate::site::SiteRegistry`].

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::io::TableRow;

/// Time-of-day tariff slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TodSlot {
    #[serde(rename = "Night Off Peak")]
    NightOffPeak,
    #[serde(rename = "Morning Peak")]
    MorningPeak,
    #[serde(rename = "Day Normal")]
    DayNormal,
    #[serde(rename = "Evening Peak")]
    EveningPeak,
}

impl TodSlot {
    /// All slots in chronological order starting at the night boundary.
    pub const ALL: [TodSlot; 4] = [
        TodSlot::NightOffPeak,
        TodSlot::MorningPeak,
        TodSlot::DayNormal,
        TodSlot::EveningPeak,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TodSlot::NightOffPeak => "Night Off Peak",
            TodSlot::MorningPeak => "Morning Peak",
            TodSlot::DayNormal => "Day Normal",
            TodSlot::EveningPeak => "Evening Peak",
        }
    }
}

impl fmt::Display for TodSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Raw reference-site meter reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterReading {
    #[serde(with = "crate::io::timestamp")]
    pub timestamp: NaiveDateTime,
    pub consumption_kwh: f64,
}

/// Declared period-total consumption for one site, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteTotal {
    /// Free-text site name, resolved against the registry at ingestion.
    pub site: String,
    pub consumption_kwh: f64,
}

/// Raw generation reading, either interval energy or a cumulative counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationReading {
    #[serde(with = "crate::io::timestamp")]
    pub timestamp: NaiveDateTime,
    pub generation_kwh: f64,
    /// Originating inverter or meter; only meaningful for cumulative counters.
    #[serde(default)]
    pub source: Option<String>,
}

/// Reference-site consumption profile row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRow {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub consumption_kwh: f64,
    /// Share of the period total in percent, rounded to two decimals.
    pub consumption_pct: f64,
}

impl ProfileRow {
    pub fn timestamp(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }
}

/// Hourly consumption of one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteHourlyConsumption {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub site: String,
    pub consumption_kwh: f64,
}

/// Hourly consumption tagged with its ToD slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedHourlyConsumption {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub site: String,
    pub consumption_kwh: f64,
    pub tod_slot: TodSlot,
}

/// Per-day, per-site ToD slot total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodAggregate {
    pub date: NaiveDate,
    pub site: String,
    pub tod_slot: TodSlot,
    /// Human-readable slot window, e.g. `"22:00 - 06:00"`.
    pub time_range: String,
    pub consumption_kwh: f64,
}

/// 15-minute consumption derived from an hourly row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterHourConsumption {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub site: String,
    pub consumption_kwh: f64,
    pub tod_slot: TodSlot,
}

/// Daily consumption of one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyConsumption {
    pub date: NaiveDate,
    pub site: String,
    pub consumption_kwh: f64,
}

/// Aggregate generation for one 15-minute slot (not site-attributed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub generation_kwh: f64,
}

/// Allocation outcome for one site in one 15-minute slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRecord {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub site: String,
    pub tod_slot: TodSlot,
    pub consumption_kwh: f64,
    /// Generation allocated to this site (never above `consumption_kwh`).
    pub generation_kwh: f64,
    /// Slot generation left over after every site was served.
    pub surplus_generation_kwh: f64,
    /// Consumption not covered by allocated generation.
    pub surplus_demand_kwh: f64,
}

/// Hourly roll-up of the 15-minute allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyAllocation {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub site: String,
    pub tod_slot: TodSlot,
    pub consumption_kwh: f64,
    /// Allocated generation plus the slot surplus folded onto this site.
    pub generation_kwh: f64,
}

/// 15-minute allocation with matched settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub site: String,
    pub tod_slot: TodSlot,
    pub consumption_kwh: f64,
    pub generation_kwh: f64,
    pub surplus_generation_kwh: f64,
    pub surplus_demand_kwh: f64,
    pub matched_settlement_kwh: f64,
}

/// Per-site, per-month settlement totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySettlement {
    /// Calendar month as `YYYY-MM`.
    pub month: String,
    pub site: String,
    pub consumption_kwh: f64,
    pub generation_kwh: f64,
    pub surplus_generation_kwh: f64,
    pub surplus_demand_kwh: f64,
    pub matched_settlement_kwh: f64,
}

/// Monthly settlement after banked surplus redistribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankingSettlement {
    pub month: String,
    pub site: String,
    pub consumption_kwh: f64,
    pub generation_kwh: f64,
    pub surplus_generation_kwh: f64,
    pub surplus_demand_kwh: f64,
    pub matched_settlement_kwh: f64,
    pub settlement_with_banking_kwh: f64,
    /// Pool state right after this site was processed.
    pub surplus_generation_after_banking_kwh: f64,
    pub surplus_demand_after_banking_kwh: f64,
}

/// Grid cost and savings for one site and month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsRow {
    pub month: String,
    pub site: String,
    pub consumption_kwh: f64,
    pub grid_cost: f64,
    pub actual_cost_with_banking: f64,
    pub savings_with_banking: f64,
    pub savings_pct_with_banking: f64,
    pub actual_cost_without_banking: f64,
    pub savings_without_banking: f64,
    pub savings_pct_without_banking: f64,
}

/// Rows that carry a site's consumption on a calendar date.
pub trait ConsumptionRow {
    fn date(&self) -> NaiveDate;
    fn site(&self) -> &str;
    fn consumption_kwh(&self) -> f64;
}

macro_rules! consumption_row {
    ($($ty:ty),+ $(,)?) => {
        $(impl ConsumptionRow for $ty {
            fn date(&self) -> NaiveDate {
                self.date
            }
            fn site(&self) -> &str {
                &self.site
            }
            fn consumption_kwh(&self) -> f64 {
                self.consumption_kwh
            }
        })+
    };
}

consumption_row!(
    SiteHourlyConsumption,
    TaggedHourlyConsumption,
    QuarterHourConsumption,
    AllocationRecord,
    HourlyAllocation,
);

macro_rules! table_row {
    ($ty:ty, [$($col:literal),+ $(,)?]) => {
        impl TableRow for $ty {
            const COLUMNS: &'static [&'static str] = &[$($col),+];
        }
    };
}

table_row!(MeterReading, ["timestamp", "consumption_kwh"]);
table_row!(SiteTotal, ["site", "consumption_kwh"]);
table_row!(GenerationReading, ["timestamp", "generation_kwh"]);
table_row!(ProfileRow, ["date", "time", "consumption_kwh", "consumption_pct"]);
table_row!(SiteHourlyConsumption, ["date", "time", "site", "consumption_kwh"]);
table_row!(
    TaggedHourlyConsumption,
    ["date", "time", "site", "consumption_kwh", "tod_slot"]
);
table_row!(
    TodAggregate,
    ["date", "site", "tod_slot", "time_range", "consumption_kwh"]
);
table_row!(
    QuarterHourConsumption,
    ["date", "time", "site", "consumption_kwh", "tod_slot"]
);
table_row!(DailyConsumption, ["date", "site", "consumption_kwh"]);
table_row!(GenerationRecord, ["date", "time", "generation_kwh"]);
table_row!(
    AllocationRecord,
    [
        "date",
        "time",
        "site",
        "tod_slot",
        "consumption_kwh",
        "generation_kwh",
        "surplus_generation_kwh",
        "surplus_demand_kwh",
    ]
);
table_row!(
    HourlyAllocation,
    ["date", "time", "site", "tod_slot", "consumption_kwh", "generation_kwh"]
);
table_row!(
    SettlementRecord,
    [
        "date",
        "time",
        "site",
        "tod_slot",
        "consumption_kwh",
        "generation_kwh",
        "surplus_generation_kwh",
        "surplus_demand_kwh",
        "matched_settlement_kwh",
    ]
);
table_row!(
    MonthlySettlement,
    [
        "month",
        "site",
        "consumption_kwh",
        "generation_kwh",
        "surplus_generation_kwh",
        "surplus_demand_kwh",
        "matched_settlement_kwh",
    ]
);
table_row!(
    BankingSettlement,
    [
        "month",
        "site",
        "consumption_kwh",
        "generation_kwh",
        "surplus_generation_kwh",
        "surplus_demand_kwh",
        "matched_settlement_kwh",
        "settlement_with_banking_kwh",
        "surplus_generation_after_banking_kwh",
        "surplus_demand_after_banking_kwh",
    ]
);
table_row!(
    SavingsRow,
    [
        "month",
        "site",
        "consumption_kwh",
        "grid_cost",
        "actual_cost_with_banking",
        "savings_with_banking",
        "savings_pct_with_banking",
        "actual_cost_without_banking",
        "savings_without_banking",
        "savings_pct_without_banking",
    ]
);
