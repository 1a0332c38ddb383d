//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use std::f64::consts::PI;
use std::path::Path;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use energy_settlement::config::SettlementConfig;
use energy_settlement::io::{CsvDirStore, TableStore};
use energy_settlement::pipeline::{Pipeline, PipelineInputs, PipelineOutput, keys};
use energy_settlement::types::{GenerationReading, MeterReading, SiteTotal};

/// Days covered by the fixture month (2025-08-01 through 2025-08-07).
pub const DAYS: i64 = 7;

/// First reading of the fixture; meter clocks run two seconds late.
pub fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 8, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 2))
        .expect("fixture start")
}

/// Hourly reference readings with a day/night shape.
pub fn reference_readings() -> Vec<MeterReading> {
    (0..DAYS * 24)
        .map(|h| {
            let hour = (h % 24) as f64;
            MeterReading {
                timestamp: start() + Duration::hours(h),
                consumption_kwh: 40.0 + 25.0 * (PI * hour / 24.0).sin() + (h % 5) as f64,
            }
        })
        .collect()
}

/// Declared totals for five of the baseline sites, with free-text names.
///
/// The smallest site is not the last row.
pub fn site_totals() -> Vec<SiteTotal> {
    [
        ("Malleswaram", 12_000.0),
        ("Old  Airport Road", 4_000.0),
        ("hrbr unit", 9_000.0),
        ("Whitefield", 7_500.0),
        ("Kanakapura", 6_000.0),
    ]
    .into_iter()
    .map(|(site, kwh)| SiteTotal {
        site: site.to_string(),
        consumption_kwh: kwh,
    })
    .collect()
}

/// Five-minute solar readings between 06:00 and 18:55 each day.
pub fn generation_readings() -> Vec<GenerationReading> {
    let day_start = NaiveDate::from_ymd_opt(2025, 8, 1)
        .and_then(|d| d.and_hms_opt(6, 0, 0))
        .expect("generation start");
    let mut out = Vec::new();
    for day in 0..DAYS {
        for step in 0..156 {
            let phase = PI * f64::from(step) / 156.0;
            out.push(GenerationReading {
                timestamp: day_start + Duration::days(day) + Duration::minutes(5 * i64::from(step)),
                generation_kwh: 45.0 * phase.sin() * (1.0 - 0.1 * day as f64 / DAYS as f64),
                source: Some("PLANT".to_string()),
            });
        }
    }
    out
}

pub fn fixture_inputs() -> PipelineInputs {
    PipelineInputs {
        reference: reference_readings(),
        site_totals: site_totals(),
        generation: generation_readings(),
    }
}

/// Runs the fixture through `config`.
pub fn run_with(config: SettlementConfig) -> PipelineOutput {
    Pipeline::new(config)
        .expect("valid config")
        .run(&fixture_inputs())
        .expect("pipeline run")
}

/// Runs the fixture through the baseline preset.
pub fn run_baseline() -> PipelineOutput {
    run_with(SettlementConfig::baseline())
}

/// Writes the fixture input tables into `dir` as CSV.
pub fn write_input_dir(dir: &Path) {
    let inputs = fixture_inputs();
    let mut store = CsvDirStore::open(dir).expect("open input dir");
    store
        .write(keys::REFERENCE_CONSUMPTION, &inputs.reference)
        .expect("write reference");
    store
        .write(keys::SITE_TOTALS, &inputs.site_totals)
        .expect("write site totals");
    store
        .write(keys::GENERATION, &inputs.generation)
        .expect("write generation");
    store.commit().expect("commit inputs");
}

/// Absolute-or-relative closeness for kWh figures.
pub fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-6 * a.abs().max(b.abs()).max(1.0)
}
