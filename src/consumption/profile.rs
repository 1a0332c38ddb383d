//! Reference-site percentage profile.

use tracing::debug;

use crate::error::{Result, SettlementError};
use crate::numeric::round2;
use crate::types::{MeterReading, ProfileRow};
use crate::validate;

const CONTEXT: &str = "reference_consumption";

/// Computes each reading's share of the period total, in percent.
///
/// Readings are ordered by timestamp. Percentages are rounded to two
/// decimals, so their sum only has to land within `tolerance` of 100.
///
/// # Arguments
///
/// * `readings` - Reference-site meter readings for one calendar month
/// * `tolerance` - Allowed deviation of the percentage sum from 100
///
/// # Errors
///
/// Returns [`SettlementError::DataQuality`] if the readings are empty,
/// contain missing or negative values, repeat a timestamp, span more than
/// one month, total zero, or round to a percentage sum outside tolerance.
pub fn build_profile(readings: &[MeterReading], tolerance: f64) -> Result<Vec<ProfileRow>> {
    validate::non_empty(readings, CONTEXT)?;
    validate::finite_non_negative(
        CONTEXT,
        "consumption_kwh",
        readings.iter().map(|r| r.consumption_kwh),
    )?;
    validate::unique(CONTEXT, readings.iter().map(|r| r.timestamp))?;
    validate::single_month(CONTEXT, readings.iter().map(|r| r.timestamp))?;

    let total: f64 = readings.iter().map(|r| r.consumption_kwh).sum();
    if total <= 0.0 {
        return Err(SettlementError::data_quality(
            CONTEXT,
            "total consumption is zero",
            Vec::new(),
        ));
    }

    let mut sorted: Vec<&MeterReading> = readings.iter().collect();
    sorted.sort_by_key(|r| r.timestamp);

    let profile: Vec<ProfileRow> = sorted
        .into_iter()
        .map(|r| ProfileRow {
            date: r.timestamp.date(),
            time: r.timestamp.time(),
            consumption_kwh: r.consumption_kwh,
            consumption_pct: round2(r.consumption_kwh / total * 100.0),
        })
        .collect();

    validate::percentage_sum(
        "profile",
        profile.iter().map(|p| p.consumption_pct),
        100.0,
        tolerance,
    )?;
    debug!(rows = profile.len(), total_kwh = total, "built reference profile");
    Ok(profile)
}
