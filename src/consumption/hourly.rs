//! Per-site hourly consumption derived from the reference profile.

use std::collections::HashSet;

use chrono::{NaiveDateTime, NaiveTime, Timelike};
use tracing::{debug, info};

use crate::error::{Result, SettlementError};
use crate::types::{ProfileRow, SiteHourlyConsumption};

/// Hours at which one site's consumption is forced to zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ZeroOutRule {
    /// Composite site key.
    pub site: String,
    /// Timestamps floored to the hour.
    pub hours: HashSet<NaiveDateTime>,
}

impl ZeroOutRule {
    pub fn new(site: impl Into<String>, hours: impl IntoIterator<Item = NaiveDateTime>) -> Self {
        Self {
            site: site.into(),
            hours: hours.into_iter().map(floor_to_hour).collect(),
        }
    }

    fn matches(&self, ts: NaiveDateTime) -> bool {
        self.hours.contains(&floor_to_hour(ts))
    }
}

/// Truncates a timestamp to the start of its hour.
pub fn floor_to_hour(ts: NaiveDateTime) -> NaiveDateTime {
    ts.date().and_time(NaiveTime::from_hms_opt(ts.hour(), 0, 0).unwrap_or(NaiveTime::MIN))
}

/// Scales `total` by each percentage's share of the percentage sum.
///
/// # Errors
///
/// Returns [`SettlementError::DataQuality`] when the percentages sum to zero.
pub fn split_total(total: f64, percentages: &[f64]) -> Result<Vec<f64>> {
    let sum: f64 = percentages.iter().sum();
    if sum <= 0.0 {
        return Err(SettlementError::data_quality(
            "profile",
            "percentages sum to zero, cannot split totals",
            Vec::new(),
        ));
    }
    Ok(percentages.iter().map(|p| p / sum * total).collect())
}

/// Splits each site's period total across the profile's hours.
///
/// Sites keep the order of `totals`; each contributes one row per profile
/// row with the profile's raw timestamp. Hours listed in a site's zero-out
/// rule are set to zero without redistributing their share.
///
/// # Arguments
///
/// * `profile` - Reference percentage profile
/// * `totals` - `(composite site key, period total kWh)` pairs
/// * `zero_out` - Per-site hours forced to zero
pub fn split_to_hourly(
    profile: &[ProfileRow],
    totals: &[(String, f64)],
    zero_out: &[ZeroOutRule],
) -> Result<Vec<SiteHourlyConsumption>> {
    let percentages: Vec<f64> = profile.iter().map(|p| p.consumption_pct).collect();
    let mut rows = Vec::with_capacity(profile.len() * totals.len());

    for (site, total) in totals {
        let values = split_total(*total, &percentages)?;
        let rules: Vec<&ZeroOutRule> = zero_out.iter().filter(|r| &r.site == site).collect();
        let mut zeroed = 0usize;
        for (p, value) in profile.iter().zip(values) {
            let ts = p.timestamp();
            let consumption_kwh = if rules.iter().any(|r| r.matches(ts)) {
                zeroed += 1;
                0.0
            } else {
                value
            };
            rows.push(SiteHourlyConsumption {
                date: p.date,
                time: p.time,
                site: site.clone(),
                consumption_kwh,
            });
        }
        if zeroed > 0 {
            debug!(%site, hours = zeroed, "applied zero-out hours");
        }
    }

    info!(sites = totals.len(), rows = rows.len(), "split site totals to hourly");
    Ok(rows)
}

/// Unions the per-site hourly rows into one long table with times floored
/// to the hour.
pub fn consolidate(rows: Vec<SiteHourlyConsumption>) -> Vec<SiteHourlyConsumption> {
    rows.into_iter()
        .map(|mut r| {
            r.time = floor_to_hour(r.date.and_time(r.time)).time();
            r
        })
        .collect()
}
