//! Daily consumption roll-up.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::types::{ConsumptionRow, DailyConsumption};

/// Sums consumption per site per calendar date, ordered by date then site.
pub fn aggregate_daily<R: ConsumptionRow>(rows: &[R]) -> Vec<DailyConsumption> {
    let mut totals: BTreeMap<(NaiveDate, &str), f64> = BTreeMap::new();
    for r in rows {
        *totals.entry((r.date(), r.site())).or_insert(0.0) += r.consumption_kwh();
    }
    totals
        .into_iter()
        .map(|((date, site), consumption_kwh)| DailyConsumption {
            date,
            site: site.to_string(),
            consumption_kwh,
        })
        .collect()
}
