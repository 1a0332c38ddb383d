//! Monthly settlement totals per site.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::types::{MonthlySettlement, SettlementRecord};

/// Formats a date's calendar month as `YYYY-MM`.
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// Sums settlement rows per calendar month and site.
pub fn aggregate_monthly(records: &[SettlementRecord]) -> Vec<MonthlySettlement> {
    let mut months: BTreeMap<(String, &str), MonthlySettlement> = BTreeMap::new();
    for r in records {
        let month = month_key(r.date);
        let total = months
            .entry((month.clone(), r.site.as_str()))
            .or_insert_with(|| MonthlySettlement {
                month,
                site: r.site.clone(),
                consumption_kwh: 0.0,
                generation_kwh: 0.0,
                surplus_generation_kwh: 0.0,
                surplus_demand_kwh: 0.0,
                matched_settlement_kwh: 0.0,
            });
        total.consumption_kwh += r.consumption_kwh;
        total.generation_kwh += r.generation_kwh;
        total.surplus_generation_kwh += r.surplus_generation_kwh;
        total.surplus_demand_kwh += r.surplus_demand_kwh;
        total.matched_settlement_kwh += r.matched_settlement_kwh;
    }
    months.into_values().collect()
}
