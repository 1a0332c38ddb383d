//! Matched (same-slot) settlement.

use crate::types::{AllocationRecord, SettlementRecord};

/// Adds `matched_settlement_kwh = min(generation, consumption)` to every
/// 15-minute allocation row.
pub fn settle_matched(records: &[AllocationRecord]) -> Vec<SettlementRecord> {
    records
        .iter()
        .map(|r| SettlementRecord {
            date: r.date,
            time: r.time,
            site: r.site.clone(),
            tod_slot: r.tod_slot,
            consumption_kwh: r.consumption_kwh,
            generation_kwh: r.generation_kwh,
            surplus_generation_kwh: r.surplus_generation_kwh,
            surplus_demand_kwh: r.surplus_demand_kwh,
            matched_settlement_kwh: r.generation_kwh.min(r.consumption_kwh),
        })
        .collect()
}
