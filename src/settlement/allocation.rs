//! Per-slot allocation of aggregate generation to site consumption.
//!
//! Each 15-minute slot is settled independently. Priority sites are served
//! first in priority-list order, then every other site by descending
//! consumption. The running pool of unallocated generation is the fold
//! accumulator; whatever is left after the last site becomes surplus
//! generation on the site chosen by the [`SurplusPolicy`].

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, SettlementError};
use crate::numeric::approx_eq;
use crate::site::SiteRegistry;
use crate::types::{AllocationRecord, GenerationRecord, QuarterHourConsumption};

/// Which site carries a slot's leftover generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurplusPolicy {
    /// The slot's last consumption row in input order, whatever its demand.
    #[default]
    LastProcessed,
    /// The site with the smallest consumption (first in allocation order on ties).
    SmallestDemand,
}

/// One site's demand in a slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotDemand {
    /// Rank in the priority list, `None` for ordinary sites.
    pub priority: Option<usize>,
    pub consumption_kwh: f64,
}

/// One site's outcome in a slot, index-aligned with the input demands.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SlotShare {
    pub allocated_kwh: f64,
    pub surplus_generation_kwh: f64,
    pub surplus_demand_kwh: f64,
}

/// Returns demand indices in allocation order: priority sites by rank,
/// then the rest by descending consumption (stable on ties).
pub fn allocation_order(demands: &[SlotDemand]) -> Vec<usize> {
    let mut priority: Vec<usize> = (0..demands.len())
        .filter(|&i| demands[i].priority.is_some())
        .collect();
    priority.sort_by_key(|&i| demands[i].priority);

    let mut rest: Vec<usize> = (0..demands.len())
        .filter(|&i| demands[i].priority.is_none())
        .collect();
    rest.sort_by(|&a, &b| {
        demands[b]
            .consumption_kwh
            .total_cmp(&demands[a].consumption_kwh)
    });

    priority.extend(rest);
    priority
}

/// Allocates `generation_kwh` across one slot's demands.
///
/// Every site is served `min(consumption, pool)`; once the pool is empty
/// the remaining sites receive nothing and carry their full consumption
/// as surplus demand. A positive remainder is recorded as surplus
/// generation on the site picked by `policy`. With no demands the
/// remainder is dropped, so callers must reject that case first.
pub fn allocate_slot(
    generation_kwh: f64,
    demands: &[SlotDemand],
    policy: SurplusPolicy,
) -> Vec<SlotShare> {
    let order = allocation_order(demands);
    let mut shares = vec![SlotShare::default(); demands.len()];

    let remainder = order.iter().fold(generation_kwh, |pool, &idx| {
        let consumption = demands[idx].consumption_kwh;
        let allocated = consumption.min(pool).max(0.0);
        shares[idx].allocated_kwh = allocated;
        if allocated < consumption {
            shares[idx].surplus_demand_kwh = consumption - allocated;
        }
        pool - allocated
    });

    if remainder > 0.0 {
        let target = match policy {
            SurplusPolicy::LastProcessed => demands.len().checked_sub(1),
            SurplusPolicy::SmallestDemand => order.iter().copied().min_by(|&a, &b| {
                demands[a]
                    .consumption_kwh
                    .total_cmp(&demands[b].consumption_kwh)
            }),
        };
        if let Some(idx) = target {
            shares[idx].surplus_generation_kwh = remainder;
        }
    }
    shares
}

/// Fails unless allocated generation plus surplus ties out to the slot's generation.
pub fn check_conservation(
    date: NaiveDate,
    time: NaiveTime,
    generation_kwh: f64,
    records: &[AllocationRecord],
) -> Result<()> {
    let accounted_kwh: f64 = records
        .iter()
        .map(|r| r.generation_kwh + r.surplus_generation_kwh)
        .sum();
    if !approx_eq(accounted_kwh, generation_kwh) {
        return Err(SettlementError::Conservation {
            date,
            time,
            generation_kwh,
            accounted_kwh,
        });
    }
    Ok(())
}

/// Runs [`allocate_slot`] over every 15-minute slot.
#[derive(Debug)]
pub struct AllocationEngine<'a> {
    registry: &'a SiteRegistry,
    policy: SurplusPolicy,
}

impl<'a> AllocationEngine<'a> {
    pub fn new(registry: &'a SiteRegistry, policy: SurplusPolicy) -> Self {
        Self { registry, policy }
    }

    /// Allocates generation to consumption slot by slot.
    ///
    /// Output is ordered by slot; within a slot, sites keep their input
    /// order. Consumption slots without a generation row are settled
    /// against zero generation.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::DataQuality`] if a slot has positive
    /// generation but no consumption rows or repeats a site,
    /// [`SettlementError::UnmappedSite`] if a row's site key is unknown, and
    /// [`SettlementError::Conservation`] if a slot fails to tie out.
    pub fn allocate(
        &self,
        consumption: &[QuarterHourConsumption],
        generation: &[GenerationRecord],
    ) -> Result<Vec<AllocationRecord>> {
        let mut slots: BTreeMap<(NaiveDate, NaiveTime), Vec<&QuarterHourConsumption>> =
            BTreeMap::new();
        for row in consumption {
            slots.entry((row.date, row.time)).or_default().push(row);
        }

        let mut available: BTreeMap<(NaiveDate, NaiveTime), f64> = BTreeMap::new();
        for g in generation {
            *available.entry((g.date, g.time)).or_insert(0.0) += g.generation_kwh;
        }

        let orphaned: Vec<String> = available
            .iter()
            .filter(|(slot, kwh)| **kwh > 0.0 && !slots.contains_key(*slot))
            .map(|((date, time), kwh)| format!("{date} {time}: {kwh} kWh"))
            .collect();
        if !orphaned.is_empty() {
            return Err(SettlementError::data_quality(
                "allocation",
                format!("{} generation slots have no consumption", orphaned.len()),
                orphaned,
            ));
        }

        let mut records = Vec::with_capacity(consumption.len());
        let mut unmatched = 0usize;
        for ((date, time), rows) in slots {
            let generation_kwh = match available.get(&(date, time)) {
                Some(&kwh) => kwh,
                None => {
                    unmatched += 1;
                    0.0
                }
            };

            let mut demands = Vec::with_capacity(rows.len());
            for row in &rows {
                let site = self.registry.require(&row.site, "allocation")?;
                demands.push(SlotDemand {
                    priority: site.priority,
                    consumption_kwh: row.consumption_kwh,
                });
            }
            let mut sites: Vec<&str> = rows.iter().map(|r| r.site.as_str()).collect();
            sites.sort_unstable();
            if sites.windows(2).any(|w| w[0] == w[1]) {
                return Err(SettlementError::data_quality(
                    "quarter_hour",
                    format!("slot {date} {time} lists a site more than once"),
                    sites.iter().map(|s| (*s).to_string()),
                ));
            }

            let shares = allocate_slot(generation_kwh, &demands, self.policy);
            let slot_records: Vec<AllocationRecord> = rows
                .iter()
                .zip(shares)
                .map(|(row, share)| AllocationRecord {
                    date,
                    time,
                    site: row.site.clone(),
                    tod_slot: row.tod_slot,
                    consumption_kwh: row.consumption_kwh,
                    generation_kwh: share.allocated_kwh,
                    surplus_generation_kwh: share.surplus_generation_kwh,
                    surplus_demand_kwh: share.surplus_demand_kwh,
                })
                .collect();
            check_conservation(date, time, generation_kwh, &slot_records)?;
            debug!(%date, %time, generation_kwh, sites = slot_records.len(), "allocated slot");
            records.extend(slot_records);
        }

        if unmatched > 0 {
            warn!(slots = unmatched, "consumption slots without generation, settled against zero");
        }
        info!(rows = records.len(), "allocated generation to 15-minute consumption");
        Ok(records)
    }
}
