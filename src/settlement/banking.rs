//! Monthly banking settlement.
//!
//! A month's surplus generation across all sites forms a pool that is paid
//! out to unmet demand, priority sites first and then by descending unmet
//! demand. Settling a site in full debits the pool by `demand ×
//! debit_factor`; a pool too small for that is credited to the site at
//! `pool × credit_factor` and emptied.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::config::BankingConfig;
use crate::error::Result;
use crate::site::SiteRegistry;
use crate::types::{BankingSettlement, MonthlySettlement};

/// Loss factors applied when drawing on the banked pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BankingPolicy {
    pub debit_factor: f64,
    pub credit_factor: f64,
}

impl Default for BankingPolicy {
    fn default() -> Self {
        Self::from(&BankingConfig::default())
    }
}

impl From<&BankingConfig> for BankingPolicy {
    fn from(cfg: &BankingConfig) -> Self {
        Self {
            debit_factor: cfg.debit_factor,
            credit_factor: cfg.credit_factor,
        }
    }
}

impl BankingPolicy {
    /// Settles one site's unmet demand against the pool.
    ///
    /// Returns `(settlement, pool_after)`. Settlement never exceeds `demand`.
    pub fn settle_site(&self, pool: f64, demand: f64) -> (f64, f64) {
        let full_cost = demand * self.debit_factor;
        if pool >= full_cost {
            (demand, pool - full_cost)
        } else if pool > 0.0 {
            ((pool * self.credit_factor).min(demand), 0.0)
        } else {
            (0.0, pool)
        }
    }
}

/// Applies banking month by month.
///
/// Rows keep their input order; the pool is drawn down in allocation
/// order, and each row records the pool left right after its site.
///
/// # Errors
///
/// Returns [`crate::error::SettlementError::UnmappedSite`] if a row's site
/// key is not registered.
pub fn apply_banking(
    monthly: &[MonthlySettlement],
    registry: &SiteRegistry,
    policy: &BankingPolicy,
) -> Result<Vec<BankingSettlement>> {
    let mut months: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (idx, row) in monthly.iter().enumerate() {
        months.entry(row.month.as_str()).or_default().push(idx);
    }

    let mut out: Vec<Option<BankingSettlement>> = vec![None; monthly.len()];
    for (month, indices) in months {
        let mut ranked = Vec::with_capacity(indices.len());
        for &idx in &indices {
            let site = registry.require(&monthly[idx].site, "banking_settlement")?;
            ranked.push((idx, site.priority));
        }
        let mut priority: Vec<(usize, Option<usize>)> =
            ranked.iter().copied().filter(|(_, p)| p.is_some()).collect();
        priority.sort_by_key(|&(_, p)| p);
        let mut rest: Vec<usize> = ranked
            .iter()
            .filter(|(_, p)| p.is_none())
            .map(|&(idx, _)| idx)
            .collect();
        rest.sort_by(|&a, &b| {
            monthly[b]
                .surplus_demand_kwh
                .total_cmp(&monthly[a].surplus_demand_kwh)
        });
        let order = priority.into_iter().map(|(idx, _)| idx).chain(rest);

        let pool: f64 = indices.iter().map(|&i| monthly[i].surplus_generation_kwh).sum();
        let remaining = order.fold(pool, |pool, idx| {
            let row = &monthly[idx];
            let demand = row.surplus_demand_kwh;
            let (settlement, pool_after) = policy.settle_site(pool, demand);
            debug!(%month, site = %row.site, demand, settlement, pool_after, "banked settlement");
            out[idx] = Some(BankingSettlement {
                month: row.month.clone(),
                site: row.site.clone(),
                consumption_kwh: row.consumption_kwh,
                generation_kwh: row.generation_kwh,
                surplus_generation_kwh: row.surplus_generation_kwh,
                surplus_demand_kwh: demand,
                matched_settlement_kwh: row.matched_settlement_kwh,
                settlement_with_banking_kwh: settlement,
                surplus_generation_after_banking_kwh: pool_after.max(0.0),
                surplus_demand_after_banking_kwh: (demand - settlement).max(0.0),
            });
            pool_after
        });
        info!(%month, pool_kwh = pool, remaining_kwh = remaining, "applied monthly banking");
    }

    Ok(out.into_iter().flatten().collect())
}
