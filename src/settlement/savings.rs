//! Grid-cost savings under tiered tariffs.

use crate::config::TariffConfig;
use crate::error::Result;
use crate::numeric::round2;
use crate::site::{SiteRegistry, TariffTier};
use crate::types::{BankingSettlement, SavingsRow};

/// Per-kWh rates for the grid tiers and for renewable delivery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TariffRates {
    pub high_rate_per_kwh: f64,
    pub low_rate_per_kwh: f64,
    pub renewable_rate_per_kwh: f64,
}

impl From<&TariffConfig> for TariffRates {
    fn from(cfg: &TariffConfig) -> Self {
        Self {
            high_rate_per_kwh: cfg.high_rate_per_kwh,
            low_rate_per_kwh: cfg.low_rate_per_kwh,
            renewable_rate_per_kwh: cfg.renewable_rate_per_kwh,
        }
    }
}

impl TariffRates {
    pub fn grid_rate(&self, tier: TariffTier) -> f64 {
        match tier {
            TariffTier::High => self.high_rate_per_kwh,
            TariffTier::Low => self.low_rate_per_kwh,
        }
    }

    /// Cost of `consumption` when `renewable` kWh of it is delivered at the
    /// renewable rate and the rest is bought from the grid at `grid_rate`.
    pub fn actual_cost(&self, grid_rate: f64, consumption: f64, renewable: f64) -> f64 {
        let grid_energy = (consumption - renewable).max(0.0);
        grid_energy * grid_rate + renewable * self.renewable_rate_per_kwh
    }
}

fn savings_pct(savings: f64, grid_cost: f64) -> f64 {
    if grid_cost == 0.0 {
        0.0
    } else {
        round2(savings / grid_cost * 100.0)
    }
}

/// Computes grid cost and savings with and without banking per site and month.
///
/// # Errors
///
/// Returns [`crate::error::SettlementError::UnmappedSite`] if a row's site
/// key is not registered.
pub fn compute_savings(
    rows: &[BankingSettlement],
    registry: &SiteRegistry,
    rates: &TariffRates,
) -> Result<Vec<SavingsRow>> {
    rows.iter()
        .map(|r| {
            let site = registry.require(&r.site, "monthly_savings")?;
            let rate = rates.grid_rate(site.tariff);
            let grid_cost = r.consumption_kwh * rate;

            let with_renewable = r.settlement_with_banking_kwh + r.matched_settlement_kwh;
            let actual_with = rates.actual_cost(rate, r.consumption_kwh, with_renewable);
            let actual_without =
                rates.actual_cost(rate, r.consumption_kwh, r.matched_settlement_kwh);
            let savings_with = grid_cost - actual_with;
            let savings_without = grid_cost - actual_without;

            Ok(SavingsRow {
                month: r.month.clone(),
                site: r.site.clone(),
                consumption_kwh: r.consumption_kwh,
                grid_cost,
                actual_cost_with_banking: actual_with,
                savings_with_banking: savings_with,
                savings_pct_with_banking: savings_pct(savings_with, grid_cost),
                actual_cost_without_banking: actual_without,
                savings_without_banking: savings_without,
                savings_pct_without_banking: savings_pct(savings_without, grid_cost),
            })
        })
        .collect()
}
